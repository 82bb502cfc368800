//! Login, logout, and the authenticated session check.

// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::{LoginCredentials, TokenPair},
	client::{ApiClient, ApiRequest},
	http::HttpTransport,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

/// Successful login response body (after envelope unwrapping).
#[derive(Debug, Deserialize)]
struct LoginPayload {
	#[serde(flatten)]
	tokens: TokenPair,
	#[serde(default)]
	user: Option<serde_json::Value>,
}

/// Result of a successful [`ApiClient::login`].
#[derive(Clone, Debug, PartialEq)]
pub struct LoginOutcome {
	/// User object returned alongside the tokens, if any.
	pub user: Option<serde_json::Value>,
	/// Whether the refresh token made it into the vault.
	pub vaulted: bool,
}

impl<C> ApiClient<C>
where
	C: ?Sized + HttpTransport,
{
	/// Signs in with credentials, persisting the issued tokens and vaulting the refresh token.
	///
	/// A `401` here is a wrong password, not an expired session, and is returned as
	/// [`Error::Status`] without any refresh attempt.
	pub async fn login(&self, credentials: &LoginCredentials) -> Result<LoginOutcome> {
		let span = FlowSpan::new(FlowKind::Login, "login");

		obs::record_flow_outcome(FlowKind::Login, FlowOutcome::Attempt);

		let result = span
			.instrument(async {
				let request = ApiRequest::post(self.config.endpoints.login.clone())
					.json(credentials)?
					.without_refresh();
				let payload: LoginPayload = self.send(request).await?.data()?;

				let vaulted = self.persist_pair(&payload.tokens).await;

				self.session.install(payload.tokens.access_token);

				Ok::<_, Error>(LoginOutcome { user: payload.user, vaulted })
			})
			.await;

		match &result {
			Ok(_) => {
				obs::record_flow_outcome(FlowKind::Login, FlowOutcome::Success);
				tracing::info!(login = %credentials.login, "signed in");
			},
			Err(e) => {
				obs::record_flow_outcome(FlowKind::Login, FlowOutcome::Failure);
				tracing::warn!(login = %credentials.login, error = %e, "sign-in failed");
			},
		}

		result
	}

	/// Ends the session: notifies the backend (best effort) and clears every local token.
	///
	/// Local state is cleared even when the backend call fails; the call never redirects.
	pub async fn logout(&self) {
		let span = FlowSpan::new(FlowKind::Logout, "logout");

		obs::record_flow_outcome(FlowKind::Logout, FlowOutcome::Attempt);

		span.instrument(async {
			let request = ApiRequest::post(self.config.endpoints.logout.clone()).without_refresh();

			if let Err(e) = self.send(request).await {
				tracing::debug!(error = %e, "backend logout failed; clearing locally");
			}

			self.clear_local_tokens().await;
			self.session.reset();
		})
		.await;

		obs::record_flow_outcome(FlowKind::Logout, FlowOutcome::Success);
	}

	/// Fetches the current user's profile, refreshing the session if needed.
	pub async fn profile<T>(&self) -> Result<T>
	where
		T: DeserializeOwned,
	{
		self.send(ApiRequest::get(self.config.endpoints.profile.clone())).await?.data()
	}

	/// Checks the profile endpoint with the current credentials, without refreshing.
	///
	/// Returns `false` for `401`/`403`; other failures are returned as errors so callers can
	/// tell "signed out" from "backend unreachable".
	pub async fn check_auth(&self) -> Result<bool> {
		let request = ApiRequest::get(self.config.endpoints.profile.clone()).without_refresh();

		match self.send(request).await {
			Ok(_) => Ok(true),
			Err(Error::Status(e)) if matches!(e.status, 401 | 403) => Ok(false),
			Err(e) => Err(e),
		}
	}
}
