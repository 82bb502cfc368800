//! One-shot session restore at application entry.
//!
//! [`SessionBootstrap::run`] decides whether the user is already signed in without asking for
//! credentials when that can be avoided:
//!
//! 1. check the session against the backend with the current access token and cookies;
//! 2. otherwise exchange the vaulted refresh token through the client's single-flight refresh;
//! 3. otherwise report that the login form is needed.
//!
//! The sequence runs once per [`SessionBootstrap`]. Concurrent and repeated callers await the
//! first run and observe its outcome.

// crates.io
use async_lock::OnceCell;
// self
use crate::{
	_prelude::*,
	client::ApiClient,
	http::HttpTransport,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

/// How an authenticated session was established.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionSource {
	/// The held access token or session cookie was still valid.
	ActiveSession,
	/// The vaulted refresh token was exchanged for a new access token.
	VaultRestore,
}

/// Result of the bootstrap sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BootstrapOutcome {
	/// The application may proceed as signed in.
	Authenticated {
		/// Step that produced the session.
		via: SessionSource,
	},
	/// The login form must be shown.
	LoginRequired,
}
impl BootstrapOutcome {
	/// `true` for [`BootstrapOutcome::Authenticated`].
	pub fn is_authenticated(&self) -> bool {
		matches!(self, Self::Authenticated { .. })
	}
}

/// Runs the restore sequence at most once.
pub struct SessionBootstrap<C>
where
	C: ?Sized + HttpTransport,
{
	client: ApiClient<C>,
	outcome: OnceCell<BootstrapOutcome>,
}
impl<C> SessionBootstrap<C>
where
	C: ?Sized + HttpTransport,
{
	/// Creates a bootstrap bound to `client`.
	pub fn new(client: ApiClient<C>) -> Self {
		Self { client, outcome: OnceCell::new() }
	}

	/// Outcome of the first run, if it finished.
	pub fn outcome(&self) -> Option<BootstrapOutcome> {
		self.outcome.get().copied()
	}

	/// Runs the sequence, or returns the outcome of the run that already happened.
	pub async fn run(&self) -> BootstrapOutcome {
		*self.outcome.get_or_init(|| self.restore()).await
	}

	async fn restore(&self) -> BootstrapOutcome {
		let span = FlowSpan::new(FlowKind::Bootstrap, "restore");

		obs::record_flow_outcome(FlowKind::Bootstrap, FlowOutcome::Attempt);

		let outcome = span.instrument(self.decide()).await;

		match outcome {
			BootstrapOutcome::Authenticated { via } => {
				obs::record_flow_outcome(FlowKind::Bootstrap, FlowOutcome::Success);
				tracing::info!(?via, "session restored");
			},
			BootstrapOutcome::LoginRequired => {
				obs::record_flow_outcome(FlowKind::Bootstrap, FlowOutcome::Failure);
				tracing::info!("login required");
			},
		}

		outcome
	}

	async fn decide(&self) -> BootstrapOutcome {
		match self.client.check_auth().await {
			Ok(true) =>
				return BootstrapOutcome::Authenticated { via: SessionSource::ActiveSession },
			Ok(false) => {},
			Err(e) => tracing::warn!(error = %e, "session check failed"),
		}

		let Some(refresh_token) = self.client.vault().get_refresh_token().await else {
			tracing::debug!("no vaulted refresh token");

			return BootstrapOutcome::LoginRequired;
		};

		match self.client.restore_session(refresh_token).await {
			Ok(_) => BootstrapOutcome::Authenticated { via: SessionSource::VaultRestore },
			Err(e) => {
				tracing::warn!(error = %e, "vaulted refresh token was rejected");

				BootstrapOutcome::LoginRequired
			},
		}
	}
}
impl<C> Debug for SessionBootstrap<C>
where
	C: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionBootstrap").field("outcome", &self.outcome()).finish()
	}
}
