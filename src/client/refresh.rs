//! Single-flight access-token refresh.
//!
//! The session moves between two phases. In [`RefreshPhase::Idle`] the first request that
//! receives a `401` flips the phase to [`RefreshPhase::Refreshing`] and starts one refresh;
//! every later `401` parks on a oneshot channel instead of starting its own. When the refresh
//! settles, the phase returns to idle and every parked request receives the same outcome, in
//! arrival order.
//!
//! Each settlement bumps an epoch. A request remembers the epoch it was sent under, so a `401`
//! that arrives after a refresh already completed reuses that refresh's outcome instead of
//! issuing another one.
//!
//! The refresh itself runs on a spawned task. A caller that gives up (timeout, cancellation)
//! only drops its own receiver; the refresh still settles for everyone else.

// crates.io
use tokio::sync::oneshot;
// self
use crate::{
	_prelude::*,
	auth::{TokenPair, TokenSecret, decode_payload},
	client::ApiClient,
	error::{RefreshFailure, StatusError},
	http::{HttpTransport, Method, TransportRequest},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

type RefreshOutcome = Result<TokenSecret, RefreshFailure>;

/// Refresh state observed by the client.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RefreshPhase {
	/// No refresh in flight.
	#[default]
	Idle,
	/// One refresh is in flight; new `401`s wait for it.
	Refreshing,
}

/// What a failed refresh does besides clearing tokens.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum OnFailure {
	/// Notify the login redirect hook.
	Redirect,
	/// Stay quiet; the caller decides what to show.
	Silent,
}

/// Where a `401` stands relative to the refresh cycle.
enum Ticket {
	/// A refresh settled after the request was sent; reuse its outcome.
	Settled(RefreshOutcome),
	/// A refresh is in flight; wait for it.
	Waiting(oneshot::Receiver<RefreshOutcome>),
	/// No refresh in flight; the caller must start one and then wait.
	Lead(oneshot::Receiver<RefreshOutcome>),
}

#[derive(Debug, Default)]
struct SessionInner {
	access_token: Option<TokenSecret>,
	phase: RefreshPhase,
	queue: Vec<oneshot::Sender<RefreshOutcome>>,
	epoch: u64,
	last: Option<RefreshOutcome>,
}

/// Access token plus refresh bookkeeping, guarded by one lock.
#[derive(Debug)]
pub(crate) struct SessionState(Mutex<SessionInner>);
impl SessionState {
	pub(crate) fn new(access_token: Option<TokenSecret>) -> Self {
		Self(Mutex::new(SessionInner { access_token, ..Default::default() }))
	}

	/// Current token and the epoch it belongs to.
	pub(crate) fn snapshot(&self) -> (Option<TokenSecret>, u64) {
		let inner = self.0.lock();

		(inner.access_token.clone(), inner.epoch)
	}

	pub(crate) fn phase(&self) -> RefreshPhase {
		self.0.lock().phase
	}

	/// Installs a token obtained outside the refresh cycle (login).
	pub(crate) fn install(&self, token: TokenSecret) {
		let mut inner = self.0.lock();

		inner.access_token = Some(token.clone());
		inner.epoch += 1;
		inner.last = Some(Ok(token));
	}

	/// Forgets the session (logout); late `401`s from before this point fail immediately.
	pub(crate) fn reset(&self) {
		let mut inner = self.0.lock();

		inner.access_token = None;
		inner.epoch += 1;
		inner.last = Some(Err(RefreshFailure::LoggedOut));
	}

	fn ticket(&self, sent_epoch: Option<u64>) -> Ticket {
		let mut inner = self.0.lock();
		let (tx, rx) = oneshot::channel();

		if inner.phase == RefreshPhase::Refreshing {
			inner.queue.push(tx);

			return Ticket::Waiting(rx);
		}
		if let (Some(epoch), Some(last)) = (sent_epoch, &inner.last)
			&& epoch != inner.epoch
		{
			return Ticket::Settled(last.clone());
		}

		inner.phase = RefreshPhase::Refreshing;
		inner.queue.push(tx);

		Ticket::Lead(rx)
	}

	/// Publishes `outcome`, returns to idle, and hands the queue back for delivery.
	fn settle(&self, outcome: &RefreshOutcome) -> Vec<oneshot::Sender<RefreshOutcome>> {
		let mut inner = self.0.lock();

		inner.access_token = outcome.as_ref().ok().cloned();
		inner.phase = RefreshPhase::Idle;
		inner.epoch += 1;
		inner.last = Some(outcome.clone());

		std::mem::take(&mut inner.queue)
	}
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshBody<'a> {
	refresh_token: &'a str,
}

impl<C> ApiClient<C>
where
	C: ?Sized + HttpTransport,
{
	/// Refreshes the access token now, joining a refresh already in flight.
	///
	/// A failure clears every stored token and notifies the login redirect hook.
	pub async fn refresh_session(&self) -> Result<TokenSecret> {
		self.join_refresh(None, None, OnFailure::Redirect).await
	}

	/// Exchanges an explicit refresh token (typically from the vault) for a session.
	///
	/// Unlike [`refresh_session`](Self::refresh_session), a failure does not redirect.
	pub async fn restore_session(&self, refresh_token: TokenSecret) -> Result<TokenSecret> {
		self.join_refresh(None, Some(refresh_token), OnFailure::Silent).await
	}

	/// Waits for an access token newer than the one sent under `sent_epoch`.
	pub(crate) async fn fresh_token_after(&self, sent_epoch: u64) -> Result<TokenSecret> {
		self.join_refresh(Some(sent_epoch), None, OnFailure::Redirect).await
	}

	async fn join_refresh(
		&self,
		sent_epoch: Option<u64>,
		explicit: Option<TokenSecret>,
		on_failure: OnFailure,
	) -> Result<TokenSecret> {
		let rx = match self.session.ticket(sent_epoch) {
			Ticket::Settled(outcome) => return outcome.map_err(Error::from),
			Ticket::Waiting(rx) => {
				self.metrics.record_queued();
				tracing::debug!("waiting for in-flight refresh");

				rx
			},
			Ticket::Lead(rx) => {
				self.spawn_refresh(explicit, on_failure);

				rx
			},
		};

		match rx.await {
			Ok(outcome) => outcome.map_err(Error::from),
			Err(_) => Err(RefreshFailure::Network { message: "refresh task was dropped".into() }
				.into()),
		}
	}

	fn spawn_refresh(&self, explicit: Option<TokenSecret>, on_failure: OnFailure) {
		let client = self.clone();
		let span = FlowSpan::new(FlowKind::Refresh, "refresh_access_token");

		tokio::spawn(span.instrument(async move { client.run_refresh(explicit, on_failure).await }));
	}

	async fn run_refresh(&self, explicit: Option<TokenSecret>, on_failure: OnFailure) {
		obs::record_flow_outcome(FlowKind::Refresh, FlowOutcome::Attempt);

		let outcome = match self.exchange_refresh_token(explicit).await {
			Ok(pair) => {
				self.persist_pair(&pair).await;
				self.metrics.record_success();
				obs::record_flow_outcome(FlowKind::Refresh, FlowOutcome::Success);

				Ok(pair.access_token)
			},
			Err(failure) => {
				tracing::warn!(error = %failure, "refresh failed; clearing session");

				self.clear_local_tokens().await;
				self.metrics.record_failure();
				obs::record_flow_outcome(FlowKind::Refresh, FlowOutcome::Failure);

				if on_failure == OnFailure::Redirect {
					self.redirect.redirect_to_login(&self.config.login_path);
				}

				Err(failure)
			},
		};
		let waiters = self.session.settle(&outcome);

		tracing::debug!(waiters = waiters.len(), ok = outcome.is_ok(), "refresh settled");

		for waiter in waiters {
			let _ = waiter.send(outcome.clone());
		}
	}

	async fn exchange_refresh_token(
		&self,
		explicit: Option<TokenSecret>,
	) -> Result<TokenPair, RefreshFailure> {
		let refresh_token = match explicit {
			Some(token) => token,
			None => self.current_refresh_token().await.ok_or(RefreshFailure::MissingRefreshToken)?,
		};

		if refresh_token.expose().is_empty() {
			return Err(RefreshFailure::MissingRefreshToken);
		}

		self.metrics.record_attempt();

		let path = self.config.endpoints.refresh.clone();
		let url = self
			.config
			.url_for(&path)
			.map_err(|e| RefreshFailure::Network { message: e.to_string() })?;
		let body = serde_json::to_vec(&RefreshBody { refresh_token: refresh_token.expose() })
			.map_err(|e| RefreshFailure::MalformedResponse { message: e.to_string() })?;
		let response = self
			.transport
			.execute(TransportRequest {
				method: Method::Post,
				url,
				path: path.clone(),
				headers: vec![
					("accept".into(), "application/json".into()),
					("content-type".into(), "application/json".into()),
				],
				body: Some(body),
			})
			.await
			.map_err(|e| RefreshFailure::Network { message: e.to_string() })?;

		if !response.is_success() {
			let preview = StatusError::new(&path, response.status, &response.body);

			return Err(RefreshFailure::Rejected { status: preview.status, body: preview.body });
		}

		let pair: TokenPair = decode_payload(&response.body)
			.map_err(|e| RefreshFailure::MalformedResponse { message: e.to_string() })?;

		if pair.access_token.expose().is_empty() {
			return Err(RefreshFailure::MalformedResponse {
				message: "access token is empty".into(),
			});
		}

		Ok(pair.or_refresh(refresh_token))
	}

	/// Refresh token from ordinary storage, falling back to the vault.
	async fn current_refresh_token(&self) -> Option<TokenSecret> {
		match self.storage.refresh_token() {
			Ok(Some(token)) => return Some(token),
			Ok(None) => {},
			Err(e) => tracing::warn!(error = %e, "stored refresh token is unreadable"),
		}

		tracing::debug!("no stored refresh token; consulting vault");

		self.vault.get_refresh_token().await
	}

	/// Writes `pair` to storage and vaults its refresh token; returns whether it was vaulted.
	pub(crate) async fn persist_pair(&self, pair: &TokenPair) -> bool {
		if let Err(e) = self.storage.store_pair(pair) {
			tracing::warn!(error = %e, "token pair was not persisted");
		}

		match &pair.refresh_token {
			Some(refresh) => self.vault.save_refresh_token(refresh).await,
			None => false,
		}
	}

	pub(crate) async fn clear_local_tokens(&self) {
		if let Err(e) = self.storage.clear() {
			tracing::warn!(error = %e, "stored tokens were not cleared");
		}

		self.vault.clear_refresh_token().await;
	}
}
