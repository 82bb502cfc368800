//! Auth-aware API client.
//!
//! [`ApiClient`] attaches the current access token to every request and hides access-token
//! expiry from callers: a `401` on any non-exempt endpoint parks the request behind a single
//! in-flight refresh (see [`refresh`]) and replays it once with the new token. Page code only
//! ever sees the replayed response, a [`StatusError`](crate::error::StatusError), or
//! [`Error::SessionExpired`] after a terminal refresh failure.

pub mod metrics;
pub mod redirect;
pub mod refresh;
pub mod session;

pub use metrics::RefreshMetrics;
pub use redirect::{LogRedirect, LoginRedirect};
pub use refresh::RefreshPhase;
pub use session::LoginOutcome;

// crates.io
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	auth::{DecodeError, TokenSecret, decode_payload},
	config::ClientConfig,
	error::StatusError,
	http::{HttpTransport, Method, TransportRequest, TransportResponse},
	storage::{KeyValueStore, TokenStorage},
	vault::TokenVault,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

#[cfg(feature = "reqwest")]
/// Client specialized for the crate's default reqwest transport.
pub type ReqwestApiClient = ApiClient<ReqwestTransport>;

/// Whether a `401` on this request may trigger refresh-and-replay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RefreshPolicy {
	/// Refresh and replay once.
	#[default]
	Enabled,
	/// Surface the `401` unchanged.
	Disabled,
}

/// Request as page code describes it: method, relative path, headers, body.
#[derive(Clone, Debug)]
pub struct ApiRequest {
	method: Method,
	path: String,
	headers: Vec<(String, String)>,
	body: Option<Vec<u8>>,
	refresh: RefreshPolicy,
}
impl ApiRequest {
	/// Creates a request for `path` (relative to the configured base URL, query allowed).
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		Self {
			method,
			path: path.into(),
			headers: vec![("accept".into(), "application/json".into())],
			body: None,
			refresh: RefreshPolicy::Enabled,
		}
	}

	/// `GET path`.
	pub fn get(path: impl Into<String>) -> Self {
		Self::new(Method::Get, path)
	}

	/// `POST path`.
	pub fn post(path: impl Into<String>) -> Self {
		Self::new(Method::Post, path)
	}

	/// `PUT path`.
	pub fn put(path: impl Into<String>) -> Self {
		Self::new(Method::Put, path)
	}

	/// `PATCH path`.
	pub fn patch(path: impl Into<String>) -> Self {
		Self::new(Method::Patch, path)
	}

	/// `DELETE path`.
	pub fn delete(path: impl Into<String>) -> Self {
		Self::new(Method::Delete, path)
	}

	/// Adds a header.
	pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push((name.into(), value.into()));

		self
	}

	/// Serializes `body` as the JSON payload.
	pub fn json<B>(mut self, body: &B) -> Result<Self>
	where
		B: ?Sized + Serialize,
	{
		self.body = Some(serde_json::to_vec(body).map_err(Error::Encode)?);
		self.headers.push(("content-type".into(), "application/json".into()));

		Ok(self)
	}

	/// Sets a raw body with an explicit content type.
	pub fn body(mut self, content_type: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
		self.body = Some(body.into());
		self.headers.push(("content-type".into(), content_type.into()));

		self
	}

	/// Opts out of refresh-and-replay.
	pub fn without_refresh(mut self) -> Self {
		self.refresh = RefreshPolicy::Disabled;

		self
	}

	/// Request method.
	pub fn method(&self) -> Method {
		self.method
	}

	/// Request path.
	pub fn path(&self) -> &str {
		&self.path
	}

	/// Refresh policy.
	pub fn refresh_policy(&self) -> RefreshPolicy {
		self.refresh
	}

	fn has_header(&self, name: &str) -> bool {
		self.headers.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
	}
}

/// Successful (`2xx`) response.
#[derive(Clone, Debug)]
pub struct ApiResponse {
	/// Request path that produced the response.
	pub path: String,
	/// HTTP status code.
	pub status: u16,
	/// Header name/value pairs.
	pub headers: Vec<(String, String)>,
	/// Body bytes.
	pub body: Vec<u8>,
}
impl ApiResponse {
	/// Decodes the body as-is.
	pub fn json<T>(&self) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let mut de = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut de).map_err(|source| self.decode_error(source))
	}

	/// Decodes the body, unwrapping a `{ "data": ... }` envelope when present.
	pub fn data<T>(&self) -> Result<T>
	where
		T: DeserializeOwned,
	{
		decode_payload(&self.body).map_err(|source| self.decode_error(source))
	}

	fn decode_error(&self, source: DecodeError) -> Error {
		Error::Decode { path: self.path.clone(), source }
	}
}

/// Authenticated client shared by every page; clones share one session.
pub struct ApiClient<C>
where
	C: ?Sized + HttpTransport,
{
	transport: Arc<C>,
	config: Arc<ClientConfig>,
	storage: TokenStorage,
	vault: TokenVault,
	redirect: Arc<dyn LoginRedirect>,
	session: Arc<refresh::SessionState>,
	metrics: Arc<RefreshMetrics>,
}
impl<C> ApiClient<C>
where
	C: ?Sized + HttpTransport,
{
	/// Creates a client over a caller-provided transport.
	///
	/// The access token persisted in `storage` (if any) becomes the initial bearer token.
	pub fn with_transport(
		config: ClientConfig,
		transport: impl Into<Arc<C>>,
		storage: Arc<dyn KeyValueStore>,
		vault: TokenVault,
	) -> Self {
		let storage = TokenStorage::new(storage);
		let initial = storage.access_token().unwrap_or_else(|e| {
			tracing::warn!(error = %e, "stored access token is unreadable");

			None
		});

		Self {
			transport: transport.into(),
			config: Arc::new(config),
			storage,
			vault,
			redirect: Arc::new(LogRedirect),
			session: Arc::new(refresh::SessionState::new(initial)),
			metrics: Default::default(),
		}
	}

	/// Replaces the hook invoked after a terminal auth failure.
	pub fn with_redirect(mut self, redirect: Arc<dyn LoginRedirect>) -> Self {
		self.redirect = redirect;

		self
	}

	/// Client configuration.
	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	/// Vault shared with this client.
	pub fn vault(&self) -> &TokenVault {
		&self.vault
	}

	/// Ordinary token storage shared with this client.
	pub fn storage(&self) -> &TokenStorage {
		&self.storage
	}

	/// Refresh counters.
	pub fn refresh_metrics(&self) -> &RefreshMetrics {
		&self.metrics
	}

	/// Access token currently attached to requests.
	pub fn access_token(&self) -> Option<TokenSecret> {
		self.session.snapshot().0
	}

	/// `true` while an access token is held.
	pub fn is_authenticated(&self) -> bool {
		self.access_token().is_some()
	}

	/// Current refresh phase.
	pub fn refresh_phase(&self) -> RefreshPhase {
		self.session.phase()
	}

	/// Sends `request`, transparently refreshing and replaying once on `401`.
	///
	/// `2xx` responses are returned; every other final status becomes
	/// [`Error::Status`].
	pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
		let (token, epoch) = self.session.snapshot();
		let response = self.dispatch(&request, token.as_ref()).await?;

		if !self.needs_refresh(&request, &response) {
			return finish(&request, response);
		}

		tracing::debug!(path = %request.path, "access token rejected");

		let fresh = self.fresh_token_after(epoch).await?;

		self.metrics.record_replay();

		let replayed = self.dispatch(&request, Some(&fresh)).await?;

		finish(&request, replayed)
	}

	/// Like [`send`](Self::send), returning [`Error::Cancelled`] once `cancel` fires.
	///
	/// Cancelling never disturbs a refresh this request joined; the refresh settles for every
	/// other waiter regardless.
	pub async fn send_with_cancel(
		&self,
		request: ApiRequest,
		cancel: &CancellationToken,
	) -> Result<ApiResponse> {
		tokio::select! {
			biased;
			_ = cancel.cancelled() => Err(Error::Cancelled),
			result = self.send(request) => result,
		}
	}

	/// `GET path`, decoding the JSON body.
	pub async fn get_json<T>(&self, path: &str) -> Result<T>
	where
		T: DeserializeOwned,
	{
		self.send(ApiRequest::get(path)).await?.json()
	}

	/// `POST path` with a JSON body, decoding the JSON response.
	pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
	where
		B: ?Sized + Serialize,
		T: DeserializeOwned,
	{
		self.send(ApiRequest::post(path).json(body)?).await?.json()
	}

	/// `PUT path` with a JSON body, decoding the JSON response.
	pub async fn put_json<B, T>(&self, path: &str, body: &B) -> Result<T>
	where
		B: ?Sized + Serialize,
		T: DeserializeOwned,
	{
		self.send(ApiRequest::put(path).json(body)?).await?.json()
	}

	/// `PATCH path` with a JSON body, decoding the JSON response.
	pub async fn patch_json<B, T>(&self, path: &str, body: &B) -> Result<T>
	where
		B: ?Sized + Serialize,
		T: DeserializeOwned,
	{
		self.send(ApiRequest::patch(path).json(body)?).await?.json()
	}

	/// `DELETE path`.
	pub async fn delete(&self, path: &str) -> Result<ApiResponse> {
		self.send(ApiRequest::delete(path)).await
	}

	fn needs_refresh(&self, request: &ApiRequest, response: &TransportResponse) -> bool {
		response.status == 401
			&& request.refresh == RefreshPolicy::Enabled
			&& !self.config.endpoints.is_refresh_exempt(&request.path)
	}

	async fn dispatch(
		&self,
		request: &ApiRequest,
		token: Option<&TokenSecret>,
	) -> Result<TransportResponse> {
		let url = self.config.url_for(&request.path)?;
		let mut headers = request.headers.clone();

		if let Some(token) = token
			&& !request.has_header("authorization")
		{
			headers.push(("authorization".into(), token.bearer()));
		}

		let response = self
			.transport
			.execute(TransportRequest {
				method: request.method,
				url,
				path: request.path.clone(),
				headers,
				body: request.body.clone(),
			})
			.await?;

		Ok(response)
	}
}
#[cfg(feature = "reqwest")]
impl ApiClient<ReqwestTransport> {
	/// Creates a client with a reqwest transport built from `config`.
	pub fn new(
		config: ClientConfig,
		storage: Arc<dyn KeyValueStore>,
		vault: TokenVault,
	) -> Result<Self> {
		let transport = ReqwestTransport::from_config(&config)?;

		Ok(Self::with_transport(config, transport, storage, vault))
	}
}
impl<C> Clone for ApiClient<C>
where
	C: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self {
			transport: self.transport.clone(),
			config: self.config.clone(),
			storage: self.storage.clone(),
			vault: self.vault.clone(),
			redirect: self.redirect.clone(),
			session: self.session.clone(),
			metrics: self.metrics.clone(),
		}
	}
}
impl<C> Debug for ApiClient<C>
where
	C: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApiClient")
			.field("base_url", &self.config.base_url.as_str())
			.field("authenticated", &self.is_authenticated())
			.field("refresh_phase", &self.refresh_phase())
			.finish()
	}
}

fn finish(request: &ApiRequest, response: TransportResponse) -> Result<ApiResponse> {
	if response.is_success() {
		Ok(ApiResponse {
			path: request.path.clone(),
			status: response.status,
			headers: response.headers,
			body: response.body,
		})
	} else {
		Err(StatusError::new(&request.path, response.status, &response.body).into())
	}
}
