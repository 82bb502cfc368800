//! Transport primitives for backend calls.
//!
//! [`HttpTransport`] is the client's only dependency on an HTTP stack. It moves bytes and
//! nothing else: no auth headers, no status interpretation, no retries. The auth-aware
//! behavior lives in [`ApiClient`](crate::client::ApiClient), which keeps the transport
//! swappable for tests and for hosts that bring their own HTTP client.

// self
use crate::{_prelude::*, error::TransportError};
#[cfg(feature = "reqwest")] use crate::{config::ClientConfig, error::ConfigError};

/// Boxed future returned by [`HttpTransport::execute`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<TransportResponse, TransportError>> + 'a + Send>>;

/// Byte-level HTTP transport.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Performs one request and returns the raw response, whatever its status.
	fn execute(&self, request: TransportRequest) -> TransportFuture<'_>;
}

/// HTTP methods used against the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
	/// `GET`
	Get,
	/// `POST`
	Post,
	/// `PUT`
	Put,
	/// `PATCH`
	Patch,
	/// `DELETE`
	Delete,
}
impl Method {
	/// Upper-case method token.
	pub const fn as_str(self) -> &'static str {
		match self {
			Method::Get => "GET",
			Method::Post => "POST",
			Method::Put => "PUT",
			Method::Patch => "PATCH",
			Method::Delete => "DELETE",
		}
	}
}
impl Display for Method {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Fully resolved request handed to a transport.
#[derive(Clone, Debug)]
pub struct TransportRequest {
	/// HTTP method.
	pub method: Method,
	/// Absolute URL.
	pub url: Url,
	/// Path the caller asked for, used in errors and logs.
	pub path: String,
	/// Header name/value pairs.
	pub headers: Vec<(String, String)>,
	/// Optional body bytes.
	pub body: Option<Vec<u8>>,
}
impl TransportRequest {
	/// Returns the first header value matching `name` case-insensitively.
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
	}
}

/// Raw response returned by a transport.
#[derive(Clone, Debug, Default)]
pub struct TransportResponse {
	/// HTTP status code.
	pub status: u16,
	/// Header name/value pairs.
	pub headers: Vec<(String, String)>,
	/// Body bytes.
	pub body: Vec<u8>,
}
impl TransportResponse {
	/// Builds a response with a status and body.
	pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
		Self { status, headers: Vec::new(), body: body.into() }
	}

	/// `2xx` check.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}
}

/// [`HttpTransport`] backed by a shared [`ReqwestClient`].
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport(ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest client.
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a client honoring the configured timeout and cookie handling.
	pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder()
			.timeout(config.request_timeout)
			.cookie_store(config.cookie_session)
			.build()?;

		Ok(Self(client))
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	fn execute(&self, request: TransportRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			let TransportRequest { method, url, path, headers, body } = request;
			let method = match method {
				Method::Get => reqwest::Method::GET,
				Method::Post => reqwest::Method::POST,
				Method::Put => reqwest::Method::PUT,
				Method::Patch => reqwest::Method::PATCH,
				Method::Delete => reqwest::Method::DELETE,
			};
			let mut builder = self.0.request(method, url);

			for (name, value) in &headers {
				builder = builder.header(name.as_str(), value.as_str());
			}
			if let Some(body) = body {
				builder = builder.body(body);
			}

			let response = builder.send().await.map_err(|e| map_reqwest_error(&path, e))?;
			let status = response.status().as_u16();
			let headers = response
				.headers()
				.iter()
				.filter_map(|(k, v)| Some((k.as_str().to_owned(), v.to_str().ok()?.to_owned())))
				.collect();
			let body = response.bytes().await.map_err(|e| map_reqwest_error(&path, e))?.to_vec();

			Ok(TransportResponse { status, headers, body })
		})
	}
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(path: &str, e: ReqwestError) -> TransportError {
	if e.is_timeout() {
		TransportError::Timeout { path: path.to_owned() }
	} else {
		TransportError::network(path, e)
	}
}
