//! Session-level error types shared across the client, storage, vault, and bootstrap layers.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Ordinary token storage failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::storage::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS, timeouts).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Backend answered with a non-success status that the client does not recover from.
	#[error(transparent)]
	Status(#[from] StatusError),
	/// Session could not be continued; tokens were cleared and the login entry point notified.
	#[error("Session expired: {0}")]
	SessionExpired(#[from] RefreshFailure),
	/// Backend returned a payload that could not be decoded.
	#[error("Response from {path} could not be decoded.")]
	Decode {
		/// Request path that produced the payload.
		path: String,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Request body could not be encoded.
	#[error("Request body could not be encoded.")]
	Encode(#[source] serde_json::Error),
	/// Caller cancelled the request before it completed.
	#[error("Request was cancelled.")]
	Cancelled,
	/// Push notifications are not available in the current environment.
	#[error("Push notifications are unavailable: {reason}.")]
	PushUnavailable {
		/// Capability that was missing.
		reason: PushUnavailable,
	},
}
impl Error {
	/// Returns the HTTP status carried by the error, if any.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Status(err) => Some(err.status),
			Self::SessionExpired(failure) => failure.status(),
			_ => None,
		}
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Base URL is missing.
	#[error("API base URL is not configured.")]
	MissingBaseUrl,
	/// Base URL could not be parsed.
	#[error("API base URL is invalid.")]
	InvalidBaseUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Base URL uses an unsupported scheme.
	#[error("API base URL must use http or https: {url}.")]
	UnsupportedScheme {
		/// URL that failed validation.
		url: String,
	},
	/// An endpoint path does not start with `/`.
	#[error("The {endpoint} path must start with '/': {path}.")]
	InvalidPath {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Offending path.
		path: String,
	},
	/// A duration setting is zero or malformed.
	#[error("The {setting} setting must be a positive number of seconds.")]
	InvalidDuration {
		/// Setting name.
		setting: &'static str,
	},
	/// Request URL could not be built from the base URL and path.
	#[error("Request URL for {path} is invalid.")]
	InvalidRequestUrl {
		/// Path that was joined onto the base URL.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling {path}.")]
	Network {
		/// Request path.
		path: String,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Request exceeded the configured timeout.
	#[error("Request to {path} timed out.")]
	Timeout {
		/// Request path.
		path: String,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred during transport.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(path: impl Into<String>, src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { path: path.into(), source: Box::new(src) }
	}
}

/// Non-success HTTP response surfaced to the caller unchanged.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Request to {path} failed with status {status}.")]
pub struct StatusError {
	/// Request path.
	pub path: String,
	/// HTTP status code.
	pub status: u16,
	/// Response body preview.
	pub body: String,
}
impl StatusError {
	const BODY_PREVIEW_LIMIT: usize = 512;

	/// Builds a status error, truncating the body preview.
	pub fn new(path: impl Into<String>, status: u16, body: &[u8]) -> Self {
		let mut body = String::from_utf8_lossy(body).into_owned();

		if body.len() > Self::BODY_PREVIEW_LIMIT {
			let mut cut = Self::BODY_PREVIEW_LIMIT;

			while !body.is_char_boundary(cut) {
				cut -= 1;
			}

			body.truncate(cut);
		}

		Self { path: path.into(), status, body }
	}

	/// Returns `true` for `401 Unauthorized`.
	pub fn is_unauthorized(&self) -> bool {
		self.status == 401
	}
}

/// Terminal refresh outcome shared with every request queued behind a refresh.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum RefreshFailure {
	/// Neither ordinary storage nor the vault held a refresh token.
	#[error("no refresh token is available")]
	MissingRefreshToken,
	/// Refresh endpoint rejected the refresh token.
	#[error("refresh endpoint answered with status {status}")]
	Rejected {
		/// HTTP status code.
		status: u16,
		/// Response body preview.
		body: String,
	},
	/// Refresh call failed before a response arrived.
	#[error("refresh request failed: {message}")]
	Network {
		/// Transport failure summary.
		message: String,
	},
	/// Refresh endpoint answered with an unusable payload.
	#[error("refresh response is malformed: {message}")]
	MalformedResponse {
		/// Parsing failure summary.
		message: String,
	},
	/// Local token state was cleared (logout) while the request was in flight.
	#[error("session was closed")]
	LoggedOut,
}
impl RefreshFailure {
	/// Returns the HTTP status attached to a rejection.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Rejected { status, .. } => Some(*status),
			_ => None,
		}
	}
}

/// Reason push notifications cannot be enabled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PushUnavailable {
	/// Environment lacks push support entirely.
	Unsupported,
	/// Environment supports push only after the app is installed to the home screen.
	InstallRequired,
}
impl Display for PushUnavailable {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Unsupported => f.write_str("push is not supported on this platform"),
			Self::InstallRequired =>
				f.write_str("the app must be installed to the home screen to receive push"),
		}
	}
}
