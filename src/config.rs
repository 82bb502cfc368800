//! Client configuration: backend location, endpoint paths, and timing knobs.

// std
use std::env;
// self
use crate::{_prelude::*, error::ConfigError};

/// Backend paths the client treats specially.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoints {
	/// Credential login; exempt from refresh-and-replay.
	pub login: String,
	/// Session teardown.
	pub logout: String,
	/// Token refresh; exempt from refresh-and-replay.
	pub refresh: String,
	/// Lightweight authenticated check.
	pub profile: String,
	/// Push subscription registration.
	pub push_subscribe: String,
	/// Push subscription removal.
	pub push_unsubscribe: String,
}
impl Default for Endpoints {
	fn default() -> Self {
		Self {
			login: "/auth/login".into(),
			logout: "/auth/logout".into(),
			refresh: "/auth/refresh".into(),
			profile: "/auth/profile".into(),
			push_subscribe: "/push/subscribe".into(),
			push_unsubscribe: "/push/unsubscribe".into(),
		}
	}
}
impl Endpoints {
	/// Returns `true` for paths whose 401 must never trigger a refresh.
	///
	/// Paths compare the way [`ClientConfig::url_for`] resolves them, so a missing leading slash
	/// or an extra trailing one still names the same endpoint.
	pub fn is_refresh_exempt(&self, path: &str) -> bool {
		let path = normalize_path(path);

		path == normalize_path(&self.login) || path == normalize_path(&self.refresh)
	}

	fn validate(&self) -> Result<(), ConfigError> {
		for (endpoint, path) in [
			("login", &self.login),
			("logout", &self.logout),
			("refresh", &self.refresh),
			("profile", &self.profile),
			("push_subscribe", &self.push_subscribe),
			("push_unsubscribe", &self.push_unsubscribe),
		] {
			if !path.starts_with('/') {
				return Err(ConfigError::InvalidPath { endpoint, path: path.clone() });
			}
		}

		Ok(())
	}
}

/// Validated client configuration.
#[derive(Clone, Debug)]
pub struct ClientConfig {
	/// Backend base URL; request paths are appended to its path.
	pub base_url: Url,
	/// Special endpoint paths.
	pub endpoints: Endpoints,
	/// Application login entry point used for redirects.
	pub login_path: String,
	/// Per-request timeout applied by the transport.
	pub request_timeout: StdDuration,
	/// Upper bound on opening the vault database.
	pub vault_open_timeout: StdDuration,
	/// Lifetime of vaulted records.
	pub vault_ttl: Duration,
	/// Sends and stores cookies so cookie-based sessions are honored.
	pub cookie_session: bool,
	/// Origin component of the vault fingerprint.
	pub app_origin: String,
}
impl ClientConfig {
	/// Environment variable holding the backend base URL.
	pub const ENV_API_URL: &'static str = "MASTER_API_URL";
	/// Environment variable holding the application origin.
	pub const ENV_APP_ORIGIN: &'static str = "MASTER_APP_ORIGIN";
	/// Environment variable holding the request timeout in seconds.
	pub const ENV_REQUEST_TIMEOUT: &'static str = "MASTER_REQUEST_TIMEOUT_SECS";
	/// Environment variable holding the vault open timeout in seconds.
	pub const ENV_VAULT_OPEN_TIMEOUT: &'static str = "MASTER_VAULT_OPEN_TIMEOUT_SECS";

	/// Returns a builder seeded with defaults.
	pub fn builder() -> ClientConfigBuilder {
		ClientConfigBuilder::default()
	}

	/// Builds a configuration from `MASTER_*` environment variables.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|key| env::var(key).ok())
	}

	/// Builds a configuration from an arbitrary variable lookup.
	pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
		let mut builder = Self::builder();

		if let Some(url) = lookup(Self::ENV_API_URL) {
			builder = builder.base_url(url);
		}
		if let Some(origin) = lookup(Self::ENV_APP_ORIGIN) {
			builder = builder.app_origin(origin);
		}
		if let Some(raw) = lookup(Self::ENV_REQUEST_TIMEOUT) {
			builder = builder.request_timeout(parse_secs("request_timeout", &raw)?);
		}
		if let Some(raw) = lookup(Self::ENV_VAULT_OPEN_TIMEOUT) {
			builder = builder.vault_open_timeout(parse_secs("vault_open_timeout", &raw)?);
		}

		builder.build()
	}

	/// Joins `path` (with optional query) onto the base URL, keeping any base path prefix.
	pub fn url_for(&self, path: &str) -> Result<Url, ConfigError> {
		let base = self.base_url.as_str().trim_end_matches('/');
		let joined = if path.starts_with('/') {
			format!("{base}{path}")
		} else {
			format!("{base}/{path}")
		};

		Url::parse(&joined)
			.map_err(|source| ConfigError::InvalidRequestUrl { path: path.to_owned(), source })
	}
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
	base_url: Option<String>,
	endpoints: Endpoints,
	login_path: String,
	request_timeout: StdDuration,
	vault_open_timeout: StdDuration,
	vault_ttl: Duration,
	cookie_session: bool,
	app_origin: Option<String>,
}
impl Default for ClientConfigBuilder {
	fn default() -> Self {
		Self {
			base_url: None,
			endpoints: Endpoints::default(),
			login_path: "/login".into(),
			request_timeout: StdDuration::from_secs(30),
			vault_open_timeout: StdDuration::from_secs(5),
			vault_ttl: Duration::days(90),
			cookie_session: true,
			app_origin: None,
		}
	}
}
impl ClientConfigBuilder {
	/// Sets the backend base URL.
	pub fn base_url(mut self, url: impl Into<String>) -> Self {
		self.base_url = Some(url.into());

		self
	}

	/// Replaces the endpoint paths.
	pub fn endpoints(mut self, endpoints: Endpoints) -> Self {
		self.endpoints = endpoints;

		self
	}

	/// Sets the login entry point used for redirects.
	pub fn login_path(mut self, path: impl Into<String>) -> Self {
		self.login_path = path.into();

		self
	}

	/// Sets the per-request timeout.
	pub fn request_timeout(mut self, timeout: StdDuration) -> Self {
		self.request_timeout = timeout;

		self
	}

	/// Sets the vault database open timeout.
	pub fn vault_open_timeout(mut self, timeout: StdDuration) -> Self {
		self.vault_open_timeout = timeout;

		self
	}

	/// Sets the vault record lifetime.
	pub fn vault_ttl(mut self, ttl: Duration) -> Self {
		self.vault_ttl = ttl;

		self
	}

	/// Toggles cookie handling.
	pub fn cookie_session(mut self, enabled: bool) -> Self {
		self.cookie_session = enabled;

		self
	}

	/// Sets the application origin used for the vault fingerprint (defaults to the API origin).
	pub fn app_origin(mut self, origin: impl Into<String>) -> Self {
		self.app_origin = Some(origin.into());

		self
	}

	/// Validates and produces the configuration.
	pub fn build(self) -> Result<ClientConfig, ConfigError> {
		let raw = self.base_url.ok_or(ConfigError::MissingBaseUrl)?;
		let base_url =
			Url::parse(raw.trim()).map_err(|source| ConfigError::InvalidBaseUrl { source })?;

		if !matches!(base_url.scheme(), "http" | "https") {
			return Err(ConfigError::UnsupportedScheme { url: base_url.to_string() });
		}

		self.endpoints.validate()?;

		if !self.login_path.starts_with('/') {
			return Err(ConfigError::InvalidPath { endpoint: "login_path", path: self.login_path });
		}
		if self.request_timeout.is_zero() {
			return Err(ConfigError::InvalidDuration { setting: "request_timeout" });
		}
		if self.vault_open_timeout.is_zero() {
			return Err(ConfigError::InvalidDuration { setting: "vault_open_timeout" });
		}
		if !self.vault_ttl.is_positive() {
			return Err(ConfigError::InvalidDuration { setting: "vault_ttl" });
		}

		let app_origin =
			self.app_origin.unwrap_or_else(|| base_url.origin().ascii_serialization());

		Ok(ClientConfig {
			base_url,
			endpoints: self.endpoints,
			login_path: self.login_path,
			request_timeout: self.request_timeout,
			vault_open_timeout: self.vault_open_timeout,
			vault_ttl: self.vault_ttl,
			cookie_session: self.cookie_session,
			app_origin,
		})
	}
}

fn parse_secs(setting: &'static str, raw: &str) -> Result<StdDuration, ConfigError> {
	raw.trim()
		.parse::<u64>()
		.ok()
		.filter(|secs| *secs > 0)
		.map(StdDuration::from_secs)
		.ok_or(ConfigError::InvalidDuration { setting })
}

fn normalize_path(path: &str) -> &str {
	path.split(['?', '#']).next().unwrap_or(path).trim_matches('/')
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn url_for_keeps_base_path_prefix() {
		let config = ClientConfig::builder()
			.base_url("https://api.example.com/api/v1/")
			.build()
			.expect("Config with a path prefix should build.");

		assert_eq!(
			config.url_for("/orders?status=new").expect("Order URL should build.").as_str(),
			"https://api.example.com/api/v1/orders?status=new",
		);
		assert_eq!(config.app_origin, "https://api.example.com");
	}

	#[test]
	fn builder_rejects_bad_inputs() {
		assert!(matches!(ClientConfig::builder().build(), Err(ConfigError::MissingBaseUrl)));
		assert!(matches!(
			ClientConfig::builder().base_url("ftp://example.com").build(),
			Err(ConfigError::UnsupportedScheme { .. })
		));
		assert!(matches!(
			ClientConfig::builder().base_url("https://x.example").login_path("login").build(),
			Err(ConfigError::InvalidPath { endpoint: "login_path", .. })
		));
		assert!(matches!(
			ClientConfig::builder()
				.base_url("https://x.example")
				.request_timeout(StdDuration::ZERO)
				.build(),
			Err(ConfigError::InvalidDuration { setting: "request_timeout" })
		));
	}

	#[test]
	fn from_lookup_reads_master_variables() {
		let config = ClientConfig::from_lookup(|key| match key {
			"MASTER_API_URL" => Some("https://api.example.com".into()),
			"MASTER_APP_ORIGIN" => Some("https://lk.example.com".into()),
			"MASTER_VAULT_OPEN_TIMEOUT_SECS" => Some("2".into()),
			_ => None,
		})
		.expect("Environment-derived config should build.");

		assert_eq!(config.app_origin, "https://lk.example.com");
		assert_eq!(config.vault_open_timeout, StdDuration::from_secs(2));
		assert_eq!(config.request_timeout, StdDuration::from_secs(30));

		let err = ClientConfig::from_lookup(|key| match key {
			"MASTER_API_URL" => Some("https://api.example.com".into()),
			"MASTER_REQUEST_TIMEOUT_SECS" => Some("soon".into()),
			_ => None,
		})
		.expect_err("Non-numeric timeouts must be rejected.");

		assert!(matches!(err, ConfigError::InvalidDuration { setting: "request_timeout" }));
	}

	#[test]
	fn only_login_and_refresh_are_exempt() {
		let endpoints = Endpoints::default();

		assert!(endpoints.is_refresh_exempt("/auth/login"));
		assert!(endpoints.is_refresh_exempt("/auth/refresh?source=bootstrap"));
		assert!(!endpoints.is_refresh_exempt("/auth/profile"));
		assert!(!endpoints.is_refresh_exempt("/orders"));
	}

	#[test]
	fn exempt_paths_ignore_surrounding_slashes() {
		let endpoints = Endpoints::default();

		assert!(endpoints.is_refresh_exempt("auth/login"));
		assert!(endpoints.is_refresh_exempt("auth/refresh"));
		assert!(endpoints.is_refresh_exempt("/auth/refresh/"));
		assert!(endpoints.is_refresh_exempt("auth/refresh#retry"));
		assert!(!endpoints.is_refresh_exempt("auth/refresh-tokens"));
		assert!(!endpoints.is_refresh_exempt(""));
	}
}
