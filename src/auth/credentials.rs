//! Login credentials submitted to `POST /auth/login`.

// self
use crate::_prelude::*;

/// Login/password pair for a master account.
#[derive(Clone, Serialize)]
pub struct LoginCredentials {
	/// Account login.
	pub login: String,
	/// Account password; never logged.
	pub password: String,
	/// Asks the backend for a long-lived session cookie alongside the tokens.
	#[serde(skip_serializing_if = "std::ops::Not::not")]
	pub remember: bool,
}
impl LoginCredentials {
	/// Creates credentials without the remember-me flag.
	pub fn new(login: impl Into<String>, password: impl Into<String>) -> Self {
		Self { login: login.into(), password: password.into(), remember: false }
	}

	/// Requests a persistent session.
	pub fn remember(mut self) -> Self {
		self.remember = true;

		self
	}
}
impl Debug for LoginCredentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LoginCredentials")
			.field("login", &self.login)
			.field("password", &"<redacted>")
			.field("remember", &self.remember)
			.finish()
	}
}
