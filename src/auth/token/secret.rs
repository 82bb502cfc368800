//! Token wrapper that keeps bearer material out of logs.

// self
use crate::_prelude::*;

/// Access or refresh token; `Debug` and `Display` never print the value.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps a token string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Wraps a stored value, treating blank strings as absent.
	pub fn non_empty(value: impl Into<String>) -> Option<Self> {
		let value = value.into();

		if value.trim().is_empty() { None } else { Some(Self(value)) }
	}

	/// Returns the raw token. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Formats the value of an `Authorization` header.
	pub fn bearer(&self) -> String {
		format!("Bearer {}", self.0)
	}
}
impl AsRef<str> for TokenSecret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("TokenSecret").field(&"<redacted>").finish()
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn formatters_redact_token() {
		let secret = TokenSecret::new("eyJhbGciOi");

		assert_eq!(format!("{secret:?}"), "TokenSecret(\"<redacted>\")");
		assert_eq!(format!("{secret}"), "<redacted>");
		assert_eq!(secret.bearer(), "Bearer eyJhbGciOi");
	}

	#[test]
	fn blank_values_are_absent() {
		assert!(TokenSecret::non_empty("").is_none());
		assert!(TokenSecret::non_empty("   ").is_none());
		assert_eq!(TokenSecret::non_empty("abc").map(|s| s.expose().to_owned()), Some("abc".into()));
	}
}
