//! Token pairs issued by the login and refresh endpoints.

// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{_prelude::*, auth::TokenSecret};

/// Access/refresh pair returned by `POST /auth/login` and `POST /auth/refresh`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
	/// Short-lived bearer credential.
	pub access_token: TokenSecret,
	/// Long-lived refresh credential; absent when the backend does not rotate it.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub refresh_token: Option<TokenSecret>,
}
impl TokenPair {
	/// Builds a pair from raw strings.
	pub fn new(access: impl Into<String>, refresh: Option<impl Into<String>>) -> Self {
		Self {
			access_token: TokenSecret::new(access),
			refresh_token: refresh.map(TokenSecret::new),
		}
	}

	/// Keeps `previous` as the refresh token when the backend did not issue a new one.
	pub fn or_refresh(mut self, previous: TokenSecret) -> Self {
		if self.refresh_token.is_none() {
			self.refresh_token = Some(previous);
		}

		self
	}
}

/// Path-aware JSON decoding failure.
pub type DecodeError = serde_path_to_error::Error<serde_json::Error>;

/// Decodes a backend payload, unwrapping the optional `{ "data": ... }` envelope.
///
/// The envelope is peeled first so the path-aware decoder only sees the inner value and
/// reports the offending field on failure.
pub fn decode_payload<T>(body: &[u8]) -> Result<T, DecodeError>
where
	T: DeserializeOwned,
{
	let raw: serde_json::Value = {
		let mut de = serde_json::Deserializer::from_slice(body);

		serde_path_to_error::deserialize(&mut de)?
	};

	serde_path_to_error::deserialize(peel_envelope(raw))
}

fn peel_envelope(raw: serde_json::Value) -> serde_json::Value {
	match raw {
		serde_json::Value::Object(mut map)
			if map.contains_key("data") && !map.contains_key("accessToken") =>
			map.remove("data").unwrap_or(serde_json::Value::Null),
		other => other,
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn decodes_bare_and_wrapped_pairs() {
		let bare: TokenPair = decode_payload(br#"{"accessToken":"a1","refreshToken":"r1"}"#)
			.expect("Bare token pair should decode.");
		let wrapped: TokenPair =
			decode_payload(br#"{"success":true,"data":{"accessToken":"a2","refreshToken":"r2"}}"#)
				.expect("Wrapped token pair should decode.");

		assert_eq!(bare, TokenPair::new("a1", Some("r1")));
		assert_eq!(wrapped, TokenPair::new("a2", Some("r2")));
	}

	#[test]
	fn missing_access_token_reports_path() {
		let err = decode_payload::<TokenPair>(br#"{"data":{"refreshToken":"r"}}"#)
			.expect_err("Payload without an access token must be rejected.");

		assert!(err.to_string().contains("accessToken"));
	}

	#[test]
	fn keeps_previous_refresh_when_not_rotated() {
		let pair = TokenPair::new("a", None::<String>).or_refresh(TokenSecret::new("old"));

		assert_eq!(pair.refresh_token.as_ref().map(TokenSecret::expose), Some("old"));
	}
}
