//! Sealed refresh-token record as stored in the vault database.

// self
use crate::_prelude::*;

/// `{ ciphertext, iv, salt, expiresAt }`, binary fields in standard base64.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedTokenRecord {
	/// AES-GCM output (ciphertext plus tag).
	pub ciphertext: String,
	/// 12-byte nonce.
	pub iv: String,
	/// 16-byte PBKDF2 salt.
	pub salt: String,
	/// Expiry as Unix milliseconds.
	pub expires_at: i64,
}
impl EncryptedTokenRecord {
	/// Returns `true` once `instant` is past the expiry.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		unix_millis(instant) > self.expires_at
	}

	/// Expiry as an instant, if representable.
	pub fn expires_at(&self) -> Option<OffsetDateTime> {
		OffsetDateTime::from_unix_timestamp_nanos(i128::from(self.expires_at) * 1_000_000).ok()
	}
}
impl Debug for EncryptedTokenRecord {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("EncryptedTokenRecord")
			.field("ciphertext_len", &self.ciphertext.len())
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Milliseconds since the Unix epoch, saturating at the `i64` range.
pub fn unix_millis(instant: OffsetDateTime) -> i64 {
	let millis = instant.unix_timestamp_nanos() / 1_000_000;

	i64::try_from(millis).unwrap_or(if millis.is_negative() { i64::MIN } else { i64::MAX })
}
