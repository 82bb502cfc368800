//! PBKDF2-HMAC-SHA256 key derivation and AES-256-GCM sealing of refresh tokens.

// crates.io
use aes_gcm::{
	Aes256Gcm, Key, Nonce,
	aead::{Aead, KeyInit},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use rand::RngCore;
use sha2::Sha256;
// self
use crate::{
	_prelude::*,
	vault::{DeviceFingerprint, EncryptedTokenRecord, VaultError, record},
};

/// Minimum PBKDF2 work factor.
pub const PBKDF2_ITERATIONS: u32 = 100_000;
/// Salt length in bytes.
pub const SALT_LEN: usize = 16;
/// AES-GCM nonce length in bytes.
pub const IV_LEN: usize = 12;

const KEY_LEN: usize = 32;

/// Seals and opens [`EncryptedTokenRecord`]s; holds no key material between calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VaultCipher {
	iterations: u32,
}
impl VaultCipher {
	/// Cipher with the default work factor.
	pub const fn new() -> Self {
		Self { iterations: PBKDF2_ITERATIONS }
	}

	/// Raises the work factor; values below [`PBKDF2_ITERATIONS`] are clamped up.
	pub fn with_iterations(iterations: u32) -> Self {
		Self { iterations: iterations.max(PBKDF2_ITERATIONS) }
	}

	/// Work factor in use.
	pub fn iterations(&self) -> u32 {
		self.iterations
	}

	/// Encrypts `plaintext` under a key derived from `fingerprint` and a fresh salt.
	///
	/// Every call draws a new salt and IV, so sealing the same token twice yields unrelated
	/// records.
	pub fn seal(
		&self,
		plaintext: &str,
		fingerprint: &DeviceFingerprint,
		expires_at: OffsetDateTime,
	) -> Result<EncryptedTokenRecord, VaultError> {
		let mut salt = [0_u8; SALT_LEN];
		let mut iv = [0_u8; IV_LEN];
		let mut rng = rand::rng();

		rng.fill_bytes(&mut salt);
		rng.fill_bytes(&mut iv);

		let cipher = self.cipher(fingerprint, &salt);
		let ciphertext = cipher
			.encrypt(Nonce::from_slice(&iv), plaintext.as_bytes())
			.map_err(|_| VaultError::Crypto { message: "AES-GCM encryption failed".into() })?;

		Ok(EncryptedTokenRecord {
			ciphertext: STANDARD.encode(ciphertext),
			iv: STANDARD.encode(iv),
			salt: STANDARD.encode(salt),
			expires_at: record::unix_millis(expires_at),
		})
	}

	/// Re-derives the key from `fingerprint` and the stored salt, then decrypts.
	pub fn open(
		&self,
		record: &EncryptedTokenRecord,
		fingerprint: &DeviceFingerprint,
	) -> Result<String, VaultError> {
		let salt = decode_field("salt", &record.salt)?;
		let iv = decode_field("iv", &record.iv)?;
		let ciphertext = decode_field("ciphertext", &record.ciphertext)?;

		if iv.len() != IV_LEN {
			return Err(VaultError::Corrupt { message: format!("iv has {} bytes", iv.len()) });
		}

		let cipher = self.cipher(fingerprint, &salt);
		let plaintext = cipher.decrypt(Nonce::from_slice(&iv), ciphertext.as_slice()).map_err(|_| {
			VaultError::Crypto {
				message: "AES-GCM authentication failed (fingerprint changed or record corrupt)"
					.into(),
			}
		})?;

		String::from_utf8(plaintext)
			.map_err(|_| VaultError::Corrupt { message: "plaintext is not UTF-8".into() })
	}

	fn cipher(&self, fingerprint: &DeviceFingerprint, salt: &[u8]) -> Aes256Gcm {
		let mut key = [0_u8; KEY_LEN];

		pbkdf2::pbkdf2_hmac::<Sha256>(
			fingerprint.material().as_bytes(),
			salt,
			self.iterations,
			&mut key,
		);

		let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));

		key.fill(0);

		cipher
	}
}
impl Default for VaultCipher {
	fn default() -> Self {
		Self::new()
	}
}

fn decode_field(field: &'static str, value: &str) -> Result<Vec<u8>, VaultError> {
	STANDARD
		.decode(value)
		.map_err(|e| VaultError::Corrupt { message: format!("{field} is not base64: {e}") })
}
