//! Encrypted at-rest backup of the refresh token.
//!
//! The vault keeps a second copy of the refresh token that survives eviction of ordinary
//! storage (installed web-apps on iOS lose local storage under pressure). Every public
//! operation degrades to "no token" instead of failing: callers receive an [`Option`] or a
//! `bool`, and the underlying [`VaultError`] is logged and dropped at this boundary.

pub mod cipher;
pub mod database;
pub mod fingerprint;
pub mod record;

pub use cipher::VaultCipher;
pub use database::{FileVaultDatabase, MemoryVaultDatabase, VaultDatabase};
pub use fingerprint::DeviceFingerprint;
pub use record::EncryptedTokenRecord;

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	config::ClientConfig,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	storage::StoreError,
};

/// Failures inside the vault; never escape the public [`TokenVault`] API.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum VaultError {
	/// Opening the database did not finish in time.
	#[error("Vault database did not open within {0:?}.")]
	OpenTimeout(StdDuration),
	/// Operation attempted before the database was opened.
	#[error("Vault database is not open.")]
	NotOpen,
	/// Backend-level failure.
	#[error("Vault backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
	/// Stored record is malformed.
	#[error("Vault record is corrupt: {message}.")]
	Corrupt {
		/// Human-readable error payload.
		message: String,
	},
	/// Key derivation or AEAD failure.
	#[error("Vault crypto failure: {message}.")]
	Crypto {
		/// Human-readable error payload.
		message: String,
	},
}
impl From<StoreError> for VaultError {
	fn from(e: StoreError) -> Self {
		match e {
			StoreError::Serialization { message } => Self::Corrupt { message },
			StoreError::Backend { message } => Self::Backend { message },
		}
	}
}

/// Durable, encrypted store for the refresh token.
#[derive(Clone)]
pub struct TokenVault {
	database: Arc<dyn VaultDatabase>,
	fingerprint: DeviceFingerprint,
	cipher: VaultCipher,
	ttl: Duration,
	open_timeout: StdDuration,
}
impl TokenVault {
	/// Records expire this long after they are written.
	pub const DEFAULT_TTL: Duration = Duration::days(90);
	/// Upper bound on how long opening the database may take.
	pub const DEFAULT_OPEN_TIMEOUT: StdDuration = StdDuration::from_secs(5);

	/// Creates a vault over `database` keyed by `fingerprint`.
	pub fn new(database: Arc<dyn VaultDatabase>, fingerprint: DeviceFingerprint) -> Self {
		Self {
			database,
			fingerprint,
			cipher: VaultCipher::new(),
			ttl: Self::DEFAULT_TTL,
			open_timeout: Self::DEFAULT_OPEN_TIMEOUT,
		}
	}

	/// Creates a vault using the TTL and open timeout from `config`.
	pub fn from_config(
		database: Arc<dyn VaultDatabase>,
		fingerprint: DeviceFingerprint,
		config: &ClientConfig,
	) -> Self {
		Self::new(database, fingerprint)
			.with_ttl(config.vault_ttl)
			.with_open_timeout(config.vault_open_timeout)
	}

	/// Overrides the record lifetime.
	pub fn with_ttl(mut self, ttl: Duration) -> Self {
		self.ttl = ttl;

		self
	}

	/// Overrides the database open timeout.
	pub fn with_open_timeout(mut self, timeout: StdDuration) -> Self {
		self.open_timeout = timeout;

		self
	}

	/// Overrides the cipher (work factor).
	pub fn with_cipher(mut self, cipher: VaultCipher) -> Self {
		self.cipher = cipher;

		self
	}

	/// Seals `token` and overwrites the stored record. Returns whether the record was written.
	pub async fn save_refresh_token(&self, token: &TokenSecret) -> bool {
		let span = FlowSpan::new(FlowKind::Vault, "save_refresh_token");

		match span.instrument(self.try_save(token)).await {
			Ok(()) => {
				obs::record_flow_outcome(FlowKind::Vault, FlowOutcome::Success);

				true
			},
			Err(e) => {
				obs::record_flow_outcome(FlowKind::Vault, FlowOutcome::Failure);
				tracing::warn!(error = %e, "refresh token was not vaulted");

				false
			},
		}
	}

	/// Returns the vaulted refresh token unless it is missing, expired, or undecryptable.
	pub async fn get_refresh_token(&self) -> Option<TokenSecret> {
		let span = FlowSpan::new(FlowKind::Vault, "get_refresh_token");

		match span.instrument(self.try_get(OffsetDateTime::now_utc())).await {
			Ok(token) => token,
			Err(e) => {
				obs::record_flow_outcome(FlowKind::Vault, FlowOutcome::Failure);
				tracing::warn!(error = %e, "vaulted refresh token is unavailable");

				None
			},
		}
	}

	/// Deletes the stored record. Returns whether the delete went through.
	pub async fn clear_refresh_token(&self) -> bool {
		match self.try_clear().await {
			Ok(()) => true,
			Err(e) => {
				tracing::warn!(error = %e, "vaulted refresh token could not be cleared");

				false
			},
		}
	}

	/// Convenience check for a usable vaulted token.
	pub async fn has_refresh_token(&self) -> bool {
		self.get_refresh_token().await.is_some()
	}

	async fn open(&self) -> Result<(), VaultError> {
		tokio::time::timeout(self.open_timeout, self.database.open())
			.await
			.map_err(|_| VaultError::OpenTimeout(self.open_timeout))?
	}

	async fn try_save(&self, token: &TokenSecret) -> Result<(), VaultError> {
		let expires_at = OffsetDateTime::now_utc() + self.ttl;
		let (cipher, fingerprint, plaintext) =
			(self.cipher, self.fingerprint.clone(), token.expose().to_owned());
		let record =
			off_executor(move || cipher.seal(&plaintext, &fingerprint, expires_at)).await?;

		self.open().await?;
		self.database.put(database::RECORD_KEY, record).await
	}

	async fn try_get(&self, now: OffsetDateTime) -> Result<Option<TokenSecret>, VaultError> {
		self.open().await?;

		let Some(record) = self.database.get(database::RECORD_KEY).await? else {
			return Ok(None);
		};

		if record.is_expired_at(now) {
			tracing::debug!(expires_at = record.expires_at, "vaulted refresh token expired");

			return Ok(None);
		}

		let (cipher, fingerprint) = (self.cipher, self.fingerprint.clone());
		let token = off_executor(move || cipher.open(&record, &fingerprint)).await?;

		Ok(TokenSecret::non_empty(token))
	}

	async fn try_clear(&self) -> Result<(), VaultError> {
		self.open().await?;
		self.database.delete(database::RECORD_KEY).await
	}
}
impl Debug for TokenVault {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenVault")
			.field("fingerprint", &self.fingerprint)
			.field("ttl", &self.ttl)
			.field("open_timeout", &self.open_timeout)
			.finish()
	}
}

/// Runs key derivation and AEAD work on the blocking pool.
async fn off_executor<T>(
	work: impl 'static + Send + FnOnce() -> Result<T, VaultError>,
) -> Result<T, VaultError>
where
	T: 'static + Send,
{
	tokio::task::spawn_blocking(work)
		.await
		.map_err(|e| VaultError::Crypto { message: format!("Vault crypto task failed: {e}") })?
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	struct WedgedDatabase;
	impl VaultDatabase for WedgedDatabase {
		fn open(&self) -> database::VaultFuture<'_, ()> {
			Box::pin(std::future::pending())
		}

		fn get<'a>(
			&'a self,
			_key: &'a str,
		) -> database::VaultFuture<'a, Option<EncryptedTokenRecord>> {
			Box::pin(async { Err(VaultError::NotOpen) })
		}

		fn put<'a>(
			&'a self,
			_key: &'a str,
			_record: EncryptedTokenRecord,
		) -> database::VaultFuture<'a, ()> {
			Box::pin(async { Err(VaultError::NotOpen) })
		}

		fn delete<'a>(&'a self, _key: &'a str) -> database::VaultFuture<'a, ()> {
			Box::pin(async { Err(VaultError::NotOpen) })
		}
	}

	fn fingerprint() -> DeviceFingerprint {
		DeviceFingerprint::new("https://lk.example", "ru-RU", "Europe/Moscow")
	}

	#[tokio::test(start_paused = true)]
	async fn wedged_database_times_out_to_absent() {
		let vault = TokenVault::new(Arc::new(WedgedDatabase), fingerprint());

		assert_eq!(vault.get_refresh_token().await, None);
		assert!(!vault.save_refresh_token(&TokenSecret::new("refresh")).await);
		assert!(!vault.clear_refresh_token().await);
	}

	#[tokio::test]
	async fn expired_record_is_absent_before_decryption() {
		let db = Arc::new(MemoryVaultDatabase::default());
		let vault = TokenVault::new(db.clone(), fingerprint());
		let past = OffsetDateTime::now_utc() - Duration::minutes(1);
		let record = VaultCipher::new()
			.seal("refresh-stale", &fingerprint(), past)
			.expect("Sealing should succeed.");

		db.insert_record(database::RECORD_KEY, record.clone());

		assert_eq!(
			vault.try_get(OffsetDateTime::now_utc()).await.expect("Expired records are not errors."),
			None,
		);
		assert_eq!(
			vault
				.try_get(past - Duration::seconds(1))
				.await
				.expect("Unexpired record should decrypt.")
				.map(|t| t.expose().to_owned()),
			Some("refresh-stale".into()),
		);
	}

	#[tokio::test]
	async fn sealing_leaves_the_executor_free() {
		let vault = TokenVault::new(Arc::new(MemoryVaultDatabase::default()), fingerprint());
		let saved = std::cell::Cell::new(false);
		let (written, observed_pending) = tokio::join!(
			async {
				let written = vault.save_refresh_token(&TokenSecret::new("refresh-slow")).await;

				saved.set(true);

				written
			},
			async { !saved.get() },
		);

		assert!(written);
		assert!(observed_pending, "Other tasks should run while the key is being derived.");
		assert_eq!(
			vault.get_refresh_token().await.map(|t| t.expose().to_owned()),
			Some("refresh-slow".into()),
		);
	}
}
