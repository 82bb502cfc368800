//! Per-origin database contract backing the vault, plus built-in backends.

pub mod file;
pub mod memory;

pub use file::FileVaultDatabase;
pub use memory::MemoryVaultDatabase;

// self
use crate::{
	_prelude::*,
	vault::{EncryptedTokenRecord, VaultError},
};

/// Database name the vault lives in.
pub const DATABASE_NAME: &str = "master_auth_db";
/// Object store holding sealed records.
pub const STORE_NAME: &str = "tokens";
/// Key of the single refresh-token record.
pub const RECORD_KEY: &str = "refresh_token";

/// Boxed future returned by [`VaultDatabase`] operations.
pub type VaultFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, VaultError>> + 'a + Send>>;

/// Key-value database holding sealed records in the `tokens` store of `master_auth_db`.
///
/// The vault calls [`open`](VaultDatabase::open) under a timeout before every operation, so
/// implementations may block there (schema upgrades, locked files) without wedging callers.
pub trait VaultDatabase
where
	Self: Send + Sync,
{
	/// Makes the database ready for reads and writes.
	fn open(&self) -> VaultFuture<'_, ()>;

	/// Fetches the record stored under `key`.
	fn get<'a>(&'a self, key: &'a str) -> VaultFuture<'a, Option<EncryptedTokenRecord>>;

	/// Stores `record` under `key`, replacing any previous record.
	fn put<'a>(&'a self, key: &'a str, record: EncryptedTokenRecord) -> VaultFuture<'a, ()>;

	/// Deletes the record under `key`; deleting a missing key is not an error.
	fn delete<'a>(&'a self, key: &'a str) -> VaultFuture<'a, ()>;
}
