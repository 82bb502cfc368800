//! In-process [`VaultDatabase`] for tests and platforms without durable storage.

// self
use crate::{
	_prelude::*,
	vault::{
		EncryptedTokenRecord, VaultError,
		database::{VaultDatabase, VaultFuture},
	},
};

/// Keeps sealed records in memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryVaultDatabase(Arc<RwLock<HashMap<String, EncryptedTokenRecord>>>);
impl MemoryVaultDatabase {
	/// Returns the raw record under `key`, bypassing the vault.
	pub fn record(&self, key: &str) -> Option<EncryptedTokenRecord> {
		self.0.read().get(key).cloned()
	}

	/// Writes a raw record, bypassing the vault.
	pub fn insert_record(&self, key: &str, record: EncryptedTokenRecord) {
		self.0.write().insert(key.to_owned(), record);
	}
}
impl VaultDatabase for MemoryVaultDatabase {
	fn open(&self) -> VaultFuture<'_, ()> {
		Box::pin(async { Ok(()) })
	}

	fn get<'a>(&'a self, key: &'a str) -> VaultFuture<'a, Option<EncryptedTokenRecord>> {
		let map = self.0.clone();

		Box::pin(async move { Ok::<_, VaultError>(map.read().get(key).cloned()) })
	}

	fn put<'a>(&'a self, key: &'a str, record: EncryptedTokenRecord) -> VaultFuture<'a, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			map.write().insert(key.to_owned(), record);

			Ok(())
		})
	}

	fn delete<'a>(&'a self, key: &'a str) -> VaultFuture<'a, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			map.write().remove(key);

			Ok(())
		})
	}
}
