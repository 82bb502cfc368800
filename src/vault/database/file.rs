//! File-backed [`VaultDatabase`] laid out as `<root>/master_auth_db/tokens.json`.
//!
//! Disk access runs on tokio's blocking pool and stays bounded by the vault's open timeout.

// std
use std::{
	fs,
	path::{Path, PathBuf},
};
// crates.io
use async_lock::Mutex as AsyncMutex;
use tokio::task;
// self
use crate::{
	_prelude::*,
	storage::file as fs_util,
	vault::{
		EncryptedTokenRecord, VaultError,
		database::{DATABASE_NAME, STORE_NAME, VaultDatabase, VaultFuture},
	},
};

type Records = HashMap<String, EncryptedTokenRecord>;

/// Persists sealed records to a JSON file, loading it lazily on first open.
#[derive(Clone, Debug)]
pub struct FileVaultDatabase {
	path: PathBuf,
	records: Arc<RwLock<Option<Records>>>,
	writes: Arc<AsyncMutex<()>>,
}
impl FileVaultDatabase {
	/// Database rooted at `root`; nothing touches the disk until [`VaultDatabase::open`].
	pub fn new(root: impl AsRef<Path>) -> Self {
		let path = root.as_ref().join(DATABASE_NAME).join(format!("{STORE_NAME}.json"));

		Self { path, records: Default::default(), writes: Default::default() }
	}

	/// Location of the backing file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load(path: &Path) -> Result<Records, VaultError> {
		fs_util::ensure_parent_exists(path)?;

		if !path.exists() {
			return Ok(HashMap::new());
		}

		let bytes = fs::read(path).map_err(|e| VaultError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		if bytes.is_empty() {
			return Ok(HashMap::new());
		}

		serde_json::from_slice(&bytes).map_err(|e| VaultError::Corrupt {
			message: format!("Failed to parse {}: {e}", path.display()),
		})
	}

	/// Applies `apply` to a copy of the records, persists the copy when it changed, and only
	/// then publishes it.
	async fn update(&self, apply: impl FnOnce(&mut Records) -> bool) -> Result<(), VaultError> {
		let _writing = self.writes.lock().await;
		let mut next = self.records.read().clone().ok_or(VaultError::NotOpen)?;

		if !apply(&mut next) {
			return Ok(());
		}

		let path = self.path.clone();
		let next = blocking(move || {
			fs_util::write_atomically(&path, &next)?;

			Ok(next)
		})
		.await?;

		*self.records.write() = Some(next);

		Ok(())
	}
}
impl VaultDatabase for FileVaultDatabase {
	fn open(&self) -> VaultFuture<'_, ()> {
		Box::pin(async move {
			if self.records.read().is_some() {
				return Ok(());
			}

			let path = self.path.clone();
			let loaded = blocking(move || Self::load(&path)).await?;
			let mut guard = self.records.write();

			if guard.is_none() {
				*guard = Some(loaded);
			}

			Ok(())
		})
	}

	fn get<'a>(&'a self, key: &'a str) -> VaultFuture<'a, Option<EncryptedTokenRecord>> {
		Box::pin(async move {
			let guard = self.records.read();
			let records = guard.as_ref().ok_or(VaultError::NotOpen)?;

			Ok(records.get(key).cloned())
		})
	}

	fn put<'a>(&'a self, key: &'a str, record: EncryptedTokenRecord) -> VaultFuture<'a, ()> {
		Box::pin(self.update(move |records| {
			records.insert(key.to_owned(), record);

			true
		}))
	}

	fn delete<'a>(&'a self, key: &'a str) -> VaultFuture<'a, ()> {
		Box::pin(self.update(move |records| records.remove(key).is_some()))
	}
}

/// Runs filesystem work on the blocking pool.
async fn blocking<T>(
	work: impl 'static + Send + FnOnce() -> Result<T, VaultError>,
) -> Result<T, VaultError>
where
	T: 'static + Send,
{
	task::spawn_blocking(work)
		.await
		.map_err(|e| VaultError::Backend { message: format!("Vault I/O task failed: {e}") })?
}

#[cfg(test)]
mod tests {
	// std
	use std::{env, process};
	// self
	use super::*;
	use crate::vault::database::RECORD_KEY;

	fn temp_root() -> PathBuf {
		env::temp_dir().join(format!(
			"master_session_vault_{}_{}",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos(),
		))
	}

	fn sample() -> EncryptedTokenRecord {
		EncryptedTokenRecord {
			ciphertext: "Y2lwaGVy".into(),
			iv: "aXZpdml2aXZpdml2".into(),
			salt: "c2FsdHNhbHRzYWx0c2FsdA==".into(),
			expires_at: 1_900_000_000_000,
		}
	}

	#[tokio::test]
	async fn operations_before_open_are_rejected() {
		let db = FileVaultDatabase::new(temp_root());

		assert!(matches!(db.get(RECORD_KEY).await, Err(VaultError::NotOpen)));
	}

	#[tokio::test]
	async fn records_survive_reopen() {
		let root = temp_root();
		let db = FileVaultDatabase::new(&root);

		db.open().await.expect("Vault database should open.");
		db.put(RECORD_KEY, sample()).await.expect("Put should succeed.");

		assert!(db.path().ends_with("master_auth_db/tokens.json"));

		let reopened = FileVaultDatabase::new(&root);

		reopened.open().await.expect("Vault database should reopen.");

		assert_eq!(reopened.get(RECORD_KEY).await.expect("Get should succeed."), Some(sample()));

		reopened.delete(RECORD_KEY).await.expect("Delete should succeed.");

		assert_eq!(reopened.get(RECORD_KEY).await.expect("Get should succeed."), None);

		let _ = fs::remove_dir_all(&root);
	}

	#[tokio::test]
	async fn failed_write_keeps_previous_records() {
		let root = temp_root();
		let db = FileVaultDatabase::new(&root);

		db.open().await.expect("Vault database should open.");
		db.put(RECORD_KEY, sample()).await.expect("Put should succeed.");

		let store_dir = root.join(DATABASE_NAME);

		fs::remove_dir_all(&store_dir).expect("Store directory should be removable.");
		fs::write(&store_dir, b"").expect("A file should take the store directory's place.");

		let replacement = EncryptedTokenRecord { expires_at: 1, ..sample() };

		assert!(db.put(RECORD_KEY, replacement).await.is_err());
		assert!(db.delete(RECORD_KEY).await.is_err());
		assert_eq!(db.get(RECORD_KEY).await.expect("Get should succeed."), Some(sample()));

		let _ = fs::remove_dir_all(&root);
	}
}
