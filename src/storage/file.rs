//! File-backed [`KeyValueStore`] that survives process restarts.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	storage::{KeyValueStore, StoreError},
};

type Snapshot = HashMap<String, String>;

/// Persists values to a JSON object file after each mutation.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: Arc<RwLock<Snapshot>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		ensure_parent_exists(&path)?;

		let snapshot = load_snapshot(&path)?;

		Ok(Self { path, inner: Arc::new(RwLock::new(snapshot)) })
	}

	/// Location of the backing file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Persists the changed snapshot before it becomes visible to readers.
	fn mutate(&self, apply: impl FnOnce(&mut Snapshot)) -> Result<(), StoreError> {
		let mut guard = self.inner.write();
		let mut next = guard.clone();

		apply(&mut next);
		write_atomically(&self.path, &next)?;

		*guard = next;

		Ok(())
	}
}
impl KeyValueStore for FileStore {
	fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
		Ok(self.inner.read().get(key).cloned())
	}

	fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
		self.mutate(|map| {
			map.insert(key.to_owned(), value.to_owned());
		})
	}

	fn remove(&self, key: &str) -> Result<(), StoreError> {
		self.mutate(|map| {
			map.remove(key);
		})
	}

	fn set_many(&self, entries: &[(&str, &str)]) -> Result<(), StoreError> {
		self.mutate(|map| {
			for (key, value) in entries {
				map.insert((*key).to_owned(), (*value).to_owned());
			}
		})
	}

	fn remove_many(&self, keys: &[&str]) -> Result<(), StoreError> {
		self.mutate(|map| {
			for key in keys {
				map.remove(*key);
			}
		})
	}
}

fn load_snapshot(path: &Path) -> Result<Snapshot, StoreError> {
	if !path.exists() {
		return Ok(HashMap::new());
	}

	let bytes = fs::read(path).map_err(|e| StoreError::Backend {
		message: format!("Failed to read {}: {e}", path.display()),
	})?;

	if bytes.is_empty() {
		return Ok(HashMap::new());
	}

	serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
		message: format!("Failed to parse {}: {e}", path.display()),
	})
}

pub(crate) fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
	if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
		fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
			message: format!("Failed to create store directory {}: {e}", parent.display()),
		})?;
	}

	Ok(())
}

/// Serializes `value` next to `path` and renames it into place.
pub(crate) fn write_atomically<T>(path: &Path, value: &T) -> Result<(), StoreError>
where
	T: ?Sized + Serialize,
{
	ensure_parent_exists(path)?;

	let serialized = serde_json::to_vec_pretty(value).map_err(|e| StoreError::Serialization {
		message: format!("Failed to serialize store snapshot: {e}"),
	})?;
	let mut tmp_path = path.to_path_buf();

	tmp_path.set_extension("tmp");

	{
		let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
			message: format!("Failed to create {}: {e}", tmp_path.display()),
		})?;

		file.write_all(&serialized).map_err(|e| StoreError::Backend {
			message: format!("Failed to write {}: {e}", tmp_path.display()),
		})?;
		file.sync_all().map_err(|e| StoreError::Backend {
			message: format!("Failed to sync {}: {e}", tmp_path.display()),
		})?;
	}

	fs::rename(&tmp_path, path).map_err(|e| StoreError::Backend {
		message: format!("Failed to replace {}: {e}", path.display()),
	})
}
