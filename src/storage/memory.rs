//! Thread-safe in-memory [`KeyValueStore`] for tests and ephemeral sessions.

// self
use crate::{
	_prelude::*,
	storage::{KeyValueStore, StoreError},
};

/// Keeps values in-process; contents vanish with the value.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(Arc<RwLock<HashMap<String, String>>>);
impl MemoryStore {
	/// Number of stored keys.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when nothing is stored.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}
}
impl KeyValueStore for MemoryStore {
	fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
		Ok(self.0.read().get(key).cloned())
	}

	fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
		self.0.write().insert(key.to_owned(), value.to_owned());

		Ok(())
	}

	fn remove(&self, key: &str) -> Result<(), StoreError> {
		self.0.write().remove(key);

		Ok(())
	}

	fn set_many(&self, entries: &[(&str, &str)]) -> Result<(), StoreError> {
		let mut guard = self.0.write();

		for (key, value) in entries {
			guard.insert((*key).to_owned(), (*value).to_owned());
		}

		Ok(())
	}

	fn remove_many(&self, keys: &[&str]) -> Result<(), StoreError> {
		let mut guard = self.0.write();

		for key in keys {
			guard.remove(*key);
		}

		Ok(())
	}
}
