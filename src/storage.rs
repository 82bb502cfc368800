//! Ordinary (unencrypted) key-value storage and the token keys the client keeps there.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{TokenPair, TokenSecret},
};

/// Key holding the current access token.
pub const ACCESS_TOKEN_KEY: &str = "accessToken";
/// Key holding the plaintext refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
/// Legacy key mirroring the access token for older page code.
pub const LEGACY_TOKEN_KEY: &str = "auth_token";

/// Synchronous string key-value store, the shape of browser local storage.
pub trait KeyValueStore
where
	Self: Send + Sync,
{
	/// Reads a value.
	fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

	/// Writes or replaces a value.
	fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

	/// Removes a value; removing a missing key is not an error.
	fn remove(&self, key: &str) -> Result<(), StoreError>;

	/// Writes several values under one lock/persist cycle.
	fn set_many(&self, entries: &[(&str, &str)]) -> Result<(), StoreError> {
		for (key, value) in entries {
			self.set(key, value)?;
		}

		Ok(())
	}

	/// Removes several values under one lock/persist cycle.
	fn remove_many(&self, keys: &[&str]) -> Result<(), StoreError> {
		for key in keys {
			self.remove(key)?;
		}

		Ok(())
	}
}

/// Error type produced by [`KeyValueStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Typed view over the token keys of a [`KeyValueStore`].
#[derive(Clone)]
pub struct TokenStorage(Arc<dyn KeyValueStore>);
impl TokenStorage {
	/// Wraps a key-value store.
	pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
		Self(store)
	}

	/// Returns the stored access token, falling back to the legacy key.
	pub fn access_token(&self) -> Result<Option<TokenSecret>, StoreError> {
		match self.0.get(ACCESS_TOKEN_KEY)?.and_then(TokenSecret::non_empty) {
			Some(token) => Ok(Some(token)),
			None => Ok(self.0.get(LEGACY_TOKEN_KEY)?.and_then(TokenSecret::non_empty)),
		}
	}

	/// Returns the stored plaintext refresh token.
	pub fn refresh_token(&self) -> Result<Option<TokenSecret>, StoreError> {
		Ok(self.0.get(REFRESH_TOKEN_KEY)?.and_then(TokenSecret::non_empty))
	}

	/// Overwrites the access token (both keys) and, when present, the refresh token.
	pub fn store_pair(&self, pair: &TokenPair) -> Result<(), StoreError> {
		let access = pair.access_token.expose();

		match &pair.refresh_token {
			Some(refresh) => self.0.set_many(&[
				(ACCESS_TOKEN_KEY, access),
				(LEGACY_TOKEN_KEY, access),
				(REFRESH_TOKEN_KEY, refresh.expose()),
			]),
			None => self.0.set_many(&[(ACCESS_TOKEN_KEY, access), (LEGACY_TOKEN_KEY, access)]),
		}
	}

	/// Removes every token key.
	pub fn clear(&self) -> Result<(), StoreError> {
		self.0.remove_many(&[ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, LEGACY_TOKEN_KEY])
	}
}
impl Debug for TokenStorage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("TokenStorage(..)")
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::error::Error;

	#[test]
	fn store_error_converts_into_crate_error_with_source() {
		let store_error = StoreError::Backend { message: "disk full".into() };
		let error: Error = store_error.clone().into();

		assert!(matches!(error, Error::Storage(_)));

		let source = StdError::source(&error)
			.expect("Crate error should expose the original store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}

	#[test]
	fn access_token_falls_back_to_legacy_key() {
		let store = Arc::new(MemoryStore::default());
		let storage = TokenStorage::new(store.clone());

		store.set(LEGACY_TOKEN_KEY, "legacy-access").expect("Memory store writes never fail.");

		assert_eq!(
			storage.access_token().expect("Memory store reads never fail.").map(|t| t.bearer()),
			Some("Bearer legacy-access".into()),
		);
	}

	#[test]
	fn store_pair_then_clear_empties_all_keys() {
		let store = Arc::new(MemoryStore::default());
		let storage = TokenStorage::new(store.clone());

		storage
			.store_pair(&TokenPair::new("access-1", Some("refresh-1")))
			.expect("Memory store writes never fail.");

		assert_eq!(store.get(ACCESS_TOKEN_KEY).ok().flatten().as_deref(), Some("access-1"));
		assert_eq!(store.get(LEGACY_TOKEN_KEY).ok().flatten().as_deref(), Some("access-1"));
		assert_eq!(store.get(REFRESH_TOKEN_KEY).ok().flatten().as_deref(), Some("refresh-1"));

		storage.clear().expect("Memory store removals never fail.");

		for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, LEGACY_TOKEN_KEY] {
			assert_eq!(store.get(key).ok().flatten(), None, "{key} should be cleared");
		}
	}

	#[test]
	fn pair_without_refresh_keeps_existing_refresh() {
		let store = Arc::new(MemoryStore::default());
		let storage = TokenStorage::new(store.clone());

		storage
			.store_pair(&TokenPair::new("access-1", Some("refresh-1")))
			.expect("Memory store writes never fail.");
		storage
			.store_pair(&TokenPair::new("access-2", None::<String>))
			.expect("Memory store writes never fail.");

		assert_eq!(
			storage.refresh_token().expect("Memory store reads never fail.").map(|t| t.bearer()),
			Some("Bearer refresh-1".into()),
		);
	}
}
