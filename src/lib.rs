//! Session continuity for the master field-service client: an authenticated API client that
//! survives access-token expiry with single-flight refreshes, an encrypted refresh-token vault
//! that outlives storage eviction, and a one-shot session bootstrap.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod bootstrap;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod obs;
pub mod platform;
pub mod push;
pub mod storage;
pub mod vault;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::TokenPair,
		client::{ApiClient, LoginRedirect},
		config::ClientConfig,
		http::ReqwestTransport,
		storage::{KeyValueStore, MemoryStore, TokenStorage},
		vault::{DeviceFingerprint, MemoryVaultDatabase, TokenVault, VaultDatabase},
	};

	/// Client type alias used by reqwest-backed integration tests.
	pub type ReqwestTestClient = ApiClient<ReqwestTransport>;

	/// Redirect hook that records every login redirect for assertions.
	#[derive(Debug, Default)]
	pub struct RecordingRedirect(Mutex<Vec<String>>);
	impl RecordingRedirect {
		/// Returns every path the client redirected to, oldest first.
		pub fn redirects(&self) -> Vec<String> {
			self.0.lock().clone()
		}
	}
	impl LoginRedirect for RecordingRedirect {
		fn redirect_to_login(&self, login_path: &str) {
			self.0.lock().push(login_path.to_owned());
		}
	}

	/// Handles to every collaborator wired into a test client.
	pub struct TestSession {
		/// Client under test.
		pub client: ReqwestTestClient,
		/// Ordinary token storage backing the client.
		pub store: Arc<MemoryStore>,
		/// Vault database backing the client's vault.
		pub vault_db: Arc<MemoryVaultDatabase>,
		/// Vault sharing `vault_db` with the client.
		pub vault: TokenVault,
		/// Redirect recorder.
		pub redirect: Arc<RecordingRedirect>,
	}

	/// Fingerprint used by every test vault.
	pub fn test_fingerprint() -> DeviceFingerprint {
		DeviceFingerprint::new("https://master.test", "ru-RU", "Europe/Moscow")
	}

	/// Builds a client for `base_url` backed by empty in-memory storage, an in-memory vault, and
	/// a recording redirect hook.
	pub fn build_test_session(base_url: &str) -> TestSession {
		build_test_session_with_store(base_url, Arc::new(MemoryStore::default()))
	}

	/// Builds a client whose ordinary storage already holds `access` and `refresh`, as after an
	/// earlier sign-in.
	pub fn build_signed_in_session(base_url: &str, access: &str, refresh: &str) -> TestSession {
		let store = Arc::new(MemoryStore::default());

		TokenStorage::new(store.clone())
			.store_pair(&TokenPair::new(access, Some(refresh)))
			.expect("Memory store writes should succeed.");

		build_test_session_with_store(base_url, store)
	}

	fn build_test_session_with_store(base_url: &str, store: Arc<MemoryStore>) -> TestSession {
		let config = ClientConfig::builder()
			.base_url(base_url)
			.build()
			.expect("Test client configuration should be valid.");
		let vault_db = Arc::new(MemoryVaultDatabase::default());
		let vault_backend: Arc<dyn VaultDatabase> = vault_db.clone();
		let vault = TokenVault::new(vault_backend, test_fingerprint());
		let redirect = Arc::new(RecordingRedirect::default());
		let transport = ReqwestTransport::from_config(&config)
			.expect("Reqwest transport should build for tests.");
		let storage: Arc<dyn KeyValueStore> = store.clone();
		let hook: Arc<dyn LoginRedirect> = redirect.clone();
		let client = ApiClient::with_transport(config, transport, storage, vault.clone())
			.with_redirect(hook);

		TestSession { client, store, vault_db, vault, redirect }
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
		time::Duration as StdDuration,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
