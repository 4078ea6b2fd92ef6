//! Durable and session-scoped store sources.

// self
use crate::{
	_prelude::*,
	source::TokenSource,
	store::{KeyValueStore, StoreError, read_json_or_raw},
	token::TokenScene,
};

/// Store-backed source decoding JSON-encoded values, falling back to the raw string.
#[derive(Clone)]
pub struct StorageSource {
	store: Arc<dyn KeyValueStore>,
	scene: TokenScene,
}
impl StorageSource {
	/// Durable (local) store source.
	pub fn local(store: Arc<dyn KeyValueStore>) -> Self {
		Self { store, scene: TokenScene::ReadOnLocal }
	}

	/// Session store source.
	pub fn session(store: Arc<dyn KeyValueStore>) -> Self {
		Self { store, scene: TokenScene::ReadOnSession }
	}
}
impl TokenSource for StorageSource {
	fn scene(&self) -> TokenScene {
		self.scene
	}

	fn try_read(&self, key: &str) -> Result<Option<String>, StoreError> {
		read_json_or_raw(self.store.as_ref(), key)
	}
}
