//! Key/value storage contracts and built-in stores backing token sources.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::_prelude::*;

/// Synchronous string store with cookie/local/session storage semantics.
///
/// Absence (`None`) is distinct from any stored value, including the empty string.
pub trait KeyValueStore
where
	Self: Send + Sync,
{
	/// Returns the raw value stored under `key`, if present.
	fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

	/// Stores or replaces the raw value under `key`.
	fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

	/// Deletes `key`; deleting a missing key is not an error.
	fn remove(&self, key: &str) -> Result<(), StoreError>;
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

/// Reads `key` and decodes it as a JSON string, falling back to the raw value.
pub fn read_json_or_raw(store: &dyn KeyValueStore, key: &str) -> Result<Option<String>, StoreError> {
	Ok(store
		.get(key)?
		.map(|raw| serde_json::from_str::<String>(&raw).unwrap_or(raw)))
}

/// Writes `value` JSON-encoded under `key`; `None` removes the entry.
pub fn write_json(
	store: &dyn KeyValueStore,
	key: &str,
	value: Option<&str>,
) -> Result<(), StoreError> {
	match value {
		Some(value) => {
			let encoded = serde_json::to_string(value).map_err(|e| StoreError::Serialization {
				message: format!("Failed to encode value for {key}: {e}"),
			})?;

			store.set(key, &encoded)
		},
		None => store.remove(key),
	}
}
