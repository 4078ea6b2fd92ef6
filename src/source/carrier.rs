//! One-shot carrier sources: cookies and the page URL query.

// self
use crate::{
	_prelude::*,
	source::TokenSource,
	store::{KeyValueStore, StoreError},
	token::TokenScene,
};

/// Cookie-like carrier; the raw value is adopted once, then deleted.
#[derive(Clone)]
pub struct CookieSource(Arc<dyn KeyValueStore>);
impl CookieSource {
	/// Wraps the cookie jar store.
	pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
		Self(store)
	}
}
impl TokenSource for CookieSource {
	fn scene(&self) -> TokenScene {
		TokenScene::ReadOnCookie
	}

	fn try_read(&self, key: &str) -> Result<Option<String>, StoreError> {
		self.0.get(key)
	}

	fn consume(&self, key: &str) -> Result<(), StoreError> {
		self.0.remove(key)
	}

	fn is_carrier(&self) -> bool {
		true
	}
}

/// Mutable page location; clones share the same URL.
///
/// Stripping a parameter replaces the current entry rather than appending a new one, so
/// path and fragment stay untouched and no history is recorded.
#[derive(Clone, Debug)]
pub struct Location(Arc<RwLock<Url>>);
impl Location {
	/// Wraps the current page URL.
	pub fn new(url: Url) -> Self {
		Self(Arc::new(RwLock::new(url)))
	}

	/// Snapshot of the current URL.
	pub fn href(&self) -> Url {
		self.0.read().clone()
	}

	/// First query value for `key`; an empty value is still present.
	pub fn query_param(&self, key: &str) -> Option<String> {
		self.0.read().query_pairs().find(|(k, _)| k == key).map(|(_, v)| v.into_owned())
	}

	/// Removes every `key` parameter in place.
	pub fn strip_query_param(&self, key: &str) {
		let mut url = self.0.write();
		let kept = url
			.query_pairs()
			.filter(|(k, _)| k != key)
			.map(|(k, v)| (k.into_owned(), v.into_owned()))
			.collect::<Vec<_>>();

		if kept.is_empty() {
			url.set_query(None);
		} else {
			url.query_pairs_mut().clear().extend_pairs(kept);
		}
	}
}

/// URL query carrier; the parameter is adopted once, then stripped from the [`Location`].
#[derive(Clone, Debug)]
pub struct QuerySource(Location);
impl QuerySource {
	/// Reads from `location`.
	pub fn new(location: Location) -> Self {
		Self(location)
	}
}
impl TokenSource for QuerySource {
	fn scene(&self) -> TokenScene {
		TokenScene::ReadOnQuery
	}

	fn try_read(&self, key: &str) -> Result<Option<String>, StoreError> {
		Ok(self.0.query_param(key))
	}

	fn consume(&self, key: &str) -> Result<(), StoreError> {
		self.0.strip_query_param(key);

		Ok(())
	}

	fn is_carrier(&self) -> bool {
		true
	}
}
