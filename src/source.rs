//! Ordered token sources and the key-based resolver built from them.
//!
//! The default precedence is carrier (cookie) → URL query → durable (local) store → session
//! store. Carrier-delivered values are consumed on adoption and copied into the durable store
//! so later reads no longer depend on the one-shot channel.

pub mod carrier;
pub mod storage;

pub use carrier::*;
pub use storage::*;

// self
use crate::{
	_prelude::*,
	store::{KeyValueStore, MemoryStore, StoreError, write_json},
	token::{Token, TokenScene},
};

/// A place a token may be found under a lookup key.
pub trait TokenSource
where
	Self: Send + Sync,
{
	/// Scene reported when a value from this source is adopted.
	fn scene(&self) -> TokenScene;

	/// Returns the value stored under `key`, if present.
	fn try_read(&self, key: &str) -> Result<Option<String>, StoreError>;

	/// Clears the value after adoption; durable sources keep it.
	fn consume(&self, _key: &str) -> Result<(), StoreError> {
		Ok(())
	}

	/// One-shot carriers have their adopted value copied into the durable store.
	fn is_carrier(&self) -> bool {
		false
	}
}

/// Outcome of one resolver pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceLookup {
	/// No source holds the key.
	Absent,
	/// A source holds the value already cached.
	Unchanged(Token),
	/// A source produced a value different from the cache.
	Changed(Token, TokenScene),
}

/// Ordered source list plus the durable store carriers persist into.
#[derive(Clone)]
pub struct TokenSources {
	durable: Arc<dyn KeyValueStore>,
	sources: Vec<Arc<dyn TokenSource>>,
}
impl TokenSources {
	/// Standard precedence; only the durable store is mandatory.
	pub fn builder(durable: Arc<dyn KeyValueStore>) -> TokenSourcesBuilder {
		TokenSourcesBuilder { durable, cookie: None, query: None, session: None }
	}

	/// Arbitrary source order; `durable` receives carrier-delivered values.
	pub fn custom(durable: Arc<dyn KeyValueStore>, sources: Vec<Arc<dyn TokenSource>>) -> Self {
		Self { durable, sources }
	}

	/// Single in-memory durable store, no carriers.
	pub fn in_memory() -> Self {
		Self::builder(Arc::new(MemoryStore::default())).build()
	}

	/// Store receiving carrier-delivered and explicitly set tokens.
	pub fn durable(&self) -> &Arc<dyn KeyValueStore> {
		&self.durable
	}

	/// Probes the sources in order, stopping at the first present value.
	///
	/// A value equal to `cached` is returned without consuming its source.
	pub fn lookup(&self, key: &str, cached: Option<&Token>) -> Result<SourceLookup, StoreError> {
		for source in &self.sources {
			let Some(raw) = source.try_read(key)? else {
				continue;
			};

			if cached.is_some_and(|t| t.expose() == raw) {
				return Ok(SourceLookup::Unchanged(Token::new(raw)));
			}

			source.consume(key)?;

			if source.is_carrier() {
				write_json(self.durable.as_ref(), key, Some(&raw))?;
			}

			return Ok(SourceLookup::Changed(Token::new(raw), source.scene()));
		}

		Ok(SourceLookup::Absent)
	}
}
impl Default for TokenSources {
	fn default() -> Self {
		Self::in_memory()
	}
}
impl Debug for TokenSources {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let scenes = self.sources.iter().map(|s| s.scene()).collect::<Vec<_>>();

		f.debug_struct("TokenSources").field("scenes", &scenes).finish()
	}
}

/// Builder for the standard source precedence.
pub struct TokenSourcesBuilder {
	durable: Arc<dyn KeyValueStore>,
	cookie: Option<Arc<dyn KeyValueStore>>,
	query: Option<Location>,
	session: Option<Arc<dyn KeyValueStore>>,
}
impl TokenSourcesBuilder {
	/// Adds the one-shot cookie carrier.
	pub fn cookie(mut self, store: Arc<dyn KeyValueStore>) -> Self {
		self.cookie = Some(store);

		self
	}

	/// Adds the URL query carrier.
	pub fn query(mut self, location: Location) -> Self {
		self.query = Some(location);

		self
	}

	/// Adds the session store, probed last.
	pub fn session(mut self, store: Arc<dyn KeyValueStore>) -> Self {
		self.session = Some(store);

		self
	}

	/// Finalizes the ordered list.
	pub fn build(self) -> TokenSources {
		let mut sources: Vec<Arc<dyn TokenSource>> = Vec::with_capacity(4);

		if let Some(store) = self.cookie {
			sources.push(Arc::new(CookieSource::new(store)));
		}
		if let Some(location) = self.query {
			sources.push(Arc::new(QuerySource::new(location)));
		}

		sources.push(Arc::new(StorageSource::local(self.durable.clone())));

		if let Some(store) = self.session {
			sources.push(Arc::new(StorageSource::session(store)));
		}

		TokenSources { durable: self.durable, sources }
	}
}
