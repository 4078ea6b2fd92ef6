//! Token manager: cached token state, single-flight resolution, and change notification.
//!
//! A [`TokenManager`] keeps the current token, one shared handle to the resolution in
//! flight, and an ordered observer list. Concurrent [`TokenManager::get_token`] callers join
//! the same handle, so a getter runs once no matter how many requests need a token. A settled
//! handle stays memoized until [`TokenManager::refresh_token`] or
//! [`TokenManager::set_token`] replaces it; a failed one is dropped so the next call retries.
//!
//! No operation has a timeout. A getter that never settles keeps every joined caller pending.

// crates.io
use futures::future::Shared;
// self
use crate::{
	_prelude::*,
	obs::{self, Op, OpOutcome, OpSpan},
	source::{SourceLookup, TokenSources},
	store::write_json,
	token::{
		Token, TokenScene,
		hook::{TokenFetch, TokenGetter, TokenSetter, TokenValidator},
		observer::{self, ObserveOptions, TokenObserver, TokenSubscription},
	},
};

const DEFAULT_KEY: &str = "token";

type ResolutionFuture = BoxFuture<'static, Result<Option<Token>, SharedError>>;
type Resolution = Shared<ResolutionFuture>;

/// Options for [`TokenManager::with_options`].
///
/// Missing hooks fall back to key-based resolution over [`TokenSources`], the default
/// setter, the getter (for refresh), and an accept-all validator.
#[derive(Clone)]
pub struct TokenManagerOptions {
	/// Lookup and persistence key.
	pub key: String,
	/// Sources used when no getter is supplied; their durable store receives set tokens.
	pub sources: TokenSources,
	/// Getter used as-is, without change detection.
	pub get_token: Option<Arc<dyn TokenGetter>>,
	/// Setter replacing the default cache-persist-notify behavior.
	pub set_token: Option<Arc<dyn TokenSetter>>,
	/// Refresher; defaults to the getter.
	pub refresh_token: Option<Arc<dyn TokenGetter>>,
	/// Validator used by the `get_valid_token` family.
	pub is_valid_token: Option<TokenValidator>,
}
impl TokenManagerOptions {
	/// Options with the default `"token"` key and in-memory sources.
	pub fn new() -> Self {
		Self {
			key: DEFAULT_KEY.into(),
			sources: TokenSources::default(),
			get_token: None,
			set_token: None,
			refresh_token: None,
			is_valid_token: None,
		}
	}

	/// Overrides the lookup key.
	pub fn key(mut self, key: impl Into<String>) -> Self {
		self.key = key.into();

		self
	}

	/// Overrides the sources.
	pub fn sources(mut self, sources: TokenSources) -> Self {
		self.sources = sources;

		self
	}

	/// Supplies a raw getter.
	pub fn get_token(mut self, getter: impl 'static + TokenGetter) -> Self {
		self.get_token = Some(Arc::new(getter));

		self
	}

	/// Supplies a custom setter.
	pub fn set_token(mut self, setter: impl 'static + TokenSetter) -> Self {
		self.set_token = Some(Arc::new(setter));

		self
	}

	/// Supplies a refresher distinct from the getter.
	pub fn refresh_token(mut self, refresher: impl 'static + TokenGetter) -> Self {
		self.refresh_token = Some(Arc::new(refresher));

		self
	}

	/// Supplies a token validator.
	pub fn is_valid_token(mut self, f: impl 'static + Send + Sync + Fn(&Token) -> bool) -> Self {
		self.is_valid_token = Some(Arc::new(f));

		self
	}
}
impl Default for TokenManagerOptions {
	fn default() -> Self {
		Self::new()
	}
}
impl Debug for TokenManagerOptions {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenManagerOptions")
			.field("key", &self.key)
			.field("sources", &self.sources)
			.field("get_token_set", &self.get_token.is_some())
			.field("set_token_set", &self.set_token.is_some())
			.field("refresh_token_set", &self.refresh_token.is_some())
			.finish()
	}
}

#[derive(Clone)]
enum Hook {
	/// Key-based lookup over the configured sources.
	Sources { key: String, sources: TokenSources },
	/// Caller getter wrapped with change detection.
	Custom(Arc<dyn TokenGetter>),
	/// Caller getter used as-is.
	Raw(Arc<dyn TokenGetter>),
}

#[derive(Clone)]
enum Setter {
	/// Cache, persist under the key when present, notify.
	Default { persist: Option<(String, TokenSources)> },
	Custom(Arc<dyn TokenSetter>),
}

#[derive(Default)]
pub(crate) struct ManagerState {
	token: Option<Token>,
	resolution: Option<(u64, Resolution)>,
	generation: u64,
	last_scene: Option<TokenScene>,
	suppress_next: bool,
}

pub(crate) struct ManagerInner {
	getter: Hook,
	refresher: Hook,
	setter: Setter,
	validator: TokenValidator,
	state: Mutex<ManagerState>,
	pub(crate) observers: RwLock<Vec<Arc<dyn TokenObserver>>>,
}
impl ManagerInner {
	fn new(getter: Hook, refresher: Hook, setter: Setter, validator: TokenValidator) -> Self {
		Self {
			getter,
			refresher,
			setter,
			validator,
			state: Mutex::new(ManagerState { suppress_next: true, ..Default::default() }),
			observers: RwLock::new(Vec::new()),
		}
	}

	/// Installs a resolution through `hook`, replacing the current handle.
	///
	/// Only bumps the generation and snapshots the cache under the state lock. The hook runs
	/// when the returned handle is first polled, which always happens after the lock is released,
	/// so getters and stores may call back into the manager.
	fn begin(self: &Arc<Self>, hook: &Hook, state: &mut ManagerState) -> Resolution {
		state.generation += 1;

		let generation = state.generation;
		let cached = state.token.clone();
		let manager = Arc::downgrade(self);
		let hook = hook.clone();
		let future: ResolutionFuture = Box::pin(async move {
			let fetch = match manager.upgrade() {
				Some(inner) => inner.fetch(&hook, generation, cached),
				None => return Ok(cached),
			};
			let result = fetch.into_future().await.map_err(SharedError::from);

			if let Some(inner) = manager.upgrade() {
				inner.settle(generation, &result);
			}

			result
		});
		let shared = future.shared();

		state.resolution = Some((generation, shared.clone()));

		shared
	}

	fn fetch(self: &Arc<Self>, hook: &Hook, generation: u64, cached: Option<Token>) -> TokenFetch {
		match hook {
			Hook::Sources { key, sources } => match sources.lookup(key, cached.as_ref()) {
				Ok(SourceLookup::Absent) => TokenFetch::Ready(Ok(None)),
				Ok(SourceLookup::Unchanged(token)) => TokenFetch::Ready(Ok(Some(token))),
				Ok(SourceLookup::Changed(token, scene)) => {
					let current = {
						let mut state = self.state.lock();

						if state.generation == generation {
							state.token = Some(token.clone());

							true
						} else {
							false
						}
					};

					if !current {
						return TokenFetch::Ready(Ok(Some(token)));
					}

					let manager = Arc::downgrade(self);

					TokenFetch::pending(async move {
						if let Some(manager) = manager.upgrade() {
							manager.notify(Some(token.clone()), scene).await;
						}

						Ok::<_, BoxError>(Some(token))
					})
				},
				Err(e) => TokenFetch::Ready(Err(Box::new(e))),
			},
			Hook::Custom(getter) => {
				let fut = getter.fetch().into_future();
				let manager = Arc::downgrade(self);

				TokenFetch::pending(async move {
					let token = fut.await?;

					if let Some(manager) = manager.upgrade() {
						manager.adopt(generation, token.clone(), TokenScene::Custom).await;
					}

					Ok::<_, BoxError>(token)
				})
			},
			Hook::Raw(getter) => getter.fetch(),
		}
	}

	/// Writes a settled result back unless a newer resolution superseded it.
	fn settle(&self, generation: u64, result: &Result<Option<Token>, SharedError>) {
		let mut state = self.state.lock();

		if state.generation != generation {
			return;
		}

		match result {
			Ok(token) => state.token = token.clone(),
			Err(_) => state.resolution = None,
		}
	}

	/// Caches `token` and notifies when it differs from the current value.
	async fn adopt(&self, generation: u64, token: Option<Token>, scene: TokenScene) {
		let changed = {
			let mut state = self.state.lock();

			if state.generation != generation || state.token == token {
				false
			} else {
				state.token = token.clone();

				true
			}
		};

		if changed {
			self.notify(token, scene).await;
		}
	}

	/// Runs one notification cycle; resolves after every observer settled.
	async fn notify(&self, token: Option<Token>, scene: TokenScene) {
		let observers = {
			let mut state = self.state.lock();

			state.last_scene = Some(scene);

			if state.suppress_next {
				state.suppress_next = false;

				return;
			}

			self.observers.read().clone()
		};

		future::join_all(
			observers.into_iter().map(|o| observer::invoke(o, token.clone(), scene)),
		)
		.await;
	}
}

/// Resolves, caches, refreshes, and announces the authentication token.
///
/// Clones share state.
#[derive(Clone)]
pub struct TokenManager {
	inner: Arc<ManagerInner>,
}
impl TokenManager {
	/// Manager over the `"token"` key with in-memory sources.
	pub fn new() -> Self {
		Self::with_key(DEFAULT_KEY, TokenSources::default())
	}

	/// Key-based manager probing `sources` in order.
	pub fn with_key(key: impl Into<String>, sources: TokenSources) -> Self {
		let key = key.into();
		let hook = Hook::Sources { key: key.clone(), sources: sources.clone() };

		Self::from_parts(hook.clone(), hook, Setter::Default { persist: Some((key, sources)) }, accept_all())
	}

	/// Manager over a caller getter; changes are announced with [`TokenScene::Custom`].
	pub fn with_getter(getter: impl 'static + TokenGetter) -> Self {
		let hook = Hook::Custom(Arc::new(getter));

		Self::from_parts(hook.clone(), hook, Setter::Default { persist: None }, accept_all())
	}

	/// Manager from explicit options.
	pub fn with_options(options: TokenManagerOptions) -> Self {
		let TokenManagerOptions { key, sources, get_token, set_token, refresh_token, is_valid_token } =
			options;
		let getter = match get_token {
			Some(getter) => Hook::Raw(getter),
			None => Hook::Sources { key: key.clone(), sources: sources.clone() },
		};
		let refresher = refresh_token.map(Hook::Raw).unwrap_or_else(|| getter.clone());
		let setter = match set_token {
			Some(setter) => Setter::Custom(setter),
			None => Setter::Default { persist: Some((key, sources)) },
		};

		Self::from_parts(getter, refresher, setter, is_valid_token.unwrap_or_else(accept_all))
	}

	fn from_parts(getter: Hook, refresher: Hook, setter: Setter, validator: TokenValidator) -> Self {
		Self { inner: Arc::new(ManagerInner::new(getter, refresher, setter, validator)) }
	}

	/// Returns the cached token, or joins (starting if needed) the shared resolution.
	pub async fn get_token(&self) -> Result<Option<Token>> {
		self.get_token_shared().await.map_err(Error::resolution)
	}

	pub(crate) async fn get_token_shared(&self) -> Result<Option<Token>, SharedError> {
		let resolution = {
			let mut state = self.inner.state.lock();

			if let Some(token) = &state.token {
				return Ok(Some(token.clone()));
			}

			let joined = state.resolution.as_ref().map(|(_, resolution)| resolution.clone());

			match joined {
				Some(resolution) => resolution,
				None => self.inner.begin(&self.inner.getter, &mut state),
			}
		};

		OpSpan::new(Op::Resolve, "get_token").instrument(resolution).await
	}

	/// Returns the cached token without waiting.
	///
	/// The first call starts a resolution; asynchronous work is spawned on the ambient tokio
	/// runtime when one exists, so later calls observe its result.
	pub fn get_token_sync(&self) -> Result<Option<Token>> {
		let started = {
			let mut state = self.inner.state.lock();

			if state.resolution.is_some() {
				return Ok(state.token.clone());
			}

			self.inner.begin(&self.inner.getter, &mut state)
		};

		self.poll_started(started)
	}

	/// Polls a fresh resolution once: ready errors surface, pending work is driven.
	fn poll_started(&self, resolution: Resolution) -> Result<Option<Token>> {
		match resolution.clone().now_or_never() {
			Some(Err(e)) => return Err(Error::resolution(e)),
			Some(Ok(_)) => {},
			None => drive(resolution),
		}

		Ok(self.inner.state.lock().token.clone())
	}

	/// Stores `token` and resolves after every observer ran.
	///
	/// The default setter persists first; when the durable store fails, the cache is left
	/// untouched and no observer runs.
	pub async fn set_token(&self, token: Option<Token>) -> Result<()> {
		match &self.inner.setter {
			Setter::Custom(setter) =>
				setter.set(token).await.map_err(|source| Error::Setter { source }),
			Setter::Default { persist } => {
				if let Some((key, sources)) = persist {
					write_json(sources.durable().as_ref(), key, token.as_ref().map(Token::expose))?;
				}

				{
					let mut state = self.inner.state.lock();

					state.generation += 1;
					state.token = token.clone();

					let generation = state.generation;
					let ready: ResolutionFuture = Box::pin(future::ready(Ok(token.clone())));

					state.resolution = Some((generation, ready.shared()));
				}

				self.inner.notify(token, TokenScene::SetToken).await;

				Ok(())
			},
		}
	}

	/// Runs the refresher unconditionally and returns its value.
	pub async fn refresh_token(&self) -> Result<Option<Token>> {
		self.refresh_token_shared().await.map_err(Error::resolution)
	}

	pub(crate) async fn refresh_token_shared(&self) -> Result<Option<Token>, SharedError> {
		const KIND: Op = Op::Refresh;

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let resolution = {
			let mut state = self.inner.state.lock();

			self.inner.begin(&self.inner.refresher, &mut state)
		};
		let result = OpSpan::new(KIND, "refresh_token").instrument(resolution).await;

		match &result {
			Ok(_) => obs::record_op_outcome(KIND, OpOutcome::Success),
			Err(_) => obs::record_op_outcome(KIND, OpOutcome::Failure),
		}

		result
	}

	/// Runs the refresher and returns the cached token without waiting.
	///
	/// A refresher that answers synchronously is cached before this returns and its error
	/// surfaces here. A pending one is driven on the ambient runtime while the previous value
	/// is returned.
	pub fn refresh_token_sync(&self) -> Result<Option<Token>> {
		let started = {
			let mut state = self.inner.state.lock();

			self.inner.begin(&self.inner.refresher, &mut state)
		};

		self.poll_started(started)
	}

	/// [`get_token`](Self::get_token) filtered by the validator.
	pub async fn get_valid_token(&self) -> Result<Option<Token>> {
		Ok(self.get_token().await?.filter(|t| (self.inner.validator)(t)))
	}

	/// [`get_token_sync`](Self::get_token_sync) filtered by the validator.
	pub fn get_valid_token_sync(&self) -> Result<Option<Token>> {
		Ok(self.get_token_sync()?.filter(|t| (self.inner.validator)(t)))
	}

	/// Registers `observer`.
	///
	/// `ignore_first_trigger` is applied to the manager, not to this observer: it overwrites
	/// the manager-wide flag that swallows the next notification cycle. A fresh manager starts
	/// with the flag raised, so registering without it re-enables the first notification.
	pub fn on_token_change(
		&self,
		observer: impl 'static + TokenObserver,
		options: ObserveOptions,
	) -> TokenSubscription {
		let registered: Arc<dyn TokenObserver> = Arc::new(observer);
		let replay = {
			let mut state = self.inner.state.lock();

			state.suppress_next = options.ignore_first_trigger;
			self.inner.observers.write().push(registered.clone());

			if options.auto_trigger {
				state
					.token
					.clone()
					.map(|token| (token, state.last_scene.unwrap_or(TokenScene::Custom)))
			} else {
				None
			}
		};

		if let Some((token, scene)) = replay {
			match tokio::runtime::Handle::try_current() {
				Ok(handle) => {
					handle.spawn(observer::invoke(registered.clone(), Some(token), scene));
				},
				Err(_) => obs::auto_trigger_skipped(scene),
			}
		}

		TokenSubscription::new(Arc::downgrade(&self.inner), registered)
	}

	/// `true` once a resolution succeeds; never fails.
	pub async fn is_ready(&self) -> bool {
		self.get_token().await.is_ok()
	}

	/// Scene of the most recent change, if any.
	pub fn last_scene(&self) -> Option<TokenScene> {
		self.inner.state.lock().last_scene
	}
}
impl Default for TokenManager {
	fn default() -> Self {
		Self::new()
	}
}
impl Debug for TokenManager {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let state = self.inner.state.lock();

		f.debug_struct("TokenManager")
			.field("token_set", &state.token.is_some())
			.field("resolution_started", &state.resolution.is_some())
			.field("last_scene", &state.last_scene)
			.field("observers", &self.inner.observers.read().len())
			.finish()
	}
}

fn accept_all() -> TokenValidator {
	Arc::new(|_: &Token| true)
}

/// Spawns a pending resolution so it progresses without an awaiting caller.
fn drive(resolution: Resolution) {
	if resolution.peek().is_some() {
		return;
	}
	if let Ok(handle) = tokio::runtime::Handle::try_current() {
		handle.spawn(async move {
			let _ = resolution.await;
		});
	}
}
