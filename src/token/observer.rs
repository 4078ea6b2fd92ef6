//! Token change observers and their subscriptions.

// std
use std::panic::AssertUnwindSafe;
// self
use crate::{
	_prelude::*,
	obs,
	token::{Token, TokenScene, manager::ManagerInner},
};

/// Boxed future returned by a [`TokenObserver`].
pub type ObserverFuture = BoxFuture<'static, Result<(), BoxError>>;

/// Callback invoked when the managed token changes.
pub trait TokenObserver
where
	Self: Send + Sync,
{
	/// Reacts to a new token value and the scene that produced it.
	fn on_change(&self, token: Option<Token>, scene: TokenScene) -> ObserverFuture;
}

/// [`TokenObserver`] backed by an async closure.
#[derive(Clone)]
pub struct FnObserver<F>(F);
impl<F, Fut, E> TokenObserver for FnObserver<F>
where
	F: Send + Sync + Fn(Option<Token>, TokenScene) -> Fut,
	Fut: 'static + Send + Future<Output = Result<(), E>>,
	E: Into<BoxError>,
{
	fn on_change(&self, token: Option<Token>, scene: TokenScene) -> ObserverFuture {
		let fut = (self.0)(token, scene);

		Box::pin(async move { fut.await.map_err(Into::<BoxError>::into) })
	}
}

/// Builds an observer from an async closure.
pub fn observer<F, Fut, E>(f: F) -> FnObserver<F>
where
	F: Send + Sync + Fn(Option<Token>, TokenScene) -> Fut,
	Fut: 'static + Send + Future<Output = Result<(), E>>,
	E: Into<BoxError>,
{
	FnObserver(f)
}

/// Registration flags for [`TokenManager::on_token_change`](crate::token::TokenManager::on_token_change).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ObserveOptions {
	/// Replays the cached token (if any) to this observer once, on a spawned task.
	pub auto_trigger: bool,
	/// Swallows the manager's next notification cycle for every observer.
	pub ignore_first_trigger: bool,
}
impl ObserveOptions {
	/// Enables the cached-token replay.
	pub fn auto_trigger(mut self) -> Self {
		self.auto_trigger = true;

		self
	}

	/// Swallows the next notification cycle.
	pub fn ignore_first_trigger(mut self) -> Self {
		self.ignore_first_trigger = true;

		self
	}
}

/// Handle returned by [`TokenManager::on_token_change`](crate::token::TokenManager::on_token_change).
///
/// Dropping the handle keeps the observer registered; call [`unsubscribe`](Self::unsubscribe)
/// to remove it.
pub struct TokenSubscription {
	manager: Weak<ManagerInner>,
	observer: Arc<dyn TokenObserver>,
}
impl TokenSubscription {
	pub(crate) fn new(manager: Weak<ManagerInner>, observer: Arc<dyn TokenObserver>) -> Self {
		Self { manager, observer }
	}

	/// Removes this exact observer registration. Returns `false` if it was already gone.
	pub fn unsubscribe(self) -> bool {
		let Some(manager) = self.manager.upgrade() else {
			return false;
		};
		let mut observers = manager.observers.write();
		let Some(idx) = observers.iter().position(|o| same_observer(o, &self.observer)) else {
			return false;
		};

		observers.remove(idx);

		true
	}
}
impl Debug for TokenSubscription {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("TokenSubscription(..)")
	}
}

pub(crate) fn same_observer(a: &Arc<dyn TokenObserver>, b: &Arc<dyn TokenObserver>) -> bool {
	std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Runs one observer, logging (and swallowing) its failure or panic.
pub(crate) async fn invoke(observer: Arc<dyn TokenObserver>, token: Option<Token>, scene: TokenScene) {
	let outcome = AssertUnwindSafe(async move { observer.on_change(token, scene).await })
		.catch_unwind()
		.await;

	match outcome {
		Ok(Ok(())) => {},
		Ok(Err(e)) => obs::observer_failed(scene, &e),
		Err(_) => obs::observer_failed(scene, &"observer panicked"),
	}
}
