//! Caller-supplied token getters and setters.

// self
use crate::{_prelude::*, token::Token};

/// Boxed future produced by an asynchronous [`TokenGetter`].
pub type TokenFuture = BoxFuture<'static, Result<Option<Token>, BoxError>>;

/// Boxed future produced by a [`TokenSetter`].
pub type SetterFuture = BoxFuture<'static, Result<(), BoxError>>;

/// Validator applied by [`TokenManager::get_valid_token`](crate::token::TokenManager::get_valid_token).
pub type TokenValidator = Arc<dyn Fn(&Token) -> bool + Send + Sync>;

/// Outcome of invoking a [`TokenGetter`].
///
/// `Ready` results are cached before the manager call returns, so synchronous readers see
/// them immediately. `Pending` results are cached once the future settles.
pub enum TokenFetch {
	/// The getter answered synchronously.
	Ready(Result<Option<Token>, BoxError>),
	/// The getter needs to suspend.
	Pending(TokenFuture),
}
impl TokenFetch {
	/// Wraps an asynchronous answer.
	pub fn pending<Fut>(fut: Fut) -> Self
	where
		Fut: 'static + Send + Future<Output = Result<Option<Token>, BoxError>>,
	{
		Self::Pending(Box::pin(fut))
	}

	/// Converts either variant into a future.
	pub fn into_future(self) -> TokenFuture {
		match self {
			Self::Ready(result) => Box::pin(future::ready(result)),
			Self::Pending(fut) => fut,
		}
	}
}
impl Debug for TokenFetch {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Ready(result) => f.debug_tuple("TokenFetch::Ready").field(result).finish(),
			Self::Pending(_) => f.write_str("TokenFetch::Pending(..)"),
		}
	}
}

/// Produces the current token; used for resolution and refresh.
pub trait TokenGetter
where
	Self: Send + Sync,
{
	/// Starts one resolution.
	fn fetch(&self) -> TokenFetch;
}

/// Stores a new token on behalf of the manager.
pub trait TokenSetter
where
	Self: Send + Sync,
{
	/// Persists `token`; `None` clears it.
	fn set(&self, token: Option<Token>) -> SetterFuture;
}

/// [`TokenGetter`] backed by an async closure.
#[derive(Clone)]
pub struct AsyncGetter<F>(F);
impl<F, Fut, E> TokenGetter for AsyncGetter<F>
where
	F: Send + Sync + Fn() -> Fut,
	Fut: 'static + Send + Future<Output = Result<Option<Token>, E>>,
	E: Into<BoxError>,
{
	fn fetch(&self) -> TokenFetch {
		let fut = (self.0)();

		TokenFetch::pending(async move { fut.await.map_err(Into::<BoxError>::into) })
	}
}

/// [`TokenGetter`] backed by a synchronous closure.
#[derive(Clone)]
pub struct SyncGetter<F>(F);
impl<F, E> TokenGetter for SyncGetter<F>
where
	F: Send + Sync + Fn() -> Result<Option<Token>, E>,
	E: Into<BoxError>,
{
	fn fetch(&self) -> TokenFetch {
		TokenFetch::Ready((self.0)().map_err(Into::<BoxError>::into))
	}
}

/// [`TokenSetter`] backed by an async closure.
#[derive(Clone)]
pub struct FnSetter<F>(F);
impl<F, Fut, E> TokenSetter for FnSetter<F>
where
	F: Send + Sync + Fn(Option<Token>) -> Fut,
	Fut: 'static + Send + Future<Output = Result<(), E>>,
	E: Into<BoxError>,
{
	fn set(&self, token: Option<Token>) -> SetterFuture {
		let fut = (self.0)(token);

		Box::pin(async move { fut.await.map_err(Into::<BoxError>::into) })
	}
}

/// Builds a getter from an async closure.
pub fn getter<F, Fut, E>(f: F) -> AsyncGetter<F>
where
	F: Send + Sync + Fn() -> Fut,
	Fut: 'static + Send + Future<Output = Result<Option<Token>, E>>,
	E: Into<BoxError>,
{
	AsyncGetter(f)
}

/// Builds a getter from a synchronous closure.
pub fn getter_sync<F, E>(f: F) -> SyncGetter<F>
where
	F: Send + Sync + Fn() -> Result<Option<Token>, E>,
	E: Into<BoxError>,
{
	SyncGetter(f)
}

/// Builds a setter from an async closure.
pub fn setter<F, Fut, E>(f: F) -> FnSetter<F>
where
	F: Send + Sync + Fn(Option<Token>) -> Fut,
	Fut: 'static + Send + Future<Output = Result<(), E>>,
	E: Into<BoxError>,
{
	FnSetter(f)
}
