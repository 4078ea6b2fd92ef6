//! Ordered error-escalation chains with explicit continuation.
//!
//! Handlers registered for a [`ChainType`] run front to back. Each one receives the error and
//! a [`Next`] continuation; it either advances the chain through [`Next::proceed`] (optionally
//! with a replacement error) or returns its own [`Escalation`], which ends the dispatch.
//! Handlers that neither advance nor return keep the dispatch pending.

pub mod handler;
pub mod skip;

pub use handler::*;
pub use skip::*;

// self
use crate::{_prelude::*, http::HttpError};

/// Boxed future produced by a chain step.
pub type ChainFuture = BoxFuture<'static, Escalation>;

/// Status class selecting which chain handles an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChainType {
	/// 401 responses.
	Unauthorized,
	/// 403 responses.
	AccessDenied,
	/// 5xx responses.
	ServerError,
}
impl ChainType {
	/// Classifies a response status; other statuses have no chain.
	pub fn from_status(status: u16) -> Option<Self> {
		match status {
			401 => Some(Self::Unauthorized),
			403 => Some(Self::AccessDenied),
			500..=u16::MAX => Some(Self::ServerError),
			_ => None,
		}
	}

	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			ChainType::Unauthorized => "unauthorized",
			ChainType::AccessDenied => "access_denied",
			ChainType::ServerError => "server_error",
		}
	}
}
impl Display for ChainType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Result of a chain dispatch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Escalation {
	/// Nothing decided; later stages pick the message.
	#[default]
	Pass,
	/// Decided: report nothing.
	Silence,
	/// Decided: report this message.
	Message(String),
}
impl Escalation {
	/// Shorthand for [`Escalation::Message`].
	pub fn message(message: impl Into<String>) -> Self {
		Self::Message(message.into())
	}

	/// The message, when one was decided.
	pub fn into_message(self) -> Option<String> {
		match self {
			Self::Message(message) => Some(message),
			_ => None,
		}
	}
}

/// One link of an error chain.
pub trait ChainHandler
where
	Self: Send + Sync,
{
	/// Handles `error`; call `next` to defer to the rest of the chain.
	fn handle(&self, error: HttpError, next: Next) -> ChainFuture;
}

/// [`ChainHandler`] backed by an async closure.
#[derive(Clone)]
pub struct FnChainHandler<F>(F);
impl<F, Fut> ChainHandler for FnChainHandler<F>
where
	F: Send + Sync + Fn(HttpError, Next) -> Fut,
	Fut: 'static + Send + Future<Output = Escalation>,
{
	fn handle(&self, error: HttpError, next: Next) -> ChainFuture {
		Box::pin((self.0)(error, next))
	}
}

/// Builds a chain handler from an async closure.
pub fn chain_handler<F, Fut>(f: F) -> FnChainHandler<F>
where
	F: Send + Sync + Fn(HttpError, Next) -> Fut,
	Fut: 'static + Send + Future<Output = Escalation>,
{
	FnChainHandler(f)
}

/// Continuation bound to the rest of a chain.
pub struct Next {
	error: HttpError,
	step: Box<dyn FnOnce(HttpError) -> ChainFuture + Send>,
}
impl Next {
	pub(crate) fn new(
		error: HttpError,
		step: impl 'static + Send + FnOnce(HttpError) -> ChainFuture,
	) -> Self {
		Self { error, step: Box::new(step) }
	}

	/// Error this link received.
	pub fn error(&self) -> &HttpError {
		&self.error
	}

	/// Runs the rest of the chain with the received error.
	pub fn proceed(self) -> ChainFuture {
		(self.step)(self.error)
	}

	/// Runs the rest of the chain with `error` instead.
	pub fn proceed_with(self, error: HttpError) -> ChainFuture {
		(self.step)(error)
	}
}
impl Debug for Next {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Next").field("error", &self.error.message).finish_non_exhaustive()
	}
}

type Chain = Arc<Vec<Arc<dyn ChainHandler>>>;

/// Registry of chains; clones share it.
#[derive(Clone, Default)]
pub struct ErrorChains(Arc<RwLock<HashMap<ChainType, Chain>>>);
impl ErrorChains {
	/// Empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends `handler` to the `ty` chain.
	pub fn chain(&self, ty: ChainType, handler: impl 'static + ChainHandler) -> &Self {
		let mut chains = self.0.write();
		let chain = chains.entry(ty).or_default();

		Arc::make_mut(chain).push(Arc::new(handler));

		self
	}

	/// Number of handlers registered for `ty`.
	pub fn len(&self, ty: ChainType) -> usize {
		self.0.read().get(&ty).map_or(0, |chain| chain.len())
	}

	/// Runs the `ty` chain over the handlers registered when the dispatch starts.
	pub fn dispatch(&self, ty: ChainType, error: HttpError) -> ChainFuture {
		let chain = self.0.read().get(&ty).cloned().unwrap_or_default();

		advance(chain, 0, error)
	}

	/// `true` when both values share the same registry.
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.0, &other.0)
	}
}
impl Debug for ErrorChains {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let chains = self.0.read();
		let mut map = f.debug_map();

		for (ty, chain) in chains.iter() {
			map.entry(ty, &chain.len());
		}

		map.finish()
	}
}

fn advance(chain: Chain, idx: usize, error: HttpError) -> ChainFuture {
	let Some(handler) = chain.get(idx).cloned() else {
		return Box::pin(future::ready(Escalation::Pass));
	};
	let next = Next::new(error.clone(), move |error| advance(chain, idx + 1, error));

	handler.handle(error, next)
}
