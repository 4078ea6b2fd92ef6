//! Transport decorator attaching the managed token and replaying once after a 401.
//!
//! Each request reads the token from the [`TokenManager`]. An empty cache triggers a refresh
//! through the decorator's own gate, so concurrent requests share it, and marks the request
//! as refreshed. A 401 on a request that was not refreshed forces one more refresh and one
//! replay with the new token; whatever the replay returns is final. Every other outcome is
//! returned untouched.

mod metrics;

pub use metrics::AuthMetrics;

// self
use crate::{
	_prelude::*,
	http::{AUTHORIZATION, RequestConfig, Response, Transport, TransportDecorator, TransportFuture},
	obs::{self, Op, OpOutcome, OpSpan},
	token::{Token, TokenManager},
};

type RefreshResult = Result<Option<Token>, SharedError>;

/// Single-flight guard for decorator-initiated refreshes.
///
/// Callers that observed the gate before a refresh completed reuse its result; callers
/// arriving afterwards start a new one.
#[derive(Default)]
struct RefreshGate {
	guard: AsyncMutex<()>,
	last: Mutex<(u64, Option<RefreshResult>)>,
}
impl RefreshGate {
	async fn refresh(&self, manager: &TokenManager, metrics: &AuthMetrics) -> RefreshResult {
		let observed = self.last.lock().0;
		let _singleflight = self.guard.lock().await;

		{
			let last = self.last.lock();

			if let (true, Some(result)) = (last.0 != observed, &last.1) {
				return result.clone();
			}
		}

		metrics.record_refresh();

		let result = manager.refresh_token_shared().await;
		let mut last = self.last.lock();

		last.0 += 1;
		last.1 = Some(result.clone());

		result
	}
}

/// Authenticating [`TransportDecorator`]; clones share the refresh gate and counters.
#[derive(Clone)]
pub struct AuthDecorator {
	manager: TokenManager,
	gate: Arc<RefreshGate>,
	metrics: Arc<AuthMetrics>,
}
impl AuthDecorator {
	/// Decorator reading tokens from `manager`.
	pub fn new(manager: TokenManager) -> Self {
		Self { manager, gate: Default::default(), metrics: Default::default() }
	}

	/// Token manager backing this decorator.
	pub fn manager(&self) -> &TokenManager {
		&self.manager
	}

	/// Refresh and replay counters.
	pub fn metrics(&self) -> &AuthMetrics {
		&self.metrics
	}

	async fn authorize(&self, inner: Arc<dyn Transport>, mut config: RequestConfig) -> Result<Response> {
		let (token, refreshed) =
			match self.manager.get_token_shared().await.map_err(Error::resolution)? {
				Some(token) => (Some(token), false),
				None => (
					self.gate
						.refresh(&self.manager, &self.metrics)
						.await
						.map_err(Error::resolution)?,
					true,
				),
			};

		if let (Some(name), Some(token)) = (config.token_header.name().map(str::to_owned), &token) {
			config.set_header(&name, token.expose());
		}

		let replay = config.clone();
		let error = match inner.send(config).await {
			Ok(response) => return Ok(response),
			Err(e) => e,
		};

		if refreshed || error.status() != Some(401) {
			return Err(error);
		}

		self.replay(inner, replay, error).await
	}

	async fn replay(
		&self,
		inner: Arc<dyn Transport>,
		mut config: RequestConfig,
		error: Error,
	) -> Result<Response> {
		const KIND: Op = Op::Retry;

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let Some(token) = self.manager.refresh_token_shared().await.map_err(Error::resolution)? else {
			obs::record_op_outcome(KIND, OpOutcome::Failure);

			return Err(error);
		};

		config.set_header(AUTHORIZATION, token.expose());
		self.metrics.record_retry();

		let result = OpSpan::new(KIND, "replay").instrument(inner.send(config)).await;

		match &result {
			Ok(_) => obs::record_op_outcome(KIND, OpOutcome::Success),
			Err(_) => {
				self.metrics.record_retry_failure();
				obs::record_op_outcome(KIND, OpOutcome::Failure);
			},
		}

		result
	}
}
impl TransportDecorator for AuthDecorator {
	fn decorate(&self, inner: Arc<dyn Transport>) -> Arc<dyn Transport> {
		Arc::new(AuthTransport { decorator: self.clone(), inner })
	}
}
impl Debug for AuthDecorator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthDecorator")
			.field("manager", &self.manager)
			.field("metrics", &self.metrics)
			.finish()
	}
}

/// Transport produced by [`AuthDecorator`].
struct AuthTransport {
	decorator: AuthDecorator,
	inner: Arc<dyn Transport>,
}
impl Transport for AuthTransport {
	fn send(&self, config: RequestConfig) -> TransportFuture {
		let decorator = self.decorator.clone();
		let inner = self.inner.clone();

		Box::pin(
			OpSpan::new(Op::Authorize, "send")
				.instrument(async move { decorator.authorize(inner, config).await }),
		)
	}
}
