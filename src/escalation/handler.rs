//! Composite error handler: skip check, status routing, message resolution, reporting.
//!
//! The handler never swallows a failure. Reporting is a side effect; the returned error is
//! always the one the caller rejects with.

// self
use crate::{
	_prelude::*,
	escalation::{ChainFuture, ChainHandler, ChainType, ErrorChains, Escalation, Next, SkipStrategy},
	http::HttpError,
	obs::{self, Op, OpOutcome, OpSpan},
};

/// Boxed future resolving to the error the caller rejects with.
pub type HandleFuture = BoxFuture<'static, Error>;

/// Transforms the final rejection.
pub type ErrorParser = Arc<dyn Fn(Error) -> Error + Send + Sync>;

/// Extracts a message when the chain decided nothing.
pub type MessageExtractor = Arc<dyn Fn(&HttpError) -> Escalation + Send + Sync>;

/// Renders a resolved message.
pub type Reporter = Arc<dyn Fn(&str) + Send + Sync>;

/// Decides whether a failure bypasses escalation.
pub type SkipPredicate = Arc<dyn Fn(&HttpError) -> bool + Send + Sync>;

/// Terminal error path of a client.
pub trait HandleError
where
	Self: Send + Sync,
{
	/// Handles `error` against the client's `chains` and returns the rejection.
	fn handle(&self, error: Error, chains: ErrorChains) -> HandleFuture;
}

/// Options for [`ErrorHandler`].
///
/// Every field is optional: identity parsing, the error's own message, `tracing` reporting,
/// the [`SkipStrategy::Biz`] strategy and pass-through class handlers.
#[derive(Clone, Default)]
pub struct ErrorHandlerOptions {
	parse_error: Option<ErrorParser>,
	message: Option<MessageExtractor>,
	reporter: Option<Reporter>,
	skip: Option<SkipPredicate>,
	skip_strategy: SkipStrategy,
	on_unauthorized: Option<Arc<dyn ChainHandler>>,
	on_access_denied: Option<Arc<dyn ChainHandler>>,
	on_server_error: Option<Arc<dyn ChainHandler>>,
}
impl ErrorHandlerOptions {
	/// Transforms the final rejection.
	pub fn parse_error(mut self, f: impl 'static + Send + Sync + Fn(Error) -> Error) -> Self {
		self.parse_error = Some(Arc::new(f));

		self
	}

	/// Custom message extraction, consulted when the chain passes.
	pub fn message(mut self, f: impl 'static + Send + Sync + Fn(&HttpError) -> Escalation) -> Self {
		self.message = Some(Arc::new(f));

		self
	}

	/// Replaces the default `tracing` reporter.
	pub fn reporter(mut self, f: impl 'static + Send + Sync + Fn(&str)) -> Self {
		self.reporter = Some(Arc::new(f));

		self
	}

	/// Custom skip predicate; takes precedence over the named strategy.
	pub fn skip_error_handle(mut self, f: impl 'static + Send + Sync + Fn(&HttpError) -> bool) -> Self {
		self.skip = Some(Arc::new(f));

		self
	}

	/// Named skip strategy.
	pub fn skip_strategy(mut self, strategy: SkipStrategy) -> Self {
		self.skip_strategy = strategy;

		self
	}

	/// Handler wrapped around the unauthorized chain.
	pub fn on_unauthorized(mut self, handler: impl 'static + ChainHandler) -> Self {
		self.on_unauthorized = Some(Arc::new(handler));

		self
	}

	/// Handler wrapped around the access-denied chain.
	pub fn on_access_denied(mut self, handler: impl 'static + ChainHandler) -> Self {
		self.on_access_denied = Some(Arc::new(handler));

		self
	}

	/// Handler wrapped around the server-error chain.
	pub fn on_server_error(mut self, handler: impl 'static + ChainHandler) -> Self {
		self.on_server_error = Some(Arc::new(handler));

		self
	}

	fn class_handler(&self, ty: ChainType) -> Option<Arc<dyn ChainHandler>> {
		match ty {
			ChainType::Unauthorized => self.on_unauthorized.clone(),
			ChainType::AccessDenied => self.on_access_denied.clone(),
			ChainType::ServerError => self.on_server_error.clone(),
		}
	}

	fn is_skipped(&self, error: &HttpError) -> bool {
		if let Some(strategy) = error.config.skip_strategy {
			return strategy.should_skip(error);
		}

		match &self.skip {
			Some(skip) => skip(error),
			None => self.skip_strategy.should_skip(error),
		}
	}

	fn resolve_message(&self, error: &HttpError, escalation: Escalation) -> Escalation {
		let fallback = || Escalation::Message(error.message.clone());

		match escalation {
			Escalation::Pass => match &self.message {
				Some(extract) => match extract(error) {
					Escalation::Pass => fallback(),
					decided => decided,
				},
				None => fallback(),
			},
			decided => decided,
		}
	}

	fn report(&self, message: &str) {
		match &self.reporter {
			Some(report) => report(message),
			None => obs::report_message(message),
		}
	}
}
impl Debug for ErrorHandlerOptions {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ErrorHandlerOptions")
			.field("skip_strategy", &self.skip_strategy)
			.field("custom_skip", &self.skip.is_some())
			.field("custom_message", &self.message.is_some())
			.field("custom_reporter", &self.reporter.is_some())
			.finish_non_exhaustive()
	}
}

/// Default [`HandleError`] implementation.
#[derive(Clone, Debug, Default)]
pub struct ErrorHandler(Arc<ErrorHandlerOptions>);
impl ErrorHandler {
	/// Builds the handler.
	pub fn new(options: ErrorHandlerOptions) -> Self {
		Self(Arc::new(options))
	}
}
impl HandleError for ErrorHandler {
	fn handle(&self, error: Error, chains: ErrorChains) -> HandleFuture {
		const KIND: Op = Op::Escalate;

		let options = self.0.clone();

		Box::pin(async move {
			let escalated = error.as_http().filter(|e| !options.is_skipped(e)).cloned();

			if let Some(http) = escalated {
				obs::record_op_outcome(KIND, OpOutcome::Attempt);

				let outcome =
					OpSpan::new(KIND, "handle").instrument(escalate(options.clone(), chains, http)).await;

				if let Some(message) = outcome.into_message().filter(|m| !m.is_empty()) {
					options.report(&message);
				}

				obs::record_op_outcome(KIND, OpOutcome::Success);
			}

			match &options.parse_error {
				Some(parse) => parse(error),
				None => error,
			}
		})
	}
}

/// Routes `error` by status; the class handler's continuation runs the registry chain and
/// resolves the message.
fn escalate(options: Arc<ErrorHandlerOptions>, chains: ErrorChains, error: HttpError) -> ChainFuture {
	let Some(ty) = error.status().and_then(ChainType::from_status) else {
		return Box::pin(future::ready(options.resolve_message(&error, Escalation::Pass)));
	};
	let handler = options.class_handler(ty);
	let next = Next::new(error.clone(), move |error| {
		Box::pin(async move {
			let escalation = chains.dispatch(ty, error.clone()).await;

			options.resolve_message(&error, escalation)
		})
	});

	match handler {
		Some(handler) => handler.handle(error, next),
		None => next.proceed(),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		escalation::chain_handler,
		http::{RequestConfig, Response},
	};

	fn failed(status: u16, config: impl FnOnce(RequestConfig) -> RequestConfig) -> Error {
		let url = Url::parse("https://api.example.com/orders").expect("Fixture URL should parse.");

		HttpError::from_response(config(RequestConfig::get(url)), Response::new(status, "")).into()
	}

	fn collecting(options: ErrorHandlerOptions) -> (ErrorHandler, Arc<Mutex<Vec<String>>>) {
		let reported = Arc::new(Mutex::new(Vec::new()));
		let sink = reported.clone();
		let handler =
			ErrorHandler::new(options.reporter(move |message| sink.lock().push(message.to_owned())));

		(handler, reported)
	}

	#[tokio::test]
	async fn falls_back_to_the_error_message() {
		let (handler, reported) = collecting(ErrorHandlerOptions::default());
		let rejected = handler.handle(failed(404, |c| c), ErrorChains::new()).await;

		assert_eq!(rejected.status(), Some(404));
		assert_eq!(*reported.lock(), vec!["Request failed with status code 404.".to_owned()]);
	}

	#[tokio::test]
	async fn per_request_strategy_beats_configured_predicate() {
		let (handler, reported) =
			collecting(ErrorHandlerOptions::default().skip_error_handle(|_| false));

		handler
			.handle(
				failed(500, |c| c.skip_error_handle(true).with_skip_strategy(SkipStrategy::All)),
				ErrorChains::new(),
			)
			.await;
		handler.handle(failed(500, |c| c.skip_error_handle(true)), ErrorChains::new()).await;

		assert_eq!(reported.lock().len(), 1);
	}

	#[tokio::test]
	async fn silence_and_extractor_decide_the_message() {
		let chains = ErrorChains::new();

		chains.chain(
			ChainType::AccessDenied,
			chain_handler(|_, _| future::ready(Escalation::Silence)),
		);

		let (handler, reported) = collecting(
			ErrorHandlerOptions::default().message(|e| Escalation::message(format!("custom {:?}", e.status()))),
		);

		handler.handle(failed(403, |c| c), chains.clone()).await;
		handler.handle(failed(503, |c| c), chains).await;

		assert_eq!(*reported.lock(), vec!["custom Some(503)".to_owned()]);
	}

	#[tokio::test]
	async fn class_handler_can_short_circuit_the_registry() {
		let chains = ErrorChains::new();

		chains.chain(
			ChainType::Unauthorized,
			chain_handler(|_, _| future::ready(Escalation::message("from chain"))),
		);

		let (handler, reported) = collecting(
			ErrorHandlerOptions::default()
				.on_unauthorized(chain_handler(|_, _| future::ready(Escalation::message("login again")))),
		);

		handler.handle(failed(401, |c| c), chains).await;

		assert_eq!(*reported.lock(), vec!["login again".to_owned()]);
	}

	#[tokio::test]
	async fn non_http_failures_are_only_parsed() {
		let (handler, reported) = collecting(
			ErrorHandlerOptions::default()
				.parse_error(|e| Error::Setter { source: format!("wrapped: {e}").into() }),
		);
		let rejected = handler
			.handle(Error::Setter { source: "offline".into() }, ErrorChains::new())
			.await;

		assert!(reported.lock().is_empty());
		assert_eq!(
			StdError::source(&rejected).map(|e| e.to_string()),
			Some("wrapped: Token setter failed.".into())
		);
	}
}
