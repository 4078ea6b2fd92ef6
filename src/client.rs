//! Minimal client host: a decorated transport, an error handler, and a shared chain registry.

// self
use crate::{
	_prelude::*,
	escalation::{ChainFuture, ChainHandler, ChainType, ErrorChains, ErrorHandler, HandleError},
	http::{HttpError, RequestConfig, Response, Transport, TransportDecorator, compose},
};

/// Inspects a successful response for an application-level failure.
pub type ResponseCheck = Arc<dyn Fn(&Response) -> Option<BizFailure> + Send + Sync>;

/// Application-level failure carried by a 2xx response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BizFailure {
	/// Application error code.
	pub code: Option<String>,
	/// Human-readable message.
	pub message: String,
}
impl BizFailure {
	/// Failure with `code` and `message`.
	pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
		Self { code: Some(code.into()), message: message.into() }
	}
}

/// Options for [`HttpClient`].
#[derive(Clone)]
pub struct HttpClientOptions {
	/// Innermost transport.
	pub transport: Arc<dyn Transport>,
	/// Decorators; the first one is the outermost.
	pub decorators: Vec<Arc<dyn TransportDecorator>>,
	/// Terminal error path.
	pub error_handler: Arc<dyn HandleError>,
	/// Optional application-level check of successful responses.
	pub response_check: Option<ResponseCheck>,
}
impl HttpClientOptions {
	/// Options over `transport` with the default [`ErrorHandler`].
	pub fn new(transport: impl 'static + Transport) -> Self {
		Self {
			transport: Arc::new(transport),
			decorators: Vec::new(),
			error_handler: Arc::new(ErrorHandler::default()),
			response_check: None,
		}
	}

	/// Appends a decorator inside the ones already added.
	pub fn decorator(mut self, decorator: impl 'static + TransportDecorator) -> Self {
		self.decorators.push(Arc::new(decorator));

		self
	}

	/// Replaces the error handler.
	pub fn error_handler(mut self, handler: impl 'static + HandleError) -> Self {
		self.error_handler = Arc::new(handler);

		self
	}

	/// Installs a response check.
	pub fn response_check(
		mut self,
		check: impl 'static + Send + Sync + Fn(&Response) -> Option<BizFailure>,
	) -> Self {
		self.response_check = Some(Arc::new(check));

		self
	}
}
#[cfg(feature = "reqwest")]
impl Default for HttpClientOptions {
	fn default() -> Self {
		Self::new(crate::http::ReqwestTransport::default())
	}
}
impl Debug for HttpClientOptions {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("HttpClientOptions")
			.field("decorators", &self.decorators.len())
			.field("response_check", &self.response_check.is_some())
			.finish_non_exhaustive()
	}
}

/// HTTP client routing failures through its error handler.
///
/// Clones and [`clone_with`](Self::clone_with) derivatives share the chain registry.
#[derive(Clone)]
pub struct HttpClient {
	options: HttpClientOptions,
	transport: Arc<dyn Transport>,
	chains: ErrorChains,
}
impl HttpClient {
	/// Builds a client with an empty chain registry.
	pub fn new(options: HttpClientOptions) -> Self {
		Self::with_chains(options, ErrorChains::new())
	}

	fn with_chains(options: HttpClientOptions, chains: ErrorChains) -> Self {
		let transport = compose(options.transport.clone(), &options.decorators);

		Self { options, transport, chains }
	}

	/// Options the client was built from.
	pub fn options(&self) -> &HttpClientOptions {
		&self.options
	}

	/// Shared chain registry.
	pub fn chains(&self) -> &ErrorChains {
		&self.chains
	}

	/// Appends `handler` to the `ty` chain.
	pub fn chain(&self, ty: ChainType, handler: impl 'static + ChainHandler) -> &Self {
		self.chains.chain(ty, handler);

		self
	}

	/// Runs the `ty` chain for `error`.
	pub fn dispatch(&self, ty: ChainType, error: HttpError) -> ChainFuture {
		self.chains.dispatch(ty, error)
	}

	/// Derives a client from modified options; the registry stays shared.
	pub fn clone_with(&self, f: impl FnOnce(HttpClientOptions) -> HttpClientOptions) -> Self {
		Self::with_chains(f(self.options.clone()), self.chains.clone())
	}

	/// Sends `config`; failures are reported through the error handler before returning.
	pub async fn request(&self, config: RequestConfig) -> Result<Response> {
		let response = match self.transport.send(config.clone()).await {
			Ok(response) => response,
			Err(e) => return Err(self.reject(e).await),
		};
		let failure = self.options.response_check.as_ref().and_then(|check| check(&response));

		match failure {
			None => Ok(response),
			Some(BizFailure { code, message }) =>
				Err(self.reject(HttpError::biz(config, response, code, message).into()).await),
		}
	}

	/// [`request`](Self::request) decoding the body as JSON.
	pub async fn request_json<T>(&self, config: RequestConfig) -> Result<T>
	where
		T: for<'de> Deserialize<'de>,
	{
		self.request(config).await?.json()
	}

	async fn reject(&self, error: Error) -> Error {
		self.options.error_handler.handle(error, self.chains.clone()).await
	}
}
impl Debug for HttpClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("HttpClient")
			.field("options", &self.options)
			.field("chains", &self.chains)
			.finish()
	}
}
