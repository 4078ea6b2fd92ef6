//! Request/response model and the transport seam decorators wrap.
//!
//! A [`Transport`] turns a [`RequestConfig`] into a [`Response`] or an [`Error`]. Failures
//! that reached the network surface as [`HttpError`] (inside [`Error::Http`]) so the
//! decorator and the error handler can inspect the status. [`TransportDecorator`]s wrap a
//! transport in another transport; [`compose`] applies a list of them.

#[cfg(feature = "reqwest")] mod adapter;

#[cfg(feature = "reqwest")] pub use adapter::*;

// self
use crate::{_prelude::*, escalation::SkipStrategy};

/// Header carrying the token unless a request overrides it.
pub const AUTHORIZATION: &str = "Authorization";

/// Boxed future returned by a [`Transport`].
pub type TransportFuture = BoxFuture<'static, Result<Response>>;

/// Where the token goes on an outgoing request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum TokenHeader {
	/// The [`AUTHORIZATION`] header.
	#[default]
	Default,
	/// A custom header name.
	Named(String),
	/// No header is attached.
	Disabled,
}
impl TokenHeader {
	/// Header name to set, if any.
	pub fn name(&self) -> Option<&str> {
		match self {
			Self::Default => Some(AUTHORIZATION),
			Self::Named(name) => Some(name),
			Self::Disabled => None,
		}
	}
}

/// Outgoing request description.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestConfig {
	/// HTTP method token, e.g. `GET`.
	pub method: String,
	/// Absolute request URL.
	pub url: Url,
	/// Request headers; later writes replace earlier values.
	pub headers: BTreeMap<String, String>,
	/// Raw request body.
	pub body: Option<Vec<u8>>,
	/// Token header placement.
	pub token_header: TokenHeader,
	/// Asks the error handler to stay quiet about this request's failures.
	pub skip_error_handle: bool,
	/// Per-request skip strategy, taking precedence over the handler's configuration.
	pub skip_strategy: Option<SkipStrategy>,
}
impl RequestConfig {
	/// Creates a request with no headers and no body.
	pub fn new(method: impl Into<String>, url: Url) -> Self {
		Self {
			method: method.into(),
			url,
			headers: BTreeMap::new(),
			body: None,
			token_header: TokenHeader::Default,
			skip_error_handle: false,
			skip_strategy: None,
		}
	}

	/// `GET` request.
	pub fn get(url: Url) -> Self {
		Self::new("GET", url)
	}

	/// `POST` request.
	pub fn post(url: Url) -> Self {
		Self::new("POST", url)
	}

	/// Sets a header.
	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.insert(name.into(), value.into());

		self
	}

	/// Sets the body.
	pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = Some(body.into());

		self
	}

	/// Overrides the token header placement.
	pub fn with_token_header(mut self, token_header: TokenHeader) -> Self {
		self.token_header = token_header;

		self
	}

	/// Marks the request as one the error handler should skip (subject to the strategy).
	pub fn skip_error_handle(mut self, skip: bool) -> Self {
		self.skip_error_handle = skip;

		self
	}

	/// Overrides the skip strategy for this request.
	pub fn with_skip_strategy(mut self, strategy: SkipStrategy) -> Self {
		self.skip_strategy = Some(strategy);

		self
	}

	pub(crate) fn set_header(&mut self, name: &str, value: &str) {
		self.headers.insert(name.to_owned(), value.to_owned());
	}
}

/// Response returned by a transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
	/// HTTP status code.
	pub status: u16,
	/// Response headers with lowercase names.
	pub headers: BTreeMap<String, String>,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl Response {
	/// Response with no headers.
	pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
		Self { status, headers: BTreeMap::new(), body: body.into() }
	}

	/// `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// Decodes the body as JSON.
	pub fn json<T>(&self) -> Result<T>
	where
		T: for<'de> Deserialize<'de>,
	{
		serde_json::from_slice(&self.body).map_err(|source| Error::Decode { source })
	}

	/// Body as lossy UTF-8.
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}
}

/// Failure of a request that reached the transport.
///
/// Carries the request config so a retry can replay it, and the response when the server
/// answered.
#[derive(Clone, Debug, ThisError)]
#[error("{message}")]
pub struct HttpError {
	/// Request that failed.
	pub config: RequestConfig,
	/// Server response, absent for network failures.
	pub response: Option<Response>,
	/// Human-readable message.
	pub message: String,
	/// Application-level error code, when a response check produced one.
	pub code: Option<String>,
	/// Underlying transport failure.
	#[source]
	pub source: Option<SharedError>,
}
impl HttpError {
	/// Error without response.
	pub fn new(config: RequestConfig, message: impl Into<String>) -> Self {
		Self { config, response: None, message: message.into(), code: None, source: None }
	}

	/// Error for a non-2xx response.
	pub fn from_response(config: RequestConfig, response: Response) -> Self {
		let message = format!("Request failed with status code {}.", response.status);

		Self { config, response: Some(response), message, code: None, source: None }
	}

	/// Error for a request that never produced a response.
	pub fn network(config: RequestConfig, source: impl 'static + Send + Sync + StdError) -> Self {
		let message = source.to_string();

		Self { config, response: None, message, code: None, source: Some(Arc::new(source)) }
	}

	/// Application-level failure carried by an otherwise successful response.
	pub fn biz(
		config: RequestConfig,
		response: Response,
		code: Option<String>,
		message: impl Into<String>,
	) -> Self {
		Self { config, response: Some(response), message: message.into(), code, source: None }
	}

	/// Response status, if the server answered.
	pub fn status(&self) -> Option<u16> {
		self.response.as_ref().map(|r| r.status)
	}
}

/// Sends requests.
pub trait Transport
where
	Self: Send + Sync,
{
	/// Sends `config` and resolves with the response or the failure.
	fn send(&self, config: RequestConfig) -> TransportFuture;
}

/// Wraps a transport in another transport.
pub trait TransportDecorator
where
	Self: Send + Sync,
{
	/// Returns a transport delegating to `inner`.
	fn decorate(&self, inner: Arc<dyn Transport>) -> Arc<dyn Transport>;
}

/// [`Transport`] backed by a closure.
#[derive(Clone)]
pub struct TransportFn<F>(F);
impl<F, Fut> Transport for TransportFn<F>
where
	F: Send + Sync + Fn(RequestConfig) -> Fut,
	Fut: 'static + Send + Future<Output = Result<Response>>,
{
	fn send(&self, config: RequestConfig) -> TransportFuture {
		Box::pin((self.0)(config))
	}
}

/// Builds a transport from an async closure.
pub fn transport_fn<F, Fut>(f: F) -> TransportFn<F>
where
	F: Send + Sync + Fn(RequestConfig) -> Fut,
	Fut: 'static + Send + Future<Output = Result<Response>>,
{
	TransportFn(f)
}

/// Applies `decorators` to `transport`; the first decorator is the outermost.
pub fn compose(
	transport: Arc<dyn Transport>,
	decorators: &[Arc<dyn TransportDecorator>],
) -> Arc<dyn Transport> {
	decorators.iter().rev().fold(transport, |inner, decorator| decorator.decorate(inner))
}
