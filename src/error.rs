//! Crate-level error types shared across the token manager, decorator, and escalation chain.

// self
use crate::{_prelude::*, http::HttpError};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Boxed error returned by caller-supplied getters, setters, and observers.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Reference-counted error handed to every caller joined on the same resolution.
pub type SharedError = Arc<dyn StdError + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// A token source, getter, or refresher failed.
	#[error("Token resolution failed.")]
	Resolution {
		/// Failure shared by every caller awaiting the same resolution.
		#[source]
		source: SharedError,
	},
	/// A caller-supplied token setter failed.
	#[error("Token setter failed.")]
	Setter {
		/// Setter failure.
		#[source]
		source: BoxError,
	},
	/// The request reached the transport and failed there.
	#[error(transparent)]
	Http(Box<HttpError>),
	/// Response body could not be decoded.
	#[error("Response body could not be decoded.")]
	Decode {
		/// Underlying JSON failure.
		#[source]
		source: serde_json::Error,
	},
}
impl Error {
	/// Wraps a shared resolution failure.
	pub fn resolution(source: SharedError) -> Self {
		Self::Resolution { source }
	}

	/// Returns the transport error when this failure came from an HTTP exchange.
	///
	/// This is the capability check used by the decorator and the error handler; anything
	/// that is not an [`HttpError`] is never retried nor escalated.
	pub fn as_http(&self) -> Option<&HttpError> {
		match self {
			Self::Http(e) => Some(e),
			_ => None,
		}
	}

	/// HTTP status carried by the failed response, if any.
	pub fn status(&self) -> Option<u16> {
		self.as_http().and_then(HttpError::status)
	}
}
impl From<HttpError> for Error {
	fn from(e: HttpError) -> Self {
		Self::Http(Box::new(e))
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Request method is not a valid HTTP method token.
	#[error("Request method `{method}` is invalid.")]
	InvalidMethod {
		/// Rejected method string.
		method: String,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}
