//! Token lifecycle management for outgoing HTTP requests: single-flight token resolution,
//! one-shot 401 retries, and ordered error escalation chains.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod client;
pub mod decorator;
pub mod error;
pub mod escalation;
pub mod http;
pub mod obs;
pub mod source;
pub mod store;
pub mod token;

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		sync::{Arc, Weak},
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use futures::future::{self, BoxFuture, FutureExt};
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use url::Url;

	pub use crate::error::{BoxError, Error, Result, SharedError};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
