// std
use std::ops::Deref;
// crates.io
use reqwest::Method;
// self
use crate::{
	_prelude::*,
	error::ConfigError,
	http::{HttpError, RequestConfig, Response, Transport, TransportFuture},
};

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Non-2xx responses are rejected with an [`HttpError`] carrying the response; failures
/// before a response arrives are rejected with one that carries none.
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
impl Deref for ReqwestTransport {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
impl Transport for ReqwestTransport {
	fn send(&self, config: RequestConfig) -> TransportFuture {
		Box::pin(execute(self.0.clone(), config))
	}
}

async fn execute(client: ReqwestClient, config: RequestConfig) -> Result<Response> {
	let method = Method::from_bytes(config.method.as_bytes())
		.map_err(|_| ConfigError::InvalidMethod { method: config.method.clone() })?;
	let mut builder = client.request(method, config.url.clone());

	for (name, value) in &config.headers {
		builder = builder.header(name.as_str(), value.as_str());
	}
	if let Some(body) = &config.body {
		builder = builder.body(body.clone());
	}

	let response = match builder.send().await {
		Ok(response) => response,
		Err(e) => return Err(HttpError::network(config, e).into()),
	};
	let status = response.status().as_u16();
	let headers = response
		.headers()
		.iter()
		.filter_map(|(name, value)| {
			value.to_str().ok().map(|value| (name.as_str().to_owned(), value.to_owned()))
		})
		.collect();
	let body = match response.bytes().await {
		Ok(body) => body.to_vec(),
		Err(e) => return Err(HttpError::network(config, e).into()),
	};
	let response = Response { status, headers, body };

	if response.is_success() {
		Ok(response)
	} else {
		Err(HttpError::from_response(config, response).into())
	}
}
