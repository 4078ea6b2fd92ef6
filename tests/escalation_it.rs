// std
use std::sync::{
	Arc,
	atomic::{AtomicUsize, Ordering},
};
// crates.io
use parking_lot::Mutex;
// self
use token_warden::{
	client::{BizFailure, HttpClient, HttpClientOptions},
	error::Error,
	escalation::{ChainType, ErrorHandler, ErrorHandlerOptions, Escalation, Next, chain_handler},
	http::{HttpError, RequestConfig, Response, transport_fn},
	url::Url,
};

fn url(path: &str) -> Url {
	Url::parse("https://api.example.com/").and_then(|u| u.join(path)).expect("Fixture URL should parse.")
}

/// Answers with the status encoded in the last path segment.
fn status_echo(
	options: ErrorHandlerOptions,
) -> (HttpClientOptions, Arc<Mutex<Vec<String>>>) {
	let reported = Arc::new(Mutex::new(Vec::new()));
	let sink = reported.clone();
	let transport = transport_fn(|config: RequestConfig| async move {
		let status = config
			.url
			.path_segments()
			.and_then(|mut s| s.next_back())
			.and_then(|s| s.parse::<u16>().ok())
			.unwrap_or(200);
		let response = Response::new(status, r#"{"code":"E42","message":"quota exceeded"}"#);

		if response.is_success() {
			Ok(response)
		} else {
			Err(Error::from(HttpError::from_response(config, response)))
		}
	});
	let handler = ErrorHandler::new(options.reporter(move |m| sink.lock().push(m.to_owned())));

	(HttpClientOptions::new(transport).error_handler(handler), reported)
}

#[tokio::test]
async fn short_circuit_stops_the_chain() {
	let (options, reported) = status_echo(ErrorHandlerOptions::default());
	let client = HttpClient::new(options);
	let third = Arc::new(AtomicUsize::new(0));
	let counter = third.clone();

	client
		.chain(ChainType::Unauthorized, chain_handler(|_, next: Next| next.proceed()))
		.chain(
			ChainType::Unauthorized,
			chain_handler(|_, _| async { Escalation::message("msg") }),
		)
		.chain(
			ChainType::Unauthorized,
			chain_handler(move |_, next: Next| {
				counter.fetch_add(1, Ordering::SeqCst);

				next.proceed()
			}),
		);

	let error = client.request(RequestConfig::get(url("me/401"))).await.expect_err("401 should fail.");

	assert_eq!(error.status(), Some(401));
	assert_eq!(*reported.lock(), vec!["msg".to_owned()]);
	assert_eq!(
		client.dispatch(ChainType::Unauthorized, error.as_http().cloned().expect("HTTP failure.")).await,
		Escalation::message("msg")
	);
	assert_eq!(third.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn biz_strategy_skips_only_transport_successes() {
	let (options, reported) = status_echo(ErrorHandlerOptions::default());
	let client = HttpClient::new(options.response_check(|response| {
		(response.status == 204).then(|| BizFailure::new("E42", "quota exceeded"))
	}));
	let skipped = client
		.request(RequestConfig::get(url("orders/204")).skip_error_handle(true))
		.await
		.expect_err("Biz failure should reject.");

	assert_eq!(skipped.as_http().and_then(|e| e.code.clone()), Some("E42".into()));
	assert!(reported.lock().is_empty());

	client
		.request(RequestConfig::get(url("orders/404")).skip_error_handle(true))
		.await
		.expect_err("404 should reject.");

	assert_eq!(*reported.lock(), vec!["Request failed with status code 404.".to_owned()]);
}

#[tokio::test]
async fn clones_share_the_registry() {
	let (options, reported) = status_echo(ErrorHandlerOptions::default());
	let client = HttpClient::new(options);
	let derived = client.clone_with(|options| {
		options.response_check(|_| Some(BizFailure::new("E1", "never reached")))
	});

	derived.chain(
		ChainType::ServerError,
		chain_handler(|error: HttpError, _| async move {
			Escalation::Message(format!("upstream down ({:?})", error.status()))
		}),
	);

	assert!(client.chains().ptr_eq(derived.chains()));

	client.request(RequestConfig::get(url("health/502"))).await.expect_err("502 should reject.");

	assert_eq!(*reported.lock(), vec!["upstream down (Some(502))".to_owned()]);
}

#[tokio::test]
async fn rejection_goes_through_parse_error() {
	let (options, reported) = status_echo(
		ErrorHandlerOptions::default()
			.on_access_denied(chain_handler(|_, _| async { Escalation::Silence }))
			.parse_error(|error| match error {
				Error::Http(mut http) => {
					http.message = "forbidden".into();

					Error::Http(http)
				},
				other => other,
			}),
	);
	let client = HttpClient::new(options);
	let error = client.request(RequestConfig::get(url("admin/403"))).await.expect_err("403 should fail.");

	assert_eq!(error.to_string(), "forbidden");
	assert!(reported.lock().is_empty());
}

#[tokio::test]
async fn successful_responses_are_returned() {
	let (options, reported) = status_echo(ErrorHandlerOptions::default());
	let client = HttpClient::new(options);
	let body = client
		.request_json::<serde_json::Value>(RequestConfig::get(url("orders/200")))
		.await
		.expect("200 should succeed.");

	assert_eq!(body["code"], "E42");
	assert!(reported.lock().is_empty());
}
