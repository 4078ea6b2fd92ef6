// std
use std::{
	env, fs, process,
	sync::{
		Arc, OnceLock,
		atomic::{AtomicUsize, Ordering},
	},
	time::{Duration, SystemTime, UNIX_EPOCH},
};
// crates.io
use parking_lot::Mutex;
// self
use token_warden::{
	error::{BoxError, Error},
	source::{Location, TokenSources},
	store::{FileStore, KeyValueStore, MemoryStore, StoreError, read_json_or_raw},
	token::{
		ObserveOptions, Token, TokenManager, TokenManagerOptions, TokenScene, getter, getter_sync,
		observer,
	},
	url::Url,
};

type Seen = Arc<Mutex<Vec<(Option<Token>, TokenScene)>>>;

fn recording(seen: &Seen) -> impl 'static + token_warden::token::TokenObserver {
	let sink = seen.clone();

	observer(move |token, scene| {
		let sink = sink.clone();

		async move {
			sink.lock().push((token, scene));

			Ok::<_, BoxError>(())
		}
	})
}

#[tokio::test]
async fn concurrent_callers_share_one_resolution() {
	let calls = Arc::new(AtomicUsize::new(0));
	let counter = calls.clone();
	let manager = TokenManager::with_getter(getter(move || {
		counter.fetch_add(1, Ordering::SeqCst);

		async {
			tokio::time::sleep(Duration::from_millis(20)).await;

			Ok::<_, BoxError>(Some(Token::new("T1")))
		}
	}));
	let tasks = (0..8)
		.map(|_| {
			let manager = manager.clone();

			tokio::spawn(async move { manager.get_token().await })
		})
		.collect::<Vec<_>>();

	for task in tasks {
		let token = task.await.expect("Task should join.").expect("Resolution should succeed.");

		assert_eq!(token, Some(Token::new("T1")));
	}

	assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn refresh_bypasses_the_cache() {
	let calls = Arc::new(AtomicUsize::new(0));
	let counter = calls.clone();
	let manager = TokenManager::with_getter(getter(move || {
		let n = counter.fetch_add(1, Ordering::SeqCst);

		async move { Ok::<_, BoxError>(Some(Token::new(if n == 0 { "T1" } else { "T2" }))) }
	}));

	assert_eq!(manager.get_token().await.expect("Resolution should succeed."), Some("T1".into()));
	assert_eq!(manager.refresh_token().await.expect("Refresh should succeed."), Some("T2".into()));
	assert_eq!(manager.get_token().await.expect("Read should succeed."), Some("T2".into()));
	assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn failing_observer_does_not_stop_siblings() {
	let ran = Arc::new(AtomicUsize::new(0));
	let manager = TokenManager::new();

	for fail in [false, true, false] {
		let ran = ran.clone();

		manager.on_token_change(
			observer(move |_, _| {
				let ran = ran.clone();

				async move {
					ran.fetch_add(1, Ordering::SeqCst);

					if fail { Err::<(), BoxError>("observer exploded".into()) } else { Ok(()) }
				}
			}),
			ObserveOptions::default(),
		);
	}

	manager.set_token(Some(Token::new("T1"))).await.expect("Setting should succeed.");

	assert_eq!(ran.load(Ordering::SeqCst), 3);
	assert_eq!(manager.last_scene(), Some(TokenScene::SetToken));
}

#[tokio::test]
async fn ignore_first_trigger_is_manager_wide() {
	let first: Seen = Default::default();
	let second: Seen = Default::default();
	let manager = TokenManager::new();

	manager.on_token_change(recording(&first), ObserveOptions::default());
	manager.on_token_change(recording(&second), ObserveOptions::default().ignore_first_trigger());
	manager.set_token(Some(Token::new("T1"))).await.expect("Setting should succeed.");

	assert!(first.lock().is_empty());
	assert!(second.lock().is_empty());

	manager.set_token(Some(Token::new("T2"))).await.expect("Setting should succeed.");

	assert_eq!(*first.lock(), vec![(Some(Token::new("T2")), TokenScene::SetToken)]);
	assert_eq!(*second.lock(), vec![(Some(Token::new("T2")), TokenScene::SetToken)]);
}

#[tokio::test]
async fn carrier_value_wins_and_moves_into_the_durable_store() {
	let cookie = MemoryStore::with_entries([("token", "from-cookie")]);
	let local = MemoryStore::with_entries([("token", "\"from-local\"")]);
	let location = Location::new(
		Url::parse("https://app.example.com/home?token=from-query#top").expect("URL should parse."),
	);
	let sources = TokenSources::builder(Arc::new(local.clone()))
		.cookie(Arc::new(cookie.clone()))
		.query(location.clone())
		.build();
	let manager = TokenManager::with_key("token", sources);
	let seen: Seen = Default::default();

	manager.on_token_change(recording(&seen), ObserveOptions::default());

	assert_eq!(
		manager.get_token().await.expect("Resolution should succeed."),
		Some(Token::new("from-cookie"))
	);
	assert_eq!(cookie.get("token").expect("Cookie read should succeed."), None);
	assert_eq!(
		read_json_or_raw(&local, "token").expect("Durable read should succeed."),
		Some("from-cookie".into())
	);
	assert_eq!(manager.last_scene(), Some(TokenScene::ReadOnCookie));
	assert_eq!(*seen.lock(), vec![(Some(Token::new("from-cookie")), TokenScene::ReadOnCookie)]);
}

#[tokio::test]
async fn query_value_is_stripped_after_adoption() {
	let local = MemoryStore::default();
	let location = Location::new(
		Url::parse("https://app.example.com/home?a=1&token=from-query#top")
			.expect("URL should parse."),
	);
	let manager = TokenManager::with_key(
		"token",
		TokenSources::builder(Arc::new(local.clone())).query(location.clone()).build(),
	);

	assert_eq!(manager.get_token_sync().expect("Sync read should succeed."), Some("from-query".into()));
	assert_eq!(location.href().as_str(), "https://app.example.com/home?a=1#top");
	assert_eq!(
		read_json_or_raw(&local, "token").expect("Durable read should succeed."),
		Some("from-query".into())
	);
}

#[tokio::test]
async fn hung_getter_keeps_callers_pending() {
	let manager = TokenManager::with_getter(getter(future_never));
	let outcome = tokio::time::timeout(Duration::from_millis(50), manager.get_token()).await;

	assert!(outcome.is_err());
	assert!(manager.get_token_sync().expect("Sync read should succeed.").is_none());
}

async fn future_never() -> Result<Option<Token>, BoxError> {
	std::future::pending().await
}

#[tokio::test]
async fn readiness_reflects_resolution_failure() {
	let failing = TokenManager::with_getter(getter(|| async {
		Err::<Option<Token>, BoxError>("offline".into())
	}));
	let absent = TokenManager::new();

	assert!(!failing.is_ready().await);
	assert!(absent.is_ready().await);
}

#[tokio::test]
async fn unsubscribe_removes_only_that_observer() {
	let kept: Seen = Default::default();
	let dropped: Seen = Default::default();
	let manager = TokenManager::new();

	manager.on_token_change(recording(&kept), ObserveOptions::default());

	let subscription = manager.on_token_change(recording(&dropped), ObserveOptions::default());

	assert!(subscription.unsubscribe());

	manager.set_token(Some(Token::new("T1"))).await.expect("Setting should succeed.");

	assert_eq!(kept.lock().len(), 1);
	assert!(dropped.lock().is_empty());
}

#[tokio::test]
async fn auto_trigger_replays_the_cached_token() {
	let manager = TokenManager::new();

	manager.set_token(Some(Token::new("T1"))).await.expect("Setting should succeed.");

	let (tx, rx) = tokio::sync::oneshot::channel();
	let tx = Mutex::new(Some(tx));

	manager.on_token_change(
		observer(move |token, scene| {
			if let Some(tx) = tx.lock().take() {
				let _ = tx.send((token, scene));
			}

			async { Ok::<_, BoxError>(()) }
		}),
		ObserveOptions::default().auto_trigger(),
	);

	let replay = tokio::time::timeout(Duration::from_secs(1), rx)
		.await
		.expect("Replay should arrive.")
		.expect("Sender should not drop.");

	assert_eq!(replay, (Some(Token::new("T1")), TokenScene::SetToken));
}

#[tokio::test]
async fn validator_filters_tokens() {
	let manager = TokenManager::with_options(
		TokenManagerOptions::new().is_valid_token(|token| token.expose().starts_with("ok-")),
	);

	manager.set_token(Some(Token::new("bad"))).await.expect("Setting should succeed.");

	assert_eq!(manager.get_valid_token().await.expect("Read should succeed."), None);

	manager.set_token(Some(Token::new("ok-1"))).await.expect("Setting should succeed.");

	assert_eq!(manager.get_valid_token_sync().expect("Read should succeed."), Some("ok-1".into()));
}

#[tokio::test]
async fn refreshed_value_is_visible_to_sync_reads() {
	let manager = TokenManager::with_options(
		TokenManagerOptions::new()
			.refresh_token(getter(|| async { Ok::<_, BoxError>(Some(Token::new("b"))) })),
	);

	manager.set_token(Some(Token::new("a"))).await.expect("Setting should succeed.");

	assert_eq!(manager.refresh_token().await.expect("Refresh should succeed."), Some("b".into()));
	assert_eq!(manager.get_token_sync().expect("Sync read should succeed."), Some("b".into()));
}

#[tokio::test]
async fn sync_refresh_caches_ready_values_and_surfaces_ready_errors() {
	let calls = Arc::new(AtomicUsize::new(0));
	let counter = calls.clone();
	let manager = TokenManager::with_options(TokenManagerOptions::new().refresh_token(getter_sync(
		move || match counter.fetch_add(1, Ordering::SeqCst) {
			0 => Ok(Some(Token::new("r1"))),
			_ => Err::<Option<Token>, BoxError>("refresh endpoint down".into()),
		},
	)));

	manager.set_token(Some(Token::new("r0"))).await.expect("Setting should succeed.");

	assert_eq!(manager.refresh_token_sync().expect("Sync refresh should succeed."), Some("r1".into()));
	assert_eq!(manager.get_token_sync().expect("Sync read should succeed."), Some("r1".into()));
	assert!(matches!(manager.refresh_token_sync(), Err(Error::Resolution { .. })));
	assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn sync_refresh_returns_the_previous_value_while_pending() {
	let manager = TokenManager::with_options(TokenManagerOptions::new().refresh_token(getter(
		|| async {
			tokio::time::sleep(Duration::from_millis(20)).await;

			Ok::<_, BoxError>(Some(Token::new("b")))
		},
	)));

	manager.set_token(Some(Token::new("a"))).await.expect("Setting should succeed.");

	assert_eq!(manager.refresh_token_sync().expect("Sync refresh should succeed."), Some("a".into()));

	tokio::time::sleep(Duration::from_millis(100)).await;

	assert_eq!(manager.get_token_sync().expect("Sync read should succeed."), Some("b".into()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn refresher_may_read_the_manager() {
	let cell = Arc::new(OnceLock::<TokenManager>::new());
	let handle = cell.clone();
	let manager = TokenManager::with_options(TokenManagerOptions::new().refresh_token(getter(
		move || {
			let current = handle
				.get()
				.and_then(|m| {
					let _ = m.last_scene();

					m.get_token_sync().ok().flatten()
				})
				.map(|t| t.expose().to_owned())
				.unwrap_or_default();

			async move { Ok::<_, BoxError>(Some(Token::new(format!("{current}-next")))) }
		},
	)));

	let _ = cell.set(manager.clone());

	manager.set_token(Some(Token::new("a"))).await.expect("Setting should succeed.");

	let refreshing = {
		let manager = manager.clone();

		tokio::spawn(async move { manager.refresh_token().await })
	};
	let refreshed = tokio::time::timeout(Duration::from_secs(1), refreshing)
		.await
		.expect("Refresh should not block on the manager.")
		.expect("Task should join.")
		.expect("Refresh should succeed.");

	assert_eq!(refreshed, Some("a-next".into()));
	assert_eq!(manager.get_token_sync().expect("Sync read should succeed."), Some("a-next".into()));
}

struct ReadOnlyStore;
impl KeyValueStore for ReadOnlyStore {
	fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
		Ok(None)
	}

	fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
		Err(StoreError::Backend { message: "disk full".into() })
	}

	fn remove(&self, _key: &str) -> Result<(), StoreError> {
		Ok(())
	}
}

#[tokio::test]
async fn failed_persist_leaves_the_cache_untouched() {
	let seen: Seen = Default::default();
	let manager =
		TokenManager::with_key("token", TokenSources::builder(Arc::new(ReadOnlyStore)).build());

	manager.on_token_change(recording(&seen), ObserveOptions::default());

	assert!(matches!(manager.set_token(Some(Token::new("x"))).await, Err(Error::Storage(_))));
	assert_eq!(manager.get_token_sync().expect("Sync read should succeed."), None);
	assert!(seen.lock().is_empty());
}

fn temp_store_path() -> std::path::PathBuf {
	let nanos = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("System clock should be after the Unix epoch.")
		.as_nanos();

	env::temp_dir().join(format!("token_warden_manager_{}_{nanos}.json", process::id()))
}

#[tokio::test]
async fn file_store_keeps_the_token_across_managers() {
	let path = temp_store_path();
	let store = FileStore::open(&path).expect("Failed to open file store.");
	let writer = TokenManager::with_key("token", TokenSources::builder(Arc::new(store)).build());

	writer.set_token(Some(Token::new("persisted"))).await.expect("Setting should succeed.");
	drop(writer);

	let reopened = FileStore::open(&path).expect("Failed to reopen file store.");
	let reader = TokenManager::with_key("token", TokenSources::builder(Arc::new(reopened)).build());

	assert_eq!(
		reader.get_token().await.expect("Resolution should succeed."),
		Some(Token::new("persisted"))
	);
	assert_eq!(reader.last_scene(), Some(TokenScene::ReadOnLocal));

	fs::remove_file(&path).unwrap_or_else(|e| {
		panic!("Failed to remove temporary file store {}: {e}", path.display())
	});
}
