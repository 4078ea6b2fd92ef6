// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for decorator refreshes and 401 replays.
#[derive(Debug, Default)]
pub struct AuthMetrics {
	refreshes: AtomicU64,
	retries: AtomicU64,
	retry_failures: AtomicU64,
}
impl AuthMetrics {
	/// Returns the number of refreshes started because no token was cached.
	pub fn refreshes(&self) -> u64 {
		self.refreshes.load(Ordering::Relaxed)
	}

	/// Returns the number of requests replayed after a 401.
	pub fn retries(&self) -> u64 {
		self.retries.load(Ordering::Relaxed)
	}

	/// Returns the number of replays that failed again.
	pub fn retry_failures(&self) -> u64 {
		self.retry_failures.load(Ordering::Relaxed)
	}

	pub(crate) fn record_refresh(&self) {
		self.refreshes.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_retry(&self) {
		self.retries.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_retry_failure(&self) {
		self.retry_failures.fetch_add(1, Ordering::Relaxed);
	}
}
