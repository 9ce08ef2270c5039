// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for one connection's credential lifecycle.
#[derive(Debug, Default)]
pub struct ConnectionMetrics {
	fetches: AtomicU64,
	fetch_failures: AtomicU64,
	renewals: AtomicU64,
	rejections: AtomicU64,
}
impl ConnectionMetrics {
	/// Returns the number of talking token fetches attempted.
	pub fn fetches(&self) -> u64 {
		self.fetches.load(Ordering::Relaxed)
	}

	/// Returns the number of fetches that failed.
	pub fn fetch_failures(&self) -> u64 {
		self.fetch_failures.load(Ordering::Relaxed)
	}

	/// Returns the number of calls retried after a rejected talking token.
	pub fn renewals(&self) -> u64 {
		self.renewals.load(Ordering::Relaxed)
	}

	/// Returns the number of calls that failed because the renewed token was rejected too.
	pub fn rejections(&self) -> u64 {
		self.rejections.load(Ordering::Relaxed)
	}

	pub(crate) fn record_fetch(&self) {
		self.fetches.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_fetch_failure(&self) {
		self.fetch_failures.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_renewal(&self) {
		self.renewals.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_rejection(&self) {
		self.rejections.fetch_add(1, Ordering::Relaxed);
	}
}
