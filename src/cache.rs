//! Credential cache with single-flight fetches and a versioned slot.
//!
//! [`CredentialCache::get`] serves the held talking token until it expires. When the slot is
//! empty or expired, callers queue on a single-flight guard; the first one fetches while the
//! others wait and then re-check the slot, so concurrent misses cost one authorizator round
//! trip. Every store replaces the slot wholesale and bumps its generation, and
//! [`CredentialCache::invalidate_if_current`] only drops the exact instance a caller saw
//! rejected, so a stale rejection never discards a credential another caller already renewed.

// self
use crate::{
	_prelude::*,
	authorizator::AuthorizatorClient,
	connection::ConnectionMetrics,
	credential::TalkingToken,
	obs::{self, Operation, OperationOutcome, OperationSpan},
	source::CredentialSource,
};

#[derive(Debug, Default)]
struct Slot {
	current: Option<Arc<TalkingToken>>,
	generation: u64,
}

/// Holds at most one live talking token for a connection.
pub struct CredentialCache<A>
where
	A: ?Sized + AuthorizatorClient,
{
	source: CredentialSource<A>,
	slot: Mutex<Slot>,
	flight: AsyncMutex<()>,
	metrics: Arc<ConnectionMetrics>,
}
impl<A> CredentialCache<A>
where
	A: ?Sized + AuthorizatorClient,
{
	/// Creates an empty cache over `source`.
	pub fn new(source: CredentialSource<A>) -> Self {
		Self::with_metrics(source, Default::default())
	}

	/// Creates an empty cache that reports fetches into `metrics`.
	pub fn with_metrics(source: CredentialSource<A>, metrics: Arc<ConnectionMetrics>) -> Self {
		Self { source, slot: Default::default(), flight: AsyncMutex::new(()), metrics }
	}

	/// Returns the held token, fetching a new one if it is absent or expired.
	pub async fn get(&self) -> Result<Arc<TalkingToken>> {
		self.get_at(OffsetDateTime::now_utc()).await
	}

	/// Like [`get`](Self::get), evaluating expiry at `now`.
	pub async fn get_at(&self, now: OffsetDateTime) -> Result<Arc<TalkingToken>> {
		if let Some(token) = self.live_at(now) {
			return Ok(token);
		}

		let _singleflight = self.flight.lock().await;

		// Another caller may have stored a token while this one waited.
		if let Some(token) = self.live_at(now) {
			return Ok(token);
		}

		self.fetch_and_store().await
	}

	/// Drops the held token unconditionally.
	pub fn invalidate(&self) {
		self.slot.lock().current = None;
	}

	/// Drops the held token only if it is `token`; returns whether it was dropped.
	pub fn invalidate_if_current(&self, token: &Arc<TalkingToken>) -> bool {
		let mut slot = self.slot.lock();

		match &slot.current {
			Some(current) if Arc::ptr_eq(current, token) => {
				slot.current = None;

				true
			},
			_ => false,
		}
	}

	/// Returns the held token without checking expiry or fetching.
	pub fn current(&self) -> Option<Arc<TalkingToken>> {
		self.slot.lock().current.clone()
	}

	/// Number of tokens stored since the cache was created.
	pub fn generation(&self) -> u64 {
		self.slot.lock().generation
	}

	/// Credential source backing the cache.
	pub fn source(&self) -> &CredentialSource<A> {
		&self.source
	}

	fn live_at(&self, now: OffsetDateTime) -> Option<Arc<TalkingToken>> {
		self.slot.lock().current.as_ref().filter(|token| !token.is_expired_at(now)).cloned()
	}

	async fn fetch_and_store(&self) -> Result<Arc<TalkingToken>> {
		const OP: Operation = Operation::Fetch;

		let span = OperationSpan::new(OP, "fetch_talking_token");

		obs::record_operation_outcome(OP, OperationOutcome::Attempt);
		self.metrics.record_fetch();

		let result = span.instrument(self.source.fetch()).await;
		let token = match result {
			Ok(token) => Arc::new(token),
			Err(err) => {
				obs::record_operation_outcome(OP, OperationOutcome::Failure);
				self.metrics.record_fetch_failure();

				return Err(err);
			},
		};
		let mut slot = self.slot.lock();

		slot.current = Some(token.clone());
		slot.generation += 1;

		obs::record_operation_outcome(OP, OperationOutcome::Success);

		Ok(token)
	}
}
impl<A> Debug for CredentialCache<A>
where
	A: ?Sized + AuthorizatorClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let slot = self.slot.lock();

		f.debug_struct("CredentialCache")
			.field("source", &self.source)
			.field("held", &slot.current.is_some())
			.field("generation", &slot.generation)
			.finish()
	}
}
