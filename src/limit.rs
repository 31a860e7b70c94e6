//! Outbound rate limiting.
//!
//! [`RateLimiter::check`] either returns immediately or suspends the caller until a token is
//! available. [`TokenBucketLimiter`] keeps one bucket per key with a burst of one and reserves
//! tokens up front, so concurrent waiters are spaced by `1 / rps` instead of racing for the same
//! refill.

// crates.io
use tokio::time::Instant;
// self
use crate::{_prelude::*, error::CancellationError};

/// Boxed future returned by [`RateLimiter::check`].
pub type LimitFuture<'a> =
	Pin<Box<dyn Future<Output = Result<(), CancellationError>> + 'a + Send>>;

/// Per-key throttle consulted before every network call.
pub trait RateLimiter
where
	Self: Send + Sync,
{
	/// Waits until a call under `key` may proceed, or fails with the context's cancellation error.
	fn check<'a>(&'a self, ctx: &'a Context, key: &'a str) -> LimitFuture<'a>;

	/// Configured budget, when the implementation has a fixed one.
	fn quota(&self) -> Option<Quota> {
		None
	}
}

/// Fixed token-bucket budget.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Quota {
	/// Refill rate in tokens per second.
	pub per_second: f64,
	/// Bucket capacity.
	pub burst: u32,
}

#[derive(Debug)]
struct Bucket {
	tokens: f64,
	refilled_at: Instant,
}

/// Token bucket limiter with one bucket per key and a burst of one.
#[derive(Debug)]
pub struct TokenBucketLimiter {
	quota: Quota,
	buckets: Mutex<HashMap<String, Bucket>>,
}
impl TokenBucketLimiter {
	/// Creates a limiter refilling `per_second` tokens per second.
	///
	/// Non-finite rates never throttle.
	pub fn new(per_second: f64) -> Self {
		Self { quota: Quota { per_second, burst: 1 }, buckets: Default::default() }
	}

	/// Reserves one token for `key`, returning how long the caller must wait for it.
	fn reserve(&self, key: &str) -> StdDuration {
		let Quota { per_second, burst } = self.quota;

		if per_second.is_infinite() {
			return StdDuration::ZERO;
		}

		let now = Instant::now();
		let capacity = f64::from(burst);
		let mut buckets = self.buckets.lock();
		let bucket = buckets
			.entry(key.to_owned())
			.or_insert_with(|| Bucket { tokens: capacity, refilled_at: now });
		let elapsed = now.saturating_duration_since(bucket.refilled_at).as_secs_f64();

		bucket.tokens = (bucket.tokens + elapsed * per_second).min(capacity);
		bucket.refilled_at = now;
		bucket.tokens -= 1.;

		if bucket.tokens >= 0. {
			StdDuration::ZERO
		} else {
			StdDuration::try_from_secs_f64(-bucket.tokens / per_second).unwrap_or(StdDuration::MAX)
		}
	}

	/// Gives back a reservation the caller did not use.
	fn release(&self, key: &str) {
		if let Some(bucket) = self.buckets.lock().get_mut(key) {
			bucket.tokens = (bucket.tokens + 1.).min(f64::from(self.quota.burst));
		}
	}
}
impl RateLimiter for TokenBucketLimiter {
	fn check<'a>(&'a self, ctx: &'a Context, key: &'a str) -> LimitFuture<'a> {
		Box::pin(async move {
			if let Some(err) = ctx.err() {
				return Err(err);
			}

			let wait = self.reserve(key);

			if wait.is_zero() {
				return Ok(());
			}
			// Fail fast when the deadline would pass before the token arrives.
			if ctx.deadline().is_some_and(|deadline| {
				Instant::now().checked_add(wait).is_none_or(|ready| ready > deadline)
			}) {
				self.release(key);

				return Err(CancellationError::DeadlineExceeded);
			}

			ctx.run(tokio::time::sleep(wait)).await.inspect_err(|_| self.release(key))
		})
	}

	fn quota(&self) -> Option<Quota> {
		Some(self.quota)
	}
}
