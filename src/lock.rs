//! Keyed mutual exclusion used to collapse concurrent identical requests.
//!
//! [`Locker::lock`] returns a [`LockGuard`] that releases on drop, so every exit path of the
//! pipeline (success, upstream error, transport error, unwinding) gives the key back.
//! [`UnsharedLocker`] is the default and never blocks; [`KeyedLocker`] provides real in-process
//! exclusion. Distributed implementations plug in through the same trait.

// std
use std::any::Any;
// crates.io
use async_lock::MutexGuardArc;
// self
use crate::{_prelude::*, error::CancellationError};

/// Boxed future returned by [`Locker::lock`].
pub type LockFuture<'a> =
	Pin<Box<dyn Future<Output = Result<LockGuard, CancellationError>> + 'a + Send>>;

/// Keyed lock provider.
///
/// Implementations must key on the provided string: two guards for the same key are never held
/// at once, while distinct keys proceed independently.
pub trait Locker
where
	Self: Send + Sync,
{
	/// Acquires the exclusive handle for `key`, waiting until it is free or `ctx` finishes.
	fn lock<'a>(&'a self, ctx: &'a Context, key: &'a str) -> LockFuture<'a>;
}

/// Exclusive handle for one key; dropping it unlocks.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard {
	_held: Option<Box<dyn Any + Send>>,
}
impl LockGuard {
	/// Wraps an implementation-specific guard whose `Drop` performs the release.
	pub fn new(held: impl 'static + Send) -> Self {
		Self { _held: Some(Box::new(held)) }
	}

	/// A guard that holds nothing.
	pub fn noop() -> Self {
		Self { _held: None }
	}

	/// Releases the lock explicitly.
	pub fn unlock(self) {}
}
impl Debug for LockGuard {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("LockGuard(..)")
	}
}

/// Default locker: every call receives a freshly allocated, never-shared lock.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnsharedLocker;
impl Locker for UnsharedLocker {
	fn lock<'a>(&'a self, _: &'a Context, _: &'a str) -> LockFuture<'a> {
		Box::pin(async move {
			let fresh = Arc::new(AsyncMutex::new(()));

			Ok(LockGuard::new(fresh.lock_arc().await))
		})
	}
}

type GuardMap = Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>;

/// In-process locker holding one async mutex per key.
///
/// Entries are removed when their last holder releases, so the table only grows with the
/// number of keys currently contended.
#[derive(Clone, Debug, Default)]
pub struct KeyedLocker {
	guards: GuardMap,
}
impl KeyedLocker {
	/// Number of keys currently held or awaited.
	pub fn active_keys(&self) -> usize {
		self.guards.lock().len()
	}

	fn slot(&self, key: &str) -> Arc<AsyncMutex<()>> {
		let mut guards = self.guards.lock();

		guards.entry(key.to_owned()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
	}
}
impl Locker for KeyedLocker {
	fn lock<'a>(&'a self, ctx: &'a Context, key: &'a str) -> LockFuture<'a> {
		Box::pin(async move {
			if key.is_empty() {
				return Ok(LockGuard::noop());
			}

			let slot = self.slot(key);
			let acquired = ctx.run(slot.lock_arc()).await;
			let mut held =
				KeyedGuard { guards: self.guards.clone(), key: key.to_owned(), slot, guard: None };

			// On cancellation `held` still runs its cleanup so the slot does not leak.
			held.guard = Some(acquired?);

			Ok(LockGuard::new(held))
		})
	}
}

struct KeyedGuard {
	guards: GuardMap,
	key: String,
	slot: Arc<AsyncMutex<()>>,
	guard: Option<MutexGuardArc<()>>,
}
impl Drop for KeyedGuard {
	fn drop(&mut self) {
		let mut guards = self.guards.lock();

		drop(self.guard.take());

		// One reference lives in the table and one in `self`.
		if Arc::strong_count(&self.slot) <= 2
			&& guards.get(&self.key).is_some_and(|slot| Arc::ptr_eq(slot, &self.slot))
		{
			guards.remove(&self.key);
		}
	}
}

/// Acquires `key` on `locker`, treating an empty key as unlocked.
pub async fn acquire(
	locker: &dyn Locker,
	ctx: &Context,
	key: &str,
) -> Result<LockGuard, CancellationError> {
	if key.is_empty() {
		return Ok(LockGuard::noop());
	}

	locker.lock(ctx, key).await
}
