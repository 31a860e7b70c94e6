//! Thread-safe in-memory [`ResponseStore`] implementation.
//!
//! Entries carry an absolute expiry on the tokio clock and are dropped lazily the first time a
//! read or key scan observes them expired. Every [`SWEEP_INTERVAL`] writes also purge all expired
//! entries, so keys that are written once and never read again do not accumulate. A non-positive
//! TTL stores nothing.

// std
use std::sync::atomic::{AtomicUsize, Ordering};

// crates.io
use tokio::time::Instant;
// self
use crate::{
	_prelude::*,
	store::{ResponseStore, StoreError, StoreFuture},
};

/// Number of writes between full sweeps of expired entries.
pub const SWEEP_INTERVAL: usize = 256;

type StoreMap = Arc<RwLock<HashMap<String, Entry>>>;

#[derive(Clone, Debug)]
struct Entry {
	value: Vec<u8>,
	expires_at: Instant,
}
impl Entry {
	fn is_live(&self, now: Instant) -> bool {
		now < self.expires_at
	}
}

/// Process-local key/value store with prefix scans and lazy TTL expiry.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
	entries: StoreMap,
	writes: Arc<AtomicUsize>,
}
impl MemoryStore {
	/// Number of stored entries, expired ones included until they are next observed.
	pub fn len(&self) -> usize {
		self.entries.read().len()
	}

	/// Whether the store holds no entries.
	pub fn is_empty(&self) -> bool {
		self.entries.read().is_empty()
	}

	fn set_now(&self, key: &str, value: Vec<u8>, ttl: Duration) {
		let Ok(ttl) = StdDuration::try_from(ttl) else {
			return;
		};

		if ttl.is_zero() {
			return;
		}

		let now = Instant::now();
		let expires_at = now.checked_add(ttl).unwrap_or_else(far_future);
		let mut entries = self.entries.write();

		entries.insert(key.to_owned(), Entry { value, expires_at });

		if self.writes.fetch_add(1, Ordering::Relaxed) % SWEEP_INTERVAL == SWEEP_INTERVAL - 1 {
			entries.retain(|_, entry| entry.is_live(now));
		}
	}

	fn get_now(map: &StoreMap, key: &str) -> Option<Vec<u8>> {
		let now = Instant::now();

		{
			let guard = map.read();

			match guard.get(key) {
				Some(entry) if entry.is_live(now) => return Some(entry.value.clone()),
				Some(_) => {},
				None => return None,
			}
		}

		let mut guard = map.write();

		if guard.get(key).is_some_and(|entry| !entry.is_live(now)) {
			guard.remove(key);
		}

		None
	}

	fn keys_now(map: &StoreMap, prefix: &str) -> Vec<String> {
		let now = Instant::now();
		let mut guard = map.write();

		guard.retain(|_, entry| entry.is_live(now));

		let mut keys =
			guard.keys().filter(|key| key.starts_with(prefix)).cloned().collect::<Vec<_>>();

		keys.sort_unstable();

		keys
	}
}
impl ResponseStore for MemoryStore {
	fn set<'a>(
		&'a self,
		_: &'a Context,
		key: &'a str,
		value: Vec<u8>,
		ttl: Duration,
	) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			self.set_now(key, value, ttl);

			Ok(())
		})
	}

	fn get<'a>(&'a self, ctx: &'a Context, key: &'a str) -> StoreFuture<'a, Option<Vec<u8>>> {
		Box::pin(async move {
			if ctx.err().is_some() {
				return Err(StoreError::Canceled);
			}

			Ok(Self::get_now(&self.entries, key))
		})
	}

	fn keys<'a>(&'a self, prefix: &'a str) -> StoreFuture<'a, Vec<String>> {
		Box::pin(async move { Ok(Self::keys_now(&self.entries, prefix)) })
	}

	fn delete<'a>(&'a self, _: &'a Context, key: &'a str) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			self.entries.write().remove(key);

			Ok(())
		})
	}
}

fn far_future() -> Instant {
	// Roughly 30 years; `Instant` has no MAX.
	Instant::now() + StdDuration::from_secs(86_400 * 365 * 30)
}
