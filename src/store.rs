//! Response cache contracts, typed helpers, and the built-in in-memory store.

pub mod memory;

pub use memory::MemoryStore;

// self
use crate::_prelude::*;

/// Boxed future returned by [`ResponseStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Byte-oriented key/value store with TTL semantics backing the response and token caches.
pub trait ResponseStore
where
	Self: Send + Sync,
{
	/// Stores `value` under `key` for `ttl`.
	fn set<'a>(
		&'a self,
		ctx: &'a Context,
		key: &'a str,
		value: Vec<u8>,
		ttl: Duration,
	) -> StoreFuture<'a, ()>;

	/// Fetches the bytes stored under `key`, if present and not expired.
	fn get<'a>(&'a self, ctx: &'a Context, key: &'a str) -> StoreFuture<'a, Option<Vec<u8>>>;

	/// Lists live keys starting with `prefix`.
	fn keys<'a>(&'a self, prefix: &'a str) -> StoreFuture<'a, Vec<String>>;

	/// Removes `key`; deleting a missing key is not an error.
	fn delete<'a>(&'a self, ctx: &'a Context, key: &'a str) -> StoreFuture<'a, ()>;

	/// Returns a context variant that downstream reads must treat as cache-disabled.
	fn disable(&self, ctx: &Context) -> Context {
		ctx.without_cache()
	}
}

/// Error type produced by [`ResponseStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the typed helpers or the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
	/// The operation was abandoned because its context finished.
	#[error("Store operation canceled.")]
	Canceled,
}

/// Tri-state outcome of the typed store helpers.
///
/// Ordinary misses are not errors; [`Transfer::code`] exposes the numeric convention
/// (`0` missing, `-1` failed, `> 0` bytes transferred) for callers that log or export it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transfer<T = ()> {
	/// Nothing stored under the key, or the cache is disabled.
	Missing,
	/// The backend or the codec failed; the failure has been logged.
	Failed,
	/// The value was transferred.
	Done {
		/// Decoded value (unit for writes).
		value: T,
		/// Number of bytes read or written.
		bytes: usize,
	},
}
impl<T> Transfer<T> {
	/// Numeric form of the outcome.
	pub fn code(&self) -> isize {
		match self {
			Self::Missing => 0,
			Self::Failed => -1,
			Self::Done { bytes, .. } => isize::try_from(*bytes).unwrap_or(isize::MAX),
		}
	}

	/// Returns the transferred value, if any.
	pub fn into_value(self) -> Option<T> {
		match self {
			Self::Done { value, .. } => Some(value),
			_ => None,
		}
	}

	/// Whether the value was transferred.
	pub fn is_done(&self) -> bool {
		matches!(self, Self::Done { .. })
	}
}

/// Reads `key` and decodes it as JSON into `T`.
pub async fn get_json<T>(store: &dyn ResponseStore, ctx: &Context, key: &str) -> Transfer<T>
where
	T: DeserializeOwned,
{
	if ctx.cache_disabled() {
		return Transfer::Missing;
	}

	let bytes = match store.get(ctx, key).await {
		Ok(Some(bytes)) if !bytes.is_empty() => bytes,
		Ok(_) => return Transfer::Missing,
		Err(StoreError::Canceled) => return Transfer::Failed,
		Err(e) => {
			crate::obs::store_failure("get", key, &e);

			return Transfer::Failed;
		},
	};

	match serde_json::from_slice(&bytes) {
		Ok(value) => Transfer::Done { value, bytes: bytes.len() },
		Err(e) => {
			crate::obs::store_failure("get", key, &e);

			Transfer::Failed
		},
	}
}

/// Encodes `value` as JSON and stores it under `key` for the sum of `ttls`.
pub async fn put_json<T>(
	store: &dyn ResponseStore,
	ctx: &Context,
	key: &str,
	value: &T,
	ttls: &[Duration],
) -> Transfer
where
	T: ?Sized + Serialize,
{
	let bytes = match serde_json::to_vec(value) {
		Ok(bytes) => bytes,
		Err(e) => {
			crate::obs::store_failure("set", key, &e);

			return Transfer::Failed;
		},
	};
	let len = bytes.len();
	let ttl = ttls.iter().fold(Duration::ZERO, |acc, ttl| acc.saturating_add(*ttl));

	match store.set(ctx, key, bytes, ttl).await {
		Ok(()) => Transfer::Done { value: (), bytes: len },
		Err(StoreError::Canceled) => Transfer::Failed,
		Err(e) => {
			crate::obs::store_failure("set", key, &e);

			Transfer::Failed
		},
	}
}
