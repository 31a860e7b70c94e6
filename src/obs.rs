//! Optional observability helpers for resource calls.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to wrap every endpoint execution in a span named `rest_broker.call` with the
//!   `domain`, `method`, and `path` fields, and to emit debug/warn/error events for completed
//!   calls, cache failures, and undecodable responses.
//! - Enable `metrics` to record the `rest_in_seconds` histogram for every network call, labeled by
//!   `domain` + `method` + `path`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Labels shared by the call span and the latency histogram.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CallLabels {
	/// Descriptor name, or the upstream hostname for unnamed descriptors.
	pub domain: String,
	/// HTTP method.
	pub method: String,
	/// Request path without the query string.
	pub path: String,
}
impl CallLabels {
	/// Creates labels for one call.
	pub fn new(
		domain: impl Into<String>,
		method: impl Into<String>,
		path: impl Into<String>,
	) -> Self {
		Self { domain: domain.into(), method: method.into(), path: path.into() }
	}
}
impl Display for CallLabels {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{} {}{}", self.method, self.domain, self.path)
	}
}

/// Logs a successful network call at debug level.
///
/// `sent` and `received` are the request and response body sizes in bytes.
pub(crate) fn call_completed(
	endpoint: &str,
	status: u16,
	cached: bool,
	sent: usize,
	received: usize,
	elapsed: StdDuration,
) {
	#[cfg(feature = "tracing")]
	{
		::tracing::debug!(
			endpoint,
			status,
			cached,
			kb_in = kilobytes(sent),
			kb_out = kilobytes(received),
			elapsed_ms = elapsed.as_secs_f64() * 1_000.,
			"call completed"
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (endpoint, status, cached, sent, received, elapsed);
	}
}

/// Logs an upstream failure status at debug level before it is mapped.
pub(crate) fn call_rejected(endpoint: &str, status: u16, elapsed: StdDuration) {
	#[cfg(feature = "tracing")]
	{
		::tracing::debug!(
			endpoint,
			status,
			elapsed_ms = elapsed.as_secs_f64() * 1_000.,
			"call rejected"
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (endpoint, status, elapsed);
	}
}

/// Logs a response body that could not be decoded into the caller's type.
pub(crate) fn decode_failed(endpoint: &str, err: &dyn Display) {
	#[cfg(feature = "tracing")]
	{
		::tracing::error!(endpoint, error = %err, "response decode failed");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (endpoint, err);
	}
}

/// Logs a cache read or write that failed; the call itself proceeds.
pub(crate) fn store_failure(op: &str, key: &str, err: &dyn Display) {
	#[cfg(feature = "tracing")]
	{
		::tracing::warn!(op, key, error = %err, "response store failure");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (op, key, err);
	}
}

#[cfg(feature = "tracing")]
fn kilobytes(bytes: usize) -> f64 {
	bytes as f64 / 1_024.
}
