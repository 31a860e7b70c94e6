//! Cancellation and deadline context carried through every pipeline stage.
//!
//! A [`Context`] bundles a [`CancellationToken`], an optional deadline, and a cache-disabled
//! marker set by [`ResponseStore::disable`](crate::store::ResponseStore::disable). Contexts are
//! cheap to clone; derived contexts observe the cancellation of their parent but never cancel it.

// std
use std::sync::OnceLock;
// crates.io
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
// self
use crate::{_prelude::*, error::CancellationError};

static BACKGROUND: OnceLock<CancellationToken> = OnceLock::new();

fn background_token() -> &'static CancellationToken {
	BACKGROUND.get_or_init(CancellationToken::new)
}

/// Cancels the process-wide background context and every context derived from it.
pub fn shutdown() {
	background_token().cancel();
}

/// Cancellation scope for one or more calls.
#[derive(Clone, Debug)]
pub struct Context {
	token: CancellationToken,
	deadline: Option<Instant>,
	cache_disabled: bool,
}
impl Context {
	/// Returns a context derived from the process-wide background context.
	pub fn background() -> Self {
		Self { token: background_token().child_token(), deadline: None, cache_disabled: false }
	}

	/// Wraps an existing token so callers can cancel calls from outside.
	pub fn with_token(token: CancellationToken) -> Self {
		Self { token, deadline: None, cache_disabled: false }
	}

	/// Derives a child context that can be cancelled independently of `self`.
	pub fn child(&self) -> Self {
		Self {
			token: self.token.child_token(),
			deadline: self.deadline,
			cache_disabled: self.cache_disabled,
		}
	}

	/// Derives a child context that expires after `timeout`.
	///
	/// The earlier of the inherited deadline and the new one wins.
	pub fn with_timeout(&self, timeout: StdDuration) -> Self {
		let deadline = Instant::now() + timeout;
		let mut child = self.child();

		child.deadline = Some(match self.deadline {
			Some(current) if current < deadline => current,
			_ => deadline,
		});

		child
	}

	/// Returns a copy that downstream cache reads must treat as disabled.
	pub fn without_cache(&self) -> Self {
		Self { cache_disabled: true, ..self.clone() }
	}

	/// Whether cache reads are disabled for this context.
	pub fn cache_disabled(&self) -> bool {
		self.cache_disabled
	}

	/// Cancels this context and all of its children.
	pub fn cancel(&self) {
		self.token.cancel();
	}

	/// Returns the deadline, if any.
	pub fn deadline(&self) -> Option<Instant> {
		self.deadline
	}

	/// Returns the cancellation reason once the context is done.
	pub fn err(&self) -> Option<CancellationError> {
		if self.token.is_cancelled() {
			return Some(CancellationError::Canceled);
		}

		match self.deadline {
			Some(deadline) if Instant::now() >= deadline => Some(CancellationError::DeadlineExceeded),
			_ => None,
		}
	}

	/// Resolves once the context is cancelled or its deadline elapses.
	pub async fn done(&self) -> CancellationError {
		match self.deadline {
			Some(deadline) => tokio::select! {
				biased;
				_ = self.token.cancelled() => CancellationError::Canceled,
				_ = tokio::time::sleep_until(deadline) => CancellationError::DeadlineExceeded,
			},
			None => {
				self.token.cancelled().await;

				CancellationError::Canceled
			},
		}
	}

	/// Drives `fut` to completion unless the context finishes first.
	pub async fn run<F>(&self, fut: F) -> Result<F::Output, CancellationError>
	where
		F: Future,
	{
		if let Some(err) = self.err() {
			return Err(err);
		}

		tokio::select! {
			biased;
			err = self.done() => Err(err),
			output = fut => Ok(output),
		}
	}
}
impl Default for Context {
	fn default() -> Self {
		Self::background()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn cancelled_context_short_circuits() {
		let ctx = Context::background();

		ctx.cancel();

		assert_eq!(ctx.err(), Some(CancellationError::Canceled));
		assert_eq!(ctx.run(async { 1 }).await, Err(CancellationError::Canceled));
	}

	#[tokio::test]
	async fn child_cancel_does_not_reach_parent() {
		let parent = Context::background();
		let child = parent.child();

		child.cancel();

		assert!(parent.err().is_none());
		assert_eq!(child.err(), Some(CancellationError::Canceled));
	}

	#[tokio::test(start_paused = true)]
	async fn deadline_elapses() {
		let ctx = Context::background().with_timeout(StdDuration::from_millis(50));
		let result = ctx.run(tokio::time::sleep(StdDuration::from_secs(5))).await;

		assert_eq!(result, Err(CancellationError::DeadlineExceeded));
	}

	#[test]
	fn without_cache_marks_copy_only() {
		let ctx = Context::background();
		let disabled = ctx.without_cache();

		assert!(!ctx.cache_disabled());
		assert!(disabled.cache_disabled());
	}
}
