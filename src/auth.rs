//! Bearer token providers and the cached token model.
//!
//! A descriptor with an [`AuthProvider`] resolves its `Authorization` header before every
//! dispatch: the token cached under [`token_cache_key`] is reused until wall-clock time reaches
//! its expiry, after which the provider is asked for a fresh one. Refreshes for one host are not
//! serialized; concurrent callers observing an expired token may each fetch a new one.

pub mod client_credentials;
pub mod secret;

pub use client_credentials::*;
pub use secret::*;

// self
use crate::{_prelude::*, descriptor::ResourceDescriptor};

/// Boxed future returned by [`AuthProvider::authorize`].
pub type AuthFuture<'a> = Pin<Box<dyn Future<Output = Result<AccessToken>> + 'a + Send>>;

/// Produces bearer tokens for a descriptor.
pub trait AuthProvider
where
	Self: Send + Sync,
{
	/// Fetches a fresh token for `descriptor`.
	///
	/// The returned value is used verbatim as the `Authorization` header.
	fn authorize<'a>(
		&'a self,
		descriptor: &'a ResourceDescriptor,
		ctx: &'a Context,
	) -> AuthFuture<'a>;
}

/// Header value plus absolute expiry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
	/// Full `Authorization` header value, e.g. `Bearer abc`.
	pub value: TokenSecret,
	/// Instant after which the token must not be reused.
	#[serde(with = "time::serde::timestamp")]
	pub expires_at: OffsetDateTime,
}
impl AccessToken {
	/// Creates a token valid until `expires_at`.
	pub fn new(value: impl Into<String>, expires_at: OffsetDateTime) -> Self {
		Self { value: TokenSecret::new(value), expires_at }
	}

	/// Whether the token is expired at `now`.
	pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		now >= self.expires_at
	}

	/// Remaining lifetime at `now`; negative once expired.
	pub fn ttl_at(&self, now: OffsetDateTime) -> Duration {
		self.expires_at - now
	}
}

/// Store key under which tokens for `host` are cached.
pub fn token_cache_key(host: &str) -> String {
	format!("rest:tokens:{host}")
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn token_expiry_is_inclusive() {
		let expires_at = macros::datetime!(2026-01-01 12:00 UTC);
		let token = AccessToken::new(" Bearer abc ", expires_at);

		assert_eq!(token.value.expose(), "Bearer abc");
		assert!(!token.is_expired_at(expires_at - Duration::SECOND));
		assert!(token.is_expired_at(expires_at));
		assert_eq!(token.ttl_at(expires_at - Duration::minutes(5)), Duration::minutes(5));
	}

	#[test]
	fn token_serializes_expiry_as_unix_seconds() {
		let token = AccessToken::new("Bearer abc", macros::datetime!(2026-01-01 00:00 UTC));
		let json = serde_json::to_string(&token).expect("Token should serialize.");

		assert_eq!(json, "{\"value\":\"Bearer abc\",\"expires_at\":1767225600}");
		assert_eq!(
			serde_json::from_str::<AccessToken>(&json).expect("Token should deserialize."),
			token
		);
	}

	#[test]
	fn token_key_is_derived_from_host() {
		assert_eq!(token_cache_key("api.test.com:8443"), "rest:tokens:api.test.com:8443");
	}
}
