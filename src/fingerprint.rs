//! Deterministic request fingerprints used as cache and lock keys.
//!
//! The fingerprint covers the method, the absolute URL, every header (names sorted so map
//! iteration order never leaks into the key), and the buffered body bytes. The digest is the first
//! 128 bits of SHA-256, rendered as lowercase hex.

// crates.io
use http::{HeaderMap, Method};
use sha2::{Digest, Sha256};

/// Length of a rendered fingerprint in hex characters.
pub const FINGERPRINT_LEN: usize = 32;

/// Computes the fingerprint for a fully-formed request.
pub fn fingerprint(method: &Method, url: &str, headers: &HeaderMap, body: &[u8]) -> String {
	let mut hasher = Sha256::new();

	hasher.update(canonical_request(method, url, headers).as_bytes());
	hasher.update(body);

	let digest = hasher.finalize();

	hex::encode(&digest[..FINGERPRINT_LEN / 2])
}

/// Renders the textual preamble hashed ahead of the body.
fn canonical_request(method: &Method, url: &str, headers: &HeaderMap) -> String {
	let mut names = headers.keys().map(|name| name.as_str()).collect::<Vec<_>>();

	names.sort_unstable();
	names.dedup();

	let mut buf = format!("{method}\n{url}\n\n");

	for name in names {
		let values = headers
			.get_all(name)
			.iter()
			.map(|value| String::from_utf8_lossy(value.as_bytes()))
			.collect::<Vec<_>>();

		buf.push_str(name);
		buf.push_str(": ");
		buf.push_str(&values.join(", "));
		buf.push('\n');
	}

	buf
}

#[cfg(test)]
mod tests {
	// crates.io
	use http::HeaderValue;
	// self
	use super::*;

	fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
		let mut map = HeaderMap::new();

		for (name, value) in pairs {
			map.append(*name, HeaderValue::from_static(value));
		}

		map
	}

	#[test]
	fn header_order_does_not_matter() {
		let url = "https://api.test.com/v1/items?page=2";
		let lhs = headers(&[("accept", "application/json"), ("x-tenant", "acme")]);
		let rhs = headers(&[("x-tenant", "acme"), ("accept", "application/json")]);

		assert_eq!(
			fingerprint(&Method::POST, url, &lhs, b"{\"a\":1}"),
			fingerprint(&Method::POST, url, &rhs, b"{\"a\":1}"),
		);
	}

	#[test]
	fn header_value_and_body_byte_change_the_key() {
		let url = "https://api.test.com/v1/items";
		let base = fingerprint(&Method::POST, url, &headers(&[("x-tenant", "acme")]), b"abc");

		assert_ne!(base, fingerprint(&Method::POST, url, &headers(&[("x-tenant", "acmf")]), b"abc"));
		assert_ne!(base, fingerprint(&Method::POST, url, &headers(&[("x-tenant", "acme")]), b"abd"));
		assert_ne!(base, fingerprint(&Method::PUT, url, &headers(&[("x-tenant", "acme")]), b"abc"));
	}

	#[test]
	fn multi_value_headers_are_joined() {
		let map = headers(&[("accept", "text/plain"), ("accept", "application/json")]);

		assert_eq!(
			canonical_request(&Method::GET, "https://a.test/", &map),
			"GET\nhttps://a.test/\n\naccept: text/plain, application/json\n"
		);
	}

	#[test]
	fn rendering_is_stable_lowercase_hex() {
		let key = fingerprint(&Method::GET, "https://a.test/", &HeaderMap::new(), &[]);

		assert_eq!(key.len(), FINGERPRINT_LEN);
		assert!(key.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
		assert_eq!(key, fingerprint(&Method::GET, "https://a.test/", &HeaderMap::new(), &[]));
	}
}
