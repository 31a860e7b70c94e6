//! Transport primitives used by resource descriptors.
//!
//! [`HttpTransport`] is the crate's only dependency on an HTTP stack. Requests and responses are
//! fully buffered (`http::Request<Vec<u8>>` / `http::Response<Vec<u8>>`) so the same bytes feed
//! the fingerprint, the wire, and the cache. [`ReqwestTransport`] is the default implementation;
//! [`StubRouter`] short-circuits selected hosts in tests.

pub mod stub;

pub use stub::*;

// self
use crate::{_prelude::*, error::TransportError};

/// Fully buffered outbound request.
pub type HttpRequest = http::Request<Vec<u8>>;
/// Fully buffered inbound response.
pub type HttpResponse = http::Response<Vec<u8>>;

/// Boxed future returned by [`HttpTransport::execute`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + 'a + Send>>;

/// Executes fully-formed requests.
///
/// Implementations must be `Send + Sync + 'static` so a descriptor can share one instance across
/// every concurrent call. Connection-level failures are reported as [`TransportError`]; any HTTP
/// status, including 4xx/5xx, is a successful execution.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Sends `request` and buffers the whole response body.
	fn execute(&self, request: HttpRequest) -> TransportFuture<'_>;
}

/// Settings handed to a [`TransportFactory`] when a descriptor builds its transport.
#[derive(Clone, Debug, Default)]
pub struct TransportOptions {
	/// Upstream proxy for every request.
	pub proxy: Option<Url>,
	/// Whole-request timeout.
	pub timeout: Option<StdDuration>,
}

/// Builds the transport a descriptor uses; invoked at most once per descriptor.
pub type TransportFactory =
	Arc<dyn Fn(&TransportOptions) -> Result<Arc<dyn HttpTransport>> + Send + Sync>;

/// Reqwest-backed [`HttpTransport`].
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a client honoring the proxy and timeout in `options`.
	pub fn from_options(options: &TransportOptions) -> Result<Self> {
		let mut builder = ReqwestClient::builder();

		if let Some(timeout) = options.timeout {
			builder = builder.timeout(timeout);
		}
		if let Some(proxy) = options.proxy.as_ref() {
			builder = builder
				.proxy(reqwest::Proxy::all(proxy.as_str()).map_err(crate::error::ConfigError::from)?);
		}

		Ok(Self(builder.build().map_err(crate::error::ConfigError::from)?))
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	fn execute(&self, request: HttpRequest) -> TransportFuture<'_> {
		let client = self.0.clone();

		Box::pin(async move {
			let request = reqwest::Request::try_from(request)?;
			let response = client.execute(request).await?;
			let status = response.status();
			let version = response.version();
			let headers = response.headers().to_owned();
			let body = response.bytes().await?.to_vec();
			let mut buffered = HttpResponse::new(body);

			*buffered.status_mut() = status;
			*buffered.version_mut() = version;
			*buffered.headers_mut() = headers;

			Ok(buffered)
		})
	}
}

/// Returns the canonical reason phrase for `status`, or an empty string.
pub fn status_text(status: http::StatusCode) -> &'static str {
	status.canonical_reason().unwrap_or("")
}
