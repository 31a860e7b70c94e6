//! Crate-level error types shared by descriptors, endpoints, stores, and auth providers.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Boxed error accepted from pluggable components and caller-supplied mappers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem; raised before any I/O.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Request body encoding or response decoding failure.
	#[error(transparent)]
	Serialization(#[from] SerializationError),
	/// Connection-level failure reported by the transport.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Upstream answered with a status code of 400 or above.
	#[error(transparent)]
	Upstream(#[from] UpstreamError),
	/// The caller context was cancelled or its deadline elapsed.
	#[error(transparent)]
	Cancelled(#[from] CancellationError),
	/// Bearer token acquisition failed.
	#[error(transparent)]
	Auth(#[from] AuthError),
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Error produced by a caller-supplied [`ErrorMapper`](crate::endpoint::ErrorMapper).
	#[error("{source}")]
	Mapped {
		/// Mapper-defined failure.
		#[source]
		source: BoxError,
	},
}
impl Error {
	/// Wraps an arbitrary error returned from an error mapper.
	pub fn mapped(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Mapped { source: Box::new(src) }
	}

	/// Returns `true` when the failure came from context cancellation or a deadline.
	pub fn is_cancelled(&self) -> bool {
		matches!(self, Self::Cancelled(_))
	}

	/// Returns the upstream status code, if the failure was an unmapped upstream error.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Upstream(e) => Some(e.status),
			_ => None,
		}
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// The descriptor has no origin URL.
	#[error("Descriptor `{descriptor}` has no origin URL.")]
	MissingOrigin {
		/// Descriptor display name.
		descriptor: String,
	},
	/// The connection string could not be parsed.
	#[error("Connection string `{url}` is invalid.")]
	InvalidUrl {
		/// Offending input, with credentials stripped when possible.
		url: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// The connection string lacks a scheme or host.
	#[error("Connection string `{url}` is missing its {part}.")]
	MissingUrlPart {
		/// Offending input.
		url: String,
		/// Missing component label.
		part: &'static str,
	},
	/// A recognized query option carried an unparsable value.
	#[error("{host} {option} option is invalid, `{value}` given.")]
	InvalidOption {
		/// Host of the connection string.
		host: String,
		/// Option name.
		option: &'static str,
		/// Raw option value.
		value: String,
	},
	/// The environment variable holding the connection string is absent.
	#[error("Environment variable `{0}` is missing.")]
	MissingEnv(String),
	/// The environment variable holding the connection string is empty.
	#[error("Environment variable `{0}` is empty.")]
	EmptyEnv(String),
	/// A header name or value cannot be represented on the wire.
	#[error("Header `{name}` is invalid.")]
	InvalidHeader {
		/// Header name as supplied.
		name: String,
	},
	/// The outbound HTTP request could not be assembled.
	#[error(transparent)]
	HttpRequest(#[from] http::Error),
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// No transport is available for the descriptor.
	#[error("Descriptor `{descriptor}` has no transport; enable `reqwest` or supply one.")]
	MissingTransport {
		/// Descriptor display name.
		descriptor: String,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Body encoding and decoding failures.
#[derive(Debug, ThisError)]
pub enum SerializationError {
	/// Request body could not be encoded for the declared content type.
	#[error("Request body could not be encoded as {content_type}.")]
	Encode {
		/// Declared content type.
		content_type: String,
		/// Underlying encoder failure.
		#[source]
		source: BoxError,
	},
	/// Request body shape is not representable in the declared content type.
	#[error("Request body of kind {kind} cannot be encoded as {content_type}.")]
	Unsupported {
		/// Declared content type.
		content_type: String,
		/// Offending JSON kind.
		kind: &'static str,
	},
	/// Response bytes could not be decoded into the caller's type.
	#[error("{endpoint} response could not be decoded at `{path}`.")]
	Decode {
		/// Endpoint display name.
		endpoint: String,
		/// JSON path where decoding failed.
		path: String,
		/// Underlying decoder failure.
		#[source]
		source: serde_json::Error,
	},
}
impl SerializationError {
	/// Wraps an encoder failure for the given content type.
	pub fn encode(
		content_type: impl Into<String>,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Encode { content_type: content_type.into(), source: Box::new(src) }
	}

	pub(crate) fn decode(
		endpoint: impl Into<String>,
		err: serde_path_to_error::Error<serde_json::Error>,
	) -> Self {
		let path = err.path().to_string();

		Self::Decode { endpoint: endpoint.into(), path, source: err.into_inner() }
	}
}

/// Transport-level failures.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("{source}")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Generic failure synthesized for responses with status >= 400 when no mapper is configured.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("{status} {status_text}: {body}")]
pub struct UpstreamError {
	/// Numeric status code.
	pub status: u16,
	/// Canonical reason phrase.
	pub status_text: String,
	/// Raw response body (the reason phrase when the body was empty).
	pub body: String,
}

/// Raised when a [`Context`] is cancelled or its deadline elapses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ThisError)]
pub enum CancellationError {
	/// The context was cancelled explicitly.
	#[error("Context canceled.")]
	Canceled,
	/// The context deadline elapsed.
	#[error("Context deadline exceeded.")]
	DeadlineExceeded,
}

/// Bearer token acquisition failures.
#[derive(Debug, ThisError)]
pub enum AuthError {
	/// The token endpoint call failed.
	#[error("Token request for `{descriptor}` failed.")]
	TokenRequest {
		/// Descriptor display name.
		descriptor: String,
		/// Failure returned by the token endpoint pipeline.
		#[source]
		source: Box<Error>,
	},
	/// The provider answered without a usable token.
	#[error("Token for `{descriptor}` not found.")]
	EmptyToken {
		/// Descriptor display name.
		descriptor: String,
	},
	/// The provider is missing client credentials.
	#[error("Descriptor `{descriptor}` has no client credentials.")]
	MissingCredentials {
		/// Descriptor display name.
		descriptor: String,
	},
}
