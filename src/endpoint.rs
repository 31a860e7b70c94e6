//! Per-call request builder and the execution pipeline.
//!
//! An [`Endpoint`] is a value: every builder method consumes it and returns the updated copy, and
//! clones share nothing mutable beyond the descriptor and limiter [`Arc`]s.
//!
//! [`Endpoint::execute`] runs, in order:
//!
//! 1. origin check;
//! 2. `Content-Type` defaulting (`application/json` for non-empty bodies);
//! 3. body encoding through the [`BodyCodec`] chosen by `Content-Type`;
//! 4. absolute URL assembly;
//! 5. context binding;
//! 6. fingerprinting, unless an explicit cache key is set;
//! 7. optional keyed locking;
//! 8. cache lookup;
//! 9. on a miss: rate limiting, dispatch, failure mapping, cache write, metrics;
//! 10. decoding into the target type.

pub mod codec;

pub use codec::BodyCodec;

// std
use std::{marker::PhantomData, time::Instant};
// crates.io
use http::{HeaderName, HeaderValue, Method, header::CONTENT_TYPE};
use serde_json::Value;
use url::form_urlencoded::Serializer as FormSerializer;
// self
use crate::{
	_prelude::*,
	descriptor::ResourceDescriptor,
	error::{ConfigError, SerializationError, UpstreamError},
	fingerprint::fingerprint,
	limit::{RateLimiter, TokenBucketLimiter},
	lock,
	obs::{self, CallLabels, CallSpan},
	transport::{HttpRequest, HttpResponse, status_text},
};

/// Everything an [`ErrorMapper`] may inspect about a rejected call.
#[derive(Clone, Copy, Debug)]
pub struct UpstreamFailure<'a> {
	/// Request as sent, without the injected `Authorization` header.
	pub request: &'a HttpRequest,
	/// Response with its body drained; an empty body is replaced by the status line.
	pub response: &'a HttpResponse,
	/// Request body before encoding.
	pub input: &'a Value,
}
impl UpstreamFailure<'_> {
	/// Response body as lossy UTF-8.
	pub fn body_text(&self) -> String {
		String::from_utf8_lossy(self.response.body()).into_owned()
	}

	/// Decodes the response body as JSON.
	pub fn body_json<E>(&self) -> Option<E>
	where
		E: DeserializeOwned,
	{
		serde_json::from_slice(self.response.body()).ok()
	}
}

/// Turns responses with status >= 400 into caller-defined errors.
///
/// Closures `Fn(UpstreamFailure<'_>) -> Error` implement this trait.
pub trait ErrorMapper
where
	Self: Send + Sync,
{
	/// Builds the error returned from the pipeline.
	fn map(&self, failure: UpstreamFailure<'_>) -> Error;
}
impl<F> ErrorMapper for F
where
	F: Fn(UpstreamFailure<'_>) -> Error + Send + Sync,
{
	fn map(&self, failure: UpstreamFailure<'_>) -> Error {
		self(failure)
	}
}

/// Request specification bound to a [`ResourceDescriptor`].
///
/// `B` is the body type and `T` the decoded response type; both default to [`Value`].
pub struct Endpoint<B = Value, T = Value> {
	descriptor: Arc<ResourceDescriptor>,
	name: Option<String>,
	method: Method,
	path: String,
	query: BTreeMap<String, String>,
	headers: BTreeMap<String, String>,
	body: Option<B>,
	cache_ttl: Duration,
	cache_key: Option<String>,
	lock: bool,
	limiter: Option<Arc<dyn RateLimiter>>,
	context: Option<Context>,
	error_mapper: Option<Arc<dyn ErrorMapper>>,
	target: PhantomData<fn() -> T>,
}
impl Endpoint {
	/// Builds a standalone endpoint from a full URL.
	///
	/// The descriptor is parsed from the same URL (connection-string options apply and are not
	/// forwarded upstream); the path and remaining query parameters become the request's, and the
	/// display name is the hostname.
	pub fn from_url(url: &str) -> Result<Self> {
		let descriptor = Arc::new(ResourceDescriptor::from_url(url)?);
		let origin = descriptor.origin().cloned().ok_or_else(|| ConfigError::MissingOrigin {
			descriptor: descriptor.name().to_owned(),
		})?;
		let mut endpoint = Self::for_descriptor(descriptor, origin.path().to_owned());

		for (name, value) in origin.query_pairs() {
			if !is_descriptor_option(&name) {
				endpoint.query.insert(name.into_owned(), value.into_owned());
			}
		}

		endpoint.name = origin.host_str().map(str::to_owned);

		Ok(endpoint)
	}

	pub(crate) fn for_descriptor(descriptor: Arc<ResourceDescriptor>, path: String) -> Self {
		let headers = descriptor.headers().clone();

		Self {
			descriptor,
			name: None,
			method: Method::GET,
			path,
			query: BTreeMap::new(),
			headers,
			body: None,
			cache_ttl: Duration::ZERO,
			cache_key: None,
			lock: false,
			limiter: None,
			context: None,
			error_mapper: None,
			target: PhantomData,
		}
	}
}
impl<B, T> Endpoint<B, T> {
	/// Sets the display name to `<descriptor>:<name>`.
	pub fn name(mut self, name: impl Display) -> Self {
		self.name = Some(format!("{}:{name}", self.descriptor.name()));

		self
	}

	/// Sets the HTTP method.
	pub fn method(mut self, method: Method) -> Self {
		self.method = method;

		self
	}

	/// Sets a header, replacing any value with the same name.
	pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		let name = name.into();

		self.headers.retain(|existing, _| !existing.eq_ignore_ascii_case(&name));
		self.headers.insert(name, value.into());

		self
	}

	/// Sets a query parameter, replacing any value with the same name.
	pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.query.insert(name.into(), value.into());

		self
	}

	/// Sets the request body, fixing the body type.
	pub fn body<C>(self, body: C) -> Endpoint<C, T> {
		let mut endpoint = self.rebind::<C, T>();

		endpoint.body = Some(body);

		endpoint
	}

	/// Changes the type the response decodes into.
	pub fn returning<U>(self) -> Endpoint<B, U> {
		self.rebind::<B, U>()
	}

	/// Throttles this endpoint with its own token bucket; a non-positive rate removes it.
	pub fn limit(mut self, rps: f64) -> Self {
		self.limiter = (rps > 0.)
			.then(|| Arc::new(TokenBucketLimiter::new(rps)) as Arc<dyn RateLimiter>);

		self
	}

	/// Throttles this endpoint with a shared limiter.
	pub fn with_limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
		self.limiter = Some(limiter);

		self
	}

	/// Caches successful responses for `ttl`, keyed by the request fingerprint.
	pub fn cache(mut self, ttl: Duration) -> Self {
		self.cache_ttl = ttl;
		self.cache_key = None;

		self
	}

	/// Caches successful responses for `ttl` under `key` instead of the fingerprint.
	pub fn cache_key(mut self, ttl: Duration, key: impl Into<String>) -> Self {
		self.cache_ttl = ttl;
		self.cache_key = Some(key.into()).filter(|key| !key.is_empty());

		self
	}

	/// Serializes concurrent calls sharing the cache key through the descriptor's locker.
	pub fn lock(mut self, enable: bool) -> Self {
		self.lock = enable;

		self
	}

	/// Binds a caller context; defaults to the background context.
	pub fn context(mut self, ctx: Context) -> Self {
		self.context = Some(ctx);

		self
	}

	/// Maps failures of this endpoint ahead of the descriptor's mapper.
	pub fn errors<M>(mut self, mapper: M) -> Self
	where
		M: 'static + ErrorMapper,
	{
		self.error_mapper = Some(Arc::new(mapper));

		self
	}

	/// Descriptor this endpoint belongs to.
	pub fn descriptor(&self) -> &Arc<ResourceDescriptor> {
		&self.descriptor
	}

	/// Name used in logs and errors: the explicit name, else the descriptor name, else the host.
	pub fn display_name(&self) -> String {
		match (&self.name, self.descriptor.name()) {
			(Some(name), _) => name.clone(),
			(None, name) if !name.is_empty() => name.to_owned(),
			_ => self.descriptor.host().unwrap_or_default().to_owned(),
		}
	}

	fn rebind<C, U>(self) -> Endpoint<C, U> {
		Endpoint {
			descriptor: self.descriptor,
			name: self.name,
			method: self.method,
			path: self.path,
			query: self.query,
			headers: self.headers,
			body: None,
			cache_ttl: self.cache_ttl,
			cache_key: self.cache_key,
			lock: self.lock,
			limiter: self.limiter,
			context: self.context,
			error_mapper: self.error_mapper,
			target: PhantomData,
		}
	}

	fn path_and_query(&self) -> String {
		let path = if self.path.starts_with('/') || self.path.is_empty() {
			self.path.clone()
		} else {
			format!("/{}", self.path)
		};

		if self.query.is_empty() {
			return path;
		}

		let mut query = FormSerializer::new(String::new());

		query.extend_pairs(&self.query);

		format!("{path}?{}", query.finish())
	}

	fn content_type(&self) -> Option<&str> {
		self.headers
			.iter()
			.find(|(name, _)| name.eq_ignore_ascii_case(CONTENT_TYPE.as_str()))
			.map(|(_, value)| value.as_str())
	}
}
impl<B, T> Endpoint<B, T>
where
	B: Serialize,
	T: DeserializeOwned,
{
	/// Runs the pipeline with the configured method and body.
	pub async fn execute(self) -> Result<T> {
		self.base_url()?;

		let input = codec::to_value(self.body.as_ref())?;

		self.dispatch(input).await
	}

	/// Runs a `GET`, ignoring any configured body.
	pub async fn get(mut self) -> Result<T> {
		self.body = None;

		self.method(Method::GET).execute().await
	}

	/// Runs a `POST` with `body`.
	pub async fn post<C>(self, body: C) -> Result<T>
	where
		C: Serialize,
	{
		self.method(Method::POST).body(body).execute().await
	}

	/// Resolves the cache and lock key without performing I/O.
	pub fn cache_key_for(&self) -> Result<String> {
		self.base_url()?;

		let input = codec::to_value(self.body.as_ref())?;

		Ok(self.prepare(&input)?.key)
	}

	fn base_url(&self) -> Result<String> {
		let base = self.descriptor.base_url().ok_or_else(|| ConfigError::MissingOrigin {
			descriptor: self.descriptor.name().to_owned(),
		})?;

		Ok(base)
	}

	fn prepare(&self, input: &Value) -> Result<Prepared> {
		let base = self.base_url()?;
		let mut headers = self.headers.clone();
		let content_type = match self.content_type() {
			Some(content_type) => Some(content_type.to_owned()),
			None if !codec::is_empty(input) => {
				headers.insert(CONTENT_TYPE.to_string(), codec::JSON.to_owned());

				Some(codec::JSON.to_owned())
			},
			None => None,
		};
		let payload = match content_type {
			Some(content_type) => BodyCodec::for_content_type(&content_type).encode(input)?,
			None => Vec::new(),
		};
		let url = format!("{base}{}", self.path_and_query());
		let mut request = http::Request::builder().method(self.method.clone()).uri(url.as_str());

		for (name, value) in &headers {
			let header = HeaderName::from_bytes(name.as_bytes())
				.map_err(|_| ConfigError::InvalidHeader { name: name.clone() })?;
			let value = HeaderValue::from_str(value)
				.map_err(|_| ConfigError::InvalidHeader { name: name.clone() })?;

			request = request.header(header, value);
		}

		let request = request.body(payload).map_err(ConfigError::from)?;
		let key = match &self.cache_key {
			Some(key) => key.clone(),
			None => fingerprint(request.method(), &url, request.headers(), request.body()),
		};

		Ok(Prepared { request, key })
	}

	async fn dispatch(self, input: Value) -> Result<T> {
		let Prepared { request, key } = self.prepare(&input)?;
		let ctx = self.context.clone().unwrap_or_else(Context::background);
		let labels = self.call_labels(&request);
		let span = CallSpan::new(&labels);

		span.instrument(self.run(ctx, request, key, input, labels)).await
	}

	/// Span and histogram labels; the domain is the descriptor name, falling back to the host.
	fn call_labels(&self, request: &HttpRequest) -> CallLabels {
		let domain = match self.descriptor.name() {
			"" => request.uri().host().unwrap_or_default(),
			name => name,
		};

		CallLabels::new(domain, request.method().as_str(), request.uri().path())
	}

	async fn run(
		self,
		ctx: Context,
		request: HttpRequest,
		key: String,
		input: Value,
		labels: CallLabels,
	) -> Result<T> {
		let name = self.display_name();
		let guard = if self.lock {
			Some(lock::acquire(&**self.descriptor.locker(), &ctx, &key).await?)
		} else {
			None
		};
		let bytes = match self.descriptor.get(&ctx, &key, self.cache_ttl).await {
			Some(bytes) => bytes,
			None => self.fetch(&ctx, request, &key, &input, &labels, &name).await?,
		};

		drop(guard);

		codec::decode(&bytes).map_err(|e| {
			let err = SerializationError::decode(name.as_str(), e);

			obs::decode_failed(&name, &err);

			err.into()
		})
	}

	async fn fetch(
		&self,
		ctx: &Context,
		request: HttpRequest,
		key: &str,
		input: &Value,
		labels: &CallLabels,
		name: &str,
	) -> Result<Vec<u8>> {
		self.wait(ctx).await?;

		let sent = replicate(&request);
		let started = Instant::now();
		let response = self.descriptor.run(ctx, request).await?;
		let status = response.status();

		if status.as_u16() >= 400 {
			obs::call_rejected(name, status.as_u16(), started.elapsed());

			return Err(self.reject(&sent, response, input));
		}

		let bytes = response.into_body();
		let cached = self.descriptor.set(ctx, key, bytes.clone(), self.cache_ttl).await.is_done();
		let elapsed = started.elapsed();

		obs::record_call(labels, elapsed);
		obs::call_completed(name, status.as_u16(), cached, sent.body().len(), bytes.len(), elapsed);

		Ok(bytes)
	}

	async fn wait(&self, ctx: &Context) -> Result<()> {
		if let Some(limiter) = self.limiter.as_ref() {
			let key = format!("{} {} {}", self.display_name(), self.method, self.path);

			limiter.check(ctx, &key).await?;
		} else if let Some(limiter) = self.descriptor.limiter() {
			limiter.check(ctx, self.descriptor.name()).await?;
		}

		Ok(())
	}

	fn reject(&self, request: &HttpRequest, mut response: HttpResponse, input: &Value) -> Error {
		let status = response.status();
		let reason = status_text(status);

		if response.body().is_empty() {
			*response.body_mut() = format!("{} {reason}", status.as_u16()).trim_end().into();
		}

		let failure = UpstreamFailure { request, response: &response, input };

		match self.error_mapper.as_ref().or(self.descriptor.error_mapper()) {
			Some(mapper) => mapper.map(failure),
			None => UpstreamError {
				status: status.as_u16(),
				status_text: reason.to_owned(),
				body: failure.body_text(),
			}
			.into(),
		}
	}
}
impl<B, T> Clone for Endpoint<B, T>
where
	B: Clone,
{
	fn clone(&self) -> Self {
		Self {
			descriptor: self.descriptor.clone(),
			name: self.name.clone(),
			method: self.method.clone(),
			path: self.path.clone(),
			query: self.query.clone(),
			headers: self.headers.clone(),
			body: self.body.clone(),
			cache_ttl: self.cache_ttl,
			cache_key: self.cache_key.clone(),
			lock: self.lock,
			limiter: self.limiter.clone(),
			context: self.context.clone(),
			error_mapper: self.error_mapper.clone(),
			target: PhantomData,
		}
	}
}
impl<B, T> Debug for Endpoint<B, T> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Endpoint")
			.field("name", &self.display_name())
			.field("method", &self.method)
			.field("path", &self.path)
			.field("query", &self.query)
			.field("cache_ttl", &self.cache_ttl)
			.field("cache_key", &self.cache_key)
			.field("lock", &self.lock)
			.finish_non_exhaustive()
	}
}
impl<B, T> Display for Endpoint<B, T> {
	/// Renders an HTTP/1.1-style preview of the request line and headers.
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		writeln!(f, "{} {} HTTP/1.1", self.method, self.path_and_query())?;
		writeln!(f, "Host: {}", self.descriptor.authority().unwrap_or_default())?;

		for (name, value) in &self.headers {
			writeln!(f, "{name}: {value}")?;
		}

		Ok(())
	}
}

struct Prepared {
	request: HttpRequest,
	key: String,
}

/// Copies method, URI, version, headers, and body; extensions are dropped.
fn replicate(request: &HttpRequest) -> HttpRequest {
	let mut copy = HttpRequest::new(request.body().clone());

	*copy.method_mut() = request.method().clone();
	*copy.uri_mut() = request.uri().clone();
	*copy.version_mut() = request.version();
	*copy.headers_mut() = request.headers().clone();

	copy
}

fn is_descriptor_option(name: &str) -> bool {
	matches!(name, "Cache" | "Name" | "MaxRequestsPerSecond") || name.starts_with("Header.")
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;
	use crate::{
		fingerprint::FINGERPRINT_LEN,
		transport::{StubRouter, stub_response},
	};

	fn descriptor() -> Arc<ResourceDescriptor> {
		Arc::new(
			ResourceDescriptor::from_url("https://api.test.com/?Header.Accept=application/json")
				.expect("Descriptor should parse."),
		)
	}

	fn stubbed(stubs: StubRouter) -> Arc<ResourceDescriptor> {
		Arc::new(
			ResourceDescriptor::from_url("https://api.test.com")
				.expect("Descriptor should parse.")
				.with_stubs(stubs),
		)
	}

	#[test]
	fn display_previews_the_request() {
		let endpoint = descriptor().endpoint("repos/a/b").query("state", "open").query("page", "2");

		assert_eq!(
			endpoint.to_string(),
			"GET /repos/a/b?page=2&state=open HTTP/1.1\nHost: api.test.com\nAccept: application/json\n"
		);
	}

	#[test]
	fn names_are_scoped_to_the_descriptor() {
		let endpoint = descriptor().endpoint("/issues");

		assert_eq!(endpoint.display_name(), "Test");
		assert_eq!(endpoint.name("issues").display_name(), "Test:issues");
	}

	#[test]
	fn fingerprint_tracks_body_and_ignores_header_insertion_order() {
		let base = descriptor().endpoint("/search").method(Method::POST);
		let a = base.clone().header("X-A", "1").header("X-B", "2").body(json!({ "q": "rust" }));
		let b = base.clone().header("X-B", "2").header("X-A", "1").body(json!({ "q": "rust" }));
		let c = base.header("X-A", "1").header("X-B", "2").body(json!({ "q": "go" }));
		let key_a = a.cache_key_for().expect("Key should resolve.");

		assert_eq!(key_a.len(), FINGERPRINT_LEN);
		assert_eq!(key_a, b.cache_key_for().expect("Key should resolve."));
		assert_ne!(key_a, c.cache_key_for().expect("Key should resolve."));
	}

	#[test]
	fn explicit_cache_key_is_used_verbatim() {
		let endpoint = descriptor()
			.endpoint("/config")
			.cache_key(Duration::HOUR, "config:v1")
			.body(json!({ "any": "thing" }));

		assert_eq!(endpoint.cache_key_for().expect("Key should resolve."), "config:v1");
	}

	#[test]
	fn missing_origin_is_a_config_error() {
		let endpoint = Arc::new(ResourceDescriptor::new("Nowhere")).endpoint("/x");
		let err = endpoint.cache_key_for().expect_err("Missing origin should fail.");

		assert!(matches!(err, Error::Config(ConfigError::MissingOrigin { .. })));
	}

	#[tokio::test]
	async fn missing_origin_is_reported_before_body_encoding() {
		struct Unencodable;
		impl Serialize for Unencodable {
			fn serialize<S>(&self, _: S) -> Result<S::Ok, S::Error>
			where
				S: serde::Serializer,
			{
				Err(serde::ser::Error::custom("unencodable"))
			}
		}

		let endpoint = Arc::new(ResourceDescriptor::new("Nowhere")).endpoint("/x").body(Unencodable);
		let key_err = endpoint.cache_key_for().expect_err("Missing origin should fail.");
		let call_err = endpoint.execute().await.expect_err("Missing origin should fail.");

		assert!(matches!(key_err, Error::Config(ConfigError::MissingOrigin { .. })));
		assert!(matches!(call_err, Error::Config(ConfigError::MissingOrigin { .. })));
	}

	#[test]
	fn call_labels_use_the_descriptor_name() {
		let conn = "https://api.github.com/?Name=GitHub";
		let named = Arc::new(ResourceDescriptor::from_url(conn).expect("Descriptor should parse."));
		let endpoint = named.endpoint("/repos/a/b/issues").query("state", "open");
		let Prepared { request, .. } =
			endpoint.prepare(&Value::Null).expect("Request should assemble.");
		let labels = endpoint.call_labels(&request);

		assert_eq!(labels, CallLabels::new("GitHub", "GET", "/repos/a/b/issues"));

		let unnamed = Arc::new(
			ResourceDescriptor::new("").with_origin(
				Url::parse("https://api.test.com").expect("Origin should parse."),
			),
		);
		let endpoint = unnamed.endpoint("/ping");
		let Prepared { request, .. } =
			endpoint.prepare(&Value::Null).expect("Request should assemble.");

		assert_eq!(endpoint.call_labels(&request).domain, "api.test.com");
	}

	#[test]
	fn from_url_keeps_upstream_query_only() {
		let endpoint = Endpoint::from_url("https://api.test.com/v1/items?Cache=1h&page=3")
			.expect("Endpoint should parse.");

		assert_eq!(endpoint.display_name(), "api.test.com");
		assert!(endpoint.to_string().starts_with("GET /v1/items?page=3 HTTP/1.1\n"));
	}

	#[tokio::test]
	async fn posts_json_and_decodes_the_response() {
		let stubs = StubRouter::default();

		stubs.handle(["api.test.com"], |req| {
			let content_type = req.headers().get(CONTENT_TYPE).cloned();

			assert_eq!(content_type, Some(HeaderValue::from_static("application/json")));

			stub_response(200, req.body().clone())
		});

		let descriptor = stubbed(stubs);
		let echoed = descriptor
			.endpoint("/echo")
			.returning::<BTreeMap<String, u32>>()
			.post(json!({ "n": 7 }))
			.await
			.expect("Echo should succeed.");

		assert_eq!(echoed.get("n"), Some(&7));
	}

	#[tokio::test]
	async fn empty_responses_decode_as_null() {
		let stubs = StubRouter::default();

		stubs.handle(["api.test.com"], |_| stub_response(204, Vec::new()));

		let descriptor = stubbed(stubs);
		let value = descriptor
			.endpoint("/empty")
			.returning::<Option<u32>>()
			.get()
			.await
			.expect("Empty response should decode.");

		assert_eq!(value, None);

		let err = descriptor
			.endpoint("/empty")
			.returning::<BTreeMap<String, u32>>()
			.get()
			.await
			.expect_err("A non-nullable target should reject an empty body.");

		assert!(matches!(err, Error::Serialization(SerializationError::Decode { .. })));
	}

	#[tokio::test]
	async fn form_bodies_use_the_form_codec() {
		#[derive(Serialize)]
		struct Search<'a> {
			q: &'a str,
			tag: [&'a str; 2],
		}

		let stubs = StubRouter::default();

		stubs.handle(["api.test.com"], |req| {
			let echoed = serde_json::to_vec(&String::from_utf8_lossy(req.body()))
				.expect("Body should re-encode as a JSON string.");

			stub_response(200, echoed)
		});

		let descriptor = stubbed(stubs);
		let sent = descriptor
			.endpoint("/search")
			.header("content-type", codec::FORM)
			.returning::<String>()
			.post(Search { q: "a b", tag: ["x", "y"] })
			.await
			.expect("Form post should succeed.");

		assert_eq!(sent, "q=a+b&tag=x&tag=y");
	}
}
