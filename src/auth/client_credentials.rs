//! OAuth 2.0 client-credentials provider.
//!
//! The client id and secret come from the descriptor's origin userinfo. Tokens are requested
//! through the regular endpoint pipeline against a token descriptor derived once from the parent,
//! so stubs, proxies, the error mapper, and the locker all apply to the token call as well.

// std
use std::sync::OnceLock;
// crates.io
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use url::form_urlencoded::Serializer as FormSerializer;
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, AuthFuture, AuthProvider},
	descriptor::ResourceDescriptor,
	endpoint::codec::FORM,
	error::AuthError,
};

/// Client-credentials grant against a fixed token endpoint.
#[derive(Debug)]
pub struct ClientCredentials {
	token_url: Url,
	extra_params: Vec<(String, String)>,
	token_descriptor: OnceLock<Arc<ResourceDescriptor>>,
}
impl ClientCredentials {
	/// Creates a provider posting to `token_url`; `extra_params` precede the grant fields.
	pub fn new<I, K, V>(token_url: Url, extra_params: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		Self {
			token_url,
			extra_params: extra_params.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
			token_descriptor: OnceLock::new(),
		}
	}

	/// Token endpoint URL.
	pub fn token_url(&self) -> &Url {
		&self.token_url
	}

	/// Form body sent to the token endpoint.
	pub fn form(&self, client_id: &str, client_secret: &str) -> String {
		let mut form = FormSerializer::new(String::new());

		for (name, value) in &self.extra_params {
			form.append_pair(name, value);
		}

		form.append_pair("grant_type", "client_credentials")
			.append_pair("client_id", client_id)
			.append_pair("client_secret", client_secret)
			.finish()
	}

	async fn request_token(
		&self,
		parent: &ResourceDescriptor,
		ctx: &Context,
	) -> Result<AccessToken> {
		let client_id = parent.username();

		if client_id.is_empty() {
			return Err(AuthError::MissingCredentials { descriptor: parent.to_string() }.into());
		}

		let descriptor =
			self.token_descriptor.get_or_init(|| Arc::new(parent.derive(self.token_url.clone())));
		let mut endpoint = descriptor.endpoint(self.token_url.path()).returning::<TokenResponse>();

		for (name, value) in self.token_url.query_pairs() {
			endpoint = endpoint.query(name, value);
		}

		let requested_at = OffsetDateTime::now_utc();
		let response = endpoint
			.name("token")
			.lock(true)
			.cache_key(Duration::ZERO, parent.name())
			.context(ctx.clone())
			.header(CONTENT_TYPE.as_str(), FORM)
			.header(AUTHORIZATION.as_str(), parent.basic_auth())
			.post(self.form(&client_id, &parent.password()))
			.await
			.map_err(|e| match e {
				Error::Cancelled(_) | Error::Mapped { .. } => e,
				e => AuthError::TokenRequest { descriptor: parent.to_string(), source: Box::new(e) }
					.into(),
			})?;

		if response.access_token.trim().is_empty() {
			return Err(AuthError::EmptyToken { descriptor: parent.to_string() }.into());
		}

		Ok(AccessToken::new(
			format!("{} {}", response.token_type, response.access_token),
			requested_at
				.saturating_add(response.expires_in.map_or(Duration::ZERO, ExpiresIn::as_duration)),
		))
	}
}
impl AuthProvider for ClientCredentials {
	fn authorize<'a>(
		&'a self,
		descriptor: &'a ResourceDescriptor,
		ctx: &'a Context,
	) -> AuthFuture<'a> {
		Box::pin(self.request_token(descriptor, ctx))
	}
}

/// Longest lifetime accepted from a token endpoint; larger `expires_in` values are capped.
pub const MAX_TOKEN_LIFETIME: Duration = Duration::days(365);

/// Successful token endpoint payload.
#[derive(Clone, Debug, Deserialize)]
pub struct TokenResponse {
	/// Token type, usually `Bearer`.
	#[serde(default)]
	pub token_type: String,
	/// Opaque access token.
	#[serde(default)]
	pub access_token: String,
	/// Lifetime in seconds.
	#[serde(default)]
	pub expires_in: Option<ExpiresIn>,
}

/// `expires_in` as providers actually send it: a number or a numeric string.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum ExpiresIn {
	/// JSON number.
	Seconds(f64),
	/// Numeric string.
	Text(String),
}
impl ExpiresIn {
	/// Lifetime as a duration, capped at [`MAX_TOKEN_LIFETIME`].
	///
	/// Unparsable or negative values count as zero.
	pub fn as_duration(self) -> Duration {
		let seconds = match self {
			Self::Seconds(seconds) => seconds,
			Self::Text(raw) => raw.trim().parse().unwrap_or_default(),
		};

		if seconds.is_nan() || seconds <= 0. {
			Duration::ZERO
		} else if seconds >= MAX_TOKEN_LIFETIME.as_seconds_f64() {
			MAX_TOKEN_LIFETIME
		} else {
			Duration::seconds_f64(seconds)
		}
	}
}
