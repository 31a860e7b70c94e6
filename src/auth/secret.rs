//! `Authorization` header values that never reach logs.

// self
use crate::_prelude::*;

/// Full `Authorization` header value such as `Bearer abc`.
///
/// `Debug` and `Display` show the scheme only. Surrounding whitespace is trimmed on construction.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct TokenSecret(Box<str>);
impl TokenSecret {
	/// Wraps a header value.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into().trim().into())
	}

	/// Returns the header value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Authentication scheme, when the value has the `<scheme> <credentials>` shape.
	pub fn scheme(&self) -> Option<&str> {
		self.0.split_once(' ').map(|(scheme, _)| scheme).filter(|scheme| !scheme.is_empty())
	}

	/// Whether nothing is left after trimming.
	pub fn is_blank(&self) -> bool {
		self.0.is_empty()
	}
}
impl From<String> for TokenSecret {
	fn from(value: String) -> Self {
		Self::new(value)
	}
}
impl From<TokenSecret> for String {
	fn from(secret: TokenSecret) -> Self {
		secret.0.into()
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "TokenSecret({self})")
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self.scheme() {
			Some(scheme) => write!(f, "{scheme} <redacted>"),
			None => f.write_str("<redacted>"),
		}
	}
}
