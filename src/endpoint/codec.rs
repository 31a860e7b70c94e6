//! Request body codecs selected by the declared `Content-Type`.
//!
//! Bodies are first lowered to a [`Value`] so the codec can inspect their shape without any
//! runtime type inspection, then rendered into the single buffer that is both hashed and sent.

// crates.io
use serde_json::Value;
use url::form_urlencoded::Serializer as FormSerializer;
// self
use crate::{_prelude::*, error::SerializationError};

/// `application/json`.
pub const JSON: &str = "application/json";
/// `application/x-www-form-urlencoded`.
pub const FORM: &str = "application/x-www-form-urlencoded";
/// `text/plain`.
pub const TEXT: &str = "text/plain";

/// Body encoding chosen for one request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BodyCodec {
	/// JSON document.
	Json,
	/// `key=value&…` pairs.
	Form,
	/// Textual rendering of the value.
	Text,
	/// Any other declared media type; only strings pass through.
	Other(String),
}
impl BodyCodec {
	/// Picks the codec for a `Content-Type` header value, ignoring parameters such as `charset`.
	pub fn for_content_type(content_type: &str) -> Self {
		let media = content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();

		match media.as_str() {
			JSON => Self::Json,
			FORM => Self::Form,
			TEXT => Self::Text,
			_ if media.ends_with("+json") => Self::Json,
			_ => Self::Other(media),
		}
	}

	fn label(&self) -> &str {
		match self {
			Self::Json => JSON,
			Self::Form => FORM,
			Self::Text => TEXT,
			Self::Other(media) => media,
		}
	}

	/// Renders `input` into wire bytes. Empty inputs always yield an empty payload.
	pub fn encode(&self, input: &Value) -> Result<Vec<u8>, SerializationError> {
		if is_empty(input) {
			return Ok(Vec::new());
		}

		match (self, input) {
			(Self::Json, _) =>
				serde_json::to_vec(input).map_err(|e| SerializationError::encode(JSON, e)),
			(_, Value::String(raw)) => Ok(raw.as_bytes().to_vec()),
			(Self::Form, Value::Object(fields)) => encode_form(fields).map(String::into_bytes),
			(Self::Text, other) => Ok(other.to_string().into_bytes()),
			(codec, other) => Err(SerializationError::Unsupported {
				content_type: codec.label().to_owned(),
				kind: kind(other),
			}),
		}
	}
}

/// Whether a lowered body counts as absent.
pub fn is_empty(input: &Value) -> bool {
	match input {
		Value::Null => true,
		Value::String(raw) => raw.is_empty(),
		_ => false,
	}
}

/// Lowers an optional body into a [`Value`]; `None` becomes `null`.
pub fn to_value<B>(body: Option<&B>) -> Result<Value, SerializationError>
where
	B: Serialize,
{
	body.map_or(Ok(Value::Null), |body| {
		serde_json::to_value(body).map_err(|e| SerializationError::encode(JSON, e))
	})
}

/// Decodes response bytes, treating an empty body as JSON `null`.
///
/// Only nullable targets (`Option<_>`, `()`, [`Value`]) accept an empty body. Any other target,
/// such as a struct or a map, fails with a decode error on a `204` or an empty `200`.
pub fn decode<T>(bytes: &[u8]) -> Result<T, serde_path_to_error::Error<serde_json::Error>>
where
	T: DeserializeOwned,
{
	let bytes = if bytes.iter().all(u8::is_ascii_whitespace) { b"null".as_slice() } else { bytes };
	let mut de = serde_json::Deserializer::from_slice(bytes);

	serde_path_to_error::deserialize(&mut de)
}

fn encode_form(fields: &serde_json::Map<String, Value>) -> Result<String, SerializationError> {
	let mut form = FormSerializer::new(String::new());

	for (name, value) in fields {
		match value {
			Value::Array(items) =>
				for item in items {
					form.append_pair(name, &scalar(item)?);
				},
			other => {
				form.append_pair(name, &scalar(other)?);
			},
		}
	}

	Ok(form.finish())
}

fn scalar(value: &Value) -> Result<String, SerializationError> {
	match value {
		Value::Null => Ok(String::new()),
		Value::String(raw) => Ok(raw.clone()),
		Value::Bool(_) | Value::Number(_) => Ok(value.to_string()),
		other =>
			Err(SerializationError::Unsupported { content_type: FORM.into(), kind: kind(other) }),
	}
}

fn kind(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "bool",
		Value::Number(_) => "number",
		Value::String(_) => "string",
		Value::Array(_) => "array",
		Value::Object(_) => "object",
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;

	#[derive(Serialize)]
	struct Grant<'a> {
		grant_type: &'a str,
		scope: Vec<&'a str>,
		ttl: u32,
	}

	#[test]
	fn codec_selection_ignores_parameters_and_case() {
		assert_eq!(BodyCodec::for_content_type("Application/JSON; charset=utf-8"), BodyCodec::Json);
		assert_eq!(BodyCodec::for_content_type("application/vnd.api+json"), BodyCodec::Json);
		assert_eq!(BodyCodec::for_content_type(FORM), BodyCodec::Form);
		assert_eq!(BodyCodec::for_content_type("text/plain"), BodyCodec::Text);
		assert_eq!(
			BodyCodec::for_content_type("application/xml"),
			BodyCodec::Other("application/xml".into())
		);
	}

	#[test]
	fn form_encodes_structs_and_passes_strings_through() {
		let grant = Grant { grant_type: "client_credentials", scope: vec!["a b", "c"], ttl: 60 };
		let value = to_value(Some(&grant)).expect("Grant should lower.");

		assert_eq!(
			BodyCodec::Form.encode(&value).expect("Grant should encode."),
			b"grant_type=client_credentials&scope=a+b&scope=c&ttl=60"
		);
		assert_eq!(BodyCodec::Form.encode(&json!("a=1&b=2")).expect("String passes."), b"a=1&b=2");
	}

	#[test]
	fn form_rejects_nested_objects() {
		let err = BodyCodec::Form
			.encode(&json!({ "outer": { "inner": 1 } }))
			.expect_err("Nested objects are not form-encodable.");

		assert!(matches!(err, SerializationError::Unsupported { kind: "object", .. }));
	}

	#[test]
	fn text_and_other_codecs() {
		assert_eq!(BodyCodec::Text.encode(&json!(42)).expect("Numbers render."), b"42");
		assert_eq!(BodyCodec::Text.encode(&json!("hi")).expect("Strings pass."), b"hi");
		assert_eq!(
			BodyCodec::Other("application/xml".into())
				.encode(&json!("<a/>"))
				.expect("Strings pass through unknown types."),
			b"<a/>"
		);
		assert!(BodyCodec::Other("application/xml".into()).encode(&json!({ "a": 1 })).is_err());
	}

	#[test]
	fn empty_bodies_encode_to_nothing() {
		for codec in [BodyCodec::Json, BodyCodec::Form, BodyCodec::Text] {
			assert!(codec.encode(&Value::Null).expect("Null encodes.").is_empty());
			assert!(codec.encode(&json!("")).expect("Empty string encodes.").is_empty());
		}

		assert_eq!(to_value::<()>(None).expect("None lowers."), Value::Null);
	}

	#[test]
	fn decode_reports_path_and_accepts_empty() {
		#[derive(Debug, Deserialize)]
		#[allow(dead_code)]
		struct Page {
			items: Vec<u32>,
		}

		let err = decode::<Page>(br#"{"items":[1,"two"]}"#).expect_err("Shape mismatch should fail.");

		assert_eq!(err.path().to_string(), "items[1]");
		assert!(decode::<Option<Page>>(b"").expect("Empty body decodes as null.").is_none());
		assert_eq!(decode::<Value>(b" \n").expect("Blank body decodes as null."), Value::Null);
		assert!(decode::<Page>(b"").is_err());
	}
}
