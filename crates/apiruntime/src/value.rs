//! The decoded-value type.
//!
//! The Go source this crate is specified against uses `any` for a decoded
//! `{name -> value}` map entry (SPEC_FULL.md §9, "`Any` as the decoded-value
//! type"). Rust has no untyped `any` that's ergonomic to pattern-match on, so
//! this crate uses a closed tagged variant instead. The request decoder
//! (`decode.rs`) only ever produces these eight shapes; the unmarshaler
//! (`convert.rs`) and the `#[derive(Input)]`-generated code only ever consume
//! them.
use std::collections::HashMap;
use std::fmt;
use std::io::Cursor;
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};

use tokio::io::{AsyncRead, ReadBuf};

/// A boxed, already-open body or multipart-file-part stream. Mirrors Go's
/// `io.ReadCloser` target for `body:"file"`/`body:"multipart"` fields;
/// dropping it is the "close".
pub type BodyReader = Box<dyn AsyncRead + Unpin + Send>;

/// Wraps an in-memory buffer so a `Value::Bytes`/`Value::Text` can satisfy a
/// field typed as `BodyReader` (SPEC_FULL.md §4.2, "bytes/string wrapped in
/// an in-memory reader with no-op close").
pub struct BytesReader {
	cursor: Cursor<Vec<u8>>,
}

impl BytesReader {
	pub fn new(bytes: Vec<u8>) -> Self {
		Self { cursor: Cursor::new(bytes) }
	}
}

impl AsyncRead for BytesReader {
	fn poll_read(mut self: Pin<&mut Self>, _cx: &mut TaskContext<'_>, buf: &mut ReadBuf<'_>) -> Poll<std::io::Result<()>> {
		use std::io::Read;
		let n = self.cursor.read(buf.initialize_unfilled())?;
		buf.advance(n);
		Poll::Ready(Ok(()))
	}
}

/// A decoded request fragment: one parameter value, one body field, or a
/// nested object built up during parameter/body decoding.
pub enum Value {
	Null,
	Bool(bool),
	Int(i64),
	Float(f64),
	Text(String),
	Bytes(Vec<u8>),
	List(Vec<Value>),
	Map(HashMap<String, Value>),
	/// A streamed body or multipart file part. Not `Clone`; once read, it's
	/// consumed, matching an `io::ReadCloser`'s one-shot nature.
	Reader(BodyReader),
}

impl fmt::Debug for Value {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Value::Null => write!(f, "Null"),
			Value::Bool(b) => write!(f, "Bool({b})"),
			Value::Int(i) => write!(f, "Int({i})"),
			Value::Float(v) => write!(f, "Float({v})"),
			Value::Text(s) => write!(f, "Text({s:?})"),
			Value::Bytes(b) => write!(f, "Bytes[{} bytes]", b.len()),
			Value::List(l) => f.debug_list().entries(l.iter()).finish(),
			Value::Map(m) => f.debug_map().entries(m.iter()).finish(),
			Value::Reader(_) => write!(f, "Reader(..)"),
		}
	}
}

impl Value {
	pub fn kind(&self) -> &'static str {
		match self {
			Value::Null => "null",
			Value::Bool(_) => "bool",
			Value::Int(_) => "int",
			Value::Float(_) => "float",
			Value::Text(_) => "text",
			Value::Bytes(_) => "bytes",
			Value::List(_) => "list",
			Value::Map(_) => "map",
			Value::Reader(_) => "reader",
		}
	}

	pub fn from_str_scalar(s: impl Into<String>) -> Value {
		Value::Text(s.into())
	}

	pub fn as_text(&self) -> Option<&str> {
		match self {
			Value::Text(s) => Some(s),
			_ => None,
		}
	}

	pub fn as_map(&self) -> Option<&HashMap<String, Value>> {
		match self {
			Value::Map(m) => Some(m),
			_ => None,
		}
	}

	pub fn as_list(&self) -> Option<&[Value]> {
		match self {
			Value::List(l) => Some(l),
			_ => None,
		}
	}
}

impl From<serde_json::Value> for Value {
	fn from(v: serde_json::Value) -> Self {
		match v {
			serde_json::Value::Null => Value::Null,
			serde_json::Value::Bool(b) => Value::Bool(b),
			serde_json::Value::Number(n) => {
				if let Some(i) = n.as_i64() {
					Value::Int(i)
				} else {
					Value::Float(n.as_f64().unwrap_or_default())
				}
			},
			serde_json::Value::String(s) => Value::Text(s),
			serde_json::Value::Array(a) => Value::List(a.into_iter().map(Value::from).collect()),
			serde_json::Value::Object(o) => {
				Value::Map(o.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
			},
		}
	}
}
