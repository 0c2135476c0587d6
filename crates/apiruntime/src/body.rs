//! Body decoding (SPEC_FULL.md §4.3 "Body decoding"): the `structured`/
//! `file`/`multipart` kinds named by a field's `#[body("...")]` attribute.
//!
//! Grounded on `http/peekbody.rs`'s "peek without consuming" idiom, applied
//! here to *content-type dispatch* rather than auth-header inspection
//! (structured decoding needs to look at `Content-Type` before committing to
//! a parser), and on `quick-xml`/`serde_json`/`serde_urlencoded` already in
//! the dependency set.
use std::collections::HashMap;

use bytes::Bytes;

use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuredKind {
	Json,
	Xml,
	FormUrlEncoded,
}

#[derive(Debug, thiserror::Error)]
pub enum BodyError {
	#[error("unsupported content type {0:?}")]
	UnsupportedMediaType(Option<String>),
	#[error("invalid JSON body: {0}")]
	Json(#[from] serde_json::Error),
	#[error("invalid XML body: {0}")]
	Xml(String),
	#[error("invalid form body: {0}")]
	Form(String),
}

/// Content-Type header essence (everything before the first `;`), lowercased.
fn essence(content_type: Option<&str>) -> Option<String> {
	content_type.map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_ascii_lowercase())
}

pub fn detect_structured_kind(content_type: Option<&str>) -> Result<StructuredKind, BodyError> {
	match essence(content_type).as_deref() {
		None => Ok(StructuredKind::Json),
		Some("application/json") => Ok(StructuredKind::Json),
		Some(s) if s.ends_with("+json") => Ok(StructuredKind::Json),
		Some("application/xml") | Some("text/xml") => Ok(StructuredKind::Xml),
		Some(s) if s.ends_with("+xml") => Ok(StructuredKind::Xml),
		Some("application/x-www-form-urlencoded") => Ok(StructuredKind::FormUrlEncoded),
		other => Err(BodyError::UnsupportedMediaType(other.map(str::to_string))),
	}
}

/// Decodes a `body:"structured"` field: JSON/XML/form-urlencoded dispatched
/// on `Content-Type`, producing a `Value::Map` (or any shape JSON itself
/// allows at the top level).
pub fn decode_structured(bytes: &[u8], content_type: Option<&str>) -> Result<Value, BodyError> {
	if bytes.is_empty() {
		return Ok(Value::Map(HashMap::new()));
	}
	match detect_structured_kind(content_type)? {
		StructuredKind::Json => {
			let json: serde_json::Value = serde_json::from_slice(bytes)?;
			Ok(Value::from(json))
		},
		StructuredKind::Xml => decode_xml(bytes).map_err(BodyError::Xml),
		StructuredKind::FormUrlEncoded => {
			let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(bytes).map_err(|e| BodyError::Form(e.to_string()))?;
			Ok(expand_form_pairs(pairs))
		},
	}
}

/// XML bodies are decoded generically (element name -> text/children) since
/// the target type isn't known until the unmarshaler recurses into it;
/// `quick_xml`'s `de::from_str` needs a concrete target, so a one-level
/// generic reader builds the same `Value::Map` shape JSON produces.
fn decode_xml(bytes: &[u8]) -> Result<Value, String> {
	use quick_xml::events::Event;
	use quick_xml::reader::Reader;

	let text = std::str::from_utf8(bytes).map_err(|e| e.to_string())?;
	let mut reader = Reader::from_str(text);
	reader.config_mut().trim_text(true);

	fn read_element(reader: &mut Reader<&[u8]>) -> Result<Value, String> {
		let mut children: HashMap<String, Value> = HashMap::new();
		let mut text_buf = String::new();
		loop {
			match reader.read_event().map_err(|e| e.to_string())? {
				Event::Start(e) => {
					let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
					let child = read_element(reader)?;
					children.insert(name, child);
				},
				Event::Text(t) => {
					text_buf.push_str(&t.unescape().map_err(|e| e.to_string())?);
				},
				Event::End(_) => break,
				Event::Eof => break,
				_ => {},
			}
		}
		if children.is_empty() { Ok(Value::Text(text_buf.trim().to_string())) } else { Ok(Value::Map(children)) }
	}

	// Skip to the first start tag (declaration/whitespace precede it).
	loop {
		match reader.read_event().map_err(|e| e.to_string())? {
			Event::Start(_) => return read_element(&mut reader),
			Event::Eof => return Ok(Value::Map(HashMap::new())),
			_ => continue,
		}
	}
}

/// Expands `a[b]=c`/`a[b][c]=d`-style bracketed keys into nested maps, per
/// SPEC_FULL.md §4.3 "nested keys a[b]=c are expanded".
pub fn expand_form_pairs(pairs: Vec<(String, String)>) -> Value {
	let mut root: HashMap<String, Value> = HashMap::new();
	for (key, value) in pairs {
		insert_nested(&mut root, &key, Value::Text(value));
	}
	Value::Map(root)
}

fn insert_nested(map: &mut HashMap<String, Value>, key: &str, value: Value) {
	let Some(bracket_start) = key.find('[') else {
		map.insert(key.to_string(), value);
		return;
	};
	let head = &key[..bracket_start];
	let rest = &key[bracket_start..];
	let Some(bracket_end) = rest.find(']') else {
		map.insert(key.to_string(), value);
		return;
	};
	let field = &rest[1..bracket_end];
	let tail = &rest[bracket_end + 1..];

	let entry = map.entry(head.to_string()).or_insert_with(|| Value::Map(HashMap::new()));
	if let Value::Map(inner) = entry {
		if tail.is_empty() {
			insert_nested(inner, field, value);
		} else {
			insert_nested(inner, &format!("{field}{tail}"), value);
		}
	}
}

/// Raw bytes for a `body:"file"` field, reading the whole (already
/// size-limited, see `decode.rs`) body.
pub fn decode_file(bytes: Bytes) -> Value {
	Value::Bytes(bytes.to_vec())
}

/// Decodes a `body:"multipart"` field: each part becomes one entry in the
/// produced `Value::Map`, keyed by its form field name (SPEC_FULL.md §4.3
/// "multipart: each target subfield keyed by form field name"). A part with
/// a filename is kept as `Value::Bytes` (wrapped into a `BodyReader` by
/// `schema::take_reader` when the destination field asks for one); repeated
/// file parts under the same name accumulate into a `Value::List` rather
/// than overwriting, matching "file subfields become io.ReadCloser (or
/// slices of them)". A part with no filename is a plain form field and
/// becomes `Value::Text` — if the same field name repeats, only the first
/// text value is kept, matching the "string subfields receive first text
/// value" rule.
pub async fn decode_multipart(mut multipart: axum::extract::Multipart) -> Result<Value, BodyError> {
	let mut fields: HashMap<String, Value> = HashMap::new();
	while let Some(field) = multipart.next_field().await.map_err(|e| BodyError::Form(e.to_string()))? {
		let Some(name) = field.name().map(str::to_string) else { continue };
		let is_file = field.file_name().is_some();
		let data = field.bytes().await.map_err(|e| BodyError::Form(e.to_string()))?;
		if is_file {
			let part = Value::Bytes(data.to_vec());
			match fields.get_mut(&name) {
				Some(Value::List(items)) => items.push(part),
				Some(existing) => {
					let prev = std::mem::replace(existing, Value::Null);
					*existing = Value::List(vec![prev, part]);
				},
				None => {
					fields.insert(name, part);
				},
			}
		} else if !fields.contains_key(&name) {
			let text = String::from_utf8(data.to_vec()).map_err(|e| BodyError::Form(e.to_string()))?;
			fields.insert(name, Value::Text(text));
		}
	}
	Ok(Value::Map(fields))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn json_body_decodes_to_map() {
		let v = decode_structured(br#"{"name":"Ada","email":"ada@x"}"#, Some("application/json")).unwrap();
		let m = v.as_map().unwrap();
		assert_eq!(m.get("name").unwrap().as_text(), Some("Ada"));
	}

	#[test]
	fn xml_body_decodes_nested_elements() {
		let v = decode_xml(b"<user><name>Ada</name><email>ada@x</email></user>").unwrap();
		let m = v.as_map().unwrap();
		assert_eq!(m.get("name").unwrap().as_text(), Some("Ada"));
	}

	#[test]
	fn form_body_expands_bracketed_keys() {
		let v = expand_form_pairs(vec![("a[b]".to_string(), "1".to_string()), ("a[c]".to_string(), "2".to_string())]);
		let m = v.as_map().unwrap();
		let a = m.get("a").unwrap().as_map().unwrap();
		assert_eq!(a.get("b").unwrap().as_text(), Some("1"));
		assert_eq!(a.get("c").unwrap().as_text(), Some("2"));
	}

	#[test]
	fn unsupported_content_type_is_an_error() {
		let err = decode_structured(b"whatever", Some("application/octet-stream"));
		assert!(matches!(err, Err(BodyError::UnsupportedMediaType(_))));
	}

	#[test]
	fn empty_body_is_empty_map() {
		let v = decode_structured(b"", Some("application/json")).unwrap();
		assert!(v.as_map().unwrap().is_empty());
	}

	#[tokio::test]
	async fn multipart_keeps_first_text_value_and_wraps_files_as_bytes() {
		use axum::extract::FromRequest;

		let boundary = "X-BOUNDARY";
		let body = format!(
			"--{b}\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\nHello\r\n--{b}\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\nIgnored\r\n--{b}\r\nContent-Disposition: form-data; name=\"upload\"; filename=\"a.txt\"\r\nContent-Type: text/plain\r\n\r\nhi\r\n--{b}--\r\n",
			b = boundary
		);
		let request = axum::http::Request::builder()
			.method("POST")
			.header("content-type", format!("multipart/form-data; boundary={boundary}"))
			.body(axum::body::Body::from(body))
			.unwrap();
		let multipart = axum::extract::Multipart::from_request(request, &()).await.unwrap();
		let v = decode_multipart(multipart).await.unwrap();
		let m = v.as_map().unwrap();
		assert_eq!(m.get("title").unwrap().as_text(), Some("Hello"));
		assert!(matches!(m.get("upload").unwrap(), Value::Bytes(b) if b == b"hi"));
	}

	#[tokio::test]
	async fn multipart_accumulates_repeated_file_parts_into_a_list() {
		use axum::extract::FromRequest;

		let boundary = "X-BOUNDARY";
		let body = format!(
			"--{b}\r\nContent-Disposition: form-data; name=\"upload\"; filename=\"a.txt\"\r\nContent-Type: text/plain\r\n\r\none\r\n--{b}\r\nContent-Disposition: form-data; name=\"upload\"; filename=\"b.txt\"\r\nContent-Type: text/plain\r\n\r\ntwo\r\n--{b}--\r\n",
			b = boundary
		);
		let request = axum::http::Request::builder()
			.method("POST")
			.header("content-type", format!("multipart/form-data; boundary={boundary}"))
			.body(axum::body::Body::from(body))
			.unwrap();
		let multipart = axum::extract::Multipart::from_request(request, &()).await.unwrap();
		let v = decode_multipart(multipart).await.unwrap();
		let m = v.as_map().unwrap();
		let uploads = m.get("upload").unwrap().as_list().unwrap();
		assert_eq!(uploads.len(), 2);
		assert!(matches!(&uploads[0], Value::Bytes(b) if b == b"one"));
		assert!(matches!(&uploads[1], Value::Bytes(b) if b == b"two"));
	}
}
