//! The request decoder (SPEC_FULL.md §4.3): builds the flat
//! `{field.map_key -> Value}` map `Input::from_map` consumes, by reading each
//! field's declared `(location, style, explode)` out of its own
//! `StructMetadata`.
//!
//! Only fields with a `location` (query/path/header/cookie) or a `body_kind`
//! are populated here; everything else (nested nameless/embedded fields, a
//! struct made entirely of defaults) is left absent and handled by
//! `convert_nested`'s "absent means empty map" rule in `schema.rs`.
use std::collections::HashMap;

use axum::http::HeaderMap;

use crate::body::BodyError;
use crate::metadata::{FieldMetadata, Location, StructMetadata, Style};
use crate::params;
use crate::problem::ErrorDetail;
use crate::value::Value;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
	#[error("request body too large")]
	PayloadTooLarge,
	#[error("timed out reading request body")]
	RequestTimeout,
	#[error(transparent)]
	Body(#[from] BodyError),
}

/// The request-side material the decoder reads from. Built by `handler.rs`
/// out of the `axum` request parts before any `Input`-specific work happens,
/// so the same `RawRequest` is shared across every `Input` field table.
pub struct RawRequest<'a> {
	pub headers: &'a HeaderMap,
	pub query_pairs: Vec<(String, String)>,
	pub path_params: &'a HashMap<String, String>,
	pub cookie_header: Option<&'a str>,
	/// The already-decoded body `Value`, if this route has a body field.
	/// Produced by `body.rs`/the multipart extractor *before* calling
	/// `decode_fields` (body consumption happens once, up front).
	pub body: Option<Value>,
}

impl<'a> RawRequest<'a> {
	pub fn new(headers: &'a HeaderMap, query: Option<&str>, path_params: &'a HashMap<String, String>, cookie_header: Option<&'a str>, body: Option<Value>) -> Self {
		let query_pairs = query.map(parse_query).unwrap_or_default();
		Self { headers, query_pairs, path_params, cookie_header, body }
	}
}

fn parse_query(raw: &str) -> Vec<(String, String)> {
	serde_urlencoded::from_str(raw).unwrap_or_default()
}

/// Populates the flat map for one `Input` type's immediate fields, collecting
/// per-field decode failures (required-but-missing params) as
/// `ErrorDetail`s rather than failing fast, per SPEC_FULL.md §7
/// "Propagation".
pub fn decode_fields(meta: &StructMetadata, req: &mut RawRequest<'_>) -> (HashMap<String, Value>, Vec<ErrorDetail>) {
	let mut values = HashMap::new();
	let mut errors = Vec::new();

	for field in &meta.fields {
		if field.body_kind.is_some() {
			if let Some(body) = req.body.take() {
				values.insert(field.map_key.to_string(), body);
			}
			continue;
		}
		let Some(location) = field.location else { continue };
		match extract_param(field, location, req) {
			Some(value) => {
				values.insert(field.map_key.to_string(), value);
			},
			None if field.required => {
				errors.push(ErrorDetail {
					code: "required".to_string(),
					message: format!("{} is required", field.location_prefix()),
					location: field.location_prefix(),
				});
			},
			None => {},
		}
	}

	(values, errors)
}

fn extract_param(field: &FieldMetadata, location: Location, req: &RawRequest<'_>) -> Option<Value> {
	let style = field.style.unwrap_or(Style::default_for(location));
	let key = field.map_key;

	match location {
		Location::Query => extract_query(key, style, field.explode, field.object_shaped, &req.query_pairs),
		Location::Path => extract_path(key, style, field.explode, field.object_shaped, req.path_params),
		Location::Header => extract_simple_multi(header_values(req.headers, key), style, field.object_shaped),
		Location::Cookie => extract_form_scalar(cookie_value(req.cookie_header, key)),
		Location::Body => None,
	}
}

fn header_values(headers: &HeaderMap, name: &str) -> Vec<String> {
	headers.get_all(name).iter().filter_map(|v| v.to_str().ok().map(str::to_string)).collect()
}

fn cookie_value(cookie_header: Option<&str>, name: &str) -> Option<String> {
	let raw = cookie_header?;
	cookie::Cookie::split_parse(raw).flatten().find(|c| c.name() == name).map(|c| c.value().to_string())
}

fn extract_form_scalar(raw: Option<String>) -> Option<Value> {
	raw.map(Value::Text)
}

fn extract_query(key: &str, style: Style, explode: bool, object_shaped: bool, pairs: &[(String, String)]) -> Option<Value> {
	if style == Style::DeepObject {
		let fields = params::parse_deep_object(key, pairs);
		return if fields.is_empty() { None } else { Some(Value::Map(fields.into_iter().map(|(k, v)| (k, Value::Text(v))).collect())) };
	}

	let matches: Vec<&str> = pairs.iter().filter(|(k, _)| k == key).map(|(_, v)| v.as_str()).collect();
	if matches.is_empty() {
		return None;
	}

	if explode {
		if matches.len() > 1 {
			Some(Value::List(matches.into_iter().map(|v| Value::Text(v.to_string())).collect()))
		} else {
			// A single exploded occurrence could be a scalar or a one-element
			// array; `convert_vec` coerces a lone `Value::Text` leniently.
			Some(Value::Text(matches[0].to_string()))
		}
	} else if object_shaped {
		// `query|form(explode=false)` object row: `?k=field1,v1,field2,v2`
		// (SPEC_FULL.md §4.3).
		Some(Value::Map(params::parse_csv_object(matches[0], style).into_iter().map(|(k, v)| (k, Value::Text(v))).collect()))
	} else {
		// Non-explode: the single occurrence is itself the delimited list.
		let items = params::split_array(style, matches[0]);
		Some(Value::List(items.into_iter().map(Value::Text).collect()))
	}
}

fn extract_path(key: &str, style: Style, explode: bool, object_shaped: bool, path_params: &HashMap<String, String>) -> Option<Value> {
	let raw = path_params.get(key)?;
	match style {
		Style::Matrix => {
			let array = params::parse_matrix_array(key, raw, explode);
			if !array.is_empty() {
				return Some(Value::List(array.into_iter().map(Value::Text).collect()));
			}
			let object = params::parse_matrix_object(key, raw, explode);
			if !object.is_empty() {
				return Some(Value::Map(object.into_iter().map(|(k, v)| (k, Value::Text(v))).collect()));
			}
			None
		},
		// `path|label` object row: `.field=v.field=v` (SPEC_FULL.md §4.3
		// names only the explode form for label objects).
		Style::Label if object_shaped && explode => {
			Some(Value::Map(params::parse_exploded_object(raw, style).into_iter().map(|(k, v)| (k, Value::Text(v))).collect()))
		},
		Style::Label if raw.contains('.') => {
			let items = params::split_array(style, raw);
			Some(Value::List(items.into_iter().map(Value::Text).collect()))
		},
		// `path|simple` object row: `field,v,field,v` (explode=false) or
		// `field=v,field=v` (explode=true) (SPEC_FULL.md §4.3).
		Style::Simple if object_shaped && explode => {
			Some(Value::Map(params::parse_exploded_object(raw, style).into_iter().map(|(k, v)| (k, Value::Text(v))).collect()))
		},
		Style::Simple if object_shaped => {
			Some(Value::Map(params::parse_csv_object(raw, style).into_iter().map(|(k, v)| (k, Value::Text(v))).collect()))
		},
		Style::Simple if raw.contains(',') => {
			let items = params::split_array(style, raw);
			Some(Value::List(items.into_iter().map(Value::Text).collect()))
		},
		_ => Some(Value::Text(raw.trim_start_matches('.').to_string())),
	}
}

/// Header values: `simple` is the only legal style (SPEC_FULL.md §4.3
/// compatibility table), comma-joined when non-explode, repeated header
/// lines when explode.
fn extract_simple_multi(raw_values: Vec<String>, style: Style, object_shaped: bool) -> Option<Value> {
	if raw_values.is_empty() {
		return None;
	}
	if raw_values.len() > 1 {
		return Some(Value::List(raw_values.into_iter().map(Value::Text).collect()));
	}
	let only = &raw_values[0];
	// `header|simple` object row: `field,v,field,v` (SPEC_FULL.md §4.3).
	if object_shaped {
		return Some(Value::Map(params::parse_csv_object(only, style).into_iter().map(|(k, v)| (k, Value::Text(v))).collect()));
	}
	if only.contains(',') {
		let items = params::split_array(style, only);
		if items.len() > 1 {
			return Some(Value::List(items.into_iter().map(Value::Text).collect()));
		}
	}
	Some(Value::Text(only.clone()))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::metadata::BodyKind;

	fn field(map_key: &'static str, location: Location, style: Style, explode: bool, required: bool) -> FieldMetadata {
		object_field(map_key, location, style, explode, required, false)
	}

	fn object_field(map_key: &'static str, location: Location, style: Style, explode: bool, required: bool, object_shaped: bool) -> FieldMetadata {
		FieldMetadata {
			struct_field_name: map_key,
			map_key,
			index: 0,
			type_name: "String",
			embedded: false,
			default: None,
			location: Some(location),
			style: Some(style),
			explode,
			required,
			body_kind: None,
			header_name: None,
			validate: None,
			object_shaped,
		}
	}

	#[test]
	fn query_form_explode_repeated_becomes_list() {
		let pairs = vec![("ids".to_string(), "1".to_string()), ("ids".to_string(), "2".to_string())];
		let v = extract_query("ids", Style::Form, true, false, &pairs).unwrap();
		assert_eq!(v.as_list().unwrap().len(), 2);
	}

	#[test]
	fn query_form_non_explode_comma_list_splits() {
		let pairs = vec![("ids".to_string(), "1,2,3".to_string())];
		let v = extract_query("ids", Style::Form, false, false, &pairs).unwrap();
		assert_eq!(v.as_list().unwrap().len(), 3);
	}

	#[test]
	fn query_form_non_explode_object_shaped_builds_map() {
		let pairs = vec![("coord".to_string(), "lat,1,long,2".to_string())];
		let v = extract_query("coord", Style::Form, false, true, &pairs).unwrap();
		let map = v.as_map().unwrap();
		assert_eq!(map.get("lat").unwrap().as_text(), Some("1"));
		assert_eq!(map.get("long").unwrap().as_text(), Some("2"));
	}

	#[test]
	fn query_deep_object_builds_map() {
		let pairs = vec![("filter[status]".to_string(), "active".to_string())];
		let v = extract_query("filter", Style::DeepObject, true, false, &pairs).unwrap();
		assert_eq!(v.as_map().unwrap().get("status").unwrap().as_text(), Some("active"));
	}

	#[test]
	fn path_matrix_array_parses_semicolon_segment() {
		let mut params = HashMap::new();
		params.insert("ids".to_string(), ";ids=1,2".to_string());
		let v = extract_path("ids", Style::Matrix, false, false, &params).unwrap();
		assert_eq!(v.as_list().unwrap().len(), 2);
	}

	#[test]
	fn path_simple_object_shaped_non_explode_builds_map() {
		let mut params = HashMap::new();
		params.insert("coord".to_string(), "lat,1,long,2".to_string());
		let v = extract_path("coord", Style::Simple, false, true, &params).unwrap();
		let map = v.as_map().unwrap();
		assert_eq!(map.get("lat").unwrap().as_text(), Some("1"));
		assert_eq!(map.get("long").unwrap().as_text(), Some("2"));
	}

	#[test]
	fn path_simple_object_shaped_explode_builds_map() {
		let mut params = HashMap::new();
		params.insert("coord".to_string(), "lat=1,long=2".to_string());
		let v = extract_path("coord", Style::Simple, true, true, &params).unwrap();
		let map = v.as_map().unwrap();
		assert_eq!(map.get("lat").unwrap().as_text(), Some("1"));
		assert_eq!(map.get("long").unwrap().as_text(), Some("2"));
	}

	#[test]
	fn path_label_object_shaped_explode_builds_map() {
		let mut params = HashMap::new();
		params.insert("coord".to_string(), ".lat=1.long=2".to_string());
		let v = extract_path("coord", Style::Label, true, true, &params).unwrap();
		let map = v.as_map().unwrap();
		assert_eq!(map.get("lat").unwrap().as_text(), Some("1"));
		assert_eq!(map.get("long").unwrap().as_text(), Some("2"));
	}

	#[test]
	fn header_simple_object_shaped_builds_map() {
		let v = extract_simple_multi(vec!["lat,1,long,2".to_string()], Style::Simple, true).unwrap();
		let map = v.as_map().unwrap();
		assert_eq!(map.get("lat").unwrap().as_text(), Some("1"));
		assert_eq!(map.get("long").unwrap().as_text(), Some("2"));
	}

	#[test]
	fn missing_required_query_param_is_collected_as_error() {
		let meta = StructMetadata::new("T", vec![field("q", Location::Query, Style::Form, true, true)]);
		let headers = HeaderMap::new();
		let empty = HashMap::new();
		let mut req = RawRequest::new(&headers, None, &empty, None, None);
		let (values, errors) = decode_fields(&meta, &mut req);
		assert!(values.is_empty());
		assert_eq!(errors.len(), 1);
		assert_eq!(errors[0].code, "required");
	}

	#[test]
	fn body_field_consumes_the_decoded_body_once() {
		let mut f = field("payload", Location::Body, Style::Form, true, false);
		f.location = None;
		f.body_kind = Some(BodyKind::Structured);
		let meta = StructMetadata::new("T", vec![f]);
		let headers = HeaderMap::new();
		let empty = HashMap::new();
		let body = Value::Map(HashMap::from([("name".to_string(), Value::Text("Ada".into()))]));
		let mut req = RawRequest::new(&headers, None, &empty, None, Some(body));
		let (values, errors) = decode_fields(&meta, &mut req);
		assert!(errors.is_empty());
		assert!(values.contains_key("payload"));
		assert!(req.body.is_none());
	}
}
