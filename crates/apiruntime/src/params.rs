//! OpenAPI-3 parameter style × location serialization (SPEC_FULL.md §4.3).
//!
//! Pure string transforms only — no knowledge of HTTP, routing, or the
//! decoded-value type lives here. `decode.rs` picks the right function by
//! `(location, style, explode)` and wraps the result in a `Value`;
//! `openapi/mod.rs` uses the `encode_*` half to produce example values for
//! generated documentation and the parameter-style round-trip tests in
//! SPEC_FULL.md §8 exercise both directions together.
use crate::metadata::Style;

/// Splits a single raw token into an array per a non-exploded array style.
/// `form`(query,non-explode)/`simple`(path,header) use `,`; `spaceDelimited`
/// uses a literal space (the query string is already percent-decoded by the
/// time this runs); `pipeDelimited` uses `|`; `label`(path) uses `.`.
pub fn split_array(style: Style, raw: &str) -> Vec<String> {
	if raw.is_empty() {
		return Vec::new();
	}
	let sep = match style {
		Style::SpaceDelimited => ' ',
		Style::PipeDelimited => '|',
		Style::Label => '.',
		_ => ',',
	};
	if style == Style::Label {
		// ".a.b.c" -> leading separator, so strip it first.
		raw.trim_start_matches('.').split(sep).map(str::to_string).collect()
	} else {
		raw.split(sep).map(str::to_string).collect()
	}
}

pub fn join_array(style: Style, values: &[String]) -> String {
	let sep = match style {
		Style::SpaceDelimited => " ",
		Style::PipeDelimited => "|",
		Style::Label => ".",
		_ => ",",
	};
	let joined = values.join(sep);
	if style == Style::Label { format!(".{joined}") } else { joined }
}

/// `field1,v1,field2,v2` (form/simple/label non-explode object) into an
/// ordered list of `(field, value)` pairs.
pub fn parse_csv_object(raw: &str, style: Style) -> Vec<(String, String)> {
	let tokens = split_array(style, raw);
	tokens.chunks(2).filter(|c| c.len() == 2).map(|c| (c[0].clone(), c[1].clone())).collect()
}

pub fn encode_csv_object(style: Style, fields: &[(String, String)]) -> String {
	let mut tokens = Vec::with_capacity(fields.len() * 2);
	for (k, v) in fields {
		tokens.push(k.clone());
		tokens.push(v.clone());
	}
	join_array(style, &tokens)
}

/// `field=v.field=v` / `field=v,field=v` (explode object, label/simple) —
/// each pair keeps its own `=`, pairs are joined by the style's separator.
pub fn parse_exploded_object(raw: &str, style: Style) -> Vec<(String, String)> {
	let sep = match style {
		Style::Label => '.',
		_ => ',',
	};
	let body = if style == Style::Label { raw.trim_start_matches('.') } else { raw };
	body
		.split(sep)
		.filter(|s| !s.is_empty())
		.filter_map(|pair| pair.split_once('=').map(|(k, v)| (k.to_string(), v.to_string())))
		.collect()
}

pub fn encode_exploded_object(style: Style, fields: &[(String, String)]) -> String {
	let sep = match style {
		Style::Label => ".",
		_ => ",",
	};
	let joined = fields.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join(sep);
	if style == Style::Label { format!(".{joined}") } else { joined }
}

/// Matrix-style path parameter (`;k=a,b,c` non-explode array, `;k=a;k=b`
/// explode array, `;field=v;field=v` explode object, `;k=field,v,field,v`
/// non-explode object). `raw` is the path segment with the leading `;key=`
/// (or repeated `;key=value` tokens) still attached.
pub fn parse_matrix_array(key: &str, raw: &str, explode: bool) -> Vec<String> {
	if explode {
		raw
			.trim_start_matches(';')
			.split(';')
			.filter_map(|tok| tok.strip_prefix(&format!("{key}=")))
			.map(str::to_string)
			.collect()
	} else {
		raw
			.strip_prefix(&format!(";{key}="))
			.map(|rest| rest.split(',').map(str::to_string).collect())
			.unwrap_or_default()
	}
}

pub fn encode_matrix_array(key: &str, values: &[String], explode: bool) -> String {
	if explode {
		values.iter().map(|v| format!(";{key}={v}")).collect::<Vec<_>>().join("")
	} else {
		format!(";{key}={}", values.join(","))
	}
}

pub fn parse_matrix_object(key: &str, raw: &str, explode: bool) -> Vec<(String, String)> {
	if explode {
		raw
			.trim_start_matches(';')
			.split(';')
			.filter_map(|tok| tok.split_once('='))
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect()
	} else {
		raw
			.strip_prefix(&format!(";{key}="))
			.map(|rest| rest.split(',').collect::<Vec<_>>().chunks(2).filter(|c| c.len() == 2).map(|c| (c[0].to_string(), c[1].to_string())).collect())
			.unwrap_or_default()
	}
}

pub fn encode_matrix_object(key: &str, fields: &[(String, String)], explode: bool) -> String {
	if explode {
		fields.iter().map(|(k, v)| format!(";{k}={v}")).collect::<Vec<_>>().join("")
	} else {
		let mut tokens = Vec::with_capacity(fields.len() * 2);
		for (k, v) in fields {
			tokens.push(k.clone());
			tokens.push(v.clone());
		}
		format!(";{key}={}", tokens.join(","))
	}
}

/// `deepObject` query style: `?k[field]=v`. Given all query pairs, finds
/// those whose key matches `k[...]`.
pub fn parse_deep_object(key: &str, pairs: &[(String, String)]) -> Vec<(String, String)> {
	let prefix = format!("{key}[");
	pairs
		.iter()
		.filter_map(|(k, v)| {
			k.strip_prefix(&prefix).and_then(|rest| rest.strip_suffix(']')).map(|field| (field.to_string(), v.clone()))
		})
		.collect()
}

pub fn encode_deep_object(key: &str, fields: &[(String, String)]) -> Vec<(String, String)> {
	fields.iter().map(|(f, v)| (format!("{key}[{f}]"), v.clone())).collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn form_non_explode_array_round_trip() {
		let values = vec!["a".to_string(), "b".to_string(), "c".to_string()];
		let raw = join_array(Style::Form, &values);
		assert_eq!(raw, "a,b,c");
		assert_eq!(split_array(Style::Form, &raw), values);
	}

	#[test]
	fn space_and_pipe_delimited() {
		assert_eq!(split_array(Style::SpaceDelimited, "a b c"), vec!["a", "b", "c"]);
		assert_eq!(split_array(Style::PipeDelimited, "a|b|c"), vec!["a", "b", "c"]);
		assert_eq!(join_array(Style::SpaceDelimited, &["a".into(), "b".into()]), "a b");
	}

	#[test]
	fn label_array_round_trip() {
		let values = vec!["a".to_string(), "b".to_string()];
		let raw = join_array(Style::Label, &values);
		assert_eq!(raw, ".a.b");
		assert_eq!(split_array(Style::Label, &raw), values);
	}

	#[test]
	fn csv_object_round_trip() {
		let fields = vec![("field1".to_string(), "v1".to_string()), ("field2".to_string(), "v2".to_string())];
		let raw = encode_csv_object(Style::Form, &fields);
		assert_eq!(raw, "field1,v1,field2,v2");
		assert_eq!(parse_csv_object(&raw, Style::Form), fields);
	}

	#[test]
	fn exploded_object_round_trip() {
		let fields = vec![("field1".to_string(), "v1".to_string()), ("field2".to_string(), "v2".to_string())];
		let raw = encode_exploded_object(Style::Simple, &fields);
		assert_eq!(raw, "field1=v1,field2=v2");
		assert_eq!(parse_exploded_object(&raw, Style::Simple), fields);
	}

	#[test]
	fn matrix_array_explode_round_trip() {
		let values = vec!["1".to_string(), "2".to_string()];
		let raw = encode_matrix_array("ids", &values, true);
		assert_eq!(raw, ";ids=1;ids=2");
		assert_eq!(parse_matrix_array("ids", &raw, true), values);
	}

	#[test]
	fn matrix_array_non_explode_round_trip() {
		let values = vec!["1".to_string(), "2".to_string()];
		let raw = encode_matrix_array("ids", &values, false);
		assert_eq!(raw, ";ids=1,2");
		assert_eq!(parse_matrix_array("ids", &raw, false), values);
	}

	#[test]
	fn deep_object_extracts_matching_keys() {
		let pairs = vec![("filter[status]".to_string(), "active".to_string()), ("filter[type]".to_string(), "user".to_string()), ("other".to_string(), "x".to_string())];
		let fields = parse_deep_object("filter", &pairs);
		assert_eq!(fields, vec![("status".to_string(), "active".to_string()), ("type".to_string(), "user".to_string())]);
	}
}
