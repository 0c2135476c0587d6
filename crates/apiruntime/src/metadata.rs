//! Compile-time struct metadata (SPEC_FULL.md §3, §9).
//!
//! `#[derive(Input)]`/`#[derive(Output)]` (in `apiruntime-macros`) emit a
//! `StructMetadata` literal built once behind a `OnceLock` and handed out as
//! a `&'static` reference. No runtime reflection happens anywhere in this
//! crate; this module just defines the shape the macro emits into and the
//! decoder/unmarshaler read from.
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Location {
	Query,
	Path,
	Header,
	Cookie,
	Body,
}

impl Location {
	pub fn as_str(self) -> &'static str {
		match self {
			Location::Query => "query",
			Location::Path => "path",
			Location::Header => "header",
			Location::Cookie => "cookie",
			Location::Body => "body",
		}
	}

	pub fn parse(s: &str) -> Option<Location> {
		Some(match s {
			"query" => Location::Query,
			"path" => Location::Path,
			"header" => Location::Header,
			"cookie" => Location::Cookie,
			"body" => Location::Body,
			_ => return None,
		})
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Style {
	Form,
	Simple,
	Matrix,
	Label,
	SpaceDelimited,
	PipeDelimited,
	DeepObject,
}

impl Style {
	/// Default style for a location, per SPEC_FULL.md §4.3.
	pub fn default_for(location: Location) -> Style {
		match location {
			Location::Query | Location::Cookie => Style::Form,
			Location::Path | Location::Header => Style::Simple,
			Location::Body => Style::Form,
		}
	}

	pub fn default_explode(self) -> bool {
		matches!(self, Style::Form | Style::DeepObject)
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Style::Form => "form",
			Style::Simple => "simple",
			Style::Matrix => "matrix",
			Style::Label => "label",
			Style::SpaceDelimited => "spaceDelimited",
			Style::PipeDelimited => "pipeDelimited",
			Style::DeepObject => "deepObject",
		}
	}

	pub fn parse(s: &str) -> Option<Style> {
		Some(match s {
			"form" => Style::Form,
			"simple" => Style::Simple,
			"matrix" => Style::Matrix,
			"label" => Style::Label,
			"spaceDelimited" => Style::SpaceDelimited,
			"pipeDelimited" => Style::PipeDelimited,
			"deepObject" => Style::DeepObject,
			_ => return None,
		})
	}

	/// The compatibility table in SPEC_FULL.md §4.3: which (location, style)
	/// pairs are legal. Checked once, at route-registration time.
	pub fn compatible(location: Location, style: Style) -> bool {
		use Location::*;
		use Style::*;
		matches!(
			(location, style),
			(Query, Form) | (Query, SpaceDelimited) | (Query, PipeDelimited) | (Query, DeepObject)
				| (Path, Simple) | (Path, Label) | (Path, Matrix)
				| (Header, Simple)
				| (Cookie, Form)
		)
	}
}

#[derive(Debug, Clone)]
pub enum BodyKind {
	Structured,
	File,
	Multipart,
}

impl BodyKind {
	pub fn parse(s: &str) -> Option<BodyKind> {
		Some(match s {
			"structured" => BodyKind::Structured,
			"file" => BodyKind::File,
			"multipart" => BodyKind::Multipart,
			_ => return None,
		})
	}
}

/// One field of an `Input`/`Output` struct, as emitted by the derive macro.
#[derive(Debug, Clone)]
pub struct FieldMetadata {
	pub struct_field_name: &'static str,
	pub map_key: &'static str,
	pub index: usize,
	pub type_name: &'static str,
	pub embedded: bool,
	pub default: Option<&'static str>,
	pub location: Option<Location>,
	pub style: Option<Style>,
	pub explode: bool,
	pub required: bool,
	pub body_kind: Option<BodyKind>,
	pub header_name: Option<&'static str>,
	pub validate: Option<&'static str>,
	/// Set by the derive macro from the field's own Rust type (`classify()`
	/// in `apiruntime-macros`): true when the field is a nested `Input`
	/// struct (or `Option` of one), i.e. the decoder must build a
	/// `Value::Map` for it rather than a `Value::List`. Needed because the
	/// decoder only ever sees strings off the wire — for the object-
	/// serialization cells of SPEC_FULL.md §4.3's table that share a comma/
	/// dot-delimited shape with the array cells (query form non-explode,
	/// path simple, path label, header simple), the raw text alone can't
	/// distinguish "a,b,c" (array) from "field1,v1,field2,v2" (object).
	pub object_shaped: bool,
}

impl FieldMetadata {
	pub fn location_prefix(&self) -> String {
		match self.location {
			Some(loc) => format!("{}.{}", loc.as_str(), self.map_key),
			None => self.map_key.to_string(),
		}
	}

	/// Called once per field from the `#[derive(Input)]`/`#[derive(Output)]`
	/// generated `metadata()` builder (itself run once behind a `OnceLock`).
	/// Feeds the raw `#[schema(...)]`/`#[body(...)]`/`#[default(...)]`/
	/// `#[header(...)]`/`#[validate(...)]` attribute strings the macro
	/// captured verbatim through `crate::tag::parse` — this is the one place
	/// the tag parser's grammar (SPEC_FULL.md §4.1) actually runs.
	#[allow(clippy::too_many_arguments)]
	pub fn from_tags(
		struct_field_name: &'static str,
		type_name: &'static str,
		index: usize,
		embedded: bool,
		schema_tag: Option<&str>,
		body_tag: Option<&str>,
		default_tag: Option<&'static str>,
		header_tag: Option<&'static str>,
		validate_tag: Option<&'static str>,
		object_shaped: bool,
	) -> FieldMetadata {
		let parsed = schema_tag.map(crate::tag::parse).unwrap_or_default();
		let map_key = parsed.name.clone().unwrap_or_else(|| struct_field_name.to_string());
		let location = parsed.get("location").and_then(Location::parse);
		let style = parsed
			.get("style")
			.and_then(Style::parse)
			.or_else(|| location.map(Style::default_for));
		let explode = parsed
			.get("explode")
			.map(|v| v == "true")
			.unwrap_or_else(|| style.map(Style::default_explode).unwrap_or(false));
		let required = parsed
			.get("required")
			.map(|v| v == "true")
			.unwrap_or(matches!(location, Some(Location::Path)));
		let body_kind = body_tag.and_then(BodyKind::parse);

		// Leak the computed String onto a 'static lifetime: metadata is built
		// exactly once per type (OnceLock) and lives for the process, so a
		// leak here is a one-time, bounded cost, not a per-request one.
		let map_key: &'static str = Box::leak(map_key.into_boxed_str());

		FieldMetadata {
			struct_field_name,
			map_key,
			index,
			type_name,
			embedded,
			default: default_tag,
			location,
			style,
			explode,
			required,
			body_kind,
			header_name: header_tag,
			validate: validate_tag,
			object_shaped,
		}
	}
}

/// Metadata for one `Input`/`Output` struct, built once and cached by the
/// macro-generated code behind a `OnceLock<StructMetadata>`.
#[derive(Debug, Clone)]
pub struct StructMetadata {
	pub name: &'static str,
	pub fields: Vec<FieldMetadata>,
	pub location_by_namespace: HashMap<String, String>,
}

impl StructMetadata {
	pub fn new(name: &'static str, fields: Vec<FieldMetadata>) -> Self {
		let mut location_by_namespace = HashMap::new();
		for f in &fields {
			location_by_namespace.insert(f.struct_field_name.to_string(), f.location_prefix());
		}
		Self { name, fields, location_by_namespace }
	}

	pub fn field(&self, struct_field_name: &str) -> Option<&FieldMetadata> {
		self.fields.iter().find(|f| f.struct_field_name == struct_field_name)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn style_defaults_match_table() {
		assert_eq!(Style::default_for(Location::Query), Style::Form);
		assert_eq!(Style::default_for(Location::Cookie), Style::Form);
		assert_eq!(Style::default_for(Location::Path), Style::Simple);
		assert_eq!(Style::default_for(Location::Header), Style::Simple);
		assert!(Style::Form.default_explode());
		assert!(Style::DeepObject.default_explode());
		assert!(!Style::Simple.default_explode());
	}

	#[test]
	fn compatibility_table() {
		assert!(Style::compatible(Location::Query, Style::Form));
		assert!(Style::compatible(Location::Query, Style::DeepObject));
		assert!(!Style::compatible(Location::Cookie, Style::Label));
		assert!(!Style::compatible(Location::Header, Style::Matrix));
		assert!(Style::compatible(Location::Path, Style::Matrix));
	}
}
