//! The macro-facing surface: the `Input`/`Output` traits `#[derive(Input)]`
//! and `#[derive(Output)]` implement, plus the small helper functions the
//! generated code calls into. Keeping these helpers here (rather than
//! inlining the logic in the macro's `quote!` output) means the generated
//! code is a short, readable sequence of calls — easier to read in
//! `cargo expand` output and easier for this crate to unit test directly.
use std::collections::HashMap;
use std::fmt;

use crate::convert::{ConverterRegistry, ConvertError};
use crate::metadata::StructMetadata;
use crate::value::{BodyReader, BytesReader, Value};

#[derive(Debug, Clone)]
pub struct UnmarshalError {
	pub path: String,
	pub from_kind: String,
	pub to_type: &'static str,
	pub cause: Option<String>,
}

impl fmt::Display for UnmarshalError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}: cannot decode {} into {}", self.path, self.from_kind, self.to_type)?;
		if let Some(c) = &self.cause {
			write!(f, ": {c}")?;
		}
		Ok(())
	}
}

impl std::error::Error for UnmarshalError {}

impl UnmarshalError {
	pub fn from_convert(path: &str, err: ConvertError) -> Self {
		Self { path: path.to_string(), from_kind: err.from.clone(), to_type: err.to, cause: err.cause.clone() }
	}

	/// Prefixes `path` with a parent field name, building up the
	/// `body.user.email`-shaped path described in SPEC_FULL.md §4.2.
	pub fn nest(mut self, parent: &str) -> Self {
		self.path = if self.path.is_empty() { parent.to_string() } else { format!("{parent}.{}", self.path) };
		self
	}
}

/// Implemented by every type annotated `#[derive(Input)]`. There is no
/// untyped entry point (`Unmarshal(data, *T)` in the distilled spec): Rust
/// has no runtime reflection, so the type parameter *is* the "non-nil
/// pointer" precondition.
///
/// `from_map` takes the decoded map *by value*: a multipart file field's
/// `Value::Reader` can only be read once, so ownership has to move from the
/// request decoder down into the leaf field that consumes it rather than
/// being cloned at every nesting level.
pub trait Input: Sized + Send + Sync + 'static {
	fn metadata() -> &'static StructMetadata;
	fn from_map(map: HashMap<String, Value>, registry: &ConverterRegistry) -> Result<Self, UnmarshalError>;

	/// Runs every field's `#[validate(...)]` rule (SPEC_FULL.md §4.9).
	/// Default is empty for types with no validated fields; the derive
	/// macro overrides this when any field carries a `#[validate(...)]`
	/// attribute.
	fn validate(&self) -> Vec<crate::problem::ErrorDetail> {
		Vec::new()
	}
}

/// Implemented by every type annotated `#[derive(Output)]`. `status`/
/// `headers`/`body_json` realize the "Analyze Output to find Status int,
/// Body any, and header fields" step in SPEC_FULL.md §4.5.
pub trait Output: Send + Sync + 'static {
	fn metadata() -> &'static StructMetadata;
	fn status(&self) -> Option<u16>;
	fn headers(&self) -> Vec<(String, Vec<String>)>;
	/// The `Body any` field, realized as `crate::response::BodyPayload` so a
	/// `Vec<u8>`-typed body can skip negotiation and write verbatim per
	/// SPEC_FULL.md §4.5 step 7.
	fn body(&self) -> crate::response::BodyPayload;
}

pub fn materialize_default(default: &str) -> Value {
	Value::Text(default.to_string())
}

pub fn convert_scalar<T: Send + Sync + 'static>(
	value: Value,
	registry: &ConverterRegistry,
	path: &str,
) -> Result<T, UnmarshalError> {
	registry.convert::<T>(&value).map_err(|e| UnmarshalError::from_convert(path, e))
}

pub fn convert_option<T: Send + Sync + 'static>(
	value: Option<Value>,
	registry: &ConverterRegistry,
	path: &str,
) -> Result<Option<T>, UnmarshalError> {
	match value {
		None | Some(Value::Null) => Ok(None),
		Some(v) => convert_scalar::<T>(v, registry, path).map(Some),
	}
}

pub fn convert_vec<T: Send + Sync + 'static>(
	value: Option<Value>,
	registry: &ConverterRegistry,
	path: &str,
) -> Result<Vec<T>, UnmarshalError> {
	match value {
		None | Some(Value::Null) => Ok(Vec::new()),
		Some(Value::List(items)) => items
			.into_iter()
			.enumerate()
			.map(|(i, item)| convert_scalar::<T>(item, registry, &format!("{path}[{i}]")))
			.collect(),
		Some(other) => Err(UnmarshalError {
			path: path.to_string(),
			from_kind: other.kind().to_string(),
			to_type: std::any::type_name::<Vec<T>>(),
			cause: Some("expected a list".to_string()),
		}),
	}
}

/// Recurses into a nested `Input` struct. `None` (field absent from the map)
/// recurses with an empty map so nested structs made entirely of optional/
/// defaulted fields still construct successfully.
pub fn convert_nested<T: Input>(
	value: Option<Value>,
	registry: &ConverterRegistry,
	path: &str,
) -> Result<T, UnmarshalError> {
	match value {
		Some(Value::Map(m)) => T::from_map(m, registry).map_err(|e| e.nest(path)),
		None => T::from_map(HashMap::new(), registry).map_err(|e| e.nest(path)),
		Some(other) => Err(UnmarshalError {
			path: path.to_string(),
			from_kind: other.kind().to_string(),
			to_type: T::metadata().name,
			cause: Some("expected a map".to_string()),
		}),
	}
}

pub fn convert_nested_option<T: Input>(
	value: Option<Value>,
	registry: &ConverterRegistry,
	path: &str,
) -> Result<Option<T>, UnmarshalError> {
	match value {
		None | Some(Value::Null) => Ok(None),
		Some(v) => convert_nested::<T>(Some(v), registry, path).map(Some),
	}
}

/// A list of nested `Input` structs, e.g. `Vec<LineItem>` in a JSON body or a
/// `deepObject`-style repeated query object.
pub fn convert_nested_vec<T: Input>(
	value: Option<Value>,
	registry: &ConverterRegistry,
	path: &str,
) -> Result<Vec<T>, UnmarshalError> {
	match value {
		None | Some(Value::Null) => Ok(Vec::new()),
		Some(Value::List(items)) => items
			.into_iter()
			.enumerate()
			.map(|(i, item)| convert_nested::<T>(Some(item), registry, &format!("{path}[{i}]")))
			.collect(),
		Some(other) => Err(UnmarshalError {
			path: path.to_string(),
			from_kind: other.kind().to_string(),
			to_type: std::any::type_name::<Vec<T>>(),
			cause: Some("expected a list".to_string()),
		}),
	}
}

/// Takes ownership of a body/multipart-file field, wrapping bytes/text in an
/// in-memory reader per SPEC_FULL.md §4.2 so `body:"file"` fields are uniform
/// regardless of whether the server buffered or streamed the upload.
pub fn take_reader(value: Option<Value>, path: &str) -> Result<BodyReader, UnmarshalError> {
	match value {
		Some(Value::Reader(r)) => Ok(r),
		Some(Value::Bytes(b)) => Ok(Box::new(BytesReader::new(b))),
		Some(Value::Text(s)) => Ok(Box::new(BytesReader::new(s.into_bytes()))),
		other => Err(UnmarshalError {
			path: path.to_string(),
			from_kind: other.as_ref().map(|v| v.kind().to_string()).unwrap_or_else(|| "null".to_string()),
			to_type: "BodyReader",
			cause: Some("expected a file body".to_string()),
		}),
	}
}

/// Entry point mirroring the distilled spec's `Unmarshal(data, *T)`.
pub fn unmarshal<T: Input>(data: HashMap<String, Value>, registry: &ConverterRegistry) -> Result<T, UnmarshalError> {
	T::from_map(data, registry)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[derive(Debug, PartialEq)]
	struct Leaf {
		name: String,
	}

	impl Input for Leaf {
		fn metadata() -> &'static StructMetadata {
			use std::sync::OnceLock;
			static META: OnceLock<StructMetadata> = OnceLock::new();
			META.get_or_init(|| StructMetadata::new("Leaf", vec![]))
		}

		fn from_map(mut map: HashMap<String, Value>, registry: &ConverterRegistry) -> Result<Self, UnmarshalError> {
			let name = convert_scalar::<String>(
				map.remove("name").unwrap_or(Value::Text(String::new())),
				registry,
				"name",
			)?;
			Ok(Leaf { name })
		}
	}

	#[test]
	fn nested_absent_field_uses_empty_map() {
		let r = ConverterRegistry::with_builtins();
		let leaf: Leaf = convert_nested(None, &r, "leaf").unwrap();
		assert_eq!(leaf.name, "");
	}

	#[test]
	fn nested_vec_converts_each_element() {
		let r = ConverterRegistry::with_builtins();
		let items = Value::List(vec![
			Value::Map(HashMap::from([("name".to_string(), Value::Text("a".into()))])),
			Value::Map(HashMap::from([("name".to_string(), Value::Text("b".into()))])),
		]);
		let leaves: Vec<Leaf> = convert_nested_vec(Some(items), &r, "leaves").unwrap();
		assert_eq!(leaves, vec![Leaf { name: "a".into() }, Leaf { name: "b".into() }]);
	}

	#[test]
	fn reader_from_bytes_is_readable() {
		use tokio::io::AsyncReadExt;
		let reader = take_reader(Some(Value::Bytes(b"hi".to_vec())), "file").unwrap();
		let mut r = reader;
		let mut buf = Vec::new();
		let fut = r.read_to_end(&mut buf);
		futures::executor::block_on(fut).unwrap();
		assert_eq!(buf, b"hi");
	}

	#[test]
	fn reader_missing_is_an_error() {
		let err = take_reader(None, "file").unwrap_err();
		assert_eq!(err.to_type, "BodyReader");
	}
}
