//! The converter registry (SPEC_FULL.md §4.2).
//!
//! Built once at startup (`ConverterRegistry::with_builtins()`, optionally
//! extended with user converters, then frozen into an `Arc`), read without
//! any lock thereafter. `#[derive(Input)]`-generated code calls
//! `registry.convert::<FieldType>(&value)` for every field whose type isn't
//! directly assignable from the decoded `Value`.
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use crate::value::Value;

#[derive(Debug, Clone, thiserror::Error)]
#[error("cannot convert {from} to {to}{}", cause.as_ref().map(|c| format!(": {c}")).unwrap_or_default())]
pub struct ConvertError {
	pub from: String,
	pub to: &'static str,
	pub cause: Option<String>,
}

impl ConvertError {
	pub fn new(from: &Value, to: &'static str) -> Self {
		Self { from: from.kind().to_string(), to, cause: None }
	}

	pub fn with_cause(from: &Value, to: &'static str, cause: impl std::fmt::Display) -> Self {
		Self { from: from.kind().to_string(), to, cause: Some(cause.to_string()) }
	}

	pub fn no_converter(to: &'static str) -> Self {
		Self { from: "unknown".into(), to, cause: Some("no converter registered".into()) }
	}
}

type BoxedConverter = Arc<dyn Fn(&Value) -> Result<Box<dyn Any + Send + Sync>, ConvertError> + Send + Sync>;

/// Immutable, lock-free-read mapping `TypeId -> Converter`. Construction is
/// the only phase that mutates; after `Arc`-wrapping, every reader shares the
/// same `HashMap` with no further synchronization.
#[derive(Clone)]
pub struct ConverterRegistry {
	converters: HashMap<TypeId, BoxedConverter>,
}

impl std::fmt::Debug for ConverterRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ConverterRegistry").field("len", &self.converters.len()).finish()
	}
}

pub struct ConverterRegistryBuilder {
	converters: HashMap<TypeId, BoxedConverter>,
}

impl ConverterRegistryBuilder {
	pub fn register<T, F>(mut self, f: F) -> Self
	where
		T: Send + Sync + 'static,
		F: Fn(&Value) -> Result<T, ConvertError> + Send + Sync + 'static,
	{
		let boxed: BoxedConverter = Arc::new(move |v| f(v).map(|t| Box::new(t) as Box<dyn Any + Send + Sync>));
		self.converters.insert(TypeId::of::<T>(), boxed);
		self
	}

	pub fn build(self) -> ConverterRegistry {
		ConverterRegistry { converters: self.converters }
	}
}

impl ConverterRegistry {
	pub fn builder() -> ConverterRegistryBuilder {
		ConverterRegistryBuilder { converters: HashMap::new() }
	}

	/// The exhaustive built-in set described in SPEC_FULL.md §4.2.
	pub fn with_builtins() -> Self {
		let mut b = Self::builder();
		b = register_bool(b);
		b = register_string(b);
		b = register_ints(b);
		b = register_floats(b);
		b = register_bytes(b);
		b.build()
	}

	pub fn convert<T: Send + Sync + 'static>(&self, value: &Value) -> Result<T, ConvertError> {
		let type_name = std::any::type_name::<T>();
		let converter = self
			.converters
			.get(&TypeId::of::<T>())
			.ok_or_else(|| ConvertError::no_converter(leak_type_name(type_name)))?;
		let boxed = converter(value)?;
		boxed
			.downcast::<T>()
			.map(|b| *b)
			.map_err(|_| ConvertError::new(value, leak_type_name(type_name)))
	}

	pub fn has<T: 'static>(&self) -> bool {
		self.converters.contains_key(&TypeId::of::<T>())
	}
}

/// `type_name::<T>()` returns a `&'static str` already; this just documents
/// that the error type's `to: &'static str` field is always fed a genuinely
/// static string, never an ad-hoc owned one.
fn leak_type_name(name: &'static str) -> &'static str {
	name
}

fn register_bool(b: ConverterRegistryBuilder) -> ConverterRegistryBuilder {
	b.register::<bool, _>(|v| match v {
		Value::Bool(b) => Ok(*b),
		Value::Int(i) => Ok(*i != 0),
		Value::Float(f) => Ok(*f != 0.0),
		Value::Text(s) => {
			if s.is_empty() {
				return Ok(false);
			}
			match s.to_ascii_lowercase().as_str() {
				"true" | "1" | "yes" | "on" => Ok(true),
				"false" | "0" | "no" | "off" => Ok(false),
				_ => Err(ConvertError::with_cause(v, "bool", format!("cannot parse {s:?} as bool"))),
			}
		},
		_ => Err(ConvertError::new(v, "bool")),
	})
}

fn register_string(b: ConverterRegistryBuilder) -> ConverterRegistryBuilder {
	b.register::<String, _>(|v| match v {
		Value::Text(s) => Ok(s.clone()),
		Value::Bool(b) => Ok(if *b { "true".to_string() } else { "false".to_string() }),
		Value::Int(i) => Ok(i.to_string()),
		Value::Float(f) => Ok(f.to_string()),
		Value::Bytes(b) => {
			String::from_utf8(b.clone()).map_err(|e| ConvertError::with_cause(v, "String", e))
		},
		_ => Err(ConvertError::new(v, "String")),
	})
}

macro_rules! register_int {
	($b:expr, $t:ty) => {
		$b.register::<$t, _>(|v| match v {
			Value::Int(i) => <$t>::try_from(*i)
				.map_err(|e| ConvertError::with_cause(v, stringify!($t), e)),
			Value::Bool(b) => Ok(if *b { 1 } else { 0 }),
			Value::Text(s) => {
				let i: i128 = s
					.parse()
					.map_err(|e| ConvertError::with_cause(v, stringify!($t), e))?;
				<$t>::try_from(i).map_err(|e| ConvertError::with_cause(v, stringify!($t), e))
			},
			_ => Err(ConvertError::new(v, stringify!($t))),
		})
	};
}

fn register_ints(b: ConverterRegistryBuilder) -> ConverterRegistryBuilder {
	let b = register_int!(b, i8);
	let b = register_int!(b, i16);
	let b = register_int!(b, i32);
	let b = register_int!(b, i64);
	let b = register_int!(b, u8);
	let b = register_int!(b, u16);
	let b = register_int!(b, u32);
	let b = register_int!(b, u64);
	b
}

macro_rules! register_float {
	($b:expr, $t:ty) => {
		$b.register::<$t, _>(|v| match v {
			Value::Float(f) => Ok(*f as $t),
			Value::Int(i) => Ok(*i as $t),
			Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
			Value::Text(s) => s.parse::<$t>().map_err(|e| ConvertError::with_cause(v, stringify!($t), e)),
			_ => Err(ConvertError::new(v, stringify!($t))),
		})
	};
}

fn register_floats(b: ConverterRegistryBuilder) -> ConverterRegistryBuilder {
	let b = register_float!(b, f32);
	let b = register_float!(b, f64);
	b
}

fn register_bytes(b: ConverterRegistryBuilder) -> ConverterRegistryBuilder {
	b.register::<Vec<u8>, _>(|v| match v {
		Value::Bytes(b) => Ok(b.clone()),
		Value::Text(s) => Ok(s.clone().into_bytes()),
		Value::List(items) => items
			.iter()
			.map(|item| match item {
				Value::Int(i) if (0..=255).contains(i) => Ok(*i as u8),
				_ => Err(ConvertError::new(item, "u8")),
			})
			.collect(),
		_ => Err(ConvertError::new(v, "Vec<u8>")),
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn bool_from_string_empty_is_false() {
		let r = ConverterRegistry::with_builtins();
		assert_eq!(r.convert::<bool>(&Value::Text("".into())).unwrap(), false);
		assert_eq!(r.convert::<bool>(&Value::Text("true".into())).unwrap(), true);
		assert_eq!(r.convert::<bool>(&Value::Int(0)).unwrap(), false);
	}

	#[test]
	fn int_overflow_is_an_error_not_truncation() {
		let r = ConverterRegistry::with_builtins();
		assert!(r.convert::<u8>(&Value::Text("1000".into())).is_err());
		assert_eq!(r.convert::<u8>(&Value::Text("200".into())).unwrap(), 200);
	}

	#[test]
	fn unsigned_rejects_negative() {
		let r = ConverterRegistry::with_builtins();
		assert!(r.convert::<u32>(&Value::Int(-1)).is_err());
	}

	#[test]
	fn float_accepts_nan_and_inf_strings() {
		let r = ConverterRegistry::with_builtins();
		assert!(r.convert::<f64>(&Value::Text("nan".into())).unwrap().is_nan());
		assert!(r.convert::<f64>(&Value::Text("inf".into())).unwrap().is_infinite());
	}

	#[test]
	fn bytes_from_list_of_u8() {
		let r = ConverterRegistry::with_builtins();
		let v = Value::List(vec![Value::Int(104), Value::Int(105)]);
		assert_eq!(r.convert::<Vec<u8>>(&v).unwrap(), b"hi".to_vec());
	}

	#[test]
	fn string_from_bytes_rejects_invalid_utf8() {
		let r = ConverterRegistry::with_builtins();
		let v = Value::Bytes(vec![0xff, 0xfe]);
		assert!(r.convert::<String>(&v).is_err());
	}
}
