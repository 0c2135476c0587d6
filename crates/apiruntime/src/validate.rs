//! The validator adapter (SPEC_FULL.md §4.9).
//!
//! Validation runs *after* `unmarshal`, bridging each field's `#[validate(...)]`
//! attribute string to a small built-in rule engine. `location` is derived by
//! a structural walk over the field's own `FieldMetadata::location_prefix()`
//! (e.g. `body.email`, `query.ids[0]`) rather than string-matching a
//! namespace, resolving the open question in SPEC_FULL.md §9 in favor of the
//! structural approach.
//!
//! Built on `tag.rs`'s grammar directly: a `validate` attribute is itself a
//! tag string (`"required,email"`, `"min=3,max=50"`), parsed the same way as
//! `#[schema(...)]`.
use crate::problem::ErrorDetail;
use crate::tag;

/// What a field's runtime value looks like to the validator, independent of
/// its concrete Rust type. Implemented for every scalar/`Option` shape the
/// unmarshaler can produce; the derive macro calls `validate_field` only for
/// fields carrying a `#[validate(...)]` attribute, so unsupported shapes
/// (nested structs, readers) simply never appear here.
pub enum Target<'a> {
	Missing,
	Text(&'a str),
	Number(f64),
	Bool(bool),
}

pub trait ToTarget {
	fn to_target(&self) -> Target<'_>;
}

macro_rules! impl_to_target_numeric {
	($($t:ty),*) => {
		$(impl ToTarget for $t {
			fn to_target(&self) -> Target<'_> {
				Target::Number(*self as f64)
			}
		})*
	};
}
impl_to_target_numeric!(i8, i16, i32, i64, u8, u16, u32, u64, f32, f64);

impl ToTarget for String {
	fn to_target(&self) -> Target<'_> {
		Target::Text(self.as_str())
	}
}

impl ToTarget for bool {
	fn to_target(&self) -> Target<'_> {
		Target::Bool(*self)
	}
}

impl<T: ToTarget> ToTarget for Option<T> {
	fn to_target(&self) -> Target<'_> {
		match self {
			Some(v) => v.to_target(),
			None => Target::Missing,
		}
	}
}

impl<T: ToTarget> ToTarget for Vec<T> {
	fn to_target(&self) -> Target<'_> {
		if self.is_empty() { Target::Missing } else { Target::Number(self.len() as f64) }
	}
}

fn is_valid_email(s: &str) -> bool {
	let Some((local, domain)) = s.split_once('@') else { return false };
	!local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}

/// Runs every rule named in `rule_tag` (a `validate`-grammar string) against
/// `value`, collecting one `ErrorDetail` per failing rule rather than
/// stopping at the first (SPEC_FULL.md §7 "Propagation": decoder and
/// validator errors are collected together).
pub fn validate_field<T: ToTarget>(value: &T, rule_tag: &str, location: &str) -> Vec<ErrorDetail> {
	let parsed = tag::parse(rule_tag);
	let target = value.to_target();
	let mut out = Vec::new();

	let required = parsed.has("required") || parsed.name.as_deref() == Some("required");
	if required && matches!(target, Target::Missing) {
		out.push(ErrorDetail { code: "required".to_string(), message: format!("{location} is required"), location: location.to_string() });
		return out;
	}
	if matches!(target, Target::Missing) {
		return out;
	}

	let wants_email = parsed.has("email") || parsed.name.as_deref() == Some("email");
	if wants_email {
		if let Target::Text(s) = target {
			if !is_valid_email(s) {
				out.push(ErrorDetail { code: "email".to_string(), message: format!("{location} must be a valid email"), location: location.to_string() });
			}
		}
	}

	if let Some(min) = parsed.get("min").and_then(|v| v.parse::<f64>().ok()) {
		let actual = match target {
			Target::Text(s) => Some(s.chars().count() as f64),
			Target::Number(n) => Some(n),
			_ => None,
		};
		if let Some(actual) = actual {
			if actual < min {
				out.push(ErrorDetail { code: "min".to_string(), message: format!("{location} must be at least {min}"), location: location.to_string() });
			}
		}
	}

	if let Some(max) = parsed.get("max").and_then(|v| v.parse::<f64>().ok()) {
		let actual = match target {
			Target::Text(s) => Some(s.chars().count() as f64),
			Target::Number(n) => Some(n),
			_ => None,
		};
		if let Some(actual) = actual {
			if actual > max {
				out.push(ErrorDetail { code: "max".to_string(), message: format!("{location} must be at most {max}"), location: location.to_string() });
			}
		}
	}

	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn required_missing_field_fails() {
		let v: Option<String> = None;
		let errs = validate_field(&v, "required", "body.email");
		assert_eq!(errs.len(), 1);
		assert_eq!(errs[0].code, "required");
	}

	#[test]
	fn email_rule_rejects_malformed_address() {
		// S5 in SPEC_FULL.md §8.
		let v = "not-an-email".to_string();
		let errs = validate_field(&v, "required,email", "body.email");
		assert_eq!(errs.len(), 1);
		assert_eq!(errs[0].code, "email");
	}

	#[test]
	fn valid_email_passes() {
		let v = "ada@example.com".to_string();
		assert!(validate_field(&v, "required,email", "body.email").is_empty());
	}

	#[test]
	fn min_max_bounds() {
		let v = 3i32;
		assert!(!validate_field(&v, "min=5", "query.count").is_empty());
		assert!(validate_field(&v, "min=1,max=10", "query.count").is_empty());
	}

	#[test]
	fn optional_absent_and_not_required_is_fine() {
		let v: Option<String> = None;
		assert!(validate_field(&v, "email", "body.nickname").is_empty());
	}
}
