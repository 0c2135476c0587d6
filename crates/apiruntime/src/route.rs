//! The immutable route descriptor (SPEC_FULL.md §4.5 "Registration").
//!
//! Built once, at `Api::register` time, and never mutated afterward — it's
//! handed around the request-handling path as `Arc<Route>` alongside the
//! rest of the shared, read-only `AppState` (SPEC_FULL.md §5 "Shared
//! state").
use std::time::Duration;

use axum::http::Method;

use crate::metadata::{Location, StructMetadata, Style};
use crate::problem::ErrorKind;
use crate::security::SecurityRequirements;

pub const DEFAULT_MAX_BODY_BYTES: i64 = 1024 * 1024;
pub const DEFAULT_BODY_READ_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum RouteError {
	#[error("field {field} at {location:?} declares style {style:?}, which the OpenAPI compatibility table does not allow for that location")]
	IncompatibleStyle { field: &'static str, location: Location, style: Style },
}

/// One registered endpoint. `errors` is the declared error set surfaced in
/// generated OpenAPI response schemas (SPEC_FULL.md §4.5 step 4);
/// `response_offerings` is the content-negotiation candidate list, parsed
/// once here rather than per request (§4.4 step 1).
#[derive(Debug, Clone)]
pub struct Route {
	pub method: Method,
	pub path: String,
	pub default_status: Option<u16>,
	pub max_body_bytes: i64,
	pub body_read_timeout: Duration,
	pub errors: Vec<ErrorKind>,
	pub operation_id: Option<String>,
	pub summary: Option<String>,
	pub security: SecurityRequirements,
	pub response_offerings: Vec<String>,
}

impl Route {
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		Self {
			method,
			path: path.into(),
			default_status: None,
			max_body_bytes: DEFAULT_MAX_BODY_BYTES,
			body_read_timeout: DEFAULT_BODY_READ_TIMEOUT,
			errors: Vec::new(),
			operation_id: None,
			summary: None,
			security: SecurityRequirements::none(),
			response_offerings: vec!["application/json".to_string()],
		}
	}

	pub fn with_default_status(mut self, status: u16) -> Self {
		self.default_status = Some(status);
		self
	}

	/// `max_body_bytes < 0` disables the limit; `body_read_timeout ==
	/// Duration::ZERO` falls back to the default (SPEC_FULL.md §4.3
	/// "Limits").
	pub fn with_body_limits(mut self, max_body_bytes: i64, body_read_timeout: Duration) -> Self {
		self.max_body_bytes = max_body_bytes;
		self.body_read_timeout = if body_read_timeout.is_zero() { DEFAULT_BODY_READ_TIMEOUT } else { body_read_timeout };
		self
	}

	pub fn with_security(mut self, security: SecurityRequirements) -> Self {
		self.security = security;
		self
	}

	pub fn with_errors(mut self, errors: Vec<ErrorKind>) -> Self {
		self.errors = errors;
		self
	}

	pub fn with_offerings(mut self, offerings: Vec<String>) -> Self {
		self.response_offerings = offerings;
		self
	}

	pub fn with_operation_id(mut self, operation_id: impl Into<String>) -> Self {
		self.operation_id = Some(operation_id.into());
		self
	}

	/// Checked once, at registration, per SPEC_FULL.md §4.3: "Style+location
	/// pairs outside the OpenAPI compatibility table are a startup error".
	pub fn validate_input_metadata(meta: &StructMetadata) -> Result<(), RouteError> {
		for field in &meta.fields {
			let Some(location) = field.location else { continue };
			let style = field.style.unwrap_or_else(|| Style::default_for(location));
			if !Style::compatible(location, style) {
				return Err(RouteError::IncompatibleStyle { field: field.struct_field_name, location, style });
			}
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::metadata::FieldMetadata;

	fn meta_with(location: Location, style: Style) -> StructMetadata {
		StructMetadata::new("T", vec![FieldMetadata {
			struct_field_name: "f",
			map_key: "f",
			index: 0,
			type_name: "String",
			embedded: false,
			default: None,
			location: Some(location),
			style: Some(style),
			explode: true,
			required: false,
			body_kind: None,
			header_name: None,
			validate: None,
			object_shaped: false,
		}])
	}

	#[test]
	fn matrix_on_query_is_rejected() {
		let meta = meta_with(Location::Query, Style::Matrix);
		assert!(Route::validate_input_metadata(&meta).is_err());
	}

	#[test]
	fn cookie_with_non_form_style_is_rejected() {
		let meta = meta_with(Location::Cookie, Style::Simple);
		assert!(Route::validate_input_metadata(&meta).is_err());
	}

	#[test]
	fn simple_on_path_is_accepted() {
		let meta = meta_with(Location::Path, Style::Simple);
		assert!(Route::validate_input_metadata(&meta).is_ok());
	}

	#[test]
	fn zero_body_read_timeout_falls_back_to_default() {
		let route = Route::new(Method::GET, "/x").with_body_limits(-1, Duration::ZERO);
		assert_eq!(route.body_read_timeout, DEFAULT_BODY_READ_TIMEOUT);
		assert_eq!(route.max_body_bytes, -1);
	}
}
