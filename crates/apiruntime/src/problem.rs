//! RFC 9457 problem documents and the error taxonomy that produces them
//! (SPEC_FULL.md §7).
//!
//! Grounded on the stable-taxonomy-to-status-mapping shape of `masterror`'s
//! `AppErrorKind`/`ProblemJson` (`other_examples/59b726a7_...masterror.rs`):
//! a closed `ErrorKind` enum owns the HTTP status mapping in one place, and a
//! single `IntoResponse` impl (in `response.rs`) is the only place that walks
//! `ErrorKind -> StatusCode`.
use axum::http::StatusCode;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
	BadRequest,
	Unauthorized,
	Forbidden,
	NotFound,
	MethodNotAllowed,
	NotAcceptable,
	Conflict,
	UnprocessableEntity,
	PayloadTooLarge,
	UnsupportedMediaType,
	RequestTimeout,
	ClientClosedRequest,
	InternalServerError,
}

impl ErrorKind {
	pub fn status(self) -> StatusCode {
		match self {
			ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
			ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
			ErrorKind::Forbidden => StatusCode::FORBIDDEN,
			ErrorKind::NotFound => StatusCode::NOT_FOUND,
			ErrorKind::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
			ErrorKind::NotAcceptable => StatusCode::NOT_ACCEPTABLE,
			ErrorKind::Conflict => StatusCode::CONFLICT,
			ErrorKind::UnprocessableEntity => StatusCode::UNPROCESSABLE_ENTITY,
			ErrorKind::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
			ErrorKind::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
			ErrorKind::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
			// 499 has no `http` crate constant (it's nginx-originated, not in
			// the IANA registry); built from its raw code.
			ErrorKind::ClientClosedRequest => StatusCode::from_u16(499).unwrap(),
			ErrorKind::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	pub fn title(self) -> &'static str {
		match self {
			ErrorKind::BadRequest => "Bad Request",
			ErrorKind::Unauthorized => "Unauthorized",
			ErrorKind::Forbidden => "Forbidden",
			ErrorKind::NotFound => "Not Found",
			ErrorKind::MethodNotAllowed => "Method Not Allowed",
			ErrorKind::NotAcceptable => "Not Acceptable",
			ErrorKind::Conflict => "Conflict",
			ErrorKind::UnprocessableEntity => "Unprocessable Entity",
			ErrorKind::PayloadTooLarge => "Payload Too Large",
			ErrorKind::UnsupportedMediaType => "Unsupported Media Type",
			ErrorKind::RequestTimeout => "Request Timeout",
			ErrorKind::ClientClosedRequest => "Client Closed Request",
			ErrorKind::InternalServerError => "Internal Server Error",
		}
	}
}

/// One entry in `errors[]`: a single decoder/validator/domain failure.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorDetail {
	pub code: String,
	pub message: String,
	pub location: String,
}

/// The RFC 9457 response body. `type`/`instance`/`errors` are optional per
/// the spec; `status`/`title`/`detail` are always present (SPEC_FULL.md §7
/// "Client visibility").
#[derive(Debug, Clone, Serialize)]
pub struct ProblemDocument {
	#[serde(rename = "type", skip_serializing_if = "Option::is_none")]
	pub type_: Option<String>,
	pub title: String,
	pub status: u16,
	pub detail: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub instance: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub code: Option<String>,
	#[serde(skip_serializing_if = "Vec::is_empty", default)]
	pub errors: Vec<ErrorDetail>,
}

impl ProblemDocument {
	pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
		Self {
			type_: Some("about:blank".to_string()),
			title: kind.title().to_string(),
			status: kind.status().as_u16(),
			detail: detail.into(),
			instance: None,
			code: None,
			errors: Vec::new(),
		}
	}

	pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
		self.instance = Some(instance.into());
		self
	}

	pub fn with_errors(mut self, errors: Vec<ErrorDetail>) -> Self {
		self.errors = errors;
		self
	}
}

/// A handler-returned error that wants to pick its own HTTP status (§4.5
/// step 6: "If it implements `StatusError`, use its status; otherwise
/// `500`.").
pub trait StatusError: std::error::Error + Send + Sync + 'static {
	fn kind(&self) -> ErrorKind;
	fn code(&self) -> Option<String> {
		None
	}
}

#[derive(Debug, thiserror::Error)]
#[error("{detail}")]
pub struct HandlerError {
	pub kind: ErrorKind,
	pub detail: String,
	pub code: Option<String>,
}

impl HandlerError {
	pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
		Self { kind, detail: detail.into(), code: None }
	}
}

impl StatusError for HandlerError {
	fn kind(&self) -> ErrorKind {
		self.kind
	}
	fn code(&self) -> Option<String> {
		self.code.clone()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn taxonomy_maps_to_expected_status_codes() {
		assert_eq!(ErrorKind::BadRequest.status(), StatusCode::BAD_REQUEST);
		assert_eq!(ErrorKind::ClientClosedRequest.status().as_u16(), 499);
		assert_eq!(ErrorKind::UnprocessableEntity.status(), StatusCode::UNPROCESSABLE_ENTITY);
	}

	#[test]
	fn problem_document_serializes_shape_from_s5() {
		let doc = ProblemDocument::new(ErrorKind::BadRequest, "validation failed").with_errors(vec![ErrorDetail {
			code: "required".to_string(),
			message: "email is required".to_string(),
			location: "body.email".to_string(),
		}]);
		let json = serde_json::to_value(&doc).unwrap();
		assert_eq!(json["status"], 400);
		assert_eq!(json["errors"][0]["location"], "body.email");
	}
}
