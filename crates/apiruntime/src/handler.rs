//! Registration and the compiled per-request dispatch path (SPEC_FULL.md
//! §4.5). `Api::register` is the one place a route's `Input`/`Output` types,
//! its `Route` descriptor, and its handler closure come together; everything
//! after that runs through the single generic `dispatch` function so every
//! endpoint gets the same decode → validate → enforce → call → negotiate →
//! marshal pipeline, the way `middleware.rs`'s doc comment describes the
//! scheduler's own "one code path" design.
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use axum::Router;
use axum::extract::{FromRequest, FromRequestParts, Multipart, Path, Request, State};
use axum::http::header::{ACCEPT, CONTENT_LENGTH, CONTENT_TYPE, COOKIE};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodFilter, MethodRouter, on};
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use crate::body;
use crate::config::{ApiConfig, OpenApiConfig};
use crate::context::Context;
use crate::convert::ConverterRegistry;
use crate::decode::RawRequest;
use crate::metadata::BodyKind;
use crate::negotiate;
use crate::openapi::{OpenApiBuilder, OpenApiDocument};
use crate::problem::{ErrorDetail, ErrorKind, ProblemDocument, StatusError};
use crate::response::{BodyPayload, ResponseWriter};
use crate::route::{Route, RouteError};
use crate::schema::{Input, Output};
use crate::security::{self, AuthUser, SecurityEnforcer};
use crate::value::Value;
use apicore::request_log::RequestLog;

/// Shared, read-only per-process state (SPEC_FULL.md §5 "Shared state").
/// Cloned once per request by axum's `State` extractor — every field is
/// either an `Arc` or otherwise cheap to clone, never a per-request mutable
/// resource.
#[derive(Clone)]
pub struct AppState {
	pub registry: Arc<ConverterRegistry>,
	pub enforcer: Arc<dyn SecurityEnforcer>,
	pub cancellation: CancellationToken,
	pub default_format: String,
	pub no_format_fallback: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum RegisterError {
	#[error(transparent)]
	Route(#[from] RouteError),
}

/// Accumulates routes and their OpenAPI operations side by side, so
/// registration order is also documentation order. Finalized once, by
/// `into_router`, after every endpoint has registered.
pub struct Api {
	router: Router<AppState>,
	openapi: OpenApiBuilder,
	api_config: ApiConfig,
}

impl Api {
	pub fn new(openapi_config: OpenApiConfig, api_config: ApiConfig) -> Self {
		Self { router: Router::new(), openapi: OpenApiBuilder::new(openapi_config), api_config }
	}

	/// Registers one endpoint (SPEC_FULL.md §4.5 "Registration"):
	/// 1. validates the `Input`'s parameter metadata against the style/
	///    location compatibility table (a startup-time error, not a
	///    per-request one);
	/// 2. records an OpenAPI `Operation` for it;
	/// 3. wires the compiled `dispatch` function into the router at the
	///    route's method and path.
	pub fn register<I, O, E, F, Fut>(mut self, route: Route, handler: F) -> Result<Self, RegisterError>
	where
		I: Input,
		O: Output,
		E: StatusError,
		F: Fn(Context, I) -> Fut + Clone + Send + Sync + 'static,
		Fut: Future<Output = Result<O, E>> + Send + 'static,
	{
		Route::validate_input_metadata(I::metadata())?;
		self.openapi.add_operation(&route, I::metadata(), O::metadata());

		let route = Arc::new(route);
		let method = route.method.clone();
		let path = route.path.clone();

		let endpoint = move |state: State<AppState>, req: Request| {
			let handler = handler.clone();
			let route = route.clone();
			async move { dispatch(state.0, route, req, handler).await }
		};

		self.router = self.router.route(&path, method_router(method, endpoint));
		Ok(self)
	}

	/// Finalizes registration: builds the OpenAPI document and mounts it
	/// (plus a minimal docs page and per-schema lookup) at the configured
	/// paths (SPEC_FULL.md §6 "auto-exposed routes").
	pub fn into_router(self) -> Router<AppState> {
		let doc = self.openapi.build();
		mount_openapi_routes(self.router, &self.api_config, doc)
	}
}

fn method_router<Fut>(method: Method, endpoint: impl Clone + Send + Sync + 'static + Fn(State<AppState>, Request) -> Fut) -> MethodRouter<AppState>
where
	Fut: Future<Output = Response> + Send + 'static,
{
	let filter = MethodFilter::try_from(method).unwrap_or(MethodFilter::GET);
	on(filter, endpoint)
}

fn mount_openapi_routes(router: Router<AppState>, config: &ApiConfig, doc: OpenApiDocument) -> Router<AppState> {
	let json_body = doc.to_json();
	let yaml_body = doc.to_yaml();
	let schemas = doc.components.schemas.clone();
	let docs_html = render_docs_html(config);

	let json_path = format!("{}.json", config.spec_path);
	let yaml_path = format!("{}.yaml", config.spec_path);
	let schemas_path = format!("{}/:name", config.schemas_path);

	router
		.route(&json_path, axum::routing::get(move || {
			let body = json_body.clone();
			async move { axum::Json(body) }
		}))
		.route(&yaml_path, axum::routing::get(move || {
			let body = yaml_body.clone();
			async move { ([(CONTENT_TYPE, "application/yaml")], body) }
		}))
		.route(&config.docs_path, axum::routing::get(move || {
			let html = docs_html.clone();
			async move { axum::response::Html(html) }
		}))
		.route(&schemas_path, axum::routing::get(move |Path(name): Path<String>| {
			let schemas = schemas.clone();
			async move {
				match schemas.get(&name) {
					Some(schema) => axum::Json(schema.clone()).into_response(),
					None => (StatusCode::NOT_FOUND, "schema not found").into_response(),
				}
			}
		}))
}

fn render_docs_html(config: &ApiConfig) -> String {
	format!(
		"<!doctype html><html><head><title>API docs</title></head><body><div id=\"api-docs\" data-spec=\"{}.json\"></div></body></html>",
		config.spec_path
	)
}

/// The compiled, per-request pipeline every registered endpoint shares
/// (SPEC_FULL.md §4.5 steps 1-7).
async fn dispatch<I, O, E, F, Fut>(state: AppState, route: Arc<Route>, req: Request, handler: F) -> Response
where
	I: Input,
	O: Output,
	E: StatusError,
	F: Fn(Context, I) -> Fut,
	Fut: Future<Output = Result<O, E>>,
{
	let (mut parts, body) = req.into_parts();

	let log = parts.extensions.remove::<RequestLog>().unwrap_or_else(|| RequestLog::new("-"));
	let auth_user = parts.extensions.remove::<AuthUser>();

	let headers = parts.headers.clone();
	let method = parts.method.clone();
	let uri_path = parts.uri.path().to_string();
	let query = parts.uri.query().map(str::to_string);

	let path_params: HashMap<String, String> = Path::<HashMap<String, String>>::from_request_parts(&mut parts, &state)
		.await
		.map(|Path(p)| p)
		.unwrap_or_default();

	// Step: security enforcement (SPEC_FULL.md §4.7). Runs before the body
	// is read so an unauthorized caller never pays for a large upload.
	match security::check(state.enforcer.as_ref(), auth_user.as_ref(), &route.security).await {
		Ok(true) => {},
		Ok(false) => return problem_response(ErrorKind::Forbidden, "the authenticated user does not satisfy this route's security requirements", &log),
		Err(security::EnforceError::MissingAuthUser) => {
			return problem_response(ErrorKind::Unauthorized, "this route requires an authenticated user", &log);
		},
		Err(e) => return problem_response(ErrorKind::Forbidden, e.to_string(), &log),
	}

	if let Some(len) = headers.get(CONTENT_LENGTH).and_then(|v| v.to_str().ok()).and_then(|s| s.parse::<i64>().ok()) {
		if route.max_body_bytes >= 0 && len > route.max_body_bytes {
			return problem_response(ErrorKind::PayloadTooLarge, "request body exceeds this route's configured limit", &log);
		}
	}

	let body_field = I::metadata().fields.iter().find(|f| f.body_kind.is_some()).cloned();
	let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()).map(str::to_string);

	let decoded_body: Option<Value> = match body_field.as_ref().and_then(|f| f.body_kind.clone()) {
		None => None,
		Some(BodyKind::Multipart) => {
			let request = Request::from_parts(parts, body);
			match Multipart::from_request(request, &state).await {
				Ok(multipart) => match tokio::time::timeout(route.body_read_timeout, body::decode_multipart(multipart)).await {
					Ok(Ok(value)) => Some(value),
					Ok(Err(e)) => return problem_response(ErrorKind::BadRequest, e.to_string(), &log),
					Err(_) => return problem_response(ErrorKind::RequestTimeout, "timed out reading the request body", &log),
				},
				Err(e) => return problem_response(ErrorKind::BadRequest, e.to_string(), &log),
			}
		},
		Some(kind @ (BodyKind::Structured | BodyKind::File)) => {
			let limit = if route.max_body_bytes < 0 { usize::MAX } else { route.max_body_bytes as usize };
			match tokio::time::timeout(route.body_read_timeout, axum::body::to_bytes(body, limit)).await {
				Ok(Ok(bytes)) => Some(match kind {
					BodyKind::File => body::decode_file(bytes),
					_ => match body::decode_structured(&bytes, content_type.as_deref()) {
						Ok(value) => value,
						Err(e) => return problem_response(ErrorKind::BadRequest, e.to_string(), &log),
					},
				}),
				Ok(Err(_)) => return problem_response(ErrorKind::PayloadTooLarge, "request body exceeds this route's configured limit", &log),
				Err(_) => return problem_response(ErrorKind::RequestTimeout, "timed out reading the request body", &log),
			}
		},
	};

	let cookie_header = headers.get(COOKIE).and_then(|v| v.to_str().ok()).map(str::to_string);
	let mut raw_request = RawRequest::new(&headers, query.as_deref(), &path_params, cookie_header.as_deref(), decoded_body);
	let (values, decode_errors) = crate::decode::decode_fields(I::metadata(), &mut raw_request);
	if !decode_errors.is_empty() {
		return problem_response_with_errors(ErrorKind::BadRequest, "request parameters failed to decode", decode_errors, &log);
	}

	let input = match I::from_map(values, &state.registry) {
		Ok(input) => input,
		Err(e) => return problem_response(ErrorKind::BadRequest, e.to_string(), &log),
	};

	let validation_errors = input.validate();
	if !validation_errors.is_empty() {
		return problem_response_with_errors(ErrorKind::BadRequest, "request validation failed", validation_errors, &log);
	}

	let accept_header = headers.get(ACCEPT).and_then(|v| v.to_str().ok()).map(str::to_string);
	let ctx = Context::new(method, uri_path, headers, auth_user, route.clone(), log.clone(), state.cancellation.clone());

	match handler(ctx, input).await {
		Ok(output) => marshal_success(&route, output, accept_header.as_deref(), &state.default_format, state.no_format_fallback),
		Err(e) => {
			let mut doc = ProblemDocument::new(e.kind(), e.to_string());
			doc.code = e.code();
			problem_document_response(doc)
		},
	}
}

/// Success-path marshaling (SPEC_FULL.md §4.5 step 7, §4.8): status/headers
/// flushed through a `ResponseWriter`, `Raw` bodies bypassing negotiation
/// entirely, `Json` bodies negotiated against the route's declared
/// offerings and able to downgrade the whole response to `406` before
/// anything is written (the writer-buffers-until-commit contract
/// `response.rs` documents).
fn marshal_success<O: Output>(route: &Route, output: O, accept_header: Option<&str>, default_format: &str, no_format_fallback: bool) -> Response {
	let headers = output.headers();
	let status_override = output.status();
	let body_payload = output.body();

	let mut writer = ResponseWriter::new();
	for (name, values) in headers {
		for value in values {
			writer.append_header(name.clone(), value);
		}
	}

	let default_status = route.default_status.unwrap_or(if matches!(&body_payload, BodyPayload::None) { 204 } else { 200 });
	if let Some(status) = status_override {
		writer.set_status(StatusCode::from_u16(status).unwrap_or(StatusCode::OK));
	}
	let default_status = StatusCode::from_u16(default_status).unwrap_or(StatusCode::OK);

	match body_payload {
		BodyPayload::None => writer.commit(default_status, Bytes::new(), None),
		BodyPayload::Raw(bytes) => writer.commit(default_status, Bytes::from(bytes), None),
		BodyPayload::Json(value) => {
			// Negotiation happens here, never before: a handler that never
			// runs (security/validation failures) shouldn't pay for it, and
			// a `406` is only meaningful once there's a body to represent.
			let offerings: Vec<&str> = route.response_offerings.iter().map(String::as_str).collect();
			let negotiated = match accept_header {
				Some(raw) => negotiate::negotiate_media_type(raw, &offerings),
				None => offerings.first().copied().ok_or_else(|| negotiate::NoAcceptableMatch { offerings: Vec::new() }),
			};
			// A failed negotiation either falls back to the globally
			// configured default representation or becomes a `406`,
			// depending on `httpserver.api.noFormatFallback`.
			let negotiated = negotiated.or_else(|e| if no_format_fallback { Err(e) } else { Ok(default_format) });
			match negotiated {
				Ok(content_type) => match serde_json::to_vec(&value) {
					Ok(bytes) => writer.commit(default_status, Bytes::from(bytes), Some(content_type)),
					Err(_) => problem_document_response(ProblemDocument::new(ErrorKind::InternalServerError, "failed to encode response body")),
				},
				Err(_) => problem_document_response(ProblemDocument::new(ErrorKind::NotAcceptable, "no acceptable representation for this route's offerings")),
			}
		},
	}
}

fn problem_response(kind: ErrorKind, detail: impl Into<String>, log: &RequestLog) -> Response {
	problem_document_response(ProblemDocument::new(kind, detail).with_instance(format!("urn:request:{}", log.request_id)))
}

fn problem_response_with_errors(kind: ErrorKind, detail: impl Into<String>, errors: Vec<ErrorDetail>, log: &RequestLog) -> Response {
	problem_document_response(ProblemDocument::new(kind, detail).with_errors(errors).with_instance(format!("urn:request:{}", log.request_id)))
}

fn problem_document_response(doc: ProblemDocument) -> Response {
	let status = StatusCode::from_u16(doc.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
	let body = serde_json::to_vec(&doc).unwrap_or_default();
	let mut headers = HeaderMap::new();
	headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/problem+json"));
	(status, headers, Bytes::from(body)).into_response()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::metadata::{FieldMetadata, StructMetadata};

	#[test]
	fn problem_response_carries_the_right_status_and_content_type() {
		let log = RequestLog::new("req-1");
		let resp = problem_response(ErrorKind::NotFound, "no such widget", &log);
		assert_eq!(resp.status(), StatusCode::NOT_FOUND);
		assert_eq!(resp.headers().get(CONTENT_TYPE).unwrap(), "application/problem+json");
	}

	struct NoBodyOutput;
	impl Output for NoBodyOutput {
		fn metadata() -> &'static StructMetadata {
			use std::sync::OnceLock;
			static META: OnceLock<StructMetadata> = OnceLock::new();
			META.get_or_init(|| StructMetadata::new("NoBodyOutput", Vec::<FieldMetadata>::new()))
		}
		fn status(&self) -> Option<u16> {
			None
		}
		fn headers(&self) -> Vec<(String, Vec<String>)> {
			Vec::new()
		}
		fn body(&self) -> BodyPayload {
			BodyPayload::None
		}
	}

	#[test]
	fn no_body_output_defaults_to_204() {
		let route = Route::new(Method::GET, "/ping");
		let resp = marshal_success(&route, NoBodyOutput, None, "application/json", false);
		assert_eq!(resp.status(), StatusCode::NO_CONTENT);
	}

	struct JsonOutput;
	impl Output for JsonOutput {
		fn metadata() -> &'static StructMetadata {
			use std::sync::OnceLock;
			static META: OnceLock<StructMetadata> = OnceLock::new();
			META.get_or_init(|| StructMetadata::new("JsonOutput", Vec::<FieldMetadata>::new()))
		}
		fn status(&self) -> Option<u16> {
			None
		}
		fn headers(&self) -> Vec<(String, Vec<String>)> {
			Vec::new()
		}
		fn body(&self) -> BodyPayload {
			BodyPayload::Json(serde_json::json!({"ok": true}))
		}
	}

	#[test]
	fn json_output_defaults_to_200() {
		let route = Route::new(Method::GET, "/widgets");
		let resp = marshal_success(&route, JsonOutput, Some("application/json"), "application/json", false);
		assert_eq!(resp.status(), StatusCode::OK);
	}
}
