//! The middleware scheduler (SPEC_FULL.md §4.6): priority-ordered built-in
//! middlewares plus user-registered ones, composed once at startup.
//!
//! `axum`'s `Router::layer` makes the *last* layer applied the *outermost*
//! one (it sees the request first). SPEC_FULL.md wants ascending priority to
//! run first, so `MiddlewareScheduler::apply_all` sorts ascending by
//! `(priority, order)` and then applies in reverse — the lowest-priority
//! registration ends up outermost. Per-route concerns that need the matched
//! route's own data (security enforcement at priority 240, the
//! "before route handler" hook at 250) aren't reachable from a router-level
//! `Layer` at all — they're realized as the first two steps of the compiled
//! dispatch in `handler.rs` instead; this module only owns the slots that
//! genuinely run before routing decides which `Route` applies.
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::Router;
use axum::extract::Request;
use axum::http::{HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use tower_http::cors::CorsLayer;
use tracing::Instrument;

use crate::security::jwt::{self, JwtConfig, TokenSourceConfig};
use apicore::request_log::RequestLog;

pub const PRIORITY_REQUEST_ID: i32 = 100;
pub const PRIORITY_CORS: i32 = 150;
pub const PRIORITY_LOGGING: i32 = 200;
pub const PRIORITY_JWT: i32 = 230;
pub const PRIORITY_SECURITY: i32 = 240;
pub const PRIORITY_BEFORE_HANDLER: i32 = 250;

pub type LayerFn = Arc<dyn Fn(Router) -> Router + Send + Sync>;

#[derive(Clone)]
pub struct MiddlewareRegistration {
	pub name: String,
	pub priority: i32,
	order: u64,
	pub apply: LayerFn,
}

#[derive(Default)]
pub struct MiddlewareScheduler {
	registrations: Vec<MiddlewareRegistration>,
	counter: AtomicU64,
}

impl MiddlewareScheduler {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn register(&mut self, name: impl Into<String>, priority: i32, apply: LayerFn) {
		let order = self.counter.fetch_add(1, Ordering::Relaxed);
		self.registrations.push(MiddlewareRegistration { name: name.into(), priority, order, apply });
	}

	pub fn register_request_id(&mut self) {
		self.register("request-id", PRIORITY_REQUEST_ID, Arc::new(|r: Router| r.layer(axum::middleware::from_fn(request_id_middleware))));
	}

	pub fn register_cors(&mut self, cors: CorsLayer) {
		self.register("cors", PRIORITY_CORS, Arc::new(move |r: Router| r.layer(cors.clone())));
	}

	pub fn register_logging(&mut self, skip_paths: Vec<String>) {
		self.register("logging", PRIORITY_LOGGING, Arc::new(move |r: Router| {
			let skip = skip_paths.clone();
			r.layer(axum::middleware::from_fn(move |req: Request, next: Next| {
				let skip = skip.clone();
				async move { logging_middleware(req, next, skip).await }
			}))
		}));
	}

	pub fn register_jwt(&mut self, token_sources: TokenSourceConfig, jwt_config: JwtConfig) {
		self.register("jwt", PRIORITY_JWT, Arc::new(move |r: Router| {
			let sources = token_sources.clone();
			let config = jwt_config.clone();
			r.layer(axum::middleware::from_fn(move |req: Request, next: Next| {
				let sources = sources.clone();
				let config = config.clone();
				async move { jwt_middleware(req, next, sources, config).await }
			}))
		}));
	}

	/// Applies every registration to `router`, in the execution order
	/// SPEC_FULL.md §4.6 describes (ascending priority runs first).
	pub fn apply_all(&self, mut router: Router) -> Router {
		let mut sorted = self.registrations.clone();
		sorted.sort_by_key(|r| (r.priority, r.order));
		for reg in sorted.into_iter().rev() {
			router = (reg.apply)(router);
		}
		router
	}
}

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(0);

async fn request_id_middleware(mut req: Request, next: Next) -> Response {
	let id = format!("{}-{:x}", NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed), rand::random::<u64>());
	let log = RequestLog::new(id.clone());
	let span = log.span.clone();
	req.extensions_mut().insert(log);

	async move {
		let mut resp = next.run(req).await;
		if let Ok(value) = HeaderValue::from_str(&id) {
			resp.headers_mut().insert(HeaderName::from_static("x-request-id"), value);
		}
		resp
	}
	.instrument(span)
	.await
}

async fn logging_middleware(req: Request, next: Next, skip_paths: Vec<String>) -> Response {
	let path = req.uri().path().to_string();
	if skip_paths.iter().any(|p| p == &path) {
		return next.run(req).await;
	}
	let method = req.method().clone();
	let started = std::time::Instant::now();
	let resp = next.run(req).await;
	tracing::info!(method = %method, path = %path, status = resp.status().as_u16(), elapsed_ms = started.elapsed().as_millis() as u64, "request completed");
	resp
}

/// Extracts and validates a bearer token if one is present; absence is not
/// an error (SPEC_FULL.md §4.6). The resulting `Option<AuthUser>` is stored
/// in request extensions for `handler.rs`'s security-enforcement step to
/// read.
async fn jwt_middleware(mut req: Request, next: Next, sources: TokenSourceConfig, config: JwtConfig) -> Response {
	let cookie_header = req.headers().get(axum::http::header::COOKIE).and_then(|v| v.to_str().ok()).map(str::to_string);
	let token = jwt::extract_token(req.headers(), cookie_header.as_deref(), &sources);
	if let Some(token) = token {
		if let Ok(user) = jwt::validate_token(&token, &config) {
			req.extensions_mut().insert(user);
		}
	}
	next.run(req).await
}
