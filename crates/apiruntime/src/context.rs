//! The per-request `Context` handlers receive (SPEC_FULL.md §3, §5).
//!
//! Built fresh for every request inside the compiled handler (`handler.rs`)
//! from the `axum` request parts, the matched `Route`, and whatever the
//! middleware chain stashed in request extensions (`RequestLog`,
//! `Option<AuthUser>`). Never cloned into shared state — SPEC_FULL.md §5
//! "Request-scoped state ... is never shared across requests".
use std::sync::Arc;

use axum::http::{HeaderMap, Method};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::route::Route;
use crate::security::AuthUser;
use apicore::request_log::RequestLog;

pub struct Context {
	pub method: Method,
	pub path: String,
	pub headers: HeaderMap,
	pub auth_user: Option<AuthUser>,
	pub route: Arc<Route>,
	pub log: RequestLog,
	cancellation: CancellationToken,
}

impl Context {
	pub fn new(method: Method, path: String, headers: HeaderMap, auth_user: Option<AuthUser>, route: Arc<Route>, log: RequestLog, cancellation: CancellationToken) -> Self {
		Self { method, path, headers, auth_user, route, log, cancellation }
	}

	pub fn request_id(&self) -> &str {
		&self.log.request_id
	}

	/// Resolves when the server's shutdown `CancellationToken` fires.
	/// Handlers race their own work against this via `tokio::select!` to
	/// return promptly on shutdown (SPEC_FULL.md §5 "Suspension points").
	pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
		self.cancellation.cancelled()
	}

	pub fn is_cancelled(&self) -> bool {
		self.cancellation.is_cancelled()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::route::Route;

	#[test]
	fn request_id_reads_through_to_the_log() {
		let route = Arc::new(Route::new(Method::GET, "/ping"));
		let ctx = Context::new(Method::GET, "/ping".to_string(), HeaderMap::new(), None, route, RequestLog::new("req-1"), CancellationToken::new());
		assert_eq!(ctx.request_id(), "req-1");
	}

	#[test]
	fn not_cancelled_until_token_fires() {
		let route = Arc::new(Route::new(Method::GET, "/ping"));
		let token = CancellationToken::new();
		let ctx = Context::new(Method::GET, "/ping".to_string(), HeaderMap::new(), None, route, RequestLog::new("req-1"), token.clone());
		assert!(!ctx.is_cancelled());
		token.cancel();
		assert!(ctx.is_cancelled());
	}
}
