//! Per-request logging context.
//!
//! Every request gets one `RequestLog`, created by the request-id middleware
//! (the first thing to run, per SPEC_FULL.md §4.6) and threaded through the
//! rest of the middleware chain and into the handler. Its `span` is entered
//! for the lifetime of the request so every `tracing` event emitted anywhere
//! downstream is automatically tagged with the request id.
use tracing::Span;

#[derive(Debug, Clone)]
pub struct RequestLog {
	pub request_id: String,
	pub span: Span,
}

impl RequestLog {
	pub fn new(request_id: impl Into<String>) -> Self {
		let request_id = request_id.into();
		let span = tracing::info_span!("request", request_id = %request_id);
		Self { request_id, span }
	}

	/// Entered for the duration of a synchronous block; for `.await` points,
	/// prefer `Instrument::instrument(self.span.clone())` on the future.
	pub fn enter(&self) -> tracing::span::Entered<'_> {
		self.span.enter()
	}
}
