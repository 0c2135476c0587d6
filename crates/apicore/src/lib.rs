//! Ambient stack shared by every layer of the API runtime: small collection
//! utilities, the global tracing/metrics bring-up, and the request-scoped
//! logging helper that the middleware scheduler builds on.

pub mod bow;
pub mod request_log;
pub mod telemetry;
pub mod tokio_metrics;

pub use bow::OwnedOrBorrowed;
