//! The response writer contract and `Output` → `axum::response::Response`
//! marshaling (SPEC_FULL.md §4.8).
//!
//! `axum`'s `Response` is write-once: once you hand back a body, you can't
//! rewrite the status. The design note in SPEC_FULL.md §9 allows exactly
//! this ("in ecosystems where the response writer is write-once, buffer the
//! body until the runtime commits"), so `ResponseWriter` buffers status,
//! headers, and body and only calls `into_response()` once everything —
//! including content negotiation, which can downgrade a success into a
//! `406` — has settled.
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;

/// The `Body any` slot of an `Output` struct, realized as a closed enum
/// instead of Go's `any` (§9 "`Any` as the decoded-value type" applies here
/// too). `Raw` bypasses negotiation and is written verbatim; `None` maps to
/// the default-status heuristic in SPEC_FULL.md §4.5 (`204` with no body).
pub enum BodyPayload {
	None,
	Json(serde_json::Value),
	Raw(Vec<u8>),
}

pub trait IntoStatusOpt {
	fn into_status_opt(&self) -> Option<u16>;
}

impl IntoStatusOpt for u16 {
	fn into_status_opt(&self) -> Option<u16> {
		Some(*self)
	}
}

impl IntoStatusOpt for Option<u16> {
	fn into_status_opt(&self) -> Option<u16> {
		*self
	}
}

/// Output header fields may be a scalar (single value) or a `Vec` (appended)
/// per SPEC_FULL.md §4.5 step 3.
pub trait IntoHeaderValues {
	fn into_header_values(name: &str, value: &Self) -> Vec<(String, Vec<String>)>;
}

impl IntoHeaderValues for String {
	fn into_header_values(name: &str, value: &Self) -> Vec<(String, Vec<String>)> {
		vec![(name.to_string(), vec![value.clone()])]
	}
}

impl IntoHeaderValues for Option<String> {
	fn into_header_values(name: &str, value: &Self) -> Vec<(String, Vec<String>)> {
		match value {
			Some(v) => vec![(name.to_string(), vec![v.clone()])],
			None => Vec::new(),
		}
	}
}

impl IntoHeaderValues for Vec<String> {
	fn into_header_values(name: &str, value: &Self) -> Vec<(String, Vec<String>)> {
		if value.is_empty() { Vec::new() } else { vec![(name.to_string(), value.clone())] }
	}
}

/// Stateful per-request response builder. `set_status`/`set_header`/
/// `append_header` may be called freely until `commit`/`commit_stream`; after
/// that, the writer is consumed.
#[derive(Debug, Default)]
pub struct ResponseWriter {
	status: Option<StatusCode>,
	headers: Vec<(String, String)>,
}

impl ResponseWriter {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn set_status(&mut self, status: StatusCode) {
		self.status = Some(status);
	}

	pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
		let name = name.into();
		self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(&name));
		self.headers.push((name, value.into()));
	}

	pub fn append_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
		self.headers.push((name.into(), value.into()));
	}

	fn build_header_map(&self) -> HeaderMap {
		let mut map = HeaderMap::new();
		for (k, v) in &self.headers {
			if let (Ok(name), Ok(value)) = (HeaderName::try_from(k.as_str()), HeaderValue::try_from(v.as_str())) {
				map.append(name, value);
			}
		}
		map
	}

	/// Flushes the buffered status/headers and writes `body` as the final,
	/// one-shot response.
	pub fn commit(self, default_status: StatusCode, body: Bytes, content_type: Option<&str>) -> Response {
		let status = self.status.unwrap_or(default_status);
		let mut headers = self.build_header_map();
		if let Some(ct) = content_type {
			if let Ok(v) = HeaderValue::try_from(ct) {
				headers.insert(axum::http::header::CONTENT_TYPE, v);
			}
		}
		(status, headers, body).into_response()
	}

	/// Streaming-body path (§4.5 step 7, "func(Context)"): flushes
	/// status/headers *before* the body-producing closure runs, per the
	/// contract in SPEC_FULL.md §4.8. The closure writes the resolved
	/// `Bytes` body; since `axum::response::Response` has no pre-flush
	/// streaming hook that this crate's adapter exposes, the open question in
	/// SPEC_FULL.md §9 is resolved here by buffering: the closure runs to
	/// completion and its output becomes the one-shot body.
	pub fn commit_stream(self, default_status: StatusCode, produce: impl FnOnce() -> Bytes) -> Response {
		let status = self.status.unwrap_or(default_status);
		let headers = self.build_header_map();
		let body = produce();
		(status, headers, body).into_response()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn set_header_replaces_append_header_adds() {
		let mut w = ResponseWriter::new();
		w.set_header("x-a", "1");
		w.set_header("x-a", "2");
		w.append_header("x-b", "1");
		w.append_header("x-b", "2");
		let map = w.build_header_map();
		assert_eq!(map.get("x-a").unwrap(), "2");
		assert_eq!(map.get_all("x-b").iter().count(), 2);
	}

	#[test]
	fn status_buffered_until_commit() {
		let mut w = ResponseWriter::new();
		w.set_status(StatusCode::CREATED);
		let resp = w.commit(StatusCode::OK, Bytes::new(), None);
		assert_eq!(resp.status(), StatusCode::CREATED);
	}

	#[test]
	fn default_status_used_when_unset() {
		let w = ResponseWriter::new();
		let resp = w.commit(StatusCode::NO_CONTENT, Bytes::new(), None);
		assert_eq!(resp.status(), StatusCode::NO_CONTENT);
	}
}
