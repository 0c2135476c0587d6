//! Global `tracing` bring-up.
//!
//! The runtime owns only the "give me a structured subscriber" dependency
//! (see SPEC_FULL.md §1); actual log shipping, sampling, and sinks are a
//! host-application concern. `init` is therefore deliberately small: it wires
//! an `EnvFilter` plus either a JSON or pretty formatting layer and installs
//! it as the global default exactly once.

use std::sync::Once;

use serde::Deserialize;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

static INIT: Once = Once::new();

/// Output formatting chosen by `httpserver.logging.schema`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSchema {
	/// Human-oriented, single-line-per-event text.
	#[default]
	Pretty,
	/// Machine-oriented, one JSON object per line.
	Json,
}

/// Installs the global subscriber. Safe to call more than once; only the
/// first call takes effect, matching the "build once at startup" shared-state
/// rule the rest of the runtime follows.
pub fn init(level: &str, schema: LogSchema) {
	INIT.call_once(|| {
		let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
		let registry = tracing_subscriber::registry().with(filter);
		match schema {
			LogSchema::Json => {
				let layer = fmt::layer().json().with_target(true).with_current_span(true);
				registry.with(layer).init();
			},
			LogSchema::Pretty => {
				let layer = fmt::layer().with_target(true);
				registry.with(layer).init();
			},
		}
	});
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn init_is_idempotent() {
		init("info", LogSchema::Pretty);
		init("debug", LogSchema::Json);
	}
}
