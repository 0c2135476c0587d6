//! The explicit wiring layer (SPEC_FULL.md §9 "DI framework as assembly
//! glue"): one `Builder` that constructs every subsystem exactly once, in
//! the leaves-first dependency order §2 describes, and hands the finished
//! `axum::Router` to `main.rs`'s listener. No global state — everything a
//! request needs flows through `apiruntime::AppState`, cloned per request by
//! `axum`'s `State` extractor.
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result, bail};
use apiruntime::config::AppConfig;
use apiruntime::handler::{Api, AppState};
use apiruntime::middleware::MiddlewareScheduler;
use apiruntime::security::{SecurityEnforcer, SimpleEnforcer};
use axum::Router;
use tokio_util::sync::CancellationToken;

/// What `Builder::build` hands back to `main.rs`: a fully-layered router
/// ready for `axum::serve`, plus the pieces the listener needs to honor
/// SPEC_FULL.md §5's shutdown contract.
pub struct Built {
	pub router: Router,
	pub bind_addr: String,
	pub shutdown: CancellationToken,
	pub shutdown_timeout: Duration,
}

/// Consumes an `AppConfig` and produces a `Built`. Every subsystem is
/// constructed once here: the converter registry, the security enforcer
/// strategy, the OpenAPI-backed `Api`, and the middleware scheduler, in that
/// order (tag parser and converter registry are leaves; the scheduler is
/// built last because CORS/logging/JWT registrations just wrap the router
/// `Api::into_router` already produced).
pub struct Builder {
	config: AppConfig,
}

impl Builder {
	pub fn new(config: AppConfig) -> Self {
		Self { config }
	}

	pub fn build(self) -> Result<Built> {
		apicore::telemetry::init(&self.config.httpserver.logging.level, self.config.httpserver.logging.schema);

		let registry = Arc::new(apiruntime::convert::ConverterRegistry::with_builtins());

		let enforcer: Arc<dyn SecurityEnforcer> = match self.config.security.enforcer.kind {
			apiruntime::EnforcerKind::Simple => Arc::new(SimpleEnforcer),
			apiruntime::EnforcerKind::Casbin => {
				bail!("security.enforcer.type = casbin requires a policy adapter registered by the host application (SPEC_FULL.md §4.7); apiruntime-app does not register one")
			},
			apiruntime::EnforcerKind::Custom => {
				bail!("security.enforcer.type = custom requires a host-supplied SecurityEnforcer implementation; apiruntime-app does not register one")
			},
		};

		let shutdown = CancellationToken::new();

		let state = AppState {
			registry,
			enforcer,
			cancellation: shutdown.clone(),
			default_format: self.config.httpserver.api.default_format.clone(),
			no_format_fallback: self.config.httpserver.api.no_format_fallback,
		};

		let api = Api::new(self.config.httpserver.openapi.clone(), self.config.httpserver.api.clone());
		let router: Router = api.into_router().with_state(state);

		let mut scheduler = MiddlewareScheduler::new();
		scheduler.register_request_id();
		if self.config.httpserver.cors.enabled {
			scheduler.register_cors(self.config.httpserver.cors.to_layer());
		}
		if self.config.httpserver.logging.enabled {
			scheduler.register_logging(self.config.httpserver.logging.skip_paths.clone());
		}
		if let Some(jwt) = &self.config.security.jwt {
			let jwt_config = jwt.finish().context("security.jwt")?;
			let token_sources = self.config.security.token_source.finish();
			scheduler.register_jwt(token_sources, jwt_config);
		}

		let router = scheduler.apply_all(router);

		Ok(Built {
			router,
			bind_addr: self.config.httpserver.server.bind_addr(),
			shutdown,
			shutdown_timeout: Duration::from_secs(self.config.httpserver.server.shutdown_timeout),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn simple_enforcer_builds_without_a_jwt_section() {
		let built = Builder::new(AppConfig::default()).build().unwrap();
		assert_eq!(built.bind_addr, "0.0.0.0:8080");
	}

	#[test]
	fn casbin_enforcer_without_an_adapter_is_a_wiring_error() {
		let mut config = AppConfig::default();
		config.security.enforcer.kind = apiruntime::EnforcerKind::Casbin;
		assert!(Builder::new(config).build().is_err());
	}
}
