//! The API runtime: turns declarative route descriptors and typed handlers
//! into an executable HTTP pipeline (SPEC_FULL.md §2 "API runtime").
//!
//! Module layout mirrors the dependency order SPEC_FULL.md §2 lays out,
//! leaves first: `tag` → `value`/`convert` → `metadata` → `params` →
//! `decode`/`body` → `negotiate` → `route`/`handler`/`context`/`middleware`/
//! `response` → `security` → `openapi`. `schema` sits alongside `metadata`
//! as the macro-facing surface `apiruntime-macros`'s generated code calls
//! into; `config`/`problem`/`validate` are the ambient-stack modules that
//! every other piece depends on.
pub mod body;
pub mod config;
pub mod context;
pub mod convert;
pub mod decode;
pub mod handler;
pub mod metadata;
pub mod middleware;
pub mod negotiate;
pub mod openapi;
pub mod params;
pub mod problem;
pub mod response;
pub mod route;
pub mod schema;
pub mod security;
pub mod tag;
pub mod validate;
pub mod value;

// `apiruntime_macros::Input`/`Output` are derive macros (macro namespace);
// `crate::schema::Input`/`Output` are the traits they implement (type
// namespace). The two pairs share a name but not a namespace, so both can
// live at the crate root: `#[derive(apiruntime::Input)]` next to `impl
// apiruntime::Input for Foo` reads the way the distilled spec's single
// `Input`/`Output` vocabulary does.
pub use apiruntime_macros::{Input, Output};

pub use crate::config::{AppConfig, ApiConfig, CorsConfig, EnforcerKind, HttpServerConfig, LoggingConfig, OpenApiConfig};
pub use crate::context::Context;
pub use crate::convert::ConverterRegistry;
pub use crate::handler::{Api, AppState, RegisterError};
pub use crate::middleware::MiddlewareScheduler;
pub use crate::problem::{ErrorDetail, ErrorKind, HandlerError, ProblemDocument, StatusError};
pub use crate::route::{Route, RouteError};
pub use crate::schema::{Input, Output};
pub use crate::security::{AuthUser, SecurityEnforcer, SecurityRequirements};
pub use crate::value::Value;
