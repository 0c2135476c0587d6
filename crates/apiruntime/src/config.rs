//! Typed configuration structs (SPEC_FULL.md §6 "Config — keys the core
//! consumes").
//!
//! Grounded directly on `agentgateway::RawConfig`'s pattern:
//! `#[serde(rename_all = "camelCase", deny_unknown_fields)]`, every field
//! `Option<T>` so a partially-specified document still parses, with defaults
//! applied in a `finish`-style step (here, `Default` impls plus the `serde`
//! `#[serde(default)]` attribute rather than a separate raw/finished type
//! pair, since none of these structs need a fallible finish step the way the
//! teacher's xDS address resolution did).
use std::sync::Arc;

use jsonwebtoken::Algorithm;
use secrecy::SecretString;
use serde::Deserialize;

use crate::security::jwt::{JwtConfig, TokenSource, TokenSourceConfig};

fn default_host() -> String {
	"0.0.0.0".to_string()
}
fn default_port() -> u16 {
	8080
}
fn default_read_timeout() -> u64 {
	15
}
fn default_write_timeout() -> u64 {
	15
}
fn default_idle_timeout() -> u64 {
	60
}
fn default_shutdown_timeout() -> u64 {
	10
}

/// `httpserver.server.*`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct HttpServerConfig {
	pub host: String,
	pub port: u16,
	pub read_timeout: u64,
	pub write_timeout: u64,
	pub idle_timeout: u64,
	pub shutdown_timeout: u64,
}

impl Default for HttpServerConfig {
	fn default() -> Self {
		Self {
			host: default_host(),
			port: default_port(),
			read_timeout: default_read_timeout(),
			write_timeout: default_write_timeout(),
			idle_timeout: default_idle_timeout(),
			shutdown_timeout: default_shutdown_timeout(),
		}
	}
}

impl HttpServerConfig {
	pub fn bind_addr(&self) -> String {
		format!("{}:{}", self.host, self.port)
	}
}

/// `httpserver.cors.*`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct CorsConfig {
	pub enabled: bool,
	pub origins: Vec<String>,
	pub methods: Vec<String>,
	pub headers: Vec<String>,
	pub exposed: Vec<String>,
	pub allow_credentials: bool,
	pub max_age: Option<u64>,
}

impl CorsConfig {
	/// Builds the `tower_http::cors::CorsLayer` this config describes.
	/// `methods`/`headers`/entries that fail to parse as HTTP tokens are
	/// skipped rather than failing startup, matching the lenient-parse
	/// posture the tag parser (`tag.rs`) uses elsewhere in this crate.
	pub fn to_layer(&self) -> tower_http::cors::CorsLayer {
		use axum::http::{HeaderName, Method};
		use tower_http::cors::{AllowOrigin, CorsLayer};

		let mut layer = CorsLayer::new();

		layer = if self.origins.iter().any(|o| o == "*") {
			layer.allow_origin(AllowOrigin::any())
		} else {
			let origins: Vec<_> = self.origins.iter().filter_map(|o| o.parse().ok()).collect();
			layer.allow_origin(origins)
		};

		let methods: Vec<Method> = self.methods.iter().filter_map(|m| m.parse().ok()).collect();
		if !methods.is_empty() {
			layer = layer.allow_methods(methods);
		}

		let headers: Vec<HeaderName> = self.headers.iter().filter_map(|h| h.parse().ok()).collect();
		if !headers.is_empty() {
			layer = layer.allow_headers(headers);
		}

		let exposed: Vec<HeaderName> = self.exposed.iter().filter_map(|h| h.parse().ok()).collect();
		if !exposed.is_empty() {
			layer = layer.expose_headers(exposed);
		}

		if self.allow_credentials {
			layer = layer.allow_credentials(true);
		}
		if let Some(secs) = self.max_age {
			layer = layer.max_age(std::time::Duration::from_secs(secs));
		}
		layer
	}
}

/// `httpserver.logging.*`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct LoggingConfig {
	pub enabled: bool,
	pub level: String,
	pub schema: apicore::telemetry::LogSchema,
	pub recover_panics: bool,
	pub skip_paths: Vec<String>,
}

impl Default for LoggingConfig {
	fn default() -> Self {
		Self {
			enabled: true,
			level: "info".to_string(),
			schema: apicore::telemetry::LogSchema::default(),
			recover_panics: true,
			skip_paths: Vec::new(),
		}
	}
}

/// `httpserver.api.*`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct ApiConfig {
	pub spec_path: String,
	pub docs_path: String,
	pub schemas_path: String,
	pub default_format: String,
	pub no_format_fallback: bool,
}

impl Default for ApiConfig {
	fn default() -> Self {
		Self {
			spec_path: "/openapi".to_string(),
			docs_path: "/docs".to_string(),
			schemas_path: "/schemas".to_string(),
			default_format: "application/json".to_string(),
			no_format_fallback: false,
		}
	}
}

/// `httpserver.openapi.*`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct OpenApiConfig {
	pub title: String,
	pub version: String,
	pub description: Option<String>,
	pub contact: Option<String>,
	pub license: Option<String>,
	pub tags: Vec<String>,
	pub security: Vec<String>,
}

/// `security.enforcer.type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnforcerKind {
	Simple,
	Casbin,
	Custom,
}

impl Default for EnforcerKind {
	fn default() -> Self {
		EnforcerKind::Simple
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct EnforcerConfig {
	#[serde(rename = "type")]
	pub kind: EnforcerKind,
}

/// `security.jwt.*`. `secret` is read as plain text here and immediately
/// wrapped in `secrecy::SecretString` by `finish()` — the config file is the
/// only place the raw value exists outside the wrapper.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RawJwtConfig {
	pub algorithm: Algorithm,
	pub secret: Option<String>,
	pub private_key_path: Option<String>,
	pub public_key_path: Option<String>,
	#[serde(default = "default_access_token_expiry")]
	pub access_token_expiry: u64,
	#[serde(default = "default_refresh_token_expiry")]
	pub refresh_token_expiry: u64,
}

fn default_access_token_expiry() -> u64 {
	900
}
fn default_refresh_token_expiry() -> u64 {
	604_800
}

impl RawJwtConfig {
	/// Resolves the on-disk key material into the `JwtConfig` the JWT
	/// middleware consumes. Asymmetric algorithms (key-pair based, read from
	/// `private_key_path`/`public_key_path`) are out of this crate's scope
	/// (§1 "JWT cryptography ... the runtime owns only the enforcement
	/// hook") — only the shared-secret path is wired up here.
	pub fn finish(&self) -> anyhow::Result<JwtConfig> {
		let secret = self
			.secret
			.clone()
			.ok_or_else(|| anyhow::anyhow!("security.jwt.secret is required (asymmetric keys are a host-supplied collaborator)"))?;
		Ok(JwtConfig { algorithm: self.algorithm, secret: Arc::new(SecretString::from(secret)) })
	}
}

/// `security.token_source.*`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct RawTokenSourceConfig {
	pub sources: Vec<String>,
	pub header_name: String,
	pub cookie_name: String,
}

impl Default for RawTokenSourceConfig {
	fn default() -> Self {
		let default = TokenSourceConfig::default();
		Self { sources: vec!["header".to_string(), "cookie".to_string()], header_name: default.header_name, cookie_name: default.cookie_name }
	}
}

impl RawTokenSourceConfig {
	pub fn finish(&self) -> TokenSourceConfig {
		let sources = self
			.sources
			.iter()
			.filter_map(|s| match s.as_str() {
				"header" => Some(TokenSource::AuthorizationHeader),
				"cookie" => Some(TokenSource::Cookie),
				_ => None,
			})
			.collect();
		TokenSourceConfig { sources, header_name: self.header_name.clone(), cookie_name: self.cookie_name.clone() }
	}
}

/// The top-level document `apiruntime-app` reads (`--config <path>`), one
/// section per built-in subsystem. Unknown top-level keys are rejected the
/// same way the teacher's `RawConfig` rejects them, so a typo in a config
/// file is a startup error, not a silently-ignored no-op.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct AppConfig {
	pub httpserver: HttpServerSection,
	pub security: SecuritySection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct HttpServerSection {
	pub server: HttpServerConfig,
	pub cors: CorsConfig,
	pub logging: LoggingConfig,
	pub api: ApiConfig,
	pub openapi: OpenApiConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct SecuritySection {
	pub jwt: Option<RawJwtConfig>,
	pub token_source: RawTokenSourceConfig,
	pub enforcer: EnforcerConfig,
}

impl Default for SecuritySection {
	fn default() -> Self {
		Self { jwt: None, token_source: RawTokenSourceConfig::default(), enforcer: EnforcerConfig::default() }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn server_defaults_match_spec() {
		let cfg = HttpServerConfig::default();
		assert_eq!(cfg.bind_addr(), "0.0.0.0:8080");
		assert_eq!(cfg.read_timeout, 15);
		assert_eq!(cfg.shutdown_timeout, 10);
	}

	#[test]
	fn app_config_parses_minimal_yaml() {
		let yaml = r#"
httpserver:
  server:
    port: 9090
security:
  enforcer:
    type: simple
"#;
		let cfg: AppConfig = serde_yaml::from_str(yaml).unwrap();
		assert_eq!(cfg.httpserver.server.port, 9090);
		assert_eq!(cfg.httpserver.server.host, "0.0.0.0");
		assert_eq!(cfg.security.enforcer.kind, EnforcerKind::Simple);
	}

	#[test]
	fn unknown_top_level_key_is_rejected() {
		let yaml = "nonsense: true\n";
		assert!(serde_yaml::from_str::<AppConfig>(yaml).is_err());
	}

	#[test]
	fn jwt_config_requires_a_secret() {
		let raw = RawJwtConfig {
			algorithm: Algorithm::HS256,
			secret: None,
			private_key_path: None,
			public_key_path: None,
			access_token_expiry: 900,
			refresh_token_expiry: 604_800,
		};
		assert!(raw.finish().is_err());
	}

	#[test]
	fn token_source_finish_maps_names() {
		let raw = RawTokenSourceConfig { sources: vec!["cookie".to_string()], header_name: "Authorization".to_string(), cookie_name: "access_token".to_string() };
		let finished = raw.finish();
		assert_eq!(finished.sources, vec![TokenSource::Cookie]);
	}
}
