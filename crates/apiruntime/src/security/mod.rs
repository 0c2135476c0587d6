//! Security enforcement (SPEC_FULL.md §4.7): the route's declared
//! `SecurityRequirements` gated against the request's `AuthUser` by a
//! pluggable `SecurityEnforcer` strategy.
//!
//! Grounded on `http/authorization.rs`'s `RuleSet`/`PolicySet` allow/deny
//! shape from the teacher, generalized from a CEL-expression evaluator (the
//! teacher's own engine, dropped — see `DESIGN.md`) to a roles/permissions/
//! resource evaluator matching this spec's data model.
pub mod jwt;

use std::sync::Arc;

use async_trait::async_trait;

/// The authenticated subject, attached to the request context by the JWT
/// middleware (SPEC_FULL.md §3 "AuthUser").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
	pub id: String,
	pub roles: Vec<String>,
}

impl AuthUser {
	pub fn has_role(&self, role: &str) -> bool {
		self.roles.iter().any(|r| r == role)
	}
}

/// A route's security policy. The constructor enforces the invariant in
/// SPEC_FULL.md §3: if any of roles/permissions/resource is non-empty,
/// `require_auth` is implicitly true, regardless of what the caller passed.
#[derive(Debug, Clone, Default)]
pub struct SecurityRequirements {
	pub roles: Vec<String>,
	pub permissions: Vec<String>,
	pub resource: Option<String>,
	pub action: Option<String>,
	require_auth: bool,
}

impl SecurityRequirements {
	pub fn new(roles: Vec<String>, permissions: Vec<String>, resource: Option<String>, action: Option<String>, require_auth: bool) -> Self {
		let implied = !roles.is_empty() || !permissions.is_empty() || resource.is_some();
		Self { roles, permissions, resource, action, require_auth: require_auth || implied }
	}

	pub fn none() -> Self {
		Self::default()
	}

	pub fn with_roles(roles: impl IntoIterator<Item = impl Into<String>>) -> Self {
		Self::new(roles.into_iter().map(Into::into).collect(), Vec::new(), None, None, false)
	}

	pub fn require_auth(&self) -> bool {
		self.require_auth
	}

	pub fn is_empty(&self) -> bool {
		!self.require_auth
	}
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum EnforceError {
	#[error("no authenticated user for a route requiring auth")]
	MissingAuthUser,
	#[error("simple enforcer rejects permission/resource requirements")]
	SimpleEnforcerUnsupportedRequirement,
	#[error("policy engine error: {0}")]
	PolicyEngine(String),
}

/// A resource/role policy evaluator, the hook a `casbin` adapter would
/// implement (SPEC_FULL.md §4.7 "Policy" strategy, "resource-check first
/// ... via a policy engine"). The runtime owns only this trait, not any
/// concrete Casbin integration (§1 out-of-scope list).
pub trait PolicyEngine: Send + Sync {
	fn allowed(&self, roles: &[String], resource: &str, action: &str) -> Result<bool, EnforceError>;
}

#[async_trait]
pub trait SecurityEnforcer: Send + Sync {
	async fn enforce(&self, user: &AuthUser, requirements: &SecurityRequirements) -> Result<bool, EnforceError>;
}

/// `simple`: union semantics on roles; rejects configs naming permissions or
/// a resource (SPEC_FULL.md §4.7).
pub struct SimpleEnforcer;

#[async_trait]
impl SecurityEnforcer for SimpleEnforcer {
	async fn enforce(&self, user: &AuthUser, requirements: &SecurityRequirements) -> Result<bool, EnforceError> {
		if !requirements.permissions.is_empty() || requirements.resource.is_some() {
			return Err(EnforceError::SimpleEnforcerUnsupportedRequirement);
		}
		if requirements.roles.is_empty() {
			return Ok(true);
		}
		Ok(requirements.roles.iter().any(|r| user.has_role(r)))
	}
}

/// `casbin`: resource-check first (template-expanded resource string ×
/// user's roles), then all-of permissions, then any-of roles.
pub struct PolicyEnforcer {
	pub engine: Arc<dyn PolicyEngine>,
}

impl PolicyEnforcer {
	pub fn new(engine: Arc<dyn PolicyEngine>) -> Self {
		Self { engine }
	}

	/// Expands `{param}` placeholders in a resource template against the
	/// user id, e.g. `/users/{id}` with `user.id = "42"` (a route-level
	/// path-param substitution would be layered on by the caller before
	/// this, via `expand_resource`).
	pub fn expand_resource(template: &str, params: &std::collections::HashMap<String, String>) -> String {
		let mut out = template.to_string();
		for (k, v) in params {
			out = out.replace(&format!("{{{k}}}"), v);
		}
		out
	}
}

#[async_trait]
impl SecurityEnforcer for PolicyEnforcer {
	async fn enforce(&self, user: &AuthUser, requirements: &SecurityRequirements) -> Result<bool, EnforceError> {
		if let Some(resource) = &requirements.resource {
			let action = requirements.action.as_deref().unwrap_or("*");
			if self.engine.allowed(&user.roles, resource, action)? {
				return Ok(true);
			}
		}
		if !requirements.permissions.is_empty() {
			// All-of: every named permission must itself be a role the user
			// holds (permissions are modeled as roles granted by the policy
			// store, consistent with the teacher's flat role-set model).
			return Ok(requirements.permissions.iter().all(|p| user.has_role(p)));
		}
		if !requirements.roles.is_empty() {
			return Ok(requirements.roles.iter().any(|r| user.has_role(r)));
		}
		Ok(true)
	}
}

/// `custom`: user-supplied strategy, wrapped so the enforcement middleware
/// (`middleware.rs`) can hold it as `Arc<dyn SecurityEnforcer>` alongside the
/// built-ins.
pub struct CustomEnforcer<F> {
	inner: F,
}

impl<F> CustomEnforcer<F> {
	pub fn new(inner: F) -> Self {
		Self { inner }
	}
}

#[async_trait]
impl<F> SecurityEnforcer for CustomEnforcer<F>
where
	F: Fn(&AuthUser, &SecurityRequirements) -> Result<bool, EnforceError> + Send + Sync,
{
	async fn enforce(&self, user: &AuthUser, requirements: &SecurityRequirements) -> Result<bool, EnforceError> {
		(self.inner)(user, requirements)
	}
}

/// Runs the §4.7 soundness checks: no requirements → pass; requirements but
/// no `AuthUser` → caller should emit `401` (signaled by `MissingAuthUser`);
/// otherwise delegate to the strategy.
pub async fn check(
	enforcer: &dyn SecurityEnforcer,
	user: Option<&AuthUser>,
	requirements: &SecurityRequirements,
) -> Result<bool, EnforceError> {
	if requirements.is_empty() {
		return Ok(true);
	}
	let Some(user) = user else {
		return Err(EnforceError::MissingAuthUser);
	};
	enforcer.enforce(user, requirements).await
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn simple_enforcer_passes_on_role_intersection() {
		let enforcer = SimpleEnforcer;
		let user = AuthUser { id: "1".into(), roles: vec!["user".into()] };
		let reqs = SecurityRequirements::with_roles(["admin", "user"]);
		assert!(check(&enforcer, Some(&user), &reqs).await.unwrap());
	}

	#[tokio::test]
	async fn simple_enforcer_denies_without_intersection() {
		// S6 in SPEC_FULL.md §8.
		let enforcer = SimpleEnforcer;
		let user = AuthUser { id: "1".into(), roles: vec!["user".into()] };
		let reqs = SecurityRequirements::with_roles(["admin"]);
		assert!(!check(&enforcer, Some(&user), &reqs).await.unwrap());
	}

	#[tokio::test]
	async fn no_requirements_passes_without_user() {
		let enforcer = SimpleEnforcer;
		let reqs = SecurityRequirements::none();
		assert!(check(&enforcer, None, &reqs).await.unwrap());
	}

	#[tokio::test]
	async fn requirements_without_user_is_missing_auth_user() {
		let enforcer = SimpleEnforcer;
		let reqs = SecurityRequirements::with_roles(["admin"]);
		assert!(matches!(check(&enforcer, None, &reqs).await, Err(EnforceError::MissingAuthUser)));
	}

	#[test]
	fn require_auth_implied_by_roles() {
		let reqs = SecurityRequirements::new(vec!["admin".into()], vec![], None, None, false);
		assert!(reqs.require_auth());
	}
}
