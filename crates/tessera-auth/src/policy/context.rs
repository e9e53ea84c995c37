//! Per-request evaluation context.
//!
//! An [`EvaluationContext`] describes one access question: which tenant, which
//! subject (roles and attributes), which resource, which permission. It is
//! built per request and never persisted.
//!
//! ```
//! use serde_json::json;
//! use tessera_auth::policy::context::EvaluationContext;
//!
//! let ctx = EvaluationContext::builder("tenant-123", "course", "read")
//!     .role("trainer")
//!     .attribute("department", json!("Engineering"))
//!     .resource_id("course-advanced-js")
//!     .build()
//!     .unwrap();
//!
//! assert!(ctx.has_role("trainer"));
//! ```

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::AuthResult;
use crate::error::AuthError;

/// Subject attributes, keyed by attribute name.
///
/// Ordered so that serialisation is deterministic.
pub type Attributes = BTreeMap<String, Value>;

/// Everything needed to answer one access question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationContext {
    /// Tenant the rules are scoped to.
    pub tenant_id: String,

    /// Resolved subject roles.
    #[serde(default)]
    pub user_roles: BTreeSet<String>,

    /// Resolved subject attributes.
    #[serde(default)]
    pub attributes: Attributes,

    /// Resource category.
    pub resource_type: String,

    /// Specific resource, if any.
    #[serde(default)]
    pub resource_id: Option<String>,

    /// Requested action.
    pub permission: String,
}

impl EvaluationContext {
    /// Start building a context.
    #[must_use]
    pub fn builder(
        tenant_id: impl Into<String>,
        resource_type: impl Into<String>,
        permission: impl Into<String>,
    ) -> EvaluationContextBuilder {
        EvaluationContextBuilder::new(tenant_id, resource_type, permission)
    }

    /// Returns `true` if the subject holds `role`.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.user_roles.contains(role)
    }

    /// Returns `true` if the subject holds any of `roles`.
    #[must_use]
    pub fn has_any_role<'a>(&self, roles: impl IntoIterator<Item = &'a str>) -> bool {
        roles.into_iter().any(|role| self.has_role(role))
    }

    /// The resource id as a borrowed string.
    #[must_use]
    pub fn resource_id(&self) -> Option<&str> {
        self.resource_id.as_deref()
    }
}

/// Builder for [`EvaluationContext`].
#[derive(Debug, Clone)]
pub struct EvaluationContextBuilder {
    tenant_id: String,
    resource_type: String,
    permission: String,
    user_roles: BTreeSet<String>,
    attributes: Attributes,
    resource_id: Option<String>,
}

impl EvaluationContextBuilder {
    fn new(
        tenant_id: impl Into<String>,
        resource_type: impl Into<String>,
        permission: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            resource_type: resource_type.into(),
            permission: permission.into(),
            user_roles: BTreeSet::new(),
            attributes: Attributes::new(),
            resource_id: None,
        }
    }

    /// Add a single role.
    #[must_use]
    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.user_roles.insert(role.into());
        self
    }

    /// Add several roles.
    #[must_use]
    pub fn roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.user_roles.extend(roles.into_iter().map(Into::into));
        self
    }

    /// Set a single attribute.
    #[must_use]
    pub fn attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Replace all attributes.
    #[must_use]
    pub fn attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Set the resource id.
    #[must_use]
    pub fn resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    /// Set or clear the resource id.
    #[must_use]
    pub fn maybe_resource_id(mut self, resource_id: Option<String>) -> Self {
        self.resource_id = resource_id;
        self
    }

    /// Build the context.
    ///
    /// # Errors
    ///
    /// Returns an error if the tenant, resource type, or permission is empty.
    pub fn build(self) -> AuthResult<EvaluationContext> {
        if self.tenant_id.trim().is_empty() {
            return Err(AuthError::invalid_request("tenant id is required"));
        }
        if self.resource_type.trim().is_empty() {
            return Err(AuthError::invalid_request("resource type is required"));
        }
        if self.permission.trim().is_empty() {
            return Err(AuthError::invalid_request("permission is required"));
        }

        Ok(EvaluationContext {
            tenant_id: self.tenant_id,
            user_roles: self.user_roles,
            attributes: self.attributes,
            resource_type: self.resource_type,
            resource_id: self.resource_id,
            permission: self.permission,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_collects_roles_and_attributes() {
        let ctx = EvaluationContext::builder("t1", "report", "read")
            .roles(["learner", "trainer"])
            .role("learner")
            .attribute("region", json!("US"))
            .build()
            .unwrap();

        assert_eq!(ctx.user_roles.len(), 2);
        assert!(ctx.has_any_role(["admin", "trainer"]));
        assert!(!ctx.has_role("admin"));
        assert_eq!(ctx.attributes.get("region"), Some(&json!("US")));
        assert!(ctx.resource_id().is_none());
    }

    #[test]
    fn test_builder_rejects_missing_fields() {
        assert!(EvaluationContext::builder("", "course", "read").build().is_err());
        assert!(EvaluationContext::builder("t1", " ", "read").build().is_err());
        assert!(EvaluationContext::builder("t1", "course", "").build().is_err());
    }

    #[test]
    fn test_context_serializes_camel_case() {
        let ctx = EvaluationContext::builder("t1", "course", "read")
            .resource_id("c1")
            .build()
            .unwrap();
        let value = serde_json::to_value(&ctx).unwrap();
        assert_eq!(value["tenantId"], json!("t1"));
        assert_eq!(value["resourceId"], json!("c1"));
    }
}
