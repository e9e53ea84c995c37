//! Access control rule model.
//!
//! Rules are tenant-scoped and immutable once active. The `conditions`
//! document is kept as raw JSON because its shape depends on the rule type:
//!
//! - `RBAC`: usually empty, ignored by evaluation
//! - `ABAC`: attribute predicate evaluated by [`crate::policy::condition`]
//! - `content_permission`: `allowedRoles`, `deniedRoles`, `maskFields`

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AuthError;

// =============================================================================
// Rule Type
// =============================================================================

/// The evaluation layer a rule belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleType {
    /// Role-based access control.
    #[serde(rename = "RBAC")]
    Rbac,
    /// Attribute-based access control.
    #[serde(rename = "ABAC")]
    Abac,
    /// Per-resource override with role lists and field masking.
    #[serde(rename = "content_permission")]
    ContentPermission,
}

impl RuleType {
    /// Wire representation used by rule stores.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rbac => "RBAC",
            Self::Abac => "ABAC",
            Self::ContentPermission => "content_permission",
        }
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleType {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RBAC" => Ok(Self::Rbac),
            "ABAC" => Ok(Self::Abac),
            "content_permission" => Ok(Self::ContentPermission),
            other => Err(AuthError::invalid_rule(format!(
                "unknown rule type '{other}'"
            ))),
        }
    }
}

// =============================================================================
// Access Control Rule
// =============================================================================

/// A single tenant-scoped access control rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessControlRule {
    /// Rule identifier.
    pub id: String,

    /// Owning tenant.
    pub tenant_id: String,

    /// Evaluation layer.
    pub rule_type: RuleType,

    /// Subject kind, e.g. `role` or `attribute`.
    pub subject_type: String,

    /// Subject value. For RBAC rules this is the role name.
    pub subject_id: String,

    /// Resource category, e.g. `course`.
    pub resource_type: String,

    /// Specific resource, or `None` for every resource of the type.
    #[serde(default)]
    pub resource_id: Option<String>,

    /// Action, e.g. `read`.
    pub permission: String,

    /// Rule-type specific condition document.
    #[serde(default = "empty_conditions")]
    pub conditions: Value,

    /// Inactive rules are invisible to evaluation.
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn empty_conditions() -> Value {
    Value::Object(serde_json::Map::new())
}

fn default_active() -> bool {
    true
}

impl AccessControlRule {
    /// Returns `true` if the rule's resource constraint admits `resource_id`.
    ///
    /// A rule without a resource id is a wildcard for its resource type.
    #[must_use]
    pub fn matches_resource(&self, resource_id: Option<&str>) -> bool {
        match &self.resource_id {
            None => true,
            Some(id) => Some(id.as_str()) == resource_id,
        }
    }

    /// `conditions.allowedRoles`, if present and non-empty.
    #[must_use]
    pub fn allowed_roles(&self) -> Option<Vec<&str>> {
        self.string_list("allowedRoles")
    }

    /// `conditions.deniedRoles`, if present and non-empty.
    #[must_use]
    pub fn denied_roles(&self) -> Option<Vec<&str>> {
        self.string_list("deniedRoles")
    }

    /// `conditions.maskFields`, if present.
    ///
    /// Unlike the role lists an empty array is returned as-is; it simply
    /// masks nothing.
    #[must_use]
    pub fn mask_fields(&self) -> Option<Vec<&str>> {
        let fields = self.conditions.get("maskFields")?.as_array()?;
        Some(fields.iter().filter_map(Value::as_str).collect())
    }

    fn string_list(&self, key: &str) -> Option<Vec<&str>> {
        let list = self.conditions.get(key)?.as_array()?;
        if list.is_empty() {
            return None;
        }
        Some(list.iter().filter_map(Value::as_str).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rule(conditions: Value) -> AccessControlRule {
        AccessControlRule {
            id: "r1".into(),
            tenant_id: "tenant-123".into(),
            rule_type: RuleType::ContentPermission,
            subject_type: "role".into(),
            subject_id: "trainer".into(),
            resource_type: "course".into(),
            resource_id: Some("course-advanced-js".into()),
            permission: "read".into(),
            conditions,
            is_active: true,
        }
    }

    #[test]
    fn test_rule_type_wire_names() {
        assert_eq!(serde_json::to_value(RuleType::Rbac).unwrap(), json!("RBAC"));
        assert_eq!(
            serde_json::to_value(RuleType::ContentPermission).unwrap(),
            json!("content_permission")
        );
        assert_eq!("ABAC".parse::<RuleType>().unwrap(), RuleType::Abac);
        assert!("abac".parse::<RuleType>().is_err());
    }

    #[test]
    fn test_deserialize_reference_shape() {
        let rule: AccessControlRule = serde_json::from_value(json!({
            "id": "rbac-rule-1",
            "tenantId": "tenant-123",
            "ruleType": "RBAC",
            "subjectType": "role",
            "subjectId": "trainer",
            "resourceType": "course",
            "resourceId": null,
            "permission": "read"
        }))
        .unwrap();

        assert_eq!(rule.rule_type, RuleType::Rbac);
        assert!(rule.resource_id.is_none());
        assert!(rule.is_active);
        assert_eq!(rule.conditions, json!({}));
    }

    #[test]
    fn test_matches_resource() {
        let specific = rule(json!({}));
        assert!(specific.matches_resource(Some("course-advanced-js")));
        assert!(!specific.matches_resource(Some("course-intro")));
        assert!(!specific.matches_resource(None));

        let wildcard = AccessControlRule {
            resource_id: None,
            ..rule(json!({}))
        };
        assert!(wildcard.matches_resource(Some("anything")));
        assert!(wildcard.matches_resource(None));
    }

    #[test]
    fn test_role_lists_ignore_empty() {
        let r = rule(json!({ "allowedRoles": [], "deniedRoles": ["guest"] }));
        assert!(r.allowed_roles().is_none());
        assert_eq!(r.denied_roles(), Some(vec!["guest"]));
    }

    #[test]
    fn test_mask_fields() {
        let r = rule(json!({ "maskFields": ["instructorNotes", "salaryBand"] }));
        assert_eq!(r.mask_fields(), Some(vec!["instructorNotes", "salaryBand"]));
        assert!(rule(json!({})).mask_fields().is_none());
        assert!(rule(json!({ "maskFields": "notes" })).mask_fields().is_none());
    }
}
