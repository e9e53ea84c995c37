//! Content accessibility filter.
//!
//! Runs the composite policy check over a batch of candidate items, drops the
//! denied ones, and masks the rest with the content-permission rule that
//! admitted them. Each item is evaluated independently. An item whose
//! evaluation fails is dropped, never the batch.

use std::collections::BTreeSet;

use futures_util::StreamExt;
use futures_util::stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::AuthResult;
use crate::policy::context::{Attributes, EvaluationContext};
use crate::policy::engine::PolicyEvaluator;
use crate::policy::masking::mask_with_rule;

/// A candidate item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    /// Resource category. Items in one batch may differ.
    pub resource_type: String,

    /// Specific resource.
    #[serde(default)]
    pub resource_id: Option<String>,

    /// Subject attributes evaluated against ABAC rules for this item.
    #[serde(default)]
    pub attributes: Attributes,

    /// Payload returned to the caller, masked if required.
    #[serde(default)]
    pub data: Value,
}

/// Input of [`PolicyEvaluator::get_accessible_content`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessibleContentRequest {
    pub tenant_id: String,

    /// Recorded in the audit trail only.
    #[serde(default)]
    pub user_id: Option<String>,

    #[serde(default)]
    pub user_roles: BTreeSet<String>,

    /// Falls back to the configured default permission.
    #[serde(default)]
    pub permission: Option<String>,

    #[serde(default)]
    pub items: Vec<ContentItem>,
}

impl PolicyEvaluator {
    /// Return the items the subject may access, masked, in input order.
    ///
    /// The output is never longer than `request.items`.
    pub async fn get_accessible_content(&self, request: AccessibleContentRequest) -> Vec<ContentItem> {
        let AccessibleContentRequest {
            tenant_id,
            user_id,
            user_roles,
            permission,
            items,
        } = request;

        let permission = permission.unwrap_or_else(|| self.config().default_permission.clone());
        let subject = Subject {
            tenant_id: &tenant_id,
            user_id: user_id.as_deref(),
            user_roles: &user_roles,
            permission: &permission,
        };
        let concurrency = self.config().filter.max_concurrency.max(1);

        stream::iter(items)
            .map(|item| self.filter_item(&subject, item))
            .buffered(concurrency)
            .filter_map(|item| async move { item })
            .collect()
            .await
    }

    async fn filter_item(&self, subject: &Subject<'_>, item: ContentItem) -> Option<ContentItem> {
        let ctx = match subject.context_for(&item) {
            Ok(ctx) => ctx,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    tenant_id = %subject.tenant_id,
                    resource_id = item.resource_id.as_deref().unwrap_or("-"),
                    "Failed to evaluate content access"
                );
                return None;
            }
        };

        let evaluation = self.check_access(&ctx, subject.user_id).await;

        if !evaluation.allowed {
            tracing::info!(
                tenant_id = %ctx.tenant_id,
                resource_type = %ctx.resource_type,
                resource_id = ctx.resource_id().unwrap_or("-"),
                reason = evaluation.reason.as_deref().unwrap_or("-"),
                "Content filtered due to access control"
            );
            return None;
        }

        let data = mask_with_rule(
            &item.data,
            evaluation.details.content_rule(),
            &self.config().mask_placeholder,
        );
        Some(ContentItem { data, ..item })
    }
}

/// The request-wide part of every item's evaluation context.
struct Subject<'a> {
    tenant_id: &'a str,
    user_id: Option<&'a str>,
    user_roles: &'a BTreeSet<String>,
    permission: &'a str,
}

impl Subject<'_> {
    fn context_for(&self, item: &ContentItem) -> AuthResult<EvaluationContext> {
        EvaluationContext::builder(self.tenant_id, item.resource_type.as_str(), self.permission)
            .roles(self.user_roles.iter().cloned())
            .attributes(item.attributes.clone())
            .maybe_resource_id(item.resource_id.clone())
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::rule::{AccessControlRule, RuleType};
    use crate::storage::MemoryRuleStorage;
    use serde_json::json;
    use std::sync::Arc;

    fn rule(rule_type: RuleType, subject_id: &str, resource_id: Option<&str>, conditions: Value) -> AccessControlRule {
        AccessControlRule {
            id: format!("{rule_type}-{subject_id}-{}", resource_id.unwrap_or("*")),
            tenant_id: "tenant-123".into(),
            rule_type,
            subject_type: "role".into(),
            subject_id: subject_id.into(),
            resource_type: "course".into(),
            resource_id: resource_id.map(String::from),
            permission: "read".into(),
            conditions,
            is_active: true,
        }
    }

    fn item(resource_type: &str, resource_id: &str) -> ContentItem {
        ContentItem {
            resource_type: resource_type.into(),
            resource_id: Some(resource_id.into()),
            attributes: Attributes::new(),
            data: json!({ "id": resource_id, "instructorNotes": "secret" }),
        }
    }

    fn request(items: Vec<ContentItem>) -> AccessibleContentRequest {
        AccessibleContentRequest {
            tenant_id: "tenant-123".into(),
            user_id: Some("user-1".into()),
            user_roles: BTreeSet::from(["trainer".to_string()]),
            permission: None,
            items,
        }
    }

    fn evaluator() -> PolicyEvaluator {
        PolicyEvaluator::new(Arc::new(MemoryRuleStorage::with_rules(vec![
            rule(RuleType::Rbac, "trainer", None, json!({})),
            rule(
                RuleType::ContentPermission,
                "trainer",
                Some("c1"),
                json!({ "maskFields": ["instructorNotes"] }),
            ),
            rule(RuleType::ContentPermission, "trainer", Some("c3"), json!({})),
        ])))
    }

    #[tokio::test]
    async fn test_drops_denied_and_masks_allowed() {
        let out = evaluator()
            .get_accessible_content(request(vec![item("course", "c1"), item("course", "c2"), item("course", "c3")]))
            .await;

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].data["instructorNotes"], json!("[REDACTED]"));
        assert_eq!(out[1].resource_id.as_deref(), Some("c3"));
        assert_eq!(out[1].data["instructorNotes"], json!("secret"));
    }

    #[tokio::test]
    async fn test_invalid_item_is_dropped_not_fatal() {
        let out = evaluator()
            .get_accessible_content(request(vec![item("", "c1"), item("course", "c3")]))
            .await;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].resource_id.as_deref(), Some("c3"));
    }

    #[tokio::test]
    async fn test_concurrent_evaluation_preserves_order() {
        let mut config = crate::config::AccessControlConfig::default();
        config.filter.max_concurrency = 8;
        let eval = evaluator().with_config(config);

        let items: Vec<_> = (0..20)
            .map(|i| item("course", if i % 2 == 0 { "c1" } else { "c3" }))
            .collect();
        let out = eval.get_accessible_content(request(items)).await;

        assert_eq!(out.len(), 20);
        for (i, it) in out.iter().enumerate() {
            let expected = if i % 2 == 0 { "c1" } else { "c3" };
            assert_eq!(it.resource_id.as_deref(), Some(expected));
        }
    }

    #[tokio::test]
    async fn test_empty_batch() {
        assert!(evaluator().get_accessible_content(request(vec![])).await.is_empty());
    }

    #[test]
    fn test_request_deserializes_reference_shape() {
        let request: AccessibleContentRequest = serde_json::from_value(json!({
            "tenantId": "tenant-123",
            "userRoles": ["trainer"],
            "items": [{ "resourceType": "course", "resourceId": "c1", "data": { "title": "x" } }]
        }))
        .unwrap();
        assert!(request.permission.is_none());
        assert_eq!(request.items[0].attributes.len(), 0);
    }
}
