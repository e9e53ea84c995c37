//! Policy evaluation engine.
//!
//! Three independent layer checks share one input ([`EvaluationContext`]) and
//! one output ([`LayerDecision`]):
//!
//! | Layer | No rules | Match condition |
//! |-------|----------|-----------------|
//! | RBAC | deny | `subject_id` is one of the user's roles |
//! | ABAC | allow | `conditions` match the user's attributes |
//! | Content permission | deny | `allowedRoles` / `deniedRoles` admit the user |
//!
//! Every layer additionally requires the rule's resource constraint to admit
//! the requested resource (`resource_id == None` is a wildcard).
//!
//! [`PolicyEvaluator::evaluate_policies`] runs the layers in the fixed order
//! RBAC, ABAC, content permission and stops at the first denial. Layers that
//! did not run are absent from [`EvaluationDetails`].
//!
//! Store failures never escape: a layer that cannot load its rules denies with
//! an "evaluation error" reason.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Value, json};

use crate::audit::{AuditDecision, AuditRecord, AuditRecorder};
use crate::config::AccessControlConfig;
use crate::policy::condition::matches_conditions;
use crate::policy::context::EvaluationContext;
use crate::policy::masking::mask_with_rule;
use crate::policy::rule::{AccessControlRule, RuleType};
use crate::storage::{RuleQuery, RuleStorage};

// =============================================================================
// Decisions
// =============================================================================

/// One evaluation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyLayer {
    Rbac,
    Abac,
    Content,
}

impl PolicyLayer {
    /// Evaluation order of the composite check.
    pub const CASCADE: [PolicyLayer; 3] = [Self::Rbac, Self::Abac, Self::Content];

    /// Rule type the layer reads.
    #[must_use]
    pub fn rule_type(&self) -> RuleType {
        match self {
            Self::Rbac => RuleType::Rbac,
            Self::Abac => RuleType::Abac,
            Self::Content => RuleType::ContentPermission,
        }
    }

    fn no_match_reason(&self) -> &'static str {
        match self {
            Self::Rbac => "No RBAC rule matched the provided roles and resource.",
            Self::Abac => "ABAC conditions not met for provided attributes.",
            Self::Content => "No content permission rule allows access for the provided roles.",
        }
    }

    fn error_reason(&self) -> &'static str {
        match self {
            Self::Rbac => "RBAC evaluation error.",
            Self::Abac => "ABAC evaluation error.",
            Self::Content => "Content permission evaluation error.",
        }
    }
}

impl fmt::Display for PolicyLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rbac => write!(f, "rbac"),
            Self::Abac => write!(f, "abac"),
            Self::Content => write!(f, "content"),
        }
    }
}

/// Outcome of one layer check.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerDecision {
    /// Layer that produced the decision.
    pub layer: PolicyLayer,

    /// Whether the layer admits the request.
    pub allowed: bool,

    /// The rule that matched, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<AccessControlRule>,

    /// Why the layer decided as it did. Absent when a rule matched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Store error message when the rules could not be loaded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LayerDecision {
    fn matched(layer: PolicyLayer, rule: AccessControlRule) -> Self {
        Self {
            layer,
            allowed: true,
            rule: Some(rule),
            reason: None,
            error: None,
        }
    }

    fn vacuous(layer: PolicyLayer, reason: &str) -> Self {
        Self {
            layer,
            allowed: true,
            rule: None,
            reason: Some(reason.to_string()),
            error: None,
        }
    }

    fn denied(layer: PolicyLayer) -> Self {
        Self {
            layer,
            allowed: false,
            rule: None,
            reason: Some(layer.no_match_reason().to_string()),
            error: None,
        }
    }

    fn failed(layer: PolicyLayer, error: String) -> Self {
        Self {
            layer,
            allowed: false,
            rule: None,
            reason: Some(layer.error_reason().to_string()),
            error: Some(error),
        }
    }
}

/// Per-layer outcomes of a composite check.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EvaluationDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rbac: Option<LayerDecision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abac: Option<LayerDecision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<LayerDecision>,
}

impl EvaluationDetails {
    fn record(&mut self, decision: LayerDecision) {
        match decision.layer {
            PolicyLayer::Rbac => self.rbac = Some(decision),
            PolicyLayer::Abac => self.abac = Some(decision),
            PolicyLayer::Content => self.content = Some(decision),
        }
    }

    /// The content-permission rule that admitted the request, if that layer ran.
    #[must_use]
    pub fn content_rule(&self) -> Option<&AccessControlRule> {
        self.content.as_ref()?.rule.as_ref()
    }

    /// Number of layers that ran.
    #[must_use]
    pub fn layers_run(&self) -> usize {
        [&self.rbac, &self.abac, &self.content]
            .iter()
            .filter(|d| d.is_some())
            .count()
    }
}

/// Outcome of the composite check.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyEvaluation {
    /// Final decision.
    pub allowed: bool,

    /// Reason of the first denying layer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Layer that denied the request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub denied_by: Option<PolicyLayer>,

    /// Outcomes of the layers that ran.
    pub details: EvaluationDetails,
}

// =============================================================================
// Evaluator
// =============================================================================

/// Evaluates access requests against the rules in a [`RuleStorage`].
#[derive(Clone)]
pub struct PolicyEvaluator {
    storage: Arc<dyn RuleStorage>,
    audit: AuditRecorder,
    config: AccessControlConfig,
}

impl fmt::Debug for PolicyEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyEvaluator")
            .field("audit", &self.audit)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PolicyEvaluator {
    /// Create an evaluator with auditing disabled and default configuration.
    #[must_use]
    pub fn new(storage: Arc<dyn RuleStorage>) -> Self {
        Self {
            storage,
            audit: AuditRecorder::disabled(),
            config: AccessControlConfig::default(),
        }
    }

    /// Set the audit recorder.
    #[must_use]
    pub fn with_audit(mut self, audit: AuditRecorder) -> Self {
        self.audit = audit;
        self
    }

    /// Set the configuration.
    #[must_use]
    pub fn with_config(mut self, config: AccessControlConfig) -> Self {
        self.config = config;
        self
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &AccessControlConfig {
        &self.config
    }

    /// Role-based check.
    pub async fn check_rbac(&self, ctx: &EvaluationContext) -> LayerDecision {
        self.check_layer(PolicyLayer::Rbac, ctx).await
    }

    /// Attribute-based check.
    pub async fn check_abac(&self, ctx: &EvaluationContext) -> LayerDecision {
        self.check_layer(PolicyLayer::Abac, ctx).await
    }

    /// Per-resource content-permission check.
    pub async fn check_content_permissions(&self, ctx: &EvaluationContext) -> LayerDecision {
        self.check_layer(PolicyLayer::Content, ctx).await
    }

    /// Run RBAC, ABAC, and content permission in order, stopping at the first
    /// denial.
    pub async fn evaluate_policies(&self, ctx: &EvaluationContext) -> PolicyEvaluation {
        let mut details = EvaluationDetails::default();

        for layer in PolicyLayer::CASCADE {
            let decision = self.check_layer(layer, ctx).await;
            let allowed = decision.allowed;
            let reason = decision.reason.clone();
            details.record(decision);

            if !allowed {
                tracing::debug!(
                    tenant_id = %ctx.tenant_id,
                    resource_type = %ctx.resource_type,
                    resource_id = ctx.resource_id().unwrap_or("-"),
                    permission = %ctx.permission,
                    layer = %layer,
                    "Access denied"
                );
                return PolicyEvaluation {
                    allowed: false,
                    reason,
                    denied_by: Some(layer),
                    details,
                };
            }
        }

        PolicyEvaluation {
            allowed: true,
            reason: None,
            denied_by: None,
            details,
        }
    }

    /// Evaluate the policies for `ctx` and record the decision on behalf of
    /// `user_id`.
    ///
    /// The audit metadata carries the denial reason, the denying layer, and
    /// the subject's roles.
    pub async fn check_access(&self, ctx: &EvaluationContext, user_id: Option<&str>) -> PolicyEvaluation {
        let evaluation = self.evaluate_policies(ctx).await;

        let decision = AuditDecision::from(evaluation.allowed);
        if self.audit.should_record(decision) {
            let metadata = json!({
                "reason": evaluation.reason,
                "deniedBy": evaluation.denied_by,
                "roles": ctx.user_roles,
            });
            self.log_access_attempt(AuditRecord::new(
                ctx.tenant_id.clone(),
                user_id.map(String::from),
                ctx.permission.clone(),
                ctx.resource_type.clone(),
                ctx.resource_id.clone(),
                decision,
                metadata,
            ))
            .await;
        }

        evaluation
    }

    /// Mask `data` with the `maskFields` of the content-permission rule that
    /// admits `ctx`.
    ///
    /// Returns an unchanged copy when no rule admits the request or the rule
    /// lists no fields.
    pub async fn apply_field_masking(&self, ctx: &EvaluationContext, data: &Value) -> Value {
        if !data.is_object() {
            return data.clone();
        }
        let decision = self.check_content_permissions(ctx).await;
        mask_with_rule(data, decision.rule.as_ref(), &self.config.mask_placeholder)
    }

    /// Record an access attempt. Never fails.
    pub async fn log_access_attempt(&self, record: AuditRecord) {
        self.audit.record(record).await;
    }

    async fn check_layer(&self, layer: PolicyLayer, ctx: &EvaluationContext) -> LayerDecision {
        let query = RuleQuery::new(
            &ctx.tenant_id,
            layer.rule_type(),
            &ctx.resource_type,
            &ctx.permission,
        );

        let rules = match self.storage.find_active_rules(&query).await {
            Ok(rules) => rules,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    tenant_id = %ctx.tenant_id,
                    resource_type = %ctx.resource_type,
                    resource_id = ctx.resource_id().unwrap_or("-"),
                    permission = %ctx.permission,
                    layer = %layer,
                    "Policy evaluation failed"
                );
                return LayerDecision::failed(layer, e.to_string());
            }
        };

        if layer == PolicyLayer::Abac && rules.is_empty() {
            return LayerDecision::vacuous(layer, "No ABAC rules defined for resource.");
        }

        let matched = rules
            .into_iter()
            .find(|rule| rule.matches_resource(ctx.resource_id()) && rule_admits(layer, rule, ctx));

        let decision = match matched {
            Some(rule) => LayerDecision::matched(layer, rule),
            None => LayerDecision::denied(layer),
        };

        tracing::trace!(
            layer = %layer,
            allowed = decision.allowed,
            rule_id = decision.rule.as_ref().map_or("-", |r| r.id.as_str()),
            "Layer evaluated"
        );
        decision
    }
}

/// Layer-specific match test, applied after the resource constraint.
fn rule_admits(layer: PolicyLayer, rule: &AccessControlRule, ctx: &EvaluationContext) -> bool {
    match layer {
        PolicyLayer::Rbac => ctx.has_role(&rule.subject_id),
        PolicyLayer::Abac => matches_conditions(&ctx.attributes, &rule.conditions),
        PolicyLayer::Content => {
            if let Some(allowed) = rule.allowed_roles() {
                ctx.has_any_role(allowed)
            } else if let Some(denied) = rule.denied_roles() {
                !ctx.has_any_role(denied)
            } else {
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AuthResult;
    use crate::error::AuthError;
    use crate::storage::MemoryRuleStorage;
    use async_trait::async_trait;
    use serde_json::json;

    fn rule(
        id: &str,
        rule_type: RuleType,
        subject_id: &str,
        resource_id: Option<&str>,
        conditions: Value,
    ) -> AccessControlRule {
        AccessControlRule {
            id: id.into(),
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

    fn ctx(roles: &[&str], resource_id: Option<&str>) -> EvaluationContext {
        EvaluationContext::builder("tenant-123", "course", "read")
            .roles(roles.iter().copied())
            .maybe_resource_id(resource_id.map(String::from))
            .build()
            .unwrap()
    }

    fn evaluator(rules: Vec<AccessControlRule>) -> PolicyEvaluator {
        PolicyEvaluator::new(Arc::new(MemoryRuleStorage::with_rules(rules)))
    }

    struct BrokenStorage;

    #[async_trait]
    impl RuleStorage for BrokenStorage {
        async fn find_active_rules(
            &self,
            _query: &RuleQuery<'_>,
        ) -> AuthResult<Vec<AccessControlRule>> {
            Err(AuthError::storage("connection refused"))
        }
    }

    // -------------------------------------------------------------------------
    // Layer checks
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_rbac_requires_role_and_resource() {
        let eval = evaluator(vec![
            rule("r1", RuleType::Rbac, "trainer", Some("course-1"), json!({})),
        ]);

        assert!(eval.check_rbac(&ctx(&["trainer"], Some("course-1"))).await.allowed);

        let decision = eval.check_rbac(&ctx(&["trainer"], Some("course-2"))).await;
        assert!(!decision.allowed);
        assert_eq!(
            decision.reason.as_deref(),
            Some("No RBAC rule matched the provided roles and resource.")
        );

        assert!(!eval.check_rbac(&ctx(&["learner"], Some("course-1"))).await.allowed);
    }

    #[tokio::test]
    async fn test_rbac_specific_rule_does_not_match_missing_resource() {
        let eval = evaluator(vec![
            rule("r1", RuleType::Rbac, "trainer", Some("course-1"), json!({})),
        ]);
        assert!(!eval.check_rbac(&ctx(&["trainer"], None)).await.allowed);
    }

    #[tokio::test]
    async fn test_abac_open_default_reason() {
        let decision = evaluator(vec![]).check_abac(&ctx(&[], None)).await;
        assert!(decision.allowed);
        assert!(decision.rule.is_none());
        assert_eq!(
            decision.reason.as_deref(),
            Some("No ABAC rules defined for resource.")
        );
    }

    #[tokio::test]
    async fn test_abac_existing_rules_for_other_resource_deny() {
        let eval = evaluator(vec![rule(
            "a1",
            RuleType::Abac,
            "department",
            Some("course-1"),
            json!({}),
        )]);
        let decision = eval.check_abac(&ctx(&[], Some("course-2"))).await;
        assert!(!decision.allowed);
        assert_eq!(
            decision.reason.as_deref(),
            Some("ABAC conditions not met for provided attributes.")
        );
    }

    #[tokio::test]
    async fn test_content_role_lists() {
        let eval = evaluator(vec![
            rule(
                "c1",
                RuleType::ContentPermission,
                "-",
                Some("allow-list"),
                json!({ "allowedRoles": ["admin"] }),
            ),
            rule(
                "c2",
                RuleType::ContentPermission,
                "-",
                Some("deny-list"),
                json!({ "deniedRoles": ["contractor"] }),
            ),
            rule(
                "c3",
                RuleType::ContentPermission,
                "-",
                Some("both"),
                json!({ "allowedRoles": ["admin"], "deniedRoles": ["admin"] }),
            ),
            rule(
                "c4",
                RuleType::ContentPermission,
                "-",
                Some("open"),
                json!({ "allowedRoles": [] }),
            ),
        ]);

        assert!(!eval.check_content_permissions(&ctx(&["trainer"], Some("allow-list"))).await.allowed);
        assert!(eval.check_content_permissions(&ctx(&["admin"], Some("allow-list"))).await.allowed);
        assert!(eval.check_content_permissions(&ctx(&["trainer"], Some("deny-list"))).await.allowed);
        assert!(!eval.check_content_permissions(&ctx(&["contractor"], Some("deny-list"))).await.allowed);
        // allowedRoles takes precedence over deniedRoles
        assert!(eval.check_content_permissions(&ctx(&["admin"], Some("both"))).await.allowed);
        assert!(eval.check_content_permissions(&ctx(&[], Some("open"))).await.allowed);
    }

    #[tokio::test]
    async fn test_store_error_fails_closed() {
        let eval = PolicyEvaluator::new(Arc::new(BrokenStorage));

        let rbac = eval.check_rbac(&ctx(&["trainer"], None)).await;
        assert!(!rbac.allowed);
        assert_eq!(rbac.reason.as_deref(), Some("RBAC evaluation error."));
        assert!(rbac.error.unwrap().contains("connection refused"));

        let abac = eval.check_abac(&ctx(&[], None)).await;
        assert!(!abac.allowed);
        assert_eq!(abac.reason.as_deref(), Some("ABAC evaluation error."));

        let content = eval.check_content_permissions(&ctx(&[], None)).await;
        assert_eq!(
            content.reason.as_deref(),
            Some("Content permission evaluation error.")
        );
    }

    // -------------------------------------------------------------------------
    // Composite
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_composite_reports_first_failure() {
        let eval = evaluator(vec![
            rule("r1", RuleType::Rbac, "trainer", None, json!({})),
            rule(
                "a1",
                RuleType::Abac,
                "department",
                None,
                json!({ "department": ["Engineering"] }),
            ),
        ]);

        let result = eval.evaluate_policies(&ctx(&["trainer"], Some("c1"))).await;
        assert!(!result.allowed);
        assert_eq!(result.denied_by, Some(PolicyLayer::Abac));
        assert_eq!(result.details.layers_run(), 2);
        assert!(result.details.content.is_none());
    }

    #[tokio::test]
    async fn test_composite_serialization_omits_unrun_layers() {
        let result = evaluator(vec![])
            .evaluate_policies(&ctx(&["trainer"], None))
            .await;
        let value = serde_json::to_value(&result).unwrap();

        assert_eq!(value["allowed"], json!(false));
        assert_eq!(value["deniedBy"], json!("rbac"));
        assert!(value["details"].get("abac").is_none());
        assert_eq!(value["details"]["rbac"]["layer"], json!("rbac"));
    }

    #[tokio::test]
    async fn test_apply_field_masking_without_matching_rule() {
        let eval = evaluator(vec![]);
        let data = json!({ "title": "Intro", "instructorNotes": "x" });
        let masked = eval.apply_field_masking(&ctx(&["trainer"], Some("c1")), &data).await;
        assert_eq!(masked, data);
    }
}
