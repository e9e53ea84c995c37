//! Rule storage trait.
//!
//! Defines the query interface the policy engine uses to fetch active rules
//! for a tenant / rule type / resource type / permission tuple.

use async_trait::async_trait;

use crate::AuthResult;
use crate::policy::rule::{AccessControlRule, RuleType};

// =============================================================================
// Rule Query
// =============================================================================

/// The tuple every rule lookup is keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleQuery<'a> {
    /// Owning tenant.
    pub tenant_id: &'a str,
    /// Evaluation layer.
    pub rule_type: RuleType,
    /// Resource category.
    pub resource_type: &'a str,
    /// Requested action.
    pub permission: &'a str,
}

impl<'a> RuleQuery<'a> {
    /// Create a new query.
    #[must_use]
    pub fn new(
        tenant_id: &'a str,
        rule_type: RuleType,
        resource_type: &'a str,
        permission: &'a str,
    ) -> Self {
        Self {
            tenant_id,
            rule_type,
            resource_type,
            permission,
        }
    }

    /// Returns `true` if `rule` is an active rule answering this query.
    #[must_use]
    pub fn admits(&self, rule: &AccessControlRule) -> bool {
        rule.is_active
            && rule.tenant_id == self.tenant_id
            && rule.rule_type == self.rule_type
            && rule.resource_type == self.resource_type
            && rule.permission == self.permission
    }
}

// =============================================================================
// Rule Storage Trait
// =============================================================================

/// Read access to persisted access control rules.
///
/// # Example
///
/// ```ignore
/// use tessera_auth::storage::{RuleQuery, RuleStorage};
/// use tessera_auth::policy::RuleType;
///
/// async fn example(storage: &impl RuleStorage) {
///     let query = RuleQuery::new("tenant-123", RuleType::Rbac, "course", "read");
///     let rules = storage.find_active_rules(&query).await?;
///     for rule in rules {
///         println!("Rule: {} grants {}", rule.id, rule.subject_id);
///     }
/// }
/// ```
#[async_trait]
pub trait RuleStorage: Send + Sync {
    /// Find active rules for the query tuple.
    ///
    /// Implementations must only return rules where `is_active == true` and
    /// `tenant_id` equals the query tenant. Order carries no meaning.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_active_rules(&self, query: &RuleQuery<'_>) -> AuthResult<Vec<AccessControlRule>>;
}
