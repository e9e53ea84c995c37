//! Access control rule storage for PostgreSQL.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use tessera_auth::policy::{AccessControlRule, RuleType};
use tessera_auth::storage::{RuleQuery, RuleStorage};
use tessera_auth::AuthResult;

use crate::{PgPool, StorageError, StorageResult};

// =============================================================================
// Types
// =============================================================================

/// Raw `access_control_rule` row.
pub type RuleTuple = (
    String,
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    String,
    serde_json::Value,
    bool,
);

/// Rule record from the database.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleRow {
    pub id: String,
    pub tenant_id: String,
    pub rule_type: String,
    pub subject_type: String,
    pub subject_id: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub permission: String,
    pub conditions: serde_json::Value,
    pub is_active: bool,
}

impl RuleRow {
    /// Create from a database tuple.
    #[must_use]
    pub fn from_tuple(row: RuleTuple) -> Self {
        let (
            id,
            tenant_id,
            rule_type,
            subject_type,
            subject_id,
            resource_type,
            resource_id,
            permission,
            conditions,
            is_active,
        ) = row;
        Self {
            id,
            tenant_id,
            rule_type,
            subject_type,
            subject_id,
            resource_type,
            resource_id,
            permission,
            conditions,
            is_active,
        }
    }

    /// Convert to a domain rule.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored rule type is unknown.
    pub fn into_rule(self) -> StorageResult<AccessControlRule> {
        let rule_type: RuleType = self.rule_type.parse().map_err(|_| {
            StorageError::invalid_input(format!(
                "rule {} has unknown rule type '{}'",
                self.id, self.rule_type
            ))
        })?;

        let conditions = if self.conditions.is_null() {
            serde_json::json!({})
        } else {
            self.conditions
        };

        Ok(AccessControlRule {
            id: self.id,
            tenant_id: self.tenant_id,
            rule_type,
            subject_type: self.subject_type,
            subject_id: self.subject_id,
            resource_type: self.resource_type,
            resource_id: self.resource_id,
            permission: self.permission,
            conditions,
            is_active: self.is_active,
        })
    }
}

// =============================================================================
// Rule Storage
// =============================================================================

/// PostgreSQL-backed [`RuleStorage`].
#[derive(Debug, Clone)]
pub struct PostgresRuleStorage {
    pool: Arc<PgPool>,
}

impl PostgresRuleStorage {
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Fetch active rules for the query tuple.
    ///
    /// Rows with an unknown rule type are skipped with a warning so one bad
    /// row cannot block evaluation of the rest.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_active(&self, rule_query: &RuleQuery<'_>) -> StorageResult<Vec<AccessControlRule>> {
        let rows: Vec<RuleTuple> = query_as(
            r#"
            SELECT id, tenant_id, rule_type, subject_type, subject_id,
                   resource_type, resource_id, permission, conditions, is_active
            FROM access_control_rule
            WHERE tenant_id = $1
              AND rule_type = $2
              AND resource_type = $3
              AND permission = $4
              AND is_active = TRUE
            "#,
        )
        .bind(rule_query.tenant_id)
        .bind(rule_query.rule_type.as_str())
        .bind(rule_query.resource_type)
        .bind(rule_query.permission)
        .fetch_all(self.pool.as_ref())
        .await?;

        let mut rules = Vec::with_capacity(rows.len());
        for row in rows {
            match RuleRow::from_tuple(row).into_rule() {
                Ok(rule) => rules.push(rule),
                Err(e) => tracing::warn!(error = %e, "Skipping malformed access control rule"),
            }
        }
        Ok(rules)
    }

    /// Insert or replace a rule.
    ///
    /// # Errors
    ///
    /// Returns an error if the database write fails.
    pub async fn upsert(&self, rule: &AccessControlRule) -> StorageResult<()> {
        query(
            r#"
            INSERT INTO access_control_rule
                (id, tenant_id, rule_type, subject_type, subject_id,
                 resource_type, resource_id, permission, conditions, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO UPDATE SET
                tenant_id = EXCLUDED.tenant_id,
                rule_type = EXCLUDED.rule_type,
                subject_type = EXCLUDED.subject_type,
                subject_id = EXCLUDED.subject_id,
                resource_type = EXCLUDED.resource_type,
                resource_id = EXCLUDED.resource_id,
                permission = EXCLUDED.permission,
                conditions = EXCLUDED.conditions,
                is_active = EXCLUDED.is_active
            "#,
        )
        .bind(&rule.id)
        .bind(&rule.tenant_id)
        .bind(rule.rule_type.as_str())
        .bind(&rule.subject_type)
        .bind(&rule.subject_id)
        .bind(&rule.resource_type)
        .bind(&rule.resource_id)
        .bind(&rule.permission)
        .bind(&rule.conditions)
        .bind(rule.is_active)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    /// Mark a rule inactive.
    ///
    /// Returns `false` if no rule has this id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database write fails.
    pub async fn deactivate(&self, tenant_id: &str, id: &str) -> StorageResult<bool> {
        let result = query(
            r#"
            UPDATE access_control_rule
            SET is_active = FALSE
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl RuleStorage for PostgresRuleStorage {
    async fn find_active_rules(&self, rule_query: &RuleQuery<'_>) -> AuthResult<Vec<AccessControlRule>> {
        Ok(self.find_active(rule_query).await?)
    }
}

// =============================================================================
// Tests
// =============================================================================
