//! In-memory rule storage.
//!
//! Holds a rule set in process. Used by tests and by the CLI when rules are
//! loaded from a JSON document instead of a database.

use std::path::Path;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::AuthResult;
use crate::error::AuthError;
use crate::policy::rule::AccessControlRule;
use crate::storage::rule::{RuleQuery, RuleStorage};

/// Rule storage backed by a vector behind a read-write lock.
#[derive(Debug, Default)]
pub struct MemoryRuleStorage {
    rules: RwLock<Vec<AccessControlRule>>,
}

impl MemoryRuleStorage {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `rules`.
    #[must_use]
    pub fn with_rules(rules: Vec<AccessControlRule>) -> Self {
        Self {
            rules: RwLock::new(rules),
        }
    }

    /// Parse a JSON array of rules.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not an array of valid rules.
    pub fn from_json(document: &str) -> AuthResult<Self> {
        let rules: Vec<AccessControlRule> = serde_json::from_str(document)
            .map_err(|e| AuthError::invalid_rule(format!("failed to parse rules: {e}")))?;
        Ok(Self::with_rules(rules))
    }

    /// Load a JSON array of rules from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub async fn load(path: impl AsRef<Path>) -> AuthResult<Self> {
        let path = path.as_ref();
        let document = tokio::fs::read_to_string(path).await.map_err(|e| {
            AuthError::storage(format!("failed to read rules from {}: {e}", path.display()))
        })?;
        let storage = Self::from_json(&document)?;
        tracing::info!(
            path = %path.display(),
            rules = storage.len().await,
            "Loaded access control rules"
        );
        Ok(storage)
    }

    /// Add a rule.
    pub async fn insert(&self, rule: AccessControlRule) {
        self.rules.write().await.push(rule);
    }

    /// Number of stored rules, active or not.
    pub async fn len(&self) -> usize {
        self.rules.read().await.len()
    }

    /// Returns `true` if no rules are stored.
    pub async fn is_empty(&self) -> bool {
        self.rules.read().await.is_empty()
    }
}

#[async_trait]
impl RuleStorage for MemoryRuleStorage {
    async fn find_active_rules(&self, query: &RuleQuery<'_>) -> AuthResult<Vec<AccessControlRule>> {
        let rules = self.rules.read().await;
        Ok(rules.iter().filter(|r| query.admits(r)).cloned().collect())
    }
}
