//! PostgreSQL storage backend for Tessera access control.
//!
//! Provides persistent storage for:
//!
//! - Access control rules (`access_control_rule` table)
//! - Access decision audit records (`audit_log` table)
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tessera_auth::PolicyEvaluator;
//! use tessera_auth_postgres::PostgresAccessStorage;
//!
//! let storage = PostgresAccessStorage::connect("postgres://localhost/tessera").await?;
//! storage.ensure_schema().await?;
//!
//! let evaluator = PolicyEvaluator::new(Arc::new(storage.rules()));
//! ```

pub mod audit;
pub mod rule;

use std::sync::Arc;

use sqlx_core::pool::Pool;
use sqlx_core::query::query;
use sqlx_postgres::Postgres;
use tessera_auth::AuthError;

pub use audit::PostgresAuditSink;
pub use rule::{PostgresRuleStorage, RuleRow};

/// PostgreSQL connection pool type alias.
pub type PgPool = Pool<Postgres>;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx_core::Error),

    /// Serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored row does not describe a valid record.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl StorageError {
    /// Create an `InvalidInput` error.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Returns `true` if this is a database error.
    #[must_use]
    pub fn is_database_error(&self) -> bool {
        matches!(self, Self::Database(_))
    }

    /// Returns `true` if this is an invalid input error.
    #[must_use]
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }
}

impl From<StorageError> for AuthError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::InvalidInput(message) => AuthError::invalid_rule(message),
            other => AuthError::storage(other.to_string()),
        }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

// =============================================================================
// Schema
// =============================================================================

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS access_control_rule (
        id            TEXT PRIMARY KEY,
        tenant_id     TEXT NOT NULL,
        rule_type     TEXT NOT NULL,
        subject_type  TEXT NOT NULL,
        subject_id    TEXT NOT NULL,
        resource_type TEXT NOT NULL,
        resource_id   TEXT NULL,
        permission    TEXT NOT NULL,
        conditions    JSONB NOT NULL DEFAULT '{}'::jsonb,
        is_active     BOOLEAN NOT NULL DEFAULT TRUE,
        created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS access_control_rule_lookup_idx
        ON access_control_rule (tenant_id, rule_type, resource_type, permission)
        WHERE is_active
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS audit_log (
        id            UUID PRIMARY KEY,
        tenant_id     TEXT NOT NULL,
        user_id       TEXT NULL,
        action        TEXT NOT NULL,
        resource_type TEXT NOT NULL,
        resource_id   TEXT NULL,
        details       JSONB NOT NULL,
        created_at    TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS audit_log_tenant_idx
        ON audit_log (tenant_id, created_at)
    "#,
];

// =============================================================================
// PostgreSQL Access Storage
// =============================================================================

/// PostgreSQL storage backend for access control data.
#[derive(Debug, Clone)]
pub struct PostgresAccessStorage {
    pool: Arc<PgPool>,
}

impl PostgresAccessStorage {
    /// Create new storage with an existing connection pool.
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Create new storage by connecting to the database.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails.
    pub async fn connect(database_url: &str) -> StorageResult<Self> {
        use sqlx_core::pool::PoolOptions;
        let pool = PoolOptions::<Postgres>::new().connect(database_url).await?;
        Ok(Self::new(Arc::new(pool)))
    }

    /// Create the tables and indexes if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if a DDL statement fails.
    pub async fn ensure_schema(&self) -> StorageResult<()> {
        for statement in SCHEMA {
            query(statement).execute(self.pool.as_ref()).await?;
        }
        tracing::info!("Access control schema ready");
        Ok(())
    }

    /// Get a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Rule storage sharing this pool.
    #[must_use]
    pub fn rules(&self) -> PostgresRuleStorage {
        PostgresRuleStorage::new(Arc::clone(&self.pool))
    }

    /// Audit sink sharing this pool.
    #[must_use]
    pub fn audit(&self) -> PostgresAuditSink {
        PostgresAuditSink::new(Arc::clone(&self.pool))
    }
}

// =============================================================================
// Tests
// =============================================================================
