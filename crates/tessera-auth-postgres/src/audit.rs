//! Audit log storage for PostgreSQL.
//!
//! Each access decision becomes one `audit_log` row. The decision and its
//! metadata are stored together in the JSONB `details` column as
//! `{"decision": "ALLOW" | "DENY", "metadata": {...}}`.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx_core::query::query;
use sqlx_core::query_scalar::query_scalar;
use tessera_auth::AuthResult;
use tessera_auth::audit::{AuditRecord, AuditSink};

use crate::{PgPool, StorageResult};

/// Append-only audit sink backed by the `audit_log` table.
#[derive(Debug, Clone)]
pub struct PostgresAuditSink {
    pool: Arc<PgPool>,
}

impl PostgresAuditSink {
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Insert one record. Re-inserting the same record id is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the database insert fails.
    pub async fn insert(&self, record: &AuditRecord) -> StorageResult<()> {
        query(
            r#"
            INSERT INTO audit_log
                (id, tenant_id, user_id, action, resource_type, resource_id, details, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(record.id)
        .bind(&record.tenant_id)
        .bind(&record.user_id)
        .bind(&record.action)
        .bind(&record.resource_type)
        .bind(&record.resource_id)
        .bind(details(record))
        .bind(record.recorded_at)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    /// Number of records for a tenant.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn count(&self, tenant_id: &str) -> StorageResult<i64> {
        let count: i64 = query_scalar("SELECT COUNT(*) FROM audit_log WHERE tenant_id = $1")
            .bind(tenant_id)
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(count)
    }
}

#[async_trait]
impl AuditSink for PostgresAuditSink {
    async fn record(&self, record: &AuditRecord) -> AuthResult<()> {
        Ok(self.insert(record).await?)
    }
}

fn details(record: &AuditRecord) -> serde_json::Value {
    serde_json::json!({
        "decision": record.decision,
        "metadata": record.metadata,
    })
}
