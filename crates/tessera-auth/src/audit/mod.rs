//! Access decision audit recording.
//!
//! Every access check made by the content accessibility filter produces one
//! [`AuditRecord`]. Records are append-only and written through an
//! [`AuditSink`]. The [`AuditRecorder`] sits between the engine and the sink
//! and guarantees that audit failures never reach the caller of the check:
//! in [`AuditMode::Background`] the write is spawned and forgotten, in
//! [`AuditMode::Inline`] it is awaited, and in both modes errors are logged.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::AuthResult;
use crate::config::{AuditConfig, AuditMode};

// =============================================================================
// Audit Record
// =============================================================================

/// Outcome of an access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditDecision {
    Allow,
    Deny,
}

impl AuditDecision {
    /// Wire representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "ALLOW",
            Self::Deny => "DENY",
        }
    }
}

impl fmt::Display for AuditDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<bool> for AuditDecision {
    fn from(allowed: bool) -> Self {
        if allowed { Self::Allow } else { Self::Deny }
    }
}

/// One access decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    /// Record identifier.
    pub id: Uuid,
    /// Tenant the check ran against.
    pub tenant_id: String,
    /// Subject, if known.
    pub user_id: Option<String>,
    /// Action that was checked.
    pub action: String,
    /// Resource category.
    pub resource_type: String,
    /// Specific resource.
    pub resource_id: Option<String>,
    /// Allow or deny.
    pub decision: AuditDecision,
    /// Free-form context (reason, failing layer).
    pub metadata: Value,
    /// When the decision was made.
    #[serde(with = "time::serde::rfc3339")]
    pub recorded_at: OffsetDateTime,
}

impl AuditRecord {
    /// Create a record stamped with a fresh id and the current time.
    #[must_use]
    pub fn new(
        tenant_id: impl Into<String>,
        user_id: Option<String>,
        action: impl Into<String>,
        resource_type: impl Into<String>,
        resource_id: Option<String>,
        decision: AuditDecision,
        metadata: Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id: tenant_id.into(),
            user_id,
            action: action.into(),
            resource_type: resource_type.into(),
            resource_id,
            decision,
            metadata,
            recorded_at: OffsetDateTime::now_utc(),
        }
    }
}

// =============================================================================
// Audit Sink
// =============================================================================

/// Append-only destination for audit records.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Persist one record.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails. The recorder logs and discards it.
    async fn record(&self, record: &AuditRecord) -> AuthResult<()>;
}

/// Sink that keeps records in memory.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the records written so far.
    #[must_use]
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, record: &AuditRecord) -> AuthResult<()> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(())
    }
}

/// Sink that writes each record as a structured log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, record: &AuditRecord) -> AuthResult<()> {
        tracing::info!(
            target: "tessera::audit",
            audit_id = %record.id,
            tenant_id = %record.tenant_id,
            user_id = record.user_id.as_deref().unwrap_or("-"),
            action = %record.action,
            resource_type = %record.resource_type,
            resource_id = record.resource_id.as_deref().unwrap_or("-"),
            decision = %record.decision,
            "Access decision"
        );
        Ok(())
    }
}

// =============================================================================
// Audit Recorder
// =============================================================================

/// Dispatches audit records to a sink without ever failing the caller.
#[derive(Clone)]
pub struct AuditRecorder {
    sink: Option<Arc<dyn AuditSink>>,
    config: AuditConfig,
}

impl fmt::Debug for AuditRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditRecorder")
            .field("has_sink", &self.sink.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl AuditRecorder {
    /// Create a recorder writing to `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn AuditSink>, config: AuditConfig) -> Self {
        Self {
            sink: Some(sink),
            config,
        }
    }

    /// A recorder that drops every record.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            sink: None,
            config: AuditConfig {
                enabled: false,
                ..AuditConfig::default()
            },
        }
    }

    /// Returns `true` if records will be written.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.config.enabled && self.sink.is_some()
    }

    /// Returns `true` if a decision of this kind should be recorded.
    #[must_use]
    pub fn should_record(&self, decision: AuditDecision) -> bool {
        if !self.is_enabled() {
            return false;
        }
        match decision {
            AuditDecision::Allow => self.config.log_allowed,
            AuditDecision::Deny => self.config.log_denied,
        }
    }

    /// Record a decision. Never fails.
    pub async fn record(&self, record: AuditRecord) {
        if !self.should_record(record.decision) {
            return;
        }
        let Some(sink) = self.sink.clone() else {
            return;
        };

        match self.config.mode {
            AuditMode::Inline => write_record(sink.as_ref(), &record).await,
            AuditMode::Background => {
                tokio::spawn(async move {
                    write_record(sink.as_ref(), &record).await;
                });
            }
        }
    }
}

async fn write_record(sink: &dyn AuditSink, record: &AuditRecord) {
    if let Err(e) = sink.record(record).await {
        tracing::error!(
            error = %e,
            tenant_id = %record.tenant_id,
            resource_type = %record.resource_type,
            resource_id = record.resource_id.as_deref().unwrap_or("-"),
            "Failed to log access attempt"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthError;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingSink {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AuditSink for FailingSink {
        async fn record(&self, _record: &AuditRecord) -> AuthResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(AuthError::storage("audit store unavailable"))
        }
    }

    fn record(decision: AuditDecision) -> AuditRecord {
        AuditRecord::new(
            "tenant-123",
            Some("user-1".into()),
            "read",
            "course",
            Some("course-advanced-js".into()),
            decision,
            json!({ "reason": "test" }),
        )
    }

    fn inline() -> AuditConfig {
        AuditConfig {
            mode: AuditMode::Inline,
            ..AuditConfig::default()
        }
    }

    #[test]
    fn test_decision_wire_format() {
        assert_eq!(serde_json::to_value(AuditDecision::Allow).unwrap(), json!("ALLOW"));
        assert_eq!(AuditDecision::from(false), AuditDecision::Deny);
    }

    #[tokio::test]
    async fn test_inline_recorder_writes() {
        let sink = Arc::new(MemoryAuditSink::new());
        let recorder = AuditRecorder::new(sink.clone(), inline());

        recorder.record(record(AuditDecision::Allow)).await;
        recorder.record(record(AuditDecision::Deny)).await;

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].decision, AuditDecision::Deny);
    }

    #[tokio::test]
    async fn test_failures_are_swallowed() {
        let sink = Arc::new(FailingSink {
            calls: AtomicUsize::new(0),
        });
        let recorder = AuditRecorder::new(sink.clone(), inline());

        recorder.record(record(AuditDecision::Allow)).await;
        assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_background_recorder_eventually_writes() {
        let sink = Arc::new(MemoryAuditSink::new());
        let recorder = AuditRecorder::new(sink.clone(), AuditConfig::default());

        recorder.record(record(AuditDecision::Allow)).await;

        for _ in 0..50 {
            if !sink.records().is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(sink.records().len(), 1);
    }

    #[tokio::test]
    async fn test_decision_filters() {
        let sink = Arc::new(MemoryAuditSink::new());
        let recorder = AuditRecorder::new(
            sink.clone(),
            AuditConfig {
                log_allowed: false,
                ..inline()
            },
        );

        recorder.record(record(AuditDecision::Allow)).await;
        recorder.record(record(AuditDecision::Deny)).await;
        assert_eq!(sink.records().len(), 1);
    }

    #[tokio::test]
    async fn test_memory_sink_survives_poisoned_lock() {
        let sink = Arc::new(MemoryAuditSink::new());
        sink.record(&record(AuditDecision::Allow)).await.unwrap();

        let holder = Arc::clone(&sink);
        let _ = std::thread::spawn(move || {
            let _guard = holder.records.lock().unwrap();
            panic!("writer crashed while holding the lock");
        })
        .join();
        assert!(sink.records.is_poisoned());

        sink.record(&record(AuditDecision::Deny)).await.unwrap();
        let decisions: Vec<_> = sink.records().iter().map(|r| r.decision).collect();
        assert_eq!(decisions, vec![AuditDecision::Allow, AuditDecision::Deny]);
    }

    #[tokio::test]
    async fn test_disabled_recorder() {
        let recorder = AuditRecorder::disabled();
        assert!(!recorder.is_enabled());
        recorder.record(record(AuditDecision::Allow)).await;
    }
}
