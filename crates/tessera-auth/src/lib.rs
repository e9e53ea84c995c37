//! # tessera-auth
//!
//! Multi-layer access control for Tessera content.
//!
//! This crate provides:
//! - Tenant-scoped access control rules (RBAC, ABAC, content permission)
//! - A cascading policy evaluator that fails closed on store errors
//! - Field masking driven by content-permission rules
//! - A batch filter that returns only the content a subject may see
//! - Best-effort audit recording of every access decision
//!
//! ## Modules
//!
//! - [`config`] - Access control configuration
//! - [`policy`] - Rule model, condition matcher, evaluator, masking, filter
//! - [`audit`] - Audit records, sinks, and the recorder
//! - [`storage`] - Rule storage trait and in-memory implementation
//! - [`error`] - Error types

pub mod audit;
pub mod config;
pub mod error;
pub mod policy;
pub mod storage;

pub use audit::{AuditDecision, AuditRecord, AuditRecorder, AuditSink, MemoryAuditSink, TracingAuditSink};
pub use config::{AccessControlConfig, AuditConfig, AuditMode, ConfigError, FilterConfig};
pub use error::{AuthError, ErrorCategory};
pub use policy::{
    AccessControlRule, AccessibleContentRequest, Attributes, ContentItem, EvaluationContext,
    EvaluationDetails, LayerDecision, PolicyEvaluation, PolicyEvaluator, PolicyLayer, RuleType,
};
pub use storage::{MemoryRuleStorage, RuleQuery, RuleStorage};

/// Type alias for access control results.
pub type AuthResult<T> = Result<T, AuthError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use tessera_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthResult;
    pub use crate::audit::{AuditDecision, AuditRecord, AuditRecorder, AuditSink};
    pub use crate::config::{AccessControlConfig, AuditMode};
    pub use crate::error::{AuthError, ErrorCategory};
    pub use crate::policy::{
        AccessControlRule, AccessibleContentRequest, Attributes, ContentItem,
        EvaluationContext, PolicyEvaluation, PolicyEvaluator, PolicyLayer, RuleType,
    };
    pub use crate::storage::{MemoryRuleStorage, RuleQuery, RuleStorage};
}
