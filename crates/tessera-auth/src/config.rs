//! Access control configuration.
//!
//! # Example (TOML)
//!
//! ```toml
//! [access_control]
//! mask_placeholder = "[REDACTED]"
//! default_permission = "read"
//!
//! [access_control.audit]
//! enabled = true
//! mode = "background"
//!
//! [access_control.filter]
//! max_concurrency = 4
//! ```

use serde::{Deserialize, Serialize};

/// Placeholder substituted for masked field values.
pub const DEFAULT_MASK_PLACEHOLDER: &str = "[REDACTED]";

/// Root access control configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AccessControlConfig {
    /// Value written into masked fields.
    pub mask_placeholder: String,

    /// Permission used when a request does not name one.
    pub default_permission: String,

    /// Audit recording.
    pub audit: AuditConfig,

    /// Content accessibility filter.
    pub filter: FilterConfig,
}

impl Default for AccessControlConfig {
    fn default() -> Self {
        Self {
            mask_placeholder: DEFAULT_MASK_PLACEHOLDER.to_string(),
            default_permission: "read".to_string(),
            audit: AuditConfig::default(),
            filter: FilterConfig::default(),
        }
    }
}

impl AccessControlConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] describing the first invalid setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mask_placeholder.is_empty() {
            return Err(ConfigError::invalid("mask_placeholder must not be empty"));
        }
        if self.default_permission.trim().is_empty() {
            return Err(ConfigError::invalid("default_permission must not be empty"));
        }
        if self.filter.max_concurrency == 0 {
            return Err(ConfigError::invalid("filter.max_concurrency must be > 0"));
        }
        Ok(())
    }
}

/// How audit writes are dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditMode {
    /// Await the write before continuing. Failures are still only logged.
    Inline,
    /// Spawn the write on the runtime and continue immediately.
    #[default]
    Background,
}

/// Audit recording configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Record access decisions at all.
    pub enabled: bool,

    /// Dispatch mode.
    pub mode: AuditMode,

    /// Record allowed decisions.
    pub log_allowed: bool,

    /// Record denied decisions.
    pub log_denied: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: AuditMode::Background,
            log_allowed: true,
            log_denied: true,
        }
    }
}

/// Content accessibility filter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Items evaluated concurrently. `1` evaluates strictly in sequence.
    pub max_concurrency: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self { max_concurrency: 1 }
    }
}

/// Configuration validation error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A setting has an invalid value.
    #[error("Invalid access control configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}
