//! Storage traits for access control data.
//!
//! This module defines the read interface used by the policy engine to load
//! active rules, plus an in-memory implementation for tests and offline use.
//!
//! # Implementations
//!
//! - [`MemoryRuleStorage`] - in-process rule set
//! - `tessera-auth-postgres` - PostgreSQL storage backend

pub mod memory;
pub mod rule;

pub use memory::MemoryRuleStorage;
pub use rule::{RuleQuery, RuleStorage};
