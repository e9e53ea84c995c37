//! Policy evaluation.
//!
//! - [`rule`] - rule model
//! - [`condition`] - ABAC condition matcher
//! - [`context`] - per-request evaluation context
//! - [`engine`] - layer checks and the composite evaluator
//! - [`masking`] - field redaction
//! - [`filter`] - batch content accessibility filter

pub mod condition;
pub mod context;
pub mod engine;
pub mod filter;
pub mod masking;
pub mod rule;

pub use condition::{
    Condition, ConditionError, ConditionOperator, ConditionSet, OperatorClause,
    matches_conditions,
};
pub use context::{Attributes, EvaluationContext, EvaluationContextBuilder};
pub use engine::{EvaluationDetails, LayerDecision, PolicyEvaluation, PolicyEvaluator, PolicyLayer};
pub use filter::{AccessibleContentRequest, ContentItem};
pub use masking::{mask_fields, mask_with_rule};
pub use rule::{AccessControlRule, RuleType};
