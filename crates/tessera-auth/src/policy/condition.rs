//! Attribute condition matching for ABAC rules.
//!
//! A condition document is a JSON object mapping attribute names to
//! predicates. Every key must match for the document to match:
//!
//! | Predicate | Meaning |
//! |-----------|---------|
//! | scalar    | strict equality |
//! | array     | attribute is a member |
//! | object    | every operator (`eq`, `neq`, `in`, `nin`, `gte`, `lte`, `gt`, `lt`) holds |
//!
//! A missing or null attribute fails its key. An empty document matches
//! vacuously. Unknown operators fail only themselves and malformed documents
//! fail the whole predicate; nothing here panics or returns an error to the
//! evaluator.
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use tessera_auth::policy::condition::ConditionSet;
//! use tessera_auth::policy::context::Attributes;
//!
//! let conditions = ConditionSet::parse(&json!({
//!     "department": ["Engineering", "AI"],
//!     "seniority": { "gte": 3 }
//! }))
//! .unwrap();
//!
//! let mut attributes = Attributes::new();
//! attributes.insert("department".into(), json!("AI"));
//! attributes.insert("seniority".into(), json!(4));
//! assert!(conditions.matches(&attributes));
//! ```

use serde_json::Value;

use crate::policy::context::Attributes;

// =============================================================================
// Errors
// =============================================================================

/// A condition document that cannot be interpreted.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConditionError {
    /// The document is not a JSON object.
    #[error("condition document must be an object, got {0}")]
    NotAnObject(&'static str),
}

// =============================================================================
// Operators
// =============================================================================

/// Comparison operator inside an operator map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionOperator {
    Eq,
    Neq,
    In,
    Nin,
    Gte,
    Lte,
    Gt,
    Lt,
}

const OPERATORS: [(&str, ConditionOperator); 8] = [
    ("eq", ConditionOperator::Eq),
    ("neq", ConditionOperator::Neq),
    ("in", ConditionOperator::In),
    ("nin", ConditionOperator::Nin),
    ("gte", ConditionOperator::Gte),
    ("lte", ConditionOperator::Lte),
    ("gt", ConditionOperator::Gt),
    ("lt", ConditionOperator::Lt),
];

impl ConditionOperator {
    /// Resolve an operator by its document name.
    #[must_use]
    pub fn lookup(name: &str) -> Option<Self> {
        OPERATORS
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, op)| *op)
    }

    /// Apply the operator to an attribute value and the expected operand.
    #[must_use]
    pub fn evaluate(self, attribute: &Value, expected: &Value) -> bool {
        match self {
            Self::Eq => strict_eq(attribute, expected),
            Self::Neq => !strict_eq(attribute, expected),
            Self::In => expected
                .as_array()
                .is_some_and(|list| contains(list, attribute)),
            Self::Nin => expected
                .as_array()
                .is_some_and(|list| !contains(list, attribute)),
            Self::Gte => to_number(attribute) >= to_number(expected),
            Self::Lte => to_number(attribute) <= to_number(expected),
            Self::Gt => to_number(attribute) > to_number(expected),
            Self::Lt => to_number(attribute) < to_number(expected),
        }
    }
}

/// One entry of an operator map.
#[derive(Debug, Clone, PartialEq)]
pub enum OperatorClause {
    /// A recognised operator and its operand.
    Known(ConditionOperator, Value),
    /// An operator name that is not in the table. Always fails.
    Unknown(String),
}

impl OperatorClause {
    fn holds(&self, attribute: &Value) -> bool {
        match self {
            Self::Known(op, expected) => op.evaluate(attribute, expected),
            Self::Unknown(name) => {
                tracing::debug!(operator = %name, "Unknown condition operator");
                false
            }
        }
    }
}

// =============================================================================
// Conditions
// =============================================================================

/// Predicate for a single attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Strict equality with a scalar.
    Equals(Value),
    /// Membership in a list.
    OneOf(Vec<Value>),
    /// Conjunction of operators.
    Operators(Vec<OperatorClause>),
}

impl Condition {
    fn from_value(value: &Value) -> Self {
        match value {
            Value::Array(items) => Self::OneOf(items.clone()),
            Value::Object(ops) => Self::Operators(
                ops.iter()
                    .map(|(name, operand)| match ConditionOperator::lookup(name) {
                        Some(op) => OperatorClause::Known(op, operand.clone()),
                        None => OperatorClause::Unknown(name.clone()),
                    })
                    .collect(),
            ),
            scalar => Self::Equals(scalar.clone()),
        }
    }

    /// Evaluate against a present, non-null attribute value.
    #[must_use]
    pub fn matches(&self, attribute: &Value) -> bool {
        match self {
            Self::Equals(expected) => strict_eq(attribute, expected),
            Self::OneOf(list) => contains(list, attribute),
            Self::Operators(clauses) => clauses.iter().all(|c| c.holds(attribute)),
        }
    }
}

/// A parsed condition document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConditionSet {
    entries: Vec<(String, Condition)>,
}

impl ConditionSet {
    /// Parse a condition document.
    ///
    /// `null` is treated as an empty document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is neither an object nor `null`.
    pub fn parse(document: &Value) -> Result<Self, ConditionError> {
        match document {
            Value::Null => Ok(Self::default()),
            Value::Object(map) => Ok(Self {
                entries: map
                    .iter()
                    .map(|(key, value)| (key.clone(), Condition::from_value(value)))
                    .collect(),
            }),
            other => Err(ConditionError::NotAnObject(json_type(other))),
        }
    }

    /// Returns `true` if the document has no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of attribute keys in the document.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if every key matches the corresponding attribute.
    #[must_use]
    pub fn matches(&self, attributes: &Attributes) -> bool {
        self.entries.iter().all(|(key, condition)| {
            match attributes.get(key) {
                None | Some(Value::Null) => false,
                Some(attribute) => condition.matches(attribute),
            }
        })
    }
}

/// Evaluate a raw condition document against attributes.
///
/// Malformed documents do not match.
#[must_use]
pub fn matches_conditions(attributes: &Attributes, document: &Value) -> bool {
    match ConditionSet::parse(document) {
        Ok(set) => set.matches(attributes),
        Err(e) => {
            tracing::debug!(error = %e, "Malformed condition document");
            false
        }
    }
}

// =============================================================================
// Value semantics
// =============================================================================

/// Strict equality: same type and value. Numbers compare numerically so `3`
/// equals `3.0`; arrays and objects never compare equal.
fn strict_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        _ => false,
    }
}

fn contains(list: &[Value], value: &Value) -> bool {
    list.iter().any(|candidate| strict_eq(candidate, value))
}

/// Numeric coercion. Unparseable values become NaN, which fails every
/// comparison.
fn to_number(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                0.0
            } else {
                trimmed.parse().unwrap_or(f64::NAN)
            }
        }
        Value::Bool(true) => 1.0,
        Value::Bool(false) | Value::Null => 0.0,
        Value::Array(_) | Value::Object(_) => f64::NAN,
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
