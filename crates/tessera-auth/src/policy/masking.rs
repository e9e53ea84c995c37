//! Field masking.
//!
//! Replaces the values of named fields in a JSON object with a redaction
//! placeholder. Keys are never added or removed, only substituted, so masking
//! is idempotent.

use serde_json::Value;

use crate::policy::rule::AccessControlRule;

/// Mask `fields` in `data`.
///
/// Returns a copy of `data` where every listed field that is present is set to
/// `placeholder`. Non-object values are returned unchanged.
///
/// ```
/// use serde_json::json;
/// use tessera_auth::policy::masking::mask_fields;
///
/// let masked = mask_fields(
///     &json!({ "title": "Advanced JS", "instructorNotes": "x" }),
///     &["instructorNotes", "salaryBand"],
///     "[REDACTED]",
/// );
/// assert_eq!(masked, json!({ "title": "Advanced JS", "instructorNotes": "[REDACTED]" }));
/// ```
#[must_use]
pub fn mask_fields(data: &Value, fields: &[&str], placeholder: &str) -> Value {
    let Value::Object(map) = data else {
        return data.clone();
    };

    let mut masked = map.clone();
    for field in fields {
        if let Some(value) = masked.get_mut(*field) {
            *value = Value::String(placeholder.to_string());
        }
    }
    Value::Object(masked)
}

/// Mask `data` with the `maskFields` of a content-permission rule.
///
/// With no rule, or a rule without `maskFields`, the copy is unchanged.
#[must_use]
pub fn mask_with_rule(data: &Value, rule: Option<&AccessControlRule>, placeholder: &str) -> Value {
    match rule.and_then(AccessControlRule::mask_fields) {
        Some(fields) => mask_fields(data, &fields, placeholder),
        None => data.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::rule::RuleType;
    use serde_json::json;

    const PLACEHOLDER: &str = "[REDACTED]";

    fn content_rule(conditions: Value) -> AccessControlRule {
        AccessControlRule {
            id: "content-rule-1".into(),
            tenant_id: "tenant-123".into(),
            rule_type: RuleType::ContentPermission,
            subject_type: "role".into(),
            subject_id: "trainer".into(),
            resource_type: "course".into(),
            resource_id: Some("course-advanced-js".into()),
            permission: "read".into(),
            conditions,
            is_active: true,
        }
    }

    #[test]
    fn test_masks_only_present_fields() {
        let data = json!({ "title": "Advanced JS", "instructorNotes": "x" });
        let masked = mask_fields(&data, &["instructorNotes", "salaryBand"], PLACEHOLDER);

        assert_eq!(masked["instructorNotes"], json!("[REDACTED]"));
        assert!(masked.get("salaryBand").is_none());
        assert_eq!(masked.as_object().unwrap().len(), 2);
    }

    #[test]
    fn test_masking_is_idempotent() {
        let data = json!({ "title": "Advanced JS", "instructorNotes": "x", "salaryBand": 4 });
        let rule = content_rule(json!({ "maskFields": ["instructorNotes", "salaryBand"] }));

        let once = mask_with_rule(&data, Some(&rule), PLACEHOLDER);
        let twice = mask_with_rule(&once, Some(&rule), PLACEHOLDER);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_null_field_is_still_masked() {
        let masked = mask_fields(&json!({ "notes": null }), &["notes"], PLACEHOLDER);
        assert_eq!(masked, json!({ "notes": "[REDACTED]" }));
    }

    #[test]
    fn test_no_rule_or_no_mask_fields() {
        let data = json!({ "title": "Intro" });
        assert_eq!(mask_with_rule(&data, None, PLACEHOLDER), data);

        let rule = content_rule(json!({ "allowedRoles": ["trainer"] }));
        assert_eq!(mask_with_rule(&data, Some(&rule), PLACEHOLDER), data);
    }

    #[test]
    fn test_non_object_passthrough() {
        assert_eq!(mask_fields(&json!("text"), &["a"], PLACEHOLDER), json!("text"));
        assert_eq!(mask_fields(&Value::Null, &["a"], PLACEHOLDER), Value::Null);
        assert_eq!(mask_fields(&json!([1, 2]), &["0"], PLACEHOLDER), json!([1, 2]));
    }

    #[test]
    fn test_nested_fields_are_not_traversed() {
        let data = json!({ "meta": { "instructorNotes": "x" } });
        assert_eq!(mask_fields(&data, &["instructorNotes"], PLACEHOLDER), data);
    }
}
