//! Result cache keys.
//!
//! A key has the form `<prefix>:<tenant>:<sha256-hex>`. The digest covers the
//! JSON encoding of the request fields selected by the [`CacheKeyScope`].
//! Roles and attributes are held in ordered collections so the encoding, and
//! therefore the key, does not depend on the order the caller supplied them.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tessera_auth::Attributes;

use crate::search::SearchFilters;

/// Request fields that identify a cached result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheKeyScope {
    /// Query plus the caller's authorization context. Two subjects only share
    /// an entry if their roles, attributes, and permission are identical.
    #[default]
    Subject,
    /// Query shape only (`embedding`, `topK`, `filters`). Subjects with
    /// different roles can receive each other's filtered results.
    Query,
}

/// Inputs to a cache key.
#[derive(Debug, Clone, Copy)]
pub struct CacheKeyParts<'a> {
    pub tenant_id: &'a str,
    pub embedding: &'a [f32],
    pub top_k: usize,
    pub filters: &'a SearchFilters,
    pub user_roles: &'a BTreeSet<String>,
    pub attributes: &'a Attributes,
    pub permission: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryMaterial<'a> {
    embedding: &'a [f32],
    top_k: usize,
    filters: &'a SearchFilters,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubjectMaterial<'a> {
    embedding: &'a [f32],
    top_k: usize,
    filters: &'a SearchFilters,
    permission: &'a str,
    user_roles: &'a BTreeSet<String>,
    attributes: &'a Attributes,
}

/// Build the cache key for `parts`.
///
/// # Errors
///
/// Returns an error if the key material cannot be encoded as JSON.
pub fn cache_key(
    prefix: &str,
    scope: CacheKeyScope,
    parts: &CacheKeyParts<'_>,
) -> Result<String, serde_json::Error> {
    let material = match scope {
        CacheKeyScope::Query => serde_json::to_vec(&QueryMaterial {
            embedding: parts.embedding,
            top_k: parts.top_k,
            filters: parts.filters,
        })?,
        CacheKeyScope::Subject => serde_json::to_vec(&SubjectMaterial {
            embedding: parts.embedding,
            top_k: parts.top_k,
            filters: parts.filters,
            permission: parts.permission,
            user_roles: parts.user_roles,
            attributes: parts.attributes,
        })?,
    };

    let digest = hex::encode(Sha256::digest(&material));
    Ok(format!("{prefix}:{}:{digest}", parts.tenant_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Fixture {
        embedding: Vec<f32>,
        filters: SearchFilters,
        roles: BTreeSet<String>,
        attributes: Attributes,
    }

    impl Fixture {
        fn new(roles: &[&str]) -> Self {
            Self {
                embedding: vec![0.1, 0.2, 0.3],
                filters: SearchFilters::default(),
                roles: roles.iter().map(|r| (*r).to_string()).collect(),
                attributes: Attributes::new(),
            }
        }

        fn parts(&self) -> CacheKeyParts<'_> {
            CacheKeyParts {
                tenant_id: "tenant-123",
                embedding: &self.embedding,
                top_k: 5,
                filters: &self.filters,
                user_roles: &self.roles,
                attributes: &self.attributes,
                permission: "read",
            }
        }
    }

    fn key(scope: CacheKeyScope, fixture: &Fixture) -> String {
        cache_key("vector", scope, &fixture.parts()).unwrap()
    }

    #[test]
    fn test_key_shape() {
        let key = key(CacheKeyScope::Subject, &Fixture::new(&["trainer"]));
        let parts: Vec<_> = key.split(':').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "vector");
        assert_eq!(parts[1], "tenant-123");
        assert_eq!(parts[2].len(), 64);
    }

    #[test]
    fn test_subject_scope_separates_roles() {
        let trainer = Fixture::new(&["trainer"]);
        let admin = Fixture::new(&["admin"]);
        assert_ne!(key(CacheKeyScope::Subject, &trainer), key(CacheKeyScope::Subject, &admin));
        assert_eq!(key(CacheKeyScope::Query, &trainer), key(CacheKeyScope::Query, &admin));
    }

    #[test]
    fn test_subject_scope_separates_attributes() {
        let plain = Fixture::new(&["trainer"]);
        let mut tagged = Fixture::new(&["trainer"]);
        tagged.attributes.insert("department".into(), json!("AI"));
        assert_ne!(key(CacheKeyScope::Subject, &plain), key(CacheKeyScope::Subject, &tagged));
    }

    #[test]
    fn test_role_order_does_not_matter() {
        let a = Fixture::new(&["trainer", "admin"]);
        let b = Fixture::new(&["admin", "trainer"]);
        assert_eq!(key(CacheKeyScope::Subject, &a), key(CacheKeyScope::Subject, &b));
    }

    #[test]
    fn test_filters_and_tenant_change_key() {
        let plain = Fixture::new(&[]);
        let mut filtered = Fixture::new(&[]);
        filtered.filters.content_type = Some("course".into());
        assert_ne!(key(CacheKeyScope::Query, &plain), key(CacheKeyScope::Query, &filtered));

        let mut other_tenant = plain.parts();
        other_tenant.tenant_id = "tenant-999";
        assert_ne!(
            cache_key("vector", CacheKeyScope::Query, &other_tenant).unwrap(),
            key(CacheKeyScope::Query, &plain)
        );
    }
}
