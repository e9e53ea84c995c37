use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use serde_json::Value;
use tessera_auth::config::AuditMode;
use tessera_auth::{
    AuditRecorder, AuditSink, MemoryRuleStorage, PolicyEvaluator, RuleStorage, TracingAuditSink,
};
use tessera_auth_postgres::PostgresAccessStorage;
use tessera_retrieval::{MemoryVectorIndex, RetrievalCoordinator, create_cache_backend};

use crate::config::AppConfig;

/// Build a policy evaluator from configuration.
///
/// Rules come from `rules_file` when given, else from Postgres. Audit records
/// go to Postgres when configured, else to the log.
pub async fn build_evaluator(config: &AppConfig, rules_file: Option<&Path>) -> Result<PolicyEvaluator> {
    let postgres = match &config.storage.postgres {
        Some(pg) => {
            let storage = PostgresAccessStorage::connect(&pg.url)
                .await
                .context("failed to connect to Postgres")?;
            if pg.ensure_schema {
                storage.ensure_schema().await?;
            }
            Some(storage)
        }
        None => None,
    };

    let rules: Arc<dyn RuleStorage> = match (rules_file, &postgres) {
        (Some(path), _) => Arc::new(
            MemoryRuleStorage::load(path)
                .await
                .with_context(|| format!("failed to load rules from {}", path.display()))?,
        ),
        (None, Some(pg)) => {
            tracing::info!("Loading access control rules from Postgres");
            Arc::new(pg.rules())
        }
        (None, None) => bail!("no rule source: pass --rules <file> or set storage.postgres.url"),
    };

    let mut audit_config = config.access_control.audit.clone();
    // a one-shot process must not exit before its audit writes land
    audit_config.mode = AuditMode::Inline;

    let audit = if audit_config.enabled {
        let sink: Arc<dyn AuditSink> = match &postgres {
            Some(pg) => Arc::new(pg.audit()),
            None => Arc::new(TracingAuditSink),
        };
        AuditRecorder::new(sink, audit_config)
    } else {
        AuditRecorder::disabled()
    };

    Ok(PolicyEvaluator::new(rules)
        .with_audit(audit)
        .with_config(config.access_control.clone()))
}

/// Build a retrieval coordinator over an in-memory corpus.
pub async fn build_coordinator(
    config: &AppConfig,
    evaluator: PolicyEvaluator,
    corpus: &Path,
) -> Result<RetrievalCoordinator> {
    let index = MemoryVectorIndex::load(corpus)
        .await
        .with_context(|| format!("failed to load corpus from {}", corpus.display()))?;
    let cache = create_cache_backend(&config.retrieval.redis).await;
    cache.start_cleanup_task(config.retrieval.cache_cleanup_interval);
    tracing::debug!(
        redis = cache.is_redis_available().await,
        scope = ?config.retrieval.cache_key_scope,
        "Retrieval cache ready"
    );

    Ok(
        RetrievalCoordinator::new(Arc::new(index), evaluator, config.retrieval.clone())
            .with_cache(Arc::new(cache)),
    )
}

/// Parse a `key=value` attribute.
///
/// The value is read as JSON when it parses (`seniority=3`, `tags=["a"]`),
/// otherwise as a plain string (`department=Engineering`).
pub fn parse_attribute(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty attribute name in '{raw}'"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_attribute() {
        assert_eq!(parse_attribute("seniority=3").unwrap(), ("seniority".into(), json!(3)));
        assert_eq!(
            parse_attribute("department=Engineering").unwrap(),
            ("department".into(), json!("Engineering"))
        );
        assert_eq!(parse_attribute("region=\"US\"").unwrap().1, json!("US"));
        assert_eq!(parse_attribute("note=a=b").unwrap().1, json!("a=b"));
        assert!(parse_attribute("novalue").is_err());
        assert!(parse_attribute("=x").is_err());
    }

    #[tokio::test]
    async fn test_build_evaluator_requires_rule_source() {
        let err = build_evaluator(&AppConfig::default(), None).await.unwrap_err();
        assert!(err.to_string().contains("no rule source"));
    }
}
