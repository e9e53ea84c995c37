use anyhow::{Result, anyhow};
use tessera_auth::PolicyEvaluator;
use tessera_cli::config::AppConfig;
use tessera_cli::runtime::build_coordinator;
use tessera_retrieval::RetrievalRequest;

use crate::cli::SearchArgs;
use crate::commands::read_json;
use crate::output::{print_json, print_success};

pub async fn search(config: &AppConfig, evaluator: PolicyEvaluator, args: &SearchArgs) -> Result<()> {
    let request: RetrievalRequest = read_json(args.input.as_deref()).await?;
    let coordinator = build_coordinator(config, evaluator, &args.corpus).await?;

    let result = coordinator
        .get_similar_content(&request)
        .await
        .map_err(|e| anyhow!("{}: {e}", e.code()))?;

    print_success(&format!(
        "{} results ({})",
        result.items.len(),
        if result.cache_hit { "cache hit" } else { "cache miss" }
    ));
    print_json(&result)
}
