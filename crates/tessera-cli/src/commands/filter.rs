use anyhow::Result;
use tessera_auth::{AccessibleContentRequest, PolicyEvaluator};

use crate::cli::FilterArgs;
use crate::commands::read_json;
use crate::output::{print_json, print_success};

pub async fn filter(evaluator: &PolicyEvaluator, args: &FilterArgs) -> Result<()> {
    let request: AccessibleContentRequest = read_json(args.input.as_deref()).await?;
    let total = request.items.len();

    let items = evaluator.get_accessible_content(request).await;

    print_success(&format!("{} of {total} items accessible", items.len()));
    print_json(&items)
}
