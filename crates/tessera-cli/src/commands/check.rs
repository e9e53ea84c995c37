use anyhow::Result;
use serde_json::{Value, json};
use tessera_auth::{EvaluationContext, PolicyEvaluator};

use crate::cli::CheckArgs;
use crate::commands::read_json;
use crate::output::{print_denied, print_json, print_success};

pub async fn check(evaluator: &PolicyEvaluator, args: &CheckArgs) -> Result<()> {
    let permission = args
        .permission
        .clone()
        .unwrap_or_else(|| evaluator.config().default_permission.clone());

    let mut builder =
        EvaluationContext::builder(args.tenant.as_str(), args.resource_type.as_str(), permission)
            .roles(args.roles.iter().cloned())
            .maybe_resource_id(args.resource_id.clone());
    for (key, value) in &args.attributes {
        builder = builder.attribute(key.as_str(), value.clone());
    }
    let ctx = builder.build()?;

    let evaluation = evaluator.check_access(&ctx, args.user.as_deref()).await;

    let masked = match (&args.data, evaluation.allowed) {
        (Some(path), true) => {
            let data: Value = read_json(Some(path)).await?;
            Some(evaluator.apply_field_masking(&ctx, &data).await)
        }
        _ => None,
    };

    if evaluation.allowed {
        print_success("access allowed");
    } else {
        print_denied(&format!(
            "access denied: {}",
            evaluation.reason.as_deref().unwrap_or("no reason given")
        ));
    }

    print_json(&json!({
        "evaluation": evaluation,
        "data": masked,
    }))
}
