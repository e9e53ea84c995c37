use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::Value;
use tessera_cli::runtime::parse_attribute;

#[derive(Parser)]
#[command(name = "tessera")]
#[command(about = "Tessera access control and cached retrieval CLI")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to ./tessera.toml)
    #[arg(short, long, global = true, env = "TESSERA_CONFIG")]
    pub config: Option<String>,

    /// JSON file with an array of access control rules (overrides Postgres)
    #[arg(short, long, global = true, env = "TESSERA_RULES")]
    pub rules: Option<PathBuf>,

    /// Log level (overrides logging.level; RUST_LOG wins over both)
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Evaluate the layered policy for one resource and audit the decision
    Check(CheckArgs),
    /// Filter and mask a batch of content items
    Filter(FilterArgs),
    /// Run a cached, permission-filtered similarity search
    Search(SearchArgs),
    /// Print the effective configuration
    Config,
}

#[derive(clap::Args)]
pub struct CheckArgs {
    /// Tenant id
    #[arg(short, long)]
    pub tenant: String,
    /// Resource type (e.g. course)
    #[arg(long)]
    pub resource_type: String,
    /// Resource id
    #[arg(long)]
    pub resource_id: Option<String>,
    /// User id recorded in the audit trail
    #[arg(short, long)]
    pub user: Option<String>,
    /// Permission (defaults to access_control.default_permission)
    #[arg(short, long)]
    pub permission: Option<String>,
    /// Subject role (repeatable)
    #[arg(long = "role")]
    pub roles: Vec<String>,
    /// Subject attribute as key=value (repeatable)
    #[arg(long = "attr", value_parser = parse_attribute)]
    pub attributes: Vec<(String, Value)>,
    /// JSON record to mask with the matching content rule
    #[arg(long)]
    pub data: Option<PathBuf>,
}

#[derive(clap::Args)]
pub struct FilterArgs {
    /// JSON request ({tenantId, userRoles, items, ...}); reads stdin if omitted
    #[arg(long)]
    pub input: Option<PathBuf>,
}

#[derive(clap::Args)]
pub struct SearchArgs {
    /// JSON array of embedded chunks to search
    #[arg(long)]
    pub corpus: PathBuf,
    /// JSON request ({tenantId, embedding, topK, userRoles, ...}); reads stdin if omitted
    #[arg(long)]
    pub input: Option<PathBuf>,
}
