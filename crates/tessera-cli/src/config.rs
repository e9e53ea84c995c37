use std::path::PathBuf;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tessera_auth::AccessControlConfig;
use tessera_retrieval::RetrievalConfig;

/// Default configuration file, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "tessera.toml";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub access_control: AccessControlConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// Rule store and audit log. Without it rules come from `--rules`.
    #[serde(default)]
    pub postgres: Option<PostgresConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    pub url: String,
    /// Create tables on startup.
    #[serde(default = "default_true")]
    pub ensure_schema: bool,
}

fn default_true() -> bool {
    true
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.access_control.validate().map_err(|e| e.to_string())?;
        self.retrieval.validate().map_err(|e| e.to_string())?;
        if self.logging.level.trim().is_empty() {
            return Err("logging.level must not be empty".into());
        }
        if let Some(pg) = &self.storage.postgres
            && pg.url.trim().is_empty()
        {
            return Err("storage.postgres.url must not be empty".into());
        }
        Ok(())
    }
}

/// Load configuration from `path` (or `tessera.toml`) and `TESSERA__*`
/// environment variables, then validate it.
///
/// A missing file is not an error; defaults apply.
pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
    let mut builder = Config::builder();
    let file = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_FILE));
    if file.exists() {
        builder = builder.add_source(File::from(file));
    }
    // e.g. TESSERA__RETRIEVAL__CACHE_TTL=10m
    builder = builder.add_source(
        Environment::with_prefix("TESSERA")
            .try_parsing(true)
            .separator("__"),
    );
    let cfg = builder
        .build()
        .map_err(|e| format!("config build error: {e}"))?;
    let merged: AppConfig = cfg
        .try_deserialize()
        .map_err(|e| format!("config deserialize error: {e}"))?;
    merged.validate()?;
    Ok(merged)
}
