pub mod check;
pub mod config;
pub mod filter;
pub mod search;

use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use tokio::io::AsyncReadExt;

/// Read a JSON document from `path`, or stdin when `path` is `None`.
pub async fn read_json<T: DeserializeOwned>(path: Option<&Path>) -> Result<T> {
    let raw = match path {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("failed to read stdin")?;
            buf
        }
    };
    serde_json::from_str(&raw).context("invalid JSON input")
}
