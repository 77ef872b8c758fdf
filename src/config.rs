use anyhow::{bail, Context, Result};
use std::time::Duration;

use crate::cache::FailurePolicy;

/// Which record backend the process talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackendKind {
    Postgres,
    Memory,
}

impl std::str::FromStr for StoreBackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => bail!("Unknown STORE_BACKEND '{}'. Expected 'postgres' or 'memory'", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    // Store
    pub store_backend: StoreBackendKind,
    pub database_url: Option<String>,
    pub table_name: String,
    pub store_region: String,
    pub page_size: u32,

    // Translator (OpenAI-compatible chat completions)
    pub translator_api_url: String,
    pub translator_api_key: String,
    pub translator_model: String,
    pub translator_timeout: Duration,
    pub failure_policy: FailurePolicy,

    // Server
    pub api_key: Option<String>,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let store_backend: StoreBackendKind = std::env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "postgres".to_string())
            .parse()?;

        let database_url = std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty());
        if store_backend == StoreBackendKind::Postgres && database_url.is_none() {
            bail!("DATABASE_URL not set (required when STORE_BACKEND=postgres)");
        }

        let failure_policy: FailurePolicy = std::env::var("TRANSLATION_FAILURE_POLICY")
            .unwrap_or_else(|_| "strict".to_string())
            .parse()
            .context("Invalid TRANSLATION_FAILURE_POLICY")?;

        Ok(Self {
            store_backend,
            database_url,
            table_name: std::env::var("CATALOG_TABLE").unwrap_or_else(|_| "movies".to_string()),
            store_region: std::env::var("STORE_REGION").unwrap_or_else(|_| "local".to_string()),
            page_size: std::env::var("PAGE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n: &u32| *n > 0)
                .unwrap_or(50),

            translator_api_url: std::env::var("TRANSLATOR_API_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1/chat/completions".to_string()),
            translator_api_key: std::env::var("TRANSLATOR_API_KEY")
                .context("TRANSLATOR_API_KEY not set")?,
            translator_model: std::env::var("TRANSLATOR_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            translator_timeout: Duration::from_secs(
                std::env::var("TRANSLATOR_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(30),
            ),
            failure_policy,

            api_key: std::env::var("API_KEY").ok().filter(|v| !v.is_empty()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
        })
    }
}
