use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono_tz::Tz;

use crate::crawl::feed::{parse_feed_specs, FeedSpec};
use crate::llm_client::{LlmSettings, DEFAULT_API_URL, MAX_RETRIES_LIMIT};

/// Where snapshots and the ledger are persisted.
#[derive(Debug, Clone)]
pub enum StorageBackend {
    Fs { data_dir: PathBuf },
    S3(S3Settings),
}

#[derive(Debug, Clone)]
pub struct S3Settings {
    pub bucket: String,
    pub endpoint: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub prefix: String,
}

/// Application configuration loaded from environment variables.
/// Fails at startup if a variable required by the chosen backend is missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub storage: StorageBackend,
    pub anthropic_api_key: Option<String>,
    pub oracle: LlmSettings,
    pub timezone: Tz,
    pub feeds: Vec<FeedSpec>,
    pub enable_scheduler: bool,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let storage = match optional_env("STORAGE_BACKEND").as_deref().unwrap_or("fs") {
            "fs" => StorageBackend::Fs {
                data_dir: optional_env("DATA_DIR").unwrap_or_else(|| "data".to_string()).into(),
            },
            "s3" => StorageBackend::S3(S3Settings {
                bucket: require_env("S3_BUCKET")?,
                endpoint: require_env("S3_ENDPOINT")?,
                access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
                secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
                prefix: optional_env("S3_PREFIX").unwrap_or_default(),
            }),
            other => bail!("STORAGE_BACKEND must be 'fs' or 's3', got '{other}'"),
        };

        let timezone_name =
            optional_env("SELECTION_TIMEZONE").unwrap_or_else(|| "Asia/Shanghai".to_string());
        let timezone: Tz = timezone_name
            .parse()
            .map_err(|e| anyhow::anyhow!("SELECTION_TIMEZONE '{timezone_name}' is invalid: {e}"))?;

        Ok(Config {
            storage,
            anthropic_api_key: optional_env("ANTHROPIC_API_KEY"),
            oracle: LlmSettings {
                api_url: optional_env("ORACLE_API_URL")
                    .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
                timeout: Duration::from_secs(parse_env("ORACLE_TIMEOUT_SECS", 30)?),
                max_retries: parse_env("ORACLE_MAX_RETRIES", 3u32)?.clamp(1, MAX_RETRIES_LIMIT),
            },
            timezone,
            feeds: parse_feed_specs(&optional_env("CRAWL_FEEDS").unwrap_or_default())
                .context("CRAWL_FEEDS is malformed")?,
            enable_scheduler: parse_env("ENABLE_SCHEDULER", true)?,
            port: parse_env("PORT", 8080)?,
            rust_log: optional_env("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Unset and blank values both read as `None`.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{key} has invalid value '{raw}': {e}")),
        None => Ok(default),
    }
}
