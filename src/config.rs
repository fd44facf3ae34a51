use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Runtime configuration, loaded once at startup and passed by reference into
/// every component constructor. Missing credentials are fatal here, before the
/// poll loop starts; everything else has a sensible default.
#[derive(Debug, Clone)]
pub struct Settings {
    pub airtable_api_key: String,
    pub airtable_base_id: String,
    pub airtable_table: String,

    pub llm_base_url: String,
    pub llm_model: String,
    pub llm_api_key: Option<String>,

    /// Display name of the client whose voice the posts are written in.
    pub client_name: String,
    /// Normalized client identifier used to scope the artifact store.
    pub owner: String,

    pub poll_interval: Duration,
    pub request_timeout: Duration,
    /// How many retrieved artifacts to inject into a revision prompt.
    pub top_k: usize,
    /// Artifacts newer than this many days are excluded from retrieval, so
    /// the client's freshest posts are never recommended back at them.
    pub exclude_within_days: i64,

    pub data_dir: PathBuf,
    pub export_path: PathBuf,
    pub notify_webhook: Option<String>,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let airtable_api_key =
            dotenv::var("AIRTABLE_API_KEY").context("AIRTABLE_API_KEY is required")?;
        let airtable_base_id =
            dotenv::var("AIRTABLE_BASE_ID").context("AIRTABLE_BASE_ID is required")?;
        let airtable_table =
            dotenv::var("AIRTABLE_TABLE_NAME").context("AIRTABLE_TABLE_NAME is required")?;

        let llm_base_url = dotenv::var("LLM_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let llm_model =
            dotenv::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let llm_api_key = dotenv::var("LLM_API_KEY").ok().filter(|k| !k.is_empty());

        let client_name =
            dotenv::var("CLIENT_NAME").unwrap_or_else(|_| "client".to_string());
        let owner = client_name.trim().to_lowercase().replace(' ', "_");

        let poll_interval = Duration::from_secs(env_u64("POLL_INTERVAL_SECS", 300)?);
        let request_timeout = Duration::from_secs(env_u64("REQUEST_TIMEOUT_SECS", 45)?);
        let top_k = env_u64("RETRIEVAL_TOP_K", 3)? as usize;
        let exclude_within_days = env_u64("EXCLUDE_WITHIN_DAYS", 30)? as i64;

        let data_dir =
            PathBuf::from(dotenv::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string()));
        let export_path = dotenv::var("EXPORT_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("daily_feedback.jsonl"));
        let notify_webhook = dotenv::var("NOTIFY_WEBHOOK_URL")
            .ok()
            .filter(|u| !u.is_empty());

        Ok(Self {
            airtable_api_key,
            airtable_base_id,
            airtable_table,
            llm_base_url,
            llm_model,
            llm_api_key,
            client_name,
            owner,
            poll_interval,
            request_timeout,
            top_k,
            exclude_within_days,
            data_dir,
            export_path,
            notify_webhook,
        })
    }
}

fn env_u64(key: &str, default: u64) -> Result<u64> {
    match dotenv::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .with_context(|| format!("{} must be an integer, got '{}'", key, raw)),
        Err(_) => Ok(default),
    }
}
