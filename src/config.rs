use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_DATABASE: &str = "(default)";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 15;

/// Connection settings for the live document store.
///
/// Read from the environment (after `.env`) or from a JSON file with the
/// same keys in camelCase:
/// ```json
/// {
///   "projectId": "cycl-prod",
///   "apiKey": "AIza...",
///   "pollIntervalSecs": 30
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub project_id: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// OAuth access token; takes precedence over `api_key`.
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

fn default_database() -> String {
    DEFAULT_DATABASE.to_string()
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Reads `FIRESTORE_PROJECT_ID` (required), `FIRESTORE_API_KEY`,
    /// `FIRESTORE_ACCESS_TOKEN`, `FIRESTORE_DATABASE` and `POLL_INTERVAL_SECS`.
    pub fn from_env() -> Result<Self> {
        let project_id =
            non_empty_var("FIRESTORE_PROJECT_ID").context("FIRESTORE_PROJECT_ID must be set")?;

        let poll_interval_secs = match non_empty_var("POLL_INTERVAL_SECS") {
            Some(v) => v
                .trim()
                .parse()
                .with_context(|| format!("POLL_INTERVAL_SECS is not a number: '{v}'"))?,
            None => DEFAULT_POLL_INTERVAL_SECS,
        };

        Ok(Self {
            project_id,
            api_key: non_empty_var("FIRESTORE_API_KEY"),
            access_token: non_empty_var("FIRESTORE_ACCESS_TOKEN"),
            database: non_empty_var("FIRESTORE_DATABASE").unwrap_or_else(default_database),
            poll_interval_secs,
        })
    }

    /// Loads the config from a JSON file at `path`.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config '{path}'"))?;
        Self::parse(&content).with_context(|| format!("invalid config '{path}'"))
    }

    fn parse(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}
