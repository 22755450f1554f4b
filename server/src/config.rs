use std::time::Duration;

use anyhow::{Context, Result};
use board::SyncPolicy;
use board_client::{ClientConfig, config::DEFAULT_ENDPOINT};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api_url: String,
    pub api_token: Option<String>,
    pub request_timeout: Duration,
    pub refetch_on_commit: bool,
    pub cors_allowed_origins: Vec<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `load` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_url = lookup("BOARD_API_URL").unwrap_or_else(|| DEFAULT_ENDPOINT.into());
        let api_token = lookup("BOARD_API_TOKEN").filter(|t| !t.trim().is_empty());

        let request_timeout = match lookup("BOARD_REQUEST_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("invalid BOARD_REQUEST_TIMEOUT_SECS `{raw}`"))?;
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(10),
        };

        let refetch_on_commit = lookup("BOARD_REFETCH_ON_COMMIT")
            .map(|val| matches!(val.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let cors_allowed_origins = lookup("BOARD_CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173".into())
            .split(',')
            .filter_map(|s| {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            })
            .collect::<Vec<_>>();

        Ok(Self {
            api_url,
            api_token,
            request_timeout,
            refetch_on_commit,
            cors_allowed_origins,
        })
    }

    pub fn client_config(&self) -> ClientConfig {
        let config = ClientConfig::new(self.api_url.clone()).with_timeout(self.request_timeout);
        match &self.api_token {
            Some(token) => config.with_token(token.clone()),
            None => config,
        }
    }

    pub fn sync_policy(&self) -> SyncPolicy {
        SyncPolicy {
            refetch_on_commit: self.refetch_on_commit,
        }
    }
}
