use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{ExportSampler, SamplingConfig};

const MAX_ATTEMPTS: u32 = 3;
const RETRY_DELAY_MS: u64 = 100;

#[derive(Error, Debug)]
pub enum SamplingConfigError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Config endpoint returned {status}")]
    Status { status: u16 },

    #[error("Failed to parse sampling config: {0}")]
    Parse(String),

    #[error("Sampling config fetch failed after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
}

#[derive(Debug, Clone)]
pub struct RemoteSamplingConfig {
    pub endpoint: String,

    /// Opaque project / organization key sent as `X-Project-Id`
    pub project_id: String,

    pub timeout: Duration,
}

#[derive(Deserialize)]
struct SamplingResponse {
    #[serde(default)]
    sampling: Option<SamplingConfig>,
}

/// Fetches the sampling configuration for a project.
pub struct SamplingConfigClient {
    client: Client,
    config: RemoteSamplingConfig,
}

impl SamplingConfigClient {
    pub fn new(config: RemoteSamplingConfig) -> Result<Self, SamplingConfigError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    /// Retries on network errors and 5xx; any other status fails immediately.
    pub async fn fetch(&self) -> Result<Option<SamplingConfig>, SamplingConfigError> {
        let mut last_error = String::new();

        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64)).await;
            }

            let response = self
                .client
                .get(&self.config.endpoint)
                .header("X-Project-Id", &self.config.project_id)
                .send()
                .await;

            match response {
                Ok(resp) => {
                    let status = resp.status();

                    if status.is_success() {
                        let body = resp.bytes().await?;
                        let parsed: SamplingResponse = serde_json::from_slice(&body)
                            .map_err(|e| SamplingConfigError::Parse(e.to_string()))?;
                        return Ok(parsed.sampling);
                    }

                    if status.is_server_error() {
                        warn!(
                            status = status.as_u16(),
                            attempt = attempt + 1,
                            max_attempts = MAX_ATTEMPTS,
                            "Sampling config endpoint error"
                        );
                        last_error = format!("Server error: {}", status);
                        continue;
                    }

                    return Err(SamplingConfigError::Status {
                        status: status.as_u16(),
                    });
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        attempt = attempt + 1,
                        max_attempts = MAX_ATTEMPTS,
                        "Sampling config request failed"
                    );
                    last_error = e.to_string();
                }
            }
        }

        Err(SamplingConfigError::Exhausted {
            attempts: MAX_ATTEMPTS,
            last_error,
        })
    }

    /// Fetch once and apply the result to `sampler`. Failures and empty
    /// responses leave the sampler's current config in place.
    pub async fn refresh(&self, sampler: &dyn ExportSampler) {
        match self.fetch().await {
            Ok(Some(config)) => sampler.set_config(Some(config)),
            Ok(None) => debug!(project_id = %self.config.project_id, "No sampling config for project"),
            Err(e) => warn!(error = %e, "Failed to fetch sampling config, keeping previous"),
        }
    }

    pub fn spawn_refresh(self: Arc<Self>, sampler: Arc<dyn ExportSampler>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(endpoint = %self.config.endpoint, "Fetching sampling config");
            self.refresh(sampler.as_ref()).await;
        })
    }
}
