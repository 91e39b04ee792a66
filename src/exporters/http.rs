use flate2::write::GzEncoder;
use flate2::Compression;
use reqwest::Client;
use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, error, info};

use super::ExportError;

pub const CONTENT_TYPE_PROTOBUF: &str = "application/x-protobuf";
pub const CONTENT_TYPE_JSON: &str = "application/json";

const DEFAULT_USER_AGENT: &str = concat!("otel-edge-pipeline/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Default request timeout; a per-call override can only shorten it
    pub timeout: Duration,

    pub user_agent: String,

    /// Static headers added to every request (API keys, tenant ids)
    pub headers: HashMap<String, String>,

    /// Gzip request bodies
    pub compression: bool,

    /// Bodies smaller than this are sent uncompressed
    pub compression_threshold_bytes: usize,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            headers: HashMap::new(),
            compression: true,
            compression_threshold_bytes: 1024,
        }
    }
}

/// Shared POST client used by every HTTP exporter.
pub struct HttpTransport {
    client: Client,
    config: HttpClientConfig,
    healthy: AtomicBool,
}

impl HttpTransport {
    pub fn new(config: HttpClientConfig) -> Result<Self, ExportError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            config,
            healthy: AtomicBool::new(true),
        })
    }

    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// POST `body` to `url`. Non-2xx responses are errors; nothing is retried.
    pub async fn post(
        &self,
        url: &str,
        content_type: &'static str,
        body: Vec<u8>,
        timeout: Option<Duration>,
    ) -> Result<(), ExportError> {
        let raw_len = body.len();
        let (body, gzipped) = maybe_compress(
            body,
            self.config.compression,
            self.config.compression_threshold_bytes,
        )?;

        let timeout = timeout
            .map(|t| t.min(self.config.timeout))
            .unwrap_or(self.config.timeout);

        let mut req = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .timeout(timeout);

        if gzipped {
            req = req.header(reqwest::header::CONTENT_ENCODING, "gzip");
        }

        for (name, value) in &self.config.headers {
            req = req.header(name.as_str(), value.as_str());
        }

        debug!(url, raw_bytes = raw_len, sent_bytes = body.len(), gzipped, "Sending export request");

        let result = self.send(req.body(body)).await;
        match &result {
            Ok(()) => self.mark_healthy(),
            Err(_) => self.mark_unhealthy(),
        }
        result
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<(), ExportError> {
        let response = req.send().await?;
        let status = response.status();

        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ExportError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }

    /// Whether the last request succeeded
    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    fn mark_healthy(&self) {
        if !self.healthy.swap(true, Ordering::SeqCst) {
            info!("Collector connection recovered");
        }
    }

    fn mark_unhealthy(&self) {
        if self.healthy.swap(false, Ordering::SeqCst) {
            error!("Collector connection unhealthy");
        }
    }
}

/// Gzip `body` when enabled and large enough, keeping the original if
/// compression does not make it smaller.
pub fn maybe_compress(
    body: Vec<u8>,
    enabled: bool,
    threshold: usize,
) -> Result<(Vec<u8>, bool), ExportError> {
    if !enabled || body.len() < threshold {
        return Ok((body, false));
    }

    let mut encoder = GzEncoder::new(Vec::with_capacity(body.len() / 2), Compression::default());
    encoder.write_all(&body)?;
    let compressed = encoder.finish()?;

    if compressed.len() < body.len() {
        Ok((compressed, true))
    } else {
        Ok((body, false))
    }
}
