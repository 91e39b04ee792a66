use otel_edge_pipeline::{
    AttributeValue, Attributes, Config, EventQueueItem, LogItem, LogRecord, Severity, TransportService,
};
use serde::Deserialize;
use std::{env, time::Duration};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// One stdin line in JSON form. Anything that does not parse as this is
/// treated as a plain-text message.
#[derive(Debug, Deserialize)]
struct InputLine {
    body: String,

    #[serde(default)]
    severity: Option<String>,

    #[serde(default)]
    attributes: Attributes,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .with_target(false)
        .init();

    let config = match env::var("OTEL_EDGE_CONFIG") {
        Ok(path) => {
            info!("Loading config from {}", path);
            Config::from_file(&path).expect("Failed to load config")
        }
        Err(_) => {
            warn!("OTEL_EDGE_CONFIG not set, using defaults (no exporters)");
            Config::default()
        }
    };
    config.print_config();

    let transport = TransportService::from_config(&config).expect("Failed to build transport");
    transport.start();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let mut relayed = 0u64;
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if let Some(record) = parse_line(&line) {
                        transport.enqueue(EventQueueItem::new(LogItem::new(record)));
                        relayed += 1;
                    }
                }
                Ok(None) => {
                    info!("Input closed");
                    break;
                }
                Err(e) => {
                    warn!("Failed to read stdin: {}", e);
                    break;
                }
            },
        }
    }

    info!(lines = relayed, queued = transport.queue().len(), "Flushing before exit");

    match tokio::time::timeout(DRAIN_TIMEOUT, transport.shutdown()).await {
        Ok(exported) => debug!(items = exported, "Final drain exported"),
        Err(_) => warn!("Drain timeout reached, {} items left unsent", transport.queue().len()),
    }

    info!("Shutdown complete");
}

/// Turn one input line into a log record. Blank lines are skipped.
fn parse_line(line: &str) -> Option<LogRecord> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    if trimmed.starts_with('{') {
        if let Ok(input) = serde_json::from_str::<InputLine>(trimmed) {
            let severity = input
                .severity
                .as_deref()
                .and_then(Severity::parse)
                .unwrap_or_default();
            return Some(LogRecord::new(severity, input.body).with_attributes(input.attributes));
        }
    }

    let mut attributes = Attributes::new();
    attributes.insert("log.source".to_string(), AttributeValue::from("stdin"));
    Some(LogRecord::new(Severity::Info, trimmed).with_attributes(attributes))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}
