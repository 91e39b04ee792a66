use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use super::http::{HttpTransport, CONTENT_TYPE_JSON};
use super::{ExportError, Exporter};
use crate::model::{ScreenImageItem, TouchItemPayload, TouchKind};
use crate::pipeline::EventQueueItem;
use crate::session::SessionProvider;

#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// Full ingest URL of the session-replay backend
    pub endpoint: String,
}

#[derive(Serialize)]
struct ReplayPayload<'a> {
    session_id: String,
    events: Vec<ReplayEvent<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ReplayEvent<'a> {
    Touch {
        timestamp_ms: u64,
        kind: TouchKind,
        x: f64,
        y: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        target: Option<&'a str>,
        #[serde(skip_serializing_if = "Option::is_none")]
        view_name: Option<&'a str>,
    },
    Screen {
        timestamp_ms: u64,
        width: u32,
        height: u32,
        format: &'a str,
        data: String,
    },
}

fn to_replay_event(item: &EventQueueItem) -> Option<ReplayEvent<'_>> {
    let timestamp_ms = item.timestamp_millis();

    if let Some(touch) = item.downcast::<TouchItemPayload>() {
        return Some(ReplayEvent::Touch {
            timestamp_ms,
            kind: touch.kind,
            x: touch.x,
            y: touch.y,
            target: touch.target.as_deref(),
            view_name: touch.view_name.as_deref(),
        });
    }

    item.downcast::<ScreenImageItem>().map(|image| ReplayEvent::Screen {
        timestamp_ms,
        width: image.width,
        height: image.height,
        format: &image.format,
        data: STANDARD.encode(&image.data),
    })
}

/// Sends touch and screen-frame payloads to the session-replay backend as
/// one JSON document per batch.
pub struct ReplayExporter {
    transport: Arc<HttpTransport>,
    config: ReplayConfig,
    session: Arc<dyn SessionProvider>,
}

impl ReplayExporter {
    pub fn new(
        transport: Arc<HttpTransport>,
        config: ReplayConfig,
        session: Arc<dyn SessionProvider>,
    ) -> Self {
        Self {
            transport,
            config,
            session,
        }
    }
}

#[async_trait]
impl Exporter for ReplayExporter {
    async fn export(&self, items: &[EventQueueItem]) -> Result<(), ExportError> {
        let events: Vec<ReplayEvent<'_>> = items.iter().filter_map(to_replay_event).collect();
        if events.is_empty() {
            return Ok(());
        }

        let count = events.len();
        let payload = ReplayPayload {
            session_id: self.session.session_id(),
            events,
        };
        let body = serde_json::to_vec(&payload).map_err(|e| ExportError::Encode(e.to_string()))?;

        self.transport
            .post(&self.config.endpoint, CONTENT_TYPE_JSON, body, None)
            .await?;

        debug!(events = count, "Exported replay events");
        Ok(())
    }

    fn name(&self) -> &str {
        "replay"
    }
}
