use std::sync::Arc;
use tracing::info;

use super::http::HttpTransport;
use super::otlp::{OtlpLogExporter, OtlpTraceExporter};
use super::replay::ReplayExporter;
use super::sampling::{SampledKind, SamplingExporter};
use super::{ExportError, Exporter};
use crate::config::Config;
use crate::sampling::ExportSampler;
use crate::session::SessionProvider;

pub struct Exporters;

impl Exporters {
    /// Build every exporter enabled in `config`. Log and span exporters are
    /// wrapped in a sampling decorator sharing `sampler`, each sampling only
    /// the records its exporter sends.
    pub fn init(
        config: &Config,
        session: Arc<dyn SessionProvider>,
        sampler: Arc<dyn ExportSampler>,
    ) -> Result<Vec<Arc<dyn Exporter>>, ExportError> {
        let mut exporters: Vec<Arc<dyn Exporter>> = Vec::new();

        if let Some(ref otlp) = config.exporters.otlp {
            let transport = Arc::new(HttpTransport::new(otlp.to_http_config())?);
            let runtime = otlp.to_runtime_config();
            let resource = config.service.to_resource_info();

            if runtime.export_logs {
                let logs = OtlpLogExporter::new(
                    transport.clone(),
                    runtime.logs_url(),
                    resource.clone(),
                    session.clone(),
                );
                info!(url = %runtime.logs_url(), "OTLP log exporter enabled");
                exporters.push(Arc::new(
                    SamplingExporter::new(Arc::new(logs), sampler.clone()).with_kind(SampledKind::Logs),
                ));
            }

            if runtime.export_traces {
                let traces = OtlpTraceExporter::new(
                    transport.clone(),
                    runtime.traces_url(),
                    resource,
                    session.clone(),
                );
                info!(url = %runtime.traces_url(), "OTLP trace exporter enabled");
                exporters.push(Arc::new(
                    SamplingExporter::new(Arc::new(traces), sampler.clone()).with_kind(SampledKind::Spans),
                ));
            }
        }

        if let Some(ref replay) = config.exporters.replay {
            let transport = Arc::new(HttpTransport::new(replay.to_http_config())?);
            info!(url = %replay.endpoint, "Replay exporter enabled");
            exporters.push(Arc::new(ReplayExporter::new(
                transport,
                replay.to_runtime_config(),
                session.clone(),
            )));
        }

        Ok(exporters)
    }
}
