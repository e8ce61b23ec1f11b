use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;
use thiserror::Error;

static EXPORTER: OnceCell<()> = OnceCell::new();
static PROMETHEUS_ENABLED: AtomicBool = AtomicBool::new(false);

#[derive(Debug, Error)]
pub enum ExporterError {
    #[error("invalid prometheus listen address `{listen}`: {source}")]
    Listen {
        listen: String,
        source: std::net::AddrParseError,
    },
    #[error("failed to install prometheus exporter: {0}")]
    Install(String),
}

pub fn try_init_prometheus(listen: &str) -> Result<(), ExporterError> {
    EXPORTER
        .get_or_try_init(|| {
            let addr: SocketAddr = listen.parse().map_err(|source| ExporterError::Listen {
                listen: listen.to_string(),
                source,
            })?;
            PrometheusBuilder::new()
                .with_http_listener(addr)
                .install()
                .map_err(|err| ExporterError::Install(err.to_string()))?;
            PROMETHEUS_ENABLED.store(true, Ordering::Relaxed);
            Ok(())
        })
        .map(|_| ())
}

pub fn prometheus_enabled() -> bool {
    PROMETHEUS_ENABLED.load(Ordering::Relaxed)
}
