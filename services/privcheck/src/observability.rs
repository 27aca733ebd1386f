//! Observability wiring for privcheck.
//!
//! # Purpose
//! Initializes tracing and the Prometheus metrics recorder that collects the
//! counters emitted by `warden-authz`.
//!
//! # Notes
//! Initialization is guarded by `OnceLock` to keep startup idempotent in tests.
//! Logs go to stderr; stdout is reserved for command output.
use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
static OBS_INIT: OnceLock<()> = OnceLock::new();

pub fn init_observability(service_name: &str) -> Result<PrometheusHandle> {
    OBS_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init();
        tracing::debug!(service = service_name, "tracing initialized");
    });

    install_metrics_recorder()
}

fn install_metrics_recorder() -> Result<PrometheusHandle> {
    if let Some(handle) = METRICS_HANDLE.get() {
        return Ok(handle.clone());
    }
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .with_context(|| "install metrics recorder")?;
    let _ = METRICS_HANDLE.set(handle.clone());
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn install_metrics_recorder_is_cached() {
        let handle1 = install_metrics_recorder().expect("recorder");
        let handle2 = install_metrics_recorder().expect("recorder");
        let _ = (handle1.render(), handle2.render());
    }

    #[test]
    #[serial]
    fn init_observability_is_idempotent() {
        let handle1 = init_observability("privcheck-test").expect("init");
        let handle2 = init_observability("privcheck-test").expect("init");
        let _ = (handle1.render(), handle2.render());
    }
}
