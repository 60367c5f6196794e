// src/metrics.rs
use std::net::SocketAddr;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;

const ENV_METRICS_ADDR: &str = "GATOR_METRICS_ADDR";

/// Install the Prometheus recorder with its own `/metrics` listener when
/// `$GATOR_METRICS_ADDR` is set (e.g. `127.0.0.1:9000`). Without it the
/// counters are no-ops. Must be called from inside the Tokio runtime.
pub fn init_from_env() -> Result<Option<SocketAddr>> {
    let Ok(raw) = std::env::var(ENV_METRICS_ADDR) else {
        return Ok(None);
    };
    let addr = parse_addr(&raw)?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("prometheus: install recorder")?;

    crate::ingest::ensure_metrics_described();
    tracing::info!(%addr, "prometheus exporter listening");
    Ok(Some(addr))
}

fn parse_addr(raw: &str) -> Result<SocketAddr> {
    raw.trim()
        .parse::<SocketAddr>()
        .with_context(|| format!("{ENV_METRICS_ADDR} is not a socket address: {raw:?}"))
}
