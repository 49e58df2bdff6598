//! Prometheus metrics exporter.
//!
//! Uses the built-in HTTP listener from `metrics-exporter-prometheus`.
//! This is separate from the ingestion server's `GET /metrics` route,
//! which returns a JSON event summary for dashboards.

use std::net::SocketAddr;

use anyhow::Result;
use logwarden_core::config::MetricsConfig;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};

/// Install the global metrics recorder and start the HTTP listener.
///
/// Call once per process. Afterwards every `metrics::counter!()`,
/// `metrics::gauge!()` and `metrics::histogram!()` call is exported.
///
/// # Errors
///
/// - The endpoint is not `/metrics`
/// - The listen address does not parse
/// - A global recorder is already installed
pub fn install_metrics_recorder(config: &MetricsConfig) -> Result<()> {
    if config.endpoint != "/metrics" {
        return Err(anyhow::anyhow!(
            "unsupported metrics endpoint '{}': only '/metrics' is currently supported",
            config.endpoint
        ));
    }

    let addr = listen_addr(config)?;
    if addr.ip().is_unspecified() {
        tracing::warn!(
            listen_addr = %addr,
            "metrics endpoint is exposed on all interfaces; restrict listen_addr in untrusted networks"
        );
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Suffix("_duration_seconds".to_owned()),
            &logwarden_core::metrics::CYCLE_DURATION_BUCKETS,
        )
        .map_err(|e| anyhow::anyhow!("invalid histogram buckets: {}", e))?
        .install()
        .map_err(|e| anyhow::anyhow!("failed to install metrics recorder: {}", e))?;

    logwarden_core::metrics::describe_all();

    tracing::info!(listen_addr = %addr, "Prometheus metrics endpoint active");
    Ok(())
}

/// Parse `listen_addr:port` into a socket address.
pub fn listen_addr(config: &MetricsConfig) -> Result<SocketAddr> {
    format!("{}:{}", config.listen_addr, config.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid metrics listen address: {}", e))
}
