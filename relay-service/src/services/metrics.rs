//! Prometheus metrics for relay-service.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use service_core::error::AppError;
use std::sync::OnceLock;

pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global Prometheus recorder. Only the first call has an effect.
pub fn init_metrics() -> Result<(), AppError> {
    if METRICS_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
        AppError::ConfigError(anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))
    })?;

    METRICS_HANDLE.set(handle).ok();
    Ok(())
}

/// Get metrics output in Prometheus text format.
pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string())
}

/// Count one relay request by how it ended.
pub fn record_relay_outcome(outcome: &'static str) {
    metrics::counter!("relay_requests_total", "outcome" => outcome).increment(1);
}

/// Count one call to the push provider.
pub fn record_provider_call(provider: &'static str, status: &'static str) {
    metrics::counter!(
        "relay_provider_calls_total",
        "provider" => provider,
        "status" => status
    )
    .increment(1);
}
