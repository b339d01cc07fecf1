//! Prometheus metrics for the event consumers.
//!
//! The processor records `notifications_processed_total` and
//! `notification_delivery_duration_seconds` itself; this module adds the
//! transport-side counters and owns the exporter.

use metrics::counter;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tracing::info;

static PROMETHEUS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the Prometheus recorder. Subsequent calls are no-ops.
pub fn init_metrics() -> Result<(), BuildError> {
    PROMETHEUS_HANDLE.get_or_try_init(|| {
        let handle = PrometheusBuilder::new().install_recorder()?;
        info!("Prometheus metrics initialized");
        Ok::<_, BuildError>(handle)
    })?;
    Ok(())
}

/// Render metrics in Prometheus text format; empty before `init_metrics`.
pub fn render_metrics() -> String {
    PROMETHEUS_HANDLE
        .get()
        .map(|h| h.render())
        .unwrap_or_default()
}

pub fn event_received(stream: &str) {
    counter!("notifier_events_received_total", "stream" => stream.to_string()).increment(1);
}

/// Event handled, labelled by what the listener reported.
pub fn event_handled(stream: &str, outcome: &'static str) {
    counter!(
        "notifier_events_handled_total",
        "stream" => stream.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn event_panicked(stream: &str) {
    counter!("notifier_event_panics_total", "stream" => stream.to_string()).increment(1);
}

pub fn ack_failed(stream: &str) {
    counter!("notifier_ack_failures_total", "stream" => stream.to_string()).increment(1);
}
