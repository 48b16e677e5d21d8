use axum::extract::State;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Registers descriptions for the relay's metrics with the installed recorder.
pub fn describe() {
    metrics::describe_counter!(
        "compression_jobs_submitted_total",
        "Compression jobs accepted by the remote service"
    );
    metrics::describe_counter!(
        "compression_submit_failures_total",
        "Compression submissions that were rejected or failed in transit"
    );
    metrics::describe_counter!(
        "compression_jobs_completed_total",
        "Compression jobs reconciled as completed"
    );
    metrics::describe_counter!(
        "compression_jobs_failed_total",
        "Compression jobs reconciled as failed"
    );
    metrics::describe_counter!(
        "compression_poll_errors_total",
        "Status or result queries that failed during reconciliation"
    );
    metrics::describe_histogram!(
        "compression_reconcile_seconds",
        "Time to reconcile one batch of pending jobs"
    );
}

/// Prometheus metrics scrape endpoint.
pub async fn prometheus_metrics(State(handle): State<Arc<PrometheusHandle>>) -> impl IntoResponse {
    handle.render()
}
