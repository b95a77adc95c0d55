//! Prometheus Metrics Definitions
//!
//! All metrics are registered in the default registry and exposed at
//! `/metrics` in text format.

use axum::{http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

use crate::error::{ApiError, ApiResult};

/// HTTP request latency buckets (seconds)
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0,
];

/// Global metrics instance
pub static METRICS: Lazy<ApiResult<CrmMetrics>> = Lazy::new(CrmMetrics::new);

/// Registered metrics, or `None` when registration failed at startup.
pub fn metrics() -> Option<&'static CrmMetrics> {
    METRICS.as_ref().ok()
}

#[derive(Clone)]
pub struct CrmMetrics {
    /// labels: method, path, status
    pub http_requests_total: CounterVec,

    /// labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// CSV rows seen by the import pipeline - labels: stage, outcome
    pub import_rows_total: CounterVec,

    /// Service-contract workflow runs - labels: operation, status
    pub contract_operations_total: CounterVec,

    /// Calendar sync attempts - labels: status
    pub calendar_sync_total: CounterVec,
}

fn registration_error(name: &str, e: prometheus::Error) -> ApiError {
    ApiError::internal_error(format!("Failed to register {}: {}", name, e))
}

impl CrmMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "crm_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )
            .map_err(|e| registration_error("http_requests_total", e))?,

            http_request_duration_seconds: register_histogram_vec!(
                "crm_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| registration_error("http_request_duration_seconds", e))?,

            import_rows_total: register_counter_vec!(
                "crm_import_rows_total",
                "CSV lead import rows by pipeline stage and outcome",
                &["stage", "outcome"]
            )
            .map_err(|e| registration_error("import_rows_total", e))?,

            contract_operations_total: register_counter_vec!(
                "crm_contract_operations_total",
                "Service contract workflow operations",
                &["operation", "status"]
            )
            .map_err(|e| registration_error("contract_operations_total", e))?,

            calendar_sync_total: register_counter_vec!(
                "crm_calendar_sync_total",
                "Calendar sync deliveries",
                &["status"]
            )
            .map_err(|e| registration_error("calendar_sync_total", e))?,
        })
    }

    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    /// Count `rows` import rows for a stage (`staged`, `confirmed`) and outcome.
    pub fn record_import_rows(&self, stage: &str, outcome: &str, rows: usize) {
        self.import_rows_total
            .with_label_values(&[stage, outcome])
            .inc_by(rows as f64);
    }

    pub fn record_contract_operation(&self, operation: &str, success: bool) {
        let status = if success { "success" } else { "error" };
        self.contract_operations_total
            .with_label_values(&[operation, status])
            .inc();
    }

    pub fn record_calendar_sync(&self, success: bool) {
        let status = if success { "success" } else { "failure" };
        self.calendar_sync_total.with_label_values(&[status]).inc();
    }
}

/// Handler for GET /metrics endpoint.
#[utoipa::path(
    get,
    path = "/metrics",
    tag = "Observability",
    responses(
        (status = 200, description = "Prometheus metrics in text format", content_type = "text/plain"),
        (status = 500, description = "Failed to encode metrics"),
    ),
)]
pub async fn metrics_handler() -> impl IntoResponse {
    // Make sure the CRM metrics exist even before the first request
    let _ = metrics();

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::core::Collector;

    fn registered() -> Result<&'static CrmMetrics, String> {
        METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e.message))
    }

    #[test]
    fn test_metrics_creation() -> Result<(), String> {
        let metrics = registered()?;
        assert!(!metrics.http_requests_total.desc().is_empty());
        Ok(())
    }

    #[test]
    fn test_record_workflow_metrics() -> Result<(), String> {
        let metrics = registered()?;
        metrics.record_http_request("GET", "/api/v1/leads", 200, 0.015);
        metrics.record_import_rows("staged", "valid", 3);
        metrics.record_contract_operation("complete", true);
        metrics.record_calendar_sync(false);

        let before = metrics
            .import_rows_total
            .with_label_values(&["confirmed", "created"])
            .get();
        metrics.record_import_rows("confirmed", "created", 2);
        let after = metrics
            .import_rows_total
            .with_label_values(&["confirmed", "created"])
            .get();
        assert!(after - before >= 2.0);
        Ok(())
    }
}
