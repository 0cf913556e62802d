//! Metrics collection and Prometheus export.

use launcher_core::{ErrorKind, LauncherError, LauncherResult};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Metrics recorder for synthesis jobs.
///
/// All methods are no-ops until a recorder is installed.
#[derive(Debug, Clone, Copy, Default)]
pub struct LauncherMetrics;

impl LauncherMetrics {
    /// Install the Prometheus recorder and register metric descriptions.
    ///
    /// The returned handle renders the text exposition format.
    pub fn install() -> LauncherResult<PrometheusHandle> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| LauncherError::internal(format!("metrics init failed: {e}")))?;

        Self::register_metrics();

        Ok(handle)
    }

    fn register_metrics() {
        describe_counter!(
            "styletts_requests_total",
            "Total number of synthesis requests received"
        );
        describe_counter!(
            "styletts_requests_completed",
            "Synthesis requests whose output reached the cache"
        );
        describe_counter!(
            "styletts_requests_failed",
            "Synthesis requests that failed, labelled by error kind"
        );
        describe_counter!(
            "styletts_requests_timeout",
            "Inference processes killed after exceeding the timeout"
        );

        describe_histogram!(
            "styletts_inference_latency_ms",
            "Wall time of the inference process in milliseconds"
        );
        describe_histogram!(
            "styletts_total_latency_ms",
            "Total request latency in milliseconds"
        );

        describe_gauge!(
            "styletts_active_jobs",
            "Number of inference processes currently running"
        );
    }

    pub fn request_received(&self) {
        counter!("styletts_requests_total").increment(1);
    }

    pub fn request_completed(&self) {
        counter!("styletts_requests_completed").increment(1);
    }

    pub fn request_failed(&self, kind: ErrorKind) {
        counter!("styletts_requests_failed", "kind" => kind.as_str()).increment(1);
    }

    pub fn request_timeout(&self) {
        counter!("styletts_requests_timeout").increment(1);
    }

    pub fn record_inference_latency(&self, ms: f64) {
        histogram!("styletts_inference_latency_ms").record(ms);
    }

    pub fn record_total_latency(&self, ms: f64) {
        histogram!("styletts_total_latency_ms").record(ms);
    }

    pub fn job_started(&self) {
        gauge!("styletts_active_jobs").increment(1.0);
    }

    pub fn job_finished(&self) {
        gauge!("styletts_active_jobs").decrement(1.0);
    }
}
