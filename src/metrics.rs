// src/metrics.rs
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("judgment_calls_total", "Judgment requests issued, by task.");
        describe_counter!(
            "judgment_failures_total",
            "Judgment requests that errored or returned no object, by task."
        );
        describe_counter!(
            "analysis_fallbacks_total",
            "Stages that degraded to their canned fallback, by stage."
        );
        describe_counter!("signal_evaluations_total", "Signals evaluated.");
        describe_counter!("pipeline_runs_total", "Completed analysis runs.");
        describe_histogram!("pipeline_run_ms", "Analysis run time in milliseconds.");
        describe_counter!(
            "applicant_status_writes_total",
            "Accepted applicant status writes, by stage."
        );
    });
}

#[derive(Clone)]
pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder. Fails if one is already installed.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| anyhow::anyhow!("prometheus: install recorder: {e}"))?;
        ensure_metrics_described();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
