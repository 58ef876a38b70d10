// src/metrics.rs
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

#[derive(Clone)]
pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder once per process and describe our series.
    ///
    /// Later calls (tests build many routers) reuse the first handle.
    pub fn init() -> Self {
        static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();
        let handle = HANDLE
            .get_or_init(|| {
                let handle = match PrometheusBuilder::new().install_recorder() {
                    Ok(h) => h,
                    Err(e) => {
                        tracing::warn!(error = %e, "prometheus recorder not installed");
                        PrometheusBuilder::new().build_recorder().handle()
                    }
                };
                describe();
                handle
            })
            .clone();
        Self { handle }
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

fn describe() {
    describe_counter!("pulse_fetch_total", "Fetch cycles started, by trigger.");
    describe_counter!("pulse_fetch_errors_total", "Fetch cycles that failed.");
    describe_counter!(
        "pulse_parse_degraded_total",
        "Model answers that could not be read and counted as zero items."
    );
    describe_counter!(
        "pulse_items_rejected_total",
        "Array elements in a model answer that were not readable items."
    );
    describe_counter!("pulse_items_new_total", "Items newly added by merges.");
    describe_counter!("pulse_poll_ticks_total", "Refresh timer firings.");
    describe_histogram!("pulse_fetch_ms", "Model round-trip time in milliseconds.");
    describe_gauge!("pulse_sessions_active", "Open search sessions.");
    describe_counter!("pulse_sessions_reaped_total", "Sessions closed for being idle.");
}
