use axum::{routing::get, Router};
use metrics::gauge;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::config::DedupSettings;

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder and publish the dedup settings
    /// as static gauges. Fails if a recorder is already installed.
    pub fn init(dedup: &DedupSettings) -> Result<Self, BuildError> {
        let handle = PrometheusBuilder::new().install_recorder()?;

        gauge!("dedup_window_secs").set(dedup.window_secs as f64);
        gauge!("dedup_capacity").set(dedup.capacity as f64);

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
