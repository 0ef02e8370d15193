//! Metrics for the inventory service
//!
//! Counters use the standard Prometheus naming conventions. Recording is a
//! no-op until `init_metrics` installs a recorder, so tests and CLI commands
//! can call these functions freely.

use std::fmt;
use std::sync::OnceLock;
use tracing::{info, warn};

static HANDLE: OnceLock<metrics_exporter_prometheus::PrometheusHandle> = OnceLock::new();

/// All metric names used in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    Searches,
    Saves,
    ImageLookups,
    StoreErrors,
    Enquiries,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::Searches => "inventory_searches_total",
            MetricName::Saves => "inventory_saves_total",
            MetricName::ImageLookups => "inventory_image_lookups_total",
            MetricName::StoreErrors => "inventory_store_errors_total",
            MetricName::Enquiries => "inventory_enquiries_total",
        }
    }

    fn description(&self) -> &'static str {
        match self {
            MetricName::Searches => "Client catalog searches executed",
            MetricName::Saves => "Catalog form submissions by outcome",
            MetricName::ImageLookups => "Image resolver lookups by result",
            MetricName::StoreErrors => "Catalog store operations that failed",
            MetricName::Enquiries => "Enquiry messages composed",
        }
    }

    pub fn all() -> impl Iterator<Item = MetricName> {
        [
            MetricName::Searches,
            MetricName::Saves,
            MetricName::ImageLookups,
            MetricName::StoreErrors,
            MetricName::Enquiries,
        ]
        .into_iter()
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Install the Prometheus recorder. Idempotent; the server exposes the
/// rendered output on `/metrics`.
pub fn init_metrics() {
    if HANDLE.get().is_some() {
        return;
    }

    match metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            let _ = HANDLE.set(handle);
            for name in MetricName::all() {
                metrics::describe_counter!(name.as_str(), name.description());
            }
            info!("Prometheus recorder installed");
        }
        Err(e) => warn!("Failed to install Prometheus recorder: {}", e),
    }
}

/// Current metrics in Prometheus text format, if a recorder is installed
pub fn render() -> Option<String> {
    HANDLE.get().map(|h| h.render())
}

pub fn search_executed() {
    metrics::counter!(MetricName::Searches.as_str()).increment(1);
}

pub fn save_recorded(outcome: &'static str) {
    metrics::counter!(MetricName::Saves.as_str(), "outcome" => outcome).increment(1);
}

pub fn image_lookup(result: &'static str) {
    metrics::counter!(MetricName::ImageLookups.as_str(), "result" => result).increment(1);
}

pub fn store_error(op: &'static str) {
    metrics::counter!(MetricName::StoreErrors.as_str(), "op" => op).increment(1);
}

pub fn enquiry_composed() {
    metrics::counter!(MetricName::Enquiries.as_str()).increment(1);
}
