//! Prometheus metrics for the revize backend.
//!
//! Recording goes through the `metrics` facade; the exporter handle is kept so
//! the HTTP layer can render the current values at `/metrics`.

use std::fmt;
use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

use crate::common::error::{Result, RevizeError};

/// Every metric name used by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Registry
    RegistryVerifications,
    RegistryFetchDuration,
    RegistryPayloadBytes,

    // Numbering
    NumbersAssigned,
    NumberSequenceConflicts,
    NumberAllocationsExhausted,

    // Documents
    DocumentsCreated,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::RegistryVerifications => "revize_registry_verifications_total",
            MetricName::RegistryFetchDuration => "revize_registry_fetch_duration_seconds",
            MetricName::RegistryPayloadBytes => "revize_registry_payload_bytes",
            MetricName::NumbersAssigned => "revize_numbers_assigned_total",
            MetricName::NumberSequenceConflicts => "revize_number_sequence_conflicts_total",
            MetricName::NumberAllocationsExhausted => "revize_number_allocations_exhausted_total",
            MetricName::DocumentsCreated => "revize_documents_created_total",
        }
    }

    pub fn all_metrics() -> impl Iterator<Item = MetricName> {
        use MetricName::*;
        [
            RegistryVerifications,
            RegistryFetchDuration,
            RegistryPayloadBytes,
            NumbersAssigned,
            NumberSequenceConflicts,
            NumberAllocationsExhausted,
            DocumentsCreated,
        ]
        .into_iter()
    }

    /// (area, description)
    pub fn metadata(&self) -> (&'static str, &'static str) {
        match self {
            MetricName::RegistryVerifications => ("registry", "Registry lookups by outcome status"),
            MetricName::RegistryFetchDuration => ("registry", "Time spent fetching the listing"),
            MetricName::RegistryPayloadBytes => ("registry", "Size of fetched listing pages"),
            MetricName::NumbersAssigned => ("numbering", "Evidence numbers assigned by class"),
            MetricName::NumberSequenceConflicts => {
                ("numbering", "Inserts rejected on a duplicate number")
            }
            MetricName::NumberAllocationsExhausted => {
                ("numbering", "Allocations that ran out of attempts")
            }
            MetricName::DocumentsCreated => ("documents", "Documents created by class"),
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Calling it again is a no-op.
pub fn init() -> Result<()> {
    if METRICS_HANDLE.get().is_some() {
        return Ok(());
    }
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| RevizeError::Config(format!("failed to install Prometheus recorder: {e}")))?;
    for name in MetricName::all_metrics() {
        let (_, description) = name.metadata();
        if name.as_str().ends_with("_total") {
            ::metrics::describe_counter!(name.as_str(), description);
        } else {
            ::metrics::describe_histogram!(name.as_str(), description);
        }
    }
    METRICS_HANDLE.set(handle).ok();
    info!("Metrics recorder installed");
    Ok(())
}

/// Current metrics in Prometheus text format, empty if `init` was never called.
pub fn render() -> String {
    METRICS_HANDLE
        .get()
        .map(PrometheusHandle::render)
        .unwrap_or_default()
}

pub mod registry {
    use super::MetricName;

    pub fn verification_recorded(status: &str) {
        ::metrics::counter!(
            MetricName::RegistryVerifications.as_str(),
            "status" => status.to_string()
        )
        .increment(1);
    }

    pub fn fetch_duration(source: &str, secs: f64) {
        ::metrics::histogram!(
            MetricName::RegistryFetchDuration.as_str(),
            "source" => source.to_string()
        )
        .record(secs);
    }

    pub fn payload_bytes(bytes: usize) {
        ::metrics::histogram!(MetricName::RegistryPayloadBytes.as_str()).record(bytes as f64);
    }
}

pub mod numbering {
    use super::MetricName;

    pub fn number_assigned(class: &str) {
        ::metrics::counter!(MetricName::NumbersAssigned.as_str(), "class" => class.to_string())
            .increment(1);
    }

    pub fn sequence_conflict(class: &str) {
        ::metrics::counter!(
            MetricName::NumberSequenceConflicts.as_str(),
            "class" => class.to_string()
        )
        .increment(1);
    }

    pub fn allocation_exhausted(class: &str) {
        ::metrics::counter!(
            MetricName::NumberAllocationsExhausted.as_str(),
            "class" => class.to_string()
        )
        .increment(1);
    }
}

pub mod documents {
    use super::MetricName;

    pub fn created(class: &str) {
        ::metrics::counter!(MetricName::DocumentsCreated.as_str(), "class" => class.to_string())
            .increment(1);
    }
}
