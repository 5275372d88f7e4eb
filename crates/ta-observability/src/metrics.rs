//! Metrics infrastructure.
//!
//! The services record counters through the `metrics` facade:
//!
//! | Metric | Meaning |
//! |--------|---------|
//! | `ta_incidents_indexed_total` | Incidents embedded and upserted |
//! | `ta_categorization_batches_total` | Categorization batches served |
//! | `ta_categorization_tokens_total` | Tokens consumed by categorization |

use metrics::describe_counter;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Installs the Prometheus recorder and returns its render handle.
///
/// Call once at startup; recording through the `metrics` macros is a no-op
/// until a recorder is installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    describe_counter!(
        "ta_incidents_indexed_total",
        "Incidents embedded and upserted into the incident store"
    );
    describe_counter!(
        "ta_categorization_batches_total",
        "Categorization batches served across all streams"
    );
    describe_counter!(
        "ta_categorization_tokens_total",
        "Tokens consumed by categorization engine calls"
    );

    Ok(handle)
}
