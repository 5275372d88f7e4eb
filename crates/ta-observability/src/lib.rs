//! # ta-observability
//!
//! Logging and metrics infrastructure for Triage Atlas.

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, init_logging_with_config, LoggingConfig};
pub use metrics::init_metrics;
