//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! query + transaction subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → Log aggregation of the embedding host
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Structured logging with tracing fields, never private keys
//! - Correlation IDs of transaction operations appear in log fields
//! - Metrics are cheap (no-ops without a recorder)

pub mod logging;
pub mod metrics;

use std::net::SocketAddr;

use crate::config::ObservabilityConfig;

/// Install logging and, when enabled, the metrics exporter.
///
/// Nothing in the crate calls this; embedding hosts opt in.
pub fn init(config: &ObservabilityConfig) {
    logging::init_logging(config);

    if config.metrics_enabled {
        match config.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                address = %config.metrics_address,
                error = %e,
                "Invalid metrics address"
            ),
        }
    }
}
