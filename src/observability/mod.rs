//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Handlers and relay sessions produce:
//!     → logging.rs (structured tracing events, request ID on every line)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout
//!     → Prometheus scrape endpoint (optional)
//! ```

pub mod logging;
pub mod metrics;
