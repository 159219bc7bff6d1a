//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Server, inference and relay produce:
//!     → logging.rs (structured tracing events, connection spans)
//!     → metrics.rs (counters and a latency histogram)
//!
//! Consumers:
//!     → stdout (tracing-subscriber fmt layer)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - `RUST_LOG` overrides the configured level
//! - Metric updates are no-ops until an exporter is installed

pub mod logging;
pub mod metrics;
