//! Per-connection identity and outcome.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing spans
//! - Summarize how each exchange ended, for logs

use std::sync::atomic::{AtomicU64, Ordering};

use crate::http::request::{FramingReport, Route};

/// Relaxed ordering is enough; IDs only need to be unique.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// How one request/response exchange went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeSummary {
    pub id: ConnectionId,
    pub route: Route,
    pub body_bytes: usize,
    pub response_bytes: usize,
    pub framing: FramingReport,
    /// Set when the response could not be written in full.
    pub write_error: Option<String>,
}

impl ExchangeSummary {
    /// True when the client received a full response and nothing timed out.
    pub fn is_clean(&self) -> bool {
        self.write_error.is_none()
            && self.framing.io_error.is_none()
            && !self.framing.header_timed_out
            && !self.framing.body_timed_out
    }
}
