//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the digit relay.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (bind address, accept back-off).
    pub listener: ListenerConfig,

    /// Per-connection framing deadlines.
    pub timeouts: TimeoutConfig,

    /// Memory bounds for request framing.
    pub limits: LimitsConfig,

    /// Model file and working memory settings.
    pub model: ModelConfig,

    /// Peer device that receives successful predictions.
    pub peer: PeerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Delay before accepting again after an accept error.
    pub accept_retry_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            accept_retry_secs: 5,
        }
    }
}

impl ListenerConfig {
    pub fn accept_retry(&self) -> Duration {
        Duration::from_secs(self.accept_retry_secs)
    }
}

/// Deadlines applied while framing a single connection.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Wall-clock budget for the whole header section, in seconds.
    pub header_secs: u64,

    /// Budget for reading the body once headers are done, in seconds.
    pub body_secs: u64,

    /// Pause between flushing the response and closing the socket.
    pub close_grace_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            header_secs: 10,
            body_secs: 5,
            close_grace_ms: 100,
        }
    }
}

impl TimeoutConfig {
    pub fn header(&self) -> Duration {
        Duration::from_secs(self.header_secs)
    }

    pub fn body(&self) -> Duration {
        Duration::from_secs(self.body_secs)
    }

    pub fn close_grace(&self) -> Duration {
        Duration::from_millis(self.close_grace_ms)
    }
}

/// Memory bounds for request framing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Bodies are only buffered when the declared length is below this.
    pub max_body_bytes: usize,

    /// Longest header line retained; longer lines are cut.
    pub max_header_line_bytes: usize,

    /// Header lines retained beyond the request line.
    pub max_header_lines: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 50_000,
            max_header_line_bytes: 8 * 1024,
            max_header_lines: 64,
        }
    }
}

/// Model loading configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Path to the model file, read once at startup.
    pub path: String,

    /// Size of the working arena reserved for tensors.
    pub arena_bytes: usize,

    /// Memory budget the `heap_free` diagnostic is measured against.
    pub heap_budget_bytes: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: "model/digits.dgtm".to_string(),
            arena_bytes: 80 * 1024,
            heap_budget_bytes: 320 * 1024,
        }
    }
}

/// Peer device configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PeerConfig {
    /// Forward successful predictions to the peer.
    pub enabled: bool,

    /// Peer host name or IP address.
    pub host: String,

    /// Peer TCP port.
    pub port: u16,

    /// Request path on the peer (must start with '/').
    pub path: String,

    /// Total timeout for one forward, in seconds.
    pub timeout_secs: u64,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 80,
            path: "/receive".to_string(),
            timeout_secs: 5,
        }
    }
}

impl PeerConfig {
    /// Full URL the forwarder posts to.
    pub fn url(&self) -> String {
        format!("http://{}:{}{}", self.host, self.port, self.path)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
