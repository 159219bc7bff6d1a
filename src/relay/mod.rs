//! Peer notification subsystem.
//!
//! # Data Flow
//! ```text
//! Successful prediction
//!     → http/response.rs (status payload rendered once)
//!     → forwarder.rs (POST the same bytes to the configured peer)
//!     → outcome logged, never surfaced to the client
//! ```
//!
//! # Design Decisions
//! - Forwarding completes before the client's response is written
//! - One attempt per prediction, bounded by the peer timeout
//! - Failed predictions are never forwarded

pub mod forwarder;

pub use forwarder::{ForwardError, ForwardOutcome, ForwardReceipt, PeerForwarder};
