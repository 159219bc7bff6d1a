//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (bind, accept one at a time)
//!     → connection.rs (connection ID, exchange summary)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - One connection in flight at a time; the accept loop is the only scheduler
//! - Accept errors are reported, never fatal

pub mod connection;
pub mod listener;

pub use connection::{ConnectionId, ExchangeSummary};
pub use listener::{Listener, ListenerError};
