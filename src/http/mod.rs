//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → request.rs (deadline-driven framing: request line, headers, body)
//!     → server.rs (route on request-line prefix, run the prediction)
//!     → response.rs (JSON status payload or help page, CORS headers)
//!     → Write, flush, close
//! ```
//!
//! # Design Decisions
//! - Hand-rolled HTTP/1.1 subset: one request per connection, no keep-alive
//! - Timeouts are never fatal; the handler proceeds with what it has

pub mod request;
pub mod response;
pub mod server;

pub use request::{read_request, FramingLimits, IncomingRequest, Route};
pub use response::{encode_status, help_page, HttpResponse, StatusPayload};
pub use server::PredictionServer;
