//! Digit Relay Library
//!
//! A single-threaded HTTP service that classifies 28x28 grayscale digits with
//! a quantized int8 model and relays each successful prediction to a peer.

// Core subsystems
pub mod config;
pub mod http;
pub mod inference;
pub mod net;
pub mod pixels;
pub mod relay;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::schema::ServiceConfig;
pub use http::PredictionServer;
pub use inference::{InferenceEngine, InferenceResult, ModelHandle};
pub use lifecycle::Shutdown;
