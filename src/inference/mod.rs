//! Inference subsystem.
//!
//! # Data Flow
//! ```text
//! PixelImage (784 × u8)
//!     → quantize.rs (p / 255 / scale + zero_point, clamp to i8)
//!     → engine.rs (InferenceEngine: set_input → invoke → read_output)
//!     → orchestrator.rs (argmax, first maximum wins)
//!     → quantize.rs (dequantize winning score)
//!     → InferenceResult
//! ```
//!
//! # Design Decisions
//! - The engine sits behind a narrow trait; `dense.rs` is the shipped implementation
//! - `ModelHandle` is built and initialized once at startup, then lent `&mut` per request
//! - Failures never escape `classify`; they become unsuccessful results

pub mod dense;
pub mod engine;
pub mod orchestrator;
pub mod quantize;

pub use dense::{DenseEngine, DenseModel};
pub use engine::{EngineError, InferenceEngine, ModelHandle, OutputTensor, DIGIT_CLASSES};
pub use orchestrator::{argmax, classify, InferenceResult, NO_DIGIT};
pub use quantize::{dequantize, quantize_image, quantize_pixel, QuantizationParams};
