//! Pixel input subsystem.
//!
//! # Data Flow
//! ```text
//! request body (free-form text)
//!     → decoder.rs (locate "pixels" array, scan tokens, clamp)
//!     → image.rs (PixelImage, exactly 784 bytes)
//!     → inference orchestrator
//! ```

pub mod decoder;
pub mod image;

pub use decoder::{decode_pixels, DecodeError, PixelScanner};
pub use image::{PixelImage, IMAGE_PIXELS, IMAGE_SIDE};
