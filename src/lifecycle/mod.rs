//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Read model file → DenseEngine → ModelHandle::initialize
//!
//! Signals (signals.rs):
//!     Ctrl-C → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     Broadcast observed by the accept loop between connections
//! ```
//!
//! # Design Decisions
//! - A model that fails to load is logged, not fatal; the service stays up uninitialized
//! - The in-flight connection always finishes before the loop exits

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::trigger_on_ctrl_c;
pub use startup::{load_model, ModelLoadError};
