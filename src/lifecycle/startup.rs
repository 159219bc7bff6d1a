//! Model loading at startup.
//!
//! # Responsibilities
//! - Read the model file named in config
//! - Build the reference engine and initialize it once
//!
//! # Design Decisions
//! - Failures are returned alongside a usable, uninitialized handle
//! - The model file is read once; nothing is persisted at runtime

use std::path::Path;

use thiserror::Error;

use crate::config::ModelConfig;
use crate::inference::{DenseEngine, EngineError, ModelHandle};

/// Why the model did not come up.
#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("Failed to read model file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Build the model handle described by `config`.
///
/// The handle is always returned. On failure it is uninitialized and the
/// error says why.
pub fn load_model(config: &ModelConfig) -> (ModelHandle, Option<ModelLoadError>) {
    let source = match std::fs::read(Path::new(&config.path)) {
        Ok(bytes) => bytes,
        Err(source) => {
            let err = ModelLoadError::Read {
                path: config.path.clone(),
                source,
            };
            tracing::error!(error = %err, "Model unavailable; predictions disabled");
            let handle = ModelHandle::new(Box::new(DenseEngine::new(Vec::new(), config.arena_bytes)));
            return (handle, Some(err));
        }
    };

    tracing::info!(path = %config.path, bytes = source.len(), "Model file read");

    let mut handle = ModelHandle::new(Box::new(DenseEngine::new(source, config.arena_bytes)));
    match handle.initialize() {
        Ok(()) => {
            tracing::info!(resident_bytes = handle.resident_bytes(), "Model initialized");
            (handle, None)
        }
        Err(e) => {
            tracing::error!(error = %e, "Model initialization failed; predictions disabled");
            (handle, Some(ModelLoadError::Engine(e)))
        }
    }
}
