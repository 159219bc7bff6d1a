//! Inference engine contract and the long-lived model handle.
//!
//! # Lifecycle
//! ```text
//! ModelHandle::new(engine)      not initialized, predict path disabled
//!     → initialize()            once, at startup
//!     → classify() per request  engine tensors reused, nothing else mutated
//! ```

use thiserror::Error;

use crate::inference::quantize::QuantizationParams;

/// Output classes every engine must produce, one per digit.
pub const DIGIT_CLASSES: usize = 10;

/// Failures reported by an inference engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("Model not initialized")]
    NotInitialized,

    #[error("Model schema version {found} does not match supported version {expected}")]
    VersionMismatch { found: u32, expected: u32 },

    #[error("Invalid model: {0}")]
    InvalidModel(String),

    #[error("Failed to allocate {bytes} bytes for {purpose}")]
    Allocation { purpose: &'static str, bytes: usize },

    #[error("Tensor allocation failed: {required} bytes needed, arena holds {available}")]
    TensorAllocation { required: usize, available: usize },

    #[error("Input tensor expects {expected} values, got {actual}")]
    InputShape { expected: usize, actual: usize },

    #[error("{0}")]
    Invoke(String),
}

/// Read-only view of the engine's output tensor.
#[derive(Debug, Clone, Copy)]
pub struct OutputTensor<'a> {
    /// One signed 8-bit score per class.
    pub scores: &'a [i8],
    pub params: QuantizationParams,
}

/// A fixed-point classifier the orchestrator can drive.
///
/// Implementations own their model buffer, working arena and tensors.
pub trait InferenceEngine: Send {
    /// Load the model and allocate tensors. Called once.
    fn initialize(&mut self) -> Result<(), EngineError>;

    /// Quantization parameters of the input tensor.
    fn input_params(&self) -> QuantizationParams;

    /// Number of values the input tensor holds.
    fn input_len(&self) -> usize;

    /// Copy a quantized input into the input tensor.
    fn set_input(&mut self, input: &[i8]) -> Result<(), EngineError>;

    /// Run the model on the current input.
    fn invoke(&mut self) -> Result<(), EngineError>;

    /// Output of the last successful invocation, [`DIGIT_CLASSES`] scores long.
    fn read_output(&self) -> OutputTensor<'_>;

    /// Bytes held by the engine for its model and arena.
    fn resident_bytes(&self) -> usize {
        0
    }
}

/// Owns one engine and records whether it finished initializing.
pub struct ModelHandle {
    engine: Box<dyn InferenceEngine>,
    initialized: bool,
    input: Vec<i8>,
}

impl ModelHandle {
    pub fn new(engine: Box<dyn InferenceEngine>) -> Self {
        Self {
            engine,
            initialized: false,
            input: Vec::new(),
        }
    }

    /// Initialize the engine. A second call is a no-op.
    pub fn initialize(&mut self) -> Result<(), EngineError> {
        if self.initialized {
            return Ok(());
        }

        self.engine.initialize()?;

        let len = self.engine.input_len();
        let mut input = Vec::new();
        input
            .try_reserve_exact(len)
            .map_err(|_| EngineError::Allocation {
                purpose: "input staging buffer",
                bytes: len,
            })?;
        input.resize(len, 0);
        self.input = input;

        self.initialized = true;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Bytes the model currently holds, for the heap diagnostic.
    pub fn resident_bytes(&self) -> usize {
        self.engine.resident_bytes() + self.input.capacity()
    }

    pub(crate) fn parts(&mut self) -> (&mut dyn InferenceEngine, &mut [i8]) {
        (self.engine.as_mut(), &mut self.input)
    }
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("initialized", &self.initialized)
            .field("input_len", &self.input.len())
            .finish()
    }
}
