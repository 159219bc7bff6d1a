//! Reference engine: one fully connected int8 layer.
//!
//! # Model file layout (little-endian)
//! ```text
//! offset  size            field
//! 0       4               magic "DGTM"
//! 4       4   u32         schema version
//! 8       4   u32         input length
//! 12      4   u32         class count
//! 16      4   f32         input scale
//! 20      4   i32         input zero point
//! 24      4   f32         output scale
//! 28      4   i32         output zero point
//! 32      4   f32         accumulator → output multiplier
//! 36      n*c i8          weights, one row of `input length` per class
//! ..      4*c i32         biases
//! ```

use crate::inference::engine::{EngineError, InferenceEngine, OutputTensor, DIGIT_CLASSES};
use crate::inference::quantize::QuantizationParams;

pub const MODEL_MAGIC: &[u8; 4] = b"DGTM";
pub const SCHEMA_VERSION: u32 = 3;
const HEADER_LEN: usize = 36;

/// Decoded layer parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseModel {
    pub input_params: QuantizationParams,
    pub output_params: QuantizationParams,
    pub multiplier: f32,
    pub input_len: usize,
    /// Row-major `[class][input]`.
    pub weights: Vec<i8>,
    pub biases: Vec<i32>,
}

impl DenseModel {
    pub fn classes(&self) -> usize {
        self.biases.len()
    }

    /// Serialize into the model file layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.weights.len() + 4 * self.biases.len());
        out.extend_from_slice(MODEL_MAGIC);
        out.extend_from_slice(&SCHEMA_VERSION.to_le_bytes());
        out.extend_from_slice(&(self.input_len as u32).to_le_bytes());
        out.extend_from_slice(&(self.classes() as u32).to_le_bytes());
        out.extend_from_slice(&self.input_params.scale.to_le_bytes());
        out.extend_from_slice(&self.input_params.zero_point.to_le_bytes());
        out.extend_from_slice(&self.output_params.scale.to_le_bytes());
        out.extend_from_slice(&self.output_params.zero_point.to_le_bytes());
        out.extend_from_slice(&self.multiplier.to_le_bytes());
        out.extend(self.weights.iter().map(|&w| w as u8));
        for bias in &self.biases {
            out.extend_from_slice(&bias.to_le_bytes());
        }
        out
    }

    /// Parse and check a model file.
    pub fn parse(bytes: &[u8]) -> Result<Self, EngineError> {
        if bytes.is_empty() {
            return Err(EngineError::InvalidModel("model is empty".into()));
        }
        if bytes.len() < HEADER_LEN {
            return Err(EngineError::InvalidModel(format!(
                "header truncated at {} bytes",
                bytes.len()
            )));
        }
        if &bytes[..4] != MODEL_MAGIC {
            return Err(EngineError::InvalidModel("bad magic".into()));
        }

        let mut fields = FieldReader::new(&bytes[4..HEADER_LEN]);
        let version = fields.u32();
        if version != SCHEMA_VERSION {
            return Err(EngineError::VersionMismatch {
                found: version,
                expected: SCHEMA_VERSION,
            });
        }

        let input_len = fields.u32() as usize;
        let classes = fields.u32() as usize;
        let input_params = QuantizationParams::new(fields.f32(), fields.i32());
        let output_params = QuantizationParams::new(fields.f32(), fields.i32());
        let multiplier = fields.f32();

        if input_len == 0 || classes == 0 {
            return Err(EngineError::InvalidModel(format!(
                "degenerate shape {}x{}",
                classes, input_len
            )));
        }
        if classes != DIGIT_CLASSES {
            return Err(EngineError::InvalidModel(format!(
                "expected {} classes, found {}",
                DIGIT_CLASSES, classes
            )));
        }
        if !input_params.is_valid() || !output_params.is_valid() {
            return Err(EngineError::InvalidModel("non-positive tensor scale".into()));
        }
        for (tensor, params) in [("input", input_params), ("output", output_params)] {
            if i8::try_from(params.zero_point).is_err() {
                return Err(EngineError::InvalidModel(format!(
                    "{} zero point {} outside int8 range",
                    tensor, params.zero_point
                )));
            }
        }
        if !multiplier.is_finite() {
            return Err(EngineError::InvalidModel("non-finite multiplier".into()));
        }

        let weight_len = input_len
            .checked_mul(classes)
            .ok_or_else(|| EngineError::InvalidModel("shape overflows".into()))?;
        let expected = HEADER_LEN + weight_len + 4 * classes;
        if bytes.len() != expected {
            return Err(EngineError::InvalidModel(format!(
                "expected {} bytes, found {}",
                expected,
                bytes.len()
            )));
        }

        let mut weights = Vec::new();
        weights
            .try_reserve_exact(weight_len)
            .map_err(|_| EngineError::Allocation {
                purpose: "model buffer",
                bytes: weight_len,
            })?;
        weights.extend(bytes[HEADER_LEN..HEADER_LEN + weight_len].iter().map(|&b| b as i8));

        let biases = bytes[HEADER_LEN + weight_len..]
            .chunks_exact(4)
            .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();

        Ok(Self {
            input_params,
            output_params,
            multiplier,
            input_len,
            weights,
            biases,
        })
    }
}

/// Sequential little-endian reader over a header already length-checked.
struct FieldReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self) -> [u8; 4] {
        let mut word = [0u8; 4];
        word.copy_from_slice(&self.bytes[self.pos..self.pos + 4]);
        self.pos += 4;
        word
    }

    fn u32(&mut self) -> u32 {
        u32::from_le_bytes(self.take())
    }

    fn i32(&mut self) -> i32 {
        i32::from_le_bytes(self.take())
    }

    fn f32(&mut self) -> f32 {
        f32::from_le_bytes(self.take())
    }
}

/// Working arena, reserved up front; the tensors are slices of it.
///
/// Layout: `[input | output | unused]`. Accumulators live on the stack.
#[derive(Debug)]
struct Arena {
    bytes: Vec<i8>,
    input_len: usize,
    classes: usize,
}

impl Arena {
    fn required_bytes(input_len: usize, classes: usize) -> usize {
        input_len + classes
    }

    fn reserve(input_len: usize, classes: usize, arena_bytes: usize) -> Result<Self, EngineError> {
        let required = Self::required_bytes(input_len, classes);
        if required > arena_bytes {
            return Err(EngineError::TensorAllocation {
                required,
                available: arena_bytes,
            });
        }

        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(arena_bytes)
            .map_err(|_| EngineError::Allocation {
                purpose: "tensor arena",
                bytes: arena_bytes,
            })?;
        bytes.resize(arena_bytes, 0);

        Ok(Self {
            bytes,
            input_len,
            classes,
        })
    }

    fn input_mut(&mut self) -> &mut [i8] {
        &mut self.bytes[..self.input_len]
    }

    fn output(&self) -> &[i8] {
        &self.bytes[self.input_len..self.input_len + self.classes]
    }

    fn split_mut(&mut self) -> (&[i8], &mut [i8]) {
        let (input, rest) = self.bytes.split_at_mut(self.input_len);
        (&*input, &mut rest[..self.classes])
    }

    fn capacity(&self) -> usize {
        self.bytes.capacity()
    }
}

/// Engine backed by a [`DenseModel`].
pub struct DenseEngine {
    source: Vec<u8>,
    arena_bytes: usize,
    model: Option<DenseModel>,
    arena: Option<Arena>,
}

impl DenseEngine {
    /// Wrap raw model bytes; nothing is parsed until [`InferenceEngine::initialize`].
    pub fn new(source: Vec<u8>, arena_bytes: usize) -> Self {
        Self {
            source,
            arena_bytes,
            model: None,
            arena: None,
        }
    }

    /// Arena bytes the tensors occupy.
    pub fn arena_used(&self) -> usize {
        self.arena
            .as_ref()
            .map(|a| Arena::required_bytes(a.input_len, a.classes))
            .unwrap_or(0)
    }

    pub fn arena_bytes(&self) -> usize {
        self.arena_bytes
    }
}

impl InferenceEngine for DenseEngine {
    fn initialize(&mut self) -> Result<(), EngineError> {
        let model = DenseModel::parse(&self.source)?;
        let arena = Arena::reserve(model.input_len, model.classes(), self.arena_bytes)?;

        tracing::info!(
            classes = model.classes(),
            input_len = model.input_len,
            arena_used = Arena::required_bytes(model.input_len, model.classes()),
            arena_bytes = self.arena_bytes,
            "Dense model loaded"
        );

        self.model = Some(model);
        self.arena = Some(arena);
        // The decoded weights replace the raw file bytes.
        self.source = Vec::new();
        Ok(())
    }

    fn input_params(&self) -> QuantizationParams {
        self.model
            .as_ref()
            .map(|m| m.input_params)
            .unwrap_or(QuantizationParams::new(1.0, 0))
    }

    fn input_len(&self) -> usize {
        self.model.as_ref().map(|m| m.input_len).unwrap_or(0)
    }

    fn set_input(&mut self, input: &[i8]) -> Result<(), EngineError> {
        let arena = self.arena.as_mut().ok_or(EngineError::NotInitialized)?;
        if input.len() != arena.input_len {
            return Err(EngineError::InputShape {
                expected: arena.input_len,
                actual: input.len(),
            });
        }
        arena.input_mut().copy_from_slice(input);
        Ok(())
    }

    fn invoke(&mut self) -> Result<(), EngineError> {
        let (model, arena) = match (&self.model, &mut self.arena) {
            (Some(m), Some(a)) => (m, a),
            _ => return Err(EngineError::NotInitialized),
        };
        let (input, output) = arena.split_mut();

        // Every class is accumulated before the output is touched.
        let mut accumulators = [0i32; DIGIT_CLASSES];
        let in_zp = i64::from(model.input_params.zero_point);
        for ((class, row), acc) in model
            .weights
            .chunks_exact(model.input_len)
            .enumerate()
            .zip(accumulators.iter_mut())
        {
            let sum: i64 = row
                .iter()
                .zip(input.iter())
                .map(|(&w, &x)| (i64::from(x) - in_zp) * i64::from(w))
                .sum::<i64>()
                + i64::from(model.biases[class]);

            *acc = i32::try_from(sum)
                .map_err(|_| EngineError::Invoke(format!("accumulator overflow in class {}", class)))?;
        }

        let out_zp = model.output_params.zero_point;
        for (out, &acc) in output.iter_mut().zip(&accumulators) {
            let scaled = ((acc as f32 * model.multiplier).round() as i32).saturating_add(out_zp);
            *out = scaled.clamp(i32::from(i8::MIN), i32::from(i8::MAX)) as i8;
        }
        Ok(())
    }

    fn read_output(&self) -> OutputTensor<'_> {
        match (&self.model, &self.arena) {
            (Some(m), Some(a)) => OutputTensor {
                scores: a.output(),
                params: m.output_params,
            },
            _ => OutputTensor {
                scores: &[],
                params: QuantizationParams::new(1.0, 0),
            },
        }
    }

    fn resident_bytes(&self) -> usize {
        let model = self
            .model
            .as_ref()
            .map(|m| m.weights.capacity() + m.biases.capacity() * 4)
            .unwrap_or(0);
        model + self.arena.as_ref().map(Arena::capacity).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two inputs, ten classes: class k responds to input k, class 2 to its bias alone.
    fn tiny_model() -> DenseModel {
        let mut weights = vec![0i8; 2 * DIGIT_CLASSES];
        weights[0] = 1;
        weights[3] = 1;
        let mut biases = vec![0; DIGIT_CLASSES];
        biases[2] = 60;

        DenseModel {
            input_params: QuantizationParams::new(1.0 / 255.0, -128),
            output_params: QuantizationParams::new(0.1, 0),
            multiplier: 0.01,
            input_len: 2,
            weights,
            biases,
        }
    }

    fn engine_for(model: &DenseModel, arena: usize) -> DenseEngine {
        DenseEngine::new(model.to_bytes(), arena)
    }

    #[test]
    fn parse_accepts_own_encoding() {
        let model = tiny_model();
        assert_eq!(DenseModel::parse(&model.to_bytes()).unwrap(), model);
    }

    #[test]
    fn rejects_wrong_schema_version() {
        let mut bytes = tiny_model().to_bytes();
        bytes[4..8].copy_from_slice(&7u32.to_le_bytes());
        assert_eq!(
            DenseModel::parse(&bytes),
            Err(EngineError::VersionMismatch {
                found: 7,
                expected: SCHEMA_VERSION
            })
        );
    }

    #[test]
    fn rejects_bad_magic_and_truncation() {
        let mut bytes = tiny_model().to_bytes();
        bytes[0] = b'X';
        assert!(matches!(DenseModel::parse(&bytes), Err(EngineError::InvalidModel(_))));

        let bytes = tiny_model().to_bytes();
        assert!(matches!(
            DenseModel::parse(&bytes[..bytes.len() - 1]),
            Err(EngineError::InvalidModel(_))
        ));
        assert!(matches!(DenseModel::parse(&[]), Err(EngineError::InvalidModel(_))));
    }

    #[test]
    fn rejects_class_count_other_than_ten() {
        let mut model = tiny_model();
        model.weights = vec![0; 2 * 12];
        model.biases = vec![0; 12];
        model.biases[11] = 100;
        assert_eq!(
            DenseModel::parse(&model.to_bytes()),
            Err(EngineError::InvalidModel("expected 10 classes, found 12".into()))
        );

        model.weights = vec![0; 2 * 9];
        model.biases = vec![0; 9];
        let mut engine = engine_for(&model, 1024);
        assert!(matches!(engine.initialize(), Err(EngineError::InvalidModel(_))));
        assert!(engine.read_output().scores.is_empty());
    }

    #[test]
    fn rejects_zero_points_outside_int8() {
        let mut model = tiny_model();
        model.input_params.zero_point = i32::MAX;
        assert_eq!(
            DenseModel::parse(&model.to_bytes()),
            Err(EngineError::InvalidModel(
                "input zero point 2147483647 outside int8 range".into()
            ))
        );

        let mut model = tiny_model();
        model.output_params.zero_point = -129;
        assert!(matches!(
            DenseModel::parse(&model.to_bytes()),
            Err(EngineError::InvalidModel(_))
        ));

        model.input_params.zero_point = 127;
        model.output_params.zero_point = -128;
        assert!(DenseModel::parse(&model.to_bytes()).is_ok());
    }

    #[test]
    fn arena_too_small_fails_tensor_allocation() {
        let mut engine = engine_for(&tiny_model(), 8);
        assert_eq!(
            engine.initialize(),
            Err(EngineError::TensorAllocation {
                required: 2 + 10,
                available: 8
            })
        );
        assert_eq!(engine.input_len(), 0);
        assert!(engine.read_output().scores.is_empty());
    }

    #[test]
    fn unreservable_arena_fails_allocation() {
        let mut engine = engine_for(&tiny_model(), usize::MAX);
        assert_eq!(
            engine.initialize(),
            Err(EngineError::Allocation {
                purpose: "tensor arena",
                bytes: usize::MAX
            })
        );
        assert_eq!(engine.resident_bytes(), 0);
    }

    #[test]
    fn invoke_before_initialize_fails() {
        let mut engine = engine_for(&tiny_model(), 1024);
        assert_eq!(engine.invoke(), Err(EngineError::NotInitialized));
        assert_eq!(engine.set_input(&[0, 0]), Err(EngineError::NotInitialized));
    }

    #[test]
    fn computes_requantized_scores() {
        let mut engine = engine_for(&tiny_model(), 1024);
        engine.initialize().unwrap();

        // x - zp: first input 255, second 0.
        engine.set_input(&[127, -128]).unwrap();
        engine.invoke().unwrap();

        // acc = [255, 0, 60, 0, ...] * 0.01 → [3, 0, 1, 0, ...] after rounding.
        assert_eq!(engine.read_output().scores, &[3, 0, 1, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(engine.read_output().params, QuantizationParams::new(0.1, 0));
        assert_eq!(engine.arena_used(), 12);
    }

    #[test]
    fn requantization_saturates_extreme_output_zero_point() {
        // Built directly; parse would refuse this zero point.
        let mut model = tiny_model();
        model.output_params.zero_point = i32::MAX;
        let mut engine = DenseEngine::new(Vec::new(), 1024);
        engine.arena = Some(Arena::reserve(2, DIGIT_CLASSES, 1024).unwrap());
        engine.model = Some(model);

        engine.set_input(&[127, -128]).unwrap();
        engine.invoke().unwrap();
        assert!(engine.read_output().scores.iter().all(|&s| s == 127));
    }

    #[test]
    fn rejects_mismatched_input() {
        let mut engine = engine_for(&tiny_model(), 1024);
        engine.initialize().unwrap();
        assert_eq!(
            engine.set_input(&[0; 3]),
            Err(EngineError::InputShape {
                expected: 2,
                actual: 3
            })
        );
    }

    #[test]
    fn resident_bytes_include_reserved_arena() {
        let mut engine = engine_for(&tiny_model(), 1024);
        assert_eq!(engine.resident_bytes(), 0);
        engine.initialize().unwrap();

        let arena = engine.arena.as_ref().unwrap();
        assert!(arena.capacity() >= 1024);
        assert_eq!(arena.bytes.len(), 1024);
        assert!(engine.arena_used() <= engine.arena_bytes());
        assert!(engine.resident_bytes() >= 1024 + 20 + 40);
    }
}
