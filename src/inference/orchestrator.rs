//! Runs one classification and packages the outcome.

use crate::inference::engine::{EngineError, ModelHandle, DIGIT_CLASSES};
use crate::inference::quantize::{dequantize, quantize_image};
use crate::pixels::{DecodeError, PixelImage, IMAGE_PIXELS};

/// Digit reported when there is no prediction.
pub const NO_DIGIT: i32 = -1;

/// Outcome of one request against the model.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceResult {
    /// Winning class in 0..=9, or [`NO_DIGIT`].
    pub predicted_digit: i32,
    /// Dequantized score of the winning class. Not a probability.
    pub confidence: f32,
    pub success: bool,
    /// Empty on success.
    pub error_message: String,
}

impl InferenceResult {
    pub fn prediction(digit: usize, confidence: f32) -> Self {
        Self {
            predicted_digit: digit as i32,
            confidence,
            success: true,
            error_message: String::new(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            predicted_digit: NO_DIGIT,
            confidence: 0.0,
            success: false,
            error_message: message.into(),
        }
    }

    /// Result reported by the status endpoint.
    pub fn status(model_initialized: bool) -> Self {
        if model_initialized {
            Self {
                predicted_digit: NO_DIGIT,
                confidence: 0.0,
                success: true,
                error_message: String::new(),
            }
        } else {
            Self::failure(EngineError::NotInitialized.to_string())
        }
    }
}

impl From<DecodeError> for InferenceResult {
    fn from(err: DecodeError) -> Self {
        Self::failure(err.to_string())
    }
}

/// Index and value of the highest score; the lowest index wins ties.
pub fn argmax(scores: &[i8]) -> Option<(usize, i8)> {
    if scores.is_empty() {
        return None;
    }

    let mut best_index = 0;
    let mut max_score = i8::MIN;
    for (i, &score) in scores.iter().enumerate() {
        if score > max_score {
            max_score = score;
            best_index = i;
        }
    }
    Some((best_index, max_score))
}

/// Classify one image.
///
/// Never panics and never returns an error: every failure is folded into an
/// unsuccessful [`InferenceResult`].
pub fn classify(model: &mut ModelHandle, image: &PixelImage) -> InferenceResult {
    if !model.is_initialized() {
        tracing::warn!("Inference requested before model initialization");
        return InferenceResult::failure(EngineError::NotInitialized.to_string());
    }

    let (engine, input) = model.parts();
    if input.len() != IMAGE_PIXELS {
        let err = EngineError::InputShape {
            expected: input.len(),
            actual: IMAGE_PIXELS,
        };
        tracing::error!(error = %err, "Model input does not fit a 28x28 image");
        return InferenceResult::failure(err.to_string());
    }

    quantize_image(image, engine.input_params(), input);

    if let Err(e) = engine.set_input(input) {
        tracing::error!(error = %e, "Failed to load input tensor");
        return InferenceResult::failure(format!("Inference execution failed: {}", e));
    }

    if let Err(e) = engine.invoke() {
        tracing::error!(error = %e, "Model invocation failed");
        return InferenceResult::failure(format!("Inference execution failed: {}", e));
    }

    let output = engine.read_output();
    let Some((digit, max_score)) = argmax(output.scores) else {
        tracing::error!("Model produced an empty output tensor");
        return InferenceResult::failure("Inference produced no output scores");
    };
    if output.scores.len() != DIGIT_CLASSES {
        tracing::error!(scores = output.scores.len(), "Model output does not cover ten digits");
        return InferenceResult::failure(format!(
            "Model produced {} scores, expected {}",
            output.scores.len(),
            DIGIT_CLASSES
        ));
    }

    let confidence = dequantize(max_score, output.params);
    tracing::debug!(digit, max_score, confidence, "Inference complete");
    InferenceResult::prediction(digit, confidence)
}
