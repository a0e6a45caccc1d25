//! FER Emotion Recognizer
//!
//! Keras-trained FER network exported for OpenVINO. The network expects
//! NHWC input at a fixed size with pixel values scaled to [0, 1], and emits
//! one score per emotion class.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use image::DynamicImage;
use ndarray::Array4;

use crate::error::RecognitionError;
use crate::utils::math::{argmax, softmax};
use super::capability::{ensure_non_empty, EmotionRecognizer};
use super::preprocess::image_to_nhwc;
use super::registry::ModelParams;
use super::runtime::{CompiledNetwork, InferenceRuntime};
use super::types::{Emotion, EmotionLabel};

/// `[height, width, channels]` of the bundled FER model
pub const FER_INPUT_SHAPE: [i64; 3] = [100, 100, 3];

/// Fixed network input geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputShape {
    pub height: u32,
    pub width: u32,
    pub channels: usize,
}

impl InputShape {
    pub fn from_hwc([h, w, c]: [i64; 3]) -> Result<Self> {
        if h <= 0 || w <= 0 {
            anyhow::bail!("input_shape must have positive height and width, got {}x{}", h, w);
        }
        if c != 1 && c != 3 {
            anyhow::bail!("input_shape channels must be 1 or 3, got {}", c);
        }
        Ok(Self {
            height: u32::try_from(h)?,
            width: u32::try_from(w)?,
            channels: c as usize,
        })
    }

    fn dims(&self) -> [i64; 4] {
        [1, self.height as i64, self.width as i64, self.channels as i64]
    }
}

/// Resize to the model input, reorder channels and add the batch axis
pub fn preprocess(face: &DynamicImage, shape: InputShape) -> Array4<f32> {
    let resized = face.resize_exact(
        shape.width,
        shape.height,
        image::imageops::FilterType::Triangle,
    );
    image_to_nhwc(&resized, shape.channels)
}

pub struct FerEmotionRecognizer {
    network: CompiledNetwork,
    input_shape: InputShape,
}

impl FerEmotionRecognizer {
    /// Params: `model_path` (required), `input_shape` as `[h, w, c]`
    pub fn from_params(runtime: &Arc<InferenceRuntime>, params: &ModelParams) -> Result<Self> {
        let path = PathBuf::from(params.str("model_path")?);
        let input_shape = match params.get("input_shape") {
            Some(_) => InputShape::from_hwc(params.i64_array::<3>("input_shape")?)?,
            None => InputShape::from_hwc(FER_INPUT_SHAPE)?,
        };

        let network = runtime.compile(&path)?;

        Ok(Self { network, input_shape })
    }
}

impl EmotionRecognizer for FerEmotionRecognizer {
    fn recognize_emotion(&mut self, face: &DynamicImage) -> Result<EmotionLabel, RecognitionError> {
        ensure_non_empty(face)?;

        let tensor = preprocess(face, self.input_shape);
        let input = tensor
            .as_slice()
            .ok_or_else(|| anyhow::anyhow!("non-contiguous input tensor"))?;

        let outputs = self.network.infer(&self.input_shape.dims(), input)?;
        let (_, scores) = &outputs[0];
        if scores.is_empty() {
            return Err(anyhow::anyhow!("FER network returned no scores").into());
        }

        let probs = softmax(scores);
        let label = argmax(&probs);
        let label = label as EmotionLabel;
        tracing::debug!(
            "Emotion probabilities: {:?} -> {} ({})",
            probs,
            label,
            Emotion::from_label(label).map_or("unknown", |e| e.as_str())
        );

        Ok(label)
    }

    fn backend(&self) -> &'static str {
        "fer"
    }
}
