//! Error types for model selection and inference.

use thiserror::Error;

use crate::engine::registry::ModelKind;
use crate::engine::types::BoundingBox;

/// Failures resolving or building a model from the registry.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Selector name is not registered for this kind
    #[error("Unknown {kind}: {name}")]
    UnknownModel { kind: ModelKind, name: String },

    /// Registered constructor failed
    #[error("Failed to construct {kind} '{name}': {source:#}")]
    Construction {
        kind: ModelKind,
        name: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Face detector failed on its input.
#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("Invalid detector input: {0}")]
    InvalidInput(String),

    #[error("Detector inference failed: {0:#}")]
    Inference(#[from] anyhow::Error),
}

/// Emotion recognizer failed on one face crop.
#[derive(Error, Debug)]
pub enum RecognitionError {
    #[error("Empty face image ({width}x{height})")]
    EmptyFace { width: u32, height: u32 },

    #[error("Recognizer inference failed: {0:#}")]
    Inference(#[from] anyhow::Error),
}

/// Failure of a whole `process` call, or of decoding the frame that feeds it.
#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Face detection failed: {0}")]
    Detection(#[from] DetectionError),

    #[error("Emotion recognition failed for face {index} at {bbox:?}: {source}")]
    Recognition {
        index: usize,
        bbox: BoundingBox,
        #[source]
        source: RecognitionError,
    },
}

impl From<image::ImageError> for ProcessingError {
    fn from(e: image::ImageError) -> Self {
        ProcessingError::Decode(e.to_string())
    }
}

pub type RegistryResult<T> = Result<T, RegistryError>;
pub type ProcessingResult<T> = Result<T, ProcessingError>;
