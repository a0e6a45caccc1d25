//! Model capability contracts
//!
//! Every detector and recognizer the registry can build implements one of
//! these traits. Instances are owned by a single pipeline, so methods take
//! `&mut self` and implementations need `Send` only, not `Sync`.

use image::DynamicImage;

use crate::error::{DetectionError, RecognitionError};
use super::types::{BoundingBox, EmotionLabel};

/// Locates faces in an image.
pub trait FaceDetector: Send {
    /// Return face boxes in model output order.
    ///
    /// An empty vector means no face was found and is not an error.
    fn detect_faces(&mut self, image: &DynamicImage) -> Result<Vec<BoundingBox>, DetectionError>;

    /// Back-end name for logging
    fn backend(&self) -> &'static str;
}

/// Classifies the emotion of a single cropped face.
pub trait EmotionRecognizer: Send {
    /// Implementations must return `RecognitionError::EmptyFace` for a
    /// zero-area crop instead of failing inside the model.
    fn recognize_emotion(&mut self, face: &DynamicImage) -> Result<EmotionLabel, RecognitionError>;

    /// Back-end name for logging
    fn backend(&self) -> &'static str;
}

/// Guard shared by recognizers for degenerate crops.
pub fn ensure_non_empty(face: &DynamicImage) -> Result<(), RecognitionError> {
    if face.width() == 0 || face.height() == 0 {
        return Err(RecognitionError::EmptyFace {
            width: face.width(),
            height: face.height(),
        });
    }
    Ok(())
}
