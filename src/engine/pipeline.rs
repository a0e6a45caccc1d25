//! Unified detector + recognizer pair

use image::DynamicImage;

use crate::error::{DetectionError, RecognitionError};
use super::capability::{EmotionRecognizer, FaceDetector};
use super::types::{BoundingBox, EmotionLabel};

/// One detector and one recognizer behind a single object.
///
/// Owned by exactly one request or stream session for its whole lifetime.
pub struct UnifiedPipeline {
    detector: Box<dyn FaceDetector>,
    recognizer: Box<dyn EmotionRecognizer>,
}

impl UnifiedPipeline {
    pub fn new(detector: Box<dyn FaceDetector>, recognizer: Box<dyn EmotionRecognizer>) -> Self {
        Self { detector, recognizer }
    }

    pub fn detect_faces(
        &mut self,
        image: &DynamicImage,
    ) -> Result<Vec<BoundingBox>, DetectionError> {
        self.detector.detect_faces(image)
    }

    pub fn recognize_emotion(
        &mut self,
        face: &DynamicImage,
    ) -> Result<EmotionLabel, RecognitionError> {
        self.recognizer.recognize_emotion(face)
    }

    /// `(detector, recognizer)` back-end names
    pub fn backends(&self) -> (&'static str, &'static str) {
        (self.detector.backend(), self.recognizer.backend())
    }
}
