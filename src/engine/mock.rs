//! Deterministic mock models
//!
//! Used as the default selectors and in tests. They never load weights.

use image::DynamicImage;

use crate::error::{DetectionError, RecognitionError};
use super::capability::{ensure_non_empty, EmotionRecognizer, FaceDetector};
use super::registry::ModelParams;
use super::types::{BoundingBox, EmotionLabel};

/// Box returned when no `box` parameter is given
pub const MOCK_BOX: BoundingBox = BoundingBox { x1: 10, y1: 10, x2: 60, y2: 60 };

/// Label returned when no `label` parameter is given
pub const MOCK_LABEL: EmotionLabel = 1;

/// Detector that reports the same box for every image
#[derive(Debug, Clone)]
pub struct MockDetector {
    bbox: BoundingBox,
}

impl MockDetector {
    pub fn new(bbox: BoundingBox) -> Self {
        Self { bbox }
    }

    /// Reads an optional `box` parameter as `[x1, y1, x2, y2]`.
    pub fn from_params(params: &ModelParams) -> anyhow::Result<Self> {
        if params.get("box").is_none() {
            return Ok(Self::new(MOCK_BOX));
        }
        let [x1, y1, x2, y2] = params.i64_array::<4>("box")?;
        let coord = |v: i64| {
            i32::try_from(v).map_err(|_| anyhow::anyhow!("box coordinate {} out of range", v))
        };
        Ok(Self::new(BoundingBox::new(coord(x1)?, coord(y1)?, coord(x2)?, coord(y2)?)))
    }
}

impl FaceDetector for MockDetector {
    fn detect_faces(&mut self, _image: &DynamicImage) -> Result<Vec<BoundingBox>, DetectionError> {
        Ok(vec![self.bbox])
    }

    fn backend(&self) -> &'static str {
        "mock"
    }
}

/// Recognizer that returns the same label for every non-empty face
#[derive(Debug, Clone)]
pub struct MockRecognizer {
    label: EmotionLabel,
}

impl MockRecognizer {
    pub fn new(label: EmotionLabel) -> Self {
        Self { label }
    }

    pub fn from_params(params: &ModelParams) -> anyhow::Result<Self> {
        Ok(Self::new(params.i32_or("label", MOCK_LABEL)?))
    }
}

impl EmotionRecognizer for MockRecognizer {
    fn recognize_emotion(&mut self, face: &DynamicImage) -> Result<EmotionLabel, RecognitionError> {
        ensure_non_empty(face)?;
        Ok(self.label)
    }

    fn backend(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_detector_defaults() {
        let mut detector = MockDetector::from_params(&ModelParams::new()).unwrap();
        let boxes = detector.detect_faces(&DynamicImage::new_rgb8(100, 100)).unwrap();
        assert_eq!(boxes, vec![MOCK_BOX]);
    }

    #[test]
    fn test_mock_detector_rejects_bad_box() {
        let params = ModelParams::new().with("box", vec![1, 2, 3]);
        assert!(MockDetector::from_params(&params).is_err());
    }

    #[test]
    fn test_mock_recognizer_empty_face() {
        let mut recognizer = MockRecognizer::new(1);
        let err = recognizer.recognize_emotion(&DynamicImage::new_rgb8(0, 0)).unwrap_err();
        assert!(matches!(err, RecognitionError::EmptyFace { width: 0, height: 0 }));
        assert_eq!(recognizer.recognize_emotion(&DynamicImage::new_rgb8(4, 4)).unwrap(), 1);
    }
}
