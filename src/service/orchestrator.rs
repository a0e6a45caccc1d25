//! Inference Orchestrator
//!
//! Turns one decoded image into a list of per-face results: detect, crop
//! each face, recognize, assemble in detection order.

use image::{DynamicImage, GenericImageView};
use tracing::{debug, warn};

use crate::config::FailurePolicy;
use crate::engine::{FaceResult, UnifiedPipeline};
use crate::error::{ProcessingError, ProcessingResult};

pub struct InferenceOrchestrator {
    pipeline: UnifiedPipeline,
    policy: FailurePolicy,
}

impl InferenceOrchestrator {
    pub fn new(pipeline: UnifiedPipeline, policy: FailurePolicy) -> Self {
        Self { pipeline, policy }
    }

    /// Run detection and per-face recognition on `image`.
    ///
    /// Detection failure fails the call. Recognition failure of one face
    /// follows the configured `FailurePolicy`. No faces is an empty `Ok`.
    pub fn process(&mut self, image: &DynamicImage) -> ProcessingResult<Vec<FaceResult>> {
        let (width, height) = image.dimensions();
        let (detector, recognizer) = self.pipeline.backends();

        let boxes = self.pipeline.detect_faces(image)?;
        debug!(
            "{} detector found {} faces in {}x{} image",
            detector,
            boxes.len(),
            width,
            height
        );

        let mut results = Vec::with_capacity(boxes.len());

        for (index, raw) in boxes.into_iter().enumerate() {
            let Some(bbox) = raw.clamp_to(width, height) else {
                warn!(
                    "Skipping face {} with degenerate box {:?} in {}x{} image",
                    index, raw, width, height
                );
                continue;
            };

            let face = image.crop_imm(
                bbox.x1 as u32,
                bbox.y1 as u32,
                bbox.width() as u32,
                bbox.height() as u32,
            );

            match self.pipeline.recognize_emotion(&face) {
                Ok(emotion) => results.push(FaceResult { emotion, bbox }),
                Err(source) => match self.policy {
                    FailurePolicy::SkipFace => {
                        warn!(
                            "{} recognizer failed on face {} at {:?}, skipping: {}",
                            recognizer, index, bbox, source
                        );
                    }
                    FailurePolicy::Abort => {
                        return Err(ProcessingError::Recognition { index, bbox, source });
                    }
                },
            }
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::engine::mock::{MockDetector, MockRecognizer};
    use crate::engine::{BoundingBox, EmotionLabel, EmotionRecognizer, FaceDetector};
    use crate::error::{DetectionError, RecognitionError};

    struct FixedDetector(Vec<BoundingBox>);

    impl FaceDetector for FixedDetector {
        fn detect_faces(
            &mut self,
            _image: &DynamicImage,
        ) -> Result<Vec<BoundingBox>, DetectionError> {
            Ok(self.0.clone())
        }

        fn backend(&self) -> &'static str {
            "fixed"
        }
    }

    struct FailingDetector;

    impl FaceDetector for FailingDetector {
        fn detect_faces(
            &mut self,
            _image: &DynamicImage,
        ) -> Result<Vec<BoundingBox>, DetectionError> {
            Err(DetectionError::InvalidInput("broken frame".into()))
        }

        fn backend(&self) -> &'static str {
            "failing"
        }
    }

    /// Records crop sizes and fails on the listed call numbers
    struct RecordingRecognizer {
        seen: Arc<Mutex<Vec<(u32, u32)>>>,
        fail_on: Vec<usize>,
    }

    impl EmotionRecognizer for RecordingRecognizer {
        fn recognize_emotion(
            &mut self,
            face: &DynamicImage,
        ) -> Result<EmotionLabel, RecognitionError> {
            let mut seen = self.seen.lock();
            seen.push(face.dimensions());
            let call = seen.len() - 1;
            if self.fail_on.contains(&call) {
                return Err(anyhow::anyhow!("model blew up on call {}", call).into());
            }
            Ok(call as EmotionLabel)
        }

        fn backend(&self) -> &'static str {
            "recording"
        }
    }

    fn orchestrator(
        boxes: Vec<BoundingBox>,
        fail_on: Vec<usize>,
        policy: FailurePolicy,
    ) -> (InferenceOrchestrator, Arc<Mutex<Vec<(u32, u32)>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let pipeline = UnifiedPipeline::new(
            Box::new(FixedDetector(boxes)),
            Box::new(RecordingRecognizer { seen: seen.clone(), fail_on }),
        );
        (InferenceOrchestrator::new(pipeline, policy), seen)
    }

    fn three_faces() -> Vec<BoundingBox> {
        vec![
            BoundingBox::new(0, 0, 10, 10),
            BoundingBox::new(20, 20, 40, 30),
            BoundingBox::new(50, 50, 90, 95),
        ]
    }

    #[test]
    fn test_no_faces_is_empty_success() {
        let (mut orch, seen) = orchestrator(vec![], vec![], FailurePolicy::SkipFace);
        let results = orch.process(&DynamicImage::new_rgb8(100, 100)).unwrap();
        assert!(results.is_empty());
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_single_mock_face() {
        let pipeline = UnifiedPipeline::new(
            Box::new(MockDetector::new(BoundingBox::new(10, 10, 60, 60))),
            Box::new(MockRecognizer::new(1)),
        );
        let mut orch = InferenceOrchestrator::new(pipeline, FailurePolicy::SkipFace);

        let results = orch.process(&DynamicImage::new_rgb8(100, 100)).unwrap();
        assert_eq!(
            results,
            vec![FaceResult {
                emotion: 1,
                bbox: BoundingBox::new(10, 10, 60, 60),
            }]
        );
    }

    #[test]
    fn test_crop_matches_box_size() {
        let (mut orch, seen) = orchestrator(three_faces(), vec![], FailurePolicy::SkipFace);
        let results = orch.process(&DynamicImage::new_rgb8(100, 100)).unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(*seen.lock(), vec![(10, 10), (20, 10), (40, 45)]);
        // Detection order preserved
        assert_eq!(results[2].bbox, BoundingBox::new(50, 50, 90, 95));
    }

    #[test]
    fn test_out_of_bounds_boxes_clamped_or_skipped() {
        let boxes = vec![
            BoundingBox::new(-10, -10, 20, 20),
            BoundingBox::new(30, 30, 30, 60),
            BoundingBox::new(200, 200, 260, 260),
            BoundingBox::new(80, 90, 140, 150),
        ];
        let (mut orch, seen) = orchestrator(boxes, vec![], FailurePolicy::SkipFace);
        let results = orch.process(&DynamicImage::new_rgb8(100, 100)).unwrap();

        let kept: Vec<BoundingBox> = results.iter().map(|r| r.bbox).collect();
        assert_eq!(
            kept,
            vec![BoundingBox::new(0, 0, 20, 20), BoundingBox::new(80, 90, 100, 100)]
        );
        assert_eq!(*seen.lock(), vec![(20, 20), (20, 10)]);
    }

    #[test]
    fn test_skip_policy_drops_failed_face() {
        let (mut orch, _) = orchestrator(three_faces(), vec![1], FailurePolicy::SkipFace);
        let results = orch.process(&DynamicImage::new_rgb8(100, 100)).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].bbox, three_faces()[0]);
        assert_eq!(results[1].bbox, three_faces()[2]);
    }

    #[test]
    fn test_abort_policy_fails_whole_call() {
        let (mut orch, seen) = orchestrator(three_faces(), vec![1], FailurePolicy::Abort);
        let err = orch.process(&DynamicImage::new_rgb8(100, 100)).unwrap_err();

        match err {
            ProcessingError::Recognition { index, bbox, .. } => {
                assert_eq!(index, 1);
                assert_eq!(bbox, three_faces()[1]);
            }
            other => panic!("unexpected error: {other}"),
        }
        // Third face never reached
        assert_eq!(seen.lock().len(), 2);
    }

    #[test]
    fn test_detection_failure_propagates() {
        let pipeline =
            UnifiedPipeline::new(Box::new(FailingDetector), Box::new(MockRecognizer::new(1)));
        let mut orch = InferenceOrchestrator::new(pipeline, FailurePolicy::SkipFace);

        let err = orch.process(&DynamicImage::new_rgb8(10, 10)).unwrap_err();
        assert!(matches!(err, ProcessingError::Detection(_)));
    }
}
