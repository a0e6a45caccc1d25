//! YOLO Face Detector
//!
//! Runs a YOLO face export through OpenVINO. The output layout is fixed per
//! registration through the `layout` parameter:
//! - `v5`: `[1, N, 5 + C]`, cx, cy, w, h, objectness, class scores
//! - `v5_face`: `[1, N, 16]`, cx, cy, w, h, objectness, 10 landmark
//!   coordinates, face score
//! - `v8`: `[1, 4 + C, N]`, cx, cy, w, h, class scores (no objectness)
//!
//! Boxes come out of the network as centre/size and are converted to the
//! corner-pair encoding here, before leaving the detector.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use image::{DynamicImage, GenericImageView};

use crate::error::DetectionError;
use super::capability::FaceDetector;
use super::preprocess::{image_to_nchw, letterbox, ResizeInfo, DETECTOR_INPUT_SIZE};
use super::registry::ModelParams;
use super::runtime::{CompiledNetwork, InferenceRuntime};
use super::types::BoundingBox;

const DEFAULT_CONFIDENCE: f32 = 0.25;
const DEFAULT_NMS: f32 = 0.45;

/// Landmark coordinates between objectness and the face score in `v5_face`
const FACE_LANDMARK_VALUES: usize = 10;

/// Column order of a YOLO head
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YoloLayout {
    V5,
    V5Face,
    V8,
}

impl YoloLayout {
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "v5" => Ok(YoloLayout::V5),
            "v5_face" => Ok(YoloLayout::V5Face),
            "v8" => Ok(YoloLayout::V8),
            other => anyhow::bail!("Unknown YOLO layout '{}' (expected v5, v5_face or v8)", other),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            YoloLayout::V5 => "v5",
            YoloLayout::V5Face => "v5_face",
            YoloLayout::V8 => "v8",
        }
    }

    /// Attribute axis comes before the box axis
    fn attributes_first(&self) -> bool {
        matches!(self, YoloLayout::V8)
    }

    fn min_attributes(&self) -> usize {
        match self {
            YoloLayout::V5 => 5,
            YoloLayout::V5Face => 5 + FACE_LANDMARK_VALUES + 1,
            YoloLayout::V8 => 5,
        }
    }
}

/// Candidate box in original image space, before rounding
#[derive(Debug, Clone, Copy)]
struct Candidate {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    score: f32,
}

pub struct YoloFaceDetector {
    network: CompiledNetwork,
    layout: YoloLayout,
    confidence_threshold: f32,
    nms_threshold: f32,
}

impl YoloFaceDetector {
    /// Params: `model_path` (required), `layout` (default `v5_face`),
    /// `confidence_threshold`, `nms_threshold`
    pub fn from_params(runtime: &Arc<InferenceRuntime>, params: &ModelParams) -> Result<Self> {
        let path = PathBuf::from(params.str("model_path")?);
        let layout = match params.get("layout") {
            Some(_) => YoloLayout::parse(params.str("layout")?)?,
            None => YoloLayout::V5Face,
        };
        let confidence_threshold = params.f32_or("confidence_threshold", DEFAULT_CONFIDENCE)?;
        let nms_threshold = params.f32_or("nms_threshold", DEFAULT_NMS)?;

        let network = runtime.compile(&path)?;

        Ok(Self {
            network,
            layout,
            confidence_threshold,
            nms_threshold,
        })
    }
}

impl FaceDetector for YoloFaceDetector {
    fn detect_faces(&mut self, image: &DynamicImage) -> Result<Vec<BoundingBox>, DetectionError> {
        let (orig_w, orig_h) = image.dimensions();
        if orig_w == 0 || orig_h == 0 {
            return Err(DetectionError::InvalidInput(format!(
                "image has zero size ({}x{})",
                orig_w, orig_h
            )));
        }

        let (target_w, target_h) = DETECTOR_INPUT_SIZE;
        let resize_info = ResizeInfo::new((orig_w, orig_h), DETECTOR_INPUT_SIZE);
        let input = image_to_nchw(&letterbox(image, target_w, target_h));

        let input_data = input
            .as_slice()
            .ok_or_else(|| DetectionError::InvalidInput("non-contiguous input tensor".into()))?;
        let outputs = self
            .network
            .infer(&[1, 3, target_h as i64, target_w as i64], input_data)?;

        let (dims, data) = &outputs[0];
        let candidates =
            decode_yolo_output(dims, data, self.layout, self.confidence_threshold, &resize_info)?;
        tracing::debug!(
            "YOLO ({}) produced {} candidates before NMS",
            self.layout.as_str(),
            candidates.len()
        );

        let kept = nms(candidates, self.nms_threshold);
        tracing::debug!("Detected {} faces after NMS", kept.len());

        Ok(kept
            .into_iter()
            .map(|c| {
                BoundingBox::new(
                    c.x1.round() as i32,
                    c.y1.round() as i32,
                    c.x2.round() as i32,
                    c.y2.round() as i32,
                )
            })
            .collect())
    }

    fn backend(&self) -> &'static str {
        "yolo"
    }
}

/// Decode a YOLO head into candidates in original image coordinates
fn decode_yolo_output(
    dims: &[i64],
    data: &[f32],
    layout: YoloLayout,
    confidence_threshold: f32,
    resize_info: &ResizeInfo,
) -> Result<Vec<Candidate>> {
    let (rows, cols) = match dims {
        [_, a, b] => (*a as usize, *b as usize),
        [a, b] => (*a as usize, *b as usize),
        other => anyhow::bail!("Unexpected YOLO output shape {:?}", other),
    };
    if rows * cols != data.len() {
        anyhow::bail!("YOLO output shape {:?} does not match {} values", dims, data.len());
    }

    let transposed = layout.attributes_first();
    let (num_boxes, num_attrs) = if transposed { (cols, rows) } else { (rows, cols) };
    if num_attrs < layout.min_attributes() {
        anyhow::bail!(
            "YOLO {} output has {} attributes per box, need at least {}",
            layout.as_str(),
            num_attrs,
            layout.min_attributes()
        );
    }

    let attr = |i: usize, a: usize| -> f32 {
        if transposed {
            data[a * num_boxes + i]
        } else {
            data[i * num_attrs + a]
        }
    };

    let score_of = |i: usize| -> f32 {
        match layout {
            YoloLayout::V5 => {
                let class_score = (5..num_attrs).map(|a| attr(i, a)).reduce(f32::max);
                attr(i, 4) * class_score.unwrap_or(1.0)
            }
            YoloLayout::V5Face => attr(i, 4) * attr(i, 5 + FACE_LANDMARK_VALUES),
            YoloLayout::V8 => (4..num_attrs).map(|a| attr(i, a)).fold(f32::NEG_INFINITY, f32::max),
        }
    };

    let max_x = resize_info.original_width as f32;
    let max_y = resize_info.original_height as f32;
    let mut candidates = Vec::new();

    for i in 0..num_boxes {
        let score = score_of(i);
        if score < confidence_threshold {
            continue;
        }

        let (cx, cy, w, h) = (attr(i, 0), attr(i, 1), attr(i, 2), attr(i, 3));
        let (x1, y1) = resize_info.to_original(cx - w / 2.0, cy - h / 2.0);
        let (x2, y2) = resize_info.to_original(cx + w / 2.0, cy + h / 2.0);

        candidates.push(Candidate {
            x1: x1.clamp(0.0, max_x),
            y1: y1.clamp(0.0, max_y),
            x2: x2.clamp(0.0, max_x),
            y2: y2.clamp(0.0, max_y),
            score,
        });
    }

    Ok(candidates)
}

/// Non-maximum suppression, highest score first
fn nms(mut boxes: Vec<Candidate>, threshold: f32) -> Vec<Candidate> {
    boxes.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut keep: Vec<Candidate> = Vec::new();
    for candidate in boxes {
        if keep.iter().all(|k| iou(k, &candidate) <= threshold) {
            keep.push(candidate);
        }
    }
    keep
}

/// Compute intersection over union
fn iou(a: &Candidate, b: &Candidate) -> f32 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let area_a = (a.x2 - a.x1) * (a.y2 - a.y1);
    let area_b = (b.x2 - b.x1) * (b.y2 - b.y1);
    let union = area_a + area_b - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}
