//! Core data shapes flowing through the inference pipeline

use serde::{Deserialize, Serialize};

/// Emotion class index produced by a recognizer.
///
/// The pipeline never interprets it; it is carried through as-is.
pub type EmotionLabel = i32;

/// Face region in image space, stored as a corner pair.
///
/// `x1 < x2` and `y1 < y2` for any box handed to a recognizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Saturates for raw model boxes far outside the image
    pub fn width(&self) -> i32 {
        self.x2.saturating_sub(self.x1)
    }

    pub fn height(&self) -> i32 {
        self.y2.saturating_sub(self.y1)
    }

    /// Clamp the box to a `width` x `height` image.
    ///
    /// Returns `None` when nothing of positive area is left, which also covers
    /// inverted boxes (`x2 <= x1` or `y2 <= y1`).
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<BoundingBox> {
        let max_x = i32::try_from(width).unwrap_or(i32::MAX);
        let max_y = i32::try_from(height).unwrap_or(i32::MAX);

        let clamped = BoundingBox {
            x1: self.x1.clamp(0, max_x),
            y1: self.y1.clamp(0, max_y),
            x2: self.x2.clamp(0, max_x),
            y2: self.y2.clamp(0, max_y),
        };

        if clamped.width() > 0 && clamped.height() > 0 {
            Some(clamped)
        } else {
            None
        }
    }
}

/// One recognized face: emotion plus where it was found.
///
/// Serializes flat, `{emotion, x1, y1, x2, y2}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceResult {
    pub emotion: EmotionLabel,
    #[serde(flatten)]
    pub bbox: BoundingBox,
}

/// FER 7-class scheme used by the bundled recognizer and the web front-end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emotion {
    Angry,
    Disgust,
    Fear,
    Happy,
    Neutral,
    Sad,
    Surprise,
}

impl Emotion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Angry => "angry",
            Emotion::Disgust => "disgust",
            Emotion::Fear => "fear",
            Emotion::Happy => "happy",
            Emotion::Neutral => "neutral",
            Emotion::Sad => "sad",
            Emotion::Surprise => "surprise",
        }
    }

    pub fn from_label(label: EmotionLabel) -> Option<Self> {
        match label {
            0 => Some(Emotion::Angry),
            1 => Some(Emotion::Disgust),
            2 => Some(Emotion::Fear),
            3 => Some(Emotion::Happy),
            4 => Some(Emotion::Neutral),
            5 => Some(Emotion::Sad),
            6 => Some(Emotion::Surprise),
            _ => None,
        }
    }
}
