//! Inference engine module
//!
//! Provides the pluggable model pipeline:
//! - Capability traits every detector/recognizer implements
//! - Name-keyed model registry with fixed construction parameters
//! - Unified detector + recognizer pipeline
//! - Mock and OpenVINO-backed model implementations

pub mod types;
pub mod capability;
pub mod registry;
pub mod pipeline;
pub mod catalog;
pub mod mock;
pub mod runtime;
pub mod preprocess;
pub mod yolo;
pub mod fer;

pub use capability::{EmotionRecognizer, FaceDetector};
pub use catalog::register_builtin_models;
pub use pipeline::UnifiedPipeline;
pub use registry::{ModelKind, ModelParams, ModelRegistry, ModelSelection};
pub use runtime::InferenceRuntime;
pub use types::{BoundingBox, Emotion, EmotionLabel, FaceResult};
