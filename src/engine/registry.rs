//! Model Registry
//!
//! Name-keyed catalog of detector and recognizer constructors together with
//! the fixed parameters each one is built with. The registry is filled once
//! during startup and only read afterwards, so it is shared as a plain
//! `Arc<ModelRegistry>` without locking.

use std::collections::BTreeMap;
use std::fmt;

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::{RegistryError, RegistryResult};
use super::capability::{EmotionRecognizer, FaceDetector};
use super::pipeline::UnifiedPipeline;

/// Selector used when a request does not name a model
pub const DEFAULT_MODEL: &str = "mock";

/// The two model families the registry keeps apart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Detector,
    Recognizer,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Detector => "detector",
            ModelKind::Recognizer => "recognizer",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed construction parameters attached to a registration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelParams(Map<String, Value>);

impl ModelParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn str(&self, key: &str) -> anyhow::Result<&str> {
        self.get(key)
            .ok_or_else(|| anyhow!("missing parameter '{}'", key))?
            .as_str()
            .ok_or_else(|| anyhow!("parameter '{}' must be a string", key))
    }

    pub fn f32_or(&self, key: &str, default: f32) -> anyhow::Result<f32> {
        match self.get(key) {
            None => Ok(default),
            Some(v) => v
                .as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| anyhow!("parameter '{}' must be a number", key)),
        }
    }

    pub fn i32_or(&self, key: &str, default: i32) -> anyhow::Result<i32> {
        match self.get(key) {
            None => Ok(default),
            Some(v) => v
                .as_i64()
                .and_then(|i| i32::try_from(i).ok())
                .ok_or_else(|| anyhow!("parameter '{}' must be a 32-bit integer", key)),
        }
    }

    /// Fixed-length integer array, e.g. a box or an input shape
    pub fn i64_array<const N: usize>(&self, key: &str) -> anyhow::Result<[i64; N]> {
        let items = self
            .get(key)
            .ok_or_else(|| anyhow!("missing parameter '{}'", key))?
            .as_array()
            .ok_or_else(|| anyhow!("parameter '{}' must be an array", key))?;

        if items.len() != N {
            anyhow::bail!("parameter '{}' must have {} elements, got {}", key, N, items.len());
        }

        let mut out = [0i64; N];
        for (slot, item) in out.iter_mut().zip(items) {
            *slot = item
                .as_i64()
                .with_context(|| format!("parameter '{}' must contain integers", key))?;
        }
        Ok(out)
    }
}

type Constructor<T> = Box<dyn Fn(&ModelParams) -> anyhow::Result<T> + Send + Sync>;

struct ModelDescriptor<T> {
    constructor: Constructor<T>,
    params: ModelParams,
}

/// Which detector and recognizer a request or stream session asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub detector: String,
    pub recognizer: String,
}

impl ModelSelection {
    pub fn new(detector: impl Into<String>, recognizer: impl Into<String>) -> Self {
        Self {
            detector: detector.into(),
            recognizer: recognizer.into(),
        }
    }
}

impl Default for ModelSelection {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL, DEFAULT_MODEL)
    }
}

impl fmt::Display for ModelSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "detector={}, recognizer={}", self.detector, self.recognizer)
    }
}

/// Catalog of constructible models.
///
/// `create_*` runs the constructor on every call; nothing is cached, so
/// every pipeline owns fresh instances.
#[derive(Default)]
pub struct ModelRegistry {
    detectors: BTreeMap<String, ModelDescriptor<Box<dyn FaceDetector>>>,
    recognizers: BTreeMap<String, ModelDescriptor<Box<dyn EmotionRecognizer>>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a detector constructor. An existing entry with the same name
    /// is replaced.
    pub fn register_detector<F>(
        &mut self,
        name: impl Into<String>,
        constructor: F,
        params: ModelParams,
    ) where
        F: Fn(&ModelParams) -> anyhow::Result<Box<dyn FaceDetector>> + Send + Sync + 'static,
    {
        let name = name.into();
        let descriptor = ModelDescriptor {
            constructor: Box::new(constructor),
            params,
        };
        if self.detectors.insert(name.clone(), descriptor).is_some() {
            debug!("Detector '{}' re-registered, previous entry replaced", name);
        }
    }

    /// Register a recognizer constructor. An existing entry with the same
    /// name is replaced.
    pub fn register_recognizer<F>(
        &mut self,
        name: impl Into<String>,
        constructor: F,
        params: ModelParams,
    ) where
        F: Fn(&ModelParams) -> anyhow::Result<Box<dyn EmotionRecognizer>> + Send + Sync + 'static,
    {
        let name = name.into();
        let descriptor = ModelDescriptor {
            constructor: Box::new(constructor),
            params,
        };
        if self.recognizers.insert(name.clone(), descriptor).is_some() {
            debug!("Recognizer '{}' re-registered, previous entry replaced", name);
        }
    }

    pub fn create_detector(&self, name: &str) -> RegistryResult<Box<dyn FaceDetector>> {
        construct(ModelKind::Detector, name, &self.detectors)
    }

    pub fn create_recognizer(&self, name: &str) -> RegistryResult<Box<dyn EmotionRecognizer>> {
        construct(ModelKind::Recognizer, name, &self.recognizers)
    }

    /// Build a fresh pipeline for one request or stream session
    pub fn create_pipeline(&self, selection: &ModelSelection) -> RegistryResult<UnifiedPipeline> {
        let detector = self.create_detector(&selection.detector)?;
        let recognizer = self.create_recognizer(&selection.recognizer)?;
        info!("Loaded pipeline ({})", selection);
        Ok(UnifiedPipeline::new(detector, recognizer))
    }

    /// Every registered name of a kind
    pub fn list_names(&self, kind: ModelKind) -> Vec<String> {
        match kind {
            ModelKind::Detector => self.detectors.keys().cloned().collect(),
            ModelKind::Recognizer => self.recognizers.keys().cloned().collect(),
        }
    }

    pub fn contains(&self, kind: ModelKind, name: &str) -> bool {
        match kind {
            ModelKind::Detector => self.detectors.contains_key(name),
            ModelKind::Recognizer => self.recognizers.contains_key(name),
        }
    }

    /// Check both selector names without constructing anything
    pub fn validate(&self, selection: &ModelSelection) -> RegistryResult<()> {
        for (kind, name) in [
            (ModelKind::Detector, &selection.detector),
            (ModelKind::Recognizer, &selection.recognizer),
        ] {
            if !self.contains(kind, name) {
                return Err(RegistryError::UnknownModel {
                    kind,
                    name: name.clone(),
                });
            }
        }
        Ok(())
    }
}

fn construct<T>(
    kind: ModelKind,
    name: &str,
    entries: &BTreeMap<String, ModelDescriptor<T>>,
) -> RegistryResult<T> {
    let descriptor = entries.get(name).ok_or_else(|| RegistryError::UnknownModel {
        kind,
        name: name.to_string(),
    })?;

    (descriptor.constructor)(&descriptor.params).map_err(|source| RegistryError::Construction {
        kind,
        name: name.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::mock::{MockDetector, MockRecognizer};
    use crate::engine::types::BoundingBox;
    use image::DynamicImage;

    fn register_mock_detector(registry: &mut ModelRegistry, name: &str, bbox: [i64; 4]) {
        registry.register_detector(
            name,
            |params| Ok(Box::new(MockDetector::from_params(params)?) as Box<dyn FaceDetector>),
            ModelParams::new().with("box", bbox.to_vec()),
        );
    }

    #[test]
    fn test_create_uses_constructor_and_params() {
        let mut registry = ModelRegistry::new();
        register_mock_detector(&mut registry, "N", [1, 2, 3, 4]);

        let mut detector = registry.create_detector("N").unwrap();
        let boxes = detector.detect_faces(&DynamicImage::new_rgb8(8, 8)).unwrap();
        assert_eq!(boxes, vec![BoundingBox::new(1, 2, 3, 4)]);
    }

    #[test]
    fn test_create_unknown_model() {
        let registry = ModelRegistry::new();
        let err = registry.create_detector("missing").err().unwrap();
        assert!(matches!(
            err,
            RegistryError::UnknownModel { kind: ModelKind::Detector, ref name } if name == "missing"
        ));
    }

    #[test]
    fn test_reregistration_overwrites() {
        let mut registry = ModelRegistry::new();
        register_mock_detector(&mut registry, "N", [1, 1, 2, 2]);
        register_mock_detector(&mut registry, "N", [5, 5, 9, 9]);

        let mut detector = registry.create_detector("N").unwrap();
        let boxes = detector.detect_faces(&DynamicImage::new_rgb8(16, 16)).unwrap();
        assert_eq!(boxes, vec![BoundingBox::new(5, 5, 9, 9)]);
        assert_eq!(registry.list_names(ModelKind::Detector), vec!["N".to_string()]);
    }

    #[test]
    fn test_constructor_failure_is_wrapped() {
        let mut registry = ModelRegistry::new();
        registry.register_recognizer(
            "broken",
            |_| Err(anyhow!("weights not found")),
            ModelParams::new(),
        );

        let err = registry.create_recognizer("broken").err().unwrap();
        match err {
            RegistryError::Construction { kind, name, source } => {
                assert_eq!(kind, ModelKind::Recognizer);
                assert_eq!(name, "broken");
                assert!(source.to_string().contains("weights not found"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_list_names_per_kind() {
        let mut registry = ModelRegistry::new();
        for name in ["fer_1", "mock"] {
            registry.register_recognizer(
                name,
                |params| {
                    Ok(Box::new(MockRecognizer::from_params(params)?) as Box<dyn EmotionRecognizer>)
                },
                ModelParams::new(),
            );
        }

        let mut names = registry.list_names(ModelKind::Recognizer);
        names.sort();
        assert_eq!(names, vec!["fer_1".to_string(), "mock".to_string()]);
        assert!(registry.list_names(ModelKind::Detector).is_empty());
    }

    #[test]
    fn test_validate_selection() {
        let mut registry = ModelRegistry::new();
        register_mock_detector(&mut registry, "mock", [0, 0, 1, 1]);

        let err = registry.validate(&ModelSelection::default()).err().unwrap();
        assert!(matches!(err, RegistryError::UnknownModel { kind: ModelKind::Recognizer, .. }));
    }

    #[test]
    fn test_params_accessors() {
        let params = ModelParams::new()
            .with("model_path", "fer.xml")
            .with("input_shape", vec![100, 100, 3])
            .with("threshold", 0.5);

        assert_eq!(params.str("model_path").unwrap(), "fer.xml");
        assert_eq!(params.i64_array::<3>("input_shape").unwrap(), [100, 100, 3]);
        assert!(params.i64_array::<4>("input_shape").is_err());
        assert!((params.f32_or("threshold", 0.1).unwrap() - 0.5).abs() < 1e-6);
        assert!((params.f32_or("absent", 0.1).unwrap() - 0.1).abs() < 1e-6);
        assert!(params.str("absent").is_err());
    }
}
