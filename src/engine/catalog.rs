//! Startup registration of every known model
//!
//! Runs once before the server accepts traffic. Built-ins go first, then
//! the extra entries from the config file, so a config entry with a
//! built-in name replaces it.

use std::sync::Arc;

use anyhow::anyhow;
use tracing::info;

use crate::config::{ModelEntry, ModelsConfig};
use super::capability::{EmotionRecognizer, FaceDetector};
use super::fer::FerEmotionRecognizer;
use super::mock::{MockDetector, MockRecognizer, MOCK_BOX, MOCK_LABEL};
use super::registry::{ModelKind, ModelParams, ModelRegistry};
use super::runtime::InferenceRuntime;
use super::yolo::YoloFaceDetector;

/// Back-end names accepted in `[[models.*]]` entries
pub const DETECTOR_BACKENDS: &[&str] = &["mock", "yolo"];
pub const RECOGNIZER_BACKENDS: &[&str] = &["mock", "fer"];

/// Fill `registry` with the built-in catalogue plus configured variants.
pub fn register_builtin_models(
    registry: &mut ModelRegistry,
    models: &ModelsConfig,
    runtime: Arc<InferenceRuntime>,
) -> anyhow::Result<()> {
    let mock_box = vec![MOCK_BOX.x1, MOCK_BOX.y1, MOCK_BOX.x2, MOCK_BOX.y2];
    for name in ["mock", "mockD", "mockD2"] {
        register_detector_backend(
            registry,
            name,
            "mock",
            ModelParams::new().with("box", mock_box.clone()),
            &runtime,
        )?;
    }
    register_detector_backend(
        registry,
        "yolo_v5",
        "yolo",
        ModelParams::new()
            .with("model_path", models.yolo_model_path.to_string_lossy().to_string())
            .with("layout", "v5_face"),
        &runtime,
    )?;

    for name in ["mock", "mockR"] {
        register_recognizer_backend(
            registry,
            name,
            "mock",
            ModelParams::new().with("label", MOCK_LABEL),
            &runtime,
        )?;
    }
    register_recognizer_backend(
        registry,
        "fer_1",
        "fer",
        ModelParams::new()
            .with("model_path", models.fer_model_path.to_string_lossy().to_string())
            .with("input_shape", models.fer_input_shape.to_vec()),
        &runtime,
    )?;

    for entry in &models.detectors {
        register_entry(registry, ModelKind::Detector, entry, &runtime)?;
    }
    for entry in &models.recognizers {
        register_entry(registry, ModelKind::Recognizer, entry, &runtime)?;
    }

    info!(
        "Registered detectors {:?}, recognizers {:?}",
        registry.list_names(ModelKind::Detector),
        registry.list_names(ModelKind::Recognizer)
    );
    Ok(())
}

fn register_entry(
    registry: &mut ModelRegistry,
    kind: ModelKind,
    entry: &ModelEntry,
    runtime: &Arc<InferenceRuntime>,
) -> anyhow::Result<()> {
    match kind {
        ModelKind::Detector => register_detector_backend(
            registry,
            &entry.name,
            &entry.backend,
            entry.params.clone(),
            runtime,
        ),
        ModelKind::Recognizer => register_recognizer_backend(
            registry,
            &entry.name,
            &entry.backend,
            entry.params.clone(),
            runtime,
        ),
    }
}

/// Register `name` as an instance of detector `backend` with fixed `params`
pub fn register_detector_backend(
    registry: &mut ModelRegistry,
    name: &str,
    backend: &str,
    params: ModelParams,
    runtime: &Arc<InferenceRuntime>,
) -> anyhow::Result<()> {
    match backend {
        "mock" => registry.register_detector(
            name,
            |params| Ok(Box::new(MockDetector::from_params(params)?) as Box<dyn FaceDetector>),
            params,
        ),
        "yolo" => {
            let runtime = runtime.clone();
            registry.register_detector(
                name,
                move |params| {
                    let detector = YoloFaceDetector::from_params(&runtime, params)?;
                    Ok(Box::new(detector) as Box<dyn FaceDetector>)
                },
                params,
            )
        }
        other => {
            return Err(anyhow!(
                "Unknown detector backend '{}' for '{}' (expected one of {:?})",
                other,
                name,
                DETECTOR_BACKENDS
            ))
        }
    }
    Ok(())
}

/// Register `name` as an instance of recognizer `backend` with fixed `params`
pub fn register_recognizer_backend(
    registry: &mut ModelRegistry,
    name: &str,
    backend: &str,
    params: ModelParams,
    runtime: &Arc<InferenceRuntime>,
) -> anyhow::Result<()> {
    match backend {
        "mock" => registry.register_recognizer(
            name,
            |params| {
                Ok(Box::new(MockRecognizer::from_params(params)?) as Box<dyn EmotionRecognizer>)
            },
            params,
        ),
        "fer" => {
            let runtime = runtime.clone();
            registry.register_recognizer(
                name,
                move |params| {
                    Ok(Box::new(FerEmotionRecognizer::from_params(&runtime, params)?)
                        as Box<dyn EmotionRecognizer>)
                },
                params,
            )
        }
        other => {
            return Err(anyhow!(
                "Unknown recognizer backend '{}' for '{}' (expected one of {:?})",
                other,
                name,
                RECOGNIZER_BACKENDS
            ))
        }
    }
    Ok(())
}
