//! REST API request/response data transfer objects

use serde::{Deserialize, Serialize};

use crate::engine::registry::DEFAULT_MODEL;
use crate::engine::{FaceResult, ModelSelection};

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

/// `POST /predict` query string
#[derive(Debug, Deserialize)]
pub struct PredictQuery {
    #[serde(default = "default_model")]
    pub detector_name: String,
    #[serde(default = "default_model")]
    pub recognizer_name: String,
}

impl PredictQuery {
    pub fn selection(&self) -> ModelSelection {
        ModelSelection::new(&self.detector_name, &self.recognizer_name)
    }
}

/// `GET /ws` query string
#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    #[serde(default = "default_model")]
    pub detector: String,
    #[serde(default = "default_model")]
    pub recognizer: String,
}

impl StreamQuery {
    pub fn selection(&self) -> ModelSelection {
        ModelSelection::new(&self.detector, &self.recognizer)
    }
}

/// Predict response
#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    pub result: Vec<FaceResult>,
}

/// Registered model names
#[derive(Debug, Serialize, Deserialize)]
pub struct ModelsResponse {
    pub detectors: Vec<String>,
    pub recognizers: Vec<String>,
}

/// Health response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: String,
    pub detectors: Vec<String>,
    pub recognizers: Vec<String>,
    pub uptime_seconds: u64,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl ErrorResponse {
    pub fn new(error: &str, code: &str) -> Self {
        Self {
            error: error.to_string(),
            code: code.to_string(),
        }
    }
}
