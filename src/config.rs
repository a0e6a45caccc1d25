//! Service configuration

use std::path::PathBuf;

use serde::Deserialize;

use crate::engine::registry::ModelParams;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub inference: InferenceConfig,
    pub models: ModelsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub body_limit_mb: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub device: String,
    pub failure_policy: FailurePolicy,
}

/// What `process` does when recognition fails for one face
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Log the failure, leave the face out, keep going
    #[default]
    SkipFace,
    /// Fail the whole call on the first failing face
    Abort,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub yolo_model_path: PathBuf,
    pub fer_model_path: PathBuf,
    pub fer_input_shape: [i64; 3],
    pub detectors: Vec<ModelEntry>,
    pub recognizers: Vec<ModelEntry>,
}

/// Extra named model registered from the config file
#[derive(Debug, Clone, Deserialize)]
pub struct ModelEntry {
    pub name: String,
    pub backend: String,
    #[serde(default)]
    pub params: ModelParams,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// `EMOTION_CONFIG` if set, otherwise `config.toml`
    pub fn default_path() -> String {
        std::env::var("EMOTION_CONFIG").unwrap_or_else(|_| "config.toml".to_string())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            body_limit_mb: 50,
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            device: "CPU".to_string(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            yolo_model_path: PathBuf::from("models/yolov5-face.xml"),
            fer_model_path: PathBuf::from("models/fer_v1.xml"),
            fer_input_shape: [100, 100, 3],
            detectors: Vec::new(),
            recognizers: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.inference.failure_policy, FailurePolicy::SkipFace);
        assert_eq!(config.models.fer_input_shape, [100, 100, 3]);
        assert_eq!(config.bind_address(), "0.0.0.0:8000");
    }

    #[test]
    fn test_parse_model_entries() {
        let config = Config::parse(
            r#"
            [server]
            port = 9000

            [inference]
            failure_policy = "abort"

            [[models.detectors]]
            name = "fixed_corner"
            backend = "mock"
            params = { box = [0, 0, 32, 32] }

            [[models.recognizers]]
            name = "fer_gray"
            backend = "fer"
            params = { model_path = "models/fer_gray.xml", input_shape = [48, 48, 1] }
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.inference.failure_policy, FailurePolicy::Abort);
        assert_eq!(config.models.detectors[0].name, "fixed_corner");
        assert_eq!(
            config.models.detectors[0].params.i64_array::<4>("box").unwrap(),
            [0, 0, 32, 32]
        );
        assert_eq!(
            config.models.recognizers[0].params.str("model_path").unwrap(),
            "models/fer_gray.xml"
        );
    }

    #[test]
    fn test_unknown_policy_rejected() {
        assert!(Config::parse("[inference]\nfailure_policy = \"maybe\"").is_err());
    }
}
