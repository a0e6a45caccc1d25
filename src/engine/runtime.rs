//! OpenVINO runtime shared by the learned back-ends
//!
//! The `Core` is created lazily on the first network compile, so a process
//! that only serves mock models never touches the OpenVINO libraries.
//! Compiled networks are handed out per model instance and never cached
//! here: every constructor call loads its weights afresh.

use std::path::Path;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use openvino::{CompiledModel, Core, ElementType, InferRequest, Shape, Tensor};
use parking_lot::Mutex;
use tracing::info;

use crate::config::InferenceConfig;

/// Wrapper for OpenVINO Core that implements Send
struct SafeCore(Core);
unsafe impl Send for SafeCore {}

/// A compiled network owned by one model instance.
///
/// The OpenVINO handles are raw pointers; the network is only ever used
/// from the thread currently owning the model instance.
pub struct CompiledNetwork {
    model: CompiledModel,
    name: String,
}
unsafe impl Send for CompiledNetwork {}

impl CompiledNetwork {
    /// Run one synchronous inference with a single f32 input.
    ///
    /// Returns the outputs requested by index, each as `(dims, data)`.
    pub fn infer(&mut self, dims: &[i64], input: &[f32]) -> Result<Vec<(Vec<i64>, Vec<f32>)>> {
        let mut request = self
            .model
            .create_infer_request()
            .with_context(|| format!("Failed to create infer request for {}", self.name))?;

        let shape = Shape::new(dims)?;
        let mut tensor = Tensor::new(ElementType::F32, &shape)?;
        write_f32(tensor.get_raw_data_mut()?, input)?;

        request.set_input_tensor(&tensor)?;
        request.infer()?;

        read_outputs(&request)
    }
}

fn write_f32(raw: &mut [u8], data: &[f32]) -> Result<()> {
    if raw.len() != data.len() * 4 {
        anyhow::bail!(
            "Input tensor holds {} bytes, got {} floats",
            raw.len(),
            data.len()
        );
    }
    for (dst, v) in raw.chunks_exact_mut(4).zip(data) {
        dst.copy_from_slice(&v.to_le_bytes());
    }
    Ok(())
}

fn read_f32(tensor: &Tensor) -> Result<(Vec<i64>, Vec<f32>)> {
    let dims: Vec<i64> = tensor.get_shape()?.get_dimensions().to_vec();
    let data = tensor
        .get_raw_data()?
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    Ok((dims, data))
}

fn read_outputs(request: &InferRequest) -> Result<Vec<(Vec<i64>, Vec<f32>)>> {
    let mut outputs = Vec::new();
    // Networks used here have a handful of outputs at most
    for i in 0..16 {
        match request.get_output_tensor_by_index(i) {
            Ok(tensor) => outputs.push(read_f32(&tensor)?),
            Err(_) => break,
        }
    }
    if outputs.is_empty() {
        anyhow::bail!("Network produced no outputs");
    }
    Ok(outputs)
}

/// Lazily initialised OpenVINO core plus the target device
pub struct InferenceRuntime {
    core: Mutex<Option<SafeCore>>,
    device: String,
}

impl InferenceRuntime {
    pub fn new(config: &InferenceConfig) -> Self {
        Self {
            core: Mutex::new(None),
            device: config.device.clone(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.core.lock().is_some()
    }

    /// Read and compile a network from an IR/ONNX file
    pub fn compile(&self, path: &Path) -> Result<CompiledNetwork> {
        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow!("Model path is not valid UTF-8: {:?}", path))?;
        if !path.exists() {
            anyhow::bail!("Model file not found: {}", path_str);
        }

        let mut guard = self.core.lock();
        if guard.is_none() {
            info!("Initializing OpenVINO core (device {})", self.device);
            let core = Core::new().map_err(|e| anyhow!("Failed to initialize OpenVINO: {}", e))?;
            *guard = Some(SafeCore(core));
        }
        let core = &mut guard
            .as_mut()
            .ok_or_else(|| anyhow!("OpenVINO core unavailable"))?
            .0;

        info!("Loading model from {}", path_str);
        let start = Instant::now();

        let model = core.read_model_from_file(path_str, "")?;
        let compiled = core.compile_model(&model, self.device.as_str().into())?;

        info!("Model {} loaded in {:?}", path_str, start.elapsed());

        Ok(CompiledNetwork {
            model: compiled,
            name: path_str.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runtime() -> InferenceRuntime {
        InferenceRuntime::new(&InferenceConfig::default())
    }

    #[test]
    fn test_missing_model_fails_before_core_init() {
        let rt = runtime();
        let err = rt.compile(Path::new("does/not/exist.xml")).err().unwrap();
        assert!(err.to_string().contains("not found"));
        assert!(!rt.is_initialized());
    }

    #[test]
    fn test_write_f32_length_check() {
        let mut raw = vec![0u8; 8];
        assert!(write_f32(&mut raw, &[1.0]).is_err());
        write_f32(&mut raw, &[1.0, 2.0]).unwrap();
        assert_eq!(&raw[4..], &2.0f32.to_le_bytes());
    }
}
