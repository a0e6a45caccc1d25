//! Service layer module
//!
//! Per-image orchestration and per-connection stream sessions.

pub mod orchestrator;
pub mod session;
pub mod types;

pub use orchestrator::InferenceOrchestrator;
pub use session::{FrameTransport, StreamSession};
pub use types::*;
