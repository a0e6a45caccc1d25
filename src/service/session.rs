//! Stream session
//!
//! One session per WebSocket connection. The session owns a single
//! orchestrator for its whole lifetime and answers every frame with exactly
//! one reply, in arrival order. Frame failures are reported and the
//! connection stays open.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::orchestrator::InferenceOrchestrator;
use super::types::{ErrorCode, Frame, SessionEnd, SessionSummary, StreamReply};
use crate::config::FailurePolicy;
use crate::engine::{FaceResult, ModelRegistry, ModelSelection};
use crate::error::{ProcessingError, RegistryError};
use crate::utils::image::{decode_base64_image, decode_image};

/// Message channel a session reads frames from and writes replies to
#[async_trait]
pub trait FrameTransport: Send {
    /// Next frame, `Ok(None)` once the peer has closed
    async fn recv(&mut self) -> anyhow::Result<Option<Frame>>;

    async fn send(&mut self, reply: &StreamReply) -> anyhow::Result<()>;

    async fn close(&mut self) -> anyhow::Result<()>;
}

pub struct StreamSession {
    id: Uuid,
    registry: Arc<ModelRegistry>,
    selection: ModelSelection,
    policy: FailurePolicy,
}

enum FrameOutcome {
    Success(Vec<FaceResult>),
    Failed(ProcessingError),
    Crashed(String),
}

impl StreamSession {
    pub fn new(
        registry: Arc<ModelRegistry>,
        selection: ModelSelection,
        policy: FailurePolicy,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            registry,
            selection,
            policy,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Serve frames until the peer closes or the transport fails.
    ///
    /// The transport is closed exactly once before returning.
    pub async fn run<T: FrameTransport>(self, mut transport: T) -> SessionSummary {
        info!("Session {} opened ({})", self.id, self.selection);

        let summary = self.serve(&mut transport).await;

        if let Err(e) = transport.close().await {
            debug!("Session {} close failed: {}", self.id, e);
        }
        info!(
            "Session {} closed: {} frames, {} failed, {:?}",
            self.id, summary.frames, summary.failed_frames, summary.end
        );
        summary
    }

    async fn serve<T: FrameTransport>(&self, transport: &mut T) -> SessionSummary {
        let mut summary = SessionSummary::default();

        let mut orchestrator = match self.build_orchestrator().await {
            Ok(orchestrator) => orchestrator,
            Err(reply) => {
                if let Err(e) = transport.send(&reply).await {
                    warn!("Session {} could not report setup failure: {}", self.id, e);
                }
                summary.end = SessionEnd::SetupFailed;
                return summary;
            }
        };

        loop {
            let frame = match transport.recv().await {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    summary.end = SessionEnd::ClientClosed;
                    break;
                }
                Err(e) => {
                    warn!("Session {} receive failed: {}", self.id, e);
                    summary.end = SessionEnd::TransportError;
                    break;
                }
            };

            summary.frames += 1;
            let frame_no = summary.frames;

            let (returned, outcome) = run_frame(orchestrator, frame).await;
            let reply = match outcome {
                FrameOutcome::Success(results) => {
                    debug!("Session {} frame {}: {} faces", self.id, frame_no, results.len());
                    StreamReply::success(results)
                }
                FrameOutcome::Failed(e) => {
                    summary.failed_frames += 1;
                    warn!("Session {} frame {} failed: {}", self.id, frame_no, e);
                    StreamReply::failure(e.to_string(), ErrorCode::ProcessingError)
                }
                FrameOutcome::Crashed(message) => {
                    summary.failed_frames += 1;
                    error!("Session {} frame {}: {}", self.id, frame_no, message);
                    StreamReply::failure(message, ErrorCode::InternalError)
                }
            };

            if let Err(e) = transport.send(&reply).await {
                warn!("Session {} send failed: {}", self.id, e);
                summary.end = SessionEnd::TransportError;
                break;
            }

            orchestrator = match returned {
                Some(orchestrator) => orchestrator,
                None => match self.build_orchestrator().await {
                    Ok(orchestrator) => {
                        info!("Session {} pipeline rebuilt", self.id);
                        orchestrator
                    }
                    Err(reply) => {
                        if let Err(e) = transport.send(&reply).await {
                            warn!("Session {} could not report rebuild failure: {}", self.id, e);
                        }
                        summary.end = SessionEnd::SetupFailed;
                        break;
                    }
                },
            };
        }

        summary
    }

    /// Construct the session pipeline off the async runtime; on failure the
    /// error reply to send is returned instead.
    async fn build_orchestrator(&self) -> Result<InferenceOrchestrator, StreamReply> {
        let registry = self.registry.clone();
        let selection = self.selection.clone();
        let policy = self.policy;

        let built = tokio::task::spawn_blocking(move || registry.create_pipeline(&selection)).await;

        match built {
            Ok(Ok(pipeline)) => Ok(InferenceOrchestrator::new(pipeline, policy)),
            Ok(Err(e)) => {
                error!("Session {} pipeline construction failed: {}", self.id, e);
                let code = match e {
                    RegistryError::UnknownModel { .. } => ErrorCode::UnknownModel,
                    RegistryError::Construction { .. } => ErrorCode::InternalError,
                };
                Err(StreamReply::failure(e.to_string(), code))
            }
            Err(e) => {
                error!("Session {} pipeline construction panicked: {}", self.id, e);
                Err(StreamReply::failure(
                    format!("pipeline construction failed: {}", e),
                    ErrorCode::InternalError,
                ))
            }
        }
    }
}

/// Decode and process one frame on the blocking pool. The orchestrator comes
/// back unless the worker panicked.
async fn run_frame(
    mut orchestrator: InferenceOrchestrator,
    frame: Frame,
) -> (Option<InferenceOrchestrator>, FrameOutcome) {
    let handle = tokio::task::spawn_blocking(move || {
        let outcome = decode_frame(&frame).and_then(|image| orchestrator.process(&image));
        (orchestrator, outcome)
    });

    match handle.await {
        Ok((orchestrator, Ok(results))) => (Some(orchestrator), FrameOutcome::Success(results)),
        Ok((orchestrator, Err(e))) => (Some(orchestrator), FrameOutcome::Failed(e)),
        Err(e) => (None, FrameOutcome::Crashed(format!("inference worker failed: {}", e))),
    }
}

fn decode_frame(frame: &Frame) -> Result<image::DynamicImage, ProcessingError> {
    match frame {
        Frame::Binary(bytes) => decode_image(bytes),
        Frame::Text(text) => decode_base64_image(text),
    }
}
