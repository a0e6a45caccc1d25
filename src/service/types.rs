//! Service layer types

use serde::{Deserialize, Serialize};

use crate::engine::FaceResult;

/// One inbound stream message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Encoded image bytes (JPEG, PNG, ...)
    Binary(Vec<u8>),
    /// Base64 image, optionally as a `data:` URL
    Text(String),
}

/// Error code attached to a failed stream reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// This frame's image or inference failed
    ProcessingError,
    /// Failure not attributable to the frame
    InternalError,
    /// Session was opened with a selector the registry does not know
    UnknownModel,
}

/// One outbound stream message, exactly one per received frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StreamReply {
    Success { result: Vec<FaceResult> },
    Failure { error: String, code: ErrorCode },
}

impl StreamReply {
    pub fn success(result: Vec<FaceResult>) -> Self {
        StreamReply::Success { result }
    }

    pub fn failure(error: impl Into<String>, code: ErrorCode) -> Self {
        StreamReply::Failure {
            error: error.into(),
            code,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, StreamReply::Success { .. })
    }

    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            StreamReply::Success { .. } => None,
            StreamReply::Failure { code, .. } => Some(*code),
        }
    }
}

/// How a stream session ended
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionEnd {
    /// Client closed the connection
    #[default]
    ClientClosed,
    /// Receiving or sending failed at the transport level
    TransportError,
    /// No pipeline could be built for the session
    SetupFailed,
}

/// Per-session counters, logged on close
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub frames: u64,
    pub failed_frames: u64,
    pub end: SessionEnd,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::BoundingBox;

    #[test]
    fn test_reply_wire_shapes() {
        let ok = StreamReply::success(vec![FaceResult {
            emotion: 3,
            bbox: BoundingBox::new(1, 2, 3, 4),
        }]);
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            serde_json::json!({"result": [{"emotion": 3, "x1": 1, "y1": 2, "x2": 3, "y2": 4}]})
        );

        let err = StreamReply::failure("bad frame", ErrorCode::ProcessingError);
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            serde_json::json!({"error": "bad frame", "code": "PROCESSING_ERROR"})
        );
    }

    #[test]
    fn test_reply_round_trips_from_client_json() {
        let reply: StreamReply =
            serde_json::from_str(r#"{"error": "boom", "code": "INTERNAL_ERROR"}"#).unwrap();
        assert_eq!(reply.code(), Some(ErrorCode::InternalError));

        let reply: StreamReply = serde_json::from_str(r#"{"result": []}"#).unwrap();
        assert!(reply.is_success());
    }
}
