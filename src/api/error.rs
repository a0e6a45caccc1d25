//! HTTP error mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::{error, warn};

use crate::engine::ModelSelection;
use crate::error::{ProcessingError, RegistryError};

use super::dto::ErrorResponse;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Processing(#[from] ProcessingError),

    #[error("Invalid multipart body: {0}")]
    Multipart(String),

    #[error("Missing image field")]
    MissingImage,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Registry(RegistryError::UnknownModel { .. }) => StatusCode::BAD_REQUEST,
            ApiError::Registry(RegistryError::Construction { .. }) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Processing(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Multipart(_) | ApiError::MissingImage => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Registry(RegistryError::UnknownModel { .. }) => "UNKNOWN_MODEL",
            ApiError::Registry(RegistryError::Construction { .. }) => "MODEL_CONSTRUCTION_ERROR",
            ApiError::Processing(_) => "PROCESSING_ERROR",
            ApiError::Multipart(_) => "MULTIPART_ERROR",
            ApiError::MissingImage => "MISSING_IMAGE",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Request stage the failure came from
    pub fn stage(&self) -> &'static str {
        match self {
            ApiError::Registry(RegistryError::UnknownModel { .. }) => "model selection",
            ApiError::Registry(RegistryError::Construction { .. }) => "model construction",
            ApiError::Processing(ProcessingError::Decode(_)) => "decode",
            ApiError::Processing(ProcessingError::Detection(_)) => "detection",
            ApiError::Processing(ProcessingError::Recognition { .. }) => "recognition",
            ApiError::Multipart(_) | ApiError::MissingImage => "upload",
            ApiError::Internal(_) => "inference worker",
        }
    }

    /// Log the failure of `route` with the selectors it ran under
    pub fn log(&self, route: &str, selection: &ModelSelection) {
        if self.status().is_server_error() {
            error!(
                "{} ({}) failed at {} [{}]: {}",
                route,
                selection,
                self.stage(),
                self.code(),
                self
            );
        } else {
            warn!(
                "{} ({}) failed at {} [{}]: {}",
                route,
                selection,
                self.stage(),
                self.code(),
                self
            );
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorResponse::new(&self.to_string(), self.code());
        (status, Json(body)).into_response()
    }
}
