//! API module - REST upload and WebSocket stream handlers

pub mod dto;
pub mod error;
pub mod rest;
pub mod ws;

pub use error::{ApiError, ApiResult};
pub use rest::{create_rest_router, AppState};
