//! Error types for the rescue planner
//!
//! Only [`ValidationError`] ever reaches a caller of the coordinator. The
//! generation and cache errors are absorbed into the fallback path and the
//! cache latch respectively, and exist so those stages can log what went wrong.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use service_sdk::ServiceError;
use thiserror::Error;

use crate::models::ApiResponse;

/// Maximum number of items in one request
pub const MAX_ITEMS: usize = 50;

/// Maximum length of `additional_info`, in characters
pub const MAX_ADDITIONAL_INFO: usize = 1000;

/// Rejected request input
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("items must not be empty")]
    NoItems,

    #[error("too many items: {count} (maximum {max})")]
    TooManyItems { count: usize, max: usize },

    #[error("item {index}: name must not be blank")]
    BlankItemName { index: usize },

    #[error("item {index}: quantity must be at least 1, got {quantity}")]
    NonPositiveQuantity { index: usize, quantity: i64 },

    #[error("item {index}: location must not be blank")]
    BlankLocation { index: usize },

    #[error("environment must have at least one exit")]
    NoExits,

    #[error("occupancy must not be negative, got {0}")]
    NegativeOccupancy(i64),

    #[error("additional_info is too long: {length} characters (maximum {max})")]
    AdditionalInfoTooLong { length: usize, max: usize },
}

/// Failure of the generation stage
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation backend failed: {0}")]
    Backend(#[from] ServiceError),

    #[error("generation backend returned no text")]
    EmptyResponse,

    #[error("malformed generation response: {0}")]
    Malformed(String),
}

/// Failure talking to the cache service
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache service failed: {0}")]
    Service(#[from] ServiceError),

    #[error("cache service rejected the request: {0}")]
    Rejected(String),

    #[error("cached value is not a rescue plan: {0}")]
    Decode(String),
}

/// Errors surfaced by the HTTP layer
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("malformed request body: {0}")]
    MalformedBody(String),
}

impl ApiError {
    fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation_error",
            ApiError::MalformedBody(_) => "invalid_request",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse::failure(self.code(), self.to_string());
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}
