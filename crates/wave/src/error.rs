//! Error taxonomy of the recommendation core
//!
//! `StoreError` is what every store contract returns. Candidate generators swallow it
//! (an unavailable pool is just an empty pool); only the stages without which nothing
//! can be ranked surface it as `RecommendationError::UpstreamStoreFailure`.

use crate::types::TrackId;
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

/// Failure reported by a store implementation
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// Errors surfaced to callers of the recommendation surfaces
#[derive(Debug, Error)]
pub enum RecommendationError {
    #[error("Upstream store failure: {0}")]
    UpstreamStoreFailure(#[from] StoreError),

    #[error("Track not found: {0}")]
    TrackNotFound(TrackId),

    #[error("Unknown mix type: {0}")]
    UnknownMix(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

pub type Result<T> = std::result::Result<T, RecommendationError>;

impl ResponseError for RecommendationError {
    fn status_code(&self) -> StatusCode {
        match self {
            RecommendationError::InvalidRequest(_) | RecommendationError::UnknownMix(_) => {
                StatusCode::BAD_REQUEST
            }
            RecommendationError::TrackNotFound(_) => StatusCode::NOT_FOUND,
            RecommendationError::UpstreamStoreFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.to_string()
        }))
    }
}
