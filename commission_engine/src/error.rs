//! Error types.
//!
//! The commission and aggregation functions are total and never fail;
//! errors only arise at the edges: parsing user-entered values, reading
//! record files and answering HTTP requests.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::path::PathBuf;
use thiserror::Error;

use crate::models::Period;

/// Rejected user input.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("amount is empty")]
    EmptyAmount,

    #[error("'{0}' is not a number")]
    NotANumber(String),

    #[error("amount must not be negative: {0}")]
    NegativeAmount(f64),

    #[error("year must be between 1 and 9999, got {0}")]
    InvalidYear(i32),

    #[error("month must be between 1 and 12, got {0}")]
    InvalidMonth(u32),

    #[error("period range starts at {start} after it ends at {end}")]
    InvertedRange { start: Period, end: Period },
}

/// Failure reading records from the backing store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors returned by the HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("representative '{0}' not found")]
    NotFound(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
