//! Unified error handling
//!
//! Application error type and response envelope:
//! - [`AppError`] - application error enum
//! - [`AppResponse`] - API response structure
//!
//! # Error code scheme
//!
//! | Prefix | Category | Example |
//! |--------|----------|---------|
//! | E0xxx  | Business errors | E0003 not found |
//! | E9xxx  | System errors | E9002 database error |

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

/// API response envelope
///
/// ```json
/// {
///   "code": "E0000",
///   "message": "Success",
///   "data": { ... }
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct AppResponse<T> {
    /// Error code (E0000 means success)
    pub code: String,
    /// Message
    pub message: String,
    /// Response data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

/// Application error enum
///
/// Client errors carry their message through to the response body.
/// System errors are logged and mapped to a generic message.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // ========== Business errors (4xx) ==========
    #[error("Validation failed: {0}")]
    /// Malformed or incomplete input (400)
    Validation(String),

    #[error("Resource not found: {0}")]
    /// Unknown order or product (404)
    NotFound(String),

    #[error("Signature invalid: {0}")]
    /// Cryptographic proof failed verification (400)
    SignatureInvalid(String),

    #[error("Conflict: {0}")]
    /// State precludes the transition (409)
    Conflict(String),

    // ========== Upstream errors (5xx) ==========
    #[error("Provider error: {0}")]
    /// Payment provider unreachable or rejected the call (502)
    Provider(String),

    // ========== System errors (5xx) ==========
    #[error("Database error: {0}")]
    /// Storage failure (500)
    Database(String),

    #[error("Internal server error: {0}")]
    /// Internal error (500)
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // Validation (400)
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "E0002", msg.as_str()),

            // Not found (404)
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "E0003", msg.as_str()),

            // Conflict (409)
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "E0004", msg.as_str()),

            // Signature invalid (400), message is fixed so the response
            // never leaks which part of the proof failed
            AppError::SignatureInvalid(msg) => {
                error!(target: "signature", error = %msg, "Signature verification failed");
                (StatusCode::BAD_REQUEST, "E0007", "Invalid signature")
            }

            // Provider errors (502)
            AppError::Provider(msg) => {
                error!(target: "provider", error = %msg, "Payment provider error");
                (StatusCode::BAD_GATEWAY, "E0008", "Payment provider error")
            }

            // Database errors (500)
            AppError::Database(msg) => {
                error!(target: "database", error = %msg, "Database error occurred");
                (StatusCode::INTERNAL_SERVER_ERROR, "E9002", "Database error")
            }

            // Internal errors (500)
            AppError::Internal(msg) => {
                error!(target: "internal", error = %msg, "Internal error occurred");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "E9001",
                    "Internal server error",
                )
            }
        };

        let body = Json(AppResponse::<()> {
            code: code.to_string(),
            message: message.to_string(),
            data: None,
        });

        (status, body).into_response()
    }
}

impl From<crate::orders::StorageError> for AppError {
    fn from(e: crate::orders::StorageError) -> Self {
        use crate::orders::StorageError;
        match e {
            StorageError::OrderNotFound(id) => {
                AppError::NotFound(format!("Order not found: {id}"))
            }
            StorageError::OrderExists(id) => {
                AppError::Conflict(format!("Order already exists: {id}"))
            }
            StorageError::IntentTaken(intent, order) => {
                AppError::Conflict(format!("Intent {intent} already bound to order {order}"))
            }
            other => AppError::Database(other.to_string()),
        }
    }
}

impl From<crate::gateway::GatewayError> for AppError {
    fn from(e: crate::gateway::GatewayError) -> Self {
        AppError::Provider(e.to_string())
    }
}

// ========== Helper functions ==========

/// Create a successful response
pub fn ok<T: Serialize>(data: T) -> Json<AppResponse<T>> {
    Json(AppResponse {
        code: "E0000".to_string(),
        message: "Success".to_string(),
        data: Some(data),
    })
}
