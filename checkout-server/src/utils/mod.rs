//! Utility module - shared helpers and types
//!
//! # Contents
//!
//! - [`AppError`] - application error type
//! - [`AppResponse`] - API response envelope
//! - Logging helpers

pub mod error;
pub mod logger;

pub use error::{AppError, AppResponse, ok};

/// Result alias used across handlers and services
pub type AppResult<T> = Result<T, AppError>;
