//! API route modules
//!
//! # Structure
//!
//! - [`health`] - liveness probe
//! - [`checkout`] - order creation + client settlement channel
//! - [`webhook`] - provider settlement channel
//! - [`orders`] - order lookup
//! - [`stock`] - operator restock

pub mod checkout;
pub mod health;
pub mod orders;
pub mod stock;
pub mod webhook;

use axum::Router;

use crate::core::ServerState;

// Re-export common types for handlers
pub use crate::utils::{AppResponse, AppResult};

/// Assemble the full API router
pub fn router() -> Router<ServerState> {
    Router::new()
        .merge(health::router())
        .merge(checkout::router())
        .merge(webhook::router())
        .merge(orders::router())
        .merge(stock::router())
}
