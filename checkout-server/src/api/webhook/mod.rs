//! Webhook API Module
//!
//! Provider-side settlement channel. The handler reads the raw body so
//! the signature covers the exact bytes on the wire.

mod handler;

use axum::{Router, routing::post};

use crate::core::ServerState;

/// Webhook router
pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/webhook", routes())
}

fn routes() -> Router<ServerState> {
    Router::new().route("/payment", post(handler::payment_webhook))
}
