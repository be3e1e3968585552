//! Order API Module
//!
//! Read-only order lookup. All mutations go through the checkout and
//! webhook channels.

mod handler;

use axum::{Router, routing::get};

use crate::core::ServerState;

/// Order router
pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/orders", routes())
}

fn routes() -> Router<ServerState> {
    Router::new().route("/{id}", get(handler::get_by_id))
}
