//! Stock API Module
//!
//! Operator restock and availability lookup.

mod handler;

pub use handler::RestockRequest;

use axum::{Router, routing::put};

use crate::core::ServerState;

/// Stock router
pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/stock", routes())
}

fn routes() -> Router<ServerState> {
    Router::new().route(
        "/{product_id}",
        put(handler::restock).get(handler::availability),
    )
}
