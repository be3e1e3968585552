//! Checkout API Module
//!
//! Order creation and the client-side settlement channel.

mod handler;

pub use handler::{CreateOrderRequest, CreateOrderResponse, VerifyPaymentRequest};

use axum::{Router, routing::post};

use crate::core::ServerState;

/// Checkout router
pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/checkout", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/create-order", post(handler::create_order))
        .route("/verify-payment", post(handler::verify_payment))
}
