//! Checkout API Handlers

use axum::{Json, extract::State};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::order::LineItem;

use crate::core::ServerState;
use crate::settlement::SettlementOutcome;
use crate::utils::{AppResponse, AppResult, ok};

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub customer_id: String,
    pub items: Vec<LineItemPayload>,
    pub total_amount: Decimal,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "EUR".to_string()
}

#[derive(Debug, Deserialize)]
pub struct LineItemPayload {
    pub product_id: String,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
}

/// What the client needs to start the provider payment flow
#[derive(Debug, Serialize)]
pub struct CreateOrderResponse {
    pub order_id: String,
    pub intent_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub provider_key_id: String,
}

/// Create a pending order and its payment intent
pub async fn create_order(
    State(state): State<ServerState>,
    Json(payload): Json<CreateOrderRequest>,
) -> AppResult<Json<AppResponse<CreateOrderResponse>>> {
    let items: Vec<LineItem> = payload
        .items
        .into_iter()
        .map(|i| LineItem {
            product_id: i.product_id,
            name: i.name,
            unit_price: i.unit_price,
            quantity: i.quantity,
        })
        .collect();

    let order = state
        .coordinator
        .create_pending_order(
            payload.customer_id,
            items,
            payload.total_amount,
            payload.currency,
        )
        .await?;

    let intent_id = order.external_intent_id.clone().unwrap_or_default();
    Ok(ok(CreateOrderResponse {
        order_id: order.order_id,
        intent_id,
        amount: order.total_amount,
        currency: order.currency,
        provider_key_id: state.config.provider_key_id.clone(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct VerifyPaymentRequest {
    pub intent_id: String,
    pub payment_id: String,
    pub signature: String,
}

/// Client settlement channel: verify the proof and settle
///
/// Duplicate calls for a settled order return 200 with
/// `already_settled: true`.
pub async fn verify_payment(
    State(state): State<ServerState>,
    Json(payload): Json<VerifyPaymentRequest>,
) -> AppResult<Json<AppResponse<SettlementOutcome>>> {
    let outcome = state
        .coordinator
        .verify_and_settle(&payload.intent_id, &payload.payment_id, &payload.signature)
        .await?;
    Ok(ok(outcome))
}
