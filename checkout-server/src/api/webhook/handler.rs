//! Webhook API Handlers

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use serde::Deserialize;

use crate::core::ServerState;
use crate::utils::{AppError, AppResult};

const SIGNATURE_HEADER: &str = "x-webhook-signature";

#[derive(Debug, Deserialize)]
struct WebhookEnvelope {
    event: String,
    payload: WebhookPayload,
}

#[derive(Debug, Deserialize)]
struct WebhookPayload {
    intent_id: String,
    #[serde(default)]
    payment_id: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

/// Provider settlement channel
///
/// Signature is verified over the raw body before anything is parsed;
/// a bad signature changes no state. `payment.captured` settles,
/// `payment.failed` cancels a still-pending order, anything else is
/// acknowledged and ignored. The provider retries on non-2xx, so every
/// handled outcome (including replays) answers plain `"ok"`.
pub async fn payment_webhook(
    State(state): State<ServerState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<&'static str> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::SignatureInvalid("Missing X-Webhook-Signature".into()))?;

    if !state.gateway.verify_webhook_signature(&body, signature) {
        return Err(AppError::SignatureInvalid(
            "Webhook signature mismatch".into(),
        ));
    }

    let envelope: WebhookEnvelope = serde_json::from_slice(&body)
        .map_err(|e| AppError::Validation(format!("Malformed webhook payload: {e}")))?;

    match envelope.event.as_str() {
        "payment.captured" => {
            let payment_id = envelope.payload.payment_id.ok_or_else(|| {
                AppError::Validation("payment.captured without payment_id".into())
            })?;
            let order = state
                .coordinator
                .get_order_by_intent(&envelope.payload.intent_id)?;
            state
                .coordinator
                .settle_confirmed(&order.order_id, &payment_id)
                .await?;
        }
        "payment.failed" => {
            let order = state
                .coordinator
                .get_order_by_intent(&envelope.payload.intent_id)?;
            let reason = envelope
                .payload
                .reason
                .unwrap_or_else(|| "payment failed".to_string());
            state
                .coordinator
                .cancel_if_pending(&order.order_id, &reason)
                .await?;
        }
        other => {
            tracing::debug!(event = %other, "Ignoring unhandled webhook event");
        }
    }

    Ok("ok")
}
