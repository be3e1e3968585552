//! Payment provider integration via REST API (no SDK dependency)
//!
//! [`PaymentGateway`] creates payment intents against the provider and
//! verifies both kinds of settlement proof. In test mode no network call
//! is made: intent ids are minted locally with a deterministic shape so
//! the rest of the pipeline behaves exactly as in production.

pub mod signature;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use shared::order::Order;
use shared::util::now_millis;
use std::time::Duration;
use thiserror::Error;

use crate::core::Config;

/// Gateway errors
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider rejected intent: {0}")]
    Rejected(String),

    #[error("Amount {0} not representable in minor units")]
    Amount(Decimal),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Payment provider client
#[derive(Clone)]
pub struct PaymentGateway {
    http: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: String,
    client_signature_secret: String,
    webhook_secret: String,
    test_mode: bool,
}

impl PaymentGateway {
    pub fn new(config: &Config) -> GatewayResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.provider_timeout_ms))
            .build()?;

        Ok(Self {
            http,
            base_url: config.provider_url.clone(),
            key_id: config.provider_key_id.clone(),
            key_secret: config.provider_key_secret.clone(),
            client_signature_secret: config.client_signature_secret.clone(),
            webhook_secret: config.webhook_secret.clone(),
            test_mode: config.payment_test_mode,
        })
    }

    /// Create a payment intent for a pending order, returning the intent id
    ///
    /// Amount is sent in minor units. A single attempt, bounded by the
    /// configured timeout; retries are the caller's business.
    pub async fn create_intent(&self, order: &Order) -> GatewayResult<String> {
        if self.test_mode {
            // Deterministic local id, same shape the provider would mint
            return Ok(format!("test_intent_{}_{}", order.order_id, now_millis()));
        }

        let minor_units = minor_units(order.total_amount)?;

        let resp: serde_json::Value = self
            .http
            .post(format!("{}/v1/intents", self.base_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&serde_json::json!({
                "amount": minor_units,
                "currency": order.currency,
                "receipt": order.order_id,
            }))
            .send()
            .await?
            .json()
            .await?;

        resp["id"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| GatewayError::Rejected(resp.to_string()))
    }

    /// Verify a client-side settlement proof
    pub fn verify_client_signature(
        &self,
        intent_id: &str,
        payment_id: &str,
        signature_hex: &str,
    ) -> bool {
        signature::verify_client_signature(
            intent_id,
            payment_id,
            signature_hex,
            &self.client_signature_secret,
        )
    }

    /// Verify a provider webhook signature over the raw request body
    pub fn verify_webhook_signature(&self, payload: &[u8], signature_hex: &str) -> bool {
        signature::verify_webhook_signature(payload, signature_hex, &self.webhook_secret)
    }
}

/// Convert a major-unit amount to provider minor units
///
/// Fails instead of rounding to zero when the amount cannot be scaled
/// or does not fit an i64.
fn minor_units(amount: Decimal) -> GatewayResult<i64> {
    amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .map(|a| a.round())
        .and_then(|a| a.to_i64())
        .ok_or(GatewayError::Amount(amount))
}
