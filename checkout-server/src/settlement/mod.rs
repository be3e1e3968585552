//! Settlement coordinator
//!
//! Owns the order lifecycle: pending order creation with provider intent,
//! the two settlement channels (client verify, provider webhook), and
//! cancellation. All mutual exclusion is delegated to the store's write
//! transactions; this layer validates, translates outcomes, and publishes
//! events strictly after commit.

use rust_decimal::Decimal;
use serde::Serialize;
use shared::event::{DomainEvent, EventKind, EventPayload};
use shared::order::{LineItem, Order, OrderStatus};

use crate::events::Broker;
use crate::gateway::PaymentGateway;
use crate::orders::{CancelResult, SettleResult, SettlementStore};
use crate::utils::{AppError, AppResult};

/// Result of a settlement attempt, identical for both channels
#[derive(Debug, Clone, Serialize)]
pub struct SettlementOutcome {
    pub order_id: String,
    pub settled: bool,
    /// True when a previous attempt already performed the transition
    pub already_settled: bool,
}

/// Result of a cancellation attempt
#[derive(Debug, Clone, Serialize)]
pub struct CancelOutcome {
    pub order_id: String,
    pub cancelled: bool,
    pub already_cancelled: bool,
}

#[derive(Clone)]
pub struct SettlementCoordinator {
    store: SettlementStore,
    gateway: PaymentGateway,
    broker: Broker,
}

impl SettlementCoordinator {
    pub fn new(store: SettlementStore, gateway: PaymentGateway, broker: Broker) -> Self {
        Self {
            store,
            gateway,
            broker,
        }
    }

    pub fn store(&self) -> &SettlementStore {
        &self.store
    }

    // ========== Order creation ==========

    /// Create a pending order and its provider payment intent
    ///
    /// The stock check here is advisory only; the binding check happens
    /// inside the settle transaction. Intent creation is a single attempt:
    /// if the provider call fails the order stays intent-less and the
    /// client retries checkout from scratch.
    pub async fn create_pending_order(
        &self,
        customer_id: String,
        items: Vec<LineItem>,
        expected_total: Decimal,
        currency: String,
    ) -> AppResult<Order> {
        if customer_id.trim().is_empty() {
            return Err(AppError::Validation("customer_id is required".into()));
        }
        if items.is_empty() {
            return Err(AppError::Validation("Cart must not be empty".into()));
        }
        for item in &items {
            if item.quantity == 0 {
                return Err(AppError::Validation(format!(
                    "Zero quantity for product {}",
                    item.product_id
                )));
            }
            if item.unit_price < Decimal::ZERO {
                return Err(AppError::Validation(format!(
                    "Negative unit price for product {}",
                    item.product_id
                )));
            }
        }

        let computed = items
            .iter()
            .try_fold(Decimal::ZERO, |acc, item| {
                item.line_total().and_then(|total| acc.checked_add(total))
            })
            .ok_or_else(|| {
                AppError::Validation("Order total exceeds the supported amount range".into())
            })?;
        if computed != expected_total {
            return Err(AppError::Validation(format!(
                "Total mismatch: expected {expected_total}, items sum to {computed}"
            )));
        }

        for item in &items {
            let available = self.store.stock_on_hand(&item.product_id)?;
            if available < item.quantity {
                return Err(AppError::Conflict(format!(
                    "Insufficient stock for product {}: requested {}, available {}",
                    item.product_id, item.quantity, available
                )));
            }
        }

        let order = Order::new(customer_id, items, expected_total, currency);
        self.store.insert_order(&order)?;

        let intent_id = self.gateway.create_intent(&order).await?;
        let order = self.store.bind_intent(&order.order_id, &intent_id)?;

        tracing::info!(
            order_id = %order.order_id,
            intent_id = %intent_id,
            total = %order.total_amount,
            "Pending order created"
        );

        self.broker
            .publish(DomainEvent::new(
                EventKind::OrderCreated,
                order.order_id.clone(),
                EventPayload::OrderCreated {
                    customer_id: order.customer_id.clone(),
                    total_amount: order.total_amount,
                    currency: order.currency.clone(),
                },
            ))
            .await;

        Ok(order)
    }

    // ========== Settlement channels ==========

    /// Client verify channel: proof over `"{intent_id}|{payment_id}"`
    ///
    /// Signature failure mutates nothing. Replays of a settled order are
    /// answered with `already_settled: true`, not an error.
    pub async fn verify_and_settle(
        &self,
        intent_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> AppResult<SettlementOutcome> {
        let order = self
            .store
            .get_order_by_intent(intent_id)?
            .ok_or_else(|| AppError::NotFound(format!("Unknown payment intent: {intent_id}")))?;

        if !self
            .gateway
            .verify_client_signature(intent_id, payment_id, signature)
        {
            return Err(AppError::SignatureInvalid(format!(
                "Client proof rejected for intent {intent_id}"
            )));
        }

        self.settle_confirmed(&order.order_id, payment_id).await
    }

    /// Settle an order whose payment proof has already been verified
    ///
    /// Used by both channels and by the simulated payment worker.
    pub async fn settle_confirmed(
        &self,
        order_id: &str,
        payment_id: &str,
    ) -> AppResult<SettlementOutcome> {
        match self.store.settle(order_id, payment_id)? {
            SettleResult::Settled(order) => {
                tracing::info!(
                    order_id = %order.order_id,
                    payment_id = %payment_id,
                    "Order settled"
                );
                self.broker
                    .publish(DomainEvent::new(
                        EventKind::OrderSettled,
                        order.order_id.clone(),
                        EventPayload::OrderSettled {
                            customer_id: order.customer_id.clone(),
                            payment_id: payment_id.to_string(),
                            total_amount: order.total_amount,
                        },
                    ))
                    .await;
                Ok(SettlementOutcome {
                    order_id: order.order_id,
                    settled: true,
                    already_settled: false,
                })
            }
            SettleResult::AlreadySettled(order) => {
                tracing::debug!(order_id = %order.order_id, "Settle replay, already paid");
                Ok(SettlementOutcome {
                    order_id: order.order_id,
                    settled: true,
                    already_settled: true,
                })
            }
            SettleResult::Rejected(status) => Err(AppError::Conflict(format!(
                "Order {order_id} cannot be settled from status {status}"
            ))),
            SettleResult::InsufficientStock {
                product_id,
                requested,
                available,
            } => Err(AppError::Conflict(format!(
                "Insufficient stock for product {product_id}: requested {requested}, available {available}"
            ))),
        }
    }

    /// Cancel a pending order
    ///
    /// PAID is sticky: a cancellation against a settled order is logged
    /// and reported as a conflict, never a demotion.
    pub async fn cancel(&self, order_id: &str, reason: &str) -> AppResult<CancelOutcome> {
        match self.store.cancel(order_id, reason)? {
            CancelResult::Cancelled(order) => {
                tracing::info!(order_id = %order.order_id, reason = %reason, "Order cancelled");
                self.broker
                    .publish(DomainEvent::new(
                        EventKind::OrderCancelled,
                        order.order_id.clone(),
                        EventPayload::OrderCancelled {
                            customer_id: order.customer_id.clone(),
                            reason: reason.to_string(),
                        },
                    ))
                    .await;
                Ok(CancelOutcome {
                    order_id: order.order_id,
                    cancelled: true,
                    already_cancelled: false,
                })
            }
            CancelResult::AlreadyCancelled(order) => Ok(CancelOutcome {
                order_id: order.order_id,
                cancelled: true,
                already_cancelled: true,
            }),
            CancelResult::Rejected(status) => Err(AppError::Conflict(format!(
                "Order {order_id} cannot be cancelled from status {status}"
            ))),
        }
    }

    /// Cancel only when still pending; PAID and CANCELLED are no-ops
    ///
    /// The webhook failure path uses this: a late `payment.failed` for an
    /// already-settled order must not surface as an error.
    pub async fn cancel_if_pending(&self, order_id: &str, reason: &str) -> AppResult<CancelOutcome> {
        match self.cancel(order_id, reason).await {
            Ok(outcome) => Ok(outcome),
            Err(AppError::Conflict(_)) => {
                let status = self
                    .store
                    .get_order(order_id)?
                    .map(|o| o.status)
                    .unwrap_or(OrderStatus::Pending);
                tracing::info!(
                    order_id = %order_id,
                    status = %status,
                    "Payment failure ignored, order no longer pending"
                );
                Ok(CancelOutcome {
                    order_id: order_id.to_string(),
                    cancelled: false,
                    already_cancelled: false,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Order lookup for the read API
    pub fn get_order(&self, order_id: &str) -> AppResult<Order> {
        self.store
            .get_order(order_id)?
            .ok_or_else(|| AppError::NotFound(format!("Order not found: {order_id}")))
    }

    /// Resolve a provider intent id to its order
    pub fn get_order_by_intent(&self, intent_id: &str) -> AppResult<Order> {
        self.store
            .get_order_by_intent(intent_id)?
            .ok_or_else(|| AppError::NotFound(format!("Unknown payment intent: {intent_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Config;
    use crate::events::RetryPolicy;
    use crate::gateway::signature::sign_hex;

    fn test_coordinator() -> SettlementCoordinator {
        let store = SettlementStore::open_in_memory().unwrap();
        let mut config = Config::with_overrides("/tmp", 0);
        config.payment_test_mode = true;
        config.client_signature_secret = "client-secret".to_string();
        config.webhook_secret = "webhook-secret".to_string();
        let gateway = PaymentGateway::new(&config).unwrap();
        let broker = Broker::new(RetryPolicy::default());
        SettlementCoordinator::new(store, gateway, broker)
    }

    fn widget(quantity: u32) -> LineItem {
        LineItem {
            product_id: "P1".to_string(),
            name: "Widget".to_string(),
            unit_price: Decimal::new(500, 2),
            quantity,
        }
    }

    async fn create_order(coord: &SettlementCoordinator, quantity: u32) -> Order {
        coord.store().set_stock("P1", 10).unwrap();
        let total = Decimal::new(500, 2) * Decimal::from(quantity);
        coord
            .create_pending_order("cust-1".to_string(), vec![widget(quantity)], total, "EUR".to_string())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_validates_input() {
        let coord = test_coordinator();
        coord.store().set_stock("P1", 10).unwrap();

        // Empty cart
        let err = coord
            .create_pending_order("cust-1".into(), vec![], Decimal::ZERO, "EUR".into())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        // Total mismatch
        let err = coord
            .create_pending_order(
                "cust-1".into(),
                vec![widget(2)],
                Decimal::new(500, 2),
                "EUR".into(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        // Advisory stock check
        let err = coord
            .create_pending_order(
                "cust-1".into(),
                vec![widget(11)],
                Decimal::new(5500, 2),
                "EUR".into(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_overflowing_total_is_validation_error() {
        let coord = test_coordinator();
        coord.store().set_stock("P1", 10).unwrap();

        let item = LineItem {
            product_id: "P1".to_string(),
            name: "Widget".to_string(),
            unit_price: Decimal::MAX,
            quantity: 2,
        };
        let err = coord
            .create_pending_order("cust-1".into(), vec![item], Decimal::MAX, "EUR".into())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_binds_intent() {
        let coord = test_coordinator();
        let order = create_order(&coord, 2).await;

        assert_eq!(order.status, OrderStatus::Pending);
        let intent_id = order.external_intent_id.clone().unwrap();
        assert!(intent_id.starts_with("test_intent_"));

        let resolved = coord.get_order_by_intent(&intent_id).unwrap();
        assert_eq!(resolved.order_id, order.order_id);
    }

    #[tokio::test]
    async fn test_verify_and_settle_happy_path() {
        let coord = test_coordinator();
        let order = create_order(&coord, 3).await;
        let intent_id = order.external_intent_id.unwrap();

        let sig = sign_hex(format!("{intent_id}|pay_1").as_bytes(), "client-secret");
        let outcome = coord
            .verify_and_settle(&intent_id, "pay_1", &sig)
            .await
            .unwrap();
        assert!(outcome.settled);
        assert!(!outcome.already_settled);
        assert_eq!(coord.store().stock_on_hand("P1").unwrap(), 7);

        // Replay is an idempotent success, stock untouched
        let replay = coord
            .verify_and_settle(&intent_id, "pay_1", &sig)
            .await
            .unwrap();
        assert!(replay.settled);
        assert!(replay.already_settled);
        assert_eq!(coord.store().stock_on_hand("P1").unwrap(), 7);
    }

    #[tokio::test]
    async fn test_bad_signature_mutates_nothing() {
        let coord = test_coordinator();
        let order = create_order(&coord, 1).await;
        let intent_id = order.external_intent_id.unwrap();

        let sig = sign_hex(format!("{intent_id}|pay_1").as_bytes(), "wrong-secret");
        let err = coord
            .verify_and_settle(&intent_id, "pay_1", &sig)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SignatureInvalid(_)));

        let loaded = coord.get_order(&order.order_id).unwrap();
        assert_eq!(loaded.status, OrderStatus::Pending);
        assert_eq!(coord.store().stock_on_hand("P1").unwrap(), 10);
    }

    #[tokio::test]
    async fn test_unknown_intent_is_not_found() {
        let coord = test_coordinator();
        let err = coord
            .verify_and_settle("int_missing", "pay_1", "deadbeef")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_settle_after_cancel_conflicts() {
        let coord = test_coordinator();
        let order = create_order(&coord, 1).await;
        coord.cancel(&order.order_id, "customer changed mind").await.unwrap();

        let err = coord
            .settle_confirmed(&order.order_id, "pay_1")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(coord.store().stock_on_hand("P1").unwrap(), 10);
    }

    #[tokio::test]
    async fn test_paid_is_sticky_against_late_failure() {
        let coord = test_coordinator();
        let order = create_order(&coord, 1).await;
        coord.settle_confirmed(&order.order_id, "pay_1").await.unwrap();

        // Late payment.failed path: no error, no demotion
        let outcome = coord
            .cancel_if_pending(&order.order_id, "provider reported failure")
            .await
            .unwrap();
        assert!(!outcome.cancelled);

        let loaded = coord.get_order(&order.order_id).unwrap();
        assert_eq!(loaded.status, OrderStatus::Paid);
    }

    #[tokio::test]
    async fn test_stock_race_leaves_pending_and_recovers() {
        let coord = test_coordinator();
        let order = create_order(&coord, 3).await;

        // Stock drains between creation and settlement
        coord.store().set_stock("P1", 1).unwrap();
        let err = coord
            .settle_confirmed(&order.order_id, "pay_1")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(
            coord.get_order(&order.order_id).unwrap().status,
            OrderStatus::Pending
        );

        // Restock, same proof settles
        coord.store().restock("P1", 5).unwrap();
        let outcome = coord
            .settle_confirmed(&order.order_id, "pay_1")
            .await
            .unwrap();
        assert!(outcome.settled);
        assert_eq!(coord.store().stock_on_hand("P1").unwrap(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_channel_race_settles_once() {
        let coord = test_coordinator();
        let order = create_order(&coord, 2).await;

        let mut handles = Vec::new();
        for i in 0..6 {
            let coord = coord.clone();
            let order_id = order.order_id.clone();
            handles.push(tokio::spawn(async move {
                coord
                    .settle_confirmed(&order_id, &format!("pay_{i}"))
                    .await
                    .unwrap()
            }));
        }

        let mut fresh = 0;
        for handle in handles {
            let outcome = handle.await.unwrap();
            assert!(outcome.settled);
            if !outcome.already_settled {
                fresh += 1;
            }
        }
        assert_eq!(fresh, 1);
        assert_eq!(coord.store().stock_on_hand("P1").unwrap(), 8);
    }
}
