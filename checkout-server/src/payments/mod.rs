//! Payment worker
//!
//! Consumes `order-created`, records a [`PaymentAttempt`] keyed by the
//! triggering event id, and in simulation mode plays the provider's part:
//! it settles or cancels the order and publishes the matching payment
//! fact. Redelivery of an event that was already recorded is a no-op.

use async_trait::async_trait;
use shared::event::{DomainEvent, EventKind, EventPayload, Topic};
use shared::util::now_millis;

use crate::events::{Broker, EventConsumer};
use crate::orders::{PaymentAttempt, SettlementStore};
use crate::settlement::SettlementCoordinator;

pub struct PaymentWorker {
    store: SettlementStore,
    coordinator: SettlementCoordinator,
    broker: Broker,
    /// When set, simulate the provider outcome instead of waiting for a
    /// webhook. Customers whose id ends in `-fail` are declined, which
    /// gives the choreography demo a deterministic failure path.
    simulation: bool,
}

impl PaymentWorker {
    pub fn new(
        store: SettlementStore,
        coordinator: SettlementCoordinator,
        broker: Broker,
        simulation: bool,
    ) -> Self {
        Self {
            store,
            coordinator,
            broker,
            simulation,
        }
    }

    async fn simulate_outcome(&self, event: &DomainEvent, customer_id: &str) -> anyhow::Result<()> {
        if customer_id.ends_with("-fail") {
            tracing::info!(order_id = %event.order_id, "Simulated payment declined");
            self.coordinator
                .cancel_if_pending(&event.order_id, "payment failed")
                .await?;
            self.broker
                .publish(DomainEvent::new(
                    EventKind::PaymentFailed,
                    event.order_id.clone(),
                    EventPayload::PaymentFailed {
                        reason: Some("declined by provider".to_string()),
                    },
                ))
                .await;
        } else {
            let payment_id = format!("sim_pay_{}", uuid::Uuid::new_v4());
            self.coordinator
                .settle_confirmed(&event.order_id, &payment_id)
                .await?;
            self.broker
                .publish(DomainEvent::new(
                    EventKind::PaymentSucceeded,
                    event.order_id.clone(),
                    EventPayload::PaymentSucceeded { payment_id },
                ))
                .await;
        }
        Ok(())
    }
}

#[async_trait]
impl EventConsumer for PaymentWorker {
    fn name(&self) -> &'static str {
        "payment-worker"
    }

    fn topics(&self) -> &'static [Topic] {
        &[Topic::OrderCreated]
    }

    async fn handle(&self, event: &DomainEvent) -> anyhow::Result<()> {
        let EventPayload::OrderCreated {
            customer_id,
            total_amount,
            ..
        } = &event.payload
        else {
            tracing::warn!(event_id = %event.event_id, "Unexpected payload on order-created");
            return Ok(());
        };

        let attempt = PaymentAttempt {
            event_id: event.event_id.clone(),
            order_id: event.order_id.clone(),
            customer_id: customer_id.clone(),
            amount: *total_amount,
            recorded_at: now_millis(),
        };

        if self.store.record_attempt_if_absent(&attempt)? {
            tracing::info!(
                order_id = %event.order_id,
                amount = %total_amount,
                "Payment attempt recorded"
            );
        } else {
            tracing::debug!(
                event_id = %event.event_id,
                order_id = %event.order_id,
                "Duplicate order-created delivery, attempt already recorded"
            );
        }

        // The attempt row dedupes the recording only. The outcome runs on
        // every delivery, so a redelivery after a transient failure still
        // drives the order to a terminal payment state; simulate_outcome
        // is idempotent against replays.
        if self.simulation {
            self.simulate_outcome(event, customer_id).await?;
        }

        Ok(())
    }
}
