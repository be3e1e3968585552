//! Notification dispatcher
//!
//! Consumes terminal events and records exactly one notification per
//! (order_id, kind). The dedupe record is the send decision: only the
//! delivery that inserts it dispatches, so redelivered events leave a
//! single notification. Actual channel delivery (email/SMS) is out of
//! scope; dispatch here is a structured log line.

use async_trait::async_trait;
use shared::event::{DomainEvent, EventPayload, Topic};
use shared::util::now_millis;

use crate::events::EventConsumer;
use crate::orders::{NotificationRecord, SettlementStore};

pub struct NotificationDispatcher {
    store: SettlementStore,
}

impl NotificationDispatcher {
    pub fn new(store: SettlementStore) -> Self {
        Self { store }
    }

    fn message_for(event: &DomainEvent) -> String {
        match &event.payload {
            EventPayload::OrderSettled { payment_id, total_amount, .. } => format!(
                "Order {} settled, payment {} ({})",
                event.order_id, payment_id, total_amount
            ),
            EventPayload::OrderCancelled { reason, .. } => {
                format!("Order {} cancelled: {}", event.order_id, reason)
            }
            EventPayload::PaymentFailed { reason } => format!(
                "Payment failed for order {}: {}",
                event.order_id,
                reason.as_deref().unwrap_or("unknown reason")
            ),
            _ => format!("Order {} update", event.order_id),
        }
    }
}

#[async_trait]
impl EventConsumer for NotificationDispatcher {
    fn name(&self) -> &'static str {
        "notification-dispatcher"
    }

    fn topics(&self) -> &'static [Topic] {
        &[
            Topic::OrderSettled,
            Topic::OrderCancelled,
            Topic::PaymentFailed,
        ]
    }

    async fn handle(&self, event: &DomainEvent) -> anyhow::Result<()> {
        let record = NotificationRecord {
            order_id: event.order_id.clone(),
            kind: event.kind.as_str().to_string(),
            message: Self::message_for(event),
            dispatched_at: now_millis(),
        };

        if !self.store.record_notification_if_absent(&record)? {
            tracing::debug!(
                order_id = %event.order_id,
                kind = %record.kind,
                "Notification already dispatched, duplicate delivery ignored"
            );
            return Ok(());
        }

        tracing::info!(
            order_id = %event.order_id,
            kind = %record.kind,
            message = %record.message,
            "Notification dispatched"
        );
        Ok(())
    }
}
