//! Domain events - immutable facts published after state transitions
//!
//! Events are never mutated after publication. Consumers must treat
//! redelivery of an identical event as a no-op trigger, not a new fact.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Logical broker topics, each keyed by order_id
///
/// Ordering is only guaranteed among events sharing the same order_id
/// key, never globally across orders.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Topic {
    OrderCreated,
    OrderSettled,
    OrderCancelled,
    PaymentSucceeded,
    PaymentFailed,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::OrderCreated => "order-created",
            Topic::OrderSettled => "order-settled",
            Topic::OrderCancelled => "order-cancelled",
            Topic::PaymentSucceeded => "payment-succeeded",
            Topic::PaymentFailed => "payment-failed",
        }
    }

    /// All topics, for consumers that subscribe broadly
    pub const ALL: &'static [Topic] = &[
        Topic::OrderCreated,
        Topic::OrderSettled,
        Topic::OrderCancelled,
        Topic::PaymentSucceeded,
        Topic::PaymentFailed,
    ];
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Event type enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    OrderCreated,
    OrderSettled,
    OrderCancelled,
    PaymentSucceeded,
    PaymentFailed,
}

impl EventKind {
    /// Topic this kind of event is published on
    pub fn topic(&self) -> Topic {
        match self {
            EventKind::OrderCreated => Topic::OrderCreated,
            EventKind::OrderSettled => Topic::OrderSettled,
            EventKind::OrderCancelled => Topic::OrderCancelled,
            EventKind::PaymentSucceeded => Topic::PaymentSucceeded,
            EventKind::PaymentFailed => Topic::PaymentFailed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::OrderCreated => "ORDER_CREATED",
            EventKind::OrderSettled => "ORDER_SETTLED",
            EventKind::OrderCancelled => "ORDER_CANCELLED",
            EventKind::PaymentSucceeded => "PAYMENT_SUCCEEDED",
            EventKind::PaymentFailed => "PAYMENT_FAILED",
        }
    }
}

/// Event payload variants - the small causal facts each kind carries
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventPayload {
    OrderCreated {
        customer_id: String,
        total_amount: Decimal,
        currency: String,
    },
    OrderSettled {
        customer_id: String,
        payment_id: String,
        total_amount: Decimal,
    },
    OrderCancelled {
        customer_id: String,
        reason: String,
    },
    PaymentSucceeded {
        payment_id: String,
    },
    PaymentFailed {
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

/// Domain event - immutable fact on a named topic
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    /// Event unique ID
    pub event_id: String,
    /// Event type
    pub kind: EventKind,
    /// Order this event belongs to (the partition key)
    pub order_id: String,
    /// Server timestamp (Unix milliseconds)
    pub occurred_at: i64,
    /// Event payload
    pub payload: EventPayload,
}

impl DomainEvent {
    /// Create a new event stamped with server time
    pub fn new(kind: EventKind, order_id: String, payload: EventPayload) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            kind,
            order_id,
            occurred_at: crate::util::now_millis(),
            payload,
        }
    }

    /// Topic this event is published on
    pub fn topic(&self) -> Topic {
        self.kind.topic()
    }
}
