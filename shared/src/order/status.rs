//! Order status state machine
//!
//! The transition table is explicit and total: any pair not listed in
//! [`OrderStatus::can_transition`] is illegal and must be rejected by
//! the caller, never silently ignored.

use serde::{Deserialize, Serialize};

/// Order status
///
/// `Pending` is the initial state. `Paid` is reached exactly once via
/// settlement. `Cancelled` is terminal. `Shipped`/`Fulfilled` belong to
/// downstream fulfillment and are only named here so the table stays
/// total.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Pending,
    Paid,
    Cancelled,
    Shipped,
    Fulfilled,
}

impl OrderStatus {
    /// Whether `self -> to` is a legal transition.
    ///
    /// Paid is sticky: it can never return to Pending nor move to
    /// Cancelled through this core.
    pub fn can_transition(self, to: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, to),
            (Pending, Paid) | (Pending, Cancelled) | (Paid, Shipped) | (Shipped, Fulfilled)
        )
    }

}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Paid => "PAID",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Fulfilled => "FULFILLED",
        };
        write!(f, "{s}")
    }
}
