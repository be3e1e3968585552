//! Order aggregate and line-item snapshots

use super::OrderStatus;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Immutable snapshot of a purchased product line
///
/// Captured at order creation; later catalog edits never touch it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineItem {
    /// Product ID
    pub product_id: String,
    /// Product name at purchase time
    pub name: String,
    /// Unit price at purchase time
    pub unit_price: Decimal,
    /// Quantity ordered
    pub quantity: u32,
}

impl LineItem {
    /// Line total (unit price x quantity), None when the product
    /// overflows the 96-bit decimal range
    pub fn line_total(&self) -> Option<Decimal> {
        self.unit_price.checked_mul(Decimal::from(self.quantity))
    }
}

/// A customer order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Internal order ID (assigned by server)
    pub order_id: String,
    /// Customer who placed the order
    pub customer_id: String,
    /// Current status
    pub status: OrderStatus,
    /// Total amount, frozen at creation
    pub total_amount: Decimal,
    /// ISO currency code
    pub currency: String,
    /// Provider-side intent ID; set exactly once after intent creation.
    /// This is the idempotency key correlating both settlement channels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_intent_id: Option<String>,
    /// Provider-side payment ID; set when the order settles
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_payment_id: Option<String>,
    /// Line-item snapshots, immutable after creation
    pub items: Vec<LineItem>,
    /// Creation timestamp (Unix millis)
    pub created_at: i64,
    /// Settlement timestamp (Unix millis)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settled_at: Option<i64>,
    /// Cancellation reason, if cancelled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel_reason: Option<String>,
}

impl Order {
    /// Create a new pending order with frozen item snapshots
    pub fn new(
        customer_id: String,
        items: Vec<LineItem>,
        total_amount: Decimal,
        currency: String,
    ) -> Self {
        Self {
            order_id: uuid::Uuid::new_v4().to_string(),
            customer_id,
            status: OrderStatus::Pending,
            total_amount,
            currency,
            external_intent_id: None,
            external_payment_id: None,
            items,
            created_at: crate::util::now_millis(),
            settled_at: None,
            cancel_reason: None,
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(product_id: &str, price: Decimal, qty: u32) -> LineItem {
        LineItem {
            product_id: product_id.to_string(),
            name: format!("Product {product_id}"),
            unit_price: price,
            quantity: qty,
        }
    }

    #[test]
    fn test_line_total() {
        assert_eq!(
            item("p1", Decimal::new(1999, 2), 2).line_total(),
            Some(Decimal::new(3998, 2))
        );
        // An extreme price times any quantity > 1 exceeds the decimal
        // range and must report None, never panic
        assert_eq!(item("p1", Decimal::MAX, 2).line_total(), None);
    }

    #[test]
    fn test_new_order_is_pending() {
        let order = Order::new(
            "cust-1".to_string(),
            vec![item("p1", Decimal::new(1999, 2), 2)],
            Decimal::new(3998, 2),
            "EUR".to_string(),
        );
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(order.external_intent_id.is_none());
    }

    #[test]
    fn test_order_roundtrip() {
        let order = Order::new(
            "cust-1".to_string(),
            vec![item("p1", Decimal::new(1000, 2), 3)],
            Decimal::new(3000, 2),
            "EUR".to_string(),
        );
        let json = serde_json::to_string(&order).unwrap();
        let back: Order = serde_json::from_str(&json).unwrap();
        assert_eq!(back.order_id, order.order_id);
        assert_eq!(back.total_amount, Decimal::new(3000, 2));
        assert_eq!(back.items.len(), 1);
    }
}
