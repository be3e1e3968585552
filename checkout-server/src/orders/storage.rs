//! redb-based storage layer for orders, stock and consumer dedupe state
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `orders` | `order_id` | `Order` | Order records |
//! | `intent_index` | `intent_id` | `order_id` | Provider intent lookup |
//! | `stock` | `product_id` | `u32` | Stock units on hand |
//! | `payment_attempts` | `event_id` | `PaymentAttempt` | Attempt log (idempotent) |
//! | `notifications` | `(order_id, kind)` | `NotificationRecord` | Dispatch dedupe |
//!
//! # Mutual exclusion
//!
//! redb admits a single write transaction at a time. Every settlement and
//! cancellation runs status check, stock mutation and status write inside
//! one transaction, so two racing channels can never both observe PENDING.

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use shared::order::{Order, OrderStatus};
use shared::util::now_millis;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Orders: key = order_id, value = JSON-serialized Order
const ORDERS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("orders");

/// Intent index: key = provider intent id, value = order_id
const INTENT_INDEX_TABLE: TableDefinition<&str, &str> = TableDefinition::new("intent_index");

/// Stock: key = product_id, value = units on hand
const STOCK_TABLE: TableDefinition<&str, u32> = TableDefinition::new("stock");

/// Payment attempts: key = triggering event_id, value = JSON-serialized PaymentAttempt
const PAYMENT_ATTEMPTS_TABLE: TableDefinition<&str, &[u8]> =
    TableDefinition::new("payment_attempts");

/// Notifications: key = (order_id, kind), value = JSON-serialized NotificationRecord
const NOTIFICATIONS_TABLE: TableDefinition<(&str, &str), &[u8]> =
    TableDefinition::new("notifications");

/// A recorded payment attempt, keyed by the event that triggered it
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PaymentAttempt {
    pub event_id: String,
    pub order_id: String,
    pub customer_id: String,
    pub amount: rust_decimal::Decimal,
    pub recorded_at: i64,
}

/// A dispatched notification, keyed by (order_id, kind)
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct NotificationRecord {
    pub order_id: String,
    pub kind: String,
    pub message: String,
    pub dispatched_at: i64,
}

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Order already exists: {0}")]
    OrderExists(String),

    #[error("Intent {0} already bound to order {1}")]
    IntentTaken(String, String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Outcome of a settlement transaction
#[derive(Debug, Clone)]
pub enum SettleResult {
    /// This transaction performed the PENDING -> PAID transition
    Settled(Order),
    /// A previous transaction already settled the order (idempotent replay)
    AlreadySettled(Order),
    /// The order is in a state that precludes settlement (e.g. CANCELLED)
    Rejected(OrderStatus),
    /// A line item could not be covered by stock on hand; nothing was written
    InsufficientStock {
        product_id: String,
        requested: u32,
        available: u32,
    },
}

/// Outcome of a cancellation transaction
#[derive(Debug, Clone)]
pub enum CancelResult {
    /// This transaction performed the PENDING -> CANCELLED transition
    Cancelled(Order),
    /// Already cancelled (idempotent replay)
    AlreadyCancelled(Order),
    /// The order is in a state that precludes cancellation (e.g. PAID)
    Rejected(OrderStatus),
}

/// Settlement store backed by redb
#[derive(Clone)]
pub struct SettlementStore {
    db: Arc<Database>,
}

impl SettlementStore {
    /// Open or create the database at the given path
    ///
    /// redb commits with `Durability::Immediate`: once `commit()` returns
    /// the transition is persistent, and the file stays consistent across
    /// power loss via copy-on-write.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        Self::init_tables(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init_tables(db)
    }

    fn init_tables(db: Database) -> StorageResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(ORDERS_TABLE)?;
            let _ = write_txn.open_table(INTENT_INDEX_TABLE)?;
            let _ = write_txn.open_table(STOCK_TABLE)?;
            let _ = write_txn.open_table(PAYMENT_ATTEMPTS_TABLE)?;
            let _ = write_txn.open_table(NOTIFICATIONS_TABLE)?;
        }
        write_txn.commit()?;
        Ok(Self { db: Arc::new(db) })
    }

    // ========== Order Operations ==========

    /// Insert a new order, failing if the id is already taken
    pub fn insert_order(&self, order: &Order) -> StorageResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(ORDERS_TABLE)?;
            if table.get(order.order_id.as_str())?.is_some() {
                return Err(StorageError::OrderExists(order.order_id.clone()));
            }
            let value = serde_json::to_vec(order)?;
            table.insert(order.order_id.as_str(), value.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Get an order by id
    pub fn get_order(&self, order_id: &str) -> StorageResult<Option<Order>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ORDERS_TABLE)?;
        match table.get(order_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Resolve a provider intent id to its order
    pub fn get_order_by_intent(&self, intent_id: &str) -> StorageResult<Option<Order>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(INTENT_INDEX_TABLE)?;
        let order_id = match index.get(intent_id)? {
            Some(value) => value.value().to_string(),
            None => return Ok(None),
        };
        let table = read_txn.open_table(ORDERS_TABLE)?;
        match table.get(order_id.as_str())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Bind a provider intent id to an order, exactly once
    ///
    /// The index insert and the order update share one transaction, so an
    /// intent id can never point at two orders.
    pub fn bind_intent(&self, order_id: &str, intent_id: &str) -> StorageResult<Order> {
        let txn = self.db.begin_write()?;
        let order = {
            let mut index = txn.open_table(INTENT_INDEX_TABLE)?;
            if let Some(existing) = index.get(intent_id)? {
                let existing_order = existing.value().to_string();
                return Err(StorageError::IntentTaken(
                    intent_id.to_string(),
                    existing_order,
                ));
            }
            index.insert(intent_id, order_id)?;

            let mut orders = txn.open_table(ORDERS_TABLE)?;
            let mut order: Order = match orders.get(order_id)? {
                Some(value) => serde_json::from_slice(value.value())?,
                None => return Err(StorageError::OrderNotFound(order_id.to_string())),
            };
            order.external_intent_id = Some(intent_id.to_string());
            let value = serde_json::to_vec(&order)?;
            orders.insert(order_id, value.as_slice())?;
            order
        };
        txn.commit()?;
        Ok(order)
    }

    // ========== Settlement (compare-and-set) ==========

    /// Settle an order: PENDING -> PAID plus stock decrement, atomically
    ///
    /// The whole check-decrement-write sequence runs inside one write
    /// transaction. Replays on an already-PAID order report
    /// [`SettleResult::AlreadySettled`] without touching stock. If any
    /// line item exceeds stock on hand the transaction aborts and the
    /// order stays PENDING.
    pub fn settle(&self, order_id: &str, payment_id: &str) -> StorageResult<SettleResult> {
        let txn = self.db.begin_write()?;
        let result = {
            let mut orders = txn.open_table(ORDERS_TABLE)?;
            let mut order: Order = match orders.get(order_id)? {
                Some(value) => serde_json::from_slice(value.value())?,
                None => return Err(StorageError::OrderNotFound(order_id.to_string())),
            };

            match order.status {
                OrderStatus::Paid => SettleResult::AlreadySettled(order),
                status if status.can_transition(OrderStatus::Paid) => {
                    let mut stock = txn.open_table(STOCK_TABLE)?;

                    // Check every line first so a partial decrement never commits
                    let mut shortage = None;
                    for item in &order.items {
                        let available = stock
                            .get(item.product_id.as_str())?
                            .map(|g| g.value())
                            .unwrap_or(0);
                        if available < item.quantity {
                            shortage = Some((item.product_id.clone(), item.quantity, available));
                            break;
                        }
                    }

                    match shortage {
                        Some((product_id, requested, available)) => {
                            drop(stock);
                            drop(orders);
                            txn.abort()?;
                            return Ok(SettleResult::InsufficientStock {
                                product_id,
                                requested,
                                available,
                            });
                        }
                        None => {
                            for item in &order.items {
                                let available = stock
                                    .get(item.product_id.as_str())?
                                    .map(|g| g.value())
                                    .unwrap_or(0);
                                stock.insert(
                                    item.product_id.as_str(),
                                    available - item.quantity,
                                )?;
                            }

                            order.status = OrderStatus::Paid;
                            order.external_payment_id = Some(payment_id.to_string());
                            order.settled_at = Some(now_millis());
                            let value = serde_json::to_vec(&order)?;
                            orders.insert(order_id, value.as_slice())?;
                            SettleResult::Settled(order)
                        }
                    }
                }
                other => SettleResult::Rejected(other),
            }
        };
        txn.commit()?;
        Ok(result)
    }

    /// Cancel an order: PENDING -> CANCELLED, atomically
    ///
    /// Cancelling an already-CANCELLED order is an idempotent no-op.
    /// A PAID order is never demoted.
    pub fn cancel(&self, order_id: &str, reason: &str) -> StorageResult<CancelResult> {
        let txn = self.db.begin_write()?;
        let result = {
            let mut orders = txn.open_table(ORDERS_TABLE)?;
            let mut order: Order = match orders.get(order_id)? {
                Some(value) => serde_json::from_slice(value.value())?,
                None => return Err(StorageError::OrderNotFound(order_id.to_string())),
            };

            match order.status {
                OrderStatus::Cancelled => CancelResult::AlreadyCancelled(order),
                status if status.can_transition(OrderStatus::Cancelled) => {
                    order.status = OrderStatus::Cancelled;
                    order.cancel_reason = Some(reason.to_string());
                    let value = serde_json::to_vec(&order)?;
                    orders.insert(order_id, value.as_slice())?;
                    CancelResult::Cancelled(order)
                }
                other => CancelResult::Rejected(other),
            }
        };
        txn.commit()?;
        Ok(result)
    }

    // ========== Stock Operations ==========

    /// Units on hand for a product (0 when unknown)
    pub fn stock_on_hand(&self, product_id: &str) -> StorageResult<u32> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(STOCK_TABLE)?;
        Ok(table.get(product_id)?.map(|g| g.value()).unwrap_or(0))
    }

    /// Set the absolute stock level for a product
    pub fn set_stock(&self, product_id: &str, units: u32) -> StorageResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(STOCK_TABLE)?;
            table.insert(product_id, units)?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Add units to a product's stock, returning the new level
    pub fn restock(&self, product_id: &str, units: u32) -> StorageResult<u32> {
        let txn = self.db.begin_write()?;
        let level = {
            let mut table = txn.open_table(STOCK_TABLE)?;
            let current = table.get(product_id)?.map(|g| g.value()).unwrap_or(0);
            let next = current.saturating_add(units);
            table.insert(product_id, next)?;
            next
        };
        txn.commit()?;
        Ok(level)
    }

    // ========== Payment Attempts (consumer dedupe) ==========

    /// Record a payment attempt unless the event was already seen
    ///
    /// Returns true when this call inserted the record.
    pub fn record_attempt_if_absent(&self, attempt: &PaymentAttempt) -> StorageResult<bool> {
        let txn = self.db.begin_write()?;
        let inserted = {
            let mut table = txn.open_table(PAYMENT_ATTEMPTS_TABLE)?;
            if table.get(attempt.event_id.as_str())?.is_some() {
                false
            } else {
                let value = serde_json::to_vec(attempt)?;
                table.insert(attempt.event_id.as_str(), value.as_slice())?;
                true
            }
        };
        txn.commit()?;
        Ok(inserted)
    }

    /// Get a payment attempt by triggering event id
    pub fn get_attempt(&self, event_id: &str) -> StorageResult<Option<PaymentAttempt>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PAYMENT_ATTEMPTS_TABLE)?;
        match table.get(event_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    // ========== Notifications (dispatch dedupe) ==========

    /// Record a notification unless one for (order_id, kind) already exists
    ///
    /// Returns true when this call inserted the record, i.e. the caller
    /// should actually dispatch.
    pub fn record_notification_if_absent(
        &self,
        record: &NotificationRecord,
    ) -> StorageResult<bool> {
        let txn = self.db.begin_write()?;
        let inserted = {
            let mut table = txn.open_table(NOTIFICATIONS_TABLE)?;
            let key = (record.order_id.as_str(), record.kind.as_str());
            if table.get(key)?.is_some() {
                false
            } else {
                let value = serde_json::to_vec(record)?;
                table.insert(key, value.as_slice())?;
                true
            }
        };
        txn.commit()?;
        Ok(inserted)
    }

    /// Get a notification record for (order_id, kind)
    pub fn get_notification(
        &self,
        order_id: &str,
        kind: &str,
    ) -> StorageResult<Option<NotificationRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(NOTIFICATIONS_TABLE)?;
        match table.get((order_id, kind))? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use shared::order::LineItem;

    fn test_order(stock: &SettlementStore, quantity: u32) -> Order {
        stock.set_stock("P1", 10).unwrap();
        let items = vec![LineItem {
            product_id: "P1".to_string(),
            name: "Widget".to_string(),
            unit_price: Decimal::new(500, 2),
            quantity,
        }];
        let total = Decimal::new(500, 2) * Decimal::from(quantity);
        Order::new("cust-1".to_string(), items, total, "EUR".to_string())
    }

    #[test]
    fn test_insert_and_get() {
        let store = SettlementStore::open_in_memory().unwrap();
        let order = test_order(&store, 1);
        store.insert_order(&order).unwrap();

        let loaded = store.get_order(&order.order_id).unwrap().unwrap();
        assert_eq!(loaded.order_id, order.order_id);
        assert_eq!(loaded.status, OrderStatus::Pending);

        // Duplicate id rejected
        assert!(matches!(
            store.insert_order(&order),
            Err(StorageError::OrderExists(_))
        ));
    }

    #[test]
    fn test_bind_intent_exactly_once() {
        let store = SettlementStore::open_in_memory().unwrap();
        let a = test_order(&store, 1);
        let b = test_order(&store, 1);
        store.insert_order(&a).unwrap();
        store.insert_order(&b).unwrap();

        let bound = store.bind_intent(&a.order_id, "int_1").unwrap();
        assert_eq!(bound.external_intent_id.as_deref(), Some("int_1"));

        // Same intent cannot bind a second order
        assert!(matches!(
            store.bind_intent(&b.order_id, "int_1"),
            Err(StorageError::IntentTaken(_, _))
        ));

        let resolved = store.get_order_by_intent("int_1").unwrap().unwrap();
        assert_eq!(resolved.order_id, a.order_id);
    }

    #[test]
    fn test_settle_decrements_stock_once() {
        let store = SettlementStore::open_in_memory().unwrap();
        let order = test_order(&store, 3);
        store.insert_order(&order).unwrap();

        let first = store.settle(&order.order_id, "pay_1").unwrap();
        match first {
            SettleResult::Settled(o) => {
                assert_eq!(o.status, OrderStatus::Paid);
                assert_eq!(o.external_payment_id.as_deref(), Some("pay_1"));
                assert!(o.settled_at.is_some());
            }
            other => panic!("expected Settled, got {:?}", other),
        }
        assert_eq!(store.stock_on_hand("P1").unwrap(), 7);

        // Replay: no second decrement, sticky payment id
        let second = store.settle(&order.order_id, "pay_2").unwrap();
        match second {
            SettleResult::AlreadySettled(o) => {
                assert_eq!(o.external_payment_id.as_deref(), Some("pay_1"));
            }
            other => panic!("expected AlreadySettled, got {:?}", other),
        }
        assert_eq!(store.stock_on_hand("P1").unwrap(), 7);
    }

    #[test]
    fn test_settle_insufficient_stock_leaves_pending() {
        let store = SettlementStore::open_in_memory().unwrap();
        let order = test_order(&store, 3);
        store.insert_order(&order).unwrap();
        store.set_stock("P1", 2).unwrap();

        let result = store.settle(&order.order_id, "pay_1").unwrap();
        match result {
            SettleResult::InsufficientStock {
                product_id,
                requested,
                available,
            } => {
                assert_eq!(product_id, "P1");
                assert_eq!(requested, 3);
                assert_eq!(available, 2);
            }
            other => panic!("expected InsufficientStock, got {:?}", other),
        }

        // Nothing changed, a later restock lets the retry succeed
        let loaded = store.get_order(&order.order_id).unwrap().unwrap();
        assert_eq!(loaded.status, OrderStatus::Pending);
        assert_eq!(store.stock_on_hand("P1").unwrap(), 2);

        store.restock("P1", 5).unwrap();
        assert!(matches!(
            store.settle(&order.order_id, "pay_1").unwrap(),
            SettleResult::Settled(_)
        ));
        assert_eq!(store.stock_on_hand("P1").unwrap(), 4);
    }

    #[test]
    fn test_settle_cancelled_rejected() {
        let store = SettlementStore::open_in_memory().unwrap();
        let order = test_order(&store, 1);
        store.insert_order(&order).unwrap();

        store.cancel(&order.order_id, "payment failed").unwrap();
        let result = store.settle(&order.order_id, "pay_1").unwrap();
        assert!(matches!(
            result,
            SettleResult::Rejected(OrderStatus::Cancelled)
        ));
        assert_eq!(store.stock_on_hand("P1").unwrap(), 10);
    }

    #[test]
    fn test_cancel_is_sticky_against_paid() {
        let store = SettlementStore::open_in_memory().unwrap();
        let order = test_order(&store, 1);
        store.insert_order(&order).unwrap();
        store.settle(&order.order_id, "pay_1").unwrap();

        let result = store.cancel(&order.order_id, "late failure").unwrap();
        assert!(matches!(result, CancelResult::Rejected(OrderStatus::Paid)));

        let loaded = store.get_order(&order.order_id).unwrap().unwrap();
        assert_eq!(loaded.status, OrderStatus::Paid);
    }

    #[test]
    fn test_cancel_idempotent() {
        let store = SettlementStore::open_in_memory().unwrap();
        let order = test_order(&store, 1);
        store.insert_order(&order).unwrap();

        assert!(matches!(
            store.cancel(&order.order_id, "first").unwrap(),
            CancelResult::Cancelled(_)
        ));
        let replay = store.cancel(&order.order_id, "second").unwrap();
        match replay {
            CancelResult::AlreadyCancelled(o) => {
                assert_eq!(o.cancel_reason.as_deref(), Some("first"));
            }
            other => panic!("expected AlreadyCancelled, got {:?}", other),
        }
    }

    #[test]
    fn test_concurrent_settle_exactly_once() {
        let store = SettlementStore::open_in_memory().unwrap();
        let order = test_order(&store, 2);
        store.insert_order(&order).unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            let order_id = order.order_id.clone();
            handles.push(std::thread::spawn(move || {
                store.settle(&order_id, &format!("pay_{}", i)).unwrap()
            }));
        }

        let mut settled = 0;
        let mut replayed = 0;
        for handle in handles {
            match handle.join().unwrap() {
                SettleResult::Settled(_) => settled += 1,
                SettleResult::AlreadySettled(_) => replayed += 1,
                other => panic!("unexpected outcome {:?}", other),
            }
        }

        assert_eq!(settled, 1);
        assert_eq!(replayed, 7);
        assert_eq!(store.stock_on_hand("P1").unwrap(), 8);
    }

    #[test]
    fn test_reopen_preserves_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkout.db");

        let order_id = {
            let store = SettlementStore::open(&path).unwrap();
            let order = test_order(&store, 2);
            store.insert_order(&order).unwrap();
            store.settle(&order.order_id, "pay_1").unwrap();
            order.order_id
        };

        let store = SettlementStore::open(&path).unwrap();
        let loaded = store.get_order(&order_id).unwrap().unwrap();
        assert_eq!(loaded.status, OrderStatus::Paid);
        assert_eq!(store.stock_on_hand("P1").unwrap(), 8);
    }

    #[test]
    fn test_attempt_dedupe() {
        let store = SettlementStore::open_in_memory().unwrap();
        let attempt = PaymentAttempt {
            event_id: "evt-1".to_string(),
            order_id: "order-1".to_string(),
            customer_id: "cust-1".to_string(),
            amount: Decimal::new(1999, 2),
            recorded_at: now_millis(),
        };

        assert!(store.record_attempt_if_absent(&attempt).unwrap());
        assert!(!store.record_attempt_if_absent(&attempt).unwrap());
        assert!(store.get_attempt("evt-1").unwrap().is_some());
    }

    #[test]
    fn test_notification_dedupe() {
        let store = SettlementStore::open_in_memory().unwrap();
        let record = NotificationRecord {
            order_id: "order-1".to_string(),
            kind: "ORDER_SETTLED".to_string(),
            message: "Order settled".to_string(),
            dispatched_at: now_millis(),
        };

        assert!(store.record_notification_if_absent(&record).unwrap());
        assert!(!store.record_notification_if_absent(&record).unwrap());

        // Other kinds for the same order are independent
        let cancelled = NotificationRecord {
            kind: "ORDER_CANCELLED".to_string(),
            ..record.clone()
        };
        assert!(store.record_notification_if_absent(&cancelled).unwrap());
    }
}
