//! Stock ledger
//!
//! Read and operator paths over the stock table. The only mutating
//! decrement lives inside [`SettlementStore::settle`]'s transaction;
//! nothing here can take units away.
//!
//! [`SettlementStore::settle`]: crate::orders::SettlementStore::settle

use crate::orders::{SettlementStore, StorageResult};

#[derive(Clone)]
pub struct StockLedger {
    store: SettlementStore,
}

impl StockLedger {
    pub fn new(store: SettlementStore) -> Self {
        Self { store }
    }

    /// Units on hand (0 for unknown products)
    pub fn available(&self, product_id: &str) -> StorageResult<u32> {
        self.store.stock_on_hand(product_id)
    }

    /// Operator restock, returns the new level
    pub fn restock(&self, product_id: &str, units: u32) -> StorageResult<u32> {
        self.store.restock(product_id, units)
    }

    /// Seed an absolute level (operator/bootstrap path)
    pub fn set_level(&self, product_id: &str, units: u32) -> StorageResult<()> {
        self.store.set_stock(product_id, units)
    }
}
