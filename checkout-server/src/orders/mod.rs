//! Order persistence
//!
//! [`SettlementStore`] owns the embedded database. All state transitions
//! that must be mutually exclusive go through its write transactions.

pub mod storage;

pub use storage::{
    CancelResult, NotificationRecord, PaymentAttempt, SettleResult, SettlementStore, StorageError,
    StorageResult,
};
