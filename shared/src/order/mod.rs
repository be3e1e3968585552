//! Order domain types
//!
//! The order aggregate owns its line-item snapshots by value; item
//! snapshots are frozen at order creation and never re-derived from
//! catalog state.

mod status;
mod types;

pub use status::OrderStatus;
pub use types::{LineItem, Order};
