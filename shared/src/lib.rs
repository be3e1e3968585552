//! Shared types for the Conch checkout pipeline
//!
//! Domain types used across the server and its broker consumers:
//! orders with their status state machine, domain events, and small
//! utility helpers.

pub mod event;
pub mod order;
pub mod util;

// Re-exports
pub use event::{DomainEvent, EventKind, EventPayload, Topic};
pub use order::{LineItem, Order, OrderStatus};
