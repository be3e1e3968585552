//! Event choreography
//!
//! The broker fans settlement facts out to the payment worker and the
//! notification dispatcher. See [`broker`] for the delivery contract.

pub mod broker;

pub use broker::{Broker, DeadLetter, EventConsumer, RetryPolicy};
