//! Conch Checkout Server - order-to-payment settlement pipeline
//!
//! # Architecture
//!
//! A pending order gets a provider payment intent; settlement arrives on
//! two independent channels (client verify call, provider webhook) and
//! the first one to win the store's write transaction performs the
//! single PENDING -> PAID transition together with the stock decrement.
//! Settlement facts then fan out over an at-least-once event broker to
//! idempotent consumers.
//!
//! # Module structure
//!
//! ```text
//! checkout-server/src/
//! ├── core/          # config, state, server wiring
//! ├── utils/         # error taxonomy, logging
//! ├── orders/        # redb settlement store (the CAS boundary)
//! ├── stock/         # stock ledger facade
//! ├── settlement/    # settlement coordinator
//! ├── gateway/       # provider client + HMAC proofs
//! ├── events/        # broker: topics, retry, dead letters
//! ├── payments/      # payment-attempt consumer
//! ├── notify/        # notification dispatcher consumer
//! └── api/           # HTTP routes and handlers
//! ```

pub mod api;
pub mod core;
pub mod events;
pub mod gateway;
pub mod notify;
pub mod orders;
pub mod payments;
pub mod settlement;
pub mod stock;
pub mod utils;

// Re-export common types
pub use crate::core::{Config, Server, ServerState};
pub use orders::SettlementStore;
pub use settlement::SettlementCoordinator;
pub use utils::{AppError, AppResult};

pub use utils::logger::init_logger;

/// Environment setup: dotenv + logging
///
/// Must run before `Config::from_env` so `.env` values are visible.
pub fn setup_environment() {
    dotenv::dotenv().ok();
    let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into());
    let log_dir = std::env::var("LOG_DIR").ok();
    init_logger(&level, log_dir.as_deref());
}

pub fn print_banner() {
    println!(
        r#"
   ______                 __
  / ____/___  ____  _____/ /_
 / /   / __ \/ __ \/ ___/ __ \
/ /___/ /_/ / / / / /__/ / / /
\____/\____/_/ /_/\___/_/ /_/
       checkout-server
    "#
    );
}
