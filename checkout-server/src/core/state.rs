use std::path::PathBuf;
use std::sync::Arc;

use crate::core::Config;
use crate::events::{Broker, RetryPolicy};
use crate::gateway::PaymentGateway;
use crate::notify::NotificationDispatcher;
use crate::orders::SettlementStore;
use crate::payments::PaymentWorker;
use crate::settlement::SettlementCoordinator;
use crate::stock::StockLedger;

/// Server state - shared handles to every service
///
/// Cheap to clone: the store and broker are Arc-backed internally.
///
/// | Field | Purpose |
/// |-------|---------|
/// | config | Immutable configuration |
/// | store | Embedded database (redb) |
/// | gateway | Payment provider client |
/// | broker | In-process event broker |
/// | coordinator | Settlement orchestration |
/// | stock | Stock ledger facade |
#[derive(Clone)]
pub struct ServerState {
    pub config: Config,
    pub store: SettlementStore,
    pub gateway: PaymentGateway,
    pub broker: Broker,
    pub coordinator: SettlementCoordinator,
    pub stock: StockLedger,
}

impl ServerState {
    /// Initialize all services
    ///
    /// Creates the work directory structure and opens the database at
    /// `work_dir/database/checkout.db`.
    pub fn initialize(config: &Config) -> anyhow::Result<Self> {
        let db_dir = PathBuf::from(&config.work_dir).join("database");
        std::fs::create_dir_all(&db_dir)?;

        let store = SettlementStore::open(db_dir.join("checkout.db"))?;
        Self::with_store(config.clone(), store)
    }

    /// Build state around an existing store (tests use the in-memory backend)
    pub fn with_store(config: Config, store: SettlementStore) -> anyhow::Result<Self> {
        let gateway = PaymentGateway::new(&config)?;
        let broker = Broker::new(RetryPolicy::default());
        let coordinator =
            SettlementCoordinator::new(store.clone(), gateway.clone(), broker.clone());
        let stock = StockLedger::new(store.clone());

        Ok(Self {
            config,
            store,
            gateway,
            broker,
            coordinator,
            stock,
        })
    }

    /// Spawn the broker consumers
    ///
    /// Must run before `Server::run()` accepts traffic, otherwise early
    /// events find no subscribers.
    pub fn start_consumers(&self) {
        self.broker.spawn_consumer(Arc::new(PaymentWorker::new(
            self.store.clone(),
            self.coordinator.clone(),
            self.broker.clone(),
            self.config.payment_simulation,
        )));
        self.broker.spawn_consumer(Arc::new(NotificationDispatcher::new(
            self.store.clone(),
        )));
    }

    pub fn work_dir(&self) -> PathBuf {
        PathBuf::from(&self.config.work_dir)
    }
}
