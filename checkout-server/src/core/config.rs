/// Server configuration - all tunables for the checkout node
///
/// # Environment variables
///
/// Every field can be overridden through the environment:
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | WORK_DIR | /var/lib/conch/checkout | Working directory (database, logs) |
/// | HTTP_PORT | 3000 | HTTP API port |
/// | LOG_LEVEL | info | Log level when RUST_LOG is unset |
/// | PROVIDER_URL | https://api.payprov.test | Payment provider base URL |
/// | PROVIDER_KEY_ID | (empty) | Provider API key id |
/// | PROVIDER_KEY_SECRET | (empty) | Provider API key secret |
/// | CLIENT_SIGNATURE_SECRET | (empty) | HMAC secret for client settlement proofs |
/// | WEBHOOK_SECRET | (empty) | HMAC secret for provider webhooks |
/// | PROVIDER_TIMEOUT_MS | 10000 | Provider call timeout (ms) |
/// | PAYMENT_TEST_MODE | true | Mint local intent ids instead of calling the provider |
/// | PAYMENT_SIMULATION | false | Payment worker emits simulated payment outcomes |
/// | SHUTDOWN_TIMEOUT_MS | 10000 | Graceful shutdown budget (ms) |
///
/// # Example
///
/// ```ignore
/// WORK_DIR=/data/conch HTTP_PORT=8080 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Working directory for the database and log files
    pub work_dir: String,
    /// HTTP API port
    pub http_port: u16,
    /// Default log level
    pub log_level: String,

    // === Payment provider ===
    /// Provider base URL
    pub provider_url: String,
    /// Provider API key id
    pub provider_key_id: String,
    /// Provider API key secret
    pub provider_key_secret: String,
    /// HMAC secret for client-side settlement proofs
    pub client_signature_secret: String,
    /// HMAC secret for provider webhook payloads
    pub webhook_secret: String,
    /// Provider call timeout (milliseconds)
    pub provider_timeout_ms: u64,
    /// Test mode: mint deterministic local intent ids, skip provider calls
    pub payment_test_mode: bool,
    /// Simulation: the payment worker emits payment outcomes itself
    pub payment_simulation: bool,

    /// Shutdown budget (milliseconds)
    pub shutdown_timeout_ms: u64,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Unset variables fall back to defaults
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("WORK_DIR")
                .unwrap_or_else(|_| "/var/lib/conch/checkout".into()),
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),

            provider_url: std::env::var("PROVIDER_URL")
                .unwrap_or_else(|_| "https://api.payprov.test".into()),
            provider_key_id: std::env::var("PROVIDER_KEY_ID").unwrap_or_default(),
            provider_key_secret: std::env::var("PROVIDER_KEY_SECRET").unwrap_or_default(),
            client_signature_secret: std::env::var("CLIENT_SIGNATURE_SECRET").unwrap_or_default(),
            webhook_secret: std::env::var("WEBHOOK_SECRET").unwrap_or_default(),
            provider_timeout_ms: std::env::var("PROVIDER_TIMEOUT_MS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(10000),
            payment_test_mode: std::env::var("PAYMENT_TEST_MODE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(true),
            payment_simulation: std::env::var("PAYMENT_SIMULATION")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),

            shutdown_timeout_ms: std::env::var("SHUTDOWN_TIMEOUT_MS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(10000),
        }
    }

    /// Override a few fields, mainly for tests
    pub fn with_overrides(work_dir: impl Into<String>, http_port: u16) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config.http_port = http_port;
        config
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
