use std::env;

/// Process-wide configuration, loaded once at startup and passed explicitly
/// into the components that need it.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: String,

    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub stripe_base_url: String,

    pub invoicenow_client_id: String,
    pub invoicenow_client_secret: String,
    pub invoicenow_base_url: String,

    pub supplier_name: String,
    pub supplier_uen: String,
    pub supplier_gst_reg: String,
    pub currency: String,

    pub reservation_ttl_secs: i64,
    pub bootstrap_stock: i32,
    pub http_timeout_secs: u64,

    pub reaper_interval_secs: u64,
    pub invoice_retry_interval_secs: u64,
    pub stuck_invoice_age_secs: i64,

    pub transmit_max_attempts: u32,
    pub transmit_backoff_secs: Vec<u64>,
}

fn env_or(key: &str, default: String) -> String {
    env::var(key).unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl AppConfig {
    /// Baseline configuration with placeholder credentials. Outbound clients
    /// treat the placeholder secrets as mock mode, so this baseline works in
    /// environments with no live Stripe or InvoiceNow access.
    pub fn defaults(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            bind_addr: "0.0.0.0:3000".to_string(),

            stripe_secret_key: "placeholder".to_string(),
            stripe_webhook_secret: "whsec_placeholder".to_string(),
            stripe_base_url: "https://api.stripe.com".to_string(),

            invoicenow_client_id: "placeholder".to_string(),
            invoicenow_client_secret: String::new(),
            invoicenow_base_url: "https://sandbox.api.invoicenow.example/v1".to_string(),

            supplier_name: "Kopi Collective Roastery Pte. Ltd.".to_string(),
            supplier_uen: "201812345K".to_string(),
            supplier_gst_reg: "M9-0012345-6".to_string(),
            currency: "sgd".to_string(),

            reservation_ttl_secs: 900,
            bootstrap_stock: 100,
            http_timeout_secs: 10,

            reaper_interval_secs: 60,
            invoice_retry_interval_secs: 600,
            stuck_invoice_age_secs: 3600,

            transmit_max_attempts: 3,
            transmit_backoff_secs: vec![60, 300, 600],
        }
    }

    pub fn from_env() -> Self {
        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL not set");
        let mut config = Self::defaults(database_url);

        let host = env_or("HOST", "0.0.0.0".to_string());
        let port = env_or("SERVICE_PORT", "3000".to_string());
        config.bind_addr = format!("{}:{}", host, port);

        config.stripe_secret_key = env_or("STRIPE_SECRET_KEY", config.stripe_secret_key);
        config.stripe_webhook_secret =
            env_or("STRIPE_WEBHOOK_SECRET", config.stripe_webhook_secret);
        config.stripe_base_url = env_or("STRIPE_BASE_URL", config.stripe_base_url);

        config.invoicenow_client_id =
            env_or("INVOICENOW_CLIENT_ID", config.invoicenow_client_id);
        config.invoicenow_client_secret =
            env_or("INVOICENOW_CLIENT_SECRET", config.invoicenow_client_secret);
        config.invoicenow_base_url = env_or("INVOICENOW_BASE_URL", config.invoicenow_base_url);

        config.supplier_name = env_or("SUPPLIER_NAME", config.supplier_name);
        config.supplier_uen = env_or("SUPPLIER_UEN", config.supplier_uen);
        config.supplier_gst_reg = env_or("SUPPLIER_GST_REG", config.supplier_gst_reg);
        config.currency = env_or("CURRENCY", config.currency);

        config.reservation_ttl_secs =
            env_parse("RESERVATION_TTL_SECS", config.reservation_ttl_secs);
        config.bootstrap_stock = env_parse("BOOTSTRAP_STOCK", config.bootstrap_stock);
        config.http_timeout_secs = env_parse("HTTP_TIMEOUT_SECS", config.http_timeout_secs);

        config.reaper_interval_secs =
            env_parse("REAPER_INTERVAL_SECS", config.reaper_interval_secs);
        config.invoice_retry_interval_secs = env_parse(
            "INVOICE_RETRY_INTERVAL_SECS",
            config.invoice_retry_interval_secs,
        );
        config.stuck_invoice_age_secs =
            env_parse("STUCK_INVOICE_AGE_SECS", config.stuck_invoice_age_secs);

        config
    }
}
