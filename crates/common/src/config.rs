use serde::Deserialize;

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Redis connection string (backs the queue, idempotence store, and event bus)
    pub redis_url: String,

    /// Name of the queue the dispatcher consumes notification requests from
    pub notification_queue: String,

    /// Queue poll interval in milliseconds when the queue is empty (default: 500)
    pub queue_poll_interval_ms: u64,

    /// SMS gateway endpoint URL
    pub sms_gateway_url: String,

    /// Optional API key sent as a bearer token to the SMS gateway
    pub sms_api_key: Option<String>,

    /// Optional sender id / originating number passed to the gateway
    pub sms_sender: Option<String>,

    /// Idempotence record lifetime in hours (default: 24)
    pub idempotence_ttl_hours: u64,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            notification_queue: std::env::var("NOTIFICATION_QUEUE")
                .unwrap_or_else(|_| "notifications".to_string()),
            queue_poll_interval_ms: std::env::var("QUEUE_POLL_INTERVAL_MS")
                .unwrap_or_else(|_| "500".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("QUEUE_POLL_INTERVAL_MS must be a valid u64"))?,
            sms_gateway_url: std::env::var("SMS_GATEWAY_URL")
                .map_err(|_| anyhow::anyhow!("SMS_GATEWAY_URL environment variable is required"))?,
            sms_api_key: std::env::var("SMS_API_KEY").ok(),
            sms_sender: std::env::var("SMS_SENDER").ok(),
            idempotence_ttl_hours: std::env::var("IDEMPOTENCE_TTL_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("IDEMPOTENCE_TTL_HOURS must be a valid u64"))?,
        })
    }
}
