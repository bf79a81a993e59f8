/// Configuration management for media-service
///
/// Loads configuration from environment variables with sensible defaults.
use event_bus::BusConfig;

const SERVICE_NAME: &str = "media-service";

#[derive(Clone, Debug)]
pub struct Config {
    pub bus: BusConfig,
    /// Public base URL stored objects are served from
    pub media_base_url: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        let mut bus = BusConfig::from_env()?;
        if std::env::var("SERVICE_NAME").is_err() {
            bus = bus.with_service_name(SERVICE_NAME);
        }

        Ok(Config {
            bus,
            media_base_url: std::env::var("MEDIA_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3003/media".to_string()),
        })
    }
}
