use agora_cache::CacheConfig;
use event_bus::BusConfig;

const SERVICE_NAME: &str = "search-service";

#[derive(Clone, Debug)]
pub struct Config {
    pub bus: BusConfig,
    pub cache: CacheConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        let mut bus = BusConfig::from_env()?;
        if std::env::var("SERVICE_NAME").is_err() {
            bus = bus.with_service_name(SERVICE_NAME);
        }

        Ok(Self {
            bus,
            cache: CacheConfig::from_env()?,
        })
    }
}
