/// Configuration management for post-service
///
/// Loads configuration from environment variables with sensible defaults.
use agora_cache::CacheConfig;
use event_bus::BusConfig;

const SERVICE_NAME: &str = "post-service";

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

        Ok(Config {
            bus,
            cache: CacheConfig::from_env()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_service_name_defaults_to_crate() {
        std::env::remove_var("SERVICE_NAME");
        let config = Config::from_env().unwrap();
        assert_eq!(config.bus.service_name, "post-service");
    }

    #[test]
    #[serial]
    fn test_invalid_cache_timeout_fails() {
        std::env::set_var("CACHE_OP_TIMEOUT_MS", "never");
        let result = Config::from_env();
        std::env::remove_var("CACHE_OP_TIMEOUT_MS");
        assert!(result.is_err());
    }
}
