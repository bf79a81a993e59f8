/// Cache configuration
///
/// Loads cache settings from environment variables with sensible defaults.
use crate::{CacheError, CacheResult};
use std::time::Duration;

pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_millis(250);

#[derive(Clone, Debug, PartialEq)]
pub struct CacheConfig {
    /// Redis connection URL (e.g., redis://127.0.0.1:6379)
    pub redis_url: String,
    /// Upper bound for any single cache operation
    pub op_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            op_timeout: DEFAULT_OP_TIMEOUT,
        }
    }
}

impl CacheConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> CacheResult<Self> {
        let defaults = Self::default();

        let op_timeout = match std::env::var("CACHE_OP_TIMEOUT_MS") {
            Ok(raw) => {
                let millis: u64 = raw.trim().parse().map_err(|_| {
                    CacheError::Configuration(format!(
                        "invalid value for CACHE_OP_TIMEOUT_MS: {:?}",
                        raw
                    ))
                })?;
                Duration::from_millis(millis)
            }
            Err(_) => defaults.op_timeout,
        };

        Ok(Self {
            redis_url: std::env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            op_timeout,
        })
    }

    pub fn with_op_timeout(mut self, timeout: Duration) -> Self {
        self.op_timeout = timeout;
        self
    }
}
