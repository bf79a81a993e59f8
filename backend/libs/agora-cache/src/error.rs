//! Cache error types

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Cache operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Cache store unavailable: {0}")]
    Unavailable(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl CacheError {
    /// Label used for the `error_type` metric dimension
    pub fn kind(&self) -> &'static str {
        match self {
            CacheError::Redis(_) => "redis",
            CacheError::Serialization(_) => "serialize",
            CacheError::Timeout(_) => "timeout",
            CacheError::Unavailable(_) => "unavailable",
            CacheError::Configuration(_) => "config",
        }
    }
}

pub type CacheResult<T> = Result<T, CacheError>;
