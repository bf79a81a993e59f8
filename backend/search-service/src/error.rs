use event_bus::HandlerError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SearchError>;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error("search index error: {0}")]
    Index(String),
}

impl From<SearchError> for HandlerError {
    fn from(err: SearchError) -> Self {
        HandlerError::failed(err.to_string())
    }
}
