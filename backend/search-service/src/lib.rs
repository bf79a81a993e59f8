pub mod config;
pub mod error;
pub mod events;
pub mod services;

pub use config::Config;
pub use error::{Result, SearchError};
pub use events::{register_handlers, EventContext, PostIndexHandler, PostRemovalHandler};
pub use services::{InMemorySearchIndex, PostDocument, SearchIndex, SearchService, SEARCH_LIMIT};
