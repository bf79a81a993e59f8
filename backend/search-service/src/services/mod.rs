pub mod index;
pub mod search;

pub use index::{InMemorySearchIndex, PostDocument, SearchIndex};
pub use search::{SearchService, SEARCH_LIMIT};
