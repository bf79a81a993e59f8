/// Domain event consumers for media-service
pub mod handlers;

pub use handlers::{register_handlers, EventContext, MediaCleanupHandler};
