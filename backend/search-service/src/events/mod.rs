pub mod consumers;

pub use consumers::{register_handlers, EventContext, PostIndexHandler, PostRemovalHandler};
