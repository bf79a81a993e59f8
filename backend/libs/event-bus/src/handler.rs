//! Subscriber callbacks

use crate::{Event, HandlerError};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

/// Processes events delivered to a subscription.
///
/// Handlers must tolerate replays: a message may arrive more than once
/// after a requeue or a reconnect.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Name used in logs and metrics
    fn name(&self) -> &str;

    async fn handle(&self, event: &Event) -> Result<(), HandlerError>;
}

/// Closure-backed handler, see [`handler_fn`]
pub struct FnHandler<F> {
    name: String,
    f: F,
}

/// Wrap an async closure as an [`EventHandler`]
///
/// ```
/// use event_bus::{handler_fn, EventHandler};
///
/// let handler = handler_fn("log-posts", |event| async move {
///     println!("{}", event.routing_key);
///     Ok(())
/// });
/// assert_eq!(handler.name(), "log-posts");
/// ```
pub fn handler_fn<F, Fut>(name: impl Into<String>, f: F) -> Arc<FnHandler<F>>
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    Arc::new(FnHandler {
        name: name.into(),
        f,
    })
}

#[async_trait]
impl<F, Fut> EventHandler for FnHandler<F>
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, event: &Event) -> Result<(), HandlerError> {
        (self.f)(event.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_handler_fn_invokes_closure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let handler = handler_fn("counter", move |_event| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        handler
            .handle(&Event::new("post.created", Vec::new()))
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_handler_fn_propagates_failure() {
        let handler = handler_fn("failing", |_event| async { Err(HandlerError::failed("boom")) });
        let err = handler
            .handle(&Event::new("post.created", Vec::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::Failed(_)));
    }
}
