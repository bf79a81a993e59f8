use event_bus::{ConnectionManager, SubscribeOptions, Subscriber};
use media_service::{register_handlers, Config, EventContext, InMemoryMediaStore, InMemoryObjectStorage};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("Configuration loading failed: {:#}", e);
            eprintln!("ERROR: Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Starting media-service v{}", env!("CARGO_PKG_VERSION"));

    let manager = Arc::new(ConnectionManager::amqp(config.bus.clone()).exit_on_fatal());
    manager.connect_or_exit().await;

    let ctx = EventContext::new(
        Arc::new(InMemoryMediaStore::new()),
        Arc::new(InMemoryObjectStorage::new(config.media_base_url.clone())),
    );
    let subscriber = Subscriber::new(manager.clone());
    let handles = register_handlers(&subscriber, ctx, SubscribeOptions::default()).await?;
    tracing::info!(consumers = handles.len(), "media-service consumers registered");

    shutdown_signal().await;
    tracing::info!("Shutting down media-service");
    for handle in &handles {
        handle.abort();
    }
    manager.close().await?;
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut terminate =
            signal(SignalKind::terminate()).expect("Failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = terminate.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    }
}
