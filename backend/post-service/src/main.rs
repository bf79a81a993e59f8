use event_bus::{ConnectionManager, Publisher};
use post_service::{Config, InMemoryPostStore, PostService};
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

    tracing::info!("Starting post-service v{}", env!("CARGO_PKG_VERSION"));

    let manager = Arc::new(ConnectionManager::amqp(config.bus.clone()).exit_on_fatal());
    manager.connect_or_exit().await;

    let cache = agora_cache::CacheCoordinator::connect(&config.cache).await?;
    let _posts = PostService::new(
        Arc::new(InMemoryPostStore::new()),
        cache,
        Publisher::new(manager.clone()),
    );
    tracing::info!(exchange = %config.bus.exchange, "post-service ready");

    shutdown_signal().await;
    tracing::info!("Shutting down post-service");
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
