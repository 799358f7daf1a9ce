use anyhow::Context;
use server::{config::Config, routes, state::{AppState, build_store}};
use services::services::{
    featured_events::{FeaturedEventWorker, RetryPolicy},
    featured_limit::FeaturedLimiter,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    if config.webhook_secret.is_none() {
        warn!("SANITY_WEBHOOK_SECRET not set, webhook signatures will not be checked");
    }

    let store = build_store(&config).await?;
    let limiter = FeaturedLimiter::with_options(store, config.limiter.clone());

    let shutdown = CancellationToken::new();
    let (events, worker) = FeaturedEventWorker::spawn(
        limiter.clone(),
        config.caps.clone(),
        RetryPolicy::default(),
        shutdown.child_token(),
    );

    let state = AppState {
        limiter,
        caps: config.caps.clone(),
        events,
        webhook_secret: config.webhook_secret.clone(),
        signature_tolerance_ms: config.signature_tolerance_ms,
    };

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("binding {}:{}", config.host, config.port))?;
    info!(
        "Server running on http://{}",
        listener.local_addr()?
    );

    axum::serve(listener, routes::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    shutdown.cancel();
    worker.await.context("featured event worker panicked")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
