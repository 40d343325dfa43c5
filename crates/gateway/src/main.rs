//! Scoreboard gateway entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use gateway::{create_router, tweet_queue, AppState, Collection, Config, ScorebotClient};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("starting scoreboard gateway");

    let config = Config::from_env().context("configuration")?;
    info!("configuration:");
    info!("  SCOREBOT_URL: {}", config.scorebot);
    info!("  ASSETS_URL:   {}", config.assets);
    info!("  LISTEN:       {}", config.listen);
    info!("  METRICS_PORT: {}", config.metrics_port);
    info!("  TICK:         {:?}", config.tick);
    info!("  TIMEOUT:      {:?}", config.timeout);
    info!("  TWEET_EXPIRE: {:?}", config.tweet_expire);

    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], config.metrics_port))
        .install()
        .context("failed to start Prometheus exporter")?;
    info!("Prometheus metrics server started on port {}", config.metrics_port);

    let source = ScorebotClient::new(config.scorebot.clone(), config.timeout)?;
    let collection = Arc::new(Collection::new(
        Arc::new(source),
        config.assets.clone(),
        config.timeout,
    ));

    let (tweet_sender, tweet_buffer) = tweet_queue(config.tweet_filter.clone(), config.tweet_expire);

    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    let ticker = tokio::spawn(collection.clone().run(tweet_buffer, config.tick, shutdown_rx));

    let state = Arc::new(AppState {
        collection,
        tweets: tweet_sender,
    });
    let app = create_router(state);

    let listener = TcpListener::bind(&config.listen)
        .await
        .with_context(|| format!("cannot listen on {}", config.listen))?;
    info!("gateway listening on {}", config.listen);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("stopping and shutting down");
    let _ = shutdown_tx.send(()).await;
    let _ = ticker.await;

    info!("gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C"),
        _ = terminate => info!("received terminate signal"),
    }
}
