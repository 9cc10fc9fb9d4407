/**
 * socialchat Server Entry Point
 *
 * Loads configuration, opens the message store, and serves the chat
 * endpoints until ctrl-c. On shutdown the dispatcher is given a grace
 * period to deliver what is still queued.
 */

use futures_util::future::join_all;
use socialchat::backend::server::create_app;
use socialchat::shared::ServerConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenv::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&env_filter))
        .init();

    let config = ServerConfig::from_env()?;
    if config.uses_default_secret() {
        tracing::warn!("JWT_SECRET not set, using the development secret");
    }
    let addr = config.bind_address();
    let grace = config.shutdown_grace();

    let app = create_app(config).await?;

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app.router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Sessions stop reading and release their senders; with the last state
    // handle dropped the dispatcher finishes once the queue is empty.
    app.state.begin_shutdown();
    let registry = app.state.registry.clone();
    drop(app.state);
    tracing::info!(grace_secs = grace.as_secs(), "Draining broadcast queue");
    match tokio::time::timeout(grace, app.dispatcher).await {
        Ok(Ok(())) => tracing::info!("Dispatcher drained"),
        Ok(Err(e)) => tracing::error!(error = %e, "Dispatcher task failed"),
        Err(_) => tracing::warn!("Shutdown grace period elapsed with messages still queued"),
    }

    let open = registry.drain();
    tracing::info!(connections = open.len(), "Closing remaining connections");
    join_all(open.iter().map(|conn| conn.shutdown())).await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
