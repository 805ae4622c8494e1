//! Entry point for the lexicon-server binary.

use std::sync::Arc;

use axum::middleware;
use http::HeaderValue;
use lexicon_linker::{LinkQueue, LinkWorker};
use lexicon_server::{
    config::ServerConfig,
    events::forward_reports,
    middleware::request_id::{propagate_request_id, request_id_layer},
    routes,
    state::AppState,
};
use lexicon_store::{Store, StoreConfig};
use tokio::net::TcpListener;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = ServerConfig::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level);

    tracing::info!("Starting lexicon-server");
    tracing::info!(
        port = config.port,
        log_level = %config.log_level,
        link_poll_interval_ms = config.link_poll_interval.as_millis() as u64,
        "Configuration loaded"
    );

    // Connect to database
    let store_config = StoreConfig::from_env()?;
    let store = Arc::new(Store::connect(store_config).await?);
    tracing::info!("Connected to database");

    // Start the single link worker
    let queue = LinkQueue::new();
    let mut worker = LinkWorker::new(queue.clone(), Arc::clone(&store))
        .with_poll_interval(config.link_poll_interval)
        .with_job_timeout(config.link_job_timeout);
    let worker_handle = worker.start();

    // Build application state
    let state = AppState::new(store, config.clone(), queue);
    let forwarder = forward_reports(worker.subscribe(), Arc::clone(state.broadcaster()));

    // Build router with middleware
    let app = routes::build_router(state).layer(
        ServiceBuilder::new()
            .layer(request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(build_cors_layer(&config.cors_allowed_origins))
            .layer(middleware::from_fn(propagate_request_id)),
    );

    // Create listener
    let addr = config.socket_addr();
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", addr);

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Let the current pass finish, then stop the worker
    worker.shutdown();
    if let Err(e) = worker_handle.await {
        tracing::error!(error = %e, "Link worker task failed");
    }
    tracing::info!(stats = ?worker.stats(), "Link worker stopped");
    // Dropping the worker closes its report channel, which ends the forwarder
    drop(worker);
    if let Err(e) = forwarder.await {
        tracing::error!(error = %e, "Report forwarder task failed");
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Initialize the tracing subscriber.
fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build CORS layer from configuration.
fn build_cors_layer(allowed_origins: &str) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if allowed_origins.trim() == "*" {
        return cors.allow_origin(Any);
    }

    // Parse comma-separated origins, skipping ones that are not valid headers
    let origins: Vec<HeaderValue> = allowed_origins
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    cors.allow_origin(AllowOrigin::list(origins))
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
