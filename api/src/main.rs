// ./api/src/main.rs
mod config;
mod routes;

use application::AccountService;
use clap::Parser;
use config::{Config, LogFormat};
use infrastructure::RepositoryFactory;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

// Application entry point
#[tokio::main]
async fn main() {
    let config = Config::parse();

    // --- Logger Initialization ---
    init_logging(config.log_format);
    info!(port = config.port, backend = ?config.backend, "Configuration loaded.");

    // --- Dependency Injection ---
    // 1. Create the account store for the selected backend
    let repository = match RepositoryFactory::create(&config.backend_config()).await {
        Ok(repository) => repository,
        Err(e) => {
            error!("Failed to initialise account repository: {}", e);
            std::process::exit(1);
        }
    };

    // 2. Create the application service, injecting the repository
    let account_service = Arc::new(AccountService::new(repository));
    info!("Application services initialized.");

    // 3. Create the application state and routes
    let shutdown = CancellationToken::new();
    let app = routes::router(routes::AppState::new(account_service, shutdown.clone()));
    info!("API routes configured.");

    // --- Server Startup ---
    let addr = config.bind_address();
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => {
            info!("Server listening on {}", addr);
            listener
        }
        Err(e) => {
            error!("Failed to bind to address {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
    {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
    info!("Server stopped.");
}

fn init_logging(format: LogFormat) {
    let filter: EnvFilter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    let json = format == LogFormat::Json;
    tracing_subscriber::registry()
        .with(filter)
        .with((!json).then(fmt::layer))
        .with(json.then(|| fmt::layer().json()))
        .init();
}

/// Resolves on Ctrl-C and cancels every in-flight request context.
async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        // Without a signal handler the server runs until killed.
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received.");
    shutdown.cancel();
}
