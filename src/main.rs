mod config;
mod db;
mod error;
mod handlers;
mod models;
mod moderation;
mod voting;

use config::Config;
use db::Database;
use handlers::AppState;
use log::{error, info};
use moderation::{ModerationGate, PerspectiveClient};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() {
    // Initialize logging
    dotenvy::dotenv().ok();
    env_logger::init();

    if let Err(e) = run().await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = Config::load()?;

    let database = Database::connect(&config.database_url, config.db_max_connections).await?;

    let classifier = Arc::new(PerspectiveClient::new(&config.moderation)?);
    let gate = ModerationGate::new(classifier, config.moderation.threshold)
        .fail_closed(config.moderation.fail_closed);
    info!(
        "Moderation threshold {:.2}, failing {}",
        gate.threshold(),
        if config.moderation.fail_closed { "closed" } else { "open" }
    );

    let app = handlers::build_router(Arc::new(AppState { database, gate }));

    let listener = TcpListener::bind(&config.bind_address).await?;
    info!("Listening on {}", config.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
