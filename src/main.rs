mod handlers;
mod models;
mod routes;
mod utils;

use axum::serve;
use routes::make_app;
use std::error::Error;
use tokio::{net::TcpListener, signal};
use tracing::info;
use utils::{config::Config, state::AppState, telemetry::init_tracing};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();
    init_tracing();

    info!("Initializing application...");
    let config = Config::init()?;
    info!("Configuration loaded successfully");

    let state = AppState::init(&config)?;
    info!("External clients initialized successfully");

    let app = make_app(state);

    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);

    serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                tracing::error!("failed to listen for SIGTERM: {}", err);
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

    info!("Shutting down");
}
