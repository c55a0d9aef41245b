use axum::Router;
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use nightpass_server::config::Config;
use nightpass_server::routes::create_routes;
use nightpass_server::state::AppState;
use nightpass_server::store::{InMemoryLedger, LedgerStore, PgLedger};

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .init();

    let config = Config::from_env();

    let ledger: Arc<dyn LedgerStore> = match &config.database_url {
        Some(database_url) => {
            let ledger = PgLedger::connect(database_url, config.max_connections)
                .await
                .expect("Failed to connect to database");
            ledger.migrate().await.expect("Failed to run migrations");
            Arc::new(ledger)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using an in-memory ledger; nothing will persist");
            Arc::new(InMemoryLedger::new())
        }
    };

    let app: Router = create_routes(AppState::new(ledger, &config));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Server running at http://{}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutdown signal received");
        })
        .await
        .expect("Server failed");
}
