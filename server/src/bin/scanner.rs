//! Door device: reads decoded scan payloads from stdin, one per line, and
//! redeems them against the ledger for the operating day.

use dotenvy::dotenv;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use tracing_subscriber::EnvFilter;

use nightpass_server::config::Config;
use nightpass_server::scanner::{ConsoleDisplay, ScanSession};
use nightpass_server::services::RedemptionGate;
use nightpass_server::store::{InMemoryLedger, LedgerStore, PgLedger};

const PAYLOAD_BUFFER: usize = 64;

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();
    let venue_id = config
        .scan
        .venue_id
        .clone()
        .expect("SCANNER_VENUE_ID must be set");

    let ledger: Arc<dyn LedgerStore> = match &config.database_url {
        Some(database_url) => Arc::new(
            PgLedger::connect(database_url, config.max_connections)
                .await
                .expect("Failed to connect to database"),
        ),
        None => {
            tracing::warn!("DATABASE_URL not set, scanning against an empty in-memory ledger");
            Arc::new(InMemoryLedger::new())
        }
    };

    tracing::info!(
        venue_id = %venue_id,
        operating_day = %config.scan.operating_day(),
        "Scanner ready"
    );

    let gate = RedemptionGate::new(ledger, config.scan.lookup_timeout);
    let session = ScanSession::new(gate, venue_id, config.scan.clone(), ConsoleDisplay);

    let (payload_tx, payload_rx) = mpsc::channel(PAYLOAD_BUFFER);
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if payload_tx.send(line).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to read scan input");
                    break;
                }
            }
        }
    });

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            let _ = shutdown_tx.send(());
        }
    });

    session.run(payload_rx, shutdown_rx).await;
}
