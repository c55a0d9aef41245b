use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{Executor, Postgres, Transaction};

use super::path::LedgerPath;
use super::tree::{assemble, child_names, flatten};
use super::{LedgerError, LedgerStore};

const SELECT_SUBTREE: &str = "SELECT path, value FROM ledger_entries \
     WHERE path = $1 OR starts_with(path, $2) ORDER BY path";
const DELETE_SUBTREE: &str = "DELETE FROM ledger_entries WHERE path = $1 OR starts_with(path, $2)";
const INSERT_LEAF: &str = "INSERT INTO ledger_entries (path, value, updated_at) VALUES ($1, $2, NOW())";

/// Ledger persisted as flattened leaves in a single `ledger_entries` table.
///
/// Conditional writes take a transaction-scoped advisory lock on the target
/// path before reading it, so two scanners racing on the same ticket are
/// serialized by the database rather than by any one device.
#[derive(Clone)]
pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, LedgerError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        tracing::info!("Successfully connected to ledger database");
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<(), LedgerError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| LedgerError::Unavailable(format!("migration failed: {e}")))?;
        tracing::info!("Ledger migrations run successfully");
        Ok(())
    }
}

async fn fetch_rows<'e, E>(executor: E, path: &LedgerPath) -> Result<Vec<(String, Value)>, LedgerError>
where
    E: Executor<'e, Database = Postgres>,
{
    let rows: Vec<(String, Json<Value>)> = sqlx::query_as(SELECT_SUBTREE)
        .bind(path.key())
        .bind(path.descendant_prefix())
        .fetch_all(executor)
        .await?;
    Ok(rows.into_iter().map(|(key, Json(value))| (key, value)).collect())
}

async fn replace_rows(
    tx: &mut Transaction<'_, Postgres>,
    path: &LedgerPath,
    value: Value,
) -> Result<(), LedgerError> {
    sqlx::query(DELETE_SUBTREE)
        .bind(path.key())
        .bind(path.descendant_prefix())
        .execute(&mut **tx)
        .await?;

    for (key, leaf) in flatten(path, value) {
        sqlx::query(INSERT_LEAF)
            .bind(key)
            .bind(Json(leaf))
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

fn rebuild(path: &LedgerPath, rows: &[(String, Value)]) -> Option<Value> {
    assemble(path, rows.iter().map(|(key, value)| (key.as_str(), value)))
}

#[async_trait]
impl LedgerStore for PgLedger {
    async fn get(&self, path: &LedgerPath) -> Result<Option<Value>, LedgerError> {
        let rows = fetch_rows(&self.pool, path).await?;
        Ok(rebuild(path, &rows))
    }

    async fn set(&self, path: &LedgerPath, value: Value) -> Result<(), LedgerError> {
        let mut tx = self.pool.begin().await?;
        replace_rows(&mut tx, path, value).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn children(&self, path: &LedgerPath) -> Result<Vec<String>, LedgerError> {
        let keys: Vec<(String,)> =
            sqlx::query_as("SELECT path FROM ledger_entries WHERE starts_with(path, $1)")
                .bind(path.descendant_prefix())
                .fetch_all(&self.pool)
                .await?;
        Ok(child_names(path, keys.iter().map(|(key,)| key.as_str())))
    }

    async fn compare_and_set(
        &self,
        path: &LedgerPath,
        expected: Option<&Value>,
        new: Value,
    ) -> Result<bool, LedgerError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(path.key())
            .execute(&mut *tx)
            .await?;

        let rows = fetch_rows(&mut *tx, path).await?;
        let current = rebuild(path, &rows);
        if current.as_ref() != expected {
            tx.rollback().await?;
            return Ok(false);
        }

        replace_rows(&mut tx, path, new).await?;
        tx.commit().await?;
        Ok(true)
    }
}
