use crate::error::DbError;
use crate::store::{ScanStateStore, SignalStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_types::{ScanState, Signal, SignalResult, SignalStatus, TakeProfit};
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use std::str::FromStr;

/// The PostgreSQL-backed store.
///
/// Queries are checked at runtime rather than compile time so the workspace
/// builds without a live database.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

const SIGNAL_COLUMNS: &str = "id, direction, market, symbol, entry, stop_loss, take_profit, \
     created_at, expires_at, status, result, closed_at, confidence, reason";

impl PgStore {
    /// Creates a new `PgStore` with a shared database connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects using `DATABASE_URL` and brings the schema up to date.
    pub async fn connect_and_migrate() -> Result<Self, DbError> {
        let pool = crate::connection::connect().await?;
        crate::connection::run_migrations(&pool).await?;
        Ok(Self::new(pool))
    }
}

fn parse_column<T>(row: &PgRow, column: &str) -> Result<T, DbError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw: String = row.try_get(column)?;
    raw.parse::<T>()
        .map_err(|e| DbError::InvalidRow(format!("{column}: {e}")))
}

fn signal_from_row(row: &PgRow) -> Result<Signal, DbError> {
    let take_profit: JsonValue = row.try_get("take_profit")?;
    let result: Option<String> = row.try_get("result")?;
    let result = result
        .map(|r| r.parse::<SignalResult>())
        .transpose()
        .map_err(|e| DbError::InvalidRow(format!("result: {e}")))?;

    Ok(Signal {
        id: row.try_get("id")?,
        direction: parse_column(row, "direction")?,
        market: parse_column(row, "market")?,
        symbol: row.try_get("symbol")?,
        entry: row.try_get("entry")?,
        stop_loss: row.try_get("stop_loss")?,
        take_profit: serde_json::from_value::<TakeProfit>(take_profit)?,
        created_at: row.try_get("created_at")?,
        expires_at: row.try_get("expires_at")?,
        status: parse_column::<SignalStatus>(row, "status")?,
        result,
        closed_at: row.try_get("closed_at")?,
        confidence: row.try_get("confidence")?,
        reason: row.try_get("reason")?,
    })
}

#[async_trait]
impl SignalStore for PgStore {
    async fn list_signals(&self) -> Result<Vec<Signal>, DbError> {
        let query = format!("SELECT {SIGNAL_COLUMNS} FROM signals ORDER BY created_at DESC");
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        rows.iter().map(signal_from_row).collect()
    }

    async fn list_active_signals(&self) -> Result<Vec<Signal>, DbError> {
        let query = format!(
            "SELECT {SIGNAL_COLUMNS} FROM signals WHERE status = 'ACTIVE' ORDER BY created_at DESC"
        );
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        rows.iter().map(signal_from_row).collect()
    }

    async fn insert_signal(&self, signal: &Signal) -> Result<(), DbError> {
        let take_profit = serde_json::to_value(&signal.take_profit)?;
        sqlx::query(
            r#"
            INSERT INTO signals (
                id, direction, market, symbol, entry, stop_loss, take_profit,
                created_at, expires_at, status, result, closed_at, confidence, reason
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(&signal.id)
        .bind(signal.direction.as_str())
        .bind(signal.market.as_str())
        .bind(&signal.symbol)
        .bind(signal.entry)
        .bind(signal.stop_loss)
        .bind(take_profit)
        .bind(signal.created_at)
        .bind(signal.expires_at)
        .bind(signal.status.as_str())
        .bind(signal.result.map(|r| r.as_str()))
        .bind(signal.closed_at)
        .bind(signal.confidence)
        .bind(signal.reason.as_deref())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_signal_resolution(
        &self,
        id: &str,
        result: SignalResult,
        closed_at: DateTime<Utc>,
    ) -> Result<bool, DbError> {
        let outcome = sqlx::query(
            "UPDATE signals SET status = 'CLOSED', result = $1, closed_at = $2 \
             WHERE id = $3 AND status = 'ACTIVE'",
        )
        .bind(result.as_str())
        .bind(closed_at)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(outcome.rows_affected() == 1)
    }
}

#[async_trait]
impl ScanStateStore for PgStore {
    async fn load_scan_state(&self) -> Result<ScanState, DbError> {
        let row = sqlx::query(
            "SELECT next_scan_at, last_generated_at, last_id FROM scan_state WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => Ok(ScanState {
                next_scan_at: row.try_get("next_scan_at")?,
                last_generated_at: row.try_get("last_generated_at")?,
                last_id: row.try_get("last_id")?,
            }),
            None => Ok(ScanState::default()),
        }
    }

    async fn save_scan_state(&self, state: &ScanState) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO scan_state (id, next_scan_at, last_generated_at, last_id)
            VALUES (1, $1, $2, $3)
            ON CONFLICT (id) DO UPDATE
            SET next_scan_at = EXCLUDED.next_scan_at,
                last_generated_at = EXCLUDED.last_generated_at,
                last_id = EXCLUDED.last_id
            "#,
        )
        .bind(state.next_scan_at)
        .bind(state.last_generated_at)
        .bind(state.last_id.as_deref())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
