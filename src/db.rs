//! PostgreSQL connection bootstrap and persisted schema.
//!
//! The poller's checkpoint lives in a single `properties` row, read and
//! upserted with the same `PgPoolOptions` + upsert-on-conflict pattern used
//! for the other tables below.

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

const CHECKPOINT_KEY: &str = "snapshot_poller.checkpoint";

pub async fn connect(database_url: &str) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await?;
    tracing::info!("PostgreSQL connection pool established");
    Ok(pool)
}

/// Create the orders/actions/trades/transfers/properties tables if they do
/// not already exist.
pub async fn init_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS orders (
            order_id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            base TEXT NOT NULL,
            quote TEXT NOT NULL,
            side TEXT NOT NULL,
            order_type TEXT NOT NULL,
            price NUMERIC NOT NULL,
            filled_amount NUMERIC NOT NULL DEFAULT 0,
            remaining_amount NUMERIC NOT NULL,
            filled_price NUMERIC NOT NULL DEFAULT 0,
            state TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL
        )"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS actions (
            order_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            PRIMARY KEY (order_id, kind)
        )"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS trades (
            trade_id TEXT NOT NULL,
            liquidity TEXT NOT NULL,
            ask_order_id TEXT NOT NULL,
            bid_order_id TEXT NOT NULL,
            quote_asset_id TEXT NOT NULL,
            base_asset_id TEXT NOT NULL,
            side TEXT NOT NULL,
            price NUMERIC NOT NULL,
            amount NUMERIC NOT NULL,
            fee_asset_id TEXT NOT NULL,
            fee_amount NUMERIC NOT NULL,
            user_id TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL,
            PRIMARY KEY (trade_id, liquidity)
        )"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS transfers (
            transfer_id TEXT PRIMARY KEY,
            source TEXT NOT NULL,
            detail TEXT NOT NULL,
            asset_id TEXT NOT NULL,
            amount NUMERIC NOT NULL,
            user_id TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL
        )"#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS transfers_by_created ON transfers (created_at)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS properties (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )"#,
    )
    .execute(pool)
    .await?;

    tracing::info!("schema initialized");
    Ok(())
}

/// Read the poller's persisted checkpoint, defaulting to the Unix epoch.
pub async fn read_checkpoint(pool: &PgPool) -> Result<DateTime<Utc>, sqlx::Error> {
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM properties WHERE key = $1")
        .bind(CHECKPOINT_KEY)
        .fetch_optional(pool)
        .await?;

    Ok(row
        .and_then(|(v,)| DateTime::parse_from_rfc3339(&v).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| DateTime::from_timestamp(0, 0).unwrap()))
}

/// Persist the checkpoint. Must be called only after every snapshot in the
/// batch has been durably processed.
pub async fn write_checkpoint(pool: &PgPool, checkpoint: DateTime<Utc>) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO properties (key, value) VALUES ($1, $2)
           ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value"#,
    )
    .bind(CHECKPOINT_KEY)
    .bind(checkpoint.to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}
