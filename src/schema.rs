//! Database schema management for the weatherstation backend.
//!
//! Ensures required tables and indexes exist before serving requests.
//! Applied once on startup from `main.rs` (EMBP: single gateway call).

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Create or update the database schema (idempotent).
///
/// Creates the `devices` registry and the `weather_readings` table. Safe to
/// call on every startup; no-op if objects already exist.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS devices (
            id          BIGSERIAL   PRIMARY KEY,
            device_type TEXT        NOT NULL,
            location    TEXT        NOT NULL,
            role        TEXT        NOT NULL CHECK (role IN ('sensor', 'display')),
            created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Metrics are nullable: boards report whatever sensors they carry.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS weather_readings (
            id          BIGSERIAL        PRIMARY KEY,
            device_id   BIGINT           NOT NULL REFERENCES devices (id) ON DELETE CASCADE,
            temperature DOUBLE PRECISION,
            humidity    DOUBLE PRECISION,
            pressure    DOUBLE PRECISION,
            wind_speed  DOUBLE PRECISION,
            rain_amount DOUBLE PRECISION,
            recorded_at TIMESTAMPTZ      NOT NULL DEFAULT now(),
            created_at  TIMESTAMPTZ      NOT NULL DEFAULT now()
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Serves per-device range scans, bucketing and latest-per-device.
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS ix_weather_readings_device_recorded
            ON weather_readings (device_id, recorded_at);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // All-device aggregation and retention sweeps filter on time alone.
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS ix_weather_readings_recorded
            ON weather_readings (recorded_at);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
