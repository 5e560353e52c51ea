use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::ReadingStore;
use crate::{
    BucketSummary, Device, DeviceRole, NewDevice, NewReading, Reading, ReadingFilter,
    ReadingWithLocation, WeatherResult, WindowStats,
};

// ---

const READING_COLUMNS: &str = "r.id, r.device_id, r.temperature, r.humidity, r.pressure, \
     r.wind_speed, r.rain_amount, r.recorded_at, r.created_at";

/// PostgreSQL-backed store. Grouping and latest-per-device run server-side.
#[derive(Debug, Clone)]
pub struct PgReadingStore {
    pool: PgPool,
}

impl PgReadingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[derive(sqlx::FromRow)]
struct DeviceRow {
    id: i64,
    device_type: String,
    location: String,
    role: String,
}

impl TryFrom<DeviceRow> for Device {
    type Error = sqlx::Error;

    fn try_from(row: DeviceRow) -> Result<Self, Self::Error> {
        // ---
        let role = row
            .role
            .parse::<DeviceRole>()
            .map_err(|e| sqlx::Error::Decode(e.into()))?;
        Ok(Device {
            id: row.id,
            device_type: row.device_type,
            location: row.location,
            role,
        })
    }
}

#[async_trait]
impl ReadingStore for PgReadingStore {
    async fn ping(&self) -> WeatherResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn insert_device(&self, device: NewDevice) -> WeatherResult<Device> {
        // ---
        let row: DeviceRow = sqlx::query_as(
            r#"
            INSERT INTO devices (device_type, location, role)
            VALUES ($1, $2, $3)
            RETURNING id, device_type, location, role
            "#,
        )
        .bind(&device.device_type)
        .bind(&device.location)
        .bind(device.role.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(Device::try_from(row)?)
    }

    async fn device_by_id(&self, id: i64) -> WeatherResult<Option<Device>> {
        // ---
        let row: Option<DeviceRow> = sqlx::query_as(
            "SELECT id, device_type, location, role FROM devices WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Device::try_from).transpose()?)
    }

    async fn insert_reading(
        &self,
        device_id: i64,
        reading: &NewReading,
        recorded_at: DateTime<Utc>,
    ) -> WeatherResult<Reading> {
        // ---
        let stored: Reading = sqlx::query_as(
            r#"
            INSERT INTO weather_readings (
                device_id, temperature, humidity, pressure,
                wind_speed, rain_amount, recorded_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, device_id, temperature, humidity, pressure,
                      wind_speed, rain_amount, recorded_at, created_at
            "#,
        )
        .bind(device_id)
        .bind(reading.temperature)
        .bind(reading.humidity)
        .bind(reading.pressure)
        .bind(reading.wind_speed)
        .bind(reading.rain_amount)
        .bind(recorded_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(stored)
    }

    async fn scan(
        &self,
        device_id: Option<i64>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> WeatherResult<Vec<Reading>> {
        // ---
        let sql = format!(
            r#"
            SELECT {READING_COLUMNS}
            FROM weather_readings r
            WHERE ($1::BIGINT IS NULL OR r.device_id = $1)
              AND r.recorded_at >= $2
              AND r.recorded_at <= $3
            ORDER BY r.recorded_at, r.id
            "#
        );
        let rows = sqlx::query_as(&sql)
            .bind(device_id)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    async fn aggregate_buckets(
        &self,
        device_id: Option<i64>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        width_seconds: i64,
        skip: i64,
        limit: i64,
    ) -> WeatherResult<Vec<BucketSummary>> {
        // ---
        // Same floor-to-width bucket key as `granularity::bucket_start`.
        let rows = sqlx::query_as(
            r#"
            SELECT
                $1::BIGINT AS device_id,
                to_timestamp(
                    (floor(extract(epoch FROM recorded_at) / $2::BIGINT) * $2::BIGINT)::DOUBLE PRECISION
                ) AS recorded_at,
                AVG(temperature)              AS temperature,
                AVG(humidity)                 AS humidity,
                AVG(pressure)                 AS pressure,
                AVG(wind_speed)               AS wind_speed,
                COALESCE(SUM(rain_amount), 0) AS rain_amount,
                COUNT(*)                      AS reading_count
            FROM weather_readings
            WHERE ($1::BIGINT IS NULL OR device_id = $1)
              AND recorded_at >= $3
              AND recorded_at <= $4
            GROUP BY 2
            ORDER BY 2
            OFFSET $5
            LIMIT $6
            "#,
        )
        .bind(device_id)
        .bind(width_seconds)
        .bind(start)
        .bind(end)
        .bind(skip.max(0))
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn latest_per_device(&self, role: DeviceRole) -> WeatherResult<Vec<ReadingWithLocation>> {
        // ---
        let sql = format!(
            r#"
            SELECT DISTINCT ON (r.device_id)
                {READING_COLUMNS}, d.location AS device_location
            FROM weather_readings r
            JOIN devices d ON d.id = r.device_id
            WHERE d.role = $1
            ORDER BY r.device_id, r.recorded_at DESC, r.id DESC
            "#
        );
        let rows = sqlx::query_as(&sql)
            .bind(role.as_str())
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    async fn latest_for_device(
        &self,
        device_id: i64,
    ) -> WeatherResult<Option<ReadingWithLocation>> {
        // ---
        let sql = format!(
            r#"
            SELECT {READING_COLUMNS}, d.location AS device_location
            FROM weather_readings r
            JOIN devices d ON d.id = r.device_id
            WHERE r.device_id = $1
            ORDER BY r.recorded_at DESC, r.id DESC
            LIMIT 1
            "#
        );
        let row = sqlx::query_as(&sql)
            .bind(device_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }

    async fn window_stats(
        &self,
        device_id: i64,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> WeatherResult<WindowStats> {
        // ---
        let stats = sqlx::query_as(
            r#"
            SELECT
                AVG(temperature)  AS avg_temperature,
                MIN(temperature)  AS min_temperature,
                MAX(temperature)  AS max_temperature,
                AVG(humidity)     AS avg_humidity,
                AVG(pressure)     AS avg_pressure,
                COUNT(id)         AS reading_count,
                MIN(recorded_at)  AS period_start,
                MAX(recorded_at)  AS period_end
            FROM weather_readings
            WHERE device_id = $1
              AND recorded_at >= $2
              AND recorded_at <= $3
            "#,
        )
        .bind(device_id)
        .bind(since)
        .bind(until)
        .fetch_one(&self.pool)
        .await?;

        Ok(stats)
    }

    async fn list_readings(
        &self,
        filter: ReadingFilter,
        skip: i64,
        limit: i64,
    ) -> WeatherResult<Vec<Reading>> {
        // ---
        let sql = format!(
            r#"
            SELECT {READING_COLUMNS}
            FROM weather_readings r
            WHERE ($1::BIGINT IS NULL OR r.device_id = $1)
              AND ($2::TIMESTAMPTZ IS NULL OR r.recorded_at >= $2)
              AND ($3::TIMESTAMPTZ IS NULL OR r.recorded_at <= $3)
            ORDER BY r.recorded_at DESC, r.id DESC
            OFFSET $4
            LIMIT $5
            "#
        );
        let rows = sqlx::query_as(&sql)
            .bind(filter.device_id)
            .bind(filter.start)
            .bind(filter.end)
            .bind(skip.max(0))
            .bind(limit.max(0))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    async fn count_readings(&self, filter: ReadingFilter) -> WeatherResult<i64> {
        // ---
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM weather_readings
            WHERE ($1::BIGINT IS NULL OR device_id = $1)
              AND ($2::TIMESTAMPTZ IS NULL OR recorded_at >= $2)
              AND ($3::TIMESTAMPTZ IS NULL OR recorded_at <= $3)
            "#,
        )
        .bind(filter.device_id)
        .bind(filter.start)
        .bind(filter.end)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn delete_recorded_before(&self, cutoff: DateTime<Utc>) -> WeatherResult<u64> {
        // ---
        let result = sqlx::query("DELETE FROM weather_readings WHERE recorded_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
