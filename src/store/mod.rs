//! Reading store gateway.
//!
//! [`ReadingStore`] is the only way the core touches persisted devices and
//! readings. Grouped queries have in-process default implementations built
//! on [`ReadingStore::scan`]; a backend with its own query engine overrides
//! them to push the grouping down.
//!
//! Exports:
//! - [`PgReadingStore`]: PostgreSQL via `sqlx`
//! - [`InMemoryStore`]: process-local, used by tests and local runs

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::aggregate;
use crate::{
    BucketSummary, Device, DeviceRole, NewDevice, NewReading, Reading, ReadingFilter,
    ReadingWithLocation, WeatherResult, WindowStats,
};

mod memory;
mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PgReadingStore;

// ---

#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// Cheap round trip used by the health check.
    async fn ping(&self) -> WeatherResult<()>;

    async fn insert_device(&self, device: NewDevice) -> WeatherResult<Device>;

    async fn device_by_id(&self, id: i64) -> WeatherResult<Option<Device>>;

    /// Persist a reading. `recorded_at` is already resolved by the caller.
    async fn insert_reading(
        &self,
        device_id: i64,
        reading: &NewReading,
        recorded_at: DateTime<Utc>,
    ) -> WeatherResult<Reading>;

    /// Readings with `start <= recorded_at <= end`, ascending by time.
    async fn scan(
        &self,
        device_id: Option<i64>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> WeatherResult<Vec<Reading>>;

    /// Per-bucket summaries over `[start, end]`, ascending, empty buckets omitted.
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
        let readings = self.scan(device_id, start, end).await?;
        Ok(aggregate::bucketize(
            &readings,
            width_seconds,
            device_id,
            to_usize(skip),
            to_usize(limit),
        ))
    }

    /// Newest reading of every device with `role`, ordered by device id.
    /// Ties on `recorded_at` go to the highest reading id.
    async fn latest_per_device(&self, role: DeviceRole) -> WeatherResult<Vec<ReadingWithLocation>>;

    async fn latest_for_device(&self, device_id: i64)
        -> WeatherResult<Option<ReadingWithLocation>>;

    /// Statistics over one device's readings with `since <= recorded_at <= until`.
    async fn window_stats(
        &self,
        device_id: i64,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> WeatherResult<WindowStats> {
        // ---
        let readings = self.scan(Some(device_id), since, until).await?;
        Ok(aggregate::window_stats(&readings))
    }

    /// Raw readings, newest first.
    async fn list_readings(
        &self,
        filter: ReadingFilter,
        skip: i64,
        limit: i64,
    ) -> WeatherResult<Vec<Reading>>;

    async fn count_readings(&self, filter: ReadingFilter) -> WeatherResult<i64>;

    /// Delete readings recorded strictly before `cutoff`; returns how many.
    async fn delete_recorded_before(&self, cutoff: DateTime<Utc>) -> WeatherResult<u64>;
}

pub(crate) fn to_usize(n: i64) -> usize {
    usize::try_from(n).unwrap_or(0)
}
