//! Weather reading operations exposed to the HTTP layer.
//!
//! [`WeatherService`] owns nothing but handles to a [`ReadingStore`] and a
//! [`Clock`]; every call is one independent read or write against the store.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, instrument};

use crate::granularity::{default_agg_lookback, resolve_granularity, MAX_SERIES_POINTS};
use crate::{
    BucketSummary, Clock, Device, DeviceRole, Granularity, LatestReadings, NewDevice, NewReading,
    Reading, ReadingFilter, ReadingList, ReadingStore, ReadingWithLocation, Series, SummaryStats,
    WeatherError, WeatherResult,
};

/// Bounds for the trailing summary window, in hours.
pub const MIN_SUMMARY_HOURS: i64 = 1;
pub const MAX_SUMMARY_HOURS: i64 = 168;

/// Largest page a raw listing may request.
pub const MAX_RAW_LIMIT: i64 = 5000;

// ---

/// Bucketed aggregation request. `start < end` is checked by [`WeatherService::aggregate`].
#[derive(Debug, Clone, Copy)]
pub struct AggregateRequest {
    pub device_id: Option<i64>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub granularity: Option<Granularity>,
    pub auto: bool,
    pub skip: i64,
    pub limit: i64,
}

/// Listing request that is answered raw or aggregated depending on
/// `granularity`/`auto`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadingsQuery {
    pub device_id: Option<i64>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub granularity: Option<Granularity>,
    pub auto: bool,
    pub skip: i64,
    pub limit: i64,
}

impl ReadingsQuery {
    fn wants_aggregation(&self) -> bool {
        self.granularity.is_some() || self.auto
    }
}

#[derive(Clone)]
pub struct WeatherService {
    store: Arc<dyn ReadingStore>,
    clock: Arc<dyn Clock>,
}

impl WeatherService {
    pub fn new(store: Arc<dyn ReadingStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &Arc<dyn ReadingStore> {
        &self.store
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub async fn register_device(&self, device: NewDevice) -> WeatherResult<Device> {
        // ---
        let device = self.store.insert_device(device).await?;
        info!(device_id = device.id, role = %device.role, "Registered device");
        Ok(device)
    }

    /// Store a reading submitted by a sensor board.
    ///
    /// # Errors
    ///
    /// `InvalidReading` for out-of-range metrics, `DeviceNotFound` for an
    /// unknown device, `RoleNotPermitted` if the device is not a sensor.
    #[instrument(skip(self, reading))]
    pub async fn submit_reading(&self, device_id: i64, reading: NewReading) -> WeatherResult<Reading> {
        // ---
        reading.validate()?;

        let device = self
            .store
            .device_by_id(device_id)
            .await?
            .ok_or(WeatherError::DeviceNotFound(device_id))?;
        device.require_role(DeviceRole::Sensor)?;

        let recorded_at = reading.recorded_at.unwrap_or_else(|| self.clock.now());
        let stored = self.store.insert_reading(device_id, &reading, recorded_at).await?;
        debug!(reading_id = stored.id, %recorded_at, "Stored reading");
        Ok(stored)
    }

    /// Bucketed aggregation over `[start, end]` (both inclusive).
    ///
    /// Returns the buckets and the granularity that was actually used.
    ///
    /// # Errors
    ///
    /// `InvalidTimeRange` when `start >= end`; `InvalidLimit` when
    /// `limit < 1`; `GranularityTooFine` when an explicit granularity would
    /// exceed the point ceiling. Larger limits are clamped, not rejected.
    #[instrument(skip(self))]
    pub async fn aggregate(
        &self,
        req: AggregateRequest,
    ) -> WeatherResult<(Vec<BucketSummary>, Granularity)> {
        // ---
        if req.start >= req.end {
            return Err(WeatherError::InvalidTimeRange {
                start: req.start,
                end: req.end,
            });
        }

        if req.limit < 1 {
            return Err(WeatherError::InvalidLimit {
                limit: req.limit,
                max: MAX_SERIES_POINTS,
            });
        }

        let (granularity, width) =
            resolve_granularity(req.start, req.end, req.granularity, req.auto)?;
        let limit = req.limit.min(MAX_SERIES_POINTS);

        let buckets = self
            .store
            .aggregate_buckets(req.device_id, req.start, req.end, width, req.skip.max(0), limit)
            .await?;

        debug!(
            %granularity,
            width,
            buckets = buckets.len(),
            "Aggregated readings"
        );
        Ok((buckets, granularity))
    }

    /// Raw or aggregated listing.
    ///
    /// With `default_lookback` set, an aggregated request with neither bound
    /// covers the trailing [`default_agg_lookback`] window ending now.
    pub async fn readings(
        &self,
        mut query: ReadingsQuery,
        default_lookback: bool,
    ) -> WeatherResult<ReadingList> {
        // ---
        if query.wants_aggregation() {
            if default_lookback && query.start.is_none() && query.end.is_none() {
                let end = self.clock.now();
                query.start = Some(end - default_agg_lookback());
                query.end = Some(end);
            }
            let (Some(start), Some(end)) = (query.start, query.end) else {
                return Err(WeatherError::MissingRange);
            };

            let (buckets, granularity) = self
                .aggregate(AggregateRequest {
                    device_id: query.device_id,
                    start,
                    end,
                    granularity: query.granularity,
                    auto: query.auto,
                    skip: query.skip,
                    limit: query.limit,
                })
                .await?;

            return Ok(ReadingList {
                total: buckets.len() as i64,
                readings: Series::Aggregated(buckets),
                aggregated: true,
                granularity: Some(granularity),
            });
        }

        if !(1..=MAX_RAW_LIMIT).contains(&query.limit) {
            return Err(WeatherError::InvalidLimit {
                limit: query.limit,
                max: MAX_RAW_LIMIT,
            });
        }

        let filter = ReadingFilter {
            device_id: query.device_id,
            start: query.start,
            end: query.end,
        };
        let readings = self
            .store
            .list_readings(filter, query.skip.max(0), query.limit)
            .await?;
        let total = self.store.count_readings(filter).await?;

        Ok(ReadingList {
            readings: Series::Raw(readings),
            total,
            aggregated: false,
            granularity: None,
        })
    }

    /// Newest reading from every sensor device, one per device.
    #[instrument(skip(self))]
    pub async fn latest_all_sensors(&self) -> WeatherResult<LatestReadings> {
        // ---
        let readings = self.store.latest_per_device(DeviceRole::Sensor).await?;
        debug!(sensors = readings.len(), "Fetched latest readings");
        Ok(LatestReadings {
            readings,
            fetched_at: self.clock.now(),
        })
    }

    pub async fn latest_for_device(
        &self,
        device_id: i64,
    ) -> WeatherResult<Option<ReadingWithLocation>> {
        self.store.latest_for_device(device_id).await
    }

    /// Min/max/avg over the trailing `hours` for one device.
    ///
    /// # Errors
    ///
    /// `InvalidHours` outside 1..=168, `DeviceNotFound` if the device does
    /// not exist (checked before readings), `NoReadingsFound` if the window
    /// is empty.
    #[instrument(skip(self))]
    pub async fn summary_for_device(&self, device_id: i64, hours: i64) -> WeatherResult<SummaryStats> {
        // ---
        if !(MIN_SUMMARY_HOURS..=MAX_SUMMARY_HOURS).contains(&hours) {
            return Err(WeatherError::InvalidHours {
                hours,
                min: MIN_SUMMARY_HOURS,
                max: MAX_SUMMARY_HOURS,
            });
        }

        let device = self
            .store
            .device_by_id(device_id)
            .await?
            .ok_or(WeatherError::DeviceNotFound(device_id))?;

        let until = self.clock.now();
        let since = until - Duration::hours(hours);
        let stats = self.store.window_stats(device_id, since, until).await?;

        let (Some(period_start), Some(period_end)) = (stats.period_start, stats.period_end) else {
            return Err(WeatherError::NoReadingsFound { device_id, hours });
        };
        if stats.reading_count == 0 {
            return Err(WeatherError::NoReadingsFound { device_id, hours });
        }

        Ok(SummaryStats {
            device_id,
            device_location: device.location,
            avg_temperature: stats.avg_temperature,
            min_temperature: stats.min_temperature,
            max_temperature: stats.max_temperature,
            avg_humidity: stats.avg_humidity,
            avg_pressure: stats.avg_pressure,
            reading_count: stats.reading_count,
            period_start,
            period_end,
        })
    }

    /// Retention sweep: drop readings recorded more than `days` ago.
    ///
    /// # Errors
    ///
    /// `InvalidRetention` when `days` is negative or the cutoff falls outside
    /// the representable time range.
    #[instrument(skip(self))]
    pub async fn purge_older_than(&self, days: i64) -> WeatherResult<u64> {
        // ---
        let cutoff = Duration::try_days(days)
            .filter(|_| days >= 0)
            .and_then(|age| self.clock.now().checked_sub_signed(age))
            .ok_or(WeatherError::InvalidRetention { days })?;
        let deleted = self.store.delete_recorded_before(cutoff).await?;
        info!(deleted, %cutoff, "Retention sweep complete");
        Ok(deleted)
    }
}
