//! Bucket width selection for query-time aggregation.
//!
//! A caller asks for readings over `[start, end]` and either names a
//! [`Granularity`] or asks for one to be picked automatically. Whatever the
//! path, the number of buckets returned never exceeds [`MAX_SERIES_POINTS`]:
//! explicit requests that would overflow are rejected, automatic ones are
//! widened until they fit.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::WeatherError;

/// Hard ceiling on buckets per aggregated response.
pub const MAX_SERIES_POINTS: i64 = 2000;

/// Lookback (hours) used by history queries that ask for aggregation
/// without a range.
pub const DEFAULT_AGG_LOOKBACK_HOURS: i64 = 24;

pub fn default_agg_lookback() -> Duration {
    Duration::hours(DEFAULT_AGG_LOOKBACK_HOURS)
}

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;

/// Supported bucket widths, finest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Minute,
    FiveMin,
    FifteenMin,
    Hour,
    SixHour,
    Day,
}

/// Ordered `(granularity, width_seconds)` table. Widths strictly increase.
const GRANULARITY_TABLE: [(Granularity, i64); 6] = [
    (Granularity::Minute, MINUTE),
    (Granularity::FiveMin, 5 * MINUTE),
    (Granularity::FifteenMin, 15 * MINUTE),
    (Granularity::Hour, HOUR),
    (Granularity::SixHour, 6 * HOUR),
    (Granularity::Day, DAY),
];

/// Range length → base granularity for auto selection. Anything longer
/// than the last entry falls through to [`Granularity::Day`].
const AUTO_BASE_TABLE: [(i64, Granularity); 5] = [
    (6 * HOUR, Granularity::Minute),
    (2 * DAY, Granularity::FiveMin),
    (7 * DAY, Granularity::FifteenMin),
    (31 * DAY, Granularity::Hour),
    (180 * DAY, Granularity::SixHour),
];

impl Granularity {
    /// Every supported granularity, finest first.
    pub fn all() -> impl Iterator<Item = Granularity> {
        GRANULARITY_TABLE.into_iter().map(|(g, _)| g)
    }

    /// Bucket width in seconds.
    pub fn seconds(self) -> i64 {
        // ---
        match self {
            Granularity::Minute => MINUTE,
            Granularity::FiveMin => 5 * MINUTE,
            Granularity::FifteenMin => 15 * MINUTE,
            Granularity::Hour => HOUR,
            Granularity::SixHour => 6 * HOUR,
            Granularity::Day => DAY,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Granularity::Minute => "minute",
            Granularity::FiveMin => "five_min",
            Granularity::FifteenMin => "fifteen_min",
            Granularity::Hour => "hour",
            Granularity::SixHour => "six_hour",
            Granularity::Day => "day",
        }
    }
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn ceil_div(numerator: i64, denominator: i64) -> i64 {
    (numerator + denominator - 1) / denominator
}

/// Smallest supported granularity whose width is at least `required_seconds`,
/// falling back to [`Granularity::Day`] when none is wide enough.
pub fn pick_supported_bucket(required_seconds: i64) -> (Granularity, i64) {
    // ---
    GRANULARITY_TABLE
        .iter()
        .copied()
        .find(|(_, width)| *width >= required_seconds)
        .unwrap_or((Granularity::Day, DAY))
}

/// Pick a granularity from the range length alone, then widen it until the
/// bucket count fits under [`MAX_SERIES_POINTS`].
pub fn auto_granularity(start: DateTime<Utc>, end: DateTime<Utc>) -> (Granularity, i64) {
    // ---
    let range_seconds = (end - start).num_seconds();
    if range_seconds <= 0 {
        return (Granularity::Minute, MINUTE);
    }

    let base = AUTO_BASE_TABLE
        .iter()
        .find(|(limit, _)| range_seconds <= *limit)
        .map(|(_, g)| *g)
        .unwrap_or(Granularity::Day);

    let min_bucket = ceil_div(range_seconds, MAX_SERIES_POINTS);
    let required = base.seconds().max(min_bucket);
    pick_supported_bucket(required)
}

/// Resolve the effective granularity for an aggregation request.
///
/// Ordering of `start` and `end` is the caller's responsibility.
///
/// # Errors
///
/// Returns [`WeatherError::GranularityTooFine`] when an explicit granularity
/// would produce more than [`MAX_SERIES_POINTS`] buckets.
pub fn resolve_granularity(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    granularity: Option<Granularity>,
    auto: bool,
) -> Result<(Granularity, i64), WeatherError> {
    // ---
    if let Some(granularity) = granularity {
        let width = granularity.seconds();
        let range_seconds = (end - start).num_seconds();
        if range_seconds > 0 {
            let points = ceil_div(range_seconds, width);
            if points > MAX_SERIES_POINTS {
                return Err(WeatherError::GranularityTooFine {
                    granularity,
                    points,
                    max: MAX_SERIES_POINTS,
                });
            }
        }
        return Ok((granularity, width));
    }

    if auto {
        return Ok(auto_granularity(start, end));
    }

    Ok((Granularity::Hour, HOUR))
}

/// Start of the bucket containing `timestamp`.
///
/// Floors on epoch seconds, so timestamps before 1970 land in the bucket
/// below them rather than being truncated toward zero.
pub fn bucket_start(timestamp: DateTime<Utc>, width_seconds: i64) -> DateTime<Utc> {
    // ---
    if width_seconds <= 0 {
        return timestamp;
    }
    let start = timestamp.timestamp().div_euclid(width_seconds) * width_seconds;
    DateTime::from_timestamp(start, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
}
