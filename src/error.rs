//! Error types for the weatherstation core.
//!
//! Every failure a caller can see is a variant of [`WeatherError`]. Input
//! problems carry enough detail to self-correct; not-found conditions are
//! ordinary values, not panics; store failures pass through untouched.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{DeviceRole, Granularity};

/// Result alias used throughout the crate.
pub type WeatherResult<T> = Result<T, WeatherError>;

#[derive(Error, Debug)]
pub enum WeatherError {
    /// `start_time` is not strictly before `end_time`.
    #[error("start_time ({start}) must be earlier than end_time ({end})")]
    InvalidTimeRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    /// Aggregation was requested without a complete time range.
    #[error("start_time and end_time are required when using granularity/auto_granularity")]
    MissingRange,

    /// An explicit granularity would return too many buckets.
    #[error(
        "requested granularity '{granularity}' would return ~{points} points (> {max}); \
         increase granularity or reduce the date range"
    )]
    GranularityTooFine {
        granularity: Granularity,
        points: i64,
        max: i64,
    },

    /// Summary window outside the supported 1..=168 hours.
    #[error("hours must be between {min} and {max}, got {hours}")]
    InvalidHours { hours: i64, min: i64, max: i64 },

    /// Raw listing page size outside the supported bounds.
    #[error("limit must be between 1 and {max}, got {limit}")]
    InvalidLimit { limit: i64, max: i64 },

    /// Retention age that is negative or reaches past the representable range.
    #[error("retention of {days} days is out of range")]
    InvalidRetention { days: i64 },

    /// A submitted metric is outside its physical range.
    #[error("invalid reading: {field} = {value} is outside [{min}, {max}]")]
    InvalidReading {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("device {0} not found")]
    DeviceNotFound(i64),

    #[error("no readings found for device {device_id} in the last {hours} hours")]
    NoReadingsFound { device_id: i64, hours: i64 },

    /// The device exists but its role does not allow the operation.
    #[error("device {device_id} is a {actual} device; this operation requires a {required} device")]
    RoleNotPermitted {
        device_id: i64,
        actual: DeviceRole,
        required: DeviceRole,
    },

    /// Backing store failure, propagated opaquely.
    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),
}

impl WeatherError {
    /// True for conditions the caller can fix by changing the request.
    pub fn is_caller_input(&self) -> bool {
        matches!(
            self,
            WeatherError::InvalidTimeRange { .. }
                | WeatherError::MissingRange
                | WeatherError::GranularityTooFine { .. }
                | WeatherError::InvalidHours { .. }
                | WeatherError::InvalidLimit { .. }
                | WeatherError::InvalidRetention { .. }
                | WeatherError::InvalidReading { .. }
        )
    }

    /// True for "not found" conditions.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            WeatherError::DeviceNotFound(_) | WeatherError::NoReadingsFound { .. }
        )
    }
}
