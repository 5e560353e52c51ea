//! Data models for devices, weather readings and aggregated views.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Granularity, WeatherError};

// ---

/// Functional role of a board. Sensors submit readings, displays read them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceRole {
    Sensor,
    Display,
}

impl DeviceRole {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceRole::Sensor => "sensor",
            DeviceRole::Display => "display",
        }
    }
}

impl fmt::Display for DeviceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sensor" => Ok(DeviceRole::Sensor),
            "display" => Ok(DeviceRole::Display),
            other => Err(format!("unknown device role '{other}'")),
        }
    }
}

/// A registered board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    // ---
    pub id: i64,
    pub device_type: String,
    pub location: String,
    pub role: DeviceRole,
}

impl Device {
    /// Fail with [`WeatherError::RoleNotPermitted`] unless this device has `required` role.
    pub fn require_role(&self, required: DeviceRole) -> Result<(), WeatherError> {
        // ---
        if self.role == required {
            Ok(())
        } else {
            Err(WeatherError::RoleNotPermitted {
                device_id: self.id,
                actual: self.role,
                required,
            })
        }
    }
}

/// Registration payload for a new board.
#[derive(Debug, Clone, Deserialize)]
pub struct NewDevice {
    // ---
    #[serde(rename = "type", default = "default_device_type")]
    pub device_type: String,
    pub location: String,
    #[serde(rename = "function")]
    pub role: DeviceRole,
}

fn default_device_type() -> String {
    "ESP32".to_string()
}

/// Weather payload submitted by a sensor board.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewReading {
    // ---
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
    pub wind_speed: Option<f64>,
    pub rain_amount: Option<f64>,
    /// Board-side timestamp; the server clock is used when absent.
    pub recorded_at: Option<DateTime<Utc>>,
}

impl NewReading {
    /// Check every present metric against its physical range.
    pub fn validate(&self) -> Result<(), WeatherError> {
        // ---
        check_range("temperature", self.temperature, -20.0, 60.0)?;
        check_range("humidity", self.humidity, 0.0, 100.0)?;
        check_range("pressure", self.pressure, 300.0, 1500.0)?;
        check_range("wind_speed", self.wind_speed, 0.0, f64::INFINITY)?;
        check_range("rain_amount", self.rain_amount, 0.0, f64::INFINITY)?;
        Ok(())
    }
}

fn check_range(
    field: &'static str,
    value: Option<f64>,
    min: f64,
    max: f64,
) -> Result<(), WeatherError> {
    match value {
        // NaN fails both comparisons and is rejected here as well.
        Some(v) if !(v >= min && v <= max) => Err(WeatherError::InvalidReading {
            field,
            value: v,
            min,
            max,
        }),
        _ => Ok(()),
    }
}

/// A stored weather reading. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Reading {
    // ---
    pub id: i64,
    pub device_id: i64,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
    pub wind_speed: Option<f64>,
    pub rain_amount: Option<f64>,
    pub recorded_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Reading {
    pub fn with_location(self, device_location: impl Into<String>) -> ReadingWithLocation {
        ReadingWithLocation {
            reading: self,
            device_location: device_location.into(),
        }
    }
}

/// Reading annotated with its device's location, as served to displays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ReadingWithLocation {
    // ---
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub reading: Reading,
    pub device_location: String,
}

/// One aggregated time bucket.
///
/// `recorded_at` is the bucket start. Rain is summed, the other metrics are
/// averaged over readings that carried them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct BucketSummary {
    // ---
    pub device_id: Option<i64>,
    pub recorded_at: DateTime<Utc>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
    pub wind_speed: Option<f64>,
    pub rain_amount: f64,
    pub reading_count: i64,
}

/// Min/max/avg over one device's readings inside a window, as the store
/// computes it. `reading_count == 0` means the window was empty.
#[derive(Debug, Clone, Default, PartialEq, sqlx::FromRow)]
pub struct WindowStats {
    // ---
    pub avg_temperature: Option<f64>,
    pub min_temperature: Option<f64>,
    pub max_temperature: Option<f64>,
    pub avg_humidity: Option<f64>,
    pub avg_pressure: Option<f64>,
    pub reading_count: i64,
    pub period_start: Option<DateTime<Utc>>,
    pub period_end: Option<DateTime<Utc>>,
}

/// Trailing-window summary for one device.
///
/// `period_start`/`period_end` are the first and last observed timestamps,
/// not the nominal window bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    // ---
    pub device_id: i64,
    pub device_location: String,
    pub avg_temperature: Option<f64>,
    pub min_temperature: Option<f64>,
    pub max_temperature: Option<f64>,
    pub avg_humidity: Option<f64>,
    pub avg_pressure: Option<f64>,
    pub reading_count: i64,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
}

/// Latest reading from every sensor, for display boards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatestReadings {
    pub readings: Vec<ReadingWithLocation>,
    pub fetched_at: DateTime<Utc>,
}

/// Raw-mode filter shared by listing and counting.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadingFilter {
    pub device_id: Option<i64>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl ReadingFilter {
    /// Inclusive on both ends.
    pub fn matches(&self, reading: &Reading) -> bool {
        // ---
        self.device_id.map_or(true, |id| reading.device_id == id)
            && self.start.map_or(true, |s| reading.recorded_at >= s)
            && self.end.map_or(true, |e| reading.recorded_at <= e)
    }
}

/// Either raw readings or aggregated buckets.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Series {
    Raw(Vec<Reading>),
    Aggregated(Vec<BucketSummary>),
}

impl Series {
    pub fn len(&self) -> usize {
        match self {
            Series::Raw(v) => v.len(),
            Series::Aggregated(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Paginated list response.
#[derive(Debug, Clone, Serialize)]
pub struct ReadingList {
    // ---
    pub readings: Series,
    pub total: i64,
    pub aggregated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub granularity: Option<Granularity>,
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::TimeZone;

    fn create_test_reading(id: i64, device_id: i64) -> Reading {
        // ---
        let ts = Utc.with_ymd_and_hms(2025, 3, 26, 18, 45, 0).unwrap();
        Reading {
            id,
            device_id,
            temperature: Some(21.5),
            humidity: Some(40.0),
            pressure: None,
            wind_speed: None,
            rain_amount: Some(0.2),
            recorded_at: ts,
            created_at: ts,
        }
    }

    #[test]
    fn test_valid_reading_passes() {
        // ---
        let reading = NewReading {
            temperature: Some(22.4),
            humidity: Some(50.0),
            pressure: Some(1013.0),
            wind_speed: Some(3.2),
            rain_amount: Some(0.0),
            recorded_at: None,
        };
        assert!(reading.validate().is_ok());
        assert!(NewReading::default().validate().is_ok());
    }

    #[test]
    fn test_range_edges_are_inclusive() {
        // ---
        let edges = NewReading {
            temperature: Some(-20.0),
            humidity: Some(100.0),
            pressure: Some(300.0),
            ..Default::default()
        };
        assert!(edges.validate().is_ok());

        let edges = NewReading {
            temperature: Some(60.0),
            humidity: Some(0.0),
            pressure: Some(1500.0),
            ..Default::default()
        };
        assert!(edges.validate().is_ok());
    }

    #[test]
    fn test_out_of_range_metrics_are_rejected() {
        // ---
        let too_hot = NewReading {
            temperature: Some(60.5),
            ..Default::default()
        };
        match too_hot.validate() {
            Err(WeatherError::InvalidReading { field, .. }) => assert_eq!(field, "temperature"),
            other => panic!("unexpected: {other:?}"),
        }

        let negative_rain = NewReading {
            rain_amount: Some(-0.1),
            ..Default::default()
        };
        assert!(negative_rain.validate().is_err());

        let nan_pressure = NewReading {
            pressure: Some(f64::NAN),
            ..Default::default()
        };
        assert!(nan_pressure.validate().is_err());
    }

    #[test]
    fn test_role_gate() {
        // ---
        let display = Device {
            id: 7,
            device_type: "ESP32".into(),
            location: "Hall".into(),
            role: DeviceRole::Display,
        };
        assert!(display.require_role(DeviceRole::Display).is_ok());
        assert!(matches!(
            display.require_role(DeviceRole::Sensor),
            Err(WeatherError::RoleNotPermitted { device_id: 7, .. })
        ));
    }

    #[test]
    fn test_role_round_trips_through_str() {
        // ---
        for role in [DeviceRole::Sensor, DeviceRole::Display] {
            assert_eq!(role.as_str().parse::<DeviceRole>().unwrap(), role);
        }
        assert!("thermostat".parse::<DeviceRole>().is_err());
    }

    #[test]
    fn test_location_is_flattened_into_reading() {
        // ---
        let with_loc = create_test_reading(1, 3).with_location("Garden");
        let json = serde_json::to_value(&with_loc).unwrap();
        assert_eq!(json["device_location"], "Garden");
        assert_eq!(json["device_id"], 3);
        assert_eq!(json["temperature"], 21.5);
        assert!(json["pressure"].is_null());
    }

    #[test]
    fn test_filter_is_inclusive() {
        // ---
        let reading = create_test_reading(1, 3);
        let at = reading.recorded_at;
        let filter = ReadingFilter {
            device_id: Some(3),
            start: Some(at),
            end: Some(at),
        };
        assert!(filter.matches(&reading));

        let other_device = ReadingFilter {
            device_id: Some(4),
            ..filter
        };
        assert!(!other_device.matches(&reading));
    }

    #[test]
    fn test_new_device_uses_wire_field_names() {
        // ---
        let device: NewDevice =
            serde_json::from_str(r#"{"location":"Roof","function":"sensor"}"#).unwrap();
        assert_eq!(device.device_type, "ESP32");
        assert_eq!(device.role, DeviceRole::Sensor);
    }
}
