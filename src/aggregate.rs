//! In-process bucketing and window statistics over scanned readings.
//!
//! These are the reference semantics for the grouped queries a store may
//! push down to its backend: the Postgres store produces the same rows with
//! `GROUP BY` over the same bucket expression.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::granularity::bucket_start;
use crate::{BucketSummary, Reading, WindowStats};

// ---

/// Running mean that ignores missing values.
#[derive(Debug, Default, Clone, Copy)]
struct Mean {
    sum: f64,
    n: u64,
}

impl Mean {
    fn push(&mut self, value: Option<f64>) {
        if let Some(v) = value {
            self.sum += v;
            self.n += 1;
        }
    }

    fn value(self) -> Option<f64> {
        (self.n > 0).then(|| self.sum / self.n as f64)
    }
}

#[derive(Debug, Default)]
struct BucketAcc {
    temperature: Mean,
    humidity: Mean,
    pressure: Mean,
    wind_speed: Mean,
    rain_amount: f64,
    count: i64,
}

impl BucketAcc {
    fn push(&mut self, reading: &Reading) {
        // ---
        self.temperature.push(reading.temperature);
        self.humidity.push(reading.humidity);
        self.pressure.push(reading.pressure);
        self.wind_speed.push(reading.wind_speed);
        self.rain_amount += reading.rain_amount.unwrap_or(0.0);
        self.count += 1;
    }
}

/// Group `readings` into `width_seconds` buckets.
///
/// Only buckets with at least one reading are emitted, ascending by start.
/// `skip`/`limit` apply to the bucket sequence, not to the readings.
pub fn bucketize<'a>(
    readings: impl IntoIterator<Item = &'a Reading>,
    width_seconds: i64,
    device_id: Option<i64>,
    skip: usize,
    limit: usize,
) -> Vec<BucketSummary> {
    // ---
    let mut buckets: BTreeMap<DateTime<Utc>, BucketAcc> = BTreeMap::new();
    for reading in readings {
        buckets
            .entry(bucket_start(reading.recorded_at, width_seconds))
            .or_default()
            .push(reading);
    }

    buckets
        .into_iter()
        .skip(skip)
        .take(limit)
        .map(|(start, acc)| BucketSummary {
            device_id,
            recorded_at: start,
            temperature: acc.temperature.value(),
            humidity: acc.humidity.value(),
            pressure: acc.pressure.value(),
            wind_speed: acc.wind_speed.value(),
            rain_amount: acc.rain_amount,
            reading_count: acc.count,
        })
        .collect()
}

/// Min/max/avg over a set of readings, plus the first and last timestamps seen.
pub fn window_stats<'a>(readings: impl IntoIterator<Item = &'a Reading>) -> WindowStats {
    // ---
    let mut temperature = Mean::default();
    let mut humidity = Mean::default();
    let mut pressure = Mean::default();
    let mut stats = WindowStats::default();

    for reading in readings {
        temperature.push(reading.temperature);
        humidity.push(reading.humidity);
        pressure.push(reading.pressure);

        if let Some(t) = reading.temperature {
            stats.min_temperature = Some(stats.min_temperature.map_or(t, |m| m.min(t)));
            stats.max_temperature = Some(stats.max_temperature.map_or(t, |m| m.max(t)));
        }
        stats.period_start = Some(
            stats
                .period_start
                .map_or(reading.recorded_at, |s| s.min(reading.recorded_at)),
        );
        stats.period_end = Some(
            stats
                .period_end
                .map_or(reading.recorded_at, |e| e.max(reading.recorded_at)),
        );
        stats.reading_count += 1;
    }

    stats.avg_temperature = temperature.value();
    stats.avg_humidity = humidity.value();
    stats.avg_pressure = pressure.value();
    stats
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::{Duration, TimeZone};

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn reading(id: i64, offset_secs: i64, temperature: Option<f64>, rain: Option<f64>) -> Reading {
        // ---
        let at = base() + Duration::seconds(offset_secs);
        Reading {
            id,
            device_id: 1,
            temperature,
            humidity: Some(50.0),
            pressure: None,
            wind_speed: Some(2.0),
            rain_amount: rain,
            recorded_at: at,
            created_at: at,
        }
    }

    #[test]
    fn test_rain_is_summed_not_averaged() {
        // ---
        let readings = vec![
            reading(1, 10, Some(20.0), Some(0.5)),
            reading(2, 20, Some(22.0), Some(1.0)),
        ];
        let buckets = bucketize(&readings, 60, Some(1), 0, 2000);

        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].rain_amount, 1.5);
        assert_eq!(buckets[0].temperature, Some(21.0));
        assert_eq!(buckets[0].reading_count, 2);
        assert_eq!(buckets[0].device_id, Some(1));
        assert_eq!(buckets[0].recorded_at, base());
    }

    #[test]
    fn test_missing_metrics_are_skipped_in_means() {
        // ---
        let readings = vec![
            reading(1, 0, Some(10.0), None),
            reading(2, 1, None, None),
            reading(3, 2, Some(20.0), None),
        ];
        let buckets = bucketize(&readings, 60, None, 0, 2000);

        assert_eq!(buckets[0].temperature, Some(15.0));
        assert_eq!(buckets[0].pressure, None);
        assert_eq!(buckets[0].rain_amount, 0.0);
        assert_eq!(buckets[0].reading_count, 3);
        assert_eq!(buckets[0].device_id, None);
    }

    #[test]
    fn test_empty_buckets_are_omitted_and_order_is_ascending() {
        // ---
        // Inserted out of order, with a gap of several empty minutes.
        let readings = vec![
            reading(1, 600, Some(1.0), None),
            reading(2, 0, Some(2.0), None),
            reading(3, 65, Some(3.0), None),
        ];
        let buckets = bucketize(&readings, 60, None, 0, 2000);

        let starts: Vec<_> = buckets.iter().map(|b| b.recorded_at).collect();
        assert_eq!(
            starts,
            vec![
                base(),
                base() + Duration::seconds(60),
                base() + Duration::seconds(600)
            ]
        );
    }

    #[test]
    fn test_skip_and_limit_apply_to_buckets() {
        // ---
        let readings: Vec<_> = (0..10)
            .flat_map(|minute| {
                [
                    reading(minute * 2, minute * 60, Some(1.0), None),
                    reading(minute * 2 + 1, minute * 60 + 30, Some(1.0), None),
                ]
            })
            .collect();
        let buckets = bucketize(&readings, 60, None, 3, 4);

        assert_eq!(buckets.len(), 4);
        assert_eq!(buckets[0].recorded_at, base() + Duration::seconds(180));
        assert!(buckets.iter().all(|b| b.reading_count == 2));
    }

    #[test]
    fn test_no_readings_no_buckets() {
        // ---
        let buckets = bucketize(std::iter::empty(), 300, Some(1), 0, 2000);
        assert!(buckets.is_empty());
    }

    #[test]
    fn test_window_stats_tracks_extremes_and_observed_period() {
        // ---
        let readings = vec![
            reading(1, 100, Some(18.0), None),
            reading(2, 50, Some(25.0), None),
            reading(3, 300, None, None),
            reading(4, 200, Some(12.0), None),
        ];
        let stats = window_stats(&readings);

        assert_eq!(stats.reading_count, 4);
        assert_eq!(stats.min_temperature, Some(12.0));
        assert_eq!(stats.max_temperature, Some(25.0));
        assert_eq!(stats.avg_temperature, Some(55.0 / 3.0));
        assert_eq!(stats.avg_humidity, Some(50.0));
        assert_eq!(stats.avg_pressure, None);
        assert_eq!(stats.period_start, Some(base() + Duration::seconds(50)));
        assert_eq!(stats.period_end, Some(base() + Duration::seconds(300)));
    }

    #[test]
    fn test_window_stats_empty() {
        // ---
        let stats = window_stats(std::iter::empty());
        assert_eq!(stats, WindowStats::default());
    }
}
