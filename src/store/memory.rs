use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{to_usize, ReadingStore};
use crate::{
    Clock, Device, DeviceRole, SystemClock, NewDevice, NewReading, Reading, ReadingFilter, ReadingWithLocation,
    WeatherError, WeatherResult,
};

// ---

#[derive(Debug, Default)]
struct Inner {
    devices: BTreeMap<i64, Device>,
    readings: Vec<Reading>,
    last_device_id: i64,
    last_reading_id: i64,
}

/// Process-local store. Ids are assigned sequentially from 1 and
/// `created_at` is stamped from the store's [`Clock`].
///
/// The lock is only ever held across synchronous work, never across an
/// `.await`.
pub struct InMemoryStore {
    inner: RwLock<Inner>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose `created_at` stamps come from `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            clock,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// Newest first; ties on `recorded_at` broken by the higher id.
fn newest_first(a: &Reading, b: &Reading) -> std::cmp::Ordering {
    (b.recorded_at, b.id).cmp(&(a.recorded_at, a.id))
}

#[async_trait]
impl ReadingStore for InMemoryStore {
    async fn ping(&self) -> WeatherResult<()> {
        Ok(())
    }

    async fn insert_device(&self, device: NewDevice) -> WeatherResult<Device> {
        // ---
        let mut inner = self.write();
        inner.last_device_id += 1;
        let device = Device {
            id: inner.last_device_id,
            device_type: device.device_type,
            location: device.location,
            role: device.role,
        };
        inner.devices.insert(device.id, device.clone());
        Ok(device)
    }

    async fn device_by_id(&self, id: i64) -> WeatherResult<Option<Device>> {
        Ok(self.read().devices.get(&id).cloned())
    }

    async fn insert_reading(
        &self,
        device_id: i64,
        reading: &NewReading,
        recorded_at: DateTime<Utc>,
    ) -> WeatherResult<Reading> {
        // ---
        let mut inner = self.write();
        if !inner.devices.contains_key(&device_id) {
            return Err(WeatherError::DeviceNotFound(device_id));
        }
        inner.last_reading_id += 1;
        let stored = Reading {
            id: inner.last_reading_id,
            device_id,
            temperature: reading.temperature,
            humidity: reading.humidity,
            pressure: reading.pressure,
            wind_speed: reading.wind_speed,
            rain_amount: reading.rain_amount,
            recorded_at,
            created_at: self.clock.now(),
        };
        inner.readings.push(stored.clone());
        Ok(stored)
    }

    async fn scan(
        &self,
        device_id: Option<i64>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> WeatherResult<Vec<Reading>> {
        // ---
        let filter = ReadingFilter {
            device_id,
            start: Some(start),
            end: Some(end),
        };
        let mut out: Vec<Reading> = self
            .read()
            .readings
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        out.sort_by_key(|r| (r.recorded_at, r.id));
        Ok(out)
    }

    async fn latest_per_device(&self, role: DeviceRole) -> WeatherResult<Vec<ReadingWithLocation>> {
        // ---
        let inner = self.read();
        let mut latest: BTreeMap<i64, &Reading> = BTreeMap::new();
        for reading in &inner.readings {
            let Some(device) = inner.devices.get(&reading.device_id) else {
                continue;
            };
            if device.role != role {
                continue;
            }
            latest
                .entry(reading.device_id)
                .and_modify(|best| {
                    if newest_first(reading, *best).is_lt() {
                        *best = reading;
                    }
                })
                .or_insert(reading);
        }

        Ok(latest
            .into_iter()
            .filter_map(|(device_id, reading)| {
                let device = inner.devices.get(&device_id)?;
                Some(reading.clone().with_location(device.location.clone()))
            })
            .collect())
    }

    async fn latest_for_device(
        &self,
        device_id: i64,
    ) -> WeatherResult<Option<ReadingWithLocation>> {
        // ---
        let inner = self.read();
        let Some(device) = inner.devices.get(&device_id) else {
            return Ok(None);
        };
        Ok(inner
            .readings
            .iter()
            .filter(|r| r.device_id == device_id)
            .min_by(|a, b| newest_first(a, b))
            .map(|r| r.clone().with_location(device.location.clone())))
    }

    async fn list_readings(
        &self,
        filter: ReadingFilter,
        skip: i64,
        limit: i64,
    ) -> WeatherResult<Vec<Reading>> {
        // ---
        let mut matched: Vec<Reading> = self
            .read()
            .readings
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        matched.sort_by(newest_first);
        Ok(matched
            .into_iter()
            .skip(to_usize(skip))
            .take(to_usize(limit))
            .collect())
    }

    async fn count_readings(&self, filter: ReadingFilter) -> WeatherResult<i64> {
        let n = self.read().readings.iter().filter(|r| filter.matches(r)).count();
        Ok(i64::try_from(n).unwrap_or(i64::MAX))
    }

    async fn delete_recorded_before(&self, cutoff: DateTime<Utc>) -> WeatherResult<u64> {
        // ---
        let mut inner = self.write();
        let before = inner.readings.len();
        inner.readings.retain(|r| r.recorded_at >= cutoff);
        Ok((before - inner.readings.len()) as u64)
    }
}
