//! Weather station backend: device registry, reading ingestion and
//! query-time aggregation for ESP32 sensor and display boards.
//!
//! Modules follow the Explicit Module Boundary Pattern (EMBP): siblings
//! import from this gateway rather than from each other's files, so moving
//! a type only touches the re-export below.

mod aggregate;
mod clock;
mod error;
mod models;
mod service;

pub mod config;
pub mod granularity;
pub mod routes;
pub mod schema;
pub mod store;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::Config;
pub use error::{WeatherError, WeatherResult};
pub use granularity::{bucket_start, resolve_granularity, Granularity, MAX_SERIES_POINTS};
pub use models::{
    BucketSummary, Device, DeviceRole, LatestReadings, NewDevice, NewReading, Reading,
    ReadingFilter, ReadingList, ReadingWithLocation, Series, SummaryStats, WindowStats,
};
pub use service::{AggregateRequest, ReadingsQuery, WeatherService};
pub use store::{InMemoryStore, PgReadingStore, ReadingStore};
