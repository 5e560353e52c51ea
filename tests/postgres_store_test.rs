//! `PgReadingStore` against a live PostgreSQL database.
//!
//! Set `DATABASE_URL` to run these; they return early when it is unset.
//! Every test registers fresh devices and scopes its queries to them, so a
//! shared database with existing rows is fine.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::{DateTime, Duration, TimeZone, Utc};
use sqlx::postgres::PgPoolOptions;

use weatherstation::{
    schema, BucketSummary, Clock, DeviceRole, FixedClock, InMemoryStore, NewDevice, NewReading,
    PgReadingStore, ReadingStore, WeatherService,
};

/// Serializes `create_schema`: concurrent `CREATE ... IF NOT EXISTS` can race.
static SCHEMA_LOCK: Mutex<()> = Mutex::new(());

async fn pg_store() -> Result<Option<PgReadingStore>> {
    // ---
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping PostgreSQL store test");
        return Ok(None);
    };

    let pool = PgPoolOptions::new().max_connections(2).connect(&url).await?;
    {
        let _guard = SCHEMA_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        schema::create_schema(&pool).await?;
    }
    Ok(Some(PgReadingStore::new(pool)))
}

async fn sensor(store: &dyn ReadingStore, location: &str) -> Result<i64> {
    // ---
    let device = store
        .insert_device(NewDevice {
            device_type: "ESP32".into(),
            location: location.into(),
            role: DeviceRole::Sensor,
        })
        .await?;
    Ok(device.id)
}

fn reading(temperature: f64, rain: Option<f64>) -> NewReading {
    NewReading {
        temperature: Some(temperature),
        humidity: Some(40.0 + temperature),
        rain_amount: rain,
        ..Default::default()
    }
}

fn epoch(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

fn close(a: Option<f64>, b: Option<f64>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => (a - b).abs() < 1e-9,
        (None, None) => true,
        _ => false,
    }
}

/// Bucket contents must agree; device ids differ between the two stores.
fn assert_same_buckets(pg: &[BucketSummary], mem: &[BucketSummary]) {
    // ---
    assert_eq!(pg.len(), mem.len(), "bucket count differs");
    for (p, m) in pg.iter().zip(mem) {
        assert_eq!(p.recorded_at, m.recorded_at);
        assert_eq!(p.reading_count, m.reading_count, "count at {}", p.recorded_at);
        assert!((p.rain_amount - m.rain_amount).abs() < 1e-9, "rain at {}", p.recorded_at);
        assert!(close(p.temperature, m.temperature), "temperature at {}", p.recorded_at);
        assert!(close(p.humidity, m.humidity), "humidity at {}", p.recorded_at);
        assert!(close(p.pressure, m.pressure), "pressure at {}", p.recorded_at);
        assert!(close(p.wind_speed, m.wind_speed), "wind_speed at {}", p.recorded_at);
    }
}

#[tokio::test]
async fn sql_buckets_match_in_process_buckets() -> Result<()> {
    // ---
    let Some(pg) = pg_store().await? else {
        return Ok(());
    };
    let mem = InMemoryStore::new();
    let pg_id = sensor(&pg, "Roof").await?;
    let mem_id = sensor(&mem, "Roof").await?;

    let start = epoch(-900);
    let end = epoch(600);
    // Straddles the epoch, includes both bounds and one reading past `end`.
    let seeded = [
        (-900, 1.0, None),
        (-601, 2.0, Some(0.2)),
        (-90, 3.0, None),
        (-1, 4.5, Some(0.5)),
        (0, 6.0, Some(1.0)),
        (299, 7.0, None),
        (300, 8.0, Some(0.25)),
        (600, 9.0, None),
        (601, 50.0, Some(9.0)),
    ];
    for (secs, temperature, rain) in seeded {
        let r = reading(temperature, rain);
        pg.insert_reading(pg_id, &r, epoch(secs)).await?;
        mem.insert_reading(mem_id, &r, epoch(secs)).await?;
    }

    for width in [60, 300, 900] {
        let from_pg = pg.aggregate_buckets(Some(pg_id), start, end, width, 0, 100).await?;
        let from_mem = mem.aggregate_buckets(Some(mem_id), start, end, width, 0, 100).await?;
        assert_same_buckets(&from_pg, &from_mem);
        assert!(from_pg.iter().all(|b| b.device_id == Some(pg_id)));
    }

    let from_pg = pg.aggregate_buckets(Some(pg_id), start, end, 300, 1, 2).await?;
    let from_mem = mem.aggregate_buckets(Some(mem_id), start, end, 300, 1, 2).await?;
    assert_eq!(from_pg.len(), 2);
    assert_same_buckets(&from_pg, &from_mem);

    // Pre-epoch readings floor to the bucket below, not toward zero.
    let five_min = pg.aggregate_buckets(Some(pg_id), start, end, 300, 0, 100).await?;
    let first_buckets: Vec<_> = five_min.iter().map(|b| b.recorded_at).take(3).collect();
    assert_eq!(first_buckets, vec![epoch(-900), epoch(-300), epoch(0)]);
    Ok(())
}

#[tokio::test]
async fn sql_bucket_sums_rain() -> Result<()> {
    // ---
    let Some(pg) = pg_store().await? else {
        return Ok(());
    };
    let id = sensor(&pg, "Garden").await?;
    let bucket = Utc.with_ymd_and_hms(2025, 6, 10, 10, 0, 0).unwrap();
    pg.insert_reading(id, &reading(10.0, Some(0.5)), bucket + Duration::minutes(1))
        .await?;
    pg.insert_reading(id, &reading(12.0, Some(1.0)), bucket + Duration::minutes(3))
        .await?;
    pg.insert_reading(id, &reading(14.0, None), bucket + Duration::minutes(4))
        .await?;

    let buckets = pg
        .aggregate_buckets(Some(id), bucket, bucket + Duration::hours(1), 300, 0, 100)
        .await?;
    assert_eq!(buckets.len(), 1);
    assert_eq!(buckets[0].recorded_at, bucket);
    assert_eq!(buckets[0].reading_count, 3);
    assert!((buckets[0].rain_amount - 1.5).abs() < 1e-9);
    assert!(close(buckets[0].temperature, Some(12.0)));
    Ok(())
}

#[tokio::test]
async fn sql_latest_tie_goes_to_highest_id() -> Result<()> {
    // ---
    let Some(pg) = pg_store().await? else {
        return Ok(());
    };
    let id = sensor(&pg, "Porch").await?;
    let at = Utc.with_ymd_and_hms(2025, 6, 10, 11, 0, 0).unwrap();
    pg.insert_reading(id, &reading(1.0, None), at - Duration::minutes(5))
        .await?;
    let first = pg.insert_reading(id, &reading(2.0, None), at).await?;
    let second = pg.insert_reading(id, &reading(3.0, None), at).await?;
    assert!(second.id > first.id);

    let one = pg.latest_for_device(id).await?.expect("device has readings");
    assert_eq!(one.reading.id, second.id);
    assert_eq!(one.device_location, "Porch");

    let all = pg.latest_per_device(DeviceRole::Sensor).await?;
    let mine: Vec<_> = all.iter().filter(|r| r.reading.device_id == id).collect();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].reading.id, second.id);
    Ok(())
}

#[tokio::test]
async fn sql_summary_window_is_bounded_by_now() -> Result<()> {
    // ---
    let Some(pg) = pg_store().await? else {
        return Ok(());
    };
    let now = Utc.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap();
    let clock: Arc<dyn Clock> = Arc::new(FixedClock(now));
    let svc = WeatherService::new(Arc::new(pg), clock);
    let id = sensor(svc.store().as_ref(), "Roof").await?;

    let first = now - Duration::hours(5);
    let last = now - Duration::hours(1);
    for (at, temperature) in [
        (now - Duration::hours(30), -5.0),
        (first, 10.0),
        (last, 20.0),
        (now + Duration::days(3), 50.0),
    ] {
        svc.submit_reading(
            id,
            NewReading {
                recorded_at: Some(at),
                ..reading(temperature, None)
            },
        )
        .await?;
    }

    let summary = svc.summary_for_device(id, 24).await?;
    assert_eq!(summary.reading_count, 2);
    assert_eq!(summary.min_temperature, Some(10.0));
    assert_eq!(summary.max_temperature, Some(20.0));
    assert!(close(summary.avg_temperature, Some(15.0)));
    assert_eq!(summary.period_start, first);
    assert_eq!(summary.period_end, last);
    assert_eq!(summary.device_location, "Roof");
    Ok(())
}
