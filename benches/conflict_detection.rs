use chrono::{Duration, NaiveDate, NaiveTime};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rail_live::conflict::{detect_conflicts, ConflictThresholds, TrainSnapshot};
use rail_live::models::{Route, RouteStop, TrainCategory, TrainDefinition};
use std::sync::Arc;

const STATIONS_PER_LINE: u32 = 12;
const LINES: u32 = 4;

/// Trains spread over a few shared lines so every rule gets exercised
fn build_snapshot(train_count: u32) -> Vec<TrainSnapshot> {
    let base = NaiveDate::from_ymd_opt(2024, 5, 10)
        .and_then(|d| d.and_hms_opt(8, 0, 0))
        .expect("valid time");

    (0..train_count)
        .map(|i| {
            let line = i % LINES;
            let offset = i / LINES;
            let stops = (0..STATIONS_PER_LINE)
                .map(|s| {
                    let minutes = 6 * 60 + offset * 7 + s * 9;
                    let time = NaiveTime::from_hms_opt((minutes / 60) % 24, minutes % 60, 0);
                    RouteStop::new(s + 1, &format!("L{line}S{s}"), time, time, f64::from(s) * 8.5)
                })
                .collect();
            let train = Arc::new(TrainDefinition::new(
                &format!("{i:05}"),
                &format!("Train {i}"),
                TrainCategory::Express,
                Route::new(stops),
            ));
            let station = (i * 7) % STATIONS_PER_LINE;
            TrainSnapshot {
                train,
                station_code: format!("L{line}S{station}"),
                timestamp: base + Duration::seconds(i64::from(i) * 45),
                speed_kmh: 80.0,
            }
        })
        .collect()
}

fn benchmark_conflict_detection(c: &mut Criterion) {
    let thresholds = ConflictThresholds::default();
    let detected_at = NaiveDate::from_ymd_opt(2024, 5, 10)
        .and_then(|d| d.and_hms_opt(9, 0, 0))
        .expect("valid time");

    let mut group = c.benchmark_group("detect_conflicts");
    for train_count in [50u32, 200] {
        let snapshot = build_snapshot(train_count);
        group.bench_with_input(BenchmarkId::from_parameter(train_count), &snapshot, |b, snapshot| {
            b.iter(|| detect_conflicts(black_box(snapshot), black_box(&thresholds), detected_at));
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_conflict_detection);
criterion_main!(benches);
