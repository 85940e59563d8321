use chrono::{Duration, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use hydroprep::models::{
    CoverageWindow, ForecastArchive, GaugeObservation, GridValues, GridVariable,
};
use hydroprep::processors::{bucket_means, rearrange, GaugeResampler, IntegrityChecker};
use hydroprep::utils::time::parse_hst_timestamp;

// Five-minute readings starting 2008-01-01 00:00 HST
fn create_gauge_series(days: usize) -> Vec<GaugeObservation> {
    let start = parse_hst_timestamp("2008-01-01 00:00").unwrap();

    (0..days * 288)
        .map(|i| GaugeObservation {
            station_id: "16103000".to_string(),
            timestamp: start + Duration::minutes(5 * i as i64),
            measurement: format!("{:.2}", 1.0 + (i % 288) as f64 * 0.01),
            dqf: "A".to_string(),
        })
        .collect()
}

// Daily 06:00 issues with 0..=24 h steps over a small grid
fn create_archive(days: usize, lats: usize, lons: usize) -> ForecastArchive {
    let first = NaiveDate::from_ymd_opt(2019, 12, 31).unwrap();
    let issues: Vec<_> = (0..days)
        .map(|d| (first + Duration::days(d as i64)).and_hms_opt(6, 0, 0).unwrap())
        .collect();
    let steps: Vec<_> = (0..=24).map(Duration::hours).collect();
    let count = issues.len() * steps.len() * lats * lons;

    ForecastArchive::new(
        issues,
        steps,
        (0..lats).map(|i| 23.0 - i as f64 * 0.25).collect(),
        (0..lons).map(|i| -160.0 + i as f64 * 0.25).collect(),
        vec![GridVariable {
            name: "tp".to_string(),
            values: GridValues::Float32((0..count).map(|i| (i % 1000) as f32 * 1e-4).collect()),
        }],
    )
    .unwrap()
}

fn benchmark_bucket_means(c: &mut Criterion) {
    let readings: Vec<_> = create_gauge_series(365)
        .iter()
        .map(|o| (o.timestamp, o.value().unwrap()))
        .collect();

    c.bench_function("bucket_means_one_year", |b| {
        b.iter(|| black_box(bucket_means(&readings, 15).len()))
    });
}

fn benchmark_integrity_checker(c: &mut Criterion) {
    let observations = create_gauge_series(365);
    let timestamps: Vec<_> = observations.iter().map(|o| o.timestamp).collect();

    c.bench_function("integrity_checker", |b| {
        b.iter(|| {
            let checker = IntegrityChecker::new();
            let report = checker.check_alignment("16103000", &observations);
            black_box(checker.check_spacing("16103000", &timestamps).is_ok());
            black_box(report.misaligned_readings)
        })
    });
}

fn benchmark_resampling_by_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("resampling_by_days");
    let window = CoverageWindow::analysis_default().unwrap();

    for &days in &[30, 365, 1825] {
        group.bench_with_input(BenchmarkId::new("days", days), &days, |b, &days| {
            let observations = create_gauge_series(days);
            let resampler = GaugeResampler::new(window.clone());

            b.iter(|| black_box(resampler.evaluate("16103000", &observations).is_ok()))
        });
    }

    group.finish();
}

fn benchmark_rearrange(c: &mut Criterion) {
    let mut group = c.benchmark_group("rearrange_by_grid");
    group.sample_size(10);

    for &side in &[4, 16] {
        group.bench_with_input(BenchmarkId::new("cells", side * side), &side, |b, &side| {
            let archive = create_archive(368, side, side);

            b.iter(|| {
                let (grid, used) = rearrange(archive.clone(), 2020).unwrap();
                black_box((grid.incomplete_hours(), used))
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_bucket_means,
    benchmark_integrity_checker,
    benchmark_resampling_by_size,
    benchmark_rearrange
);
criterion_main!(benches);
