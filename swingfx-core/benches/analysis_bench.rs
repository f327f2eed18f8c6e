//! Criterion benchmarks for the per-tick analysis path.
//!
//! Benchmarks:
//! 1. Candle normalization (raw bars → CandleSeries)
//! 2. Indicator engine (all configured series)
//! 3. Swing detection
//! 4. Full MarketAnalysis pipeline + trend classification

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use chrono::{Duration, TimeZone, Utc};
use swingfx_core::analysis::{MarketAnalysis, SwingDetector, TrendClassifier};
use swingfx_core::data::{CandleSeries, SeriesOptions};
use swingfx_core::domain::RawBar;
use swingfx_core::indicators::{IndicatorEngine, IndicatorSettings};

// ── Helpers ──────────────────────────────────────────────────────────

fn make_raw_bars(n: usize) -> Vec<RawBar> {
    let base = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    (0..n)
        .map(|i| {
            let t = i as f64;
            let close = 1.10 + (t * 0.07).sin() * 0.02 + (t * 0.31).sin() * 0.004;
            let open = 1.10 + ((t - 1.0) * 0.07).sin() * 0.02 + ((t - 1.0) * 0.31).sin() * 0.004;
            RawBar {
                timestamp: base + Duration::minutes(5 * i as i64),
                open,
                high: open.max(close) + 0.0006,
                low: open.min(close) - 0.0006,
                close,
            }
        })
        .collect()
}

const SIZES: [usize; 3] = [100, 500, 2000];

// ── 1. Normalization ─────────────────────────────────────────────────

fn bench_series(c: &mut Criterion) {
    let mut group = c.benchmark_group("candle_series");
    for &n in &SIZES {
        let bars = make_raw_bars(n);
        group.bench_with_input(BenchmarkId::new("from_raw", n), &bars, |b, bars| {
            b.iter(|| CandleSeries::from_raw(black_box(bars), SeriesOptions::default()))
        });
    }
    group.finish();
}

// ── 2. Indicators ────────────────────────────────────────────────────

fn bench_indicators(c: &mut Criterion) {
    let mut group = c.benchmark_group("indicator_engine");
    let settings = IndicatorSettings::default();
    for &n in &SIZES {
        let series = CandleSeries::from_raw(&make_raw_bars(n), SeriesOptions::default()).unwrap();
        group.bench_with_input(BenchmarkId::new("compute", n), &series, |b, series| {
            b.iter(|| IndicatorEngine::compute(black_box(series), &settings))
        });
    }
    group.finish();
}

// ── 3. Swings ────────────────────────────────────────────────────────

fn bench_swings(c: &mut Criterion) {
    let mut group = c.benchmark_group("swing_detector");
    for &n in &SIZES {
        let series = CandleSeries::from_raw(&make_raw_bars(n), SeriesOptions::default()).unwrap();
        group.bench_with_input(BenchmarkId::new("detect", n), &series, |b, series| {
            b.iter(|| SwingDetector::detect(black_box(series.candles())))
        });
    }
    group.finish();
}

// ── 4. Full pipeline ─────────────────────────────────────────────────

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("market_analysis");
    let settings = IndicatorSettings::default();
    for &n in &SIZES {
        let series = CandleSeries::from_raw(&make_raw_bars(n), SeriesOptions::default()).unwrap();
        group.bench_with_input(BenchmarkId::new("run_and_classify", n), &series, |b, series| {
            b.iter(|| {
                let analysis = MarketAnalysis::run(black_box(series.clone()), &settings);
                TrendClassifier::evaluate(&analysis, &analysis)
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_series,
    bench_indicators,
    bench_swings,
    bench_pipeline,
);
criterion_main!(benches);
