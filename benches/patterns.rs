use chartscan::prelude::*;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

/// Deterministic pseudo-random walk with occasional volume spikes.
fn synthetic_series(n: usize) -> Vec<Candle> {
    let mut price = 100.0;
    (0..n)
        .map(|i| {
            let step = ((i * 7 + 13) % 100) as f64 / 50.0 - 1.0;
            price = (price + step).max(1.0);
            let spread = ((i * 11 + 3) % 10) as f64 / 10.0 + 0.1;
            let volume = if i % 37 == 0 { 5000.0 } else { 1000.0 + ((i * 17) % 500) as f64 };
            let close = (price + step / 2.0).clamp(price - spread, price + spread);
            Candle::new(price, price + spread, price - spread, close, volume, i as i64)
        })
        .collect()
}

fn bench_full_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan");
    for n in [250usize, 1000, 5000] {
        let candles = synthetic_series(n);
        let scanner = ScannerBuilder::new().with_all_defaults().build().unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(n), &candles, |b, candles| {
            b.iter(|| scanner.scan(black_box(candles)).unwrap());
        });
    }
    group.finish();
}

fn bench_pivots(c: &mut Criterion) {
    let candles = synthetic_series(5000);
    c.bench_function("detect_pivots_5000", |b| {
        b.iter(|| detect_pivots(black_box(&candles), 3, 3));
    });
}

fn bench_single_finders(c: &mut Criterion) {
    let candles = synthetic_series(1000);
    let mut group = c.benchmark_group("finder");

    let double = DoubleTopFinder::default();
    group.bench_function("double_top", |b| {
        b.iter(|| double.find(black_box(&candles)));
    });

    let cup = CupHandleFinder::default();
    group.bench_function("cup_and_handle", |b| {
        b.iter(|| cup.find(black_box(&candles)));
    });

    let climax = BuyingClimaxFinder::default();
    group.bench_function("buying_climax", |b| {
        b.iter(|| climax.find(black_box(&candles)));
    });

    group.finish();
}

fn bench_reversal(c: &mut Criterion) {
    let small = synthetic_series(500);
    let large = synthetic_series(500);
    c.bench_function("detect_trend_reversal", |b| {
        b.iter(|| detect_trend_reversal(black_box(&small), black_box(&large), "1h", "1d", 10, 20));
    });
}

fn bench_parallel_scan(c: &mut Criterion) {
    let series: Vec<Vec<Candle>> = (0..16).map(|_| synthetic_series(500)).collect();
    let labels: Vec<String> = (0..16).map(|i| format!("SYM{i}")).collect();
    let scanner = ScannerBuilder::new().with_all_defaults().build().unwrap();

    c.bench_function("scan_parallel_16x500", |b| {
        b.iter(|| {
            let instruments: Vec<(&str, &[Candle])> = labels
                .iter()
                .map(String::as_str)
                .zip(series.iter().map(Vec::as_slice))
                .collect();
            scan_parallel(black_box(&scanner), instruments)
        });
    });
}

criterion_group!(
    benches,
    bench_full_scan,
    bench_pivots,
    bench_single_finders,
    bench_reversal,
    bench_parallel_scan
);
criterion_main!(benches);
