//! Integration tests exercising the public scanning surface end to end.

use chartscan::prelude::*;

/// Bars where open, high, low and close all sit on the given value, so pivot
/// prices land exactly on the inputs.
fn line_bars(values: &[f64]) -> Vec<Candle> {
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| Candle::new(v, v, v, v, 1000.0, i as i64))
        .collect()
}

fn flat_bars(n: usize, close: f64) -> Vec<Candle> {
    (0..n)
        .map(|i| Candle::new(close, close + 0.5, close - 0.5, close, 1000.0, i as i64))
        .collect()
}

// ============================================================
// EMPTY-DATA CONTRACT
// ============================================================

#[test]
fn empty_series_yields_no_results_anywhere() {
    let scanner = ScannerBuilder::new().with_all_defaults().build().unwrap();
    assert!(scanner.scan(&[]).unwrap().is_empty());

    assert!(detect_pivots(&[], 5, 5).is_empty());
    assert_eq!(determine_trend_direction(&[], 20, 5), TrendDirection::Flat);

    let signal = detect_trend_reversal(&[], &[], "1h", "1d", 10, 20);
    assert!(!signal.is_reversal);
}

#[test]
fn flat_series_yields_no_patterns_and_flat_trend() {
    let candles = flat_bars(120, 100.0);
    let scanner = ScannerBuilder::new().with_all_defaults().build().unwrap();
    assert!(scanner.scan(&candles).unwrap().is_empty());
    assert_eq!(determine_trend_direction(&candles, 20, 5), TrendDirection::Flat);
}

// ============================================================
// PIVOTS
// ============================================================

#[test]
fn pivot_window_is_strict_and_boundary_excluded() {
    let values = [10.0, 11.0, 15.0, 11.0, 10.0, 9.0, 8.0, 12.0];
    let candles = line_bars(&values);
    let pivots = detect_pivots(&candles, 2, 2);

    assert_eq!(pivots.peaks.len(), 1);
    assert_eq!(pivots.peaks[0].index.get(), 2);
    assert_eq!(pivots.peaks[0].price, 15.0);
    // Valley at offset 6 would need two confirming bars on the right.
    assert_eq!(pivots.valleys.len(), 0);

    // Every reported pivot satisfies the window property.
    for p in &pivots.peaks {
        let i = p.index.get();
        assert!(candles[i - 2..i].iter().all(|c| c.high < p.price));
        assert!(candles[i + 1..=i + 2].iter().all(|c| c.high < p.price));
    }
}

#[test]
fn pivot_detection_is_idempotent() {
    let values: Vec<f64> = (0..80)
        .map(|i| 100.0 + (i as f64 * 0.7).sin() * 10.0)
        .collect();
    let candles = line_bars(&values);
    assert_eq!(detect_pivots(&candles, 3, 3), detect_pivots(&candles, 3, 3));
}

// ============================================================
// DOUBLE TOP GEOMETRY
// ============================================================

/// Peaks at exactly 105 and 103, valley at exactly 90, then a breakdown.
fn textbook_double_top() -> Vec<Candle> {
    let mut v = Vec::new();
    v.extend((0..=10).map(|i| 95.0 + i as f64)); // ramp to 105 at index 10
    v.extend([102.0, 99.0, 96.0, 93.0, 90.0]); // valley 90 at index 15
    v.extend([93.0, 96.0, 99.0, 101.0, 103.0]); // second peak at index 20
    v.extend([100.0, 97.0, 94.0, 91.0, 88.0, 85.0]); // breakdown
    line_bars(&v)
}

#[test]
fn double_top_breakout_projects_height_below_neckline() {
    let candles = textbook_double_top();
    let pivots = detect_pivots(&candles, 3, 3);
    let results = find_double_tops(&candles, &pivots, 90);
    assert_eq!(results.len(), 1);

    let r = &results[0];
    assert_eq!(r.pattern_type, PatternType::DoubleTop);
    assert_eq!(r.status, PatternStatus::Confirmed);
    assert_eq!(r.component.start_index.get(), 10);
    assert_eq!(r.component.end_index.get(), 20);
    // Neckline at the intervening valley, height from the peak average.
    assert!((r.component.breakout_level - 90.0).abs() < 1e-9);
    assert!((r.component.pattern_height - 14.0).abs() < 1e-9);
    assert!((r.price_target - 76.0).abs() < 1e-9);
    assert!((0.0..=100.0).contains(&r.reliability));
    assert!(r.significance > 0.0);
    // Key points are the two peaks, chronological.
    assert_eq!(r.key_prices, vec![105.0, 103.0]);
    assert!(r.key_dates[0] < r.key_dates[1]);
    // Breakout zone brackets the neckline.
    assert!(r.probable_breakout_zone.0 < 90.0 && 90.0 < r.probable_breakout_zone.1);
}

#[test]
fn double_top_results_are_deterministic() {
    let candles = textbook_double_top();
    let finder = DoubleTopFinder::default();
    assert_eq!(finder.find(&candles), finder.find(&candles));
}

// ============================================================
// SCANNER AGGREGATION
// ============================================================

#[test]
fn scanner_reports_double_top_through_the_engine() {
    let candles = textbook_double_top();
    let scanner = ScannerBuilder::new()
        .with_all_defaults()
        .only_patterns([PatternType::DoubleTop])
        .build()
        .unwrap();
    let results = scanner.scan(&candles).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].pattern_type, PatternType::DoubleTop);
}

#[test]
fn min_reliability_filters_results() {
    let candles = textbook_double_top();
    let permissive = ScannerBuilder::new()
        .with_all_defaults()
        .min_reliability(0.0)
        .build()
        .unwrap();
    let strict = ScannerBuilder::new()
        .with_all_defaults()
        .min_reliability(100.0)
        .build()
        .unwrap();
    let all = permissive.scan(&candles).unwrap();
    let top = strict.scan(&candles).unwrap();
    assert!(top.len() <= all.len());
    assert!(top.iter().all(|r| r.reliability >= 100.0));
}

#[test]
fn validation_rejects_corrupt_bars_when_enabled() {
    let mut candles = flat_bars(30, 100.0);
    candles[7].high = 10.0; // high below low

    let strict = ScannerBuilder::new()
        .with_all_defaults()
        .validate_data(true)
        .build()
        .unwrap();
    assert!(strict.scan(&candles).is_err());

    let lenient = ScannerBuilder::new().with_all_defaults().build().unwrap();
    assert!(lenient.scan(&candles).is_ok());
}

#[test]
fn scan_timeframes_labels_each_series() {
    let daily = textbook_double_top();
    let hourly = flat_bars(50, 100.0);
    let scanner = ScannerBuilder::new().with_all_defaults().build().unwrap();

    let scans = scanner
        .scan_timeframes(&[("1d", &daily), ("1h", &hourly)])
        .unwrap();
    assert_eq!(scans.len(), 2);
    assert_eq!(scans[0].timeframe, "1d");
    assert_eq!(scans[1].timeframe, "1h");
    assert!(scans[1].patterns.is_empty());
}

#[test]
fn parallel_scan_collects_per_symbol() {
    let a = textbook_double_top();
    let b = flat_bars(50, 100.0);
    let scanner = ScannerBuilder::new().with_all_defaults().build().unwrap();

    let instruments: Vec<(&str, &[Candle])> = vec![("AAA", &a), ("BBB", &b)];
    let (results, errors) = scan_parallel(&scanner, instruments);
    assert!(errors.is_empty());
    assert_eq!(results.len(), 2);
    let aaa = results.iter().find(|r| r.symbol == "AAA").unwrap();
    assert!(!aaa.patterns.is_empty());
}

// ============================================================
// WEDGE LIFECYCLE
// ============================================================

fn rising_wedge_bars(n: usize) -> Vec<Candle> {
    let values: Vec<f64> = (0..n)
        .map(|i| {
            let t = i % 8;
            let frac = if t <= 4 {
                t as f64 / 4.0
            } else {
                (8 - t) as f64 / 4.0
            };
            let lower = 90.0 + 0.4 * i as f64;
            let upper = 100.0 + 0.2 * i as f64;
            lower + (upper - lower) * frac
        })
        .collect();
    line_bars(&values)
}

#[test]
fn wedge_breakout_then_reentry_is_dropped_not_failed() {
    let base = rising_wedge_bars(40);
    assert_eq!(RisingWedgeFinder::default().find(&base).len(), 1);

    // Break below support, then close straight back inside.
    let mut reentered = base.clone();
    reentered.push(Candle::new(104.0, 104.0, 104.0, 104.0, 1000.0, 40));
    reentered.push(Candle::new(110.0, 110.0, 110.0, 110.0, 1000.0, 41));
    let results = RisingWedgeFinder::default().find(&reentered);
    assert!(results.is_empty(), "expected drop, got {results:?}");
}

// ============================================================
// TREND AND REVERSAL
// ============================================================

#[test]
fn trend_direction_tracks_slope_sign() {
    let up = line_bars(&(0..60).map(|i| 100.0 + i as f64).collect::<Vec<_>>());
    let down = line_bars(&(0..60).map(|i| 200.0 - i as f64).collect::<Vec<_>>());
    assert_eq!(determine_trend_direction(&up, 20, 5), TrendDirection::Up);
    assert_eq!(determine_trend_direction(&down, 20, 5), TrendDirection::Down);
    assert_eq!(determine_trend_direction(&up[..5], 20, 5), TrendDirection::Flat);
}

#[test]
fn reversal_requires_alignment_with_large_trend() {
    // Small: pullback then recovery. Large: steady uptrend.
    let mut v: Vec<f64> = (0..20).map(|i| 100.0 + i as f64 * 0.5).collect();
    for i in 0..10 {
        v.push(109.5 - i as f64 * 0.45);
    }
    for i in 0..10 {
        v.push(105.5 + i as f64 * 0.55);
    }
    let small = line_bars(&v);
    let large_up = line_bars(&(0..80).map(|i| 100.0 + i as f64).collect::<Vec<_>>());
    let large_down = line_bars(&(0..80).map(|i| 200.0 - i as f64).collect::<Vec<_>>());

    let aligned = detect_trend_reversal(&small, &large_up, "1h", "1d", 10, 20);
    assert!(aligned.is_reversal);
    assert_eq!(aligned.direction, TrendDirection::Up);
    assert!(aligned.reversal_strength > 0.0 && aligned.reversal_strength <= 100.0);
    assert!(aligned.stop_loss < aligned.entry_price);
    assert!(aligned.targets.is_some());

    // Same small series against a falling large timeframe: the recovery
    // runs against the trend, so no reversal.
    let counter = detect_trend_reversal(&small, &large_down, "1h", "1d", 10, 20);
    assert!(!counter.is_reversal);
    assert_eq!(counter.direction, TrendDirection::Down);
}

#[test]
fn measured_move_fallback_realizes_exact_risk_multiples() {
    let t = calculate_measured_move_targets(&[], 10, TrendDirection::Up, 100.0, 90.0);
    assert_eq!(t.target1, 110.0);
    assert_eq!(t.target2, 120.0);
    assert_eq!(t.target3, 130.0);
    assert_eq!(t.risk_reward_ratio1, 1.0);
    assert_eq!(t.risk_reward_ratio2, 2.0);
    assert_eq!(t.risk_reward_ratio3, 3.0);
}

// ============================================================
// RESULT INVARIANTS ACROSS FAMILIES
// ============================================================

#[test]
fn every_result_respects_shared_invariants() {
    // A busy series: trend, dome, spikes - enough to trip several finders.
    let mut candles: Vec<Candle> = (0..150)
        .map(|i| {
            let base = 100.0 + (i as f64 * 0.21).sin() * 9.0 + i as f64 * 0.05;
            let vol = 1000.0 + ((i * 13 + 7) % 50) as f64 * 10.0;
            Candle::new(base, base + 0.8, base - 0.8, base + 0.2, vol, i as i64)
        })
        .collect();
    // One blowoff bar near the end.
    candles.push(Candle::new(109.0, 116.0, 109.0, 115.0, 9000.0, 150));

    let scanner = ScannerBuilder::new().with_all_defaults().build().unwrap();
    let results = scanner.scan(&candles).unwrap();

    for r in &results {
        assert!((0.0..=100.0).contains(&r.reliability), "{r:?}");
        assert!(r.reliability.is_finite() && r.significance.is_finite());
        assert!(r.price_target.is_finite() && r.stop_loss.is_finite());
        assert!(r.component.start_index <= r.component.end_index);
        assert!(r.component.end_index.get() < candles.len());
        assert!(r
            .component
            .key_points
            .windows(2)
            .all(|w| w[0].index <= w[1].index));
        assert_eq!(r.key_dates.len(), r.key_prices.len());
        assert_eq!(r.breakout_direction, r.pattern_type.typical_direction());
    }
}
