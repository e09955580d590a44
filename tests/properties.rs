//! Property tests over randomized candle series.

use chartscan::prelude::*;
use chartscan::score::{volume_surge_points, ScoreCard};
use chartscan::{indicators, pivots};
use proptest::prelude::*;

/// Random but well-formed OHLCV series: high >= close >= low, positive
/// prices, non-negative volume, ascending timestamps.
fn candle_series(max_len: usize) -> impl Strategy<Value = Vec<Candle>> {
    prop::collection::vec(
        (10.0f64..1000.0, 0.0f64..5.0, 0.0f64..5.0, 0.0f64..1e6),
        0..max_len,
    )
    .prop_map(|bars| {
        bars.into_iter()
            .enumerate()
            .map(|(i, (close, up, down, volume))| {
                let high = close + up;
                let low = close - down;
                let open = (high + low) / 2.0;
                Candle::new(open, high, low, close, volume, i as i64)
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn pivots_satisfy_their_window(candles in candle_series(120), window in 1usize..5) {
        let pivots = detect_pivots(&candles, window, window);
        for p in &pivots.peaks {
            let i = p.index.get();
            prop_assert!(i >= window && i + window < candles.len());
            prop_assert_eq!(p.price, candles[i].high);
            prop_assert!(candles[i - window..i].iter().all(|c| c.high < p.price));
            prop_assert!(candles[i + 1..=i + window].iter().all(|c| c.high < p.price));
        }
        for v in &pivots.valleys {
            let i = v.index.get();
            prop_assert!(candles[i - window..i].iter().all(|c| c.low > v.price));
            prop_assert!(candles[i + 1..=i + window].iter().all(|c| c.low > v.price));
        }
        // Each list is strictly ascending by offset.
        prop_assert!(pivots.peaks.windows(2).all(|w| w[0].index < w[1].index));
        prop_assert!(pivots.valleys.windows(2).all(|w| w[0].index < w[1].index));
    }

    #[test]
    fn forward_fill_carries_confirmed_pivots(candles in candle_series(80), window in 1usize..4) {
        let filled = pivots::forward_fill(&candles, window, window, PivotKind::Peak);
        prop_assert_eq!(filled.len(), candles.len());
        // Values only ever change to a newly confirmed pivot price; once set
        // they stay set.
        let mut seen = false;
        for v in &filled {
            if seen {
                prop_assert!(v.is_some());
            }
            seen |= v.is_some();
        }
    }

    #[test]
    fn scanner_results_stay_in_bounds(candles in candle_series(150)) {
        let scanner = ScannerBuilder::new().with_all_defaults().build().unwrap();
        let results = scanner.scan(&candles).unwrap();
        for r in &results {
            prop_assert!((0.0..=100.0).contains(&r.reliability));
            prop_assert!(r.significance.is_finite());
            prop_assert!(r.component.start_index <= r.component.end_index);
            prop_assert!(r.component.end_index.get() < candles.len());
            prop_assert!(r.probable_breakout_zone.0 <= r.probable_breakout_zone.1);
            prop_assert_eq!(r.key_dates.len(), r.key_prices.len());
        }
    }

    #[test]
    fn scanning_is_deterministic(candles in candle_series(120)) {
        let scanner = ScannerBuilder::new().with_all_defaults().build().unwrap();
        let first = scanner.scan(&candles).unwrap();
        let second = scanner.scan(&candles).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn score_total_is_clamped(adjustments in prop::collection::vec(-200.0f64..200.0, 0..12)) {
        let mut card = ScoreCard::new();
        for points in &adjustments {
            card.rule("adjustment", true, *points);
        }
        let total = card.total();
        prop_assert!((0.0..=100.0).contains(&total));
    }

    #[test]
    fn scaled_entries_never_exceed_their_cap(value in -50.0f64..50.0, cap in 1.0f64..20.0) {
        let mut card = ScoreCard::with_base(0.0);
        card.scaled("term", value, cap);
        prop_assert!(card.total() <= cap);
        prop_assert!(card.total() >= 0.0);
    }

    #[test]
    fn volume_surge_points_monotone(a in 0.0f64..10.0, b in 0.0f64..10.0) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(volume_surge_points(lo) <= volume_surge_points(hi));
    }

    #[test]
    fn rsi_stays_in_bounds(values in prop::collection::vec(1.0f64..1000.0, 15..80)) {
        for v in indicators::rsi(&values, 14) {
            prop_assert!((0.0..=100.0).contains(&v));
        }
    }

    #[test]
    fn sma_alignment_holds(values in prop::collection::vec(1.0f64..1000.0, 0..60), period in 1usize..20) {
        let out = indicators::sma(&values, period);
        if values.len() >= period {
            prop_assert_eq!(out.len(), values.len() - period + 1);
        } else {
            prop_assert!(out.is_empty());
        }
    }

    #[test]
    fn trend_direction_never_panics(candles in candle_series(100), period in 1usize..30) {
        let _ = determine_trend_direction(&candles, period, 5);
    }

    #[test]
    fn reversal_strength_bounded(small in candle_series(100), large in candle_series(100)) {
        let signal = detect_trend_reversal(&small, &large, "1h", "1d", 10, 20);
        prop_assert!((0.0..=100.0).contains(&signal.reversal_strength));
        if !signal.is_reversal {
            prop_assert!(signal.targets.is_none());
        }
    }
}
