//! Shared finder plumbing: lookback windows, volume characterization,
//! lifecycle status, and result text.

use crate::pivots::PeakValley;
use crate::{Candle, Direction, PatternStatus, PatternType};

/// Bars after a pattern's end inside which it still counts as forming.
pub const FORMING_WINDOW: usize = 3;

/// Bars after a pattern's end inside which a breakout is still expected.
pub const BREAKOUT_WINDOW: usize = 10;

/// Half-width of the probable breakout zone around the trigger level.
pub const ZONE_HALF_WIDTH: f64 = 0.01;

/// Volume ratio that counts as a breakout-confirming surge.
pub const SURGE_RATIO: f64 = 1.5;

/// Right/left segment volume ratio above which the right side counts as
/// expanding; the reciprocal bound marks contraction.
pub const VOLUME_SHIFT_RATIO: f64 = 1.2;

/// Pivots whose index falls inside the trailing `lookback` bars.
pub fn pivots_in_lookback(pivots: &[PeakValley], len: usize, lookback: usize) -> Vec<PeakValley> {
    let start = len.saturating_sub(lookback);
    pivots
        .iter()
        .filter(|p| p.index.get() >= start)
        .copied()
        .collect()
}

/// Mean volume over `candles[start..end]`; 0.0 for an empty range.
pub fn avg_volume(candles: &[Candle], start: usize, end: usize) -> f64 {
    let end = end.min(candles.len());
    if start >= end {
        return 0.0;
    }
    let slice = &candles[start..end];
    slice.iter().map(|c| c.volume).sum::<f64>() / slice.len() as f64
}

/// Categorize the volume behavior through `[start, end]` plus the latest
/// bar's surge relative to the formation average.
pub fn volume_pattern_label(candles: &[Candle], start: usize, end: usize) -> String {
    let end = end.min(candles.len().saturating_sub(1));
    if start >= end {
        return "insufficient volume data".to_string();
    }
    let mid = start + (end - start) / 2;
    let left = avg_volume(candles, start, mid + 1);
    let right = avg_volume(candles, mid + 1, end + 1);

    let mut label = if left <= f64::EPSILON {
        "insufficient volume data".to_string()
    } else {
        let ratio = right / left;
        if ratio >= VOLUME_SHIFT_RATIO {
            format!("expanding into the right side ({:.0}% heavier)", (ratio - 1.0) * 100.0)
        } else if ratio <= 1.0 / VOLUME_SHIFT_RATIO {
            "contracting into the right side".to_string()
        } else {
            "balanced".to_string()
        }
    };

    let formation_avg = avg_volume(candles, start, end + 1);
    if formation_avg > f64::EPSILON {
        if let Some(last) = candles.last() {
            let surge = last.volume / formation_avg;
            if surge >= SURGE_RATIO {
                label.push_str(&format!(", latest bar {surge:.1}x formation average"));
            }
        }
    }
    label
}

/// Generic lifecycle resolution against a trigger level.
///
/// Confirmed when the latest close is beyond the trigger in the breakout
/// direction; otherwise Forming while the pattern's end is within
/// [`FORMING_WINDOW`] bars of the series end, else Completed. Families with
/// a Failed state layer it on top of this.
pub fn resolve_status(
    candles: &[Candle],
    end_index: usize,
    trigger: f64,
    direction: Direction,
) -> PatternStatus {
    let last_close = match candles.last() {
        Some(c) => c.close,
        None => return PatternStatus::Forming,
    };
    let broke_out = match direction {
        Direction::Bullish => last_close > trigger,
        Direction::Bearish => last_close < trigger,
    };
    if broke_out {
        PatternStatus::Confirmed
    } else if candles.len().saturating_sub(1) <= end_index + FORMING_WINDOW {
        PatternStatus::Forming
    } else {
        PatternStatus::Completed
    }
}

/// Whether a breakout is still plausibly ahead for an unconfirmed pattern.
pub fn breakout_expected(candles: &[Candle], end_index: usize, status: PatternStatus) -> bool {
    status != PatternStatus::Confirmed
        && status != PatternStatus::Failed
        && candles.len().saturating_sub(1) <= end_index + BREAKOUT_WINDOW
}

/// Price band around the trigger inside which the breakout likely resolves.
/// The half-width scales with the trigger's magnitude so the bounds stay
/// ordered even for extrapolated levels below zero.
#[inline]
pub fn breakout_zone(trigger: f64) -> (f64, f64) {
    let half = trigger.abs() * ZONE_HALF_WIDTH;
    (trigger - half, trigger + half)
}

/// Value of the line through `(x1, y1)` and `(x2, y2)` at `x`. Falls back to
/// `y1` when the anchors share an x.
#[inline]
pub fn line_value(x1: f64, y1: f64, x2: f64, y2: f64, x: f64) -> f64 {
    let dx = x2 - x1;
    if dx.abs() <= f64::EPSILON {
        return y1;
    }
    y1 + (y2 - y1) / dx * (x - x1)
}

/// Significance: reliability scaled by relative amplitude and a per-family
/// factor. Guarded against non-positive reference prices.
pub fn significance(reliability: f64, height: f64, reference_price: f64, scaling: f64) -> f64 {
    if reference_price <= f64::EPSILON {
        return 0.0;
    }
    reliability * (height / reference_price) * scaling
}

/// Human-readable summary of a detection.
pub fn describe(pattern_type: PatternType, status: PatternStatus, target: f64) -> String {
    let stage = match status {
        PatternStatus::Forming => "forming",
        PatternStatus::Completed => "completed, awaiting breakout",
        PatternStatus::Confirmed => "confirmed by breakout",
        PatternStatus::Failed => "failed after confirmation",
    };
    format!(
        "{} ({}), projected target {:.2}",
        pattern_type.name(),
        stage,
        target
    )
}

/// One-line action hint for a detection.
pub fn trading_implication(direction: Direction, trigger: f64, target: f64, stop: f64) -> String {
    match direction {
        Direction::Bullish => format!(
            "bullish bias above {trigger:.2}; target {target:.2}, stop {stop:.2}"
        ),
        Direction::Bearish => format!(
            "bearish bias below {trigger:.2}; target {target:.2}, stop {stop:.2}"
        ),
    }
}

/// Key dates and prices extracted from pivots, chronological order.
pub fn key_series(points: &[PeakValley]) -> (Vec<i64>, Vec<f64>) {
    (
        points.iter().map(|p| p.timestamp).collect(),
        points.iter().map(|p| p.price).collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pivots::PivotKind;
    use crate::BarIndex;

    fn flat(n: usize, close: f64) -> Vec<Candle> {
        (0..n)
            .map(|i| Candle::new(close, close + 1.0, close - 1.0, close, 1000.0, i as i64))
            .collect()
    }

    #[test]
    fn test_pivots_in_lookback() {
        let points: Vec<PeakValley> = [5usize, 40, 80]
            .iter()
            .map(|&i| PeakValley {
                index: BarIndex(i),
                kind: PivotKind::Peak,
                price: 100.0,
                timestamp: i as i64,
            })
            .collect();
        let recent = pivots_in_lookback(&points, 100, 30);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].index, BarIndex(80));
        // Lookback larger than the series keeps everything.
        assert_eq!(pivots_in_lookback(&points, 100, 500).len(), 3);
    }

    #[test]
    fn test_avg_volume_guards() {
        let candles = flat(5, 100.0);
        assert_eq!(avg_volume(&candles, 0, 5), 1000.0);
        assert_eq!(avg_volume(&candles, 3, 3), 0.0);
        assert_eq!(avg_volume(&candles, 4, 2), 0.0);
        assert_eq!(avg_volume(&[], 0, 5), 0.0);
    }

    #[test]
    fn test_status_resolution() {
        // Bearish trigger at 90, close at 85: confirmed.
        let mut candles = flat(30, 95.0);
        candles.last_mut().unwrap().close = 85.0;
        assert_eq!(
            resolve_status(&candles, 10, 90.0, Direction::Bearish),
            PatternStatus::Confirmed
        );

        // No breakout, pattern ends long ago: completed.
        let candles = flat(30, 95.0);
        assert_eq!(
            resolve_status(&candles, 10, 90.0, Direction::Bearish),
            PatternStatus::Completed
        );

        // No breakout, pattern ends at the edge: forming.
        assert_eq!(
            resolve_status(&candles, 28, 90.0, Direction::Bearish),
            PatternStatus::Forming
        );

        assert_eq!(
            resolve_status(&[], 0, 90.0, Direction::Bearish),
            PatternStatus::Forming
        );
    }

    #[test]
    fn test_breakout_zone_brackets_trigger() {
        let (lo, hi) = breakout_zone(90.0);
        assert!(lo < 90.0 && 90.0 < hi);
        assert!((lo - 89.1).abs() < 1e-9);
        assert!((hi - 90.9).abs() < 1e-9);
    }

    #[test]
    fn test_line_value() {
        assert_eq!(line_value(0.0, 10.0, 10.0, 20.0, 5.0), 15.0);
        // Degenerate anchors fall back to the first y.
        assert_eq!(line_value(3.0, 7.0, 3.0, 99.0, 8.0), 7.0);
    }

    #[test]
    fn test_significance_guard() {
        assert_eq!(significance(70.0, 10.0, 0.0, 1.0), 0.0);
        let s = significance(70.0, 10.0, 100.0, 0.8);
        assert!((s - 5.6).abs() < 1e-9);
    }

    #[test]
    fn test_volume_label_shift() {
        let mut candles = flat(20, 100.0);
        for c in candles.iter_mut().skip(10) {
            c.volume = 2000.0;
        }
        let label = volume_pattern_label(&candles, 0, 19);
        assert!(label.contains("expanding"), "{label}");

        let candles = flat(20, 100.0);
        assert!(volume_pattern_label(&candles, 0, 19).contains("balanced"));
    }
}
