//! Double top / double bottom detection.
//!
//! Two peaks (tops) or valleys (bottoms) of near-equal price separated by a
//! retracement pivot. The retracement level is the neckline; its breach in
//! the pattern direction confirms. A confirmed pattern whose price has since
//! re-entered the formation is dropped from the results entirely rather than
//! reported as failed.

use crate::finders::helpers::{
    breakout_expected, breakout_zone, describe, key_series, pivots_in_lookback, resolve_status,
    trading_implication, volume_pattern_label,
};
use crate::finders::PatternFinder;
use crate::pivots::{detect_pivots, PeakValley, Pivots};
use crate::score::{volume_surge_points, ScoreCard};
use crate::{
    Candle, Direction, PatternAnalysisResult, PatternComponent, PatternError, PatternStatus,
    PatternType, Period, Ratio, Result,
};

/// Significance decay rate per bar since the second extreme.
const RECENCY_DECAY: f64 = 0.03;

/// Points granted for perfectly matched extremes, linearly reduced as the
/// price difference approaches the tolerance.
const SYMMETRY_POINTS: f64 = 15.0;

/// Points for an observed breakout.
const BREAKOUT_POINTS: f64 = 15.0;

/// Points when the second extreme prints on lighter volume than the first.
const FADING_VOLUME_POINTS: f64 = 10.0;

#[derive(Debug, Clone)]
pub struct DoubleTopFinder {
    /// Trailing bars searched for the formation.
    pub lookback: Period,
    /// Pivot confirmation bars on each side.
    pub pivot_window: Period,
    /// Max relative price difference between the two extremes.
    pub tolerance: Ratio,
    /// Min bars between the two extremes.
    pub min_separation: Period,
}

impl Default for DoubleTopFinder {
    fn default() -> Self {
        Self {
            lookback: Period::new_const(90),
            pivot_window: Period::new_const(3),
            tolerance: Ratio::new_const(0.05),
            min_separation: Period::new_const(5),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DoubleBottomFinder {
    pub lookback: Period,
    pub pivot_window: Period,
    pub tolerance: Ratio,
    pub min_separation: Period,
}

impl Default for DoubleBottomFinder {
    fn default() -> Self {
        let base = DoubleTopFinder::default();
        Self {
            lookback: base.lookback,
            pivot_window: base.pivot_window,
            tolerance: base.tolerance,
            min_separation: base.min_separation,
        }
    }
}

impl PatternFinder for DoubleTopFinder {
    fn name(&self) -> &'static str {
        "double_top"
    }

    fn pattern_type(&self) -> PatternType {
        PatternType::DoubleTop
    }

    fn find(&self, candles: &[Candle]) -> Vec<PatternAnalysisResult> {
        let w = self.pivot_window.get();
        let pivots = detect_pivots(candles, w, w);
        find_double_tops_impl(
            candles,
            &pivots,
            self.lookback.get(),
            self.tolerance.get(),
            self.min_separation.get(),
        )
    }

    fn validate_config(&self) -> Result<()> {
        validate_double_config(self.lookback, self.min_separation, self.pivot_window)
    }
}

impl PatternFinder for DoubleBottomFinder {
    fn name(&self) -> &'static str {
        "double_bottom"
    }

    fn pattern_type(&self) -> PatternType {
        PatternType::DoubleBottom
    }

    fn find(&self, candles: &[Candle]) -> Vec<PatternAnalysisResult> {
        let w = self.pivot_window.get();
        let pivots = detect_pivots(candles, w, w);
        find_double_bottoms_impl(
            candles,
            &pivots,
            self.lookback.get(),
            self.tolerance.get(),
            self.min_separation.get(),
        )
    }

    fn validate_config(&self) -> Result<()> {
        validate_double_config(self.lookback, self.min_separation, self.pivot_window)
    }
}

fn validate_double_config(
    lookback: Period,
    min_separation: Period,
    pivot_window: Period,
) -> Result<()> {
    if min_separation.get() + 2 * pivot_window.get() >= lookback.get() {
        return Err(PatternError::InvalidConfig(format!(
            "lookback {} too small for separation {} with pivot window {}",
            lookback.get(),
            min_separation.get(),
            pivot_window.get()
        )));
    }
    Ok(())
}

/// Find double tops using precomputed pivots.
pub fn find_double_tops(
    candles: &[Candle],
    pivots: &Pivots,
    lookback: usize,
) -> Vec<PatternAnalysisResult> {
    let d = DoubleTopFinder::default();
    find_double_tops_impl(
        candles,
        pivots,
        lookback,
        d.tolerance.get(),
        d.min_separation.get(),
    )
}

/// Find double bottoms using precomputed pivots.
pub fn find_double_bottoms(
    candles: &[Candle],
    pivots: &Pivots,
    lookback: usize,
) -> Vec<PatternAnalysisResult> {
    let d = DoubleBottomFinder::default();
    find_double_bottoms_impl(
        candles,
        pivots,
        lookback,
        d.tolerance.get(),
        d.min_separation.get(),
    )
}

fn find_double_tops_impl(
    candles: &[Candle],
    pivots: &Pivots,
    lookback: usize,
    tolerance: f64,
    min_separation: usize,
) -> Vec<PatternAnalysisResult> {
    find_double_extremes(
        candles,
        &pivots_in_lookback(&pivots.peaks, candles.len(), lookback),
        &pivots.valleys,
        tolerance,
        min_separation,
        Direction::Bearish,
    )
}

fn find_double_bottoms_impl(
    candles: &[Candle],
    pivots: &Pivots,
    lookback: usize,
    tolerance: f64,
    min_separation: usize,
) -> Vec<PatternAnalysisResult> {
    find_double_extremes(
        candles,
        &pivots_in_lookback(&pivots.valleys, candles.len(), lookback),
        &pivots.peaks,
        tolerance,
        min_separation,
        Direction::Bullish,
    )
}

/// Shared geometry for both orientations. `extremes` are the candidate
/// pattern pivots, `counters` hold the intervening retracement pivots.
fn find_double_extremes(
    candles: &[Candle],
    extremes: &[PeakValley],
    counters: &[PeakValley],
    tolerance: f64,
    min_separation: usize,
    direction: Direction,
) -> Vec<PatternAnalysisResult> {
    if candles.is_empty() || extremes.len() < 2 {
        return Vec::new();
    }
    let pattern_type = match direction {
        Direction::Bearish => PatternType::DoubleTop,
        Direction::Bullish => PatternType::DoubleBottom,
    };
    let last_index = candles.len() - 1;
    let last_close = candles[last_index].close;

    let mut results = Vec::new();
    for pair in extremes.windows(2) {
        let (first, second) = (pair[0], pair[1]);
        if second.index.get() - first.index.get() < min_separation {
            continue;
        }
        let higher = first.price.max(second.price);
        if higher <= f64::EPSILON {
            continue;
        }
        let diff_ratio = (first.price - second.price).abs() / higher;
        if diff_ratio > tolerance {
            continue;
        }

        // Deepest retracement pivot strictly between the extremes.
        let neckline = counters
            .iter()
            .filter(|c| c.index > first.index && c.index < second.index)
            .map(|c| c.price)
            .fold(None, |acc: Option<f64>, p| match direction {
                Direction::Bearish => Some(acc.map_or(p, |a| a.min(p))),
                Direction::Bullish => Some(acc.map_or(p, |a| a.max(p))),
            });
        let Some(neckline) = neckline else { continue };

        let avg_extreme = (first.price + second.price) / 2.0;
        let height = match direction {
            Direction::Bearish => avg_extreme - neckline,
            Direction::Bullish => neckline - avg_extreme,
        };
        if height <= f64::EPSILON {
            continue;
        }

        let status = resolve_status(candles, second.index.get(), neckline, direction);

        // Re-entry after a breakout kills the pattern: it was confirmed at
        // some point but price is back inside the formation now.
        if status != PatternStatus::Confirmed {
            let broke_earlier = candles[second.index.get()..].iter().any(|c| match direction {
                Direction::Bearish => c.close < neckline,
                Direction::Bullish => c.close > neckline,
            });
            if broke_earlier {
                continue;
            }
        }

        let bars_since = (last_index - second.index.get()) as f64;
        let pattern_avg_vol = {
            let slice = &candles[first.index.get()..=second.index.get()];
            slice.iter().map(|c| c.volume).sum::<f64>() / slice.len() as f64
        };
        let second_vol = candles[second.index.get()].volume;
        let last_vol = candles[last_index].volume;

        let mut card = ScoreCard::new();
        card.scaled(
            "extreme symmetry",
            (1.0 - diff_ratio / tolerance) * SYMMETRY_POINTS,
            SYMMETRY_POINTS,
        )
        .rule(
            "second extreme on fading volume",
            second_vol < candles[first.index.get()].volume,
            FADING_VOLUME_POINTS,
        )
        .rule(
            "breakout observed",
            status == PatternStatus::Confirmed,
            BREAKOUT_POINTS,
        );
        if status == PatternStatus::Confirmed && pattern_avg_vol > f64::EPSILON {
            card.rule(
                "breakout volume surge",
                true,
                volume_surge_points(last_vol / pattern_avg_vol),
            );
        }
        let reliability = card.total();

        let target = match direction {
            Direction::Bearish => neckline - height,
            Direction::Bullish => neckline + height,
        };
        // Stop at the far extreme of the pair itself.
        let stop = match direction {
            Direction::Bearish => higher,
            Direction::Bullish => first.price.min(second.price),
        };

        let key_points = vec![first, second];
        let (key_dates, key_prices) = key_series(&key_points);
        let recency = (-RECENCY_DECAY * bars_since).exp();
        let significance = if last_close > f64::EPSILON {
            reliability * (height / last_close) * recency
        } else {
            0.0
        };

        results.push(PatternAnalysisResult {
            pattern_type,
            status,
            direction,
            reliability,
            significance,
            component: PatternComponent {
                start_index: first.index,
                end_index: second.index,
                key_points,
                pattern_height: height,
                breakout_level: neckline,
                volume_pattern: volume_pattern_label(
                    candles,
                    first.index.get(),
                    second.index.get(),
                ),
            },
            price_target: target,
            stop_loss: stop,
            breakout_expected: breakout_expected(candles, second.index.get(), status),
            breakout_direction: direction,
            probable_breakout_zone: breakout_zone(neckline),
            description: describe(pattern_type, status, target),
            trading_implication: trading_implication(direction, neckline, target, stop),
            key_dates,
            key_prices,
        });
    }
    results
}

// ============================================================
// PARAMETERIZATION
// ============================================================

use crate::params::{get_period, get_ratio, ParamMeta, ParameterizedFinder};
use std::collections::HashMap;

static DOUBLE_PARAMS: &[ParamMeta] = &[
    ParamMeta::period("lookback", 90.0, (30.0, 200.0, 10.0), "Trailing bars searched"),
    ParamMeta::period("pivot_window", 3.0, (2.0, 6.0, 1.0), "Pivot confirmation bars per side"),
    ParamMeta::ratio("tolerance", 0.05, (0.01, 0.10, 0.01), "Max relative gap between extremes"),
    ParamMeta::period("min_separation", 5.0, (3.0, 20.0, 1.0), "Min bars between extremes"),
];

impl ParameterizedFinder for DoubleTopFinder {
    fn param_meta() -> &'static [ParamMeta] {
        DOUBLE_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        let finder = Self {
            lookback: get_period(params, "lookback", 90)?,
            pivot_window: get_period(params, "pivot_window", 3)?,
            tolerance: get_ratio(params, "tolerance", 0.05)?,
            min_separation: get_period(params, "min_separation", 5)?,
        };
        finder.validate_config()?;
        Ok(finder)
    }

    fn finder_name() -> &'static str {
        "double_top"
    }
}

impl ParameterizedFinder for DoubleBottomFinder {
    fn param_meta() -> &'static [ParamMeta] {
        DOUBLE_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        let top = DoubleTopFinder::with_params(params)?;
        Ok(Self {
            lookback: top.lookback,
            pivot_window: top.pivot_window,
            tolerance: top.tolerance,
            min_separation: top.min_separation,
        })
    }

    fn finder_name() -> &'static str {
        "double_bottom"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Two peaks near 105/103 with a valley near 90 between them, followed by
    // a breakdown below the neckline.
    fn double_top_series(confirm: bool) -> Vec<Candle> {
        let mut closes = Vec::new();
        closes.extend((0..8).map(|i| 92.0 + i as f64 * 1.5)); // ramp up
        closes.extend([104.0, 105.0, 104.0]); // first peak at 9
        closes.extend((0..5).map(|i| 100.0 - i as f64 * 2.0)); // down to ~92
        closes.extend([91.0, 90.0, 91.0]); // valley at 15..17
        closes.extend((0..5).map(|i| 93.0 + i as f64 * 2.0)); // ramp up
        closes.extend([102.0, 103.0, 102.0]); // second peak
        if confirm {
            closes.extend((0..6).map(|i| 99.0 - i as f64 * 2.5)); // breakdown
        } else {
            closes.extend([98.0, 96.0, 95.0, 94.0, 93.0, 92.0]); // drift, no break
        }
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Candle::new(c, c + 0.5, c - 0.5, c, 1000.0, i as i64))
            .collect()
    }

    #[test]
    fn test_double_top_detected_and_confirmed() {
        let candles = double_top_series(true);
        let finder = DoubleTopFinder::default();
        let results = finder.find(&candles);
        assert!(!results.is_empty(), "expected a double top");

        let r = &results[0];
        assert_eq!(r.pattern_type, PatternType::DoubleTop);
        assert_eq!(r.direction, Direction::Bearish);
        assert_eq!(r.status, PatternStatus::Confirmed);
        // Neckline at the valley low, target one height below.
        let neckline = r.component.breakout_level;
        assert!((r.price_target - (neckline - r.component.pattern_height)).abs() < 1e-9);
        assert!(r.price_target < neckline);
        // Stop at the higher of the two peak pivots, no margin.
        assert!((r.stop_loss - 105.5).abs() < 1e-9);
        assert!((0.0..=100.0).contains(&r.reliability));
        assert!(r.significance > 0.0);
        assert_eq!(r.key_dates.len(), 2);
        assert!(r.key_prices[0] > 100.0 && r.key_prices[1] > 100.0);
    }

    #[test]
    fn test_double_top_without_breakout_not_confirmed() {
        let candles = double_top_series(false);
        let results = DoubleTopFinder::default().find(&candles);
        for r in &results {
            assert_ne!(r.status, PatternStatus::Confirmed);
        }
    }

    #[test]
    fn test_reentry_drops_pattern() {
        let mut candles = double_top_series(true);
        // Climb back above the neckline after the breakdown.
        let last_ts = candles.last().unwrap().timestamp;
        for k in 0..8 {
            let c = 88.0 + k as f64 * 2.0;
            candles.push(Candle::new(c, c + 0.5, c - 0.5, c, 1000.0, last_ts + 1 + k));
        }
        let results = DoubleTopFinder::default().find(&candles);
        assert!(
            results.is_empty(),
            "re-entered pattern must be dropped, got {results:?}"
        );
    }

    #[test]
    fn test_double_bottom_mirror() {
        let candles: Vec<Candle> = double_top_series(true)
            .into_iter()
            .map(|c| Candle::new(200.0 - c.open, 200.0 - c.low, 200.0 - c.high, 200.0 - c.close, c.volume, c.timestamp))
            .collect();
        let results = DoubleBottomFinder::default().find(&candles);
        assert!(!results.is_empty());
        let r = &results[0];
        assert_eq!(r.pattern_type, PatternType::DoubleBottom);
        assert_eq!(r.direction, Direction::Bullish);
        assert!(r.price_target > r.component.breakout_level);
    }

    #[test]
    fn test_separation_requirement() {
        let finder = DoubleTopFinder {
            min_separation: Period::new_const(50),
            ..Default::default()
        };
        let candles = double_top_series(true);
        assert!(finder.find(&candles).is_empty());
    }

    #[test]
    fn test_empty_and_short_series() {
        let finder = DoubleTopFinder::default();
        assert!(finder.find(&[]).is_empty());
        let short: Vec<Candle> = (0..5)
            .map(|i| Candle::new(100.0, 101.0, 99.0, 100.0, 1000.0, i))
            .collect();
        assert!(finder.find(&short).is_empty());
    }

    #[test]
    fn test_config_validation() {
        let bad = DoubleTopFinder {
            lookback: Period::new_const(8),
            ..Default::default()
        };
        assert!(bad.validate_config().is_err());
        assert!(DoubleTopFinder::default().validate_config().is_ok());
    }
}
