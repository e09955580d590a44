//! Head-and-shoulders and inverse head-and-shoulders detection.
//!
//! Three consecutive peaks (valleys for the inverse) where the middle one
//! extends beyond both flanks and the flanks sit within a tolerance of each
//! other. The neckline is the line through the two retracement pivots
//! between them; its value at the latest bar is the trigger.

use crate::finders::helpers::{
    breakout_expected, breakout_zone, describe, key_series, line_value, pivots_in_lookback,
    resolve_status, trading_implication, volume_pattern_label,
};
use crate::finders::PatternFinder;
use crate::pivots::{detect_pivots, PeakValley, Pivots};
use crate::score::{volume_surge_points, ScoreCard};
use crate::{
    Candle, Direction, PatternAnalysisResult, PatternComponent, PatternError, PatternStatus,
    PatternType, Period, Ratio, Result,
};

const SHOULDER_SYMMETRY_POINTS: f64 = 15.0;
const BREAKOUT_POINTS: f64 = 15.0;
const FADING_RIGHT_SHOULDER_POINTS: f64 = 10.0;
/// Bonus when the neckline is close to horizontal (classic textbook shape).
const FLAT_NECKLINE_POINTS: f64 = 5.0;
const FLAT_NECKLINE_MAX_SLOPE: f64 = 0.001;

#[derive(Debug, Clone)]
pub struct HeadShouldersFinder {
    pub lookback: Period,
    pub pivot_window: Period,
    /// Max relative price difference between the shoulders.
    pub shoulder_tolerance: Ratio,
}

impl Default for HeadShouldersFinder {
    fn default() -> Self {
        Self {
            lookback: Period::new_const(120),
            pivot_window: Period::new_const(3),
            shoulder_tolerance: Ratio::new_const(0.10),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InverseHeadShouldersFinder {
    pub lookback: Period,
    pub pivot_window: Period,
    pub shoulder_tolerance: Ratio,
}

impl Default for InverseHeadShouldersFinder {
    fn default() -> Self {
        let base = HeadShouldersFinder::default();
        Self {
            lookback: base.lookback,
            pivot_window: base.pivot_window,
            shoulder_tolerance: base.shoulder_tolerance,
        }
    }
}

impl PatternFinder for HeadShouldersFinder {
    fn name(&self) -> &'static str {
        "head_and_shoulders"
    }

    fn pattern_type(&self) -> PatternType {
        PatternType::HeadAndShoulders
    }

    fn find(&self, candles: &[Candle]) -> Vec<PatternAnalysisResult> {
        let w = self.pivot_window.get();
        let pivots = detect_pivots(candles, w, w);
        find_hs_impl(
            candles,
            &pivots,
            self.lookback.get(),
            self.shoulder_tolerance.get(),
            Direction::Bearish,
        )
    }

    fn validate_config(&self) -> Result<()> {
        validate_hs_config(self.lookback, self.pivot_window)
    }
}

impl PatternFinder for InverseHeadShouldersFinder {
    fn name(&self) -> &'static str {
        "inverse_head_and_shoulders"
    }

    fn pattern_type(&self) -> PatternType {
        PatternType::InverseHeadAndShoulders
    }

    fn find(&self, candles: &[Candle]) -> Vec<PatternAnalysisResult> {
        let w = self.pivot_window.get();
        let pivots = detect_pivots(candles, w, w);
        find_hs_impl(
            candles,
            &pivots,
            self.lookback.get(),
            self.shoulder_tolerance.get(),
            Direction::Bullish,
        )
    }

    fn validate_config(&self) -> Result<()> {
        validate_hs_config(self.lookback, self.pivot_window)
    }
}

fn validate_hs_config(lookback: Period, pivot_window: Period) -> Result<()> {
    // Three pivots with confirmation room on both sides.
    if lookback.get() < 6 * pivot_window.get() + 3 {
        return Err(PatternError::InvalidConfig(format!(
            "lookback {} cannot hold three pivots with window {}",
            lookback.get(),
            pivot_window.get()
        )));
    }
    Ok(())
}

/// Find head-and-shoulders tops using precomputed pivots.
pub fn find_head_and_shoulders(
    candles: &[Candle],
    pivots: &Pivots,
    lookback: usize,
) -> Vec<PatternAnalysisResult> {
    let d = HeadShouldersFinder::default();
    find_hs_impl(
        candles,
        pivots,
        lookback,
        d.shoulder_tolerance.get(),
        Direction::Bearish,
    )
}

/// Find inverse head-and-shoulders bottoms using precomputed pivots.
pub fn find_inverse_head_and_shoulders(
    candles: &[Candle],
    pivots: &Pivots,
    lookback: usize,
) -> Vec<PatternAnalysisResult> {
    let d = InverseHeadShouldersFinder::default();
    find_hs_impl(
        candles,
        pivots,
        lookback,
        d.shoulder_tolerance.get(),
        Direction::Bullish,
    )
}

fn find_hs_impl(
    candles: &[Candle],
    pivots: &Pivots,
    lookback: usize,
    shoulder_tolerance: f64,
    direction: Direction,
) -> Vec<PatternAnalysisResult> {
    if candles.is_empty() {
        return Vec::new();
    }
    let (extremes, counters, pattern_type) = match direction {
        Direction::Bearish => (
            pivots_in_lookback(&pivots.peaks, candles.len(), lookback),
            &pivots.valleys,
            PatternType::HeadAndShoulders,
        ),
        Direction::Bullish => (
            pivots_in_lookback(&pivots.valleys, candles.len(), lookback),
            &pivots.peaks,
            PatternType::InverseHeadAndShoulders,
        ),
    };
    if extremes.len() < 3 {
        return Vec::new();
    }
    let last_index = candles.len() - 1;
    let last_close = candles[last_index].close;

    // Extends beyond the flank in the pattern direction.
    let beyond = |head: f64, flank: f64| match direction {
        Direction::Bearish => head > flank,
        Direction::Bullish => head < flank,
    };

    let mut results = Vec::new();
    for triple in extremes.windows(3) {
        let (left, head, right) = (triple[0], triple[1], triple[2]);
        if !beyond(head.price, left.price) || !beyond(head.price, right.price) {
            continue;
        }
        let flank_max = left.price.max(right.price);
        if flank_max <= f64::EPSILON {
            continue;
        }
        let shoulder_diff = (left.price - right.price).abs() / flank_max;
        if shoulder_diff > shoulder_tolerance {
            continue;
        }

        // Retracement pivots between left/head and head/right.
        let pick = |lo: PeakValley, hi: PeakValley| {
            counters
                .iter()
                .find(|c| c.index > lo.index && c.index < hi.index)
                .copied()
        };
        let (Some(n1), Some(n2)) = (pick(left, head), pick(head, right)) else {
            continue;
        };

        let neck_slope = (n2.price - n1.price) / (n2.index.get() - n1.index.get()) as f64;
        let neckline_at = |x: usize| {
            line_value(
                n1.index.get() as f64,
                n1.price,
                n2.index.get() as f64,
                n2.price,
                x as f64,
            )
        };
        // Height measured from the head to the midpoint of the neck pivots.
        let neck_mid = (n1.price + n2.price) / 2.0;
        let height = match direction {
            Direction::Bearish => head.price - neck_mid,
            Direction::Bullish => neck_mid - head.price,
        };
        if height <= f64::EPSILON {
            continue;
        }

        let trigger = neckline_at(last_index);
        let status = resolve_status(candles, right.index.get(), trigger, direction);

        let pattern_avg_vol = {
            let slice = &candles[left.index.get()..=right.index.get()];
            slice.iter().map(|c| c.volume).sum::<f64>() / slice.len() as f64
        };

        let mut card = ScoreCard::new();
        card.scaled(
            "shoulder symmetry",
            (1.0 - shoulder_diff / shoulder_tolerance) * SHOULDER_SYMMETRY_POINTS,
            SHOULDER_SYMMETRY_POINTS,
        )
        .rule(
            "right shoulder on fading volume",
            candles[right.index.get()].volume < candles[head.index.get()].volume,
            FADING_RIGHT_SHOULDER_POINTS,
        )
        .rule(
            "flat neckline",
            head.price > f64::EPSILON
                && (neck_slope / head.price).abs() <= FLAT_NECKLINE_MAX_SLOPE,
            FLAT_NECKLINE_POINTS,
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
                volume_surge_points(candles[last_index].volume / pattern_avg_vol),
            );
        }
        let reliability = card.total();

        let target = match direction {
            Direction::Bearish => trigger - height,
            Direction::Bullish => trigger + height,
        };
        let stop = head.price;

        let key_points = vec![left, n1, head, n2, right];
        let (key_dates, key_prices) = key_series(&key_points);
        let significance = if last_close > f64::EPSILON {
            reliability * (height / last_close)
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
                start_index: left.index,
                end_index: right.index,
                key_points,
                pattern_height: height,
                breakout_level: trigger,
                volume_pattern: volume_pattern_label(candles, left.index.get(), right.index.get()),
            },
            price_target: target,
            stop_loss: stop,
            breakout_expected: breakout_expected(candles, right.index.get(), status),
            breakout_direction: direction,
            probable_breakout_zone: breakout_zone(trigger),
            description: describe(pattern_type, status, target),
            trading_implication: trading_implication(direction, trigger, target, stop),
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

static HS_PARAMS: &[ParamMeta] = &[
    ParamMeta::period("lookback", 120.0, (40.0, 250.0, 10.0), "Trailing bars searched"),
    ParamMeta::period("pivot_window", 3.0, (2.0, 6.0, 1.0), "Pivot confirmation bars per side"),
    ParamMeta::ratio(
        "shoulder_tolerance",
        0.10,
        (0.02, 0.20, 0.02),
        "Max relative gap between shoulders",
    ),
];

impl ParameterizedFinder for HeadShouldersFinder {
    fn param_meta() -> &'static [ParamMeta] {
        HS_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        let finder = Self {
            lookback: get_period(params, "lookback", 120)?,
            pivot_window: get_period(params, "pivot_window", 3)?,
            shoulder_tolerance: get_ratio(params, "shoulder_tolerance", 0.10)?,
        };
        finder.validate_config()?;
        Ok(finder)
    }

    fn finder_name() -> &'static str {
        "head_and_shoulders"
    }
}

impl ParameterizedFinder for InverseHeadShouldersFinder {
    fn param_meta() -> &'static [ParamMeta] {
        HS_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        let top = HeadShouldersFinder::with_params(params)?;
        Ok(Self {
            lookback: top.lookback,
            pivot_window: top.pivot_window,
            shoulder_tolerance: top.shoulder_tolerance,
        })
    }

    fn finder_name() -> &'static str {
        "inverse_head_and_shoulders"
    }
}
