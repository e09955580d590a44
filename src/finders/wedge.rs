//! Rising and falling wedge detection.
//!
//! The two most recent peak pivots define the upper boundary, the two most
//! recent valley pivots the lower one. A rising wedge needs both boundaries
//! sloping up with the lower one steeper; a falling wedge needs both sloping
//! down with the lower one shallower. Either way the boundaries converge and
//! price resolves against the slope: rising breaks down, falling breaks up.
//! A wedge whose breakout was later re-entered is dropped from the results.

use crate::finders::helpers::{
    breakout_expected, breakout_zone, describe, key_series, line_value, pivots_in_lookback,
    resolve_status, trading_implication, volume_pattern_label,
};
use crate::finders::PatternFinder;
use crate::pivots::{detect_pivots, PeakValley};
use crate::score::{volume_surge_points, ScoreCard};
use crate::{
    Candle, Direction, PatternAnalysisResult, PatternComponent, PatternError, PatternStatus,
    PatternType, Period, Result,
};

/// Stop margin beyond the projected opposite boundary.
const STOP_MARGIN: f64 = 0.02;

const CONVERGENCE_POINTS: f64 = 15.0;
const FADING_VOLUME_POINTS: f64 = 10.0;
const BREAKOUT_POINTS: f64 = 15.0;

#[derive(Debug, Clone)]
pub struct RisingWedgeFinder {
    pub lookback: Period,
    pub pivot_window: Period,
    /// Min bars between wedge start and end.
    pub min_span: Period,
}

impl Default for RisingWedgeFinder {
    fn default() -> Self {
        Self {
            lookback: Period::new_const(60),
            pivot_window: Period::new_const(3),
            min_span: Period::new_const(10),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FallingWedgeFinder {
    pub lookback: Period,
    pub pivot_window: Period,
    pub min_span: Period,
}

impl Default for FallingWedgeFinder {
    fn default() -> Self {
        let base = RisingWedgeFinder::default();
        Self {
            lookback: base.lookback,
            pivot_window: base.pivot_window,
            min_span: base.min_span,
        }
    }
}

impl PatternFinder for RisingWedgeFinder {
    fn name(&self) -> &'static str {
        "rising_wedge"
    }

    fn pattern_type(&self) -> PatternType {
        PatternType::RisingWedge
    }

    fn find(&self, candles: &[Candle]) -> Vec<PatternAnalysisResult> {
        let w = self.pivot_window.get();
        let pivots = detect_pivots(candles, w, w);
        find_wedge_impl(
            candles,
            &pivots_in_lookback(&pivots.peaks, candles.len(), self.lookback.get()),
            &pivots_in_lookback(&pivots.valleys, candles.len(), self.lookback.get()),
            self.min_span.get(),
            Direction::Bearish,
        )
    }

    fn validate_config(&self) -> Result<()> {
        validate_wedge_config(self.lookback, self.min_span)
    }
}

impl PatternFinder for FallingWedgeFinder {
    fn name(&self) -> &'static str {
        "falling_wedge"
    }

    fn pattern_type(&self) -> PatternType {
        PatternType::FallingWedge
    }

    fn find(&self, candles: &[Candle]) -> Vec<PatternAnalysisResult> {
        let w = self.pivot_window.get();
        let pivots = detect_pivots(candles, w, w);
        find_wedge_impl(
            candles,
            &pivots_in_lookback(&pivots.peaks, candles.len(), self.lookback.get()),
            &pivots_in_lookback(&pivots.valleys, candles.len(), self.lookback.get()),
            self.min_span.get(),
            Direction::Bullish,
        )
    }

    fn validate_config(&self) -> Result<()> {
        validate_wedge_config(self.lookback, self.min_span)
    }
}

fn validate_wedge_config(lookback: Period, min_span: Period) -> Result<()> {
    if min_span.get() >= lookback.get() {
        return Err(PatternError::InvalidConfig(format!(
            "min span {} must be below lookback {}",
            min_span.get(),
            lookback.get()
        )));
    }
    Ok(())
}

/// Find rising wedges using precomputed pivots.
pub fn find_rising_wedges(
    candles: &[Candle],
    pivots: &crate::pivots::Pivots,
    lookback: usize,
) -> Vec<PatternAnalysisResult> {
    let d = RisingWedgeFinder::default();
    find_wedge_impl(
        candles,
        &pivots_in_lookback(&pivots.peaks, candles.len(), lookback),
        &pivots_in_lookback(&pivots.valleys, candles.len(), lookback),
        d.min_span.get(),
        Direction::Bearish,
    )
}

/// Find falling wedges using precomputed pivots.
pub fn find_falling_wedges(
    candles: &[Candle],
    pivots: &crate::pivots::Pivots,
    lookback: usize,
) -> Vec<PatternAnalysisResult> {
    let d = FallingWedgeFinder::default();
    find_wedge_impl(
        candles,
        &pivots_in_lookback(&pivots.peaks, candles.len(), lookback),
        &pivots_in_lookback(&pivots.valleys, candles.len(), lookback),
        d.min_span.get(),
        Direction::Bullish,
    )
}

fn find_wedge_impl(
    candles: &[Candle],
    peaks: &[PeakValley],
    valleys: &[PeakValley],
    min_span: usize,
    direction: Direction,
) -> Vec<PatternAnalysisResult> {
    if candles.is_empty() || peaks.len() < 2 || valleys.len() < 2 {
        return Vec::new();
    }
    let pattern_type = match direction {
        Direction::Bearish => PatternType::RisingWedge,
        Direction::Bullish => PatternType::FallingWedge,
    };

    let (p1, p2) = (peaks[peaks.len() - 2], peaks[peaks.len() - 1]);
    let (v1, v2) = (valleys[valleys.len() - 2], valleys[valleys.len() - 1]);

    let peak_slope = (p2.price - p1.price) / (p2.index.get() - p1.index.get()) as f64;
    let valley_slope = (v2.price - v1.price) / (v2.index.get() - v1.index.get()) as f64;

    let shape_ok = match direction {
        // Rising: both boundaries up, support steeper than resistance.
        Direction::Bearish => peak_slope > 0.0 && valley_slope > peak_slope,
        // Falling: both boundaries down, support shallower than resistance.
        Direction::Bullish => peak_slope < 0.0 && valley_slope < 0.0 && valley_slope > peak_slope,
    };
    if !shape_ok {
        return Vec::new();
    }

    let start = p1.index.get().min(v1.index.get());
    let end = p2.index.get().max(v2.index.get());
    if end - start < min_span {
        return Vec::new();
    }

    let upper_at = |x: usize| {
        line_value(
            p1.index.get() as f64,
            p1.price,
            p2.index.get() as f64,
            p2.price,
            x as f64,
        )
    };
    let lower_at = |x: usize| {
        line_value(
            v1.index.get() as f64,
            v1.price,
            v2.index.get() as f64,
            v2.price,
            x as f64,
        )
    };

    // Converging, with the upper boundary still on top at the wedge end.
    let start_height = upper_at(start) - lower_at(start);
    let end_height = upper_at(end) - lower_at(end);
    if start_height <= f64::EPSILON || end_height <= f64::EPSILON || end_height >= start_height {
        return Vec::new();
    }

    let last_index = candles.len() - 1;
    let last_close = candles[last_index].close;
    // Rising wedges resolve through support, falling wedges through
    // resistance.
    let trigger = match direction {
        Direction::Bearish => lower_at(last_index),
        Direction::Bullish => upper_at(last_index),
    };
    let status = resolve_status(candles, end, trigger, direction);

    // A breakout that price has since re-entered invalidates the wedge.
    if status != PatternStatus::Confirmed {
        let broke_earlier = (end..candles.len()).any(|i| match direction {
            Direction::Bearish => candles[i].close < lower_at(i),
            Direction::Bullish => candles[i].close > upper_at(i),
        });
        if broke_earlier {
            return Vec::new();
        }
    }

    let wedge_avg_vol = {
        let slice = &candles[start..=end];
        slice.iter().map(|c| c.volume).sum::<f64>() / slice.len() as f64
    };
    let early_vol = {
        let mid = start + (end - start) / 2;
        let slice = &candles[start..=mid];
        slice.iter().map(|c| c.volume).sum::<f64>() / slice.len() as f64
    };
    let late_vol = {
        let mid = start + (end - start) / 2;
        let slice = &candles[mid..=end];
        slice.iter().map(|c| c.volume).sum::<f64>() / slice.len() as f64
    };

    let mut card = ScoreCard::new();
    card.scaled(
        "boundary convergence",
        (1.0 - end_height / start_height) * CONVERGENCE_POINTS,
        CONVERGENCE_POINTS,
    )
    .rule(
        "volume fading into the apex",
        late_vol < early_vol,
        FADING_VOLUME_POINTS,
    )
    .rule(
        "breakout observed",
        status == PatternStatus::Confirmed,
        BREAKOUT_POINTS,
    );
    if status == PatternStatus::Confirmed && wedge_avg_vol > f64::EPSILON {
        card.rule(
            "breakout volume surge",
            true,
            volume_surge_points(candles[last_index].volume / wedge_avg_vol),
        );
    }
    let reliability = card.total();

    // Measured move from the widest part, projected off the support line.
    let target = match direction {
        Direction::Bearish => lower_at(end) - start_height,
        Direction::Bullish => lower_at(end) + start_height,
    };
    // Stop beyond the opposite boundary, projected to the wedge end.
    let stop = match direction {
        Direction::Bearish => upper_at(end) * (1.0 + STOP_MARGIN),
        Direction::Bullish => lower_at(end) * (1.0 - STOP_MARGIN),
    };

    let mut key_points = vec![p1, p2, v1, v2];
    key_points.sort_by_key(|p| p.index);
    let (key_dates, key_prices) = key_series(&key_points);
    let significance = if last_close > f64::EPSILON {
        reliability * (start_height / last_close)
    } else {
        0.0
    };

    vec![PatternAnalysisResult {
        pattern_type,
        status,
        direction,
        reliability,
        significance,
        component: PatternComponent {
            start_index: crate::BarIndex(start),
            end_index: crate::BarIndex(end),
            key_points,
            pattern_height: start_height,
            breakout_level: trigger,
            volume_pattern: volume_pattern_label(candles, start, end),
        },
        price_target: target,
        stop_loss: stop,
        breakout_expected: breakout_expected(candles, end, status),
        breakout_direction: direction,
        probable_breakout_zone: breakout_zone(trigger),
        description: describe(pattern_type, status, target),
        trading_implication: trading_implication(direction, trigger, target, stop),
        key_dates,
        key_prices,
    }]
}

// ============================================================
// PARAMETERIZATION
// ============================================================

use crate::params::{get_period, ParamMeta, ParameterizedFinder};
use std::collections::HashMap;

static WEDGE_PARAMS: &[ParamMeta] = &[
    ParamMeta::period("lookback", 60.0, (30.0, 150.0, 10.0), "Trailing bars searched"),
    ParamMeta::period("pivot_window", 3.0, (2.0, 6.0, 1.0), "Pivot confirmation bars per side"),
    ParamMeta::period("min_span", 10.0, (5.0, 40.0, 5.0), "Min wedge span in bars"),
];

impl ParameterizedFinder for RisingWedgeFinder {
    fn param_meta() -> &'static [ParamMeta] {
        WEDGE_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        let finder = Self {
            lookback: get_period(params, "lookback", 60)?,
            pivot_window: get_period(params, "pivot_window", 3)?,
            min_span: get_period(params, "min_span", 10)?,
        };
        finder.validate_config()?;
        Ok(finder)
    }

    fn finder_name() -> &'static str {
        "rising_wedge"
    }
}

impl ParameterizedFinder for FallingWedgeFinder {
    fn param_meta() -> &'static [ParamMeta] {
        WEDGE_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        let rising = RisingWedgeFinder::with_params(params)?;
        Ok(Self {
            lookback: rising.lookback,
            pivot_window: rising.pivot_window,
            min_span: rising.min_span,
        })
    }

    fn finder_name() -> &'static str {
        "falling_wedge"
    }
}
