//! Rounding top / rounding bottom detection.
//!
//! The trailing formation window is smoothed with a short SMA; a rounding
//! top needs the smoothed maximum well inside the window with a sustained
//! rise into it and a sustained decline out of it. The neckline is the
//! shallower of the two smoothed window edges; height is measured from the
//! extremum to that neckline.

use crate::finders::helpers::{
    avg_volume, breakout_expected, breakout_zone, describe, key_series, resolve_status,
    trading_implication, volume_pattern_label,
};
use crate::finders::PatternFinder;
use crate::indicators::sma;
use crate::pivots::{PeakValley, PivotKind};
use crate::score::{volume_surge_points, ScoreCard};
use crate::{
    BarIndex, Candle, Direction, PatternAnalysisResult, PatternComponent, PatternError,
    PatternStatus, PatternType, Period, Ratio, Result,
};

/// Fraction of the window excluded at each edge when locating the extremum.
const EDGE_EXCLUSION: f64 = 0.20;
/// Stop distance beyond the extremum.
const STOP_MARGIN: f64 = 0.02;

const SMOOTH_SHAPE_POINTS: f64 = 15.0;
const QUIET_BASE_POINTS: f64 = 10.0;
const BREAKOUT_POINTS: f64 = 15.0;

#[derive(Debug, Clone)]
pub struct RoundingTopFinder {
    /// Formation window, trailing bars.
    pub lookback: Period,
    /// SMA period used to smooth the closes.
    pub smoothing: Period,
    /// Min monotonic run into and out of the extremum, in smoothed bars.
    pub min_run: Period,
    /// Min relative height of the formation.
    pub min_height: Ratio,
}

impl Default for RoundingTopFinder {
    fn default() -> Self {
        Self {
            lookback: Period::new_const(40),
            smoothing: Period::new_const(5),
            min_run: Period::new_const(10),
            min_height: Ratio::new_const(0.03),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RoundingBottomFinder {
    pub lookback: Period,
    pub smoothing: Period,
    pub min_run: Period,
    pub min_height: Ratio,
}

impl Default for RoundingBottomFinder {
    fn default() -> Self {
        let base = RoundingTopFinder::default();
        Self {
            lookback: base.lookback,
            smoothing: base.smoothing,
            min_run: base.min_run,
            min_height: base.min_height,
        }
    }
}

impl PatternFinder for RoundingTopFinder {
    fn name(&self) -> &'static str {
        "rounding_top"
    }

    fn pattern_type(&self) -> PatternType {
        PatternType::RoundingTop
    }

    fn find(&self, candles: &[Candle]) -> Vec<PatternAnalysisResult> {
        find_rounding_impl(
            candles,
            self.lookback.get(),
            self.smoothing.get(),
            self.min_run.get(),
            self.min_height.get(),
            Direction::Bearish,
        )
    }

    fn validate_config(&self) -> Result<()> {
        validate_rounding_config(self.lookback, self.smoothing, self.min_run)
    }
}

impl PatternFinder for RoundingBottomFinder {
    fn name(&self) -> &'static str {
        "rounding_bottom"
    }

    fn pattern_type(&self) -> PatternType {
        PatternType::RoundingBottom
    }

    fn find(&self, candles: &[Candle]) -> Vec<PatternAnalysisResult> {
        find_rounding_impl(
            candles,
            self.lookback.get(),
            self.smoothing.get(),
            self.min_run.get(),
            self.min_height.get(),
            Direction::Bullish,
        )
    }

    fn validate_config(&self) -> Result<()> {
        validate_rounding_config(self.lookback, self.smoothing, self.min_run)
    }
}

fn validate_rounding_config(lookback: Period, smoothing: Period, min_run: Period) -> Result<()> {
    if lookback.get() < smoothing.get() + 2 * min_run.get() {
        return Err(PatternError::InvalidConfig(format!(
            "lookback {} cannot hold two {}-bar runs after {}-bar smoothing",
            lookback.get(),
            min_run.get(),
            smoothing.get()
        )));
    }
    Ok(())
}

/// Find rounding tops in the trailing `lookback` bars.
pub fn find_rounding_tops(candles: &[Candle], lookback: usize) -> Vec<PatternAnalysisResult> {
    let d = RoundingTopFinder::default();
    find_rounding_impl(
        candles,
        lookback,
        d.smoothing.get(),
        d.min_run.get(),
        d.min_height.get(),
        Direction::Bearish,
    )
}

/// Find rounding bottoms in the trailing `lookback` bars.
pub fn find_rounding_bottoms(candles: &[Candle], lookback: usize) -> Vec<PatternAnalysisResult> {
    let d = RoundingBottomFinder::default();
    find_rounding_impl(
        candles,
        lookback,
        d.smoothing.get(),
        d.min_run.get(),
        d.min_height.get(),
        Direction::Bullish,
    )
}

fn find_rounding_impl(
    candles: &[Candle],
    lookback: usize,
    smoothing: usize,
    min_run: usize,
    min_height: f64,
    direction: Direction,
) -> Vec<PatternAnalysisResult> {
    if candles.len() < smoothing + 2 * min_run || lookback < smoothing + 2 * min_run {
        return Vec::new();
    }
    let window_start = candles.len().saturating_sub(lookback);
    let window = &candles[window_start..];
    let closes: Vec<f64> = window.iter().map(|c| c.close).collect();
    let smoothed = sma(&closes, smoothing);
    if smoothed.len() < 2 * min_run + 1 {
        return Vec::new();
    }

    let pattern_type = match direction {
        Direction::Bearish => PatternType::RoundingTop,
        Direction::Bullish => PatternType::RoundingBottom,
    };

    // Extremum of the smoothed window.
    let (ext_offset, ext_value) = smoothed
        .iter()
        .copied()
        .enumerate()
        .fold((0usize, smoothed[0]), |(bi, bv), (i, v)| {
            let better = match direction {
                Direction::Bearish => v > bv,
                Direction::Bullish => v < bv,
            };
            if better {
                (i, v)
            } else {
                (bi, bv)
            }
        });

    // Edge exclusion: an extremum pinned to a window edge is a trend, not a
    // rounded formation.
    let margin = ((smoothed.len() as f64) * EDGE_EXCLUSION) as usize;
    if ext_offset < margin.max(min_run) || ext_offset + margin.max(min_run) >= smoothed.len() {
        return Vec::new();
    }

    // Sustained run into and out of the extremum.
    let rising = |a: f64, b: f64| match direction {
        Direction::Bearish => b >= a,
        Direction::Bullish => b <= a,
    };
    let left_ok = smoothed[ext_offset - min_run..=ext_offset]
        .windows(2)
        .all(|w| rising(w[0], w[1]));
    let right_ok = smoothed[ext_offset..=ext_offset + min_run]
        .windows(2)
        .all(|w| rising(w[1], w[0]));
    if !left_ok || !right_ok {
        return Vec::new();
    }

    let first_edge = smoothed[0];
    let last_edge = *smoothed.last().unwrap_or(&first_edge);
    // Shallower edge: the level price must clear on both sides.
    let neckline = match direction {
        Direction::Bearish => first_edge.min(last_edge),
        Direction::Bullish => first_edge.max(last_edge),
    };
    let height = match direction {
        Direction::Bearish => ext_value - neckline,
        Direction::Bullish => neckline - ext_value,
    };
    if ext_value <= f64::EPSILON || height / ext_value.abs() < min_height {
        return Vec::new();
    }

    // Map smoothed offsets back to series offsets (SMA element i covers
    // closes[i..i + smoothing], anchored at its last bar).
    let to_series = |i: usize| window_start + i + smoothing - 1;
    let ext_index = to_series(ext_offset);
    let start_index = to_series(0);
    let end_index = to_series(smoothed.len() - 1);

    let last_index = candles.len() - 1;
    let last_close = candles[last_index].close;
    let status = resolve_status(candles, end_index, neckline, direction);

    // Shape quality: fraction of all smoothed steps bending the right way.
    let good_steps = smoothed[..=ext_offset]
        .windows(2)
        .filter(|w| rising(w[0], w[1]))
        .count()
        + smoothed[ext_offset..]
            .windows(2)
            .filter(|w| rising(w[1], w[0]))
            .count();
    let shape_quality = good_steps as f64 / (smoothed.len() - 1) as f64;

    let edge_vol = (avg_volume(candles, start_index, start_index + 5)
        + avg_volume(candles, end_index.saturating_sub(4), end_index + 1))
        / 2.0;
    let base_vol = avg_volume(candles, ext_index.saturating_sub(2), ext_index + 3);
    let formation_avg_vol = avg_volume(candles, start_index, end_index + 1);

    let mut card = ScoreCard::new();
    card.scaled(
        "smooth arc",
        shape_quality * SMOOTH_SHAPE_POINTS,
        SMOOTH_SHAPE_POINTS,
    )
    .rule(
        "quiet turn",
        edge_vol > f64::EPSILON && base_vol < edge_vol,
        QUIET_BASE_POINTS,
    )
    .rule(
        "breakout observed",
        status == PatternStatus::Confirmed,
        BREAKOUT_POINTS,
    );
    if status == PatternStatus::Confirmed && formation_avg_vol > f64::EPSILON {
        card.rule(
            "breakout volume surge",
            true,
            volume_surge_points(candles[last_index].volume / formation_avg_vol),
        );
    }
    let reliability = card.total();

    let target = match direction {
        Direction::Bearish => neckline - height,
        Direction::Bullish => neckline + height,
    };
    let stop = match direction {
        Direction::Bearish => ext_value * (1.0 + STOP_MARGIN),
        Direction::Bullish => ext_value * (1.0 - STOP_MARGIN),
    };

    let point = |index: usize, price: f64, kind: PivotKind| PeakValley {
        index: BarIndex(index),
        kind,
        price,
        timestamp: candles[index].timestamp,
    };
    let ext_kind = match direction {
        Direction::Bearish => PivotKind::Peak,
        Direction::Bullish => PivotKind::Valley,
    };
    let key_points = vec![
        point(start_index, first_edge, ext_kind),
        point(ext_index, ext_value, ext_kind),
        point(end_index, last_edge, ext_kind),
    ];
    let (key_dates, key_prices) = key_series(&key_points);
    let significance = if last_close > f64::EPSILON {
        reliability * (height / last_close)
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
            start_index: BarIndex(start_index),
            end_index: BarIndex(end_index),
            key_points,
            pattern_height: height,
            breakout_level: neckline,
            volume_pattern: volume_pattern_label(candles, start_index, end_index),
        },
        price_target: target,
        stop_loss: stop,
        breakout_expected: breakout_expected(candles, end_index, status),
        breakout_direction: direction,
        probable_breakout_zone: breakout_zone(neckline),
        description: describe(pattern_type, status, target),
        trading_implication: trading_implication(direction, neckline, target, stop),
        key_dates,
        key_prices,
    }]
}

// ============================================================
// PARAMETERIZATION
// ============================================================

use crate::params::{get_period, get_ratio, ParamMeta, ParameterizedFinder};
use std::collections::HashMap;

static ROUNDING_PARAMS: &[ParamMeta] = &[
    ParamMeta::period("lookback", 40.0, (25.0, 120.0, 5.0), "Formation window in bars"),
    ParamMeta::period("smoothing", 5.0, (3.0, 10.0, 1.0), "SMA period for smoothing"),
    ParamMeta::period("min_run", 10.0, (5.0, 20.0, 1.0), "Min monotonic run per side"),
    ParamMeta::ratio("min_height", 0.03, (0.01, 0.10, 0.01), "Min relative formation height"),
];

impl ParameterizedFinder for RoundingTopFinder {
    fn param_meta() -> &'static [ParamMeta] {
        ROUNDING_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        let finder = Self {
            lookback: get_period(params, "lookback", 40)?,
            smoothing: get_period(params, "smoothing", 5)?,
            min_run: get_period(params, "min_run", 10)?,
            min_height: get_ratio(params, "min_height", 0.03)?,
        };
        finder.validate_config()?;
        Ok(finder)
    }

    fn finder_name() -> &'static str {
        "rounding_top"
    }
}

impl ParameterizedFinder for RoundingBottomFinder {
    fn param_meta() -> &'static [ParamMeta] {
        ROUNDING_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        let top = RoundingTopFinder::with_params(params)?;
        Ok(Self {
            lookback: top.lookback,
            smoothing: top.smoothing,
            min_run: top.min_run,
            min_height: top.min_height,
        })
    }

    fn finder_name() -> &'static str {
        "rounding_bottom"
    }
}
