//! Trend classification and multi-timeframe reversal detection.
//!
//! [`determine_trend_direction`] classifies one series by the least-squares
//! slope of its smoothed closes, with a threshold that tightens as more data
//! becomes available. [`detect_trend_reversal`] relates a small timeframe to
//! a large one: a reversal is the small timeframe swinging from counter (or
//! flat) to aligned with the large-timeframe trend.

use crate::indicators::{max_of, min_of, slope, sma};
use crate::pivots::detect_pivots;
use crate::Candle;

/// Base per-bar relative slope threshold, scaled by data size.
const SLOPE_THRESHOLD: f64 = 0.0005;
/// Series length at which the slope threshold stops loosening.
const THRESHOLD_REF_LEN: usize = 30;
/// Previous-window return below this magnitude reads as flat.
const FLAT_RETURN: f64 = 0.005;
/// Bars used for the stop-loss extreme and the short-term strength term.
const STOP_WINDOW: usize = 10;
const SHORT_TERM_BARS: usize = 5;
/// Smoothed points fed to the least-squares fit of the large-timeframe trend.
const MIN_SLOPE_POINTS: usize = 5;
/// Swing lookback for measured-move targets, as a multiple of the window.
const SWING_LOOKBACK_WINDOWS: usize = 3;
/// Stop margin beyond the recent extreme.
const STOP_MARGIN: f64 = 0.01;
/// Extension multiple for the third measured-move target.
const FIB_EXTENSION: f64 = 1.618;

/// Strength term caps: price move, volume expansion, alignment, short-term.
const PRICE_TERM_CAP: f64 = 35.0;
const VOLUME_TERM_CAP: f64 = 25.0;
const FULL_FLIP_BONUS: f64 = 30.0;
const FLAT_FLIP_BONUS: f64 = 15.0;
const SHORT_TERM_CAP: f64 = 15.0;

const PRICE_TERM_SCALE: f64 = 500.0;
const SHORT_TERM_SCALE: f64 = 300.0;

/// Direction of a trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TrendDirection {
    Up,
    Flat,
    Down,
}

impl TrendDirection {
    /// Signed representation: Up = 1, Flat = 0, Down = -1.
    #[inline]
    pub fn value(self) -> i8 {
        match self {
            TrendDirection::Up => 1,
            TrendDirection::Flat => 0,
            TrendDirection::Down => -1,
        }
    }

    #[inline]
    pub fn opposite(self) -> Self {
        match self {
            TrendDirection::Up => TrendDirection::Down,
            TrendDirection::Flat => TrendDirection::Flat,
            TrendDirection::Down => TrendDirection::Up,
        }
    }
}

/// Price target ladder from a measured-move projection, with the
/// risk/reward each rung realizes against the given stop.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MeasuredMoveTargets {
    pub target1: f64,
    pub target2: f64,
    pub target3: f64,
    pub risk_reward_ratio1: f64,
    pub risk_reward_ratio2: f64,
    pub risk_reward_ratio3: f64,
}

/// Outcome of the multi-timeframe reversal check. Produced on every call;
/// `is_reversal` gates whether the trade fields are meaningful.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TrendReversalSignal {
    pub is_reversal: bool,
    pub direction: TrendDirection,
    /// Heuristic strength in [0, 100].
    pub reversal_strength: f64,
    pub small_timeframe: String,
    pub large_timeframe: String,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub targets: Option<MeasuredMoveTargets>,
}

/// Classify the trend of `candles` from the slope of their smoothed closes.
///
/// Returns `Flat` when there is too little data: fewer than
/// `max(period + 2, min_slope_points + 1)` bars, or fewer than 3 smoothed
/// points. The smoothing period shrinks to `len / 2` on short series so the
/// check degrades instead of going silent. The slope is taken over the last
/// `min_slope_points` smoothed values, normalized by the latest smoothed
/// price, and compared against `0.0005 * (30 / min(len, 30))` - shorter
/// histories get a looser threshold.
pub fn determine_trend_direction(
    candles: &[Candle],
    period: usize,
    min_slope_points: usize,
) -> TrendDirection {
    let len = candles.len();
    if period == 0 || min_slope_points == 0 || len < (period + 2).max(min_slope_points + 1) {
        return TrendDirection::Flat;
    }
    let effective_period = period.min(len / 2).max(1);
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let smoothed = sma(&closes, effective_period);
    if smoothed.len() < 3 {
        return TrendDirection::Flat;
    }

    let points = min_slope_points.min(smoothed.len());
    let tail = &smoothed[smoothed.len() - points..];
    let raw_slope = slope(tail);
    let reference = *tail.last().unwrap_or(&0.0);
    if reference.abs() <= f64::EPSILON {
        return TrendDirection::Flat;
    }
    let relative = raw_slope / reference;

    let threshold = SLOPE_THRESHOLD * (THRESHOLD_REF_LEN as f64 / len.min(THRESHOLD_REF_LEN) as f64);
    if relative > threshold {
        TrendDirection::Up
    } else if relative < -threshold {
        TrendDirection::Down
    } else {
        TrendDirection::Flat
    }
}

/// Detect a reversal on the small timeframe back into the direction of the
/// large timeframe's trend.
///
/// The small series is split into two adjacent windows of
/// `min(20, max(5, len / 4))` bars. A reversal requires the current window
/// to move with the large-timeframe trend while the previous window moved
/// against it or sideways. The returned signal always carries the
/// timeframe labels; entry/stop/targets are populated only on a reversal.
pub fn detect_trend_reversal(
    small: &[Candle],
    large: &[Candle],
    small_label: &str,
    large_label: &str,
    small_period: usize,
    large_period: usize,
) -> TrendReversalSignal {
    let no_signal = |direction: TrendDirection| TrendReversalSignal {
        is_reversal: false,
        direction,
        reversal_strength: 0.0,
        small_timeframe: small_label.to_string(),
        large_timeframe: large_label.to_string(),
        entry_price: small.last().map_or(0.0, |c| c.close),
        stop_loss: 0.0,
        targets: None,
    };

    let large_trend = determine_trend_direction(large, large_period, MIN_SLOPE_POINTS);
    if large_trend == TrendDirection::Flat {
        return no_signal(TrendDirection::Flat);
    }

    let len = small.len();
    let window = (len / 4).clamp(5, 20);
    // The small timeframe needs both windows and room for its own smoothing.
    if len < 2 * window || len < small_period + 2 {
        return no_signal(large_trend);
    }

    let window_return = |start: usize, end: usize| -> f64 {
        let first = small[start].close;
        if first.abs() <= f64::EPSILON {
            return 0.0;
        }
        (small[end].close - first) / first
    };
    let current = window_return(len - window, len - 1);
    let previous = window_return(len - 2 * window, len - window - 1);

    let sign = large_trend.value() as f64;
    let aligned = current * sign > 0.0;
    let prev_counter = previous * sign < 0.0 && previous.abs() >= FLAT_RETURN;
    let prev_flat = previous.abs() < FLAT_RETURN;

    if !aligned || !(prev_counter || prev_flat) {
        return no_signal(large_trend);
    }

    // Strength: capped terms for the price swing, volume expansion, the
    // shape of the flip, and the most recent bars' momentum.
    let mut strength = (current.abs() * PRICE_TERM_SCALE).min(PRICE_TERM_CAP);

    let avg_vol = |start: usize, end: usize| -> f64 {
        let slice = &small[start..end];
        if slice.is_empty() {
            return 0.0;
        }
        slice.iter().map(|c| c.volume).sum::<f64>() / slice.len() as f64
    };
    let recent_vol = avg_vol(len - window, len);
    let prior_vol = avg_vol(len - 2 * window, len - window);
    if prior_vol > f64::EPSILON && recent_vol > prior_vol {
        strength += ((recent_vol / prior_vol - 1.0) * 100.0).min(VOLUME_TERM_CAP);
    }

    strength += if prev_flat { FLAT_FLIP_BONUS } else { FULL_FLIP_BONUS };

    let short_start = len.saturating_sub(SHORT_TERM_BARS);
    let short_return = window_return(short_start, len - 1);
    if short_return * sign > 0.0 {
        strength += (short_return.abs() * SHORT_TERM_SCALE).min(SHORT_TERM_CAP);
    }
    let strength = strength.clamp(0.0, 100.0);

    let entry = small[len - 1].close;
    let stop_slice = &small[len.saturating_sub(STOP_WINDOW)..];
    let stop = match large_trend {
        TrendDirection::Up => {
            let lows: Vec<f64> = stop_slice.iter().map(|c| c.low).collect();
            min_of(&lows).unwrap_or(entry) * (1.0 - STOP_MARGIN)
        }
        _ => {
            let highs: Vec<f64> = stop_slice.iter().map(|c| c.high).collect();
            max_of(&highs).unwrap_or(entry) * (1.0 + STOP_MARGIN)
        }
    };

    TrendReversalSignal {
        is_reversal: true,
        direction: large_trend,
        reversal_strength: strength,
        small_timeframe: small_label.to_string(),
        large_timeframe: large_label.to_string(),
        entry_price: entry,
        stop_loss: stop,
        targets: Some(calculate_measured_move_targets(
            small,
            window,
            large_trend,
            entry,
            stop,
        )),
    }
}

/// Project a measured-move target ladder for a trade in `direction`.
///
/// The swing being measured must sit inside the trailing
/// `window_size * 3` bars; an older leg is stale and does not anchor
/// targets. When a usable swing exists (valley-to-peak for longs,
/// peak-to-valley for shorts), the rungs are: one measured move from entry,
/// the swing pivot plus one measured move, and the swing pivot plus a
/// 1.618 extension. Without a usable swing the ladder falls back to 1x/2x/3x
/// the risk distance, which realizes risk/reward ratios of exactly 1, 2
/// and 3. Each rung reports the ratio it actually realizes; a zero risk
/// distance yields zero ratios.
pub fn calculate_measured_move_targets(
    candles: &[Candle],
    window_size: usize,
    direction: TrendDirection,
    entry_price: f64,
    stop_loss: f64,
) -> MeasuredMoveTargets {
    let sign = if direction == TrendDirection::Down {
        -1.0
    } else {
        1.0
    };
    let risk = (entry_price - stop_loss).abs();

    let lookback = window_size.saturating_mul(SWING_LOOKBACK_WINDOWS);
    let swing = recent_swing(candles, lookback, direction);
    let (t1, t2, t3) = match swing {
        Some((pivot, magnitude)) if magnitude > f64::EPSILON => (
            entry_price + sign * magnitude,
            pivot + sign * magnitude,
            pivot + sign * magnitude * FIB_EXTENSION,
        ),
        _ => (
            entry_price + sign * risk,
            entry_price + sign * 2.0 * risk,
            entry_price + sign * 3.0 * risk,
        ),
    };

    let ratio = |target: f64| {
        if risk <= f64::EPSILON {
            0.0
        } else {
            (target - entry_price) * sign / risk
        }
    };

    MeasuredMoveTargets {
        target1: t1,
        target2: t2,
        target3: t3,
        risk_reward_ratio1: ratio(t1),
        risk_reward_ratio2: ratio(t2),
        risk_reward_ratio3: ratio(t3),
    }
}

/// Latest completed swing in the trade direction, found within the trailing
/// `lookback` bars: `(pivot price, magnitude)`. Longs use the latest
/// valley-to-peak leg, shorts the latest peak-to-valley leg.
fn recent_swing(
    candles: &[Candle],
    lookback: usize,
    direction: TrendDirection,
) -> Option<(f64, f64)> {
    let start = candles.len().saturating_sub(lookback);
    let pivots = detect_pivots(&candles[start..], 3, 3);
    match direction {
        TrendDirection::Down => {
            let valley = pivots.valleys.last()?;
            let peak = pivots
                .peaks
                .iter()
                .rev()
                .find(|p| p.index < valley.index)?;
            Some((valley.price, peak.price - valley.price))
        }
        _ => {
            let peak = pivots.peaks.last()?;
            let valley = pivots
                .valleys
                .iter()
                .rev()
                .find(|v| v.index < peak.index)?;
            Some((peak.price, peak.price - valley.price))
        }
    }
}
