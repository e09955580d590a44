//! Buying and selling climax detection.
//!
//! A climax is a single exhaustion bar: volume a multiple of its recent
//! average, range well above normal, printed at (or within a hair of) the
//! rolling extreme, with a committed body in the trend direction. The
//! expected resolution is a reversal; the target is a 61.8% retracement of
//! the run into the climax. Unlike the other families a confirmed climax
//! can fail: price revisiting the extreme inside the follow-up window flips
//! the result to `Failed`.

use crate::finders::helpers::{
    avg_volume, breakout_expected, breakout_zone, describe, key_series, resolve_status,
    trading_implication,
};
use crate::finders::PatternFinder;
use crate::indicators::{max_of, min_of};
use crate::pivots::{PeakValley, PivotKind};
use crate::score::{volume_surge_points, ScoreCard};
use crate::{
    BarIndex, Candle, Direction, PatternAnalysisResult, PatternComponent, PatternError,
    PatternStatus, PatternType, Period, Ratio, Result,
};

/// Retracement fraction of the run into the climax.
const FIB_RETRACE: f64 = 0.618;
/// Stop distance beyond the climax extreme.
const STOP_MARGIN: f64 = 0.03;
/// How close to the rolling extreme the climax bar must print.
const EXTREME_PROXIMITY: f64 = 0.02;
/// Min body share of the bar's range for a committed climax bar.
const MIN_BODY_SHARE: f64 = 0.5;
/// Significance scaling for climax families.
const SIGNIFICANCE_SCALE: f64 = 0.8;
/// Bars of history a simplified RSI needs before it is meaningful.
const RSI_WARMUP: usize = 14;

const WIDE_RANGE_POINTS: f64 = 10.0;
const NEXT_BAR_REVERSAL_POINTS: f64 = 10.0;
const EXHAUSTED_RSI_POINTS: f64 = 10.0;
const REVERSAL_CONFIRMED_POINTS: f64 = 15.0;

#[derive(Debug, Clone)]
pub struct BuyingClimaxFinder {
    /// Window for average volume/range and the rolling extreme.
    pub avg_window: Period,
    /// Min climax volume as a multiple of the window average.
    pub min_volume_ratio: f64,
    /// Min climax range as a multiple of the window average.
    pub min_range_ratio: f64,
    /// Bars after the climax inside which a revisited extreme fails it.
    pub follow_up: Period,
    /// Max distance from the rolling extreme, relative.
    pub extreme_tolerance: Ratio,
}

impl Default for BuyingClimaxFinder {
    fn default() -> Self {
        Self {
            avg_window: Period::new_const(20),
            min_volume_ratio: 2.0,
            min_range_ratio: 1.5,
            follow_up: Period::new_const(8),
            extreme_tolerance: Ratio::new_const(EXTREME_PROXIMITY),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SellingClimaxFinder {
    pub avg_window: Period,
    pub min_volume_ratio: f64,
    pub min_range_ratio: f64,
    pub follow_up: Period,
    pub extreme_tolerance: Ratio,
}

impl Default for SellingClimaxFinder {
    fn default() -> Self {
        let base = BuyingClimaxFinder::default();
        Self {
            avg_window: base.avg_window,
            min_volume_ratio: base.min_volume_ratio,
            min_range_ratio: base.min_range_ratio,
            follow_up: base.follow_up,
            extreme_tolerance: base.extreme_tolerance,
        }
    }
}

impl PatternFinder for BuyingClimaxFinder {
    fn name(&self) -> &'static str {
        "buying_climax"
    }

    fn pattern_type(&self) -> PatternType {
        PatternType::BuyingClimax
    }

    fn find(&self, candles: &[Candle]) -> Vec<PatternAnalysisResult> {
        find_climax_impl(
            candles,
            self.avg_window.get(),
            self.min_volume_ratio,
            self.min_range_ratio,
            self.follow_up.get(),
            self.extreme_tolerance.get(),
            Direction::Bearish,
        )
    }

    fn validate_config(&self) -> Result<()> {
        validate_climax_config(self.min_volume_ratio, self.min_range_ratio)
    }
}

impl PatternFinder for SellingClimaxFinder {
    fn name(&self) -> &'static str {
        "selling_climax"
    }

    fn pattern_type(&self) -> PatternType {
        PatternType::SellingClimax
    }

    fn find(&self, candles: &[Candle]) -> Vec<PatternAnalysisResult> {
        find_climax_impl(
            candles,
            self.avg_window.get(),
            self.min_volume_ratio,
            self.min_range_ratio,
            self.follow_up.get(),
            self.extreme_tolerance.get(),
            Direction::Bullish,
        )
    }

    fn validate_config(&self) -> Result<()> {
        validate_climax_config(self.min_volume_ratio, self.min_range_ratio)
    }
}

fn validate_climax_config(volume_ratio: f64, range_ratio: f64) -> Result<()> {
    if !volume_ratio.is_finite() || volume_ratio < 1.0 {
        return Err(PatternError::OutOfRange {
            field: "min_volume_ratio",
            value: volume_ratio,
            min: 1.0,
            max: f64::MAX,
        });
    }
    if !range_ratio.is_finite() || range_ratio < 1.0 {
        return Err(PatternError::OutOfRange {
            field: "min_range_ratio",
            value: range_ratio,
            min: 1.0,
            max: f64::MAX,
        });
    }
    Ok(())
}

/// Find buying climaxes with default thresholds.
pub fn find_buying_climaxes(candles: &[Candle], lookback: usize) -> Vec<PatternAnalysisResult> {
    let d = BuyingClimaxFinder {
        avg_window: Period::new(lookback.max(1)).unwrap_or_else(|_| Period::new_const(20)),
        ..Default::default()
    };
    d.find(candles)
}

/// Find selling climaxes with default thresholds.
pub fn find_selling_climaxes(candles: &[Candle], lookback: usize) -> Vec<PatternAnalysisResult> {
    let d = SellingClimaxFinder {
        avg_window: Period::new(lookback.max(1)).unwrap_or_else(|_| Period::new_const(20)),
        ..Default::default()
    };
    d.find(candles)
}

/// Simplified RSI over the last [`RSI_WARMUP`] closes ending at `index`.
/// Only evaluated when enough history exists before the climax.
fn simple_rsi(candles: &[Candle], index: usize) -> Option<f64> {
    if index <= RSI_WARMUP {
        return None;
    }
    let mut gains = 0.0;
    let mut losses = 0.0;
    for i in index - RSI_WARMUP + 1..=index {
        let delta = candles[i].close - candles[i - 1].close;
        if delta >= 0.0 {
            gains += delta;
        } else {
            losses -= delta;
        }
    }
    let total = gains + losses;
    if total <= f64::EPSILON {
        return Some(50.0);
    }
    Some(gains / total * 100.0)
}

#[allow(clippy::too_many_arguments)]
fn find_climax_impl(
    candles: &[Candle],
    avg_window: usize,
    min_volume_ratio: f64,
    min_range_ratio: f64,
    follow_up: usize,
    extreme_tolerance: f64,
    direction: Direction,
) -> Vec<PatternAnalysisResult> {
    // Short-series contract: the window plus a margin of follow-through bars.
    if candles.len() < avg_window + 5 {
        return Vec::new();
    }
    let pattern_type = match direction {
        Direction::Bearish => PatternType::BuyingClimax,
        Direction::Bullish => PatternType::SellingClimax,
    };
    let last_index = candles.len() - 1;
    let last_close = candles[last_index].close;

    let mut results = Vec::new();
    for i in avg_window..candles.len() {
        let bar = &candles[i];
        let window = &candles[i - avg_window..i];

        let avg_vol = avg_volume(candles, i - avg_window, i);
        if avg_vol <= f64::EPSILON || bar.volume / avg_vol < min_volume_ratio {
            continue;
        }

        let avg_range = window.iter().map(Candle::range).sum::<f64>() / avg_window as f64;
        if avg_range <= f64::EPSILON || bar.range() / avg_range < min_range_ratio {
            continue;
        }

        // At the rolling extreme, with a committed body into it.
        match direction {
            Direction::Bearish => {
                let highs: Vec<f64> = window.iter().map(|c| c.high).collect();
                let Some(rolling_high) = max_of(&highs) else { continue };
                if rolling_high <= f64::EPSILON
                    || bar.high < rolling_high * (1.0 - extreme_tolerance)
                {
                    continue;
                }
                if !bar.is_bullish() {
                    continue;
                }
            }
            Direction::Bullish => {
                let lows: Vec<f64> = window.iter().map(|c| c.low).collect();
                let Some(rolling_low) = min_of(&lows) else { continue };
                if rolling_low <= f64::EPSILON || bar.low > rolling_low * (1.0 + extreme_tolerance)
                {
                    continue;
                }
                if !bar.is_bearish() {
                    continue;
                }
            }
        }
        match bar.body_ratio() {
            Some(share) if share >= MIN_BODY_SHARE => {}
            _ => continue,
        }

        // Run into the climax, measured from the opposite window extreme.
        let (extreme, run) = match direction {
            Direction::Bearish => {
                let base = min_of(&window.iter().map(|c| c.low).collect::<Vec<_>>())
                    .unwrap_or(bar.low);
                (bar.high, bar.high - base)
            }
            Direction::Bullish => {
                let base = max_of(&window.iter().map(|c| c.high).collect::<Vec<_>>())
                    .unwrap_or(bar.high);
                (bar.low, base - bar.low)
            }
        };
        if run <= f64::EPSILON {
            continue;
        }

        // Reversal trigger: the far side of the climax bar.
        let trigger = match direction {
            Direction::Bearish => bar.low,
            Direction::Bullish => bar.high,
        };
        let mut status = resolve_status(candles, i, trigger, direction);

        // A confirmed climax fails if the extreme is revisited soon after.
        if status == PatternStatus::Confirmed {
            let follow_end = (i + follow_up + 1).min(candles.len());
            let revisited = candles[i + 1..follow_end].iter().any(|c| match direction {
                Direction::Bearish => c.high >= extreme,
                Direction::Bullish => c.low <= extreme,
            });
            if revisited {
                status = PatternStatus::Failed;
            }
        }

        let next_bar_reversed = candles.get(i + 1).map_or(false, |next| match direction {
            Direction::Bearish => next.close < bar.close,
            Direction::Bullish => next.close > bar.close,
        });

        let mut card = ScoreCard::new();
        card.rule(
            "volume blowoff",
            true,
            volume_surge_points(bar.volume / avg_vol),
        )
        .rule(
            "extended range",
            bar.range() / avg_range >= 2.0,
            WIDE_RANGE_POINTS,
        )
        .rule("next bar reversed", next_bar_reversed, NEXT_BAR_REVERSAL_POINTS)
        .rule(
            "reversal confirmed",
            status == PatternStatus::Confirmed,
            REVERSAL_CONFIRMED_POINTS,
        );
        if direction == Direction::Bullish {
            // Exhaustion context for a selling climax: oversold simplified
            // RSI, only computed with a full warm-up of history.
            if let Some(rsi) = simple_rsi(candles, i) {
                card.rule("oversold into the low", rsi < 30.0, EXHAUSTED_RSI_POINTS);
            }
        }
        let reliability = card.total();

        let target = match direction {
            Direction::Bearish => extreme - run * FIB_RETRACE,
            Direction::Bullish => extreme + run * FIB_RETRACE,
        };
        let stop = match direction {
            Direction::Bearish => extreme * (1.0 + STOP_MARGIN),
            Direction::Bullish => extreme * (1.0 - STOP_MARGIN),
        };

        let key_points = vec![PeakValley {
            index: BarIndex(i),
            kind: match direction {
                Direction::Bearish => PivotKind::Peak,
                Direction::Bullish => PivotKind::Valley,
            },
            price: extreme,
            timestamp: bar.timestamp,
        }];
        let (key_dates, key_prices) = key_series(&key_points);
        let significance = if last_close > f64::EPSILON {
            reliability * (run / last_close) * SIGNIFICANCE_SCALE
        } else {
            0.0
        };

        let volume_pattern = format!(
            "climax volume {:.1}x the {avg_window}-bar average",
            bar.volume / avg_vol
        );

        results.push(PatternAnalysisResult {
            pattern_type,
            status,
            direction,
            reliability,
            significance,
            component: PatternComponent {
                start_index: BarIndex(i.saturating_sub(avg_window)),
                end_index: BarIndex(i),
                key_points,
                pattern_height: run,
                breakout_level: trigger,
                volume_pattern,
            },
            price_target: target,
            stop_loss: stop,
            breakout_expected: breakout_expected(candles, i, status),
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

static CLIMAX_PARAMS: &[ParamMeta] = &[
    ParamMeta::period("avg_window", 20.0, (10.0, 50.0, 5.0), "Average/extreme window in bars"),
    ParamMeta::ratio("min_volume_ratio", 2.0, (1.5, 5.0, 0.5), "Min volume multiple of average"),
    ParamMeta::ratio("min_range_ratio", 1.5, (1.0, 4.0, 0.5), "Min range multiple of average"),
    ParamMeta::period("follow_up", 8.0, (5.0, 10.0, 1.0), "Bars watched for a revisited extreme"),
    ParamMeta::ratio(
        "extreme_tolerance",
        0.02,
        (0.005, 0.05, 0.005),
        "Max relative distance from the rolling extreme",
    ),
];

impl ParameterizedFinder for BuyingClimaxFinder {
    fn param_meta() -> &'static [ParamMeta] {
        CLIMAX_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        let finder = Self {
            avg_window: get_period(params, "avg_window", 20)?,
            min_volume_ratio: params.get("min_volume_ratio").copied().unwrap_or(2.0),
            min_range_ratio: params.get("min_range_ratio").copied().unwrap_or(1.5),
            follow_up: get_period(params, "follow_up", 8)?,
            extreme_tolerance: get_ratio(params, "extreme_tolerance", 0.02)?,
        };
        finder.validate_config()?;
        Ok(finder)
    }

    fn finder_name() -> &'static str {
        "buying_climax"
    }
}

impl ParameterizedFinder for SellingClimaxFinder {
    fn param_meta() -> &'static [ParamMeta] {
        CLIMAX_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        let buying = BuyingClimaxFinder::with_params(params)?;
        Ok(Self {
            avg_window: buying.avg_window,
            min_volume_ratio: buying.min_volume_ratio,
            min_range_ratio: buying.min_range_ratio,
            follow_up: buying.follow_up,
            extreme_tolerance: buying.extreme_tolerance,
        })
    }

    fn finder_name() -> &'static str {
        "selling_climax"
    }
}
