//! Cup-and-handle detection.
//!
//! A rounded base between two rims of near-equal price, followed by a
//! shallow handle pullback shortly after the right rim. Breakout above the
//! rim level confirms; the target projects the cup depth above it.

use crate::finders::helpers::{
    breakout_expected, breakout_zone, describe, key_series, pivots_in_lookback, resolve_status,
    trading_implication, volume_pattern_label,
};
use crate::finders::PatternFinder;
use crate::pivots::{detect_pivots, PeakValley, PivotKind, Pivots};
use crate::score::{volume_surge_points, ScoreCard};
use crate::{
    BarIndex, Candle, Direction, PatternAnalysisResult, PatternComponent, PatternError,
    PatternStatus, PatternType, Period, Ratio, Result,
};

const RIM_SYMMETRY_POINTS: f64 = 15.0;
const CENTERED_BASE_POINTS: f64 = 10.0;
const QUIET_HANDLE_POINTS: f64 = 10.0;
const BREAKOUT_POINTS: f64 = 15.0;

#[derive(Debug, Clone)]
pub struct CupHandleFinder {
    pub lookback: Period,
    pub pivot_window: Period,
    /// Max relative price difference between the rims.
    pub rim_tolerance: Ratio,
    /// Min relative depth of the cup below the rims.
    pub min_cup_depth: Ratio,
    /// Min cup width in bars.
    pub min_cup_width: Period,
    /// Bars after the right rim inside which the handle must complete.
    pub handle_window: Period,
    /// Min relative depth of the handle pullback.
    pub min_handle_depth: Ratio,
}

impl Default for CupHandleFinder {
    fn default() -> Self {
        Self {
            lookback: Period::new_const(120),
            pivot_window: Period::new_const(3),
            rim_tolerance: Ratio::new_const(0.05),
            min_cup_depth: Ratio::new_const(0.10),
            min_cup_width: Period::new_const(15),
            handle_window: Period::new_const(15),
            min_handle_depth: Ratio::new_const(0.03),
        }
    }
}

impl PatternFinder for CupHandleFinder {
    fn name(&self) -> &'static str {
        "cup_and_handle"
    }

    fn pattern_type(&self) -> PatternType {
        PatternType::CupAndHandle
    }

    fn find(&self, candles: &[Candle]) -> Vec<PatternAnalysisResult> {
        let w = self.pivot_window.get();
        let pivots = detect_pivots(candles, w, w);
        find_cup_impl(candles, &pivots, self)
    }

    fn validate_config(&self) -> Result<()> {
        if self.min_cup_width.get() >= self.lookback.get() {
            return Err(PatternError::InvalidConfig(format!(
                "min cup width {} must be below lookback {}",
                self.min_cup_width.get(),
                self.lookback.get()
            )));
        }
        if self.min_handle_depth.get() >= self.min_cup_depth.get() {
            return Err(PatternError::InvalidConfig(
                "handle depth floor must be below cup depth floor".to_string(),
            ));
        }
        Ok(())
    }
}

/// Find cup-and-handle formations using precomputed pivots.
pub fn find_cup_and_handle(
    candles: &[Candle],
    pivots: &Pivots,
    lookback: usize,
) -> Vec<PatternAnalysisResult> {
    let finder = CupHandleFinder {
        lookback: Period::new(lookback.max(1)).unwrap_or_else(|_| Period::new_const(1)),
        ..Default::default()
    };
    find_cup_impl(candles, pivots, &finder)
}

fn find_cup_impl(
    candles: &[Candle],
    pivots: &Pivots,
    cfg: &CupHandleFinder,
) -> Vec<PatternAnalysisResult> {
    if candles.is_empty() {
        return Vec::new();
    }
    let peaks = pivots_in_lookback(&pivots.peaks, candles.len(), cfg.lookback.get());
    if peaks.len() < 2 {
        return Vec::new();
    }
    let last_index = candles.len() - 1;
    let last_close = candles[last_index].close;

    let mut results = Vec::new();
    for li in 0..peaks.len() {
        for ri in li + 1..peaks.len() {
            let (left_rim, right_rim) = (peaks[li], peaks[ri]);
            let width = right_rim.index.get() - left_rim.index.get();
            if width < cfg.min_cup_width.get() || width > cfg.lookback.get() {
                continue;
            }
            let rim_max = left_rim.price.max(right_rim.price);
            if rim_max <= f64::EPSILON {
                continue;
            }
            let rim_diff = (left_rim.price - right_rim.price).abs() / rim_max;
            if rim_diff > cfg.rim_tolerance.get() {
                continue;
            }

            // The bowl: every interior high stays below both rims.
            let interior = &candles[left_rim.index.get() + 1..right_rim.index.get()];
            let rim_min = left_rim.price.min(right_rim.price);
            if interior.iter().any(|c| c.high >= rim_min) {
                continue;
            }
            let (bottom_offset, bottom) = match interior
                .iter()
                .enumerate()
                .min_by(|a, b| a.1.low.partial_cmp(&b.1.low).unwrap_or(std::cmp::Ordering::Equal))
            {
                Some((i, c)) => (left_rim.index.get() + 1 + i, c.low),
                None => continue,
            };
            let rim_avg = (left_rim.price + right_rim.price) / 2.0;
            let cup_depth = rim_avg - bottom;
            if cup_depth / rim_avg < cfg.min_cup_depth.get() {
                continue;
            }

            // Handle: shallow pullback shortly after the right rim.
            let handle_start = right_rim.index.get() + 1;
            let handle_end = (handle_start + cfg.handle_window.get()).min(candles.len());
            if handle_start >= handle_end {
                continue;
            }
            let (handle_offset, handle_low) = candles[handle_start..handle_end]
                .iter()
                .enumerate()
                .min_by(|a, b| {
                    a.1.low
                        .partial_cmp(&b.1.low)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .map(|(i, c)| (handle_start + i, c.low))
                .unwrap_or((handle_start, right_rim.price));
            let handle_depth = right_rim.price - handle_low;
            let handle_ratio = handle_depth / right_rim.price;
            if handle_ratio < cfg.min_handle_depth.get() || handle_depth > cup_depth / 2.0 {
                continue;
            }

            let trigger = rim_max;
            let status = resolve_status(candles, handle_offset, trigger, Direction::Bullish);

            let cup_avg_vol = {
                let slice = &candles[left_rim.index.get()..=right_rim.index.get()];
                slice.iter().map(|c| c.volume).sum::<f64>() / slice.len() as f64
            };
            let handle_avg_vol = {
                let slice = &candles[handle_start..handle_end];
                slice.iter().map(|c| c.volume).sum::<f64>() / slice.len() as f64
            };

            // Bottom near the middle third of the cup reads as a rounded
            // base rather than a V.
            let third = width / 3;
            let centered = bottom_offset >= left_rim.index.get() + third
                && bottom_offset <= right_rim.index.get() - third;

            let mut card = ScoreCard::new();
            card.scaled(
                "rim symmetry",
                (1.0 - rim_diff / cfg.rim_tolerance.get()) * RIM_SYMMETRY_POINTS,
                RIM_SYMMETRY_POINTS,
            )
            .rule("centered base", centered, CENTERED_BASE_POINTS)
            .rule(
                "quiet handle",
                cup_avg_vol > f64::EPSILON && handle_avg_vol < cup_avg_vol,
                QUIET_HANDLE_POINTS,
            )
            .rule(
                "breakout observed",
                status == PatternStatus::Confirmed,
                BREAKOUT_POINTS,
            );
            if status == PatternStatus::Confirmed && cup_avg_vol > f64::EPSILON {
                card.rule(
                    "breakout volume surge",
                    true,
                    volume_surge_points(candles[last_index].volume / cup_avg_vol),
                );
            }
            let reliability = card.total();

            let target = trigger + cup_depth;
            // Stop at the handle low itself.
            let stop = handle_low;

            let bottom_point = PeakValley {
                index: BarIndex(bottom_offset),
                kind: PivotKind::Valley,
                price: bottom,
                timestamp: candles[bottom_offset].timestamp,
            };
            let handle_point = PeakValley {
                index: BarIndex(handle_offset),
                kind: PivotKind::Valley,
                price: handle_low,
                timestamp: candles[handle_offset].timestamp,
            };
            let key_points = vec![left_rim, bottom_point, right_rim, handle_point];
            let (key_dates, key_prices) = key_series(&key_points);
            let significance = if last_close > f64::EPSILON {
                reliability * (cup_depth / last_close)
            } else {
                0.0
            };

            results.push(PatternAnalysisResult {
                pattern_type: PatternType::CupAndHandle,
                status,
                direction: Direction::Bullish,
                reliability,
                significance,
                component: PatternComponent {
                    start_index: left_rim.index,
                    end_index: BarIndex(handle_offset),
                    key_points,
                    pattern_height: cup_depth,
                    breakout_level: trigger,
                    volume_pattern: volume_pattern_label(
                        candles,
                        left_rim.index.get(),
                        handle_offset,
                    ),
                },
                price_target: target,
                stop_loss: stop,
                breakout_expected: breakout_expected(candles, handle_offset, status),
                breakout_direction: Direction::Bullish,
                probable_breakout_zone: breakout_zone(trigger),
                description: describe(PatternType::CupAndHandle, status, target),
                trading_implication: trading_implication(
                    Direction::Bullish,
                    trigger,
                    target,
                    stop,
                ),
                key_dates,
                key_prices,
            });
        }
    }
    results
}

// ============================================================
// PARAMETERIZATION
// ============================================================

use crate::params::{get_period, get_ratio, ParamMeta, ParameterizedFinder};
use std::collections::HashMap;

static CUP_PARAMS: &[ParamMeta] = &[
    ParamMeta::period("lookback", 120.0, (40.0, 250.0, 10.0), "Trailing bars searched"),
    ParamMeta::period("pivot_window", 3.0, (2.0, 6.0, 1.0), "Pivot confirmation bars per side"),
    ParamMeta::ratio("rim_tolerance", 0.05, (0.01, 0.10, 0.01), "Max relative gap between rims"),
    ParamMeta::ratio("min_cup_depth", 0.10, (0.05, 0.30, 0.05), "Min relative cup depth"),
    ParamMeta::period("min_cup_width", 15.0, (10.0, 60.0, 5.0), "Min cup width in bars"),
    ParamMeta::period("handle_window", 15.0, (5.0, 30.0, 5.0), "Bars allowed for the handle"),
    ParamMeta::ratio("min_handle_depth", 0.03, (0.01, 0.08, 0.01), "Min relative handle depth"),
];

impl ParameterizedFinder for CupHandleFinder {
    fn param_meta() -> &'static [ParamMeta] {
        CUP_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        let finder = Self {
            lookback: get_period(params, "lookback", 120)?,
            pivot_window: get_period(params, "pivot_window", 3)?,
            rim_tolerance: get_ratio(params, "rim_tolerance", 0.05)?,
            min_cup_depth: get_ratio(params, "min_cup_depth", 0.10)?,
            min_cup_width: get_period(params, "min_cup_width", 15)?,
            handle_window: get_period(params, "handle_window", 15)?,
            min_handle_depth: get_ratio(params, "min_handle_depth", 0.03)?,
        };
        finder.validate_config()?;
        Ok(finder)
    }

    fn finder_name() -> &'static str {
        "cup_and_handle"
    }
}
