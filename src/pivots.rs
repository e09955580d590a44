//! Pivot (swing point) extraction.
//!
//! A peak is a bar whose high is strictly greater than every high in the
//! `left_bars` bars before it and the `right_bars` bars after it; a valley is
//! the mirror on lows. Bars too close to either boundary can never qualify,
//! so a pivot is only known `right_bars` bars after it prints.

use crate::{BarIndex, Candle};

/// Swing point classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PivotKind {
    Peak,
    Valley,
}

/// A confirmed swing point.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PeakValley {
    pub index: BarIndex,
    pub kind: PivotKind,
    pub price: f64,
    pub timestamp: i64,
}

/// Peaks and valleys of one series, each in ascending index order.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Pivots {
    pub peaks: Vec<PeakValley>,
    pub valleys: Vec<PeakValley>,
}

impl Pivots {
    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty() && self.valleys.is_empty()
    }

    /// Peaks and valleys merged in ascending index order.
    pub fn merged(&self) -> Vec<PeakValley> {
        let mut all: Vec<PeakValley> = self
            .peaks
            .iter()
            .chain(self.valleys.iter())
            .copied()
            .collect();
        all.sort_by_key(|p| p.index);
        all
    }
}

#[inline]
fn is_peak(candles: &[Candle], i: usize, left: usize, right: usize) -> bool {
    let hi = candles[i].high;
    candles[i - left..i].iter().all(|c| c.high < hi)
        && candles[i + 1..=i + right].iter().all(|c| c.high < hi)
}

#[inline]
fn is_valley(candles: &[Candle], i: usize, left: usize, right: usize) -> bool {
    let lo = candles[i].low;
    candles[i - left..i].iter().all(|c| c.low > lo)
        && candles[i + 1..=i + right].iter().all(|c| c.low > lo)
}

/// Detect all confirmed pivots with a symmetric strict-inequality window.
///
/// Only offsets `left_bars <= i < len - right_bars` are candidates. Flat
/// plateaus (ties) produce no pivot. A series shorter than
/// `left_bars + right_bars + 1` yields no pivots at all.
pub fn detect_pivots(candles: &[Candle], left_bars: usize, right_bars: usize) -> Pivots {
    let n = candles.len();
    if n < left_bars + right_bars + 1 {
        return Pivots::default();
    }

    let mut pivots = Pivots::default();
    for i in left_bars..n - right_bars {
        if is_peak(candles, i, left_bars, right_bars) {
            pivots.peaks.push(PeakValley {
                index: BarIndex(i),
                kind: PivotKind::Peak,
                price: candles[i].high,
                timestamp: candles[i].timestamp,
            });
        }
        if is_valley(candles, i, left_bars, right_bars) {
            pivots.valleys.push(PeakValley {
                index: BarIndex(i),
                kind: PivotKind::Valley,
                price: candles[i].low,
                timestamp: candles[i].timestamp,
            });
        }
    }
    pivots
}

/// Step-line variant: one value per bar, carrying the most recent confirmed
/// pivot price forward. `None` until the first pivot confirms. A pivot at
/// offset `i` becomes visible at `i + right_bars` (its confirmation bar).
pub fn forward_fill(
    candles: &[Candle],
    left_bars: usize,
    right_bars: usize,
    kind: PivotKind,
) -> Vec<Option<f64>> {
    let pivots = detect_pivots(candles, left_bars, right_bars);
    let source = match kind {
        PivotKind::Peak => &pivots.peaks,
        PivotKind::Valley => &pivots.valleys,
    };

    let mut out = vec![None; candles.len()];
    let mut last = None;
    let mut next = 0;
    for (i, slot) in out.iter_mut().enumerate() {
        while next < source.len() && source[next].index.get() + right_bars <= i {
            last = Some(source[next].price);
            next += 1;
        }
        *slot = last;
    }
    out
}
