//! Indicator primitives used by the finders and the reversal detector.
//!
//! All functions are pure over slices and never panic on short input: a
//! series shorter than the warm-up yields an empty vector. Outputs are
//! compact (no leading NaN padding): `sma(values, p)` aligns its first
//! element with `values[p - 1]`.

use crate::Candle;

/// Guarded max over a possibly-empty slice. NaN entries are skipped.
#[inline]
pub fn max_of(values: &[f64]) -> Option<f64> {
    values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .reduce(f64::max)
}

/// Guarded min over a possibly-empty slice. NaN entries are skipped.
#[inline]
pub fn min_of(values: &[f64]) -> Option<f64> {
    values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .reduce(f64::min)
}

/// Simple moving average. Output length is `len - period + 1`.
pub fn sma(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(values.len() - period + 1);
    let mut sum: f64 = values[..period].iter().sum();
    out.push(sum / period as f64);
    for i in period..values.len() {
        sum += values[i] - values[i - period];
        out.push(sum / period as f64);
    }
    out
}

/// Exponential moving average seeded with the SMA of the first `period`
/// values. Output length is `len - period + 1`.
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }
    let alpha = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len() - period + 1);
    let mut current: f64 = values[..period].iter().sum::<f64>() / period as f64;
    out.push(current);
    for &v in &values[period..] {
        current = (v - current) * alpha + current;
        out.push(current);
    }
    out
}

/// MACD line and signal line.
///
/// The MACD line starts at offset `slow - 1` of the input; the signal line
/// is the EMA of the MACD line and starts `signal - 1` entries later.
pub fn macd(
    values: &[f64],
    fast: usize,
    slow: usize,
    signal: usize,
) -> (Vec<f64>, Vec<f64>) {
    if fast == 0 || slow == 0 || fast >= slow || values.len() < slow {
        return (Vec::new(), Vec::new());
    }
    let fast_ema = ema(values, fast);
    let slow_ema = ema(values, slow);
    // Align: fast_ema has (slow - fast) extra leading entries.
    let offset = slow - fast;
    let line: Vec<f64> = slow_ema
        .iter()
        .enumerate()
        .map(|(i, s)| fast_ema[i + offset] - s)
        .collect();
    let signal_line = ema(&line, signal);
    (line, signal_line)
}

/// Wilder RSI. Output length is `len - period`; first element corresponds to
/// `values[period]`. Returns 100 when there are no losses in the window.
pub fn rsi(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() <= period {
        return Vec::new();
    }
    let mut gains = 0.0;
    let mut losses = 0.0;
    for w in values[..=period].windows(2) {
        let delta = w[1] - w[0];
        if delta >= 0.0 {
            gains += delta;
        } else {
            losses -= delta;
        }
    }
    let mut avg_gain = gains / period as f64;
    let mut avg_loss = losses / period as f64;

    let mut out = Vec::with_capacity(values.len() - period);
    let to_rsi = |gain: f64, loss: f64| {
        if loss <= f64::EPSILON {
            100.0
        } else {
            100.0 - 100.0 / (1.0 + gain / loss)
        }
    };
    out.push(to_rsi(avg_gain, avg_loss));

    for w in values[period..].windows(2) {
        let delta = w[1] - w[0];
        let (gain, loss) = if delta >= 0.0 {
            (delta, 0.0)
        } else {
            (0.0, -delta)
        };
        avg_gain = (avg_gain * (period as f64 - 1.0) + gain) / period as f64;
        avg_loss = (avg_loss * (period as f64 - 1.0) + loss) / period as f64;
        out.push(to_rsi(avg_gain, avg_loss));
    }
    out
}

/// Trailing-window maximum. Output length is `len - window + 1`; element `i`
/// covers `values[i..i + window]`.
pub fn rolling_max(values: &[f64], window: usize) -> Vec<f64> {
    if window == 0 || values.len() < window {
        return Vec::new();
    }
    values
        .windows(window)
        .map(|w| max_of(w).unwrap_or(f64::NEG_INFINITY))
        .collect()
}

/// Trailing-window minimum. Same alignment as [`rolling_max`].
pub fn rolling_min(values: &[f64], window: usize) -> Vec<f64> {
    if window == 0 || values.len() < window {
        return Vec::new();
    }
    values
        .windows(window)
        .map(|w| min_of(w).unwrap_or(f64::INFINITY))
        .collect()
}

/// Least-squares slope of `values` against their offsets 0..n.
/// Returns 0.0 for fewer than 2 points or a degenerate denominator.
pub fn slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let nf = n as f64;
    let sum_x = (n * (n - 1)) as f64 / 2.0;
    let sum_y: f64 = values.iter().sum();
    let sum_xy: f64 = values.iter().enumerate().map(|(i, v)| i as f64 * v).sum();
    let sum_x2: f64 = (0..n).map(|i| (i * i) as f64).sum();

    let denom = nf * sum_x2 - sum_x * sum_x;
    if denom.abs() <= f64::EPSILON {
        return 0.0;
    }
    (nf * sum_xy - sum_x * sum_y) / denom
}

/// On-balance volume, cumulative, same length as the input.
pub fn obv(candles: &[Candle]) -> Vec<f64> {
    let mut out = Vec::with_capacity(candles.len());
    let mut total = 0.0;
    for (i, c) in candles.iter().enumerate() {
        if i > 0 {
            let prev_close = candles[i - 1].close;
            if c.close > prev_close {
                total += c.volume;
            } else if c.close < prev_close {
                total -= c.volume;
            }
        }
        out.push(total);
    }
    out
}

/// Close-location value of one bar, in [-1, 1]. Zero-range bars contribute 0.
#[inline]
fn clv(c: &Candle) -> f64 {
    let range = c.range();
    if range <= f64::EPSILON {
        return 0.0;
    }
    ((c.close - c.low) - (c.high - c.close)) / range
}

/// Accumulation/distribution line, cumulative, same length as the input.
pub fn ad_line(candles: &[Candle]) -> Vec<f64> {
    let mut out = Vec::with_capacity(candles.len());
    let mut total = 0.0;
    for c in candles {
        total += clv(c) * c.volume;
        out.push(total);
    }
    out
}

/// Money flow index. Output length is `len - period`; first element
/// corresponds to `candles[period]`. Returns 100 for windows with no
/// negative flow, 50 for windows with no flow at all.
pub fn money_flow_index(candles: &[Candle], period: usize) -> Vec<f64> {
    if period == 0 || candles.len() <= period {
        return Vec::new();
    }
    let typical: Vec<f64> = candles
        .iter()
        .map(|c| (c.high + c.low + c.close) / 3.0)
        .collect();

    // Signed raw money flow per bar transition.
    let flows: Vec<f64> = typical
        .windows(2)
        .zip(&candles[1..])
        .map(|(w, c)| {
            let raw = w[1] * c.volume;
            if w[1] > w[0] {
                raw
            } else if w[1] < w[0] {
                -raw
            } else {
                0.0
            }
        })
        .collect();

    flows
        .windows(period)
        .map(|w| {
            let positive: f64 = w.iter().filter(|f| **f > 0.0).sum();
            let negative: f64 = -w.iter().filter(|f| **f < 0.0).sum::<f64>();
            if positive <= f64::EPSILON && negative <= f64::EPSILON {
                50.0
            } else if negative <= f64::EPSILON {
                100.0
            } else {
                100.0 - 100.0 / (1.0 + positive / negative)
            }
        })
        .collect()
}

/// Chaikin oscillator: EMA(3) minus EMA(10) of the A/D line. Output length
/// is `len - 10 + 1`.
pub fn chaikin_oscillator(candles: &[Candle]) -> Vec<f64> {
    let ad = ad_line(candles);
    if ad.len() < 10 {
        return Vec::new();
    }
    let fast = ema(&ad, 3);
    let slow = ema(&ad, 10);
    let offset = 10 - 3;
    slow.iter()
        .enumerate()
        .map(|(i, s)| fast[i + offset] - s)
        .collect()
}

/// Per-bar volume force: close-to-close change times volume. Same length as
/// the input; the first element is 0.
pub fn volume_force(candles: &[Candle]) -> Vec<f64> {
    let mut out = Vec::with_capacity(candles.len());
    out.push(0.0);
    for w in candles.windows(2) {
        out.push((w[1].close - w[0].close) * w[1].volume);
    }
    if candles.is_empty() {
        out.clear();
    }
    out
}
