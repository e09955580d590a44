//! # chartscan
//!
//! Chart formation detection and signal scoring over OHLCV candle series.
//!
//! The crate extracts pivots (local peaks/valleys), detects classical chart
//! patterns (double top/bottom, head-and-shoulders, cup-and-handle, rounding
//! formations, wedges, buying/selling climaxes), scores their reliability,
//! assigns a lifecycle status, and independently detects multi-timeframe
//! trend reversals with measured-move price targets.
//!
//! ## Quick Start
//!
//! ```rust
//! use chartscan::prelude::*;
//!
//! // Create a scanner with every builtin finder
//! let scanner = ScannerBuilder::new()
//!     .with_all_defaults()
//!     .build()
//!     .unwrap();
//!
//! // Scan your data
//! let candles: Vec<Candle> = vec![];
//! let patterns = scanner.scan(&candles).unwrap();
//! assert!(patterns.is_empty());
//! ```

pub mod finders;
pub mod indicators;
pub mod params;
pub mod pivots;
pub mod score;
pub mod trend;

pub mod prelude {
    pub use crate::{
        // Finders
        finders::climax::{
            find_buying_climaxes, find_selling_climaxes, BuyingClimaxFinder, SellingClimaxFinder,
        },
        finders::cup_handle::{find_cup_and_handle, CupHandleFinder},
        finders::double::{
            find_double_bottoms, find_double_tops, DoubleBottomFinder, DoubleTopFinder,
        },
        finders::head_shoulders::{
            find_head_and_shoulders, find_inverse_head_and_shoulders, HeadShouldersFinder,
            InverseHeadShouldersFinder,
        },
        finders::rounding::{
            find_rounding_bottoms, find_rounding_tops, RoundingBottomFinder, RoundingTopFinder,
        },
        finders::wedge::{
            find_falling_wedges, find_rising_wedges, FallingWedgeFinder, RisingWedgeFinder,
        },
        finders::PatternFinder,
        // Parameters
        params::{get_period, get_ratio, sweep, ParamMeta, ParamType, ParameterizedFinder},
        // Pivots
        pivots::{detect_pivots, PeakValley, PivotKind, Pivots},
        // Trend / reversal
        trend::{
            calculate_measured_move_targets, detect_trend_reversal, determine_trend_direction,
            MeasuredMoveTargets, TrendDirection, TrendReversalSignal,
        },
        // Parallel
        scan_parallel,
        // Engine
        validate_candles,
        BarIndex,
        BuiltinFinder,
        Candle,
        Direction,
        NoopObserver,
        PatternAnalysisResult,
        PatternComponent,
        PatternError,
        PatternScanner,
        PatternStatus,
        PatternType,
        Period,
        Ratio,
        Result,
        ScanFailure,
        ScanObserver,
        ScanResult,
        ScannerBuilder,
        TimeframeScan,
    };
}

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, PatternError>;

/// Errors that can occur during configuration or input validation.
///
/// Finders never fail on short or degenerate series - they return empty
/// result lists. `PatternError` is reserved for malformed configuration and
/// malformed candle data.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PatternError {
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Insufficient data: need {need} bars, got {got}")]
    InsufficientData { need: usize, got: usize },

    #[error("Invalid candle at index {index}: {reason}")]
    InvalidCandle { index: usize, reason: &'static str },
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Normalized value in range 0.0..=1.0
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Ratio(f64);

impl Ratio {
    /// Create a new Ratio, validating the value is in [0.0, 1.0]
    pub fn new(value: f64) -> Result<Self> {
        if value.is_nan() || value.is_infinite() {
            return Err(PatternError::InvalidValue(
                "Ratio cannot be NaN or infinite",
            ));
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(PatternError::OutOfRange {
                field: "Ratio",
                value,
                min: 0.0,
                max: 1.0,
            });
        }
        Ok(Self(value))
    }

    /// Create a Ratio from a compile-time constant (library internal use)
    #[doc(hidden)]
    pub const fn new_const(value: f64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl serde::Serialize for Ratio {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Ratio {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = f64::deserialize(d)?;
        Ratio::new(value).map_err(serde::de::Error::custom)
    }
}

/// Period (must be > 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Period(usize);

impl Period {
    /// Create a new Period, validating value is > 0
    pub fn new(value: usize) -> Result<Self> {
        if value == 0 {
            return Err(PatternError::InvalidValue("Period must be > 0"));
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl serde::Serialize for Period {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Period {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = usize::deserialize(d)?;
        Period::new(value).map_err(serde::de::Error::custom)
    }
}

/// Offset of a bar within its candle series.
///
/// Bar offsets are the addressing mechanism across the crate: pivot positions
/// and pattern start/end points are series offsets, never timestamps. The
/// newtype keeps them from mixing with counts such as lookbacks or window
/// widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BarIndex(pub usize);

impl BarIndex {
    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl serde::Serialize for BarIndex {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for BarIndex {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        Ok(BarIndex(usize::deserialize(d)?))
    }
}

impl std::fmt::Display for BarIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================
// CANDLE
// ============================================================

/// One OHLCV bar. Timestamps are epoch seconds; bars in a series are ordered
/// by timestamp ascending and addressed by offset ([`BarIndex`]).
///
/// The symbol lives at scan level ([`ScanResult`]), not per bar - every bar
/// of one series shares it.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Candle {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub timestamp: i64,
}

impl Candle {
    pub fn new(open: f64, high: f64, low: f64, close: f64, volume: f64, timestamp: i64) -> Self {
        Self {
            open,
            high,
            low,
            close,
            volume,
            timestamp,
        }
    }

    #[inline]
    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    #[inline]
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    #[inline]
    pub fn upper_shadow(&self) -> f64 {
        self.high - self.open.max(self.close)
    }

    #[inline]
    pub fn lower_shadow(&self) -> f64 {
        self.open.min(self.close) - self.low
    }

    #[inline]
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    #[inline]
    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    /// Body as ratio of range. Returns None if range is ~0.
    #[inline]
    pub fn body_ratio(&self) -> Option<f64> {
        let range = self.range();
        (range > f64::EPSILON).then(|| self.body() / range)
    }

    /// Validate candle data consistency.
    pub fn validate(&self) -> Result<()> {
        if self.high < self.low {
            return Err(PatternError::InvalidCandle {
                index: 0,
                reason: "high < low",
            });
        }
        let fields = [self.open, self.high, self.low, self.close, self.volume];
        if fields.iter().any(|v| v.is_nan()) {
            return Err(PatternError::InvalidCandle {
                index: 0,
                reason: "NaN in candle",
            });
        }
        if fields.iter().any(|v| v.is_infinite()) {
            return Err(PatternError::InvalidCandle {
                index: 0,
                reason: "Infinite value in candle",
            });
        }
        if self.volume < 0.0 {
            return Err(PatternError::InvalidCandle {
                index: 0,
                reason: "negative volume",
            });
        }
        Ok(())
    }
}

/// Validate a whole series, tagging errors with the offending bar offset.
pub fn validate_candles(candles: &[Candle]) -> Result<()> {
    for (i, candle) in candles.iter().enumerate() {
        candle.validate().map_err(|e| match e {
            PatternError::InvalidCandle { reason, .. } => {
                PatternError::InvalidCandle { index: i, reason }
            }
            other => other,
        })?;
    }
    Ok(())
}

// ============================================================
// PATTERN CLASSIFICATION
// ============================================================

/// Expected breakout direction of a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Direction {
    Bullish,
    Bearish,
}

impl Direction {
    #[inline]
    pub fn is_bullish(self) -> bool {
        matches!(self, Direction::Bullish)
    }

    #[inline]
    pub fn is_bearish(self) -> bool {
        matches!(self, Direction::Bearish)
    }

    #[inline]
    pub fn opposite(self) -> Self {
        match self {
            Direction::Bullish => Direction::Bearish,
            Direction::Bearish => Direction::Bullish,
        }
    }
}

/// Lifecycle stage of a detected pattern relative to its trigger level.
///
/// `Forming -> {Completed | Confirmed} -> Failed`. Status is recomputed from
/// scratch on every call; there is no persisted pattern identity across
/// calls. `Failed` is only reachable from `Confirmed` (climax families); the
/// wedge and double-extreme finders drop invalidated patterns from the result
/// set instead of flipping them to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PatternStatus {
    /// Detected, but the breakout is not yet due.
    Forming,
    /// Geometry finished, breakout not observed.
    Completed,
    /// Breakout beyond the trigger level observed.
    Confirmed,
    /// Price later invalidated a confirmed pattern.
    Failed,
}

/// Pattern family of a detection result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum PatternType {
    DoubleTop,
    DoubleBottom,
    HeadAndShoulders,
    InverseHeadAndShoulders,
    CupAndHandle,
    RoundingTop,
    RoundingBottom,
    RisingWedge,
    FallingWedge,
    BuyingClimax,
    SellingClimax,
}

impl PatternType {
    pub fn name(&self) -> &'static str {
        match self {
            PatternType::DoubleTop => "double top",
            PatternType::DoubleBottom => "double bottom",
            PatternType::HeadAndShoulders => "head and shoulders",
            PatternType::InverseHeadAndShoulders => "inverse head and shoulders",
            PatternType::CupAndHandle => "cup and handle",
            PatternType::RoundingTop => "rounding top",
            PatternType::RoundingBottom => "rounding bottom",
            PatternType::RisingWedge => "rising wedge",
            PatternType::FallingWedge => "falling wedge",
            PatternType::BuyingClimax => "buying climax",
            PatternType::SellingClimax => "selling climax",
        }
    }

    /// Breakout direction this family resolves toward.
    pub fn typical_direction(&self) -> Direction {
        match self {
            PatternType::DoubleTop
            | PatternType::HeadAndShoulders
            | PatternType::RoundingTop
            | PatternType::RisingWedge
            | PatternType::BuyingClimax => Direction::Bearish,
            PatternType::DoubleBottom
            | PatternType::InverseHeadAndShoulders
            | PatternType::CupAndHandle
            | PatternType::RoundingBottom
            | PatternType::FallingWedge
            | PatternType::SellingClimax => Direction::Bullish,
        }
    }
}

// ============================================================
// RESULT RECORDS
// ============================================================

/// Geometric anchor points of a detected pattern.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PatternComponent {
    pub start_index: BarIndex,
    pub end_index: BarIndex,
    /// Pivots that define the structure, chronological order.
    pub key_points: Vec<pivots::PeakValley>,
    /// Vertical amplitude of the formation in price units.
    pub pattern_height: f64,
    /// Trigger level whose breach confirms the pattern.
    pub breakout_level: f64,
    /// Categorical description of the volume behavior through the pattern.
    pub volume_pattern: String,
}

/// One detected pattern instance. Produced fresh per finder call, never
/// mutated; consumers are read-only.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PatternAnalysisResult {
    pub pattern_type: PatternType,
    pub status: PatternStatus,
    pub direction: Direction,
    /// Heuristic confidence, clamped to [0, 100].
    pub reliability: f64,
    /// Reliability scaled by relative amplitude (and recency for some
    /// families).
    pub significance: f64,
    pub component: PatternComponent,
    pub price_target: f64,
    pub stop_loss: f64,
    pub breakout_expected: bool,
    pub breakout_direction: Direction,
    /// Price band around the trigger level inside which the breakout is
    /// likely to resolve.
    pub probable_breakout_zone: (f64, f64),
    pub description: String,
    pub trading_implication: String,
    /// Timestamps of the key pivots, chronological order.
    pub key_dates: Vec<i64>,
    /// Prices of the key pivots, same order as `key_dates`.
    pub key_prices: Vec<f64>,
}

// ============================================================
// OBSERVER
// ============================================================

/// Diagnostics hook injected into the scanner. The core never logs; callers
/// that want visibility implement this and route it to their own sink.
pub trait ScanObserver: Send + Sync {
    fn on_finder_complete(&self, _finder: &'static str, _result_count: usize) {}
}

/// Default observer: drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ScanObserver for NoopObserver {}

// ============================================================
// BUILTIN FINDERS - enum dispatch
// ============================================================

use finders::climax::{BuyingClimaxFinder, SellingClimaxFinder};
use finders::cup_handle::CupHandleFinder;
use finders::double::{DoubleBottomFinder, DoubleTopFinder};
use finders::head_shoulders::{HeadShouldersFinder, InverseHeadShouldersFinder};
use finders::rounding::{RoundingBottomFinder, RoundingTopFinder};
use finders::wedge::{FallingWedgeFinder, RisingWedgeFinder};
use finders::PatternFinder;

/// All builtin pattern finders - fast path via enum dispatch.
#[derive(Debug, Clone)]
pub enum BuiltinFinder {
    DoubleTop(DoubleTopFinder),
    DoubleBottom(DoubleBottomFinder),
    HeadAndShoulders(HeadShouldersFinder),
    InverseHeadAndShoulders(InverseHeadShouldersFinder),
    CupAndHandle(CupHandleFinder),
    RoundingTop(RoundingTopFinder),
    RoundingBottom(RoundingBottomFinder),
    RisingWedge(RisingWedgeFinder),
    FallingWedge(FallingWedgeFinder),
    BuyingClimax(BuyingClimaxFinder),
    SellingClimax(SellingClimaxFinder),
}

impl BuiltinFinder {
    #[inline]
    pub fn find(&self, candles: &[Candle]) -> Vec<PatternAnalysisResult> {
        match self {
            Self::DoubleTop(f) => f.find(candles),
            Self::DoubleBottom(f) => f.find(candles),
            Self::HeadAndShoulders(f) => f.find(candles),
            Self::InverseHeadAndShoulders(f) => f.find(candles),
            Self::CupAndHandle(f) => f.find(candles),
            Self::RoundingTop(f) => f.find(candles),
            Self::RoundingBottom(f) => f.find(candles),
            Self::RisingWedge(f) => f.find(candles),
            Self::FallingWedge(f) => f.find(candles),
            Self::BuyingClimax(f) => f.find(candles),
            Self::SellingClimax(f) => f.find(candles),
        }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::DoubleTop(f) => f.name(),
            Self::DoubleBottom(f) => f.name(),
            Self::HeadAndShoulders(f) => f.name(),
            Self::InverseHeadAndShoulders(f) => f.name(),
            Self::CupAndHandle(f) => f.name(),
            Self::RoundingTop(f) => f.name(),
            Self::RoundingBottom(f) => f.name(),
            Self::RisingWedge(f) => f.name(),
            Self::FallingWedge(f) => f.name(),
            Self::BuyingClimax(f) => f.name(),
            Self::SellingClimax(f) => f.name(),
        }
    }

    pub fn validate_config(&self) -> Result<()> {
        match self {
            Self::DoubleTop(f) => f.validate_config(),
            Self::DoubleBottom(f) => f.validate_config(),
            Self::HeadAndShoulders(f) => f.validate_config(),
            Self::InverseHeadAndShoulders(f) => f.validate_config(),
            Self::CupAndHandle(f) => f.validate_config(),
            Self::RoundingTop(f) => f.validate_config(),
            Self::RoundingBottom(f) => f.validate_config(),
            Self::RisingWedge(f) => f.validate_config(),
            Self::FallingWedge(f) => f.validate_config(),
            Self::BuyingClimax(f) => f.validate_config(),
            Self::SellingClimax(f) => f.validate_config(),
        }
    }
}

// ============================================================
// SCANNER
// ============================================================

/// Scanner configuration.
#[derive(Debug, Clone, Default)]
pub struct ScannerConfig {
    pub min_reliability: Option<f64>,
    pub validate_data: bool,
    pub pattern_filter: Option<Vec<PatternType>>,
}

/// Runs a set of pattern finders over one candle series.
///
/// Each finder invocation is independent and side-effect-free; the scanner is
/// the only place results are aggregated and filtered.
pub struct PatternScanner {
    finders: Vec<BuiltinFinder>,
    config: ScannerConfig,
    observer: Box<dyn ScanObserver>,
}

impl PatternScanner {
    /// Scan the series with every configured finder, filtered per config.
    pub fn scan(&self, candles: &[Candle]) -> Result<Vec<PatternAnalysisResult>> {
        if self.config.validate_data {
            validate_candles(candles)?;
        }

        let mut results = Vec::new();
        for finder in &self.finders {
            let found = finder.find(candles);
            self.observer.on_finder_complete(finder.name(), found.len());
            results.extend(found.into_iter().filter(|r| self.should_include(r)));
        }
        Ok(results)
    }

    /// Scan several labeled series (e.g. weekly/daily/hourly) independently.
    /// No cross-series logic here; the reversal detector in [`trend`] is the
    /// component that actually relates timeframes to each other.
    pub fn scan_timeframes(&self, series: &[(&str, &[Candle])]) -> Result<Vec<TimeframeScan>> {
        series
            .iter()
            .map(|(label, candles)| {
                Ok(TimeframeScan {
                    timeframe: label.to_string(),
                    patterns: self.scan(candles)?,
                })
            })
            .collect()
    }

    fn should_include(&self, r: &PatternAnalysisResult) -> bool {
        if let Some(min) = self.config.min_reliability {
            if r.reliability < min {
                return false;
            }
        }
        if let Some(ref filter) = self.config.pattern_filter {
            if !filter.contains(&r.pattern_type) {
                return false;
            }
        }
        true
    }

    fn validate(&self) -> Result<()> {
        for f in &self.finders {
            f.validate_config()?;
        }
        Ok(())
    }
}

/// Patterns found on one timeframe of a multi-timeframe scan.
#[derive(Debug, Clone)]
pub struct TimeframeScan {
    pub timeframe: String,
    pub patterns: Vec<PatternAnalysisResult>,
}

// ============================================================
// BUILDER
// ============================================================

/// Builder for [`PatternScanner`] instances.
pub struct ScannerBuilder {
    finders: Vec<BuiltinFinder>,
    config: ScannerConfig,
    observer: Box<dyn ScanObserver>,
}

impl Default for ScannerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ScannerBuilder {
    pub fn new() -> Self {
        Self {
            finders: Vec::new(),
            config: ScannerConfig::default(),
            observer: Box::new(NoopObserver),
        }
    }

    /// Add every builtin finder with default configuration.
    pub fn with_all_defaults(mut self) -> Self {
        self.finders.extend([
            BuiltinFinder::DoubleTop(DoubleTopFinder::default()),
            BuiltinFinder::DoubleBottom(DoubleBottomFinder::default()),
            BuiltinFinder::HeadAndShoulders(HeadShouldersFinder::default()),
            BuiltinFinder::InverseHeadAndShoulders(InverseHeadShouldersFinder::default()),
            BuiltinFinder::CupAndHandle(CupHandleFinder::default()),
            BuiltinFinder::RoundingTop(RoundingTopFinder::default()),
            BuiltinFinder::RoundingBottom(RoundingBottomFinder::default()),
            BuiltinFinder::RisingWedge(RisingWedgeFinder::default()),
            BuiltinFinder::FallingWedge(FallingWedgeFinder::default()),
            BuiltinFinder::BuyingClimax(BuyingClimaxFinder::default()),
            BuiltinFinder::SellingClimax(SellingClimaxFinder::default()),
        ]);
        self
    }

    /// Add a single finder.
    #[allow(clippy::should_implement_trait)]
    pub fn add(mut self, finder: BuiltinFinder) -> Self {
        self.finders.push(finder);
        self
    }

    /// Add with config validation.
    pub fn add_checked(mut self, finder: BuiltinFinder) -> Result<Self> {
        finder.validate_config()?;
        self.finders.push(finder);
        Ok(self)
    }

    /// Drop results below this reliability.
    pub fn min_reliability(mut self, reliability: f64) -> Self {
        self.config.min_reliability = Some(reliability);
        self
    }

    /// Enable/disable candle validation before scanning.
    pub fn validate_data(mut self, enable: bool) -> Self {
        self.config.validate_data = enable;
        self
    }

    /// Keep only the given pattern families.
    pub fn only_patterns(mut self, types: impl IntoIterator<Item = PatternType>) -> Self {
        self.config.pattern_filter = Some(types.into_iter().collect());
        self
    }

    /// Install a diagnostics observer.
    pub fn observer<O: ScanObserver + 'static>(mut self, observer: O) -> Self {
        self.observer = Box::new(observer);
        self
    }

    /// Build the scanner.
    pub fn build(self) -> Result<PatternScanner> {
        let scanner = PatternScanner {
            finders: self.finders,
            config: self.config,
            observer: self.observer,
        };
        scanner.validate()?;
        Ok(scanner)
    }
}

// ============================================================
// PARALLEL SCANNING
// ============================================================

use rayon::prelude::*;

/// Result of scanning a single instrument.
#[derive(Debug)]
pub struct ScanResult {
    pub symbol: String,
    pub patterns: Vec<PatternAnalysisResult>,
}

/// Error from scanning a single instrument.
#[derive(Debug)]
pub struct ScanFailure {
    pub symbol: String,
    pub error: PatternError,
}

/// Parallel scanning of multiple instruments. Finders stay sequential and
/// deterministic within one series; parallelism is across symbols only.
pub fn scan_parallel<'a, I>(
    scanner: &PatternScanner,
    instruments: I,
) -> (Vec<ScanResult>, Vec<ScanFailure>)
where
    I: IntoParallelIterator<Item = (&'a str, &'a [Candle])>,
{
    let results: Vec<_> = instruments
        .into_par_iter()
        .map(|(symbol, candles)| {
            scanner
                .scan(candles)
                .map(|patterns| ScanResult {
                    symbol: symbol.to_string(),
                    patterns,
                })
                .map_err(|error| ScanFailure {
                    symbol: symbol.to_string(),
                    error,
                })
        })
        .collect();

    let mut successes = Vec::new();
    let mut errors = Vec::new();

    for result in results {
        match result {
            Ok(r) => successes.push(r),
            Err(e) => errors.push(e),
        }
    }

    (successes, errors)
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle::new(open, high, low, close, 1000.0, 0)
    }

    #[test]
    fn test_ratio_validation() {
        assert!(Ratio::new(0.0).is_ok());
        assert!(Ratio::new(1.0).is_ok());
        assert!(Ratio::new(0.5).is_ok());
        assert!(Ratio::new(-0.1).is_err());
        assert!(Ratio::new(1.1).is_err());
        assert!(Ratio::new(f64::NAN).is_err());
        assert!(Ratio::new(f64::INFINITY).is_err());
    }

    #[test]
    fn test_period_validation() {
        assert!(Period::new(1).is_ok());
        assert!(Period::new(100).is_ok());
        assert!(Period::new(0).is_err());
    }

    #[test]
    fn test_candle_geometry() {
        let c = bar(100.0, 110.0, 90.0, 105.0);
        assert_eq!(c.body(), 5.0);
        assert_eq!(c.range(), 20.0);
        assert!(c.is_bullish());
        assert!(!c.is_bearish());
        assert!((c.body_ratio().unwrap() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_candle_validation() {
        assert!(bar(100.0, 110.0, 90.0, 105.0).validate().is_ok());
        assert!(bar(100.0, 90.0, 110.0, 105.0).validate().is_err());
        assert!(bar(f64::NAN, 110.0, 90.0, 105.0).validate().is_err());

        let mut c = bar(100.0, 110.0, 90.0, 105.0);
        c.volume = -1.0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_validate_candles_reports_index() {
        let candles = vec![bar(100.0, 110.0, 90.0, 105.0), bar(100.0, 80.0, 90.0, 85.0)];
        match validate_candles(&candles) {
            Err(PatternError::InvalidCandle { index, .. }) => assert_eq!(index, 1),
            other => panic!("expected InvalidCandle, got {other:?}"),
        }
    }

    #[test]
    fn test_scanner_builder() {
        let scanner = ScannerBuilder::new().with_all_defaults().build();
        assert!(scanner.is_ok());
    }

    #[test]
    fn test_empty_scan() {
        let scanner = ScannerBuilder::new().with_all_defaults().build().unwrap();
        let candles: Vec<Candle> = vec![];
        let patterns = scanner.scan(&candles).unwrap();
        assert!(patterns.is_empty());
    }

    #[test]
    fn test_min_reliability_filter_drops_everything_above_scale() {
        let scanner = ScannerBuilder::new()
            .with_all_defaults()
            .min_reliability(101.0)
            .build()
            .unwrap();

        // Reliability is clamped to [0, 100], so nothing can pass.
        let candles: Vec<Candle> = (0..120)
            .map(|i| {
                let base = 100.0 + (i as f64 * 0.4).sin() * 10.0;
                Candle::new(base, base + 1.0, base - 1.0, base + 0.5, 1000.0, i)
            })
            .collect();
        let patterns = scanner.scan(&candles).unwrap();
        assert!(patterns.is_empty());
    }

    #[test]
    fn test_pattern_filter() {
        let scanner = ScannerBuilder::new()
            .with_all_defaults()
            .only_patterns([PatternType::CupAndHandle])
            .build()
            .unwrap();

        let candles: Vec<Candle> = (0..120)
            .map(|i| {
                let base = 100.0 + (i as f64 * 0.3).cos() * 8.0;
                Candle::new(base, base + 1.0, base - 1.0, base + 0.2, 1000.0, i)
            })
            .collect();
        let patterns = scanner.scan(&candles).unwrap();
        assert!(patterns
            .iter()
            .all(|p| p.pattern_type == PatternType::CupAndHandle));
    }

    #[test]
    fn test_observer_called_per_finder() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        #[derive(Clone)]
        struct Counter(Arc<AtomicUsize>);
        impl ScanObserver for Counter {
            fn on_finder_complete(&self, _finder: &'static str, _n: usize) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let calls = Arc::new(AtomicUsize::new(0));
        let scanner = ScannerBuilder::new()
            .with_all_defaults()
            .observer(Counter(calls.clone()))
            .build()
            .unwrap();

        let candles: Vec<Candle> = (0..50)
            .map(|i| Candle::new(100.0, 101.0, 99.0, 100.0, 1000.0, i))
            .collect();
        scanner.scan(&candles).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 11);
    }

    #[test]
    fn test_parallel_scan() {
        let scanner = ScannerBuilder::new().with_all_defaults().build().unwrap();

        let a: Vec<Candle> = (0..60)
            .map(|i| Candle::new(100.0, 101.0, 99.0, 100.0, 1000.0, i))
            .collect();
        let b: Vec<Candle> = (0..60)
            .map(|i| {
                let base = 100.0 + i as f64;
                Candle::new(base, base + 1.0, base - 1.0, base + 0.5, 1000.0, i)
            })
            .collect();

        let instruments: Vec<(&str, &[Candle])> = vec![("AAPL", &a), ("MSFT", &b)];
        let (results, errors) = scan_parallel(&scanner, instruments);
        assert_eq!(results.len(), 2);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_result_serde_roundtrip() {
        let result = PatternAnalysisResult {
            pattern_type: PatternType::DoubleTop,
            status: PatternStatus::Confirmed,
            direction: Direction::Bearish,
            reliability: 72.0,
            significance: 9.5,
            component: PatternComponent {
                start_index: BarIndex(10),
                end_index: BarIndex(20),
                key_points: vec![],
                pattern_height: 14.0,
                breakout_level: 90.0,
                volume_pattern: "balanced".to_string(),
            },
            price_target: 76.0,
            stop_loss: 105.0,
            breakout_expected: false,
            breakout_direction: Direction::Bearish,
            probable_breakout_zone: (89.1, 90.9),
            description: String::new(),
            trading_implication: String::new(),
            key_dates: vec![],
            key_prices: vec![],
        };

        let json = serde_json::to_string(&result).unwrap();
        let back: PatternAnalysisResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
    }
}
