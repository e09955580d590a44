//! Chart formation finders.
//!
//! One module per pattern family. Every finder is a config struct with
//! sensible defaults plus a free function mirroring it for one-shot use.
//! Finders share a contract: called on any series, they return every match
//! they can justify and an empty vector otherwise - short, flat, or
//! degenerate input is never an error.

pub mod climax;
pub mod cup_handle;
pub mod double;
pub mod head_shoulders;
pub mod rounding;
pub mod wedge;

pub(crate) mod helpers;

use crate::{Candle, PatternAnalysisResult, PatternType, Result};

/// Common interface of all pattern finders.
pub trait PatternFinder {
    /// Stable snake_case identifier.
    fn name(&self) -> &'static str;

    /// Family this finder emits.
    fn pattern_type(&self) -> PatternType;

    /// Detect all instances in the series, oldest first.
    fn find(&self, candles: &[Candle]) -> Vec<PatternAnalysisResult>;

    /// Check config consistency.
    fn validate_config(&self) -> Result<()> {
        Ok(())
    }
}
