//! Tunable-threshold metadata for the pattern finders.
//!
//! Every finder exposes its geometry thresholds (lookbacks, tolerances,
//! volume multiples) as a static table of [`ParamMeta`], and can be rebuilt
//! from a name/value map via [`ParameterizedFinder::with_params`]. On top of
//! that, [`sweep`] walks the cartesian product of each parameter's step
//! range and yields one fully validated finder per admissible combination,
//! which is what a threshold calibration run iterates over.
//!
//! ```rust
//! use chartscan::params::{sweep, ParameterizedFinder};
//! use chartscan::prelude::*;
//!
//! for meta in RisingWedgeFinder::param_meta() {
//!     println!("{} = {} ({})", meta.name, meta.default, meta.description);
//! }
//! let candidates: Vec<RisingWedgeFinder> = sweep();
//! assert!(!candidates.is_empty());
//! ```

use std::collections::HashMap;

use crate::{PatternError, Period, Ratio, Result};

/// How a parameter value is interpreted when a finder is rebuilt from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    /// Relative threshold or multiple. Fields constrained to 0..=1 are
    /// additionally checked by [`Ratio::new`] inside `with_params`.
    Ratio,
    /// Bar count; must be a positive whole number.
    Period,
}

/// Describes one tunable threshold of a finder.
#[derive(Debug, Clone)]
pub struct ParamMeta {
    /// Key used in the `with_params` map.
    pub name: &'static str,
    pub param_type: ParamType,
    pub default: f64,
    /// Inclusive lower bound of the admissible range.
    pub min: f64,
    /// Inclusive upper bound of the admissible range.
    pub max: f64,
    /// Increment between sweep candidates.
    pub step: f64,
    pub description: &'static str,
}

impl ParamMeta {
    pub const fn ratio(
        name: &'static str,
        default: f64,
        range: (f64, f64, f64),
        description: &'static str,
    ) -> Self {
        Self {
            name,
            param_type: ParamType::Ratio,
            default,
            min: range.0,
            max: range.1,
            step: range.2,
            description,
        }
    }

    pub const fn period(
        name: &'static str,
        default: f64,
        range: (f64, f64, f64),
        description: &'static str,
    ) -> Self {
        Self {
            name,
            param_type: ParamType::Period,
            default,
            min: range.0,
            max: range.1,
            step: range.2,
            description,
        }
    }

    /// Sweep candidates for this parameter, `min` to `max` inclusive.
    pub fn candidates(&self) -> Vec<f64> {
        let mut out = Vec::new();
        if self.step <= 0.0 {
            out.push(self.default);
            return out;
        }
        let mut v = self.min;
        while v <= self.max + f64::EPSILON {
            out.push(v);
            v += self.step;
        }
        out
    }

    /// Check a single value against this parameter's range and type.
    pub fn validate(&self, value: f64) -> Result<()> {
        if !value.is_finite() || value < self.min || value > self.max {
            return Err(PatternError::OutOfRange {
                field: self.name,
                value,
                min: self.min,
                max: self.max,
            });
        }
        if self.param_type == ParamType::Period && (value < 1.0 || value.fract() != 0.0) {
            return Err(PatternError::InvalidValue("period must be a positive whole number"));
        }
        Ok(())
    }
}

/// A finder whose thresholds can be enumerated and rebuilt from values.
///
/// `with_params` must run the finder's own `validate_config`, so cross-field
/// constraints (a wedge span below its lookback, a climax ratio at least
/// 1.0) reject a combination even when every value is inside its per-field
/// range. [`sweep`] relies on this to skip inadmissible grid points.
pub trait ParameterizedFinder: Sized {
    /// Static threshold table for this finder family.
    fn param_meta() -> &'static [ParamMeta];

    /// Rebuild the finder from a name/value map; absent keys keep their
    /// defaults.
    fn with_params(params: &HashMap<&str, f64>) -> Result<Self>;

    fn finder_name() -> &'static str;
}

/// All validated finder configurations over the cartesian product of the
/// parameter ranges. Combinations rejected by per-field validation or the
/// finder's cross-field checks are silently skipped.
pub fn sweep<F: ParameterizedFinder>() -> Vec<F> {
    let metas = F::param_meta();
    let grids: Vec<Vec<f64>> = metas.iter().map(ParamMeta::candidates).collect();
    let mut cursor = vec![0usize; grids.len()];
    let mut out = Vec::new();
    loop {
        let point: HashMap<&str, f64> = metas
            .iter()
            .enumerate()
            .map(|(axis, meta)| (meta.name, grids[axis][cursor[axis]]))
            .collect();
        let admissible = metas.iter().all(|m| m.validate(point[m.name]).is_ok());
        if admissible {
            if let Ok(finder) = F::with_params(&point) {
                out.push(finder);
            }
        }
        // Odometer over the per-parameter candidate lists.
        let mut axis = 0;
        loop {
            if axis == cursor.len() {
                return out;
            }
            cursor[axis] += 1;
            if cursor[axis] < grids[axis].len() {
                break;
            }
            cursor[axis] = 0;
            axis += 1;
        }
    }
}

/// Read a [`Ratio`] field from the map, falling back to its default.
pub fn get_ratio(params: &HashMap<&str, f64>, key: &str, default: f64) -> Result<Ratio> {
    Ratio::new(params.get(key).copied().unwrap_or(default))
}

/// Read a [`Period`] field from the map, falling back to its default.
pub fn get_period(params: &HashMap<&str, f64>, key: &str, default: usize) -> Result<Period> {
    Period::new(params.get(key).copied().unwrap_or(default as f64) as usize)
}
