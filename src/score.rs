//! Reliability scoring.
//!
//! Every finder builds its reliability through a [`ScoreCard`]: a base of 50
//! plus an ordered list of labeled adjustments, clamped to [0, 100] at the
//! end. The card records which rules fired so a score can be audited after
//! the fact instead of being a bare number out of an if/else ladder.

/// Base reliability before any evidence is weighed.
pub const BASE_SCORE: f64 = 50.0;

/// Volume-surge bonus tiers shared across finders: the ratio of an event
/// bar's volume to its recent average, against the bonus granted.
pub const VOLUME_SURGE_TIERS: [(f64, f64); 3] = [(5.0, 15.0), (3.0, 10.0), (2.0, 5.0)];

/// Bonus for a volume surge of `ratio` times the recent average. Highest
/// matching tier wins; below the lowest tier the bonus is 0.
#[inline]
pub fn volume_surge_points(ratio: f64) -> f64 {
    for (threshold, points) in VOLUME_SURGE_TIERS {
        if ratio >= threshold {
            return points;
        }
    }
    0.0
}

/// One applied adjustment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreEntry {
    pub label: &'static str,
    pub points: f64,
}

/// Ordered additive score builder.
#[derive(Debug, Clone)]
pub struct ScoreCard {
    base: f64,
    entries: Vec<ScoreEntry>,
}

impl Default for ScoreCard {
    fn default() -> Self {
        Self::new()
    }
}

impl ScoreCard {
    pub fn new() -> Self {
        Self::with_base(BASE_SCORE)
    }

    pub fn with_base(base: f64) -> Self {
        Self {
            base,
            entries: Vec::new(),
        }
    }

    /// Add `points` when `applies` holds. Negative points are penalties.
    pub fn rule(&mut self, label: &'static str, applies: bool, points: f64) -> &mut Self {
        if applies {
            self.entries.push(ScoreEntry { label, points });
        }
        self
    }

    /// Add a value-proportional bonus capped at `cap`. Non-finite or
    /// non-positive values contribute nothing.
    pub fn scaled(&mut self, label: &'static str, value: f64, cap: f64) -> &mut Self {
        if value.is_finite() && value > 0.0 {
            self.entries.push(ScoreEntry {
                label,
                points: value.min(cap),
            });
        }
        self
    }

    /// Rules applied so far, in order.
    pub fn entries(&self) -> &[ScoreEntry] {
        &self.entries
    }

    /// Final score, clamped to [0, 100].
    pub fn total(&self) -> f64 {
        let raw = self.base + self.entries.iter().map(|e| e.points).sum::<f64>();
        raw.clamp(0.0, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_only() {
        assert_eq!(ScoreCard::new().total(), BASE_SCORE);
    }

    #[test]
    fn test_rules_accumulate_in_order() {
        let mut card = ScoreCard::new();
        card.rule("breakout", true, 15.0)
            .rule("skipped", false, 40.0)
            .rule("penalty", true, -10.0);
        assert_eq!(card.total(), 55.0);
        assert_eq!(card.entries().len(), 2);
        assert_eq!(card.entries()[0].label, "breakout");
    }

    #[test]
    fn test_clamping() {
        let mut card = ScoreCard::new();
        card.rule("huge", true, 500.0);
        assert_eq!(card.total(), 100.0);

        let mut card = ScoreCard::new();
        card.rule("terrible", true, -500.0);
        assert_eq!(card.total(), 0.0);
    }

    #[test]
    fn test_scaled_cap_and_guards() {
        let mut card = ScoreCard::with_base(0.0);
        card.scaled("sym", 25.0, 15.0);
        assert_eq!(card.total(), 15.0);

        let mut card = ScoreCard::with_base(0.0);
        card.scaled("nan", f64::NAN, 15.0)
            .scaled("neg", -3.0, 15.0)
            .scaled("ok", 7.5, 15.0);
        assert_eq!(card.total(), 7.5);
        assert_eq!(card.entries().len(), 1);
    }

    #[test]
    fn test_volume_surge_tiers() {
        assert_eq!(volume_surge_points(1.9), 0.0);
        assert_eq!(volume_surge_points(2.0), 5.0);
        assert_eq!(volume_surge_points(3.5), 10.0);
        assert_eq!(volume_surge_points(5.0), 15.0);
        assert_eq!(volume_surge_points(12.0), 15.0);
    }
}
