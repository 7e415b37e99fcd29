//! Quality gate over analyzer scores.
//!
//! Isolates the acceptability threshold so the retry policy and its tests
//! never hard-code the number.

/// Default acceptability threshold on the 0-10 score scale.
pub const DEFAULT_QUALITY_THRESHOLD: f64 = 8.0;

/// Verdict produced by [`ScoreGate::evaluate`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreVerdict {
    pub score: f64,
    pub acceptable: bool,
}

/// Threshold-based acceptability check. Pure and total.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreGate {
    threshold: f64,
}

impl ScoreGate {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// `acceptable` iff `score >= threshold`. Scores outside the 0-10
    /// convention are not clamped.
    pub fn evaluate(&self, score: f64) -> ScoreVerdict {
        ScoreVerdict {
            score,
            acceptable: score >= self.threshold,
        }
    }
}

impl Default for ScoreGate {
    fn default() -> Self {
        Self::new(DEFAULT_QUALITY_THRESHOLD)
    }
}
