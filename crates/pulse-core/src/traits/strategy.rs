//! Signal rule trait definitions.

use crate::types::{Bar, SignalAction};

/// Outcome of evaluating one strategy rule over a bar window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    /// Confidence in [0, 1]
    pub confidence: f64,
    /// Directional classification
    pub action: SignalAction,
}

impl Evaluation {
    /// Create an evaluation, clamping confidence into [0, 1].
    pub fn new(confidence: f64, action: SignalAction) -> Self {
        Self {
            confidence: confidence.clamp(0.0, 1.0),
            action,
        }
    }
}

/// A pure per-instrument signal rule.
///
/// Rules receive the bar window ordered oldest to newest (the last bar is
/// the current trading day) and either produce an evaluation or decline.
/// Rules hold no per-instrument state; the engine owns batching, history
/// requirements and persistence.
pub trait SignalRule: Send + Sync {
    /// Unique strategy id, e.g. "volume_surge".
    fn id(&self) -> &str;

    /// Human-readable strategy name.
    fn name(&self) -> &str;

    /// Minimum number of bars this rule needs. The engine enforces its own
    /// floor on top of this.
    fn min_bars(&self) -> usize;

    /// Evaluate the rule over a bar window.
    ///
    /// # Returns
    /// * `Some(Evaluation)` when the rule has an opinion on the latest bar
    /// * `None` when conditions are not met
    fn evaluate(&self, bars: &[Bar]) -> Option<Evaluation>;

    /// Get a description of the rule.
    fn description(&self) -> &str {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluation_clamps_confidence() {
        let eval = Evaluation::new(1.7, SignalAction::Buy);
        assert!((eval.confidence - 1.0).abs() < f64::EPSILON);

        let eval = Evaluation::new(-0.2, SignalAction::Sell);
        assert_eq!(eval.confidence, 0.0);
    }
}
