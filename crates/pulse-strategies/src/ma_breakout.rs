//! Moving-average breakout rule.
//!
//! Buy when the close crosses above the slow moving average on expanded
//! volume, sell on the cross back below.

use crate::sma;
use pulse_core::traits::{Evaluation, SignalRule};
use pulse_core::types::{Bar, SignalAction};
use serde::{Deserialize, Serialize};

/// Configuration for the MA breakout rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaBreakoutConfig {
    /// Moving average period
    pub period: usize,
    /// Minimum breakout magnitude as a fraction of the average
    pub breakout_threshold: f64,
    /// Volume must exceed this multiple of the period's average volume
    pub volume_multiple: f64,
}

impl Default for MaBreakoutConfig {
    fn default() -> Self {
        Self {
            period: 20,
            breakout_threshold: 0.005,
            volume_multiple: 1.2,
        }
    }
}

/// MA breakout rule.
pub struct MaBreakoutRule {
    config: MaBreakoutConfig,
}

impl MaBreakoutRule {
    /// Create the rule.
    pub fn new(config: MaBreakoutConfig) -> Self {
        Self { config }
    }
}

impl SignalRule for MaBreakoutRule {
    fn id(&self) -> &str {
        "ma_breakout"
    }

    fn name(&self) -> &str {
        "MA Breakout"
    }

    fn min_bars(&self) -> usize {
        self.config.period + 1
    }

    fn evaluate(&self, bars: &[Bar]) -> Option<Evaluation> {
        if bars.len() < self.config.period + 1 {
            return None;
        }
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();

        let avg_now = sma(&closes, self.config.period)?;
        let avg_prev = sma(&closes[..closes.len() - 1], self.config.period)?;
        let today = bars.last()?;
        let prev_close = closes[closes.len() - 2];

        let crossed_up = prev_close <= avg_prev && today.close > avg_now;
        let crossed_down = prev_close >= avg_prev && today.close < avg_now;
        if !crossed_up && !crossed_down {
            return None;
        }

        let magnitude = (today.close - avg_now).abs() / avg_now;
        if magnitude < self.config.breakout_threshold {
            return None;
        }

        let avg_volume = sma(&volumes, self.config.period)?;
        let volume_ok = avg_volume > 0.0 && today.volume >= avg_volume * self.config.volume_multiple;

        // Magnitude maps to confidence; a quiet breakout is only half trusted.
        let mut confidence = (magnitude / (self.config.breakout_threshold * 4.0)).min(1.0);
        if !volume_ok {
            confidence *= 0.5;
        }

        let action = if crossed_up {
            SignalAction::Buy
        } else {
            SignalAction::Sell
        };
        Some(Evaluation::new(confidence, action))
    }

    fn description(&self) -> &str {
        "Trades closes crossing the slow moving average with a volume filter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn flat_bars(n: usize, close: f64, volume: f64) -> Vec<Bar> {
        (0..n)
            .map(|i| {
                let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
                    + chrono::Days::new(i as u64);
                Bar::new(date, close, close, close, close, volume, close * volume)
            })
            .collect()
    }

    #[test]
    fn test_breakout_above_is_buy() {
        let rule = MaBreakoutRule::new(MaBreakoutConfig::default());
        let mut bars = flat_bars(30, 100.0, 1000.0);
        let last = bars.last_mut().unwrap();
        last.close = 103.0;
        last.volume = 2000.0;

        let eval = rule.evaluate(&bars).unwrap();
        assert_eq!(eval.action, SignalAction::Buy);
        assert!(eval.confidence > 0.0);
    }

    #[test]
    fn test_breakdown_below_is_sell() {
        let rule = MaBreakoutRule::new(MaBreakoutConfig::default());
        let mut bars = flat_bars(30, 100.0, 1000.0);
        let last = bars.last_mut().unwrap();
        last.close = 97.0;

        let eval = rule.evaluate(&bars).unwrap();
        assert_eq!(eval.action, SignalAction::Sell);
    }

    #[test]
    fn test_quiet_breakout_halves_confidence() {
        let config = MaBreakoutConfig::default();
        let rule = MaBreakoutRule::new(config.clone());

        let mut loud = flat_bars(30, 100.0, 1000.0);
        let last = loud.last_mut().unwrap();
        last.close = 103.0;
        last.volume = 2000.0;

        let mut quiet = flat_bars(30, 100.0, 1000.0);
        let last = quiet.last_mut().unwrap();
        last.close = 103.0;
        last.volume = 900.0;

        let loud_eval = rule.evaluate(&loud).unwrap();
        let quiet_eval = rule.evaluate(&quiet).unwrap();
        assert!(quiet_eval.confidence < loud_eval.confidence);
    }

    #[test]
    fn test_no_cross_declines() {
        let rule = MaBreakoutRule::new(MaBreakoutConfig::default());
        let bars = flat_bars(30, 100.0, 1000.0);
        assert!(rule.evaluate(&bars).is_none());
    }

    #[test]
    fn test_insufficient_window_declines() {
        let rule = MaBreakoutRule::new(MaBreakoutConfig::default());
        let bars = flat_bars(10, 100.0, 1000.0);
        assert!(rule.evaluate(&bars).is_none());
    }
}
