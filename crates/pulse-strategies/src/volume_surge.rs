//! Volume surge rule.
//!
//! Flags instruments whose volume jumped versus the previous trading day
//! while the price confirms the move. The ratio is strictly
//! today / yesterday, not an N-day average.

use crate::sma;
use pulse_core::traits::{Evaluation, SignalRule};
use pulse_core::types::{Bar, SignalAction};
use serde::{Deserialize, Serialize};

/// Configuration for the volume surge rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeSurgeConfig {
    /// Minimum today/yesterday volume ratio to consider a surge
    pub min_ratio: f64,
    /// Ratio at which confidence saturates
    pub max_ratio: f64,
    /// Minimum intraday gain (percent) for a buy classification
    pub min_gain_percent: f64,
}

impl Default for VolumeSurgeConfig {
    fn default() -> Self {
        Self {
            min_ratio: 1.5,
            max_ratio: 4.0,
            min_gain_percent: 1.0,
        }
    }
}

/// Volume surge rule.
pub struct VolumeSurgeRule {
    config: VolumeSurgeConfig,
}

impl VolumeSurgeRule {
    /// Create the rule.
    pub fn new(config: VolumeSurgeConfig) -> Self {
        Self { config }
    }
}

impl SignalRule for VolumeSurgeRule {
    fn id(&self) -> &str {
        "volume_surge"
    }

    fn name(&self) -> &str {
        "Volume Surge"
    }

    fn min_bars(&self) -> usize {
        2
    }

    fn evaluate(&self, bars: &[Bar]) -> Option<Evaluation> {
        let today = bars.last()?;
        let yesterday = bars.get(bars.len().checked_sub(2)?)?;
        if yesterday.volume == 0.0 {
            return None;
        }

        let ratio = today.volume / yesterday.volume;
        if ratio < self.config.min_ratio {
            return None;
        }

        let span = (self.config.max_ratio - self.config.min_ratio).max(f64::EPSILON);
        let confidence = (ratio - self.config.min_ratio) / span;

        let gain = today.intraday_change_percent();
        let action = if gain >= self.config.min_gain_percent {
            SignalAction::Buy
        } else if gain <= -self.config.min_gain_percent {
            // Heavy volume into a falling close reads as distribution.
            SignalAction::Sell
        } else {
            SignalAction::Hold
        };

        // Surges above a rising 20-day average close are worth more.
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let boosted = match sma(&closes, 20) {
            Some(avg) if today.close > avg => confidence + 0.1,
            _ => confidence,
        };

        Some(Evaluation::new(boosted, action))
    }

    fn description(&self) -> &str {
        "Flags day-over-day volume surges with price confirmation"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bars_with_last_two(yesterday_vol: f64, today_vol: f64, open: f64, close: f64) -> Vec<Bar> {
        let mut bars: Vec<Bar> = (1..=28)
            .map(|d| {
                let date = NaiveDate::from_ymd_opt(2024, 3, d).unwrap();
                Bar::new(date, 100.0, 101.0, 99.0, 100.0, 1000.0, 100_000.0)
            })
            .collect();
        let n = bars.len();
        bars[n - 2].volume = yesterday_vol;
        let last = &mut bars[n - 1];
        last.volume = today_vol;
        last.open = open;
        last.close = close;
        bars
    }

    #[test]
    fn test_surge_with_gain_is_buy() {
        let rule = VolumeSurgeRule::new(VolumeSurgeConfig::default());
        let bars = bars_with_last_two(1000.0, 3000.0, 100.0, 103.0);
        let eval = rule.evaluate(&bars).unwrap();
        assert_eq!(eval.action, SignalAction::Buy);
        assert!(eval.confidence > 0.0);
    }

    #[test]
    fn test_surge_with_drop_is_sell() {
        let rule = VolumeSurgeRule::new(VolumeSurgeConfig::default());
        let bars = bars_with_last_two(1000.0, 3000.0, 100.0, 97.0);
        let eval = rule.evaluate(&bars).unwrap();
        assert_eq!(eval.action, SignalAction::Sell);
    }

    #[test]
    fn test_no_surge_declines() {
        let rule = VolumeSurgeRule::new(VolumeSurgeConfig::default());
        let bars = bars_with_last_two(1000.0, 1100.0, 100.0, 103.0);
        assert!(rule.evaluate(&bars).is_none());
    }

    #[test]
    fn test_zero_yesterday_volume_declines() {
        let rule = VolumeSurgeRule::new(VolumeSurgeConfig::default());
        let bars = bars_with_last_two(0.0, 3000.0, 100.0, 103.0);
        assert!(rule.evaluate(&bars).is_none());
    }
}
