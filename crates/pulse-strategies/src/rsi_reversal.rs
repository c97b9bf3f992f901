//! RSI reversal rule.
//!
//! Buy when RSI turns up out of oversold territory, sell when it turns down
//! out of overbought territory.

use pulse_core::traits::{Evaluation, SignalRule};
use pulse_core::types::{Bar, SignalAction};
use serde::{Deserialize, Serialize};

/// Configuration for the RSI reversal rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RsiReversalConfig {
    /// RSI lookback period
    pub period: usize,
    /// Oversold threshold
    pub oversold: f64,
    /// Overbought threshold
    pub overbought: f64,
}

impl Default for RsiReversalConfig {
    fn default() -> Self {
        Self {
            period: 14,
            oversold: 30.0,
            overbought: 70.0,
        }
    }
}

/// RSI reversal rule.
pub struct RsiReversalRule {
    config: RsiReversalConfig,
}

impl RsiReversalRule {
    /// Create the rule.
    pub fn new(config: RsiReversalConfig) -> Self {
        Self { config }
    }
}

/// Wilder-smoothed RSI over the full close series; `None` below
/// `period + 1` values.
fn rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for i in 1..=period {
        let delta = closes[i] - closes[i - 1];
        if delta > 0.0 {
            avg_gain += delta;
        } else {
            avg_loss += -delta;
        }
    }
    avg_gain /= period as f64;
    avg_loss /= period as f64;

    for i in (period + 1)..closes.len() {
        let delta = closes[i] - closes[i - 1];
        let (gain, loss) = if delta > 0.0 { (delta, 0.0) } else { (0.0, -delta) };
        avg_gain = (avg_gain * (period as f64 - 1.0) + gain) / period as f64;
        avg_loss = (avg_loss * (period as f64 - 1.0) + loss) / period as f64;
    }

    if avg_loss == 0.0 {
        return Some(100.0);
    }
    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

impl SignalRule for RsiReversalRule {
    fn id(&self) -> &str {
        "rsi_reversal"
    }

    fn name(&self) -> &str {
        "RSI Reversal"
    }

    fn min_bars(&self) -> usize {
        self.config.period + 2
    }

    fn evaluate(&self, bars: &[Bar]) -> Option<Evaluation> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let now = rsi(&closes, self.config.period)?;
        let prev = rsi(&closes[..closes.len() - 1], self.config.period)?;

        if prev <= self.config.oversold && now > prev {
            // Depth of the dip scales confidence.
            let confidence = 0.5 + (self.config.oversold - prev) / self.config.oversold * 0.5;
            return Some(Evaluation::new(confidence, SignalAction::Buy));
        }
        if prev >= self.config.overbought && now < prev {
            let confidence =
                0.5 + (prev - self.config.overbought) / (100.0 - self.config.overbought) * 0.5;
            return Some(Evaluation::new(confidence, SignalAction::Sell));
        }
        None
    }

    fn description(&self) -> &str {
        "Trades RSI reversals out of oversold and overbought zones"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
                    + chrono::Days::new(i as u64);
                Bar::new(date, c, c, c, c, 1000.0, c * 1000.0)
            })
            .collect()
    }

    #[test]
    fn test_rsi_bounds() {
        // Monotonic rise pins RSI at 100.
        let closes: Vec<f64> = (1..=30).map(|i| i as f64).collect();
        assert!((rsi(&closes, 14).unwrap() - 100.0).abs() < 1e-9);

        // Monotonic fall pins it near 0.
        let closes: Vec<f64> = (1..=30).rev().map(|i| i as f64).collect();
        assert!(rsi(&closes, 14).unwrap() < 1.0);

        assert!(rsi(&[1.0, 2.0], 14).is_none());
    }

    #[test]
    fn test_oversold_turn_is_buy() {
        // Long slide, then a bounce on the final bar.
        let mut closes: Vec<f64> = (0..25).map(|i| 100.0 - i as f64 * 2.0).collect();
        closes.push(closes.last().unwrap() + 5.0);
        let rule = RsiReversalRule::new(RsiReversalConfig::default());
        let eval = rule.evaluate(&bars_from_closes(&closes)).unwrap();
        assert_eq!(eval.action, SignalAction::Buy);
        assert!(eval.confidence >= 0.5);
    }

    #[test]
    fn test_overbought_turn_is_sell() {
        let mut closes: Vec<f64> = (0..25).map(|i| 100.0 + i as f64 * 2.0).collect();
        closes.push(closes.last().unwrap() - 5.0);
        let rule = RsiReversalRule::new(RsiReversalConfig::default());
        let eval = rule.evaluate(&bars_from_closes(&closes)).unwrap();
        assert_eq!(eval.action, SignalAction::Sell);
    }

    #[test]
    fn test_mid_range_declines() {
        let closes: Vec<f64> = (0..30)
            .map(|i| 100.0 + if i % 2 == 0 { 1.0 } else { -1.0 })
            .collect();
        let rule = RsiReversalRule::new(RsiReversalConfig::default());
        assert!(rule.evaluate(&bars_from_closes(&closes)).is_none());
    }
}
