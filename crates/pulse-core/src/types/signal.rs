//! Computed trading signal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Category;

/// Directional classification produced by a strategy rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalAction {
    Buy,
    Hold,
    Sell,
}

impl std::fmt::Display for SignalAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalAction::Buy => write!(f, "buy"),
            SignalAction::Hold => write!(f, "hold"),
            SignalAction::Sell => write!(f, "sell"),
        }
    }
}

/// A computed signal for one instrument under one strategy.
///
/// Both the exchange-qualified id and the bare display code are stored
/// explicitly. Internal lookups (price enrichment, bar history) always use
/// `instrument_id`; `display_code` exists purely for presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Exchange-qualified instrument id, e.g. "600519.SH"
    pub instrument_id: String,
    /// Code without exchange suffix, e.g. "600519"
    pub display_code: String,
    /// Instrument name
    pub name: String,
    /// Equity or fund
    pub category: Category,
    /// Strategy that produced this signal
    pub strategy_id: String,
    /// Confidence in [0, 1]
    pub confidence: f64,
    /// Directional classification
    pub action: SignalAction,
    /// Today's volume divided by the previous trading day's volume,
    /// 0.0 when the previous day's volume is zero
    pub volume_ratio: f64,
    /// Latest known price at computation or enrichment time
    pub price: f64,
    /// Percentage change versus previous close
    pub change_percent: f64,
    /// When this signal was computed
    pub computed_at: DateTime<Utc>,
    /// Whether this is the most recent signal for (instrument, strategy)
    pub is_latest: bool,
}

impl Signal {
    /// Store key: one namespace keyed by `instrument_id:strategy_id`.
    pub fn store_key(&self) -> String {
        format!("{}:{}", self.instrument_id, self.strategy_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_key() {
        let signal = Signal {
            instrument_id: "600519.SH".to_string(),
            display_code: "600519".to_string(),
            name: "Kweichow Moutai".to_string(),
            category: Category::Equity,
            strategy_id: "volume_surge".to_string(),
            confidence: 0.8,
            action: SignalAction::Buy,
            volume_ratio: 1.5,
            price: 1520.0,
            change_percent: 1.33,
            computed_at: Utc::now(),
            is_latest: true,
        };
        assert_eq!(signal.store_key(), "600519.SH:volume_surge");
    }
}
