//! Real-time quote, normalized at the provider boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A near-real-time quote for one instrument.
///
/// Provider-specific field names are normalized into this shape by each
/// provider adapter; nothing downstream sees vendor payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Exchange-qualified instrument id
    pub instrument_id: String,
    /// Latest traded price
    pub price: f64,
    /// Absolute change versus previous close
    pub change: f64,
    /// Percentage change versus previous close
    pub change_percent: f64,
    /// Cumulative traded volume for the day
    pub volume: f64,
    /// Cumulative traded amount for the day
    pub amount: f64,
    /// Quote timestamp
    pub timestamp: DateTime<Utc>,
}

impl Quote {
    /// Previous close implied by price and change.
    pub fn previous_close(&self) -> f64 {
        self.price - self.change
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_previous_close() {
        let quote = Quote {
            instrument_id: "600519.SH".to_string(),
            price: 1520.0,
            change: 20.0,
            change_percent: 1.33,
            volume: 3_000_000.0,
            amount: 4_500_000_000.0,
            timestamp: Utc::now(),
        };
        assert!((quote.previous_close() - 1500.0).abs() < 1e-9);
    }
}
