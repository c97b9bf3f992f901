//! Daily OHLCV bar.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One daily OHLCV record for an instrument.
///
/// Bar sequences are strictly increasing by date. The bar for the current
/// trading day may be rewritten in place by intraday ticks but is never
/// duplicated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Trading date
    pub date: NaiveDate,
    /// Opening price
    pub open: f64,
    /// Highest price
    pub high: f64,
    /// Lowest price
    pub low: f64,
    /// Closing price (latest price for the in-progress day)
    pub close: f64,
    /// Traded volume (shares/units)
    pub volume: f64,
    /// Traded amount (currency)
    pub amount: f64,
}

impl Bar {
    /// Create a new bar.
    pub fn new(
        date: NaiveDate,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
        amount: f64,
    ) -> Self {
        Self {
            date,
            open,
            high,
            low,
            close,
            volume,
            amount,
        }
    }

    /// Percentage change of close versus open.
    #[inline]
    pub fn intraday_change_percent(&self) -> f64 {
        if self.open == 0.0 {
            0.0
        } else {
            (self.close - self.open) / self.open * 100.0
        }
    }

    /// Check if the bar is bullish (close > open).
    #[inline]
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_intraday_change_percent() {
        let bar = Bar::new(date(2024, 5, 6), 100.0, 104.0, 99.0, 102.0, 1000.0, 102_000.0);
        assert!((bar.intraday_change_percent() - 2.0).abs() < 1e-9);
        assert!(bar.is_bullish());
    }

    #[test]
    fn test_zero_open_guard() {
        let bar = Bar::new(date(2024, 5, 6), 0.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        assert_eq!(bar.intraday_change_percent(), 0.0);
    }
}
