//! Trading calendar.
//!
//! Weekday check plus configured morning/afternoon clock windows. Public
//! holidays are not modeled; a holiday run degrades to a no-op upstream
//! because providers return unchanged data.

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

/// Morning/afternoon session boundaries and the close-of-day mark.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketHours {
    pub morning_open: NaiveTime,
    pub morning_close: NaiveTime,
    pub afternoon_open: NaiveTime,
    pub afternoon_close: NaiveTime,
}

impl Default for MarketHours {
    fn default() -> Self {
        Self {
            morning_open: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            morning_close: NaiveTime::from_hms_opt(11, 30, 0).unwrap(),
            afternoon_open: NaiveTime::from_hms_opt(13, 0, 0).unwrap(),
            afternoon_close: NaiveTime::from_hms_opt(15, 0, 0).unwrap(),
        }
    }
}

/// Calendar over the configured market hours.
#[derive(Debug, Clone)]
pub struct TradingCalendar {
    hours: MarketHours,
    pinned_now: Option<NaiveDateTime>,
}

impl TradingCalendar {
    /// Create a calendar over the wall clock.
    pub fn new(hours: MarketHours) -> Self {
        Self {
            hours,
            pinned_now: None,
        }
    }

    /// Calendar whose clock is pinned to a fixed instant, for tests and
    /// replays.
    pub fn pinned(hours: MarketHours, at: NaiveDateTime) -> Self {
        Self {
            hours,
            pinned_now: Some(at),
        }
    }

    /// Weekday check; Saturday and Sunday are never trading days.
    pub fn is_trading_day(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    }

    /// Whether `at` falls inside an active trading window.
    pub fn is_trading_time(&self, at: NaiveDateTime) -> bool {
        if !self.is_trading_day(at.date()) {
            return false;
        }
        let t = at.time();
        let morning = t >= self.hours.morning_open && t <= self.hours.morning_close;
        let afternoon = t >= self.hours.afternoon_open && t <= self.hours.afternoon_close;
        morning || afternoon
    }

    /// Whether `at` is a trading day past the afternoon close.
    pub fn is_after_close(&self, at: NaiveDateTime) -> bool {
        self.is_trading_day(at.date()) && at.time() > self.hours.afternoon_close
    }

    /// Current time in the market's local zone, or the pinned instant.
    pub fn now(&self) -> NaiveDateTime {
        self.pinned_now
            .unwrap_or_else(|| Local::now().naive_local())
    }

    /// Today's date in the market's local zone.
    pub fn today(&self) -> NaiveDate {
        self.now().date()
    }

    /// Configured market hours.
    pub fn hours(&self) -> &MarketHours {
        &self.hours
    }
}

impl Default for TradingCalendar {
    fn default() -> Self {
        Self::new(MarketHours::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(weekday_date: (i32, u32, u32), h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(weekday_date.0, weekday_date.1, weekday_date.2)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    // 2024-05-06 is a Monday, 2024-05-04 a Saturday.
    const MONDAY: (i32, u32, u32) = (2024, 5, 6);
    const SATURDAY: (i32, u32, u32) = (2024, 5, 4);

    #[test]
    fn test_sessions() {
        let cal = TradingCalendar::default();
        assert!(cal.is_trading_time(at(MONDAY, 10, 0)));
        assert!(cal.is_trading_time(at(MONDAY, 9, 30)));
        assert!(cal.is_trading_time(at(MONDAY, 14, 59)));
        // Lunch break and off-hours are outside the window.
        assert!(!cal.is_trading_time(at(MONDAY, 12, 0)));
        assert!(!cal.is_trading_time(at(MONDAY, 9, 0)));
        assert!(!cal.is_trading_time(at(MONDAY, 15, 30)));
    }

    #[test]
    fn test_weekend() {
        let cal = TradingCalendar::default();
        assert!(!cal.is_trading_time(at(SATURDAY, 10, 0)));
        assert!(!cal.is_after_close(at(SATURDAY, 16, 0)));
    }

    #[test]
    fn test_after_close() {
        let cal = TradingCalendar::default();
        assert!(cal.is_after_close(at(MONDAY, 15, 30)));
        assert!(!cal.is_after_close(at(MONDAY, 14, 0)));
    }

    #[test]
    fn test_pinned_clock() {
        let pin = at(MONDAY, 12, 0);
        let cal = TradingCalendar::pinned(MarketHours::default(), pin);
        assert_eq!(cal.now(), pin);
        assert_eq!(cal.today(), pin.date());
        assert!(!cal.is_trading_time(cal.now()));
    }
}
