//! Per-instrument daily bar histories.
//!
//! One namespace keyed by fully-qualified instrument id, uniform for
//! equities and funds, so `clear_all` cannot miss a category. Each history
//! is strictly increasing by date; the bar for the in-progress day is
//! rewritten in place by intraday ticks.

use pulse_core::error::StoreError;
use pulse_core::types::Bar;
use std::collections::HashMap;
use std::sync::RwLock;

/// Outcome of applying an intraday bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Today's bar was created from an existing history
    Appended,
    /// Today's existing bar was rewritten in place
    Updated,
    /// Instrument has no prior history; tick ignored until the next backfill
    SkippedOrphan,
}

/// In-memory store of daily bar histories.
pub struct BarStore {
    histories: RwLock<HashMap<String, Vec<Bar>>>,
}

impl BarStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            histories: RwLock::new(HashMap::new()),
        }
    }

    /// Replace an instrument's full history (backfill path). Bars are sorted
    /// by date and duplicate dates collapsed.
    pub fn replace_history(&self, instrument_id: &str, mut bars: Vec<Bar>) {
        bars.sort_by_key(|b| b.date);
        bars.dedup_by_key(|b| b.date);
        self.histories
            .write()
            .unwrap()
            .insert(instrument_id.to_string(), bars);
    }

    /// Apply an intraday bar for the current trading day.
    ///
    /// An instrument with zero prior bars is skipped — a lone intraday tick
    /// must not seed a single-bar history; it waits for the next full
    /// backfill. A bar dated before the last stored bar is rejected.
    pub fn append_or_update_today(
        &self,
        instrument_id: &str,
        bar: Bar,
    ) -> Result<TickOutcome, StoreError> {
        let mut histories = self.histories.write().unwrap();
        let history = match histories.get_mut(instrument_id) {
            Some(h) if !h.is_empty() => h,
            _ => return Ok(TickOutcome::SkippedOrphan),
        };

        let last = history.last().copied().unwrap();
        if bar.date < last.date {
            return Err(StoreError::BarRejected {
                instrument_id: instrument_id.to_string(),
                reason: format!("date {} precedes last stored {}", bar.date, last.date),
            });
        }
        if bar.date == last.date {
            // Intraday rewrite: keep the day's open, widen the extremes.
            let slot = history.last_mut().unwrap();
            slot.high = slot.high.max(bar.high);
            slot.low = if slot.low == 0.0 { bar.low } else { slot.low.min(bar.low) };
            slot.close = bar.close;
            slot.volume = bar.volume;
            slot.amount = bar.amount;
            Ok(TickOutcome::Updated)
        } else {
            history.push(bar);
            Ok(TickOutcome::Appended)
        }
    }

    /// Last `n` bars for an instrument, oldest first.
    pub fn get_recent(&self, instrument_id: &str, n: usize) -> Vec<Bar> {
        let histories = self.histories.read().unwrap();
        match histories.get(instrument_id) {
            Some(bars) => {
                let start = bars.len().saturating_sub(n);
                bars[start..].to_vec()
            }
            None => Vec::new(),
        }
    }

    /// Number of bars stored for an instrument.
    pub fn history_len(&self, instrument_id: &str) -> usize {
        self.histories
            .read()
            .unwrap()
            .get(instrument_id)
            .map_or(0, Vec::len)
    }

    /// Remove every history, equities and funds alike.
    pub fn clear_all(&self) {
        self.histories.write().unwrap().clear();
    }

    /// Number of instruments with stored history.
    pub fn len(&self) -> usize {
        self.histories.read().unwrap().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for BarStore {
    fn default() -> Self {
        Self::new()
    }
}
