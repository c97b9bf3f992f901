//! Current signal set.
//!
//! One namespace keyed by `instrument_id:strategy_id`. Ordering is applied
//! at read time: every equity entry lists before every fund entry, each
//! block sorted by confidence descending then computation time descending.

use pulse_core::types::Signal;
use pulse_data::{BarStore, QuoteCache};
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory store of the latest signal per (instrument, strategy).
pub struct SignalStore {
    signals: RwLock<HashMap<String, Signal>>,
}

impl SignalStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            signals: RwLock::new(HashMap::new()),
        }
    }

    /// Insert or overwrite the signal for its (instrument, strategy) pair.
    /// The previous signal for the pair is superseded, not accumulated.
    pub fn upsert(&self, mut signal: Signal) {
        signal.is_latest = true;
        self.signals
            .write()
            .unwrap()
            .insert(signal.store_key(), signal);
    }

    /// Atomically replace the whole signal set (full-refresh path): one
    /// write-lock acquisition, never a clear followed by trickled inserts.
    pub fn replace_all(&self, signals: Vec<Signal>) {
        let mut map = HashMap::with_capacity(signals.len());
        for mut signal in signals {
            signal.is_latest = true;
            map.insert(signal.store_key(), signal);
        }
        *self.signals.write().unwrap() = map;
    }

    /// Drop every signal.
    pub fn clear(&self) {
        self.signals.write().unwrap().clear();
    }

    /// List signals, optionally for one strategy, in presentation order:
    /// equities before funds, each block by confidence descending then
    /// computed_at descending.
    pub fn list(&self, strategy_id: Option<&str>) -> Vec<Signal> {
        let map = self.signals.read().unwrap();
        let mut out: Vec<Signal> = map
            .values()
            .filter(|s| strategy_id.map_or(true, |id| s.strategy_id == id))
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            a.category
                .list_rank()
                .cmp(&b.category.list_rank())
                .then_with(|| {
                    b.confidence
                        .partial_cmp(&a.confidence)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| b.computed_at.cmp(&a.computed_at))
        });
        out
    }

    /// Get the signal for one (instrument, strategy) pair.
    pub fn get(&self, instrument_id: &str, strategy_id: &str) -> Option<Signal> {
        self.signals
            .read()
            .unwrap()
            .get(&format!("{instrument_id}:{strategy_id}"))
            .cloned()
    }

    /// Overlay the freshest known price onto each signal: the live-quote
    /// cache first, the last stored bar close as the fallback. Lookups key
    /// on the fully-qualified instrument id, never the display code.
    pub fn enrich_with_latest_price(
        &self,
        signals: &mut [Signal],
        quotes: &QuoteCache,
        bars: &BarStore,
    ) {
        for signal in signals.iter_mut() {
            if let Some(quote) = quotes.get(&signal.instrument_id) {
                signal.price = quote.price;
                signal.change_percent = quote.change_percent;
            } else if let Some(last) = bars.get_recent(&signal.instrument_id, 1).last() {
                signal.price = last.close;
            }
        }
    }

    /// Number of stored signals.
    pub fn len(&self) -> usize {
        self.signals.read().unwrap().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SignalStore {
    fn default() -> Self {
        Self::new()
    }
}
