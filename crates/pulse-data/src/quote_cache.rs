//! Short-TTL cache of the latest live quote per instrument.
//!
//! Backs price enrichment: a signal first looks here, then falls back to the
//! last stored bar close (funds are typically not refreshed intraday).

use pulse_core::types::Quote;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// In-memory live-quote cache keyed by fully-qualified instrument id.
pub struct QuoteCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, (Instant, Quote)>>,
}

impl QuoteCache {
    /// Create a cache with the given entry lifetime.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Store one quote.
    pub fn put(&self, quote: Quote) {
        self.entries
            .write()
            .unwrap()
            .insert(quote.instrument_id.clone(), (Instant::now(), quote));
    }

    /// Store a batch of quotes.
    pub fn put_all(&self, quotes: &[Quote]) {
        let mut entries = self.entries.write().unwrap();
        let now = Instant::now();
        for quote in quotes {
            entries.insert(quote.instrument_id.clone(), (now, quote.clone()));
        }
    }

    /// Get a quote if it is still fresh.
    pub fn get(&self, instrument_id: &str) -> Option<Quote> {
        let entries = self.entries.read().unwrap();
        let (at, quote) = entries.get(instrument_id)?;
        if at.elapsed() > self.ttl {
            return None;
        }
        Some(quote.clone())
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.write().unwrap().clear();
    }

    /// Number of entries, fresh or not.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
