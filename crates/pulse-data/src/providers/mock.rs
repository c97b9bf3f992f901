//! Scriptable in-memory provider for tests and offline runs.

use async_trait::async_trait;
use pulse_core::error::ProviderError;
use pulse_core::traits::QuoteProvider;
use pulse_core::types::{Bar, Category, Instrument, Quote};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// In-memory provider with scriptable data and failure injection.
pub struct MockProvider {
    name: String,
    quotes: Mutex<HashMap<String, Quote>>,
    histories: Mutex<HashMap<String, Vec<Bar>>>,
    catalog: Mutex<Vec<Instrument>>,
    /// Number of leading calls that fail before the provider recovers.
    fail_first: AtomicUsize,
    calls: AtomicUsize,
}

impl MockProvider {
    /// Create an empty mock provider.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            quotes: Mutex::new(HashMap::new()),
            histories: Mutex::new(HashMap::new()),
            catalog: Mutex::new(Vec::new()),
            fail_first: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    /// Script a quote.
    pub fn set_quote(&self, quote: Quote) {
        self.quotes
            .lock()
            .unwrap()
            .insert(quote.instrument_id.clone(), quote);
    }

    /// Script a bar history.
    pub fn set_history(&self, instrument_id: impl Into<String>, bars: Vec<Bar>) {
        self.histories.lock().unwrap().insert(instrument_id.into(), bars);
    }

    /// Script the catalog.
    pub fn set_catalog(&self, instruments: Vec<Instrument>) {
        *self.catalog.lock().unwrap() = instruments;
    }

    /// Make the next `n` calls fail with `Unavailable`.
    pub fn fail_next(&self, n: usize) {
        self.fail_first.store(n, Ordering::SeqCst);
    }

    /// Total calls observed (including failed ones).
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn gate(&self) -> Result<(), ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.fail_first.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_first.store(remaining - 1, Ordering::SeqCst);
            return Err(ProviderError::Unavailable {
                provider: self.name.clone(),
                reason: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl QuoteProvider for MockProvider {
    async fn fetch_quotes(&self, instrument_ids: &[String]) -> Result<Vec<Quote>, ProviderError> {
        self.gate()?;
        let quotes = self.quotes.lock().unwrap();
        Ok(instrument_ids
            .iter()
            .filter_map(|id| quotes.get(id).cloned())
            .collect())
    }

    async fn fetch_daily_history(
        &self,
        instrument_id: &str,
        limit: usize,
    ) -> Result<Vec<Bar>, ProviderError> {
        self.gate()?;
        let histories = self.histories.lock().unwrap();
        let bars = histories.get(instrument_id).cloned().unwrap_or_default();
        let start = bars.len().saturating_sub(limit);
        Ok(bars[start..].to_vec())
    }

    async fn fetch_catalog(&self, category: Category) -> Result<Vec<Instrument>, ProviderError> {
        self.gate()?;
        Ok(self
            .catalog
            .lock()
            .unwrap()
            .iter()
            .filter(|i| i.category == category)
            .cloned()
            .collect())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
