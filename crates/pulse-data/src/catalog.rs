//! Instrument catalog.
//!
//! One uniform map keyed by fully-qualified instrument id; category is a
//! field on the instrument, never a storage partition. Refreshes are
//! category-aware: refreshing one category replaces that category's entries
//! and leaves the other category alone.

use crate::feed::QuoteFeed;
use pulse_core::error::{PulseError, PulseResult};
use pulse_core::types::{Category, Instrument};
use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;
use tracing::info;

/// The universe of tradable instruments.
pub struct InstrumentCatalog {
    instruments: RwLock<HashMap<String, Instrument>>,
}

impl InstrumentCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self {
            instruments: RwLock::new(HashMap::new()),
        }
    }

    /// Refresh the catalog from the feed.
    ///
    /// Always refreshes equities; funds only when `include_funds` is set.
    /// Each refreshed category is cleared before its new entries land, so
    /// repeated fund refreshes cannot accumulate stale fund entries, while
    /// an equities-only refresh never deletes existing funds.
    pub async fn refresh(&self, feed: &QuoteFeed, include_funds: bool) -> PulseResult<usize> {
        let (equities, provider) = feed.fetch_catalog(Category::Equity).await?;
        info!(count = equities.len(), provider = %provider, "refreshed equity universe");
        self.replace_category(Category::Equity, equities);

        if include_funds {
            let (funds, provider) = feed.fetch_catalog(Category::Fund).await?;
            info!(count = funds.len(), provider = %provider, "refreshed fund universe");
            self.replace_category(Category::Fund, funds);
        }

        Ok(self.len())
    }

    /// Replace all entries of one category.
    pub fn replace_category(&self, category: Category, instruments: Vec<Instrument>) {
        let mut map = self.instruments.write().unwrap();
        map.retain(|_, inst| inst.category != category);
        for inst in instruments {
            map.insert(inst.id.clone(), inst);
        }
    }

    /// Load a seed universe from a CSV file with `id,name,category` columns.
    /// Used when no configured provider serves a catalog endpoint.
    pub fn load_universe_csv(&self, path: &Path) -> PulseResult<usize> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)
            .map_err(|e| PulseError::Config(format!("universe file {path:?}: {e}")))?;

        let mut loaded = 0usize;
        let mut map = self.instruments.write().unwrap();
        for result in reader.records() {
            let record =
                result.map_err(|e| PulseError::Config(format!("universe file {path:?}: {e}")))?;
            let id = record.get(0).unwrap_or_default().trim();
            let name = record.get(1).unwrap_or_default().trim();
            let category = match record.get(2).unwrap_or_default().trim() {
                "fund" => Category::Fund,
                _ => Category::Equity,
            };
            if id.is_empty() {
                continue;
            }
            let inst = Instrument::new(id, name, category);
            map.insert(inst.id.clone(), inst);
            loaded += 1;
        }
        info!(count = loaded, path = %path.display(), "loaded universe seed file");
        Ok(loaded)
    }

    /// List instruments, optionally filtered by category, ordered by id for
    /// deterministic batching.
    pub fn list(&self, category: Option<Category>) -> Vec<Instrument> {
        let map = self.instruments.read().unwrap();
        let mut out: Vec<Instrument> = map
            .values()
            .filter(|inst| category.map_or(true, |c| inst.category == c))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    /// Look up one instrument.
    pub fn get(&self, instrument_id: &str) -> Option<Instrument> {
        self.instruments.read().unwrap().get(instrument_id).cloned()
    }

    /// Total instrument count.
    pub fn len(&self) -> usize {
        self.instruments.read().unwrap().len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InstrumentCatalog {
    fn default() -> Self {
        Self::new()
    }
}
