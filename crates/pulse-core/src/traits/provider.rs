//! Quote provider trait definitions.

use crate::error::ProviderError;
use crate::types::{Bar, Category, Instrument, Quote};
use async_trait::async_trait;

/// Trait for upstream quote/history providers.
///
/// Each implementation normalizes its vendor payloads into the shared types
/// at this boundary. Providers are stateless with respect to the stores:
/// fetch results are merged by the caller, never written by the provider.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Fetch current quotes for a batch of instruments.
    ///
    /// # Arguments
    /// * `instrument_ids` - Non-empty set of exchange-qualified ids
    ///
    /// # Returns
    /// Quotes for the ids the provider recognized. Missing ids are not an
    /// error; a wholly failed request is.
    async fn fetch_quotes(&self, instrument_ids: &[String]) -> Result<Vec<Quote>, ProviderError>;

    /// Fetch up to `limit` most recent daily bars for one instrument,
    /// ordered oldest to newest.
    async fn fetch_daily_history(
        &self,
        instrument_id: &str,
        limit: usize,
    ) -> Result<Vec<Bar>, ProviderError>;

    /// Fetch the instrument universe for one category.
    ///
    /// Providers without a catalog endpoint return
    /// [`ProviderError::CatalogUnsupported`].
    async fn fetch_catalog(&self, category: Category) -> Result<Vec<Instrument>, ProviderError>;

    /// Get the provider name.
    fn name(&self) -> &str;
}
