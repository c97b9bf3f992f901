//! Market data ingestion and stores.
//!
//! Provides the quote-provider adapters with fail-over, the instrument
//! catalog, the bar store and the short-TTL live-quote cache. The ingestion
//! pipeline exclusively owns the catalog and the bar store; other components
//! only read from them.

pub mod providers;
pub mod feed;
pub mod catalog;
pub mod bar_store;
pub mod quote_cache;

pub use bar_store::{BarStore, TickOutcome};
pub use catalog::InstrumentCatalog;
pub use feed::{FeedConfig, QuoteFeed};
pub use quote_cache::QuoteCache;
