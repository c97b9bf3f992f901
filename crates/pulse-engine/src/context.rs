//! Per-context storage clients.
//!
//! Every background job binds its own [`StoreClient`] from the shared
//! [`StoreFactory`] inside the execution context that will use it. The client
//! is deliberately `!Send`: it cannot migrate to another worker, which rules
//! out the historical class of failures where a client created on one event
//! loop was awaited from another. The factory itself is freely shareable.

use pulse_data::{BarStore, QuoteCache};
use std::marker::PhantomData;
use std::sync::Arc;

use crate::signal_store::SignalStore;

/// Shareable factory for context-bound store clients.
#[derive(Clone)]
pub struct StoreFactory {
    bars: Arc<BarStore>,
    signals: Arc<SignalStore>,
    quotes: Arc<QuoteCache>,
}

impl StoreFactory {
    /// Create a factory over the shared stores.
    pub fn new(bars: Arc<BarStore>, signals: Arc<SignalStore>, quotes: Arc<QuoteCache>) -> Self {
        Self {
            bars,
            signals,
            quotes,
        }
    }

    /// Bind a client for the current execution context. Call this inside the
    /// worker that runs the pass; never stash the client for a later pass.
    pub fn bind(&self) -> StoreClient {
        StoreClient {
            bars: Arc::clone(&self.bars),
            signals: Arc::clone(&self.signals),
            quotes: Arc::clone(&self.quotes),
            _context_bound: PhantomData,
        }
    }
}

/// Storage client bound to one execution context.
pub struct StoreClient {
    /// Bar history store
    pub bars: Arc<BarStore>,
    /// Current signal set
    pub signals: Arc<SignalStore>,
    /// Live quote cache
    pub quotes: Arc<QuoteCache>,
    // Raw pointer marker keeps the client off other threads.
    _context_bound: PhantomData<*const ()>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn factory() -> StoreFactory {
        StoreFactory::new(
            Arc::new(BarStore::new()),
            Arc::new(SignalStore::new()),
            Arc::new(QuoteCache::new(Duration::from_secs(60))),
        )
    }

    #[test]
    fn test_clients_share_underlying_stores() {
        let factory = factory();
        let a = factory.bind();
        let b = factory.bind();

        a.bars.replace_history(
            "600519.SH",
            vec![pulse_core::types::Bar::new(
                chrono::NaiveDate::from_ymd_opt(2024, 5, 6).unwrap(),
                1500.0,
                1520.0,
                1495.0,
                1510.0,
                1000.0,
                1_510_000.0,
            )],
        );
        assert_eq!(b.bars.history_len("600519.SH"), 1);
    }

    #[test]
    fn test_factory_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<StoreFactory>();
    }
}
