//! Quote feed with provider fail-over.
//!
//! Providers are tried in reliability-biased priority order. Each attempt is
//! retried with jittered exponential backoff before falling through to the
//! next provider; only when every provider is exhausted does the feed return
//! `AllProvidersFailed`, in which case the caller must leave the bar store
//! untouched.

use pulse_core::error::ProviderError;
use pulse_core::traits::QuoteProvider;
use pulse_core::types::{Bar, Category, Instrument, Quote};
use rand::Rng;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Feed tuning knobs.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Retries per provider before failing over
    pub max_retries: u32,
    /// Base backoff between retries
    pub backoff_base: Duration,
    /// Upper bound of the random jitter added to each backoff
    pub backoff_jitter: Duration,
    /// Minimum spacing between requests to one provider
    pub min_request_spacing: Duration,
    /// Upper bound of the random jitter added to the spacing
    pub spacing_jitter: Duration,
    /// Rolling outcome window used to score provider reliability
    pub reliability_window: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base: Duration::from_millis(300),
            backoff_jitter: Duration::from_millis(200),
            min_request_spacing: Duration::from_millis(200),
            spacing_jitter: Duration::from_millis(100),
            reliability_window: 20,
        }
    }
}

/// Rolling success/failure record for one provider.
#[derive(Debug)]
struct RollingStats {
    outcomes: VecDeque<bool>,
    window: usize,
}

impl RollingStats {
    fn new(window: usize) -> Self {
        Self {
            outcomes: VecDeque::with_capacity(window),
            window,
        }
    }

    fn record(&mut self, success: bool) {
        if self.outcomes.len() == self.window {
            self.outcomes.pop_front();
        }
        self.outcomes.push_back(success);
    }

    /// Recent success rate; unproven providers score full marks so a fresh
    /// configuration keeps its configured priority order.
    fn score(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 1.0;
        }
        let ok = self.outcomes.iter().filter(|s| **s).count();
        ok as f64 / self.outcomes.len() as f64
    }
}

/// Uniform random duration in [0, max].
fn jittered(max: Duration) -> Duration {
    if max.is_zero() {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..=max.as_millis() as u64))
}

struct ProviderSlot {
    provider: Arc<dyn QuoteProvider>,
    stats: Mutex<RollingStats>,
    last_request: Mutex<Option<Instant>>,
}

/// Quote feed over an ordered set of providers.
pub struct QuoteFeed {
    slots: Vec<ProviderSlot>,
    config: FeedConfig,
}

impl QuoteFeed {
    /// Create a feed. Provider order is the configured priority; rolling
    /// reliability re-ranks it over time.
    pub fn new(providers: Vec<Arc<dyn QuoteProvider>>, config: FeedConfig) -> Self {
        let slots = providers
            .into_iter()
            .map(|provider| ProviderSlot {
                provider,
                stats: Mutex::new(RollingStats::new(config.reliability_window)),
                last_request: Mutex::new(None),
            })
            .collect();
        Self { slots, config }
    }

    /// Provider indices ordered by recent reliability, configured order as
    /// the tie-breaker.
    fn ordered_indices(&self) -> Vec<usize> {
        let mut indexed: Vec<(usize, f64)> = self
            .slots
            .iter()
            .enumerate()
            .map(|(i, slot)| (i, slot.stats.lock().unwrap().score()))
            .collect();
        indexed.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        indexed.into_iter().map(|(i, _)| i).collect()
    }

    /// Enforce minimum inter-request spacing (plus jitter) for one provider.
    async fn pace(&self, slot: &ProviderSlot) {
        let wait = {
            let last = slot.last_request.lock().unwrap();
            match *last {
                Some(at) => {
                    let jitter = jittered(self.config.spacing_jitter);
                    let spacing = self.config.min_request_spacing + jitter;
                    spacing.checked_sub(at.elapsed())
                }
                None => None,
            }
        };
        if let Some(wait) = wait {
            tokio::time::sleep(wait).await;
        }
        *slot.last_request.lock().unwrap() = Some(Instant::now());
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let base = self.config.backoff_base * 2u32.saturating_pow(attempt);
        base + jittered(self.config.backoff_jitter)
    }

    /// Run one operation against the providers with retry and fail-over.
    async fn with_failover<T, F, Fut>(&self, what: &str, mut op: F) -> Result<(T, String), ProviderError>
    where
        F: FnMut(Arc<dyn QuoteProvider>) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut attempts = 0usize;
        for index in self.ordered_indices() {
            let slot = &self.slots[index];
            let name = slot.provider.name().to_string();

            for retry in 0..self.config.max_retries {
                self.pace(slot).await;
                attempts += 1;
                match op(Arc::clone(&slot.provider)).await {
                    Ok(value) => {
                        slot.stats.lock().unwrap().record(true);
                        debug!(provider = %name, what, retry, "provider request ok");
                        return Ok((value, name));
                    }
                    Err(err) => {
                        slot.stats.lock().unwrap().record(false);
                        warn!(provider = %name, what, retry, error = %err, "provider request failed");
                        if !err.is_retryable() {
                            break;
                        }
                        if retry + 1 < self.config.max_retries {
                            tokio::time::sleep(self.backoff(retry)).await;
                        }
                    }
                }
            }
        }
        Err(ProviderError::AllProvidersFailed { attempts })
    }

    /// Fetch current quotes. Returns the quotes plus the provider that
    /// served them.
    pub async fn fetch_quotes(
        &self,
        instrument_ids: &[String],
    ) -> Result<(Vec<Quote>, String), ProviderError> {
        let ids = instrument_ids.to_vec();
        self.with_failover("quotes", move |provider| {
            let ids = ids.clone();
            async move { provider.fetch_quotes(&ids).await }
        })
        .await
    }

    /// Fetch daily bar history for one instrument.
    pub async fn fetch_daily_history(
        &self,
        instrument_id: &str,
        limit: usize,
    ) -> Result<(Vec<Bar>, String), ProviderError> {
        let id = instrument_id.to_string();
        self.with_failover("history", move |provider| {
            let id = id.clone();
            async move { provider.fetch_daily_history(&id, limit).await }
        })
        .await
    }

    /// Fetch the instrument universe for one category. Providers without a
    /// catalog endpoint are skipped rather than retried.
    pub async fn fetch_catalog(
        &self,
        category: Category,
    ) -> Result<(Vec<Instrument>, String), ProviderError> {
        self.with_failover("catalog", move |provider| async move {
            provider.fetch_catalog(category).await
        })
        .await
    }

    /// Number of configured providers.
    pub fn provider_count(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MockProvider;
    use chrono::Utc;

    fn quote(id: &str, price: f64) -> Quote {
        Quote {
            instrument_id: id.to_string(),
            price,
            change: 0.0,
            change_percent: 0.0,
            volume: 0.0,
            amount: 0.0,
            timestamp: Utc::now(),
        }
    }

    fn fast_config() -> FeedConfig {
        FeedConfig {
            max_retries: 2,
            backoff_base: Duration::from_millis(1),
            backoff_jitter: Duration::from_millis(1),
            min_request_spacing: Duration::from_millis(1),
            spacing_jitter: Duration::from_millis(1),
            reliability_window: 10,
        }
    }

    #[tokio::test]
    async fn test_failover_to_second_provider() {
        let primary = Arc::new(MockProvider::new("primary"));
        primary.fail_next(10);
        let secondary = Arc::new(MockProvider::new("secondary"));
        secondary.set_quote(quote("600519.SH", 1520.0));

        let feed = QuoteFeed::new(
            vec![primary.clone() as Arc<dyn QuoteProvider>, secondary.clone()],
            fast_config(),
        );

        let (quotes, provider) = feed
            .fetch_quotes(&["600519.SH".to_string()])
            .await
            .unwrap();
        assert_eq!(provider, "secondary");
        assert_eq!(quotes.len(), 1);
        // Primary was retried max_retries times before failing over.
        assert_eq!(primary.call_count(), 2);
    }

    #[tokio::test]
    async fn test_all_providers_failed() {
        let a = Arc::new(MockProvider::new("a"));
        a.fail_next(10);
        let b = Arc::new(MockProvider::new("b"));
        b.fail_next(10);

        let feed = QuoteFeed::new(
            vec![a as Arc<dyn QuoteProvider>, b],
            fast_config(),
        );

        let err = feed
            .fetch_quotes(&["600519.SH".to_string()])
            .await
            .unwrap_err();
        match err {
            ProviderError::AllProvidersFailed { attempts } => assert_eq!(attempts, 4),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_reliability_bias_prefers_healthy_provider() {
        let flaky = Arc::new(MockProvider::new("flaky"));
        let steady = Arc::new(MockProvider::new("steady"));
        steady.set_quote(quote("600519.SH", 1500.0));
        flaky.set_quote(quote("600519.SH", 1500.0));

        let feed = QuoteFeed::new(
            vec![flaky.clone() as Arc<dyn QuoteProvider>, steady.clone()],
            fast_config(),
        );

        // One fetch worth of failed retries is enough to demote the flaky
        // provider; the second warm-up fetch already goes to steady first.
        flaky.fail_next(4);
        for _ in 0..2 {
            let _ = feed.fetch_quotes(&["600519.SH".to_string()]).await;
        }

        let before = steady.call_count();
        let (_, provider) = feed
            .fetch_quotes(&["600519.SH".to_string()])
            .await
            .unwrap();
        assert_eq!(provider, "steady");
        assert_eq!(steady.call_count(), before + 1);
        // The flaky provider was not consulted again once it ranked lower.
        assert_eq!(flaky.call_count(), 2);
    }

    #[tokio::test]
    async fn test_catalog_failover() {
        let no_catalog = Arc::new(MockProvider::new("no-catalog"));
        no_catalog.fail_next(10);
        let with_catalog = Arc::new(MockProvider::new("with-catalog"));
        with_catalog.set_catalog(vec![pulse_core::types::Instrument::new(
            "600519.SH",
            "Kweichow Moutai",
            pulse_core::types::Category::Equity,
        )]);

        let feed = QuoteFeed::new(
            vec![no_catalog as Arc<dyn QuoteProvider>, with_catalog],
            fast_config(),
        );

        let (instruments, provider) = feed
            .fetch_catalog(pulse_core::types::Category::Equity)
            .await
            .unwrap();
        assert_eq!(provider, "with-catalog");
        assert_eq!(instruments.len(), 1);
    }
}
