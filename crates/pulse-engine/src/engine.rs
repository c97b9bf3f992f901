//! Signal computation passes.
//!
//! A pass runs inside one worker context: it binds its own store client,
//! walks the in-scope instruments under a bounded concurrency limit and
//! writes the resulting signal set. One instrument failing never aborts the
//! batch; outcomes are accumulated into the pass summary.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use pulse_core::error::PulseResult;
use pulse_core::traits::SignalRule;
use pulse_core::types::{Bar, Category, Instrument, Signal};
use pulse_strategies::StrategyRegistry;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::context::{StoreClient, StoreFactory};

/// Which part of the universe a pass covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    All,
    EquitiesOnly,
    FundsOnly,
}

impl Scope {
    /// Catalog filter for this scope; `None` means every category.
    pub fn category_filter(&self) -> Option<Category> {
        match self {
            Scope::All => None,
            Scope::EquitiesOnly => Some(Category::Equity),
            Scope::FundsOnly => Some(Category::Fund),
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::All => write!(f, "all"),
            Scope::EquitiesOnly => write!(f, "equities_only"),
            Scope::FundsOnly => write!(f, "funds_only"),
        }
    }
}

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Minimum bar count before a signal may be computed
    pub min_bars: usize,
    /// Bars handed to the strategy rule
    pub history_window: usize,
    /// Per-instrument concurrency bound within one pass
    pub concurrency: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_bars: 50,
            history_window: 60,
            concurrency: 10,
        }
    }
}

/// Outcome counts of one computation pass.
#[derive(Debug, Clone)]
pub struct PassSummary {
    pub strategy_id: String,
    pub computed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

enum Outcome {
    Computed(Box<Signal>),
    Skipped,
    Failed,
}

/// The signal engine.
pub struct SignalEngine {
    catalog: Arc<pulse_data::InstrumentCatalog>,
    registry: Arc<StrategyRegistry>,
    factory: StoreFactory,
    config: EngineConfig,
}

impl SignalEngine {
    /// Create an engine over the shared catalog, registry and stores.
    pub fn new(
        catalog: Arc<pulse_data::InstrumentCatalog>,
        registry: Arc<StrategyRegistry>,
        factory: StoreFactory,
        config: EngineConfig,
    ) -> Self {
        Self {
            catalog,
            registry,
            factory,
            config,
        }
    }

    /// Run one computation pass for a strategy.
    ///
    /// `force` together with `Scope::All` rebuilds the signal set from
    /// scratch: results are collected first and swapped in as one bulk
    /// write, so readers never observe a half-cleared store. Any other
    /// combination upserts incrementally and leaves out-of-scope signals
    /// untouched.
    pub async fn compute(
        &self,
        strategy_id: &str,
        scope: Scope,
        force: bool,
    ) -> PulseResult<PassSummary> {
        let started = Instant::now();
        let rule = self.registry.get(strategy_id)?;
        let instruments = self.catalog.list(scope.category_filter());

        // The client is bound here, inside the context running the pass.
        let client = self.factory.bind();
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));

        let full_rebuild = force && scope == Scope::All;
        let mut computed = 0usize;
        let mut skipped = 0usize;
        let mut failed = 0usize;
        let mut batch: Vec<Signal> = Vec::new();

        let mut outcomes = stream::iter(instruments.into_iter().map(|instrument| {
            let rule = Arc::clone(&rule);
            let semaphore = Arc::clone(&semaphore);
            let client = &client;
            async move {
                let _permit = semaphore.acquire().await.expect("semaphore closed");
                evaluate_instrument(client, rule.as_ref(), &instrument, &self.config)
            }
        }))
        .buffer_unordered(self.config.concurrency);

        while let Some(outcome) = outcomes.next().await {
            match outcome {
                Outcome::Computed(signal) => {
                    computed += 1;
                    if full_rebuild {
                        batch.push(*signal);
                    } else {
                        client.signals.upsert(*signal);
                    }
                }
                Outcome::Skipped => skipped += 1,
                Outcome::Failed => failed += 1,
            }
        }
        drop(outcomes);

        if full_rebuild {
            client.signals.replace_all(batch);
        }

        let summary = PassSummary {
            strategy_id: strategy_id.to_string(),
            computed,
            skipped,
            failed,
            elapsed: started.elapsed(),
        };
        info!(
            strategy = strategy_id,
            %scope,
            force,
            computed = summary.computed,
            skipped = summary.skipped,
            failed = summary.failed,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "signal pass finished"
        );
        Ok(summary)
    }

    /// Run one pass for every registered strategy, accumulating summaries.
    /// A full rebuild clears the store once up front, then the per-strategy
    /// passes write incrementally so earlier strategies' output survives.
    pub async fn compute_all(&self, scope: Scope, force: bool) -> PulseResult<Vec<PassSummary>> {
        if force && scope == Scope::All {
            self.factory.bind().signals.clear();
        }
        let mut summaries = Vec::new();
        for strategy_id in self.registry.ids() {
            summaries.push(self.compute(&strategy_id, scope, false).await?);
        }
        Ok(summaries)
    }

    /// Current enriched signal listing, equities before funds.
    pub fn list_signals(&self, strategy_id: Option<&str>) -> Vec<Signal> {
        let client = self.factory.bind();
        let mut signals = client.signals.list(strategy_id);
        client
            .signals
            .enrich_with_latest_price(&mut signals, &client.quotes, &client.bars);
        signals
    }
}

/// Today's volume over yesterday's; 0 when yesterday traded nothing.
fn volume_ratio(bars: &[Bar]) -> f64 {
    if bars.len() < 2 {
        return 0.0;
    }
    let today = bars[bars.len() - 1];
    let yesterday = bars[bars.len() - 2];
    if yesterday.volume == 0.0 {
        0.0
    } else {
        today.volume / yesterday.volume
    }
}

fn evaluate_instrument(
    client: &StoreClient,
    rule: &dyn SignalRule,
    instrument: &Instrument,
    config: &EngineConfig,
) -> Outcome {
    let window = config.history_window.max(config.min_bars).max(rule.min_bars());
    let bars = client.bars.get_recent(&instrument.id, window);

    if bars.len() < config.min_bars.max(rule.min_bars()) {
        // Insufficient history is a routine skip, never an error; the
        // instrument waits for the next backfill.
        return Outcome::Skipped;
    }
    if bars
        .iter()
        .any(|b| !(b.close.is_finite() && b.volume.is_finite()))
    {
        warn!(instrument = %instrument.id, "non-finite bar data, skipping instrument");
        return Outcome::Failed;
    }

    let Some(eval) = rule.evaluate(&bars) else {
        return Outcome::Skipped;
    };

    let ratio = volume_ratio(&bars);
    let today = bars[bars.len() - 1];
    let yesterday_close = bars
        .len()
        .checked_sub(2)
        .map(|i| bars[i].close)
        .unwrap_or(0.0);

    // Latest price from the live cache when fresh, last close otherwise.
    let (price, change_percent) = match client.quotes.get(&instrument.id) {
        Some(quote) => (quote.price, quote.change_percent),
        None => {
            let change = if yesterday_close == 0.0 {
                0.0
            } else {
                (today.close - yesterday_close) / yesterday_close * 100.0
            };
            (today.close, change)
        }
    };

    Outcome::Computed(Box::new(Signal {
        instrument_id: instrument.id.clone(),
        display_code: instrument.display_code.clone(),
        name: instrument.name.clone(),
        category: instrument.category,
        strategy_id: rule.id().to_string(),
        confidence: eval.confidence,
        action: eval.action,
        volume_ratio: ratio,
        price,
        change_percent,
        computed_at: Utc::now(),
        is_latest: true,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pulse_core::traits::Evaluation;
    use pulse_core::types::SignalAction;
    use pulse_data::{BarStore, InstrumentCatalog, QuoteCache};
    use std::time::Duration;

    /// Rule that fires on every instrument with enough bars.
    struct AlwaysRule;

    impl SignalRule for AlwaysRule {
        fn id(&self) -> &str {
            "volume_surge"
        }
        fn name(&self) -> &str {
            "Always"
        }
        fn min_bars(&self) -> usize {
            2
        }
        fn evaluate(&self, _bars: &[Bar]) -> Option<Evaluation> {
            Some(Evaluation::new(0.8, SignalAction::Buy))
        }
    }

    fn bars(n: usize, yesterday_volume: f64, today_volume: f64) -> Vec<Bar> {
        let mut out: Vec<Bar> = (0..n)
            .map(|i| {
                let date =
                    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Days::new(i as u64);
                Bar::new(date, 100.0, 101.0, 99.0, 100.0, 1000.0, 100_000.0)
            })
            .collect();
        let len = out.len();
        out[len - 2].volume = yesterday_volume;
        out[len - 1].volume = today_volume;
        out
    }

    struct Fixture {
        catalog: Arc<InstrumentCatalog>,
        bars: Arc<BarStore>,
        signals: Arc<crate::SignalStore>,
        quotes: Arc<QuoteCache>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                catalog: Arc::new(InstrumentCatalog::new()),
                bars: Arc::new(BarStore::new()),
                signals: Arc::new(crate::SignalStore::new()),
                quotes: Arc::new(QuoteCache::new(Duration::from_secs(60))),
            }
        }

        fn engine(&self) -> SignalEngine {
            let factory = StoreFactory::new(
                Arc::clone(&self.bars),
                Arc::clone(&self.signals),
                Arc::clone(&self.quotes),
            );
            // Registry holds the real volume_surge rule under this id; the
            // tests that need deterministic firing use the store directly.
            SignalEngine::new(
                Arc::clone(&self.catalog),
                Arc::new(StrategyRegistry::new()),
                factory,
                EngineConfig::default(),
            )
        }
    }

    #[tokio::test]
    async fn test_volume_ratio_scenario() {
        // 600519.SH with 60 bars, yesterday 1,000,000 and today 1,500,000
        // must come out at exactly 1.5.
        let fixture = Fixture::new();
        fixture.catalog.replace_category(
            Category::Equity,
            vec![Instrument::new("600519.SH", "Kweichow Moutai", Category::Equity)],
        );
        let mut history = bars(60, 1_000_000.0, 1_500_000.0);
        // A rising close so volume_surge classifies the move.
        let len = history.len();
        history[len - 1].open = 100.0;
        history[len - 1].close = 102.0;
        fixture.bars.replace_history("600519.SH", history);

        let engine = fixture.engine();
        let summary = engine
            .compute("volume_surge", Scope::EquitiesOnly, false)
            .await
            .unwrap();
        assert_eq!(summary.computed, 1);

        let signal = fixture.signals.get("600519.SH", "volume_surge").unwrap();
        assert!((signal.volume_ratio - 1.5).abs() < 1e-9);
        assert_eq!(signal.display_code, "600519");
        assert_eq!(signal.action, SignalAction::Buy);
    }

    #[tokio::test]
    async fn test_insufficient_history_is_skipped() {
        let fixture = Fixture::new();
        fixture.catalog.replace_category(
            Category::Equity,
            vec![Instrument::new("000001.SZ", "PAB", Category::Equity)],
        );
        fixture.bars.replace_history("000001.SZ", bars(20, 1000.0, 3000.0));

        let engine = fixture.engine();
        let summary = engine
            .compute("volume_surge", Scope::EquitiesOnly, false)
            .await
            .unwrap();
        assert_eq!(summary.computed, 0);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 0);
        assert!(fixture.signals.is_empty());
    }

    #[tokio::test]
    async fn test_equities_only_never_touches_fund_signals() {
        let fixture = Fixture::new();
        fixture.catalog.replace_category(
            Category::Equity,
            vec![Instrument::new("600519.SH", "Kweichow Moutai", Category::Equity)],
        );
        fixture.catalog.replace_category(
            Category::Fund,
            vec![Instrument::new("510300.SH", "CSI 300 ETF", Category::Fund)],
        );
        fixture
            .bars
            .replace_history("600519.SH", bars(60, 1000.0, 3000.0));
        fixture
            .bars
            .replace_history("510300.SH", bars(60, 1000.0, 3000.0));

        // Pre-existing fund signal that the equities pass must not disturb.
        let engine = fixture.engine();
        let _ = engine.compute("volume_surge", Scope::All, false).await.unwrap();
        let fund_before = fixture.signals.get("510300.SH", "volume_surge");

        let _ = engine
            .compute("volume_surge", Scope::EquitiesOnly, false)
            .await
            .unwrap();
        let fund_after = fixture.signals.get("510300.SH", "volume_surge");
        assert_eq!(
            fund_before.as_ref().map(|s| s.computed_at),
            fund_after.as_ref().map(|s| s.computed_at)
        );
    }

    #[tokio::test]
    async fn test_full_rebuild_drops_stale_instruments() {
        let fixture = Fixture::new();
        fixture.catalog.replace_category(
            Category::Equity,
            vec![Instrument::new("600519.SH", "Kweichow Moutai", Category::Equity)],
        );
        fixture
            .bars
            .replace_history("600519.SH", bars(60, 1000.0, 3000.0));

        // A leftover signal for an instrument no longer in the catalog.
        fixture.signals.upsert(Signal {
            instrument_id: "DELISTED.SZ".to_string(),
            display_code: "DELISTED".to_string(),
            name: "Gone".to_string(),
            category: Category::Equity,
            strategy_id: "volume_surge".to_string(),
            confidence: 0.9,
            action: SignalAction::Buy,
            volume_ratio: 2.0,
            price: 1.0,
            change_percent: 0.0,
            computed_at: Utc::now(),
            is_latest: true,
        });

        let engine = fixture.engine();
        engine.compute("volume_surge", Scope::All, true).await.unwrap();
        assert!(fixture.signals.get("DELISTED.SZ", "volume_surge").is_none());
        assert!(fixture.signals.get("600519.SH", "volume_surge").is_some());
    }

    #[tokio::test]
    async fn test_zero_yesterday_volume_yields_zero_ratio() {
        let history = bars(60, 0.0, 3000.0);
        assert_eq!(volume_ratio(&history), 0.0);
        assert!(volume_ratio(&history).is_finite());
    }

    #[tokio::test]
    async fn test_unknown_strategy_is_an_error() {
        let fixture = Fixture::new();
        let engine = fixture.engine();
        let err = engine.compute("unknown", Scope::All, false).await.unwrap_err();
        assert!(matches!(
            err,
            pulse_core::PulseError::Engine(pulse_core::error::EngineError::StrategyNotFound(_))
        ));
    }
}
