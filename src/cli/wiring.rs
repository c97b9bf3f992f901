//! Component wiring shared by the commands.

use anyhow::{Context, Result};
use pulse_config::AppConfig;
use pulse_core::traits::QuoteProvider;
use pulse_data::providers::{EastmoneyProvider, SinaProvider};
use pulse_data::{BarStore, FeedConfig, InstrumentCatalog, QuoteCache, QuoteFeed};
use pulse_engine::{EngineConfig, SignalEngine, SignalStore, StoreFactory};
use pulse_monitor::StatusBoard;
use pulse_scheduler::{JobContext, MarketHours, SchedulerConfig, TradingCalendar};
use pulse_strategies::StrategyRegistry;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

const PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);
const QUOTE_CACHE_TTL: Duration = Duration::from_secs(60);

/// All service components, wired from one loaded configuration.
pub struct Service {
    pub config: AppConfig,
    pub feed: Arc<QuoteFeed>,
    pub catalog: Arc<InstrumentCatalog>,
    pub registry: Arc<StrategyRegistry>,
    pub engine: Arc<SignalEngine>,
    pub factory: StoreFactory,
    pub calendar: TradingCalendar,
    pub status: Arc<StatusBoard>,
}

impl Service {
    /// Load configuration and build every component.
    pub fn build(config_path: &Path) -> Result<Self> {
        let config = pulse_config::load_config(config_path)
            .with_context(|| format!("loading {}", config_path.display()))?;
        pulse_config::validate(&config)?;

        let mut providers: Vec<Arc<dyn QuoteProvider>> = Vec::new();
        for name in &config.feed.providers {
            match name.as_str() {
                "eastmoney" => {
                    providers.push(Arc::new(EastmoneyProvider::new(PROVIDER_TIMEOUT)?))
                }
                "sina" => providers.push(Arc::new(SinaProvider::new(PROVIDER_TIMEOUT)?)),
                other => anyhow::bail!("unknown provider '{other}'"),
            }
        }
        let feed = Arc::new(QuoteFeed::new(
            providers,
            FeedConfig {
                max_retries: config.feed.max_retries,
                backoff_base: Duration::from_millis(config.feed.backoff_base_ms),
                min_request_spacing: Duration::from_millis(config.feed.min_request_spacing_ms),
                ..FeedConfig::default()
            },
        ));

        let catalog = Arc::new(InstrumentCatalog::new());
        if let Some(path) = &config.catalog.universe_file {
            let loaded = catalog.load_universe_csv(Path::new(path))?;
            info!(path = %path, instruments = loaded, "seeded universe from file");
        }

        let factory = StoreFactory::new(
            Arc::new(BarStore::new()),
            Arc::new(SignalStore::new()),
            Arc::new(QuoteCache::new(QUOTE_CACHE_TTL)),
        );
        let registry = Arc::new(StrategyRegistry::new());
        let engine = Arc::new(SignalEngine::new(
            Arc::clone(&catalog),
            Arc::clone(&registry),
            factory.clone(),
            EngineConfig {
                min_bars: config.engine.min_bars,
                history_window: config.engine.history_window,
                concurrency: config.engine.concurrency,
            },
        ));

        let calendar = TradingCalendar::new(MarketHours {
            morning_open: config.market_hours.morning_open,
            morning_close: config.market_hours.morning_close,
            afternoon_open: config.market_hours.afternoon_open,
            afternoon_close: config.market_hours.afternoon_close,
        });

        Ok(Self {
            config,
            feed,
            catalog,
            registry,
            engine,
            factory,
            calendar,
            status: Arc::new(StatusBoard::new()),
        })
    }

    /// Scheduler knobs from the loaded configuration.
    pub fn scheduler_config(&self) -> SchedulerConfig {
        let s = &self.config.scheduler;
        SchedulerConfig {
            quote_refresh_interval: Duration::from_secs(s.quote_refresh_secs),
            recompute_times: s.recompute_times.clone(),
            eod_refresh_time: s.eod_refresh_time,
            include_funds_intraday: s.include_funds_intraday,
            include_funds: self.config.catalog.include_funds,
            use_provider_catalog: self.config.catalog.universe_file.is_none(),
            quote_batch_size: s.quote_batch_size,
            backfill_limit: s.backfill_limit,
        }
    }

    /// Job context bound to the given revision channel.
    pub fn job_context(&self, updates: watch::Sender<u64>) -> JobContext {
        JobContext {
            feed: Arc::clone(&self.feed),
            catalog: Arc::clone(&self.catalog),
            engine: Arc::clone(&self.engine),
            factory: self.factory.clone(),
            calendar: self.calendar.clone(),
            status: Arc::clone(&self.status),
            updates,
            config: self.scheduler_config(),
        }
    }
}
