//! Scheduled job implementations.
//!
//! Every job binds its own store client inside the worker context, walks its
//! batch accumulating per-item failures and reports one summary. A failing
//! instrument never aborts the batch; a dead feed aborts only the current
//! ingestion attempt and leaves previously stored data visible.

use chrono::Utc;
use pulse_core::error::ProviderError;
use pulse_core::types::{Bar, Category, Quote};
use pulse_data::{InstrumentCatalog, QuoteFeed, TickOutcome};
use pulse_engine::{Scope, SignalEngine, StoreFactory};
use pulse_monitor::{JobReport, StatusBoard};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::calendar::TradingCalendar;
use crate::scheduler::SchedulerConfig;

/// The three scheduled jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    /// Intraday quote refresh (interval-driven, trading window only)
    QuoteRefresh,
    /// Intraday signal recompute (clock-time-driven)
    SignalRecompute,
    /// End-of-day full refresh (catalog + history + all signals)
    FullRefresh,
}

impl Job {
    /// Stable job name used in reports and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Job::QuoteRefresh => "quote_refresh",
            Job::SignalRecompute => "signal_recompute",
            Job::FullRefresh => "full_refresh",
        }
    }
}

/// Everything a job needs, shareable into the worker thread.
#[derive(Clone)]
pub struct JobContext {
    pub feed: Arc<QuoteFeed>,
    pub catalog: Arc<InstrumentCatalog>,
    pub engine: Arc<SignalEngine>,
    pub factory: StoreFactory,
    pub calendar: TradingCalendar,
    pub status: Arc<StatusBoard>,
    /// Revision counter bumped after each pass that changed state
    pub updates: watch::Sender<u64>,
    pub config: SchedulerConfig,
}

impl JobContext {
    fn bump_revision(&self) {
        self.updates.send_modify(|rev| *rev += 1);
    }
}

/// Run one job to completion and produce its report.
pub async fn run_job(ctx: &JobContext, job: Job) -> JobReport {
    let started_at = Utc::now();
    let started = Instant::now();
    let (succeeded, skipped, failed, message) = match job {
        Job::QuoteRefresh => quote_refresh(ctx).await,
        Job::SignalRecompute => signal_recompute(ctx).await,
        Job::FullRefresh => full_refresh(ctx).await,
    };
    let report = JobReport {
        job: job.name().to_string(),
        started_at,
        elapsed_ms: started.elapsed().as_millis() as u64,
        succeeded,
        skipped,
        failed,
        message,
    };
    info!(
        job = report.job,
        succeeded = report.succeeded,
        skipped = report.skipped,
        failed = report.failed,
        elapsed_ms = report.elapsed_ms,
        message = %report.message,
        "job finished"
    );
    report
}

/// Map one live quote onto the current trading day's bar.
fn bar_from_quote(quote: &Quote, today: chrono::NaiveDate) -> Bar {
    Bar {
        date: today,
        open: quote.price,
        high: quote.price,
        low: quote.price,
        close: quote.price,
        volume: quote.volume,
        amount: quote.amount,
    }
}

async fn quote_refresh(ctx: &JobContext) -> (usize, usize, usize, String) {
    let now = ctx.calendar.now();
    if !ctx.calendar.is_trading_time(now) {
        debug!("outside trading window, quote refresh is a no-op");
        return (0, 1, 0, "outside trading window".to_string());
    }

    // Funds move little intraday; they are excluded unless configured in.
    let filter = if ctx.config.include_funds_intraday {
        None
    } else {
        Some(Category::Equity)
    };
    let ids: Vec<String> = ctx
        .catalog
        .list(filter)
        .into_iter()
        .map(|i| i.id)
        .collect();
    if ids.is_empty() {
        return (0, 1, 0, "catalog empty".to_string());
    }

    let client = ctx.factory.bind();
    let today = ctx.calendar.today();
    let mut succeeded = 0usize;
    let mut skipped = 0usize;
    let mut failed = 0usize;

    for chunk in ids.chunks(ctx.config.quote_batch_size) {
        let (quotes, provider) = match ctx.feed.fetch_quotes(chunk).await {
            Ok(result) => result,
            Err(err @ ProviderError::AllProvidersFailed { .. }) => {
                // The feed is down; abort this attempt, keep stored data.
                warn!(error = %err, "quote refresh aborted");
                failed += chunk.len();
                break;
            }
            Err(err) => {
                warn!(error = %err, batch = chunk.len(), "quote batch failed");
                failed += chunk.len();
                continue;
            }
        };
        debug!(provider = %provider, quotes = quotes.len(), "quote batch fetched");

        client.quotes.put_all(&quotes);
        for quote in &quotes {
            match client
                .bars
                .append_or_update_today(&quote.instrument_id, bar_from_quote(quote, today))
            {
                Ok(TickOutcome::Appended | TickOutcome::Updated) => succeeded += 1,
                Ok(TickOutcome::SkippedOrphan) => skipped += 1,
                Err(err) => {
                    warn!(instrument = %quote.instrument_id, error = %err, "tick rejected");
                    failed += 1;
                }
            }
        }
    }

    if succeeded > 0 {
        ctx.bump_revision();
    }
    (succeeded, skipped, failed, String::new())
}

async fn signal_recompute(ctx: &JobContext) -> (usize, usize, usize, String) {
    let scope = if ctx.config.include_funds_intraday {
        Scope::All
    } else {
        Scope::EquitiesOnly
    };
    match ctx.engine.compute_all(scope, false).await {
        Ok(summaries) => {
            let computed = summaries.iter().map(|s| s.computed).sum();
            let skipped = summaries.iter().map(|s| s.skipped).sum();
            let failed = summaries.iter().map(|s| s.failed).sum();
            if computed > 0 {
                ctx.bump_revision();
            }
            (computed, skipped, failed, String::new())
        }
        Err(err) => {
            warn!(error = %err, "signal recompute failed");
            (0, 0, 1, err.to_string())
        }
    }
}

async fn full_refresh(ctx: &JobContext) -> (usize, usize, usize, String) {
    // Refresh the universe first; if no provider can serve it, abort before
    // clearing anything so yesterday's data stays visible. A file-seeded
    // universe is taken as-is.
    if ctx.config.use_provider_catalog {
        if let Err(err) = ctx.catalog.refresh(&ctx.feed, ctx.config.include_funds).await {
            warn!(error = %err, "catalog refresh failed, keeping previous data");
            return (0, 0, 1, err.to_string());
        }
    } else if ctx.catalog.is_empty() {
        return (0, 0, 1, "universe seed is empty".to_string());
    }

    let client = ctx.factory.bind();
    client.bars.clear_all();
    client.quotes.clear();

    let mut succeeded = 0usize;
    let mut failed = 0usize;
    for instrument in ctx.catalog.list(None) {
        match ctx
            .feed
            .fetch_daily_history(&instrument.id, ctx.config.backfill_limit)
            .await
        {
            Ok((bars, _)) if !bars.is_empty() => {
                client.bars.replace_history(&instrument.id, bars);
                succeeded += 1;
            }
            Ok(_) => failed += 1,
            Err(err) => {
                warn!(instrument = %instrument.id, error = %err, "backfill failed");
                failed += 1;
            }
        }
    }

    let message = match ctx.engine.compute_all(Scope::All, true).await {
        Ok(summaries) => {
            let computed: usize = summaries.iter().map(|s| s.computed).sum();
            format!("backfilled {succeeded} instruments, {computed} signals")
        }
        Err(err) => {
            warn!(error = %err, "signal rebuild failed");
            failed += 1;
            err.to_string()
        }
    };

    ctx.bump_revision();
    (succeeded, 0, failed, message)
}
