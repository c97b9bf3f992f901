//! The job scheduler.
//!
//! A single dedicated worker thread owns job execution: it runs its own
//! current-thread runtime and processes triggers strictly one at a time, so
//! computation passes are serialized and store clients never leave the
//! worker's context. Timers live on the serving runtime and only enqueue
//! triggers; a trigger arriving while the queue is occupied is dropped.
//! Running jobs are never cancelled mid-pass.

use chrono::{NaiveTime, Timelike};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc::{sync_channel, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, info};

use crate::jobs::{run_job, Job, JobContext};

/// Scheduler tuning knobs.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Interval between intraday quote refreshes
    pub quote_refresh_interval: Duration,
    /// Clock times for intraday signal recomputes
    pub recompute_times: Vec<NaiveTime>,
    /// Clock time of the end-of-day full refresh
    pub eod_refresh_time: NaiveTime,
    /// Widen intraday scope to include funds
    pub include_funds_intraday: bool,
    /// Whether funds belong to the tracked universe at all
    pub include_funds: bool,
    /// Refresh the universe from the providers during the full refresh;
    /// disabled when the universe comes from a seed file
    pub use_provider_catalog: bool,
    /// Instruments per quote request
    pub quote_batch_size: usize,
    /// Bars fetched per instrument during backfill
    pub backfill_limit: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            quote_refresh_interval: Duration::from_secs(30),
            recompute_times: vec![
                NaiveTime::from_hms_opt(9, 45, 0).unwrap(),
                NaiveTime::from_hms_opt(10, 30, 0).unwrap(),
                NaiveTime::from_hms_opt(11, 25, 0).unwrap(),
                NaiveTime::from_hms_opt(13, 30, 0).unwrap(),
                NaiveTime::from_hms_opt(14, 30, 0).unwrap(),
                NaiveTime::from_hms_opt(14, 55, 0).unwrap(),
            ],
            eod_refresh_time: NaiveTime::from_hms_opt(15, 30, 0).unwrap(),
            include_funds_intraday: false,
            include_funds: true,
            use_provider_catalog: true,
            quote_batch_size: 80,
            backfill_limit: 120,
        }
    }
}

const STOPPED: u8 = 0;
const RUNNING: u8 = 1;

/// Scheduler over the three market jobs.
pub struct JobScheduler {
    ctx: JobContext,
    tx: SyncSender<Job>,
    state: Arc<AtomicU8>,
    worker: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl JobScheduler {
    /// Create the scheduler in the `Stopped` state. The worker thread is
    /// spawned immediately but triggers are refused until [`start`].
    ///
    /// [`start`]: JobScheduler::start
    pub fn new(ctx: JobContext) -> Self {
        // Queue depth 1: one pass in flight, at most one pending; anything
        // beyond that is coalesced away.
        let (tx, rx) = sync_channel::<Job>(1);
        let state = Arc::new(AtomicU8::new(STOPPED));

        let worker_ctx = ctx.clone();
        let worker = std::thread::Builder::new()
            .name("pulse-jobs".to_string())
            .spawn(move || {
                let rt = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        error!(error = %e, "job worker runtime failed to start");
                        return;
                    }
                };
                while let Ok(job) = rx.recv() {
                    let report = rt.block_on(run_job(&worker_ctx, job));
                    worker_ctx.status.record(report);
                }
                debug!("job worker shut down");
            })
            .expect("failed to spawn job worker thread");

        Self {
            ctx,
            tx,
            state,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Transition `Stopped -> Running` and spawn the timers on the current
    /// tokio runtime.
    pub fn start(&self) {
        if self
            .state
            .compare_exchange(STOPPED, RUNNING, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        info!("scheduler running");
        self.spawn_interval_timer();
        self.spawn_clock_timer();
    }

    /// Whether the scheduler is accepting triggers.
    pub fn is_running(&self) -> bool {
        self.state.load(Ordering::SeqCst) == RUNNING
    }

    /// Enqueue a job. Returns false when the scheduler is stopped or the
    /// trigger was coalesced into an already-pending pass.
    pub fn trigger(&self, job: Job) -> bool {
        if !self.is_running() {
            debug!(job = job.name(), "scheduler stopped, trigger refused");
            return false;
        }
        match self.tx.try_send(job) {
            Ok(()) => true,
            Err(TrySendError::Full(job)) => {
                debug!(job = job.name(), "pass in flight, trigger coalesced");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Stop accepting triggers. The in-flight pass, if any, finishes.
    pub fn stop(&self) {
        self.state.store(STOPPED, Ordering::SeqCst);
        info!("scheduler stopped");
    }

    /// Interval timer for the intraday quote refresh.
    fn spawn_interval_timer(&self) {
        let tx = self.tx.clone();
        let state = Arc::clone(&self.state);
        let interval = self.ctx.config.quote_refresh_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // Skip the immediate first tick.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if state.load(Ordering::SeqCst) != RUNNING {
                    break;
                }
                if tx.try_send(Job::QuoteRefresh).is_err() {
                    debug!("quote refresh coalesced");
                }
            }
        });
    }

    /// Minute-resolution clock timer for the recompute times and the
    /// end-of-day refresh.
    fn spawn_clock_timer(&self) {
        let tx = self.tx.clone();
        let state = Arc::clone(&self.state);
        let calendar = self.ctx.calendar.clone();
        let recompute_times = self.ctx.config.recompute_times.clone();
        let eod = self.ctx.config.eod_refresh_time;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(20));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let mut last_fired: Option<(chrono::NaiveDate, u32)> = None;
            loop {
                ticker.tick().await;
                if state.load(Ordering::SeqCst) != RUNNING {
                    break;
                }
                let now = calendar.now();
                if !calendar.is_trading_day(now.date()) {
                    continue;
                }
                let minute_of_day = now.time().hour() * 60 + now.time().minute();
                if last_fired == Some((now.date(), minute_of_day)) {
                    continue;
                }

                if matches_minute(now.time(), &recompute_times) {
                    last_fired = Some((now.date(), minute_of_day));
                    if tx.try_send(Job::SignalRecompute).is_err() {
                        debug!("signal recompute coalesced");
                    }
                } else if matches_minute(now.time(), std::slice::from_ref(&eod)) {
                    last_fired = Some((now.date(), minute_of_day));
                    if tx.try_send(Job::FullRefresh).is_err() {
                        debug!("full refresh coalesced");
                    }
                }
            }
        });
    }

    /// Shut down and join the worker after the in-flight pass completes.
    pub fn shutdown(self) {
        self.stop();
        let JobScheduler { tx, worker, .. } = self;
        drop(tx);
        if let Some(handle) = worker.into_inner().ok().flatten() {
            let _ = handle.join();
        }
    }
}

/// Whether `now` falls in the same hour/minute slot as one of `times`.
fn matches_minute(now: NaiveTime, times: &[NaiveTime]) -> bool {
    times
        .iter()
        .any(|t| t.hour() == now.hour() && t.minute() == now.minute())
}
