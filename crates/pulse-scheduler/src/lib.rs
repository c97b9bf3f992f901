//! Market-hours-aware job scheduling.
//!
//! Scheduled work runs on one dedicated worker thread with its own runtime,
//! so ingestion and signal computation never share an execution context with
//! the serving path. Triggers are queued; a trigger arriving while a pass is
//! in flight is dropped rather than stacked.

pub mod calendar;
pub mod jobs;
pub mod scheduler;

pub use calendar::{MarketHours, TradingCalendar};
pub use jobs::{Job, JobContext};
pub use scheduler::{JobScheduler, SchedulerConfig};
