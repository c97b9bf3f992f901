//! Trigger command: run one job to completion and exit.

use anyhow::Result;
use pulse_scheduler::jobs::{run_job, Job};
use std::path::Path;
use tokio::sync::watch;

use crate::cli::wiring::Service;
use crate::cli::{JobKind, TriggerArgs};

pub async fn run(args: TriggerArgs, config_path: &Path) -> Result<()> {
    let service = Service::build(config_path)?;
    let (updates, _) = watch::channel(0u64);
    let ctx = service.job_context(updates);

    let job = match args.job {
        JobKind::QuoteRefresh => Job::QuoteRefresh,
        JobKind::SignalRecompute => Job::SignalRecompute,
        JobKind::FullRefresh => Job::FullRefresh,
    };

    println!("Running {}...", job.name());
    let report = run_job(&ctx, job).await;

    println!();
    println!("Job:       {}", report.job);
    println!("Succeeded: {}", report.succeeded);
    println!("Skipped:   {}", report.skipped);
    println!("Failed:    {}", report.failed);
    println!("Elapsed:   {} ms", report.elapsed_ms);
    if !report.message.is_empty() {
        println!("Note:      {}", report.message);
    }
    Ok(())
}
