//! Signals command: one-shot refresh, then print the current listing.

use anyhow::Result;
use pulse_scheduler::jobs::{run_job, Job};
use std::path::Path;
use tokio::sync::watch;

use crate::cli::wiring::Service;
use crate::cli::SignalsArgs;

pub async fn run(args: SignalsArgs, config_path: &Path) -> Result<()> {
    let service = Service::build(config_path)?;

    if let Some(strategy_id) = &args.strategy {
        if !service.registry.exists(strategy_id) {
            anyhow::bail!(
                "unknown strategy '{strategy_id}'; run `pulse strategies` for the list"
            );
        }
    }

    let (updates, _) = watch::channel(0u64);
    let ctx = service.job_context(updates);
    println!("Refreshing catalog and history...");
    let report = run_job(&ctx, Job::FullRefresh).await;
    if report.succeeded == 0 {
        println!("No instruments ingested ({}).", report.message);
        return Ok(());
    }

    let signals = service.engine.list_signals(args.strategy.as_deref());
    if signals.is_empty() {
        println!("No signals.");
        return Ok(());
    }

    println!();
    println!(
        "{:<12} {:<16} {:<8} {:<16} {:<6} {:>6} {:>10} {:>8} {:>7}",
        "Code", "Name", "Cat", "Strategy", "Act", "Conf", "Price", "Chg%", "VolR"
    );
    println!("{}", "─".repeat(96));
    for signal in signals.iter().take(args.limit) {
        println!(
            "{:<12} {:<16} {:<8} {:<16} {:<6} {:>6.2} {:>10.2} {:>8.2} {:>7.2}",
            signal.instrument_id,
            truncate(&signal.name, 16),
            signal.category.to_string(),
            signal.strategy_id,
            signal.action.to_string(),
            signal.confidence,
            signal.price,
            signal.change_percent,
            signal.volume_ratio,
        );
    }
    if signals.len() > args.limit {
        println!("... {} more (raise --limit)", signals.len() - args.limit);
    }
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max.saturating_sub(1)).chain(['…']).collect()
    }
}
