//! Serve command: scheduler plus websocket broadcaster.

use anyhow::Result;
use pulse_push::{Broadcaster, BroadcasterConfig};
use pulse_scheduler::{Job, JobScheduler};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

use crate::cli::wiring::Service;
use crate::cli::ServeArgs;

pub async fn run(args: ServeArgs, config_path: &Path) -> Result<()> {
    let service = Service::build(config_path)?;
    let (updates, mut revisions) = watch::channel(0u64);

    let scheduler = Arc::new(JobScheduler::new(service.job_context(updates)));
    scheduler.start();
    if !args.no_bootstrap {
        // Populate catalog, history and signals before the first timer fires.
        scheduler.trigger(Job::FullRefresh);
    }

    let bind = args
        .bind
        .unwrap_or_else(|| service.config.push.bind_addr.clone());
    let broadcaster = Arc::new(
        Broadcaster::bind(
            &bind,
            BroadcasterConfig {
                heartbeat_interval: Duration::from_secs(service.config.push.heartbeat_secs),
                timeout_multiplier: service.config.push.timeout_multiplier,
            },
        )
        .await?,
    );
    info!(addr = %broadcaster.local_addr(), "websocket endpoint ready");
    tokio::spawn(Arc::clone(&broadcaster).run());

    // Every state-changing pass bumps the revision; each bump pushes the
    // fresh enriched listing, and the broadcaster trims it to per-client
    // deltas.
    let engine = Arc::clone(&service.engine);
    let push = Arc::clone(&broadcaster);
    tokio::spawn(async move {
        while revisions.changed().await.is_ok() {
            let signals = engine.list_signals(None);
            push.broadcast(&signals).await;
        }
    });

    println!("marketpulse serving on ws://{}", broadcaster.local_addr());
    println!("Press Ctrl-C to stop.");
    tokio::signal::ctrl_c().await?;

    info!("shutting down");
    scheduler.stop();
    for report in service.status.snapshot() {
        info!(
            job = report.job,
            succeeded = report.succeeded,
            failed = report.failed,
            "last run"
        );
    }
    Ok(())
}
