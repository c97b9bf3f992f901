//! Validate configuration command.

use anyhow::Result;
use pulse_config::{load_config, validate};
use std::path::Path;

pub async fn run(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {:?}", config_path);

    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            println!("Configuration error: {}", e);
            return Err(e.into());
        }
    };
    if let Err(e) = validate(&config) {
        println!("Configuration error: {}", e);
        return Err(e.into());
    }

    println!("Configuration is valid!");
    println!();
    println!("App: {}", config.app.name);
    println!("Environment: {}", config.app.environment);
    println!("Log level: {}", config.logging.level);
    println!("Providers: {}", config.feed.providers.join(", "));
    println!("Quote refresh: every {}s", config.scheduler.quote_refresh_secs);
    println!(
        "Recompute times: {}",
        config
            .scheduler
            .recompute_times
            .iter()
            .map(|t| t.format("%H:%M").to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("Websocket: {}", config.push.bind_addr);

    Ok(())
}
