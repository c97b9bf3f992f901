//! Configuration management.

mod settings;

pub use settings::{
    AppConfig, AppSettings, CatalogSettings, EngineSettings, FeedSettings, LoggingConfig,
    MarketHoursSettings, PushSettings, SchedulerSettings,
};

use config::{Config, ConfigError, Environment, File};
use std::path::Path;

/// Load configuration from file and environment.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::from(path).required(true))
        .add_source(
            Environment::with_prefix("PULSE")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    config.try_deserialize()
}

/// Sanity checks beyond what deserialization enforces.
pub fn validate(config: &AppConfig) -> Result<(), ConfigError> {
    if config.feed.providers.is_empty() {
        return Err(ConfigError::Message(
            "feed.providers must name at least one provider".to_string(),
        ));
    }
    for provider in &config.feed.providers {
        if provider != "eastmoney" && provider != "sina" {
            return Err(ConfigError::Message(format!(
                "unknown provider '{provider}'"
            )));
        }
    }
    if config.scheduler.quote_batch_size == 0 {
        return Err(ConfigError::Message(
            "scheduler.quote_batch_size must be positive".to_string(),
        ));
    }
    if config.engine.min_bars < 2 {
        return Err(ConfigError::Message(
            "engine.min_bars must be at least 2".to_string(),
        ));
    }
    if config.market_hours.morning_open >= config.market_hours.morning_close
        || config.market_hours.afternoon_open >= config.market_hours.afternoon_close
    {
        return Err(ConfigError::Message(
            "market_hours windows must open before they close".to_string(),
        ));
    }
    Ok(())
}
