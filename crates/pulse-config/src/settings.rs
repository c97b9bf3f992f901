//! Configuration structures.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub feed: FeedSettings,
    #[serde(default)]
    pub catalog: CatalogSettings,
    #[serde(default)]
    pub market_hours: MarketHoursSettings,
    #[serde(default)]
    pub scheduler: SchedulerSettings,
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub push: PushSettings,
}

/// General app settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub name: String,
    pub environment: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: "marketpulse".to_string(),
            environment: "development".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Quote feed settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedSettings {
    /// Provider names in fail-over order
    pub providers: Vec<String>,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub min_request_spacing_ms: u64,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            providers: vec!["eastmoney".to_string(), "sina".to_string()],
            max_retries: 3,
            backoff_base_ms: 500,
            min_request_spacing_ms: 200,
        }
    }
}

/// Instrument catalog settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSettings {
    /// Optional local CSV seed (`id,name,category`) used instead of the
    /// provider catalog
    pub universe_file: Option<String>,
    /// Whether funds are part of the tracked universe at all
    pub include_funds: bool,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            universe_file: None,
            include_funds: true,
        }
    }
}

/// Trading session boundaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketHoursSettings {
    pub morning_open: NaiveTime,
    pub morning_close: NaiveTime,
    pub afternoon_open: NaiveTime,
    pub afternoon_close: NaiveTime,
}

impl Default for MarketHoursSettings {
    fn default() -> Self {
        Self {
            morning_open: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            morning_close: NaiveTime::from_hms_opt(11, 30, 0).unwrap(),
            afternoon_open: NaiveTime::from_hms_opt(13, 0, 0).unwrap(),
            afternoon_close: NaiveTime::from_hms_opt(15, 0, 0).unwrap(),
        }
    }
}

/// Scheduler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    pub quote_refresh_secs: u64,
    pub recompute_times: Vec<NaiveTime>,
    pub eod_refresh_time: NaiveTime,
    pub include_funds_intraday: bool,
    pub quote_batch_size: usize,
    pub backfill_limit: usize,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            quote_refresh_secs: 30,
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
            quote_batch_size: 80,
            backfill_limit: 120,
        }
    }
}

/// Signal engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub min_bars: usize,
    pub history_window: usize,
    pub concurrency: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            min_bars: 50,
            history_window: 60,
            concurrency: 10,
        }
    }
}

/// Websocket broadcaster settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PushSettings {
    pub bind_addr: String,
    pub heartbeat_secs: u64,
    pub timeout_multiplier: u32,
}

impl Default for PushSettings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8765".to_string(),
            heartbeat_secs: 30,
            timeout_multiplier: 3,
        }
    }
}
