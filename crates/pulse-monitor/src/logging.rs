//! Logging setup.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Output shape of the log layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    /// Parse the `logging.format` config value; anything unrecognized falls
    /// back to pretty output.
    pub fn from_config(value: &str) -> Self {
        match value {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// Install the global subscriber. `RUST_LOG` overrides `level` when set.
pub fn setup_logging(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().pretty())
            .init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_config() {
        assert_eq!(LogFormat::from_config("json"), LogFormat::Json);
        assert_eq!(LogFormat::from_config("pretty"), LogFormat::Pretty);
        // Unknown values never panic the bootstrap.
        assert_eq!(LogFormat::from_config("fancy"), LogFormat::Pretty);
    }
}
