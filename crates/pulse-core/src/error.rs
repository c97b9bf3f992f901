//! Error types for the signal service.

use thiserror::Error;

/// Top-level service error.
#[derive(Error, Debug)]
pub enum PulseError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Push error: {0}")]
    Push(#[from] PushError),

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Quote provider errors.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider {provider} unavailable: {reason}")]
    Unavailable { provider: String, reason: String },

    #[error("Provider {provider} rate limited")]
    RateLimited { provider: String },

    #[error("Provider {provider} returned unparseable payload: {reason}")]
    Parse { provider: String, reason: String },

    #[error("All providers failed after {attempts} attempts")]
    AllProvidersFailed { attempts: usize },

    #[error("Provider {provider} does not serve a catalog")]
    CatalogUnsupported { provider: String },
}

impl ProviderError {
    /// Whether a retry against the same provider can still succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::Unavailable { .. } | ProviderError::RateLimited { .. }
        )
    }
}

/// Bar store / signal store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Instrument not found: {0}")]
    InstrumentNotFound(String),

    #[error("Bar rejected for {instrument_id}: {reason}")]
    BarRejected {
        instrument_id: String,
        reason: String,
    },

    #[error("Store error: {0}")]
    Internal(String),
}

/// Signal engine errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Insufficient history for {instrument_id}: need {required} bars, have {available}")]
    InsufficientHistory {
        instrument_id: String,
        required: usize,
        available: usize,
    },

    #[error("Strategy not found: {0}")]
    StrategyNotFound(String),

    #[error("Engine error: {0}")]
    Internal(String),
}

/// Realtime push errors.
#[derive(Error, Debug)]
pub enum PushError {
    #[error("Bind failed on {addr}: {reason}")]
    Bind { addr: String, reason: String },

    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    #[error("Reconnect attempts exhausted after {attempts} tries")]
    ReconnectExhausted { attempts: u32 },

    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Result type alias for service operations.
pub type PulseResult<T> = Result<T, PulseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_retryable() {
        let err = ProviderError::Unavailable {
            provider: "eastmoney".to_string(),
            reason: "timeout".to_string(),
        };
        assert!(err.is_retryable());

        let err = ProviderError::AllProvidersFailed { attempts: 6 };
        assert!(!err.is_retryable());

        let err = ProviderError::Parse {
            provider: "sina".to_string(),
            reason: "bad field count".to_string(),
        };
        assert!(!err.is_retryable());
    }
}
