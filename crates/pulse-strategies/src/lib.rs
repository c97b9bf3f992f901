//! Signal rule implementations.
//!
//! Every rule is a pure function over a bar window; the engine owns history
//! requirements, batching and persistence. Rules are registered explicitly
//! in [`StrategyRegistry::new`] — no runtime discovery.

mod ma_breakout;
mod registry;
mod rsi_reversal;
mod volume_surge;

pub use ma_breakout::{MaBreakoutConfig, MaBreakoutRule};
pub use registry::{StrategyInfo, StrategyRegistry};
pub use rsi_reversal::{RsiReversalConfig, RsiReversalRule};
pub use volume_surge::{VolumeSurgeConfig, VolumeSurgeRule};

/// Simple moving average of the last `period` values; `None` when there is
/// not enough data.
pub(crate) fn sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let window = &values[values.len() - period..];
    Some(window.iter().sum::<f64>() / period as f64)
}
