//! Explicit strategy registry.
//!
//! Populated once at startup from the known rule list. There is no runtime
//! discovery; adding a strategy means adding it here.

use crate::{
    MaBreakoutConfig, MaBreakoutRule, RsiReversalConfig, RsiReversalRule, VolumeSurgeConfig,
    VolumeSurgeRule,
};
use pulse_core::error::EngineError;
use pulse_core::traits::SignalRule;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Information about a registered strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyInfo {
    /// Strategy id
    pub id: String,
    /// Strategy name
    pub name: String,
    /// Strategy description
    pub description: String,
    /// Minimum bars the rule itself asks for
    pub min_bars: usize,
}

/// Registry of available signal rules.
pub struct StrategyRegistry {
    rules: BTreeMap<String, Arc<dyn SignalRule>>,
}

impl StrategyRegistry {
    /// Create a registry with all built-in rules under default configuration.
    pub fn new() -> Self {
        let rules: Vec<Arc<dyn SignalRule>> = vec![
            Arc::new(VolumeSurgeRule::new(VolumeSurgeConfig::default())),
            Arc::new(MaBreakoutRule::new(MaBreakoutConfig::default())),
            Arc::new(RsiReversalRule::new(RsiReversalConfig::default())),
        ];
        Self {
            rules: rules.into_iter().map(|r| (r.id().to_string(), r)).collect(),
        }
    }

    /// Get a rule by id.
    pub fn get(&self, id: &str) -> Result<Arc<dyn SignalRule>, EngineError> {
        self.rules
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::StrategyNotFound(id.to_string()))
    }

    /// Check if a strategy exists.
    pub fn exists(&self, id: &str) -> bool {
        self.rules.contains_key(id)
    }

    /// All strategy ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        self.rules.keys().cloned().collect()
    }

    /// Describe all registered strategies.
    pub fn list(&self) -> Vec<StrategyInfo> {
        self.rules
            .values()
            .map(|rule| StrategyInfo {
                id: rule.id().to_string(),
                name: rule.name().to_string(),
                description: rule.description().to_string(),
                min_bars: rule.min_bars(),
            })
            .collect()
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_contents() {
        let registry = StrategyRegistry::new();
        assert_eq!(registry.ids(), vec!["ma_breakout", "rsi_reversal", "volume_surge"]);
        assert!(registry.exists("volume_surge"));
        assert!(!registry.exists("unknown"));
    }

    #[test]
    fn test_get_unknown_strategy() {
        let registry = StrategyRegistry::new();
        assert!(matches!(
            registry.get("unknown").map(|_| ()),
            Err(EngineError::StrategyNotFound(_))
        ));
    }

    #[test]
    fn test_list_has_descriptions() {
        let registry = StrategyRegistry::new();
        for info in registry.list() {
            assert!(!info.description.is_empty());
            assert!(info.min_bars >= 2);
        }
    }
}
