//! Tradable instrument identity.

use serde::{Deserialize, Serialize};

/// Instrument category. Determines ingestion cadence and listing order,
/// never storage partitioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Equity,
    Fund,
}

impl Category {
    /// Sort rank used when listing mixed signal sets: equities first.
    pub fn list_rank(&self) -> u8 {
        match self {
            Category::Equity => 0,
            Category::Fund => 1,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Equity => write!(f, "equity"),
            Category::Fund => write!(f, "fund"),
        }
    }
}

/// A tradable equity or exchange-traded fund.
///
/// `id` is always the exchange-qualified code (e.g. `"600519.SH"`);
/// `display_code` is the bare code without suffix (`"600519"`). Both forms
/// are carried explicitly so downstream lookups never have to re-derive the
/// exchange from code-prefix heuristics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    /// Exchange-qualified code, e.g. "600519.SH"
    pub id: String,
    /// Code without exchange suffix, e.g. "600519"
    pub display_code: String,
    /// Human-readable name
    pub name: String,
    /// Equity or fund
    pub category: Category,
    /// Market identifier, e.g. "SH", "SZ"
    pub market: String,
}

impl Instrument {
    /// Create an instrument from an exchange-qualified id.
    pub fn new(id: impl Into<String>, name: impl Into<String>, category: Category) -> Self {
        let id = id.into();
        let (display_code, market) = split_qualified_id(&id);
        Self {
            id,
            display_code,
            name: name.into(),
            category,
            market,
        }
    }
}

/// Split `"600519.SH"` into `("600519", "SH")`. An id without a suffix keeps
/// an empty market rather than guessing one.
pub fn split_qualified_id(id: &str) -> (String, String) {
    match id.rsplit_once('.') {
        Some((code, market)) => (code.to_string(), market.to_string()),
        None => (id.to_string(), String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_qualified_id() {
        assert_eq!(
            split_qualified_id("600519.SH"),
            ("600519".to_string(), "SH".to_string())
        );
        assert_eq!(
            split_qualified_id("000001.SZ"),
            ("000001".to_string(), "SZ".to_string())
        );
        // No suffix: keep the code, leave the market empty.
        assert_eq!(
            split_qualified_id("600519"),
            ("600519".to_string(), String::new())
        );
    }

    #[test]
    fn test_instrument_new() {
        let inst = Instrument::new("510300.SH", "CSI 300 ETF", Category::Fund);
        assert_eq!(inst.display_code, "510300");
        assert_eq!(inst.market, "SH");
        assert_eq!(inst.category, Category::Fund);
    }

    #[test]
    fn test_category_list_rank() {
        assert!(Category::Equity.list_rank() < Category::Fund.list_rank());
    }
}
