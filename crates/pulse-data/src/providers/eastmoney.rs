//! Eastmoney quote provider.
//!
//! Uses the public push2 endpoints. Prices and percentages arrive scaled by
//! 100 and volume in lots of 100 shares; everything is normalized here.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use pulse_core::error::ProviderError;
use pulse_core::traits::QuoteProvider;
use pulse_core::types::{Bar, Category, Instrument, Quote};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

const QUOTE_URL: &str = "https://push2.eastmoney.com/api/qt/ulist.np/get";
const KLINE_URL: &str = "https://push2his.eastmoney.com/api/qt/stock/kline/get";
const CLIST_URL: &str = "https://push2.eastmoney.com/api/qt/clist/get";

/// Eastmoney provider client.
pub struct EastmoneyProvider {
    client: Client,
}

#[derive(Debug, Deserialize)]
struct UlistResponse {
    data: Option<UlistData>,
}

#[derive(Debug, Deserialize)]
struct UlistData {
    #[serde(default)]
    diff: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct KlineResponse {
    data: Option<KlineData>,
}

#[derive(Debug, Deserialize)]
struct KlineData {
    #[serde(default)]
    klines: Vec<String>,
}

impl EastmoneyProvider {
    /// Create a new Eastmoney provider.
    pub fn new(timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Unavailable {
                provider: "eastmoney".to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self { client })
    }

    /// Convert "600519.SH" into the push2 secid form "1.600519".
    fn secid(instrument_id: &str) -> Option<String> {
        let (code, market) = instrument_id.rsplit_once('.')?;
        let prefix = match market {
            "SH" => "1",
            "SZ" => "0",
            _ => return None,
        };
        Some(format!("{}.{}", prefix, code))
    }

    /// Reverse of [`secid`]: push2 market flag + code to qualified id.
    fn qualify(market_flag: i64, code: &str) -> String {
        let suffix = if market_flag == 1 { "SH" } else { "SZ" };
        format!("{}.{}", code, suffix)
    }

    fn unavailable(&self, reason: impl ToString) -> ProviderError {
        ProviderError::Unavailable {
            provider: "eastmoney".to_string(),
            reason: reason.to_string(),
        }
    }

    fn parse_err(&self, reason: impl ToString) -> ProviderError {
        ProviderError::Parse {
            provider: "eastmoney".to_string(),
            reason: reason.to_string(),
        }
    }

    async fn fetch_clist(&self, fs: &str) -> Result<Vec<Value>, ProviderError> {
        let resp = self
            .client
            .get(CLIST_URL)
            .query(&[
                ("pn", "1"),
                ("pz", "8000"),
                ("po", "0"),
                ("fs", fs),
                ("fields", "f12,f13,f14"),
            ])
            .send()
            .await
            .map_err(|e| self.unavailable(e))?;

        if !resp.status().is_success() {
            return Err(self.unavailable(format!("status {}", resp.status())));
        }

        let data: UlistResponse = resp.json().await.map_err(|e| self.parse_err(e))?;
        Ok(data.data.map(|d| d.diff).unwrap_or_default())
    }
}

/// Numeric fields come back as numbers, or "-" for suspended instruments.
fn num_field(row: &Value, key: &str) -> Option<f64> {
    row.get(key)?.as_f64()
}

fn str_field(row: &Value, key: &str) -> Option<String> {
    match row.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[async_trait]
impl QuoteProvider for EastmoneyProvider {
    async fn fetch_quotes(&self, instrument_ids: &[String]) -> Result<Vec<Quote>, ProviderError> {
        let secids: Vec<String> = instrument_ids
            .iter()
            .filter_map(|id| Self::secid(id))
            .collect();
        if secids.is_empty() {
            return Ok(Vec::new());
        }

        let resp = self
            .client
            .get(QUOTE_URL)
            .query(&[
                ("secids", secids.join(",").as_str()),
                ("fields", "f2,f3,f4,f5,f6,f12,f13,f14"),
                ("fltt", "1"),
            ])
            .send()
            .await
            .map_err(|e| self.unavailable(e))?;

        if !resp.status().is_success() {
            return Err(self.unavailable(format!("status {}", resp.status())));
        }

        let data: UlistResponse = resp.json().await.map_err(|e| self.parse_err(e))?;
        let rows = data.data.map(|d| d.diff).unwrap_or_default();

        let now = Utc::now();
        let mut quotes = Vec::with_capacity(rows.len());
        for row in &rows {
            let code = match str_field(row, "f12") {
                Some(c) => c,
                None => continue,
            };
            let market_flag = row.get("f13").and_then(Value::as_i64).unwrap_or(1);
            // Suspended instruments report "-" for price fields; skip them.
            let price = match num_field(row, "f2") {
                Some(p) => p / 100.0,
                None => continue,
            };
            quotes.push(Quote {
                instrument_id: Self::qualify(market_flag, &code),
                price,
                change: num_field(row, "f4").unwrap_or(0.0) / 100.0,
                change_percent: num_field(row, "f3").unwrap_or(0.0) / 100.0,
                // f5 is in lots of 100 shares
                volume: num_field(row, "f5").unwrap_or(0.0) * 100.0,
                amount: num_field(row, "f6").unwrap_or(0.0),
                timestamp: now,
            });
        }
        debug!(requested = instrument_ids.len(), returned = quotes.len(), "eastmoney quotes");
        Ok(quotes)
    }

    async fn fetch_daily_history(
        &self,
        instrument_id: &str,
        limit: usize,
    ) -> Result<Vec<Bar>, ProviderError> {
        let secid = Self::secid(instrument_id)
            .ok_or_else(|| self.parse_err(format!("unqualified id {instrument_id}")))?;

        let lmt = limit.to_string();
        let resp = self
            .client
            .get(KLINE_URL)
            .query(&[
                ("secid", secid.as_str()),
                ("klt", "101"),
                ("fqt", "1"),
                ("lmt", lmt.as_str()),
                ("fields1", "f1,f2,f3"),
                ("fields2", "f51,f52,f53,f54,f55,f56,f57"),
            ])
            .send()
            .await
            .map_err(|e| self.unavailable(e))?;

        if !resp.status().is_success() {
            return Err(self.unavailable(format!("status {}", resp.status())));
        }

        let data: KlineResponse = resp.json().await.map_err(|e| self.parse_err(e))?;
        let klines = data.data.map(|d| d.klines).unwrap_or_default();

        let mut bars = Vec::with_capacity(klines.len());
        for line in &klines {
            bars.push(parse_kline(line).ok_or_else(|| self.parse_err(format!("bad kline {line:?}")))?);
        }
        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }

    async fn fetch_catalog(&self, category: Category) -> Result<Vec<Instrument>, ProviderError> {
        // fs filters: SH main board + SZ main board for equities,
        // exchange-traded funds for funds.
        let fs = match category {
            Category::Equity => "m:1+t:2,m:1+t:23,m:0+t:6,m:0+t:80",
            Category::Fund => "b:MK0021,b:MK0022,b:MK0023,b:MK0024",
        };
        let rows = self.fetch_clist(fs).await?;

        let mut instruments = Vec::with_capacity(rows.len());
        for row in &rows {
            let code = match str_field(row, "f12") {
                Some(c) => c,
                None => continue,
            };
            let market_flag = row.get("f13").and_then(Value::as_i64).unwrap_or(1);
            let name = str_field(row, "f14").unwrap_or_default();
            instruments.push(Instrument::new(
                Self::qualify(market_flag, &code),
                name,
                category,
            ));
        }
        Ok(instruments)
    }

    fn name(&self) -> &str {
        "eastmoney"
    }
}

/// Parse one "date,open,close,high,low,volume,amount" kline row.
fn parse_kline(line: &str) -> Option<Bar> {
    let parts: Vec<&str> = line.split(',').collect();
    if parts.len() < 7 {
        return None;
    }
    let date = NaiveDate::parse_from_str(parts[0], "%Y-%m-%d").ok()?;
    Some(Bar {
        date,
        open: parts[1].parse().ok()?,
        close: parts[2].parse().ok()?,
        high: parts[3].parse().ok()?,
        low: parts[4].parse().ok()?,
        // kline volume is in lots as well
        volume: parts[5].parse::<f64>().ok()? * 100.0,
        amount: parts[6].parse().ok()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secid_mapping() {
        assert_eq!(EastmoneyProvider::secid("600519.SH").as_deref(), Some("1.600519"));
        assert_eq!(EastmoneyProvider::secid("000001.SZ").as_deref(), Some("0.000001"));
        assert_eq!(EastmoneyProvider::secid("600519"), None);
    }

    #[test]
    fn test_qualify() {
        assert_eq!(EastmoneyProvider::qualify(1, "600519"), "600519.SH");
        assert_eq!(EastmoneyProvider::qualify(0, "000001"), "000001.SZ");
    }

    #[test]
    fn test_parse_kline() {
        let bar = parse_kline("2024-05-06,1700.0,1712.5,1720.0,1695.0,28000,4800000000.0").unwrap();
        assert_eq!(bar.date, NaiveDate::from_ymd_opt(2024, 5, 6).unwrap());
        assert!((bar.open - 1700.0).abs() < 1e-9);
        assert!((bar.close - 1712.5).abs() < 1e-9);
        assert!((bar.volume - 2_800_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_kline_rejects_short_rows() {
        assert!(parse_kline("2024-05-06,1700.0,1712.5").is_none());
        assert!(parse_kline("").is_none());
    }

    #[test]
    fn test_num_field_skips_dash() {
        let row: Value = serde_json::json!({"f2": "-", "f12": "600519"});
        assert_eq!(num_field(&row, "f2"), None);
        assert_eq!(str_field(&row, "f12").as_deref(), Some("600519"));
    }
}
