//! Sina quote provider.
//!
//! Quote payloads are `var hq_str_sh600519="...";` lines with comma-separated
//! fields; history comes from the CN_MarketDataService kline endpoint.
//! Sina rejects requests without a finance.sina Referer header.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use pulse_core::error::ProviderError;
use pulse_core::traits::QuoteProvider;
use pulse_core::types::{Bar, Category, Instrument, Quote};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const QUOTE_URL: &str = "https://hq.sinajs.cn/list=";
const KLINE_URL: &str =
    "https://quotes.sina.cn/cn/api/json_v2.php/CN_MarketDataService.getKLineData";

/// Sina provider client.
pub struct SinaProvider {
    client: Client,
}

#[derive(Debug, Deserialize)]
struct SinaKline {
    day: String,
    open: String,
    high: String,
    low: String,
    close: String,
    volume: String,
}

impl SinaProvider {
    /// Create a new Sina provider.
    pub fn new(timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Unavailable {
                provider: "sina".to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self { client })
    }

    /// Convert "600519.SH" into sina's "sh600519" symbol form.
    fn symbol(instrument_id: &str) -> Option<String> {
        let (code, market) = instrument_id.rsplit_once('.')?;
        let prefix = match market {
            "SH" => "sh",
            "SZ" => "sz",
            _ => return None,
        };
        Some(format!("{}{}", prefix, code))
    }

    /// Reverse of [`symbol`]: "sh600519" back to "600519.SH".
    fn qualify(symbol: &str) -> Option<String> {
        let (prefix, code) = symbol.split_at(2);
        let suffix = match prefix {
            "sh" => "SH",
            "sz" => "SZ",
            _ => return None,
        };
        Some(format!("{}.{}", code, suffix))
    }

    fn unavailable(&self, reason: impl ToString) -> ProviderError {
        ProviderError::Unavailable {
            provider: "sina".to_string(),
            reason: reason.to_string(),
        }
    }

    fn parse_err(&self, reason: impl ToString) -> ProviderError {
        ProviderError::Parse {
            provider: "sina".to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Parse one `var hq_str_sh600519="...";` line into a quote.
///
/// Field layout: 0 name, 1 open, 2 previous close, 3 price, 4 high, 5 low,
/// 8 volume (shares), 9 amount (yuan).
fn parse_quote_line(line: &str) -> Option<Quote> {
    let rest = line.trim().strip_prefix("var hq_str_")?;
    let (symbol, payload) = rest.split_once('=')?;
    let payload = payload.trim_end_matches(';').trim_matches('"');
    let fields: Vec<&str> = payload.split(',').collect();
    // Suspended or delisted symbols come back with an empty payload.
    if fields.len() < 10 {
        return None;
    }

    let price: f64 = fields[3].parse().ok()?;
    let prev_close: f64 = fields[2].parse().ok()?;
    let change = price - prev_close;
    let change_percent = if prev_close == 0.0 {
        0.0
    } else {
        change / prev_close * 100.0
    };

    Some(Quote {
        instrument_id: SinaProvider::qualify(symbol)?,
        price,
        change,
        change_percent,
        volume: fields[8].parse().ok()?,
        amount: fields[9].parse().ok()?,
        timestamp: Utc::now(),
    })
}

#[async_trait]
impl QuoteProvider for SinaProvider {
    async fn fetch_quotes(&self, instrument_ids: &[String]) -> Result<Vec<Quote>, ProviderError> {
        let symbols: Vec<String> = instrument_ids
            .iter()
            .filter_map(|id| Self::symbol(id))
            .collect();
        if symbols.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}{}", QUOTE_URL, symbols.join(","));
        let resp = self
            .client
            .get(&url)
            .header("Referer", "https://finance.sina.com.cn")
            .send()
            .await
            .map_err(|e| self.unavailable(e))?;

        if !resp.status().is_success() {
            return Err(self.unavailable(format!("status {}", resp.status())));
        }

        // The payload is GBK-encoded; only the name field is non-ASCII and we
        // don't consume it here, so a lossy decode is sufficient.
        let body = resp.bytes().await.map_err(|e| self.unavailable(e))?;
        let text = String::from_utf8_lossy(&body);

        let quotes: Vec<Quote> = text.lines().filter_map(parse_quote_line).collect();
        debug!(requested = instrument_ids.len(), returned = quotes.len(), "sina quotes");
        Ok(quotes)
    }

    async fn fetch_daily_history(
        &self,
        instrument_id: &str,
        limit: usize,
    ) -> Result<Vec<Bar>, ProviderError> {
        let symbol = Self::symbol(instrument_id)
            .ok_or_else(|| self.parse_err(format!("unqualified id {instrument_id}")))?;

        let datalen = limit.to_string();
        let resp = self
            .client
            .get(KLINE_URL)
            .query(&[
                ("symbol", symbol.as_str()),
                // scale 240 = daily bars
                ("scale", "240"),
                ("ma", "no"),
                ("datalen", datalen.as_str()),
            ])
            .header("Referer", "https://finance.sina.com.cn")
            .send()
            .await
            .map_err(|e| self.unavailable(e))?;

        if !resp.status().is_success() {
            return Err(self.unavailable(format!("status {}", resp.status())));
        }

        let rows: Vec<SinaKline> = resp.json().await.map_err(|e| self.parse_err(e))?;

        let mut bars = Vec::with_capacity(rows.len());
        for row in &rows {
            let date = NaiveDate::parse_from_str(&row.day, "%Y-%m-%d")
                .map_err(|e| self.parse_err(format!("bad day {:?}: {e}", row.day)))?;
            let close: f64 = row
                .close
                .parse()
                .map_err(|_| self.parse_err(format!("bad close {:?}", row.close)))?;
            bars.push(Bar {
                date,
                open: row.open.parse().unwrap_or(close),
                high: row.high.parse().unwrap_or(close),
                low: row.low.parse().unwrap_or(close),
                close,
                volume: row.volume.parse().unwrap_or(0.0),
                // Sina klines carry no turnover; approximate with close * volume.
                amount: close * row.volume.parse().unwrap_or(0.0),
            });
        }
        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }

    async fn fetch_catalog(&self, _category: Category) -> Result<Vec<Instrument>, ProviderError> {
        Err(ProviderError::CatalogUnsupported {
            provider: "sina".to_string(),
        })
    }

    fn name(&self) -> &str {
        "sina"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_mapping() {
        assert_eq!(SinaProvider::symbol("600519.SH").as_deref(), Some("sh600519"));
        assert_eq!(SinaProvider::symbol("000001.SZ").as_deref(), Some("sz000001"));
        assert_eq!(SinaProvider::symbol("600519"), None);
        assert_eq!(SinaProvider::qualify("sh600519").as_deref(), Some("600519.SH"));
    }

    #[test]
    fn test_parse_quote_line() {
        let line = r#"var hq_str_sh600519="贵州茅台,1700.00,1500.00,1520.00,1725.00,1690.00,1519.99,1520.00,3000000,4560000000.00,100,1519.99,2024-05-06,15:00:00,00";"#;
        let quote = parse_quote_line(line).unwrap();
        assert_eq!(quote.instrument_id, "600519.SH");
        assert!((quote.price - 1520.0).abs() < 1e-9);
        assert!((quote.change - 20.0).abs() < 1e-9);
        assert!((quote.change_percent - 20.0 / 1500.0 * 100.0).abs() < 1e-9);
        assert!((quote.volume - 3_000_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_quote_line_empty_payload() {
        // Delisted symbols come back with no fields.
        assert!(parse_quote_line(r#"var hq_str_sh600000="";"#).is_none());
        assert!(parse_quote_line("garbage").is_none());
    }
}
