use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde_json::Value;

use crate::config::Config;
use crate::error::HoldingsError;
use crate::models::{Exchange, HoldingRecord};

pub mod cffex;
pub mod czce;
pub mod dce;
pub mod shfe;

pub use cffex::CffexFetcher;
pub use czce::CzceFetcher;
pub use dce::DceFetcher;
pub use shfe::ShfeFetcher;

/// A source of one exchange's daily holdings ranking bulletin.
///
/// `fetch_day` is a finite, single-pass producer: one call, one full pass
/// over that day's records. An empty Vec means no bulletin was published
/// (holiday or weekend), which is not an error.
#[async_trait]
pub trait HoldingsFetcher: Send + Sync + std::fmt::Debug {
    /// One-time setup before a range ingest (working directories etc.)
    fn prepare(&self) -> Result<()> {
        Ok(())
    }

    async fn fetch_day(&self, date: NaiveDate) -> Result<Vec<HoldingRecord>>;
}

/// Explicit mapping from exchange to its fetcher.
///
/// Lookup of an exchange without a registered fetcher is a defined error,
/// not a runtime lookup failure.
pub struct FetcherRegistry {
    fetchers: HashMap<Exchange, Arc<dyn HoldingsFetcher>>,
}

impl FetcherRegistry {
    pub fn empty() -> Self {
        Self {
            fetchers: HashMap::new(),
        }
    }

    /// Registry with the four production fetchers wired up
    pub fn with_defaults(config: &Config) -> Result<Self> {
        let client = http_client(config.http_timeout_secs)?;
        let mut registry = Self::empty();
        registry.insert(Exchange::Shfe, Arc::new(ShfeFetcher::new(client.clone())));
        registry.insert(Exchange::Cffex, Arc::new(CffexFetcher::new(client.clone())));
        registry.insert(Exchange::Czce, Arc::new(CzceFetcher::new(client.clone())));
        registry.insert(
            Exchange::Dce,
            Arc::new(DceFetcher::new(
                client,
                config.dce_download_dir.clone(),
                config.dce_archive_dir.clone(),
            )),
        );
        Ok(registry)
    }

    pub fn insert(&mut self, exchange: Exchange, fetcher: Arc<dyn HoldingsFetcher>) {
        self.fetchers.insert(exchange, fetcher);
    }

    pub fn get(&self, exchange: Exchange) -> Result<Arc<dyn HoldingsFetcher>, HoldingsError> {
        self.fetchers
            .get(&exchange)
            .cloned()
            .ok_or_else(|| HoldingsError::UnsupportedExchange(exchange.to_string()))
    }
}

/// Shared HTTP client for bulletin downloads
pub fn http_client(timeout_secs: u64) -> Result<Client> {
    let client = Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .user_agent(concat!("futures-holdings/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Trimmed string field of a JSON bulletin row, empty when missing
pub(crate) fn text_field(row: &Value, key: &str) -> String {
    row.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or("")
        .to_string()
}

/// Integer field of a JSON bulletin row; exchanges sometimes quote numbers
/// and use thousands separators
pub(crate) fn int_field(row: &Value, key: &str) -> Option<i64> {
    let v = row.get(key)?;
    v.as_i64()
        .or_else(|| v.as_str().and_then(|s| parse_amount(s)))
}

/// Parse a possibly comma-grouped signed integer, `None` when not numeric
pub(crate) fn parse_amount(s: &str) -> Option<i64> {
    let cleaned = s.trim().replace(',', "");
    if cleaned.is_empty() || cleaned == "-" {
        return None;
    }
    cleaned.parse().ok()
}

/// Product identifier of a contract code, e.g. "cu2309" -> "cu", "TA305" -> "TA"
pub(crate) fn product_of(contract: &str) -> String {
    contract
        .trim()
        .trim_end_matches(|c: char| c.is_ascii_digit())
        .to_string()
}
