use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::debug;

use crate::models::{format_trade_date, Exchange, HoldingRecord};

use super::{int_field, product_of, text_field, HoldingsFetcher};

/// Shanghai Futures Exchange rank bulletin.
///
/// The daily `pm{date}.dat` file is JSON with one entry per (contract, rank);
/// each entry carries the three ranking groups side by side (1 trading
/// volume, 2 long positions, 3 short positions).
#[derive(Debug)]
pub struct ShfeFetcher {
    client: Client,
    base_url: String,
}

impl ShfeFetcher {
    pub fn new(client: Client) -> Self {
        Self::with_base_url(client, "https://www.shfe.com.cn".to_string())
    }

    /// Point the fetcher at a different host (mock servers in tests)
    pub fn with_base_url(client: Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    fn bulletin_url(&self, tday: &str) -> String {
        format!("{}/data/dailydata/kx/pm{}.dat", self.base_url, tday)
    }
}

pub(super) fn parse_bulletin(tday: &str, body: &Value) -> Vec<HoldingRecord> {
    let mut records = Vec::new();
    let rows = match body.get("o_cursor").and_then(Value::as_array) {
        Some(rows) => rows,
        None => return records,
    };

    for row in rows {
        let rank = int_field(row, "RANK").unwrap_or(0);
        // rank 999 marks per-contract totals
        if !(1..=20).contains(&rank) {
            continue;
        }
        let contract = text_field(row, "INSTRUMENTID");
        if contract.is_empty() {
            continue;
        }
        for group in 1..=3 {
            let member = text_field(row, &format!("PARTICIPANTABBR{}", group));
            if member.is_empty() {
                continue;
            }
            records.push(HoldingRecord {
                id: None,
                tday: tday.to_string(),
                exchange: Exchange::Shfe,
                code: text_field(row, &format!("PARTICIPANTID{}", group)),
                product: product_of(&contract),
                contract: contract.clone(),
                symbol: group.to_string(),
                rank,
                member,
                value: int_field(row, &format!("CJ{}", group)).unwrap_or(0),
                change: int_field(row, &format!("CJ{}_CHG", group)).unwrap_or(0),
            });
        }
    }
    records
}

#[async_trait]
impl HoldingsFetcher for ShfeFetcher {
    async fn fetch_day(&self, date: NaiveDate) -> Result<Vec<HoldingRecord>> {
        let tday = format_trade_date(date);
        let url = self.bulletin_url(&tday);
        debug!("Fetching SHFE bulletin: {}", url);

        let response = self.client.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            // no bulletin on non-trading days
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            anyhow::bail!("SHFE bulletin request failed with status {}", response.status());
        }

        let body: Value = response
            .json()
            .await
            .with_context(|| format!("SHFE bulletin for {} is not valid JSON", tday))?;
        Ok(parse_bulletin(&tday, &body))
    }
}
