use anyhow::Result;
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::models::{format_trade_date, Exchange, HoldingRecord};

use super::{parse_amount, product_of, HoldingsFetcher};

/// Financial futures products with published rankings
const PRODUCTS: &[&str] = &["IF", "IC", "IH", "IM", "T", "TF", "TS", "TL"];

/// China Financial Futures Exchange rank bulletin.
///
/// CFFEX publishes one delimited file per product and ranking category
/// (`{product}_{category}.csv`); data rows are
/// `contract,rank,member,value,change`. A missing file just means the
/// product did not trade that day.
#[derive(Debug)]
pub struct CffexFetcher {
    client: Client,
}

impl CffexFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn bulletin_url(date: NaiveDate, product: &str, category: u8) -> String {
        format!(
            "http://www.cffex.com.cn/sj/ccpm/{:04}{:02}/{:02}/{}_{}.csv",
            date.year(),
            date.month(),
            date.day(),
            product,
            category
        )
    }
}

pub(super) fn parse_table(tday: &str, category: u8, body: &str) -> Result<Vec<HoldingRecord>> {
    let mut records = Vec::new();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(body.as_bytes());

    for row in reader.records() {
        let row = row?;
        if row.len() < 5 {
            continue;
        }
        // header and totals lines fail the rank parse and drop out here
        let rank = match row.get(1).and_then(parse_amount) {
            Some(rank) if (1..=20).contains(&rank) => rank,
            _ => continue,
        };
        let contract = row.get(0).unwrap_or("").trim().to_string();
        let member = row.get(2).unwrap_or("").trim().to_string();
        if contract.is_empty() || member.is_empty() {
            continue;
        }
        records.push(HoldingRecord {
            id: None,
            tday: tday.to_string(),
            exchange: Exchange::Cffex,
            code: String::new(),
            product: product_of(&contract),
            contract,
            symbol: category.to_string(),
            rank,
            member,
            value: row.get(3).and_then(parse_amount).unwrap_or(0),
            change: row.get(4).and_then(parse_amount).unwrap_or(0),
        });
    }
    Ok(records)
}

#[async_trait]
impl HoldingsFetcher for CffexFetcher {
    async fn fetch_day(&self, date: NaiveDate) -> Result<Vec<HoldingRecord>> {
        let tday = format_trade_date(date);
        let mut records = Vec::new();

        for product in PRODUCTS {
            for category in 1..=3u8 {
                let url = Self::bulletin_url(date, product, category);
                debug!("Fetching CFFEX bulletin: {}", url);

                let response = self.client.get(&url).send().await?;
                if response.status() == StatusCode::NOT_FOUND {
                    continue;
                }
                if !response.status().is_success() {
                    anyhow::bail!(
                        "CFFEX bulletin request for {} failed with status {}",
                        product,
                        response.status()
                    );
                }
                let body = response.text().await?;
                records.extend(parse_table(&tday, category, &body)?);
            }
        }
        Ok(records)
    }
}
