use anyhow::Result;
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::models::{format_trade_date, Exchange, HoldingRecord};

use super::{parse_amount, product_of, HoldingsFetcher};

/// Zhengzhou Commodity Exchange rank bulletin.
///
/// One pipe-delimited text file per day, sectioned per contract. Each data
/// row carries the rank followed by three (member, value, change) groups:
/// trading volume, long positions, short positions.
#[derive(Debug)]
pub struct CzceFetcher {
    client: Client,
}

impl CzceFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn bulletin_url(date: NaiveDate, tday: &str) -> String {
        format!(
            "http://www.czce.com.cn/cn/DFSStaticFiles/Future/{}/{}/FutureDataHolding.txt",
            date.year(),
            tday
        )
    }
}

/// Contract code out of a section header line, e.g. "合约代码:AP305 ..."
fn section_contract(line: &str) -> Option<String> {
    if !line.contains("合约") && !line.to_ascii_lowercase().contains("contract") {
        return None;
    }
    let after = line.split_once(&[':', '：'][..])?.1;
    let token = after
        .split(|c: char| c.is_whitespace() || c == ',' || c == '，')
        .find(|t| !t.is_empty())?;
    Some(token.to_string())
}

pub(super) fn parse_text(tday: &str, body: &str) -> Vec<HoldingRecord> {
    let mut records = Vec::new();
    let mut contract = String::new();

    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(c) = section_contract(line) {
            contract = c;
            continue;
        }
        let fields: Vec<&str> = line.split('|').map(str::trim).collect();
        if fields.len() < 10 || contract.is_empty() {
            continue;
        }
        let rank = match parse_amount(fields[0]) {
            Some(rank) if (1..=20).contains(&rank) => rank,
            _ => continue, // header and totals rows
        };
        for (group, base) in [(1, 1), (2, 4), (3, 7)] {
            let member = fields[base];
            if member.is_empty() || member == "-" {
                continue;
            }
            records.push(HoldingRecord {
                id: None,
                tday: tday.to_string(),
                exchange: Exchange::Czce,
                code: String::new(),
                product: product_of(&contract),
                contract: contract.clone(),
                symbol: group.to_string(),
                rank,
                member: member.to_string(),
                value: parse_amount(fields[base + 1]).unwrap_or(0),
                change: parse_amount(fields[base + 2]).unwrap_or(0),
            });
        }
    }
    records
}

#[async_trait]
impl HoldingsFetcher for CzceFetcher {
    async fn fetch_day(&self, date: NaiveDate) -> Result<Vec<HoldingRecord>> {
        let tday = format_trade_date(date);
        let url = Self::bulletin_url(date, &tday);
        debug!("Fetching CZCE bulletin: {}", url);

        let response = self.client.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            anyhow::bail!("CZCE bulletin request failed with status {}", response.status());
        }
        let body = response.text().await?;
        Ok(parse_text(&tday, &body))
    }
}
