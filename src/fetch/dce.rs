use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use reqwest::Client;
use tracing::debug;

use crate::models::{format_trade_date, Exchange, HoldingRecord};

use super::{parse_amount, product_of, HoldingsFetcher};

const EXPORT_URL: &str =
    "http://www.dce.com.cn/publicweb/quotesdata/exportMemberDealPosiQuotesData.html";

/// Commodity varieties with published rankings
const VARIETIES: &[&str] = &[
    "a", "b", "c", "cs", "m", "y", "p", "i", "j", "jm", "l", "v", "pp", "eg", "eb", "pg", "rr",
    "jd", "fb",
];

/// Dalian Commodity Exchange rank bulletin.
///
/// DCE only offers a form-post export, one plain-text table per variety. The
/// raw export is staged in the download directory and a copy is kept in the
/// archive directory; both are created on `prepare`.
#[derive(Debug)]
pub struct DceFetcher {
    client: Client,
    download_dir: PathBuf,
    archive_dir: PathBuf,
}

impl DceFetcher {
    pub fn new(client: Client, download_dir: PathBuf, archive_dir: PathBuf) -> Self {
        Self {
            client,
            download_dir,
            archive_dir,
        }
    }

    fn stage_bulletin(&self, tday: &str, variety: &str, body: &str) -> Result<()> {
        let file_name = format!("{}_{}.txt", tday, variety);
        let staged = self.download_dir.join(&file_name);
        fs::write(&staged, body)
            .with_context(|| format!("failed to stage DCE bulletin at {}", staged.display()))?;
        fs::copy(&staged, self.archive_dir.join(&file_name))?;
        Ok(())
    }
}

/// Ranking category markers in the export's section headers
fn section_category(line: &str) -> Option<u8> {
    if line.contains("持买") {
        Some(2)
    } else if line.contains("持卖") {
        Some(3)
    } else if line.contains("成交量") {
        Some(1)
    } else {
        None
    }
}

pub(super) fn parse_text(tday: &str, body: &str) -> Vec<HoldingRecord> {
    let mut records = Vec::new();
    let mut contract = String::new();
    let mut category = 0u8;

    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.contains("合约") {
            if let Some(after) = line.split_once(&[':', '：'][..]) {
                if let Some(token) = after.1.split_whitespace().next() {
                    contract = token.to_string();
                }
            }
            continue;
        }
        if let Some(c) = section_category(line) {
            category = c;
            continue;
        }

        // data rows: rank member value change
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 || contract.is_empty() || category == 0 {
            continue;
        }
        let rank = match parse_amount(fields[0]) {
            Some(rank) if (1..=20).contains(&rank) => rank,
            _ => continue,
        };
        records.push(HoldingRecord {
            id: None,
            tday: tday.to_string(),
            exchange: Exchange::Dce,
            code: String::new(),
            product: product_of(&contract),
            contract: contract.clone(),
            symbol: category.to_string(),
            rank,
            member: fields[1].to_string(),
            value: parse_amount(fields[2]).unwrap_or(0),
            change: parse_amount(fields[3]).unwrap_or(0),
        });
    }
    records
}

#[async_trait]
impl HoldingsFetcher for DceFetcher {
    fn prepare(&self) -> Result<()> {
        fs::create_dir_all(&self.download_dir).with_context(|| {
            format!(
                "failed to create DCE download dir {}",
                self.download_dir.display()
            )
        })?;
        fs::create_dir_all(&self.archive_dir).with_context(|| {
            format!(
                "failed to create DCE archive dir {}",
                self.archive_dir.display()
            )
        })?;
        Ok(())
    }

    async fn fetch_day(&self, date: NaiveDate) -> Result<Vec<HoldingRecord>> {
        let tday = format_trade_date(date);
        let mut records = Vec::new();

        for variety in VARIETIES {
            debug!("Fetching DCE bulletin for variety {} on {}", variety, tday);
            // the export form counts months from zero
            let form = [
                ("memberDealPosiQuotes.variety", variety.to_string()),
                ("memberDealPosiQuotes.trade_type", "0".to_string()),
                ("year", date.year().to_string()),
                ("month", (date.month() - 1).to_string()),
                ("day", format!("{:02}", date.day())),
                ("exportFlag", "txt".to_string()),
            ];

            let response = self.client.post(EXPORT_URL).form(&form).send().await?;
            if !response.status().is_success() {
                anyhow::bail!(
                    "DCE export request for {} failed with status {}",
                    variety,
                    response.status()
                );
            }
            let body = response.text().await?;
            let parsed = parse_text(&tday, &body);
            if parsed.is_empty() {
                continue; // variety not traded that day
            }
            self.stage_bulletin(&tday, variety, &body)?;
            records.extend(parsed);
        }
        Ok(records)
    }
}
