use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::database::HoldingsStore;
use crate::error::HoldingsError;
use crate::fetch::FetcherRegistry;
use crate::models::{format_trade_date, parse_trade_date, Exchange};

/// Walks a closed date interval for one exchange, pulling records from the
/// matching fetcher and committing them one trading day at a time.
pub struct IngestDriver {
    store: HoldingsStore,
    registry: FetcherRegistry,
    // serializes overlapping runs (scheduled job + web trigger)
    run_lock: Mutex<()>,
}

/// Outcome of one ingestion run
#[derive(Debug, Default, Clone, PartialEq)]
pub struct IngestReport {
    pub days_visited: usize,
    pub days_skipped: usize,
    pub records_inserted: u64,
}

impl IngestDriver {
    pub fn new(store: HoldingsStore, registry: FetcherRegistry) -> Self {
        Self {
            store,
            registry,
            run_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &HoldingsStore {
        &self.store
    }

    /// Ingest `[start, end]` inclusive for one exchange.
    ///
    /// The exchange's rows inside the interval are cleared first, so a rerun
    /// refreshes the requested range; other exchanges and dates outside the
    /// interval are untouched. A fetch error aborts the loop, leaving
    /// already-committed days in place.
    pub async fn ingest_range(
        &self,
        exchange: Exchange,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<IngestReport> {
        // resolve the fetcher before touching any data
        let fetcher = self.registry.get(exchange)?;
        if start > end {
            return Err(HoldingsError::InvalidRange {
                start: format_trade_date(start),
                end: format_trade_date(end),
            }
            .into());
        }

        let _guard = self.run_lock.lock().await;
        fetcher.prepare()?;

        let start_s = format_trade_date(start);
        let end_s = format_trade_date(end);
        let removed = self.store.delete_range(exchange, &start_s, &end_s).await?;
        if removed > 0 {
            info!(
                "Cleared {} existing {} rows in [{}, {}] before refresh",
                removed, exchange, start_s, end_s
            );
        }
        info!("Ingesting {} from {} to {}", exchange, start_s, end_s);

        let mut report = IngestReport::default();
        let mut day = start;
        while day <= end {
            let tday = format_trade_date(day);
            report.days_visited += 1;

            if self.store.has_day(exchange, &tday).await? {
                debug!("{} {}: already ingested, skipping", exchange, tday);
                report.days_skipped += 1;
            } else {
                let records = fetcher
                    .fetch_day(day)
                    .await
                    .with_context(|| format!("fetch failed for {} on {}", exchange, tday))?;
                let inserted = self.store.insert_day(&records).await?;
                report.records_inserted += inserted;
                if inserted > 0 {
                    info!("{} {}: {} records", exchange, tday, inserted);
                } else {
                    debug!("{} {}: no bulletin", exchange, tday);
                }
            }

            day = day
                .succ_opt()
                .with_context(|| format!("date overflow after {}", day))?;
        }

        info!(
            "Ingest complete: {} days visited, {} skipped, {} records",
            report.days_visited, report.days_skipped, report.records_inserted
        );
        Ok(report)
    }

    /// String-parameter form used by the CLI and the web trigger.
    /// `end_date` defaults to the current date when absent or empty.
    pub async fn ingest_range_str(
        &self,
        exchange: &str,
        start_date: &str,
        end_date: Option<&str>,
    ) -> Result<IngestReport> {
        let exchange: Exchange = exchange.parse()?;
        let start = parse_trade_date(start_date)?;
        let end = match end_date {
            Some(s) if !s.trim().is_empty() => parse_trade_date(s)?,
            _ => Utc::now().date_naive(),
        };
        self.ingest_range(exchange, start, end).await
    }
}
