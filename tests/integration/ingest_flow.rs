//! End-to-end ingestion driver tests with fetcher doubles

use std::sync::Arc;

use chrono::NaiveDate;
use pretty_assertions::assert_eq;

use futures_holdings::database::HoldingsStore;
use futures_holdings::error::HoldingsError;
use futures_holdings::fetch::FetcherRegistry;
use futures_holdings::ingest::IngestDriver;
use futures_holdings::models::Exchange;

use crate::common::fetchers::{FailingFetcher, RecordingFetcher, StaticFetcher};
use crate::common::{database, test_data};

fn driver_with(
    store: HoldingsStore,
    exchange: Exchange,
    fetcher: Arc<dyn futures_holdings::fetch::HoldingsFetcher>,
) -> IngestDriver {
    let mut registry = FetcherRegistry::empty();
    registry.insert(exchange, fetcher);
    IngestDriver::new(store, registry)
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
async fn test_single_day_preserves_per_day_multiplicity() {
    let (store, _dir) = database::init_fresh_store().await.expect("fresh store");

    // two records differing only in member, same day and exchange
    let day = date(2023, 1, 3);
    let fetcher = StaticFetcher::single_day(
        day,
        vec![
            test_data::record("20230103", Exchange::Shfe, "memberA"),
            test_data::record("20230103", Exchange::Shfe, "memberB"),
        ],
    );
    let driver = driver_with(store, Exchange::Shfe, Arc::new(fetcher));

    let report = driver
        .ingest_range_str("shfe", "20230103", Some("20230103"))
        .await
        .expect("ingest");

    assert_eq!(report.days_visited, 1);
    assert_eq!(report.records_inserted, 2);

    let rows = driver.store().list_all().await.unwrap();
    assert_eq!(rows.len(), 2);
    let mut members: Vec<&str> = rows.iter().map(|r| r.member.as_str()).collect();
    members.sort();
    assert_eq!(members, vec!["memberA", "memberB"]);
}

#[tokio::test]
async fn test_driver_visits_each_day_once_in_order() {
    let (store, _dir) = database::init_fresh_store().await.expect("fresh store");

    let (fetcher, visited) = RecordingFetcher::new();
    let driver = driver_with(store, Exchange::Czce, Arc::new(fetcher));

    driver
        .ingest_range(Exchange::Czce, date(2023, 1, 30), date(2023, 2, 2))
        .await
        .expect("ingest");

    // inclusive walk, one step per calendar day, across the month boundary
    let expected = vec![
        date(2023, 1, 30),
        date(2023, 1, 31),
        date(2023, 2, 1),
        date(2023, 2, 2),
    ];
    assert_eq!(*visited.lock().unwrap(), expected);
}

#[tokio::test]
async fn test_unknown_exchange_fails_before_touching_data() {
    let (store, _dir) = database::init_fresh_store().await.expect("fresh store");

    // pre-seed another exchange's data
    store
        .insert_day(&[test_data::record("20230103", Exchange::Dce, "memberA")])
        .await
        .expect("seed");

    let driver = driver_with(
        store,
        Exchange::Dce,
        Arc::new(StaticFetcher::empty()),
    );

    let err = driver
        .ingest_range_str("nyse", "20230101", Some("20230105"))
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<HoldingsError>(),
        Some(HoldingsError::UnsupportedExchange(_))
    ));

    // nothing was cleared or inserted
    assert_eq!(driver.store().count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_start_after_end_is_rejected() {
    let (store, _dir) = database::init_fresh_store().await.expect("fresh store");
    let driver = driver_with(store, Exchange::Shfe, Arc::new(StaticFetcher::empty()));

    let err = driver
        .ingest_range(Exchange::Shfe, date(2023, 1, 10), date(2023, 1, 3))
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<HoldingsError>(),
        Some(HoldingsError::InvalidRange { .. })
    ));
}

#[tokio::test]
async fn test_malformed_date_is_rejected() {
    let (store, _dir) = database::init_fresh_store().await.expect("fresh store");
    let driver = driver_with(store, Exchange::Shfe, Arc::new(StaticFetcher::empty()));

    let err = driver
        .ingest_range_str("shfe", "2023-01-03", None)
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<HoldingsError>(),
        Some(HoldingsError::InvalidDate(_))
    ));
}

#[tokio::test]
async fn test_rerun_refreshes_without_duplicating() {
    let (store, _dir) = database::init_fresh_store().await.expect("fresh store");

    let day = date(2023, 1, 3);
    let fetcher = Arc::new(StaticFetcher::single_day(
        day,
        vec![
            test_data::record("20230103", Exchange::Shfe, "memberA"),
            test_data::record("20230103", Exchange::Shfe, "memberB"),
        ],
    ));
    let driver = driver_with(store, Exchange::Shfe, fetcher);

    for _ in 0..2 {
        driver
            .ingest_range(Exchange::Shfe, day, day)
            .await
            .expect("ingest");
    }
    assert_eq!(driver.store().count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_refresh_leaves_other_exchanges_alone() {
    let (store, _dir) = database::init_fresh_store().await.expect("fresh store");

    store
        .insert_day(&[test_data::record("20230103", Exchange::Dce, "memberA")])
        .await
        .expect("seed");

    let day = date(2023, 1, 3);
    let fetcher = Arc::new(StaticFetcher::single_day(
        day,
        vec![test_data::record("20230103", Exchange::Shfe, "memberB")],
    ));
    let driver = driver_with(store, Exchange::Shfe, fetcher);

    driver
        .ingest_range(Exchange::Shfe, day, day)
        .await
        .expect("ingest");

    let rows = driver.store().list_all().await.unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().any(|r| r.exchange == Exchange::Dce));
}

#[tokio::test]
async fn test_fetch_error_keeps_committed_days() {
    let (store, _dir) = database::init_fresh_store().await.expect("fresh store");

    let fetcher = Arc::new(FailingFetcher {
        fail_on: date(2023, 1, 4),
        records: vec![test_data::record("20230103", Exchange::Czce, "memberA")],
    });
    let driver = driver_with(store, Exchange::Czce, fetcher);

    let result = driver
        .ingest_range(Exchange::Czce, date(2023, 1, 3), date(2023, 1, 5))
        .await;
    assert!(result.is_err());

    // the day committed before the failure survives
    let rows = driver.store().list_all().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].tday, "20230103");
}

#[tokio::test]
async fn test_coverage_after_ingest() {
    let (store, _dir) = database::init_fresh_store().await.expect("fresh store");

    let fetcher = Arc::new(StaticFetcher::new(
        [
            (
                date(2023, 1, 3),
                vec![test_data::record("20230103", Exchange::Shfe, "memberA")],
            ),
            (
                date(2023, 1, 5),
                vec![test_data::record("20230105", Exchange::Shfe, "memberA")],
            ),
        ]
        .into(),
    ));
    let driver = driver_with(store, Exchange::Shfe, fetcher);

    let report = driver
        .ingest_range(Exchange::Shfe, date(2023, 1, 3), date(2023, 1, 5))
        .await
        .expect("ingest");
    assert_eq!(report.days_visited, 3);
    assert_eq!(report.records_inserted, 2);

    let coverage = driver.store().coverage().await.unwrap();
    assert_eq!(coverage.exchanges, vec!["SHFE".to_string()]);
    assert_eq!(coverage.start_date, Some("20230103".to_string()));
    assert_eq!(coverage.end_date, Some("20230105".to_string()));
}
