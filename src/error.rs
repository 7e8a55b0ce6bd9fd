use thiserror::Error;

/// Domain errors with stable, user-facing messages. Infrastructure failures
/// (HTTP, database, filesystem) travel as `anyhow::Error` instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HoldingsError {
    #[error("unsupported exchange: {0} (expected one of SHFE, CFFEX, DCE, CZCE)")]
    UnsupportedExchange(String),

    #[error("invalid trade date '{0}' (expected YYYYMMDD)")]
    InvalidDate(String),

    #[error("invalid date range: start {start} is after end {end}")]
    InvalidRange { start: String, end: String },
}
