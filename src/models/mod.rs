use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::HoldingsError;

/// Storage format for trading days; fixed-width and zero-padded, so
/// lexicographic order equals chronological order.
pub const TRADE_DATE_FORMAT: &str = "%Y%m%d";

/// Source exchange enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Exchange {
    Shfe,
    Cffex,
    Dce,
    Czce,
}

impl Exchange {
    pub const ALL: [Exchange; 4] = [Exchange::Shfe, Exchange::Cffex, Exchange::Dce, Exchange::Czce];

    /// Uppercase form used in storage and API responses
    pub fn as_str(&self) -> &'static str {
        match self {
            Exchange::Shfe => "SHFE",
            Exchange::Cffex => "CFFEX",
            Exchange::Dce => "DCE",
            Exchange::Czce => "CZCE",
        }
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Exchange {
    type Err = HoldingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "shfe" => Ok(Exchange::Shfe),
            "cffex" => Ok(Exchange::Cffex),
            "dce" => Ok(Exchange::Dce),
            "czce" => Ok(Exchange::Czce),
            other => Err(HoldingsError::UnsupportedExchange(other.to_string())),
        }
    }
}

/// One holdings ranking row: a clearing member's position size for a
/// (trading day, exchange, contract, side) group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingRecord {
    pub id: Option<i64>,
    /// Trading day, `YYYYMMDD`
    pub tday: String,
    pub exchange: Exchange,
    /// Exchange-internal member code (may be empty for sources that only
    /// publish the member name)
    pub code: String,
    pub product: String,
    pub contract: String,
    /// Side/category flag, one character: "1" volume, "2" long, "3" short
    pub symbol: String,
    pub rank: i64,
    pub member: String,
    pub value: i64,
    pub change: i64,
}

/// Answer to "what data do we have": distinct exchanges plus the covered
/// date interval. Both dates are `None` on an empty store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageSummary {
    #[serde(rename = "exchange")]
    pub exchanges: Vec<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Parse a `YYYYMMDD` trade date, rejecting malformed input
pub fn parse_trade_date(s: &str) -> Result<NaiveDate, HoldingsError> {
    NaiveDate::parse_from_str(s.trim(), TRADE_DATE_FORMAT)
        .map_err(|_| HoldingsError::InvalidDate(s.to_string()))
}

/// Format a date back into the 8-character storage form
pub fn format_trade_date(date: NaiveDate) -> String {
    date.format(TRADE_DATE_FORMAT).to_string()
}
