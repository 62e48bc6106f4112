use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A ticker symbol, e.g. "AAPL".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Symbol(pub String);

impl Symbol {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Symbol {
    fn from(value: &str) -> Self {
        Symbol(value.to_string())
    }
}

impl From<String> for Symbol {
    fn from(value: String) -> Self {
        Symbol(value)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A point-in-time stock quote with the detail fields the screener and the
/// `quote` command care about.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: Symbol,
    pub company_name: String,
    /// Last traded price.
    pub price: f64,
    pub bid: f64,
    pub ask: f64,
    pub bid_size: u64,
    pub ask_size: u64,
    pub day_high: f64,
    pub day_low: f64,
    pub week52_high: f64,
    pub week52_low: f64,
    pub previous_close: f64,
    pub change_close: f64,
    pub change_close_percentage: f64,
    pub volume: u64,
    pub average_volume: u64,
    pub beta: f64,
    pub market_cap: f64,
    pub shares_outstanding: f64,
    pub dividend: f64,
    pub next_earnings_date: Option<NaiveDate>,
}

impl Quote {
    /// Market cap abbreviated as "12.3B" / "456.7M".
    pub fn market_cap_display(&self) -> String {
        abbreviate(self.market_cap)
    }

    /// Shares outstanding abbreviated the same way as the market cap.
    pub fn float_display(&self) -> String {
        abbreviate(self.shares_outstanding)
    }
}

fn abbreviate(value: f64) -> String {
    if value > 1e9 {
        format!("{:.1}B", value / 1e9)
    } else if value > 1e6 {
        format!("{:.1}M", value / 1e6)
    } else {
        format!("{}", value)
    }
}

/// A brokerage account as returned by the account list endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub key: String,
    pub name: String,
    pub account_type: String,
    pub description: String,
}

impl Account {
    pub fn display_name(&self) -> String {
        format!("{} ({})", self.name, self.id)
    }
}
