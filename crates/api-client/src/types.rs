// In crates/api-client/src/types.rs

use chrono::{Duration, NaiveDate};
use core_types::{Account, OptionContract, Quote, Symbol};
use reqwest::Client;
use serde::Deserialize;
use std::path::PathBuf;

use crate::auth::{AuthToken, Credentials};

/// Earnings dates reported in the past are pushed forward by a quarter.
pub const EARNINGS_ROLL_FORWARD_DAYS: i64 = 90;

/// The main client for interacting with the brokerage REST API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    /// The persistent HTTP client.
    pub http_client: Client,
    /// Consumer key, secret and sandbox flag.
    pub credentials: Credentials,
    /// The current access token, if any.
    pub token: Option<AuthToken>,
    /// Where the access token is persisted.
    pub authtoken_file: PathBuf,
    /// The base URL for market and account endpoints.
    pub base_url: String,
    /// The base URL for the OAuth token endpoints.
    pub oauth_base_url: String,
    /// The page where a user authorizes a request token.
    pub authorize_url: String,
}

/// A request token waiting for the user to supply a verifier code.
#[derive(Debug, Clone)]
pub struct PendingAuthorization {
    pub authorize_url: String,
    pub request_token: String,
    pub request_token_secret: String,
}

// --- Raw response shapes ---

#[derive(Debug, Deserialize)]
pub struct QuoteEnvelope {
    #[serde(rename = "QuoteResponse")]
    pub quote_response: RawQuoteResponse,
}

#[derive(Debug, Deserialize, Default)]
pub struct RawQuoteResponse {
    #[serde(rename = "QuoteData", default)]
    pub quote_data: Vec<RawQuoteData>,
}

#[derive(Debug, Deserialize)]
pub struct RawQuoteData {
    #[serde(rename = "Product")]
    pub product: RawProduct,
    #[serde(rename = "All", default)]
    pub all: RawAllQuoteDetails,
}

#[derive(Debug, Deserialize)]
pub struct RawProduct {
    pub symbol: String,
}

/// The `All` detail block of a quote. Missing fields default to zero.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct RawAllQuoteDetails {
    pub company_name: String,
    pub last_trade: f64,
    pub bid: f64,
    pub ask: f64,
    pub bid_size: u64,
    pub ask_size: u64,
    pub high: f64,
    pub low: f64,
    pub high52: f64,
    pub low52: f64,
    pub previous_close: f64,
    pub change_close: f64,
    pub change_close_percentage: f64,
    pub total_volume: u64,
    pub average_volume: u64,
    pub beta: f64,
    pub market_cap: f64,
    pub shares_outstanding: f64,
    pub dividend: f64,
    /// `MM/DD/YYYY`, or empty.
    pub next_earning_date: String,
}

impl RawQuoteData {
    /// Converts into the clean `Quote`, rolling stale earnings dates forward.
    pub fn into_quote(self, today: NaiveDate) -> Quote {
        let all = self.all;
        let next_earnings_date = NaiveDate::parse_from_str(all.next_earning_date.trim(), "%m/%d/%Y")
            .ok()
            .map(|date| {
                if date < today {
                    date + Duration::days(EARNINGS_ROLL_FORWARD_DAYS)
                } else {
                    date
                }
            });

        Quote {
            symbol: Symbol(self.product.symbol),
            company_name: all.company_name,
            price: all.last_trade,
            bid: all.bid,
            ask: all.ask,
            bid_size: all.bid_size,
            ask_size: all.ask_size,
            day_high: all.high,
            day_low: all.low,
            week52_high: all.high52,
            week52_low: all.low52,
            previous_close: all.previous_close,
            change_close: all.change_close,
            change_close_percentage: all.change_close_percentage,
            volume: all.total_volume,
            average_volume: all.average_volume,
            beta: all.beta,
            market_cap: all.market_cap,
            shares_outstanding: all.shares_outstanding,
            dividend: all.dividend,
            next_earnings_date,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct OptionChainEnvelope {
    #[serde(rename = "OptionChainResponse")]
    pub option_chain_response: RawOptionChainResponse,
}

#[derive(Debug, Deserialize)]
pub struct RawOptionChainResponse {
    #[serde(rename = "OptionPair", default)]
    pub option_pairs: Vec<RawOptionPair>,
    #[serde(rename = "SelectedED")]
    pub selected_expiration: Option<RawExpirationDate>,
}

#[derive(Debug, Deserialize)]
pub struct RawOptionPair {
    #[serde(rename = "Call")]
    pub call: Option<RawOption>,
    #[serde(rename = "Put")]
    pub put: Option<RawOption>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawOption {
    #[serde(default)]
    pub display_symbol: String,
    pub strike_price: f64,
    #[serde(default)]
    pub bid: f64,
    #[serde(default)]
    pub ask: f64,
    #[serde(default)]
    pub last_price: f64,
    #[serde(default)]
    pub volume: u64,
    #[serde(default)]
    pub open_interest: u64,
    #[serde(rename = "OptionGreeks")]
    pub greeks: Option<RawGreeks>,
}

#[derive(Debug, Deserialize)]
pub struct RawGreeks {
    pub delta: Option<f64>,
    pub theta: Option<f64>,
}

impl From<RawOption> for OptionContract {
    fn from(raw: RawOption) -> Self {
        OptionContract {
            display_symbol: raw.display_symbol,
            strike_price: raw.strike_price,
            bid: raw.bid,
            ask: raw.ask,
            last_price: raw.last_price,
            volume: raw.volume,
            open_interest: raw.open_interest,
            delta: raw.greeks.as_ref().and_then(|g| g.delta),
            theta: raw.greeks.as_ref().and_then(|g| g.theta),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct RawExpirationDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl RawExpirationDate {
    pub fn to_date(self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
    }
}

#[derive(Debug, Deserialize)]
pub struct ExpireDateEnvelope {
    #[serde(rename = "OptionExpireDateResponse")]
    pub response: RawExpireDateResponse,
}

#[derive(Debug, Deserialize)]
pub struct RawExpireDateResponse {
    #[serde(rename = "ExpirationDate", default)]
    pub expiration_dates: Vec<RawExpirationDate>,
}

#[derive(Debug, Deserialize)]
pub struct AccountListEnvelope {
    #[serde(rename = "AccountListResponse")]
    pub response: RawAccountListResponse,
}

#[derive(Debug, Deserialize)]
pub struct RawAccountListResponse {
    #[serde(rename = "Accounts")]
    pub accounts: RawAccounts,
}

#[derive(Debug, Deserialize)]
pub struct RawAccounts {
    #[serde(rename = "Account", default)]
    pub account: Vec<RawAccount>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAccount {
    pub account_id: Option<String>,
    pub account_id_key: Option<String>,
    #[serde(default)]
    pub account_name: String,
    #[serde(default)]
    pub account_type: String,
    #[serde(default)]
    pub account_desc: String,
}

impl RawAccount {
    /// Accounts without an id or key are skipped. A blank name falls back
    /// to the description.
    pub fn into_account(self) -> Option<Account> {
        let id = self.account_id?;
        let key = self.account_id_key?;
        let name = if self.account_name.trim().is_empty() {
            self.account_desc.clone()
        } else {
            self.account_name
        };
        Some(Account {
            id,
            key,
            name,
            account_type: self.account_type,
            description: self.account_desc,
        })
    }
}
