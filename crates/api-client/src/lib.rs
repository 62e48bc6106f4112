// In crates/api-client/src/lib.rs

use app_config::types::BrokerageSettings;
use async_trait::async_trait;
use chrono::{Datelike, Local, NaiveDate, Utc};
use core_types::{Account, OptionChain, OptionContract, Quote, Symbol};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde_json::Value;

pub mod auth;
pub mod error;
pub mod oauth;
pub mod types;

// Re-export public types
pub use auth::{AuthToken, Credentials, TokenStatus};
pub use error::{Error, Result};
pub use types::*;

pub const PRODUCTION_BASE_URL: &str = "https://api.etrade.com";
pub const SANDBOX_BASE_URL: &str = "https://apisb.etrade.com";
pub const OAUTH_BASE_URL: &str = "https://api.etrade.com";
pub const AUTHORIZE_URL: &str = "https://us.etrade.com/e/t/etws/authorize";

/// The market data the screener needs from a brokerage.
///
/// `ApiClient` is the live implementation. Tests substitute fakes.
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Fetches a detailed quote. Fails with `Error::SymbolNotFound` when the
    /// brokerage returns no quote data for the symbol.
    async fn quote(&self, symbol: &Symbol) -> Result<Quote>;

    /// Fetches the calls and puts expiring on `expiration`. Fails with
    /// `Error::OptionChainNotFound` when no such chain exists.
    async fn option_chain(&self, symbol: &Symbol, expiration: NaiveDate) -> Result<OptionChain>;

    /// Lists the option expiration dates available for a symbol.
    async fn option_expiration_dates(&self, symbol: &Symbol) -> Result<Vec<NaiveDate>>;
}

impl ApiClient {
    /// Constructs a new ApiClient from BrokerageSettings.
    ///
    /// Reads the consumer credentials (fatal if incomplete) and any persisted
    /// access token. A token issued for a different consumer key is ignored.
    pub fn new(settings: &BrokerageSettings) -> Result<Self> {
        let credentials = auth::read_credentials(&app_config::expand_path(&settings.credentials))?;
        let authtoken_file = app_config::expand_path(&settings.authtoken);
        let token = auth::read_authtoken(&authtoken_file)
            .filter(|t| t.consumer_key == credentials.consumer_key);

        let default_base = if credentials.sandbox {
            SANDBOX_BASE_URL
        } else {
            PRODUCTION_BASE_URL
        };

        Ok(ApiClient {
            http_client: reqwest::Client::new(),
            base_url: trim_url(settings.rest_base_url.as_deref().unwrap_or(default_base)),
            oauth_base_url: trim_url(settings.oauth_base_url.as_deref().unwrap_or(OAUTH_BASE_URL)),
            authorize_url: settings
                .authorize_url
                .clone()
                .unwrap_or_else(|| AUTHORIZE_URL.to_string()),
            credentials,
            token,
            authtoken_file,
        })
    }

    pub fn token_status(&self, now: i64) -> TokenStatus {
        auth::token_status(self.token.as_ref(), now)
    }

    fn signer<'a>(&'a self, token: Option<(&'a str, &'a str)>) -> oauth::Signer<'a> {
        oauth::Signer {
            consumer_key: &self.credentials.consumer_key,
            consumer_secret: &self.credentials.consumer_secret,
            token,
        }
    }

    /// Sends a signed GET to one of the OAuth endpoints and returns the raw body.
    async fn oauth_get(
        &self,
        path: &str,
        token: Option<(&str, &str)>,
        extra: &[(&str, &str)],
    ) -> Result<String> {
        let url = format!("{}{}", self.oauth_base_url, path);
        let header = self.signer(token).authorization_header(
            "GET",
            &url,
            &[],
            extra,
            Utc::now().timestamp(),
            &oauth::nonce(),
        );

        let response = self
            .http_client
            .get(&url)
            .header(AUTHORIZATION, header)
            .send()
            .await
            .map_err(Error::RequestFailed)?;

        let status = response.status();
        let body = response.text().await.map_err(Error::RequestFailed)?;
        if !status.is_success() {
            return Err(Error::OAuth(format!("{} returned {}: {}", path, status, body.trim())));
        }
        Ok(body)
    }

    /// Step one of the authorization flow: obtain a request token.
    pub async fn request_authorization(&self) -> Result<PendingAuthorization> {
        let body = self
            .oauth_get("/oauth/request_token", None, &[("oauth_callback", "oob")])
            .await?;
        let (request_token, request_token_secret) = token_pair(&body)?;

        let authorize_url = format!(
            "{}?key={}&token={}",
            self.authorize_url,
            oauth::percent_encode(&self.credentials.consumer_key),
            oauth::percent_encode(&request_token)
        );

        Ok(PendingAuthorization {
            authorize_url,
            request_token,
            request_token_secret,
        })
    }

    /// Step two: exchange the verifier code for an access token and persist it.
    pub async fn complete_authorization(
        &mut self,
        pending: &PendingAuthorization,
        verifier: &str,
    ) -> Result<()> {
        let body = self
            .oauth_get(
                "/oauth/access_token",
                Some((&pending.request_token, &pending.request_token_secret)),
                &[("oauth_verifier", verifier.trim())],
            )
            .await?;
        let (oauth_token, oauth_token_secret) = token_pair(&body)?;

        let token = AuthToken {
            oauth_token,
            oauth_token_secret,
            consumer_key: self.credentials.consumer_key.clone(),
            consumer_secret: self.credentials.consumer_secret.clone(),
            sandbox: self.credentials.sandbox,
            last_auth_time: Utc::now().timestamp(),
        };
        auth::write_authtoken(&self.authtoken_file, &token)?;
        self.token = Some(token);

        tracing::info!(file = %self.authtoken_file.display(), "Access token issued and saved.");
        Ok(())
    }

    /// Renews the access token when it is past the renewal threshold, or
    /// unconditionally with `force`. Returns whether a renewal happened.
    pub async fn renew_token(&mut self, force: bool) -> Result<bool> {
        let now = Utc::now().timestamp();
        let Some(token) = self.token.clone() else {
            return Err(Error::NotAuthenticated);
        };
        if !force && self.token_status(now) == TokenStatus::Valid {
            tracing::debug!("Access token is recent, no renewal needed.");
            return Ok(false);
        }

        self.oauth_get(
            "/oauth/renew_access_token",
            Some((&token.oauth_token, &token.oauth_token_secret)),
            &[],
        )
        .await?;

        let renewed = AuthToken {
            last_auth_time: now,
            ..token
        };
        auth::write_authtoken(&self.authtoken_file, &renewed)?;
        self.token = Some(renewed);

        tracing::info!("Access token renewed.");
        Ok(true)
    }

    /// Sends a signed GET to a market or account endpoint and returns the
    /// JSON payload (`Value::Null` for an empty body).
    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let token = self.token.as_ref().ok_or(Error::NotAuthenticated)?;
        let url = format!("{}{}", self.base_url, path);
        let header = self
            .signer(Some((&token.oauth_token, &token.oauth_token_secret)))
            .authorization_header("GET", &url, query, &[], Utc::now().timestamp(), &oauth::nonce());

        tracing::debug!(%url, "GET");
        let response = self
            .http_client
            .get(&url)
            .query(query)
            .header(AUTHORIZATION, header)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(Error::RequestFailed)?;

        let status = response.status();
        let text = response.text().await.map_err(Error::RequestFailed)?;
        if text.trim().is_empty() {
            if status.is_success() {
                return Ok(Value::Null);
            }
            return Err(Error::ApiError {
                code: i64::from(status.as_u16()),
                msg: status.to_string(),
            });
        }

        let value: Value = serde_json::from_str(&text).map_err(Error::DeserializationFailed)?;

        // The brokerage returns an error object on failure, so we check for that first.
        if let Some(error) = value.get("Error") {
            let code = error.get("code").and_then(Value::as_i64).unwrap_or(-1);
            let msg = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Unknown error")
                .to_string();
            return Err(Error::ApiError { code, msg });
        }
        if !status.is_success() {
            return Err(Error::ApiError {
                code: i64::from(status.as_u16()),
                msg: text,
            });
        }

        Ok(value)
    }

    /// Fetches the brokerage accounts.
    ///
    /// This corresponds to the `GET /v1/accounts/list.json` endpoint.
    pub async fn list_accounts(&self) -> Result<Vec<Account>> {
        let value = self.get_json("/v1/accounts/list.json", &[]).await?;
        let envelope: AccountListEnvelope =
            serde_json::from_value(value).map_err(Error::DeserializationFailed)?;

        Ok(envelope
            .response
            .accounts
            .account
            .into_iter()
            .filter_map(RawAccount::into_account)
            .collect())
    }
}

#[async_trait]
impl MarketData for ApiClient {
    async fn quote(&self, symbol: &Symbol) -> Result<Quote> {
        let path = format!("/v1/market/quote/{}.json", oauth::percent_encode(symbol.as_str()));
        let query = [
            ("detailFlag", "ALL".to_string()),
            ("requireEarningsDate", "true".to_string()),
        ];
        let value = self.get_json(&path, &query).await?;
        if value.is_null() {
            return Err(Error::SymbolNotFound(symbol.to_string()));
        }

        let envelope: QuoteEnvelope =
            serde_json::from_value(value).map_err(Error::DeserializationFailed)?;
        let today = Local::now().date_naive();

        envelope
            .quote_response
            .quote_data
            .into_iter()
            .next()
            .map(|data| data.into_quote(today))
            .ok_or_else(|| Error::SymbolNotFound(symbol.to_string()))
    }

    async fn option_chain(&self, symbol: &Symbol, expiration: NaiveDate) -> Result<OptionChain> {
        let not_found = || Error::OptionChainNotFound {
            symbol: symbol.to_string(),
            expiration,
        };
        let query = [
            ("symbol", symbol.to_string()),
            ("expiryYear", expiration.year().to_string()),
            ("expiryMonth", expiration.month().to_string()),
            ("expiryDay", expiration.day().to_string()),
            ("chainType", "CALLPUT".to_string()),
        ];

        let value = match self.get_json("/v1/market/optionchains.json", &query).await {
            Ok(value) => value,
            Err(Error::ApiError { code, msg }) => {
                tracing::debug!(%symbol, code, %msg, "Option chain request rejected.");
                return Err(not_found());
            }
            Err(e) => return Err(e),
        };
        if value.get("OptionChainResponse").is_none() {
            return Err(not_found());
        }

        let envelope: OptionChainEnvelope =
            serde_json::from_value(value).map_err(Error::DeserializationFailed)?;
        let response = envelope.option_chain_response;
        let selected = response
            .selected_expiration
            .and_then(RawExpirationDate::to_date)
            .unwrap_or(expiration);

        let mut calls: Vec<OptionContract> = Vec::new();
        let mut puts: Vec<OptionContract> = Vec::new();
        for pair in response.option_pairs {
            if let Some(call) = pair.call {
                calls.push(call.into());
            }
            if let Some(put) = pair.put {
                puts.push(put.into());
            }
        }

        Ok(OptionChain::new(symbol.clone(), selected, calls, puts))
    }

    async fn option_expiration_dates(&self, symbol: &Symbol) -> Result<Vec<NaiveDate>> {
        let query = [("symbol", symbol.to_string())];
        let value = self
            .get_json("/v1/market/optionexpiredate.json", &query)
            .await?;
        if value.is_null() {
            return Ok(Vec::new());
        }

        let envelope: ExpireDateEnvelope =
            serde_json::from_value(value).map_err(Error::DeserializationFailed)?;
        let mut dates: Vec<NaiveDate> = envelope
            .response
            .expiration_dates
            .into_iter()
            .filter_map(RawExpirationDate::to_date)
            .collect();
        dates.sort();
        Ok(dates)
    }
}

fn trim_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

/// Extracts `oauth_token` and `oauth_token_secret` from a form-encoded body.
fn token_pair(body: &str) -> Result<(String, String)> {
    let form = oauth::parse_form(body);
    let find = |key: &str| {
        form.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .ok_or_else(|| Error::OAuth(format!("response is missing '{}'", key)))
    };
    Ok((find("oauth_token")?, find("oauth_token_secret")?))
}
