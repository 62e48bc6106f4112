use api_client::{ApiClient, AuthToken, Error, MarketData, TokenStatus};
use app_config::BrokerageSettings;
use chrono::{NaiveDate, Utc};
use core_types::Symbol;
use serde_json::json;
use std::fs;
use tempfile::TempDir;
use wiremock::matchers::{header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Fixture {
    _dir: TempDir,
    authtoken: std::path::PathBuf,
    client: ApiClient,
}

/// Builds a client pointed at the mock server, with a token issued
/// `token_age` seconds ago (or no token at all).
fn fixture(server: &MockServer, token_age: Option<i64>) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let credentials = dir.path().join("credentials");
    let authtoken = dir.path().join("authtoken.json");
    fs::write(&credentials, "CONSUMER_KEY=ck\nCONSUMER_SECRET=cs\nSANDBOX=1\n").unwrap();

    if let Some(age) = token_age {
        let token = AuthToken {
            oauth_token: "tok".into(),
            oauth_token_secret: "ts".into(),
            consumer_key: "ck".into(),
            consumer_secret: "cs".into(),
            sandbox: true,
            last_auth_time: Utc::now().timestamp() - age,
        };
        fs::write(&authtoken, serde_json::to_string(&token).unwrap()).unwrap();
    }

    let settings = BrokerageSettings {
        credentials: credentials.to_string_lossy().into_owned(),
        authtoken: authtoken.to_string_lossy().into_owned(),
        rest_base_url: Some(server.uri()),
        oauth_base_url: Some(server.uri()),
        authorize_url: Some(format!("{}/authorize", server.uri())),
    };
    let client = ApiClient::new(&settings).unwrap();

    Fixture {
        _dir: dir,
        authtoken,
        client,
    }
}

#[tokio::test]
async fn fetches_a_detailed_quote() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/market/quote/XYZ.json"))
        .and(query_param("detailFlag", "ALL"))
        .and(query_param("requireEarningsDate", "true"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "QuoteResponse": {
                "QuoteData": [{
                    "Product": { "symbol": "XYZ", "securityType": "EQ" },
                    "All": {
                        "companyName": "XYZ CORP",
                        "lastTrade": 42.5,
                        "averageVolume": 1250000,
                        "marketCap": 2500000000.0,
                        "nextEarningDate": "12/31/2099"
                    }
                }]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let fx = fixture(&server, Some(60));
    let quote = fx.client.quote(&Symbol::from("XYZ")).await.unwrap();

    assert_eq!(quote.company_name, "XYZ CORP");
    assert_eq!(quote.price, 42.5);
    assert_eq!(quote.average_volume, 1_250_000);
    assert_eq!(quote.next_earnings_date, NaiveDate::from_ymd_opt(2099, 12, 31));
}

#[tokio::test]
async fn missing_quote_data_is_symbol_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/market/quote/NOPE.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "QuoteResponse": {
                "Messages": { "Message": [{ "description": "NOPE is not a valid symbol", "code": 1002 }] }
            }
        })))
        .mount(&server)
        .await;

    let fx = fixture(&server, Some(60));
    let err = fx.client.quote(&Symbol::from("NOPE")).await.unwrap_err();
    assert!(matches!(err, Error::SymbolNotFound(s) if s == "NOPE"));
}

#[tokio::test]
async fn error_payload_becomes_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/market/quote/XYZ.json"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "Error": { "code": 10033, "message": "token rejected" }
        })))
        .mount(&server)
        .await;

    let fx = fixture(&server, Some(60));
    let err = fx.client.quote(&Symbol::from("XYZ")).await.unwrap_err();
    assert!(matches!(err, Error::ApiError { code: 10033, .. }));
}

#[tokio::test]
async fn requests_without_a_token_fail_fast() {
    let server = MockServer::start().await;
    let fx = fixture(&server, None);

    assert_eq!(fx.client.token_status(Utc::now().timestamp()), TokenStatus::Missing);
    let err = fx.client.quote(&Symbol::from("XYZ")).await.unwrap_err();
    assert!(matches!(err, Error::NotAuthenticated));
}

#[tokio::test]
async fn fetches_an_option_chain() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/market/optionchains.json"))
        .and(query_param("symbol", "XYZ"))
        .and(query_param("expiryYear", "2024"))
        .and(query_param("expiryMonth", "3"))
        .and(query_param("expiryDay", "15"))
        .and(query_param("chainType", "CALLPUT"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "OptionChainResponse": {
                "OptionPair": [
                    {
                        "Call": { "displaySymbol": "XYZ Mar 15 '24 $20 Call", "strikePrice": 20.0, "openInterest": 60,
                                  "OptionGreeks": { "delta": 0.45, "theta": -0.02 } },
                        "Put": { "displaySymbol": "XYZ Mar 15 '24 $20 Put", "strikePrice": 20.0, "openInterest": 30 }
                    },
                    {
                        "Call": { "displaySymbol": "XYZ Mar 15 '24 $10 Call", "strikePrice": 10.0, "openInterest": 10 },
                        "Put": { "displaySymbol": "XYZ Mar 15 '24 $10 Put", "strikePrice": 10.0, "openInterest": 5 }
                    }
                ],
                "SelectedED": { "year": 2024, "month": 3, "day": 15 }
            }
        })))
        .mount(&server)
        .await;

    let fx = fixture(&server, Some(60));
    let expiration = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
    let chain = fx
        .client
        .option_chain(&Symbol::from("XYZ"), expiration)
        .await
        .unwrap();

    assert_eq!(chain.expiration, expiration);
    assert_eq!(chain.strike_prices(), vec![10.0, 20.0]);
    assert_eq!(chain.total_call_open_interest(), 70);
    assert_eq!(chain.call(20.0).and_then(|c| c.delta), Some(0.45));
}

#[tokio::test]
async fn rejected_chain_request_is_chain_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/market/optionchains.json"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "Error": { "code": 10032, "message": "no options for expiry" }
        })))
        .mount(&server)
        .await;

    let fx = fixture(&server, Some(60));
    let expiration = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
    let err = fx
        .client
        .option_chain(&Symbol::from("XYZ"), expiration)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::OptionChainNotFound { expiration: e, .. } if e == expiration));
}

#[tokio::test]
async fn lists_expiration_dates_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/market/optionexpiredate.json"))
        .and(query_param("symbol", "XYZ"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "OptionExpireDateResponse": {
                "ExpirationDate": [
                    { "year": 2024, "month": 4, "day": 19, "expiryType": "MONTHLY" },
                    { "year": 2024, "month": 3, "day": 15, "expiryType": "MONTHLY" },
                    { "year": 2024, "month": 2, "day": 31, "expiryType": "WEEKLY" }
                ]
            }
        })))
        .mount(&server)
        .await;

    let fx = fixture(&server, Some(60));
    let dates = fx
        .client
        .option_expiration_dates(&Symbol::from("XYZ"))
        .await
        .unwrap();

    assert_eq!(
        dates,
        vec![
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            NaiveDate::from_ymd_opt(2024, 4, 19).unwrap(),
        ]
    );
}

#[tokio::test]
async fn lists_accounts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/accounts/list.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "AccountListResponse": {
                "Accounts": {
                    "Account": [
                        { "accountId": "111", "accountIdKey": "k1", "accountName": "", "accountType": "INDIVIDUAL", "accountDesc": "Brokerage" },
                        { "accountId": "222", "accountIdKey": "k2", "accountName": "Roth", "accountType": "ROTHIRA", "accountDesc": "IRA" }
                    ]
                }
            }
        })))
        .mount(&server)
        .await;

    let fx = fixture(&server, Some(60));
    let accounts = fx.client.list_accounts().await.unwrap();

    assert_eq!(accounts.len(), 2);
    assert_eq!(accounts[0].display_name(), "Brokerage (111)");
    assert_eq!(accounts[1].key, "k2");
}

#[tokio::test]
async fn renews_an_aging_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/oauth/renew_access_token"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Access Token has been renewed"))
        .expect(1)
        .mount(&server)
        .await;

    let mut fx = fixture(&server, Some(1_000));
    let now = Utc::now().timestamp();
    assert_eq!(fx.client.token_status(now), TokenStatus::NeedsRenewal);

    assert!(fx.client.renew_token(false).await.unwrap());
    assert_eq!(fx.client.token_status(Utc::now().timestamp()), TokenStatus::Valid);

    let saved: AuthToken =
        serde_json::from_str(&fs::read_to_string(&fx.authtoken).unwrap()).unwrap();
    assert!(saved.last_auth_time >= now);
    assert_eq!(saved.oauth_token, "tok");
}

#[tokio::test]
async fn fresh_token_is_not_renewed_unless_forced() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/oauth/renew_access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_string("renewed"))
        .expect(1)
        .mount(&server)
        .await;

    let mut fx = fixture(&server, Some(60));
    assert!(!fx.client.renew_token(false).await.unwrap());
    assert!(fx.client.renew_token(true).await.unwrap());
}

#[tokio::test]
async fn authorization_flow_persists_the_access_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/oauth/request_token"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "oauth_token=req%2Btok&oauth_token_secret=req-secret&oauth_callback_confirmed=true",
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/oauth/access_token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("oauth_token=acc&oauth_token_secret=acc-secret"),
        )
        .mount(&server)
        .await;

    let mut fx = fixture(&server, None);
    let pending = fx.client.request_authorization().await.unwrap();
    assert_eq!(pending.request_token, "req+tok");
    assert!(pending.authorize_url.ends_with("/authorize?key=ck&token=req%2Btok"));

    fx.client.complete_authorization(&pending, " 12345 \n").await.unwrap();
    assert_eq!(fx.client.token_status(Utc::now().timestamp()), TokenStatus::Valid);

    let saved: AuthToken =
        serde_json::from_str(&fs::read_to_string(&fx.authtoken).unwrap()).unwrap();
    assert_eq!(saved.oauth_token, "acc");
    assert_eq!(saved.oauth_token_secret, "acc-secret");
    assert_eq!(saved.consumer_key, "ck");
}

#[tokio::test]
async fn token_for_another_consumer_is_ignored() {
    let server = MockServer::start().await;
    let fx = fixture(&server, Some(60));

    let foreign = AuthToken {
        oauth_token: "tok".into(),
        oauth_token_secret: "ts".into(),
        consumer_key: "someone-else".into(),
        consumer_secret: "cs".into(),
        sandbox: true,
        last_auth_time: Utc::now().timestamp(),
    };
    fs::write(&fx.authtoken, serde_json::to_string(&foreign).unwrap()).unwrap();

    let settings = BrokerageSettings {
        credentials: fx._dir.path().join("credentials").to_string_lossy().into_owned(),
        authtoken: fx.authtoken.to_string_lossy().into_owned(),
        rest_base_url: Some(server.uri()),
        oauth_base_url: None,
        authorize_url: None,
    };
    let client = ApiClient::new(&settings).unwrap();
    assert_eq!(client.token_status(Utc::now().timestamp()), TokenStatus::Missing);
}
