// In crates/api-client/src/oauth.rs

use base64::{Engine as _, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use rand::{Rng, distributions::Alphanumeric};
use sha1::Sha1;

// Create a type alias for the HMAC-SHA1 implementation.
type HmacSha1 = Hmac<Sha1>;

pub const SIGNATURE_METHOD: &str = "HMAC-SHA1";
pub const OAUTH_VERSION: &str = "1.0";

/// RFC 3986 percent-encoding: everything except `A-Z a-z 0-9 - . _ ~`.
pub fn percent_encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// A random alphanumeric nonce.
pub fn nonce() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

/// Builds the OAuth 1.0a signature base string.
///
/// `params` must contain every query parameter and every `oauth_*`
/// parameter except `oauth_signature`.
pub fn signature_base_string(method: &str, url: &str, params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect();
    encoded.sort();

    let normalized = encoded
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.to_uppercase(),
        percent_encode(url),
        percent_encode(&normalized)
    )
}

/// Signs a base string with HMAC-SHA1 and returns the base64 digest.
pub fn sign(base_string: &str, consumer_secret: &str, token_secret: &str) -> String {
    let key = format!(
        "{}&{}",
        percent_encode(consumer_secret),
        percent_encode(token_secret)
    );
    let mut mac =
        HmacSha1::new_from_slice(key.as_bytes()).expect("HMAC can take key of any size");
    mac.update(base_string.as_bytes());
    STANDARD.encode(mac.finalize().into_bytes())
}

/// The consumer half of an OAuth signature, plus an optional token.
#[derive(Debug, Clone)]
pub struct Signer<'a> {
    pub consumer_key: &'a str,
    pub consumer_secret: &'a str,
    pub token: Option<(&'a str, &'a str)>,
}

impl Signer<'_> {
    /// Produces the value of the `Authorization` header for one request.
    ///
    /// * `query`: the query parameters that will be sent with the request.
    /// * `extra`: additional `oauth_*` parameters (callback, verifier).
    pub fn authorization_header(
        &self,
        method: &str,
        url: &str,
        query: &[(&str, String)],
        extra: &[(&str, &str)],
        timestamp: i64,
        nonce: &str,
    ) -> String {
        let mut oauth: Vec<(String, String)> = vec![
            ("oauth_consumer_key".into(), self.consumer_key.to_string()),
            ("oauth_nonce".into(), nonce.to_string()),
            ("oauth_signature_method".into(), SIGNATURE_METHOD.into()),
            ("oauth_timestamp".into(), timestamp.to_string()),
            ("oauth_version".into(), OAUTH_VERSION.into()),
        ];
        if let Some((token, _)) = self.token {
            oauth.push(("oauth_token".into(), token.to_string()));
        }
        for (k, v) in extra {
            oauth.push((k.to_string(), v.to_string()));
        }

        let mut all = oauth.clone();
        all.extend(query.iter().map(|(k, v)| (k.to_string(), v.clone())));

        let base = signature_base_string(method, url, &all);
        let token_secret = self.token.map(|(_, secret)| secret).unwrap_or("");
        let signature = sign(&base, self.consumer_secret, token_secret);
        oauth.push(("oauth_signature".into(), signature));

        let fields = oauth
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", k, percent_encode(v)))
            .collect::<Vec<_>>()
            .join(",");
        format!("OAuth realm=\"\",{}", fields)
    }
}

/// Parses an `application/x-www-form-urlencoded` OAuth response body.
pub fn parse_form(body: &str) -> Vec<(String, String)> {
    body.trim()
        .split('&')
        .filter_map(|pair| {
            let (k, v) = pair.split_once('=')?;
            let k = urlencoding::decode(k).ok()?.into_owned();
            let v = urlencoding::decode(v).ok()?.into_owned();
            Some((k, v))
        })
        .collect()
}
