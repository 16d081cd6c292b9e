//! AWS Signature Version 4 request signing.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use super::config::AgentCoreCredentials;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Request parts covered by the signature.
pub(crate) struct SignableRequest<'a> {
    pub method: &'a str,
    /// Path exactly as sent on the wire (already percent-encoded).
    pub path: &'a str,
    pub query: &'a [(&'a str, &'a str)],
    /// Headers to sign; names are lowercased during canonicalization.
    pub headers: &'a [(&'a str, &'a str)],
    pub payload: &'a [u8],
}

pub(crate) struct Signer<'a> {
    pub credentials: &'a AgentCoreCredentials,
    pub region: &'a str,
    pub service: &'a str,
}

impl Signer<'_> {
    /// Value for the `Authorization` header.
    pub fn sign(&self, req: &SignableRequest<'_>, at: DateTime<Utc>) -> String {
        let (canonical, signed_headers) = canonical_request(req);
        let scope = self.scope(at);
        let to_sign = string_to_sign(at, &scope, &canonical);
        let key = signing_key(
            &self.credentials.secret_access_key,
            &at.format("%Y%m%d").to_string(),
            self.region,
            self.service,
        );
        let signature = hex::encode(hmac(&key, to_sign.as_bytes()));
        format!(
            "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
            self.credentials.access_key_id
        )
    }

    fn scope(&self, at: DateTime<Utc>) -> String {
        format!(
            "{}/{}/{}/aws4_request",
            at.format("%Y%m%d"),
            self.region,
            self.service
        )
    }
}

/// `X-Amz-Date` header value.
pub(crate) fn amz_date(at: DateTime<Utc>) -> String {
    at.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Returns the canonical request and the `SignedHeaders` list.
pub(crate) fn canonical_request(req: &SignableRequest<'_>) -> (String, String) {
    let mut headers: Vec<(String, String)> = req
        .headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), collapse_whitespace(value)))
        .collect();
    headers.sort();
    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect();
    let signed_headers = headers
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(";");

    let canonical = [
        req.method.to_string(),
        canonical_uri(req.path),
        canonical_query(req.query),
        canonical_headers,
        signed_headers.clone(),
        hex::encode(Sha256::digest(req.payload)),
    ]
    .join("\n");
    (canonical, signed_headers)
}

pub(crate) fn string_to_sign(at: DateTime<Utc>, scope: &str, canonical_request: &str) -> String {
    format!(
        "{ALGORITHM}\n{}\n{scope}\n{}",
        amz_date(at),
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    )
}

pub(crate) fn signing_key(secret: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac(format!("AWS4{secret}").as_bytes(), date.as_bytes());
    let k_region = hmac(&k_date, region.as_bytes());
    let k_service = hmac(&k_region, service.as_bytes());
    hmac(&k_service, b"aws4_request")
}

fn hmac(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

// Non-S3 services sign the wire path encoded once more.
fn canonical_uri(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn canonical_query(query: &[(&str, &str)]) -> String {
    let mut pairs: Vec<(String, String)> = query
        .iter()
        .map(|(k, v)| {
            (
                urlencoding::encode(k).into_owned(),
                urlencoding::encode(v).into_owned(),
            )
        })
        .collect();
    pairs.sort();
    pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}
