//! Verification of the `sanity-webhook-signature` header.
//!
//! Header format: `t=<unix millis>,v1=<signature>` where the signature is the
//! unpadded base64url HMAC-SHA256 of `"<t>.<raw body>"` keyed by the webhook secret.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

pub const SIGNATURE_HEADER: &str = "sanity-webhook-signature";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing signature header")]
    Missing,
    #[error("malformed signature header")]
    Malformed,
    #[error("signature timestamp outside tolerance")]
    Expired,
    #[error("signature mismatch")]
    Mismatch,
    #[error("invalid webhook secret")]
    InvalidSecret,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ParsedHeader<'a> {
    timestamp: i64,
    signature: &'a str,
}

fn parse_header(header: &str) -> Result<ParsedHeader<'_>, SignatureError> {
    let mut timestamp = None;
    let mut signature = None;

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => {
                timestamp = Some(value.parse::<i64>().map_err(|_| SignatureError::Malformed)?)
            }
            Some(("v1", value)) if !value.is_empty() => signature = Some(value),
            _ => {}
        }
    }

    match (timestamp, signature) {
        (Some(timestamp), Some(signature)) => Ok(ParsedHeader {
            timestamp,
            signature,
        }),
        _ => Err(SignatureError::Malformed),
    }
}

fn mac_for(secret: &str, timestamp: i64, body: &[u8]) -> Result<HmacSha256, SignatureError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::InvalidSecret)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    Ok(mac)
}

/// Build a header value for `body`. Used by tests and local tooling.
pub fn sign(secret: &str, timestamp: i64, body: &[u8]) -> Result<String, SignatureError> {
    let digest = mac_for(secret, timestamp, body)?.finalize().into_bytes();
    Ok(format!("t={},v1={}", timestamp, URL_SAFE_NO_PAD.encode(digest)))
}

/// Check `header` against `body`. `tolerance_ms` bounds the clock skew accepted
/// for the signed timestamp; `None` skips the freshness check.
pub fn verify(
    secret: &str,
    header: Option<&str>,
    body: &[u8],
    tolerance_ms: Option<i64>,
) -> Result<(), SignatureError> {
    let parsed = parse_header(header.ok_or(SignatureError::Missing)?)?;

    if let Some(tolerance) = tolerance_ms {
        let skew = (Utc::now().timestamp_millis() - parsed.timestamp).abs();
        if skew > tolerance {
            return Err(SignatureError::Expired);
        }
    }

    let expected = URL_SAFE_NO_PAD
        .decode(parsed.signature)
        .map_err(|_| SignatureError::Malformed)?;

    mac_for(secret, parsed.timestamp, body)?
        .verify_slice(&expected)
        .map_err(|_| SignatureError::Mismatch)
}
