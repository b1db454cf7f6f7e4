//! SMS provider webhook signatures.
//!
//! The provider signs each callback with HMAC-SHA1 keyed by the account
//! auth token, over the full public URL followed by every POST parameter
//! as `key` + `value`, sorted by key. The base64 digest arrives in
//! `X-Twilio-Signature`.

use base64::{Engine, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use thiserror::Error;

pub const SIGNATURE_HEADER: &str = "x-twilio-signature";

pub const EMPTY_TWIML: &str = r#"<?xml version="1.0" encoding="UTF-8"?><Response></Response>"#;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Webhook auth token not configured")]
    NotConfigured,
    #[error("Missing signature header")]
    Missing,
    #[error("Malformed signature")]
    Malformed,
    #[error("Signature mismatch")]
    Mismatch,
}

type HmacSha1 = Hmac<Sha1>;

fn mac_for(auth_token: &str, url: &str, params: &[(String, String)]) -> Result<HmacSha1, SignatureError> {
    let mut mac =
        HmacSha1::new_from_slice(auth_token.as_bytes()).map_err(|_| SignatureError::NotConfigured)?;
    mac.update(url.as_bytes());

    let mut sorted: Vec<&(String, String)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    for (key, value) in sorted {
        mac.update(key.as_bytes());
        mac.update(value.as_bytes());
    }
    Ok(mac)
}

/// Signature the provider would send for this request.
pub fn sign(auth_token: &str, url: &str, params: &[(String, String)]) -> Result<String, SignatureError> {
    let mac = mac_for(auth_token, url, params)?;
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

pub fn verify(
    auth_token: &str,
    url: &str,
    params: &[(String, String)],
    header: Option<&str>,
) -> Result<(), SignatureError> {
    if auth_token.is_empty() {
        return Err(SignatureError::NotConfigured);
    }
    let header = header.map(str::trim).filter(|h| !h.is_empty()).ok_or(SignatureError::Missing)?;
    let provided = STANDARD.decode(header).map_err(|_| SignatureError::Malformed)?;

    mac_for(auth_token, url, params)?
        .verify_slice(&provided)
        .map_err(|_| SignatureError::Mismatch)
}

/// Public URL the provider called, rebuilt from the configured origin.
pub fn webhook_url(public_base_url: &str, path_and_query: &str) -> String {
    format!("{}{}", public_base_url.trim_end_matches('/'), path_and_query)
}

/// First non-empty value for `key` in a decoded webhook form.
pub fn form_value<'a>(form: &'a [(String, String)], key: &str) -> Option<&'a str> {
    form.iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
        .filter(|v| !v.is_empty())
}
