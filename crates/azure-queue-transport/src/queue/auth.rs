// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! SharedKey request signing for the Storage REST API.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Method, Url};
use sha2::Sha256;
use std::collections::BTreeMap;

use crate::error::QueueError;

type HmacSha256 = Hmac<Sha256>;

/// RFC 1123 timestamp for `x-ms-date`.
#[must_use]
pub fn rfc1123_now() -> String {
    chrono::Utc::now()
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

/// Builds the `Authorization` header for a request whose headers are final.
pub fn authorization_header(
    account: &str,
    key: &[u8],
    method: &Method,
    url: &Url,
    headers: &HeaderMap,
) -> Result<HeaderValue, QueueError> {
    let signature = sign(key, &string_to_sign(account, method, url, headers))?;
    HeaderValue::from_str(&format!("SharedKey {account}:{signature}"))
        .map_err(|e| QueueError::InvalidRequest(e.to_string()))
}

/// Base64 HMAC-SHA256 of `payload` under `key`.
pub fn sign(key: &[u8], payload: &str) -> Result<String, QueueError> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|e| QueueError::InvalidRequest(e.to_string()))?;
    mac.update(payload.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

#[must_use]
pub fn string_to_sign(account: &str, method: &Method, url: &Url, headers: &HeaderMap) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
    };
    // A zero length is signed as an empty string since API version 2015-02-21.
    let content_length = match header("content-length") {
        "0" => "",
        length => length,
    };

    format!(
        "{}\n{}\n{}\n{}\n{}\n{}\n{}\n{}\n{}\n{}\n{}\n{}\n{}{}",
        method.as_str(),
        header("content-encoding"),
        header("content-language"),
        content_length,
        header("content-md5"),
        header("content-type"),
        header("date"),
        header("if-modified-since"),
        header("if-match"),
        header("if-none-match"),
        header("if-unmodified-since"),
        header("range"),
        canonicalized_headers(headers),
        canonicalized_resource(account, url),
    )
}

fn canonicalized_headers(headers: &HeaderMap) -> String {
    let mut ms_headers: BTreeMap<&str, &str> = BTreeMap::new();
    for (name, value) in headers {
        if name.as_str().starts_with("x-ms-") {
            if let Ok(value) = value.to_str() {
                ms_headers.insert(name.as_str(), value.trim());
            }
        }
    }
    ms_headers
        .into_iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect()
}

fn canonicalized_resource(account: &str, url: &Url) -> String {
    let mut resource = format!("/{account}{}", url.path());

    let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in url.query_pairs() {
        params
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value.into_owned());
    }
    for (name, mut values) in params {
        values.sort();
        resource.push_str(&format!("\n{name}:{}", values.join(",")));
    }
    resource
}
