// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Storage connection strings and the endpoint/credential pair they describe.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::collections::HashMap;
use std::fmt;

use crate::constants::{
    DEFAULT_ENDPOINT_SUFFIX, DEV_STORE_ACCOUNT, DEV_STORE_KEY, DEV_STORE_QUEUE_ENDPOINT,
};
use crate::error::ConfigError;

#[derive(Clone, PartialEq, Eq)]
pub enum StorageCredential {
    /// Account name and the decoded account key.
    SharedKey { account: String, key: Vec<u8> },
    /// Shared access signature query string, without the leading `?`.
    Sas(String),
}

impl fmt::Debug for StorageCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageCredential::SharedKey { account, .. } => {
                write!(f, "SharedKey {{ account: {account:?} }}")
            }
            StorageCredential::Sas(_) => write!(f, "Sas(..)"),
        }
    }
}

/// Queue endpoint (no trailing slash) plus how to authenticate against it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConnection {
    pub queue_endpoint: String,
    pub credential: StorageCredential,
}

impl StorageConnection {
    /// Account-name/key pair against the public cloud endpoint.
    pub fn from_shared_key(account: &str, access_key: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            queue_endpoint: format!("https://{account}.queue.{DEFAULT_ENDPOINT_SUFFIX}"),
            credential: StorageCredential::SharedKey {
                account: account.to_string(),
                key: decode_key(access_key)?,
            },
        })
    }

    /// Parses `Key=Value;...` connection strings. Keys are case-insensitive.
    pub fn from_connection_string(connection_string: &str) -> Result<Self, ConfigError> {
        let settings = parse_settings(connection_string)?;
        let get = |key: &str| settings.get(key).map(String::as_str);

        if get("usedevelopmentstorage").is_some_and(|v| v.eq_ignore_ascii_case("true")) {
            return Ok(Self {
                queue_endpoint: DEV_STORE_QUEUE_ENDPOINT.to_string(),
                credential: StorageCredential::SharedKey {
                    account: DEV_STORE_ACCOUNT.to_string(),
                    key: decode_key(DEV_STORE_KEY)?,
                },
            });
        }

        let account = get("accountname");
        let queue_endpoint = match (get("queueendpoint"), account) {
            (Some(endpoint), _) => endpoint.trim_end_matches('/').to_string(),
            (None, Some(account)) => {
                let protocol = get("defaultendpointsprotocol").unwrap_or("https");
                let suffix = get("endpointsuffix").unwrap_or(DEFAULT_ENDPOINT_SUFFIX);
                format!("{protocol}://{account}.queue.{suffix}")
            }
            (None, None) => {
                return Err(ConfigError::InvalidConnectionString(
                    "missing AccountName or QueueEndpoint".to_string(),
                ))
            }
        };

        let credential = match (account, get("accountkey"), get("sharedaccesssignature")) {
            (Some(account), Some(key), _) => StorageCredential::SharedKey {
                account: account.to_string(),
                key: decode_key(key)?,
            },
            (_, _, Some(sas)) => StorageCredential::Sas(sas.trim_start_matches('?').to_string()),
            _ => {
                return Err(ConfigError::InvalidConnectionString(
                    "missing AccountKey or SharedAccessSignature".to_string(),
                ))
            }
        };

        Ok(Self {
            queue_endpoint,
            credential,
        })
    }
}

fn parse_settings(connection_string: &str) -> Result<HashMap<String, String>, ConfigError> {
    let mut settings = HashMap::new();
    for segment in connection_string.split(';') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        let Some((key, value)) = segment.split_once('=') else {
            return Err(ConfigError::InvalidConnectionString(format!(
                "malformed segment '{segment}'"
            )));
        };
        settings.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
    }
    Ok(settings)
}

fn decode_key(access_key: &str) -> Result<Vec<u8>, ConfigError> {
    STANDARD
        .decode(access_key.trim())
        .map_err(|e| ConfigError::MalformedAccessKey(e.to_string()))
}
