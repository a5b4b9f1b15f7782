// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Transport configuration, defaults and credential resolution.

use serde::Deserialize;
use std::env;
use std::fmt::{self, Debug};
use std::sync::Arc;
use std::time::Duration;

use crate::constants::{
    DEFAULT_LEVEL, DEFAULT_MAX_RETRY_DELAY_MS, DEFAULT_MAX_TRIES, DEFAULT_QUEUE_NAME,
    DEFAULT_RETRY_DELAY_MS, DEFAULT_TRY_TIMEOUT_MS, ENVIRONMENT_ENV_VAR,
    STORAGE_ACCESS_KEY_ENV_VAR, STORAGE_ACCOUNT_ENV_VAR,
};
use crate::error::ConfigError;
use crate::queue::QueueService;

/// Retry settings handed to the queue client. The transport itself never retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryPolicy {
    /// Total attempts per operation, including the first one.
    pub max_tries: u32,
    /// Base delay between attempts, in milliseconds.
    #[serde(rename = "retryDelay")]
    pub retry_delay_ms: u64,
    /// Upper bound for a single delay, in milliseconds.
    #[serde(rename = "maxRetryDelay")]
    pub max_retry_delay_ms: u64,
    /// Timeout of each individual attempt, in milliseconds.
    #[serde(rename = "tryTimeout")]
    pub try_timeout_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_tries: DEFAULT_MAX_TRIES,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            max_retry_delay_ms: DEFAULT_MAX_RETRY_DELAY_MS,
            try_timeout_ms: DEFAULT_TRY_TIMEOUT_MS,
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn max_tries(&self) -> u32 {
        self.max_tries.max(1)
    }

    /// Exponential backoff before the `retry`-th retry (1-based), capped at the max delay.
    #[must_use]
    pub fn delay_before_retry(&self, retry: u32) -> Duration {
        let factor = 2_u64.saturating_pow(retry.saturating_sub(1));
        let delay = self
            .retry_delay_ms
            .saturating_mul(factor)
            .min(self.max_retry_delay_ms);
        Duration::from_millis(delay)
    }

    #[must_use]
    pub fn try_timeout(&self) -> Duration {
        Duration::from_millis(self.try_timeout_ms)
    }
}

/// Where the queue client comes from. Resolved once during construction.
#[derive(Clone)]
pub enum Credentials {
    ServiceClient(Arc<dyn QueueService>),
    ConnectionString(String),
    SharedKey { account: String, access_key: String },
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::ServiceClient(_) => write!(f, "Credentials::ServiceClient"),
            Credentials::ConnectionString(_) => write!(f, "Credentials::ConnectionString(..)"),
            Credentials::SharedKey { account, .. } => {
                write!(f, "Credentials::SharedKey {{ account: {account:?} }}")
            }
        }
    }
}

/// Options accepted by [`crate::QueueLogTransport::new`].
///
/// Deserializes from the camelCase option names (`queueName`, `encodeBase64`,
/// `storageAccount`, ...). A pre-built client can only be set programmatically.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransportConfig {
    pub queue_name: String,
    /// Minimum severity. Filtering happens in the host framework.
    pub level: String,
    pub silent: bool,
    /// Defaults to the current process id.
    pub pid: Option<u32>,
    /// Defaults to `APP_ENV`. Omitted from records when unresolved.
    pub env: Option<String>,
    /// Defaults to the local hostname.
    pub host: Option<String>,
    pub encode_base64: bool,
    #[serde(flatten)]
    pub retry: RetryPolicy,
    pub storage_account: Option<String>,
    pub storage_access_key: Option<String>,
    pub connection_string: Option<String>,
    pub https_proxy: Option<String>,
    #[serde(skip)]
    pub service_client: Option<Arc<dyn QueueService>>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            queue_name: DEFAULT_QUEUE_NAME.to_string(),
            level: DEFAULT_LEVEL.to_string(),
            silent: false,
            pid: None,
            env: None,
            host: None,
            encode_base64: false,
            retry: RetryPolicy::default(),
            storage_account: None,
            storage_access_key: None,
            connection_string: None,
            https_proxy: None,
            service_client: None,
        }
    }
}

impl Debug for TransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportConfig")
            .field("queue_name", &self.queue_name)
            .field("level", &self.level)
            .field("silent", &self.silent)
            .field("pid", &self.pid)
            .field("env", &self.env)
            .field("host", &self.host)
            .field("encode_base64", &self.encode_base64)
            .field("retry", &self.retry)
            .field("storage_account", &self.storage_account)
            .field("has_access_key", &self.storage_access_key.is_some())
            .field("has_connection_string", &self.connection_string.is_some())
            .field("https_proxy", &self.https_proxy)
            .field("has_service_client", &self.service_client.is_some())
            .finish()
    }
}

impl TransportConfig {
    /// Pick the credential source, falling back to the process environment for
    /// the account name and key.
    pub fn resolve_credentials(&self) -> Result<Credentials, ConfigError> {
        self.resolve_credentials_with(|name| env::var(name).ok())
    }

    pub(crate) fn resolve_credentials_with<F>(&self, lookup: F) -> Result<Credentials, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(client) = &self.service_client {
            return Ok(Credentials::ServiceClient(Arc::clone(client)));
        }

        if let Some(connection_string) = non_empty(self.connection_string.clone()) {
            return Ok(Credentials::ConnectionString(connection_string));
        }

        let account = non_empty(self.storage_account.clone())
            .or_else(|| non_empty(lookup(STORAGE_ACCOUNT_ENV_VAR)))
            .ok_or(ConfigError::InvalidStorageAccount)?;
        let access_key = non_empty(self.storage_access_key.clone())
            .or_else(|| non_empty(lookup(STORAGE_ACCESS_KEY_ENV_VAR)))
            .ok_or(ConfigError::InvalidStorageAccessKey)?;

        Ok(Credentials::SharedKey {
            account,
            access_key,
        })
    }

    pub fn resolve_env(&self) -> Option<String> {
        self.resolve_env_with(|name| env::var(name).ok())
    }

    pub(crate) fn resolve_env_with<F>(&self, lookup: F) -> Option<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.env
            .clone()
            .or_else(|| non_empty(lookup(ENVIRONMENT_ENV_VAR)))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Checks Azure queue naming rules: 3-63 characters of lowercase letters,
/// digits and single hyphens, starting and ending with a letter or digit.
pub fn validate_queue_name(name: &str) -> Result<(), ConfigError> {
    let invalid = || ConfigError::InvalidQueueName(name.to_string());

    if !(3..=63).contains(&name.len()) {
        return Err(invalid());
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(invalid());
    }
    if name.starts_with('-') || name.ends_with('-') || name.contains("--") {
        return Err(invalid());
    }
    Ok(())
}
