// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Constants shared across the transport.

/// Name the transport reports to its host.
pub const TRANSPORT_NAME: &str = "azureQueueTransport";

pub const DEFAULT_QUEUE_NAME: &str = "logs";
pub const DEFAULT_LEVEL: &str = "info";

/// Fallback source for the storage account name.
pub const STORAGE_ACCOUNT_ENV_VAR: &str = "AZURE_STORAGE_ACCOUNT";
/// Fallback source for the storage account key.
pub const STORAGE_ACCESS_KEY_ENV_VAR: &str = "AZURE_STORAGE_ACCESS_KEY";
/// Default source for the environment name stamped on each record.
pub const ENVIRONMENT_ENV_VAR: &str = "APP_ENV";

pub const DEFAULT_MAX_TRIES: u32 = 4;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 4_000;
pub const DEFAULT_MAX_RETRY_DELAY_MS: u64 = 120_000;
pub const DEFAULT_TRY_TIMEOUT_MS: u64 = 30_000;

/// REST API version sent as `x-ms-version`.
pub const STORAGE_API_VERSION: &str = "2019-12-12";
pub const DEFAULT_ENDPOINT_SUFFIX: &str = "core.windows.net";

/// Well-known Azurite development account.
pub const DEV_STORE_ACCOUNT: &str = "devstoreaccount1";
pub const DEV_STORE_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";
pub const DEV_STORE_QUEUE_ENDPOINT: &str = "http://127.0.0.1:10001/devstoreaccount1";

/// Capacity of the event broadcast channel.
pub(crate) const MAX_EVENTS: usize = 100;
