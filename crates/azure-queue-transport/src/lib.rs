// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! # Azure Queue Transport
//!
//! A log transport that turns each log call into one JSON record and enqueues
//! it as a single message on an Azure Storage queue.
//!
//! ## Overview
//!
//! - [`QueueLogTransport`]: builds records, submits them, reports outcomes
//! - [`EventBus`]: `logged` / `error` notifications, including queue provisioning failures
//! - [`QueueLogLayer`]: forwards `tracing` events through a transport
//! - [`QueueService`]: the seam to the queue service; [`AzureQueueClient`] talks REST
//!
//! ## Example
//!
//! ```rust,ignore
//! use azure_queue_transport::{QueueLogTransport, TransportConfig, TransportEvent};
//! use serde_json::json;
//!
//! let (transport, mut events) = QueueLogTransport::new(TransportConfig {
//!     storage_account: Some("myaccount".to_string()),
//!     storage_access_key: Some(access_key),
//!     queue_name: "app-logs".to_string(),
//!     ..Default::default()
//! })?;
//!
//! let metadata = json!({"requestId": "abc"}).as_object().cloned();
//! transport.log("info", "user signed in", metadata, None);
//!
//! while let Some(event) = events.recv().await {
//!     if let TransportEvent::Error(e) = event {
//!         eprintln!("log shipping failed: {e}");
//!     }
//! }
//! ```

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod config;
pub mod constants;
pub mod error;
pub mod event_bus;
pub mod hostname;
pub mod layer;
pub mod queue;
pub mod record;
pub mod transport;

pub use config::{Credentials, RetryPolicy, TransportConfig};
pub use error::{ConfigError, QueueError, TransportError};
pub use event_bus::{EventBus, TransportEvent};
pub use layer::QueueLogLayer;
pub use queue::{AzureQueueClient, QueueResponse, QueueService};
pub use record::{LogRecord, RecordContext};
pub use transport::{completion, Completion, LogArg, QueueLogTransport};
