// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Queue service seam and the Azure Storage implementation behind it.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

use crate::error::QueueError;

pub mod auth;
pub mod client;
pub mod connection_string;

pub use client::AzureQueueClient;

/// What the service reported for an accepted message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueResponse {
    pub status: u16,
    pub request_id: Option<String>,
    pub message_id: Option<String>,
}

/// Operations the transport needs from a queue service client.
#[async_trait]
pub trait QueueService: Send + Sync {
    /// Idempotently creates the queue. Returns `true` when it did not exist yet.
    async fn create_queue_if_not_exists(&self, queue_name: &str) -> Result<bool, QueueError>;

    /// Enqueues one message whose body is `message_text`.
    async fn create_message(
        &self,
        queue_name: &str,
        message_text: &str,
    ) -> Result<QueueResponse, QueueError>;
}

/// A client bound to a single queue name.
#[derive(Clone)]
pub struct QueueHandle {
    service: Arc<dyn QueueService>,
    queue_name: Arc<str>,
}

impl QueueHandle {
    #[must_use]
    pub fn new(service: Arc<dyn QueueService>, queue_name: &str) -> Self {
        Self {
            service,
            queue_name: Arc::from(queue_name),
        }
    }

    #[must_use]
    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    pub async fn ensure_exists(&self) -> Result<bool, QueueError> {
        self.service
            .create_queue_if_not_exists(&self.queue_name)
            .await
    }

    pub async fn send(&self, message_text: &str) -> Result<QueueResponse, QueueError> {
        self.service
            .create_message(&self.queue_name, message_text)
            .await
    }
}

impl std::fmt::Debug for QueueHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueHandle")
            .field("queue_name", &self.queue_name)
            .finish_non_exhaustive()
    }
}
