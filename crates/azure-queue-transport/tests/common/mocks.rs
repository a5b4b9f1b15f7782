// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! In-memory queue service for integration tests

use async_trait::async_trait;
use azure_queue_transport::{QueueError, QueueResponse, QueueService};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Records every message it receives. Creation and submission can be made
/// to fail independently.
#[allow(dead_code)]
#[derive(Default)]
pub struct MockQueueService {
    messages: Mutex<Vec<(String, String)>>,
    create_calls: AtomicUsize,
    fail_create: AtomicBool,
    fail_submit: AtomicBool,
}

#[allow(dead_code)]
impl MockQueueService {
    pub fn failing_create() -> Self {
        let service = Self::default();
        service.fail_create.store(true, Ordering::SeqCst);
        service
    }

    pub fn failing_submit() -> Self {
        let service = Self::default();
        service.fail_submit.store(true, Ordering::SeqCst);
        service
    }

    /// Message bodies, in submission order.
    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .map(|(_, body)| body.clone())
            .collect()
    }

    /// Queue names the messages were sent to.
    pub fn queues(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .map(|(queue, _)| queue.clone())
            .collect()
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }
}

#[allow(dead_code)]
pub fn service_unavailable() -> QueueError {
    QueueError::Status {
        status: 503,
        code: Some("ServerBusy".to_string()),
        message: "The server is busy".to_string(),
    }
}

#[async_trait]
impl QueueService for MockQueueService {
    async fn create_queue_if_not_exists(&self, _queue_name: &str) -> Result<bool, QueueError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(QueueError::Status {
                status: 403,
                code: Some("AuthenticationFailed".to_string()),
                message: "Server failed to authenticate the request".to_string(),
            });
        }
        Ok(true)
    }

    async fn create_message(
        &self,
        queue_name: &str,
        message_text: &str,
    ) -> Result<QueueResponse, QueueError> {
        if self.fail_submit.load(Ordering::SeqCst) {
            return Err(service_unavailable());
        }
        self.messages
            .lock()
            .unwrap()
            .push((queue_name.to_string(), message_text.to_string()));
        Ok(QueueResponse {
            status: 201,
            request_id: Some("req-1".to_string()),
            message_id: Some("msg-1".to_string()),
        })
    }
}
