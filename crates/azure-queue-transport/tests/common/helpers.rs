// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Helper functions for integration tests

use azure_queue_transport::{EventBus, RetryPolicy, TransportEvent};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::timeout;

use super::mocks::MockQueueService;

/// Base64 of "test-key", accepted as a shared key by the signer.
#[allow(dead_code)]
pub const TEST_ACCESS_KEY: &str = "dGVzdC1rZXk=";

#[allow(dead_code)]
pub const TEST_ACCOUNT: &str = "devstoreaccount1";

/// Connection string pointing the REST client at a mock server.
#[allow(dead_code)]
pub fn connection_string(server_url: &str) -> String {
    format!(
        "DefaultEndpointsProtocol=http;AccountName={TEST_ACCOUNT};AccountKey={TEST_ACCESS_KEY};QueueEndpoint={server_url}/{TEST_ACCOUNT}"
    )
}

/// Fast retries so failure tests finish quickly.
#[allow(dead_code)]
pub fn fast_retry(max_tries: u32) -> RetryPolicy {
    RetryPolicy {
        max_tries,
        retry_delay_ms: 10,
        max_retry_delay_ms: 20,
        try_timeout_ms: 2_000,
    }
}

/// Waits for the next event on the bus.
#[allow(dead_code)]
pub async fn next_event(bus: &mut EventBus) -> TransportEvent {
    timeout(Duration::from_secs(5), bus.recv())
        .await
        .expect("timed out waiting for transport event")
        .expect("event bus closed")
}

/// Waits until the mock has received `count` messages.
#[allow(dead_code)]
pub async fn wait_for_messages(service: &MockQueueService, count: usize) -> Vec<String> {
    let result = timeout(Duration::from_secs(5), async {
        loop {
            let messages = service.messages();
            if messages.len() >= count {
                return messages;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    result.expect("timed out waiting for queued messages")
}

/// Waits for a completion result delivered through a oneshot channel.
#[allow(dead_code)]
pub async fn await_completion<T>(rx: oneshot::Receiver<T>) -> T {
    timeout(Duration::from_secs(5), rx)
        .await
        .expect("timed out waiting for completion")
        .expect("completion dropped without being called")
}
