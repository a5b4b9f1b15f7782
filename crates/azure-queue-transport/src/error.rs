// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Error types for transport construction and queue operations.

/// Errors raised synchronously while building a transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid storage account")]
    InvalidStorageAccount,

    #[error("invalid storage access key")]
    InvalidStorageAccessKey,

    #[error("storage access key is not valid base64: {0}")]
    MalformedAccessKey(String),

    #[error("invalid connection string: {0}")]
    InvalidConnectionString(String),

    #[error("invalid queue name '{0}'")]
    InvalidQueueName(String),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),

    #[error("no tokio runtime available to run queue operations")]
    NoRuntime,
}

/// Errors returned by a queue service client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// The request never produced a response (connect, timeout, I/O).
    #[error("request failed: {0}")]
    Request(String),

    /// The service answered with a non-success status.
    #[error("queue service returned {status}: {message}")]
    Status {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// The request could not be assembled.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl QueueError {
    /// Whether another attempt could succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            QueueError::Request(_) => true,
            QueueError::Status { status, .. } => {
                matches!(*status, 408 | 429) || (*status >= 500 && *status != 501 && *status != 505)
            }
            QueueError::InvalidRequest(_) => false,
        }
    }
}

/// Errors delivered asynchronously through completions and `error` events.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("failed to create queue '{queue}': {source}")]
    Provisioning { queue: String, source: QueueError },

    #[error("failed to submit log record: {0}")]
    Submission(#[source] QueueError),

    #[error("failed to serialize log record: {0}")]
    Serialization(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        assert_eq!(
            ConfigError::InvalidStorageAccount.to_string(),
            "invalid storage account"
        );
        assert_eq!(
            ConfigError::InvalidStorageAccessKey.to_string(),
            "invalid storage access key"
        );
    }

    #[test]
    fn test_retryable_statuses() {
        let status = |status| QueueError::Status {
            status,
            code: None,
            message: String::new(),
        };
        assert!(status(500).is_retryable());
        assert!(status(503).is_retryable());
        assert!(status(408).is_retryable());
        assert!(status(429).is_retryable());
        assert!(!status(501).is_retryable());
        assert!(!status(505).is_retryable());
        assert!(!status(400).is_retryable());
        assert!(!status(403).is_retryable());
        assert!(!status(404).is_retryable());
        assert!(QueueError::Request("connection reset".into()).is_retryable());
        assert!(!QueueError::InvalidRequest("bad header".into()).is_retryable());
    }

    #[test]
    fn test_transport_error_display() {
        let error = TransportError::Provisioning {
            queue: "logs".to_string(),
            source: QueueError::Request("connection refused".to_string()),
        };
        assert_eq!(
            error.to_string(),
            "failed to create queue 'logs': request failed: connection refused"
        );
    }
}
