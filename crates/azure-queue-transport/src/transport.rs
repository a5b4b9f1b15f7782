// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The queue log transport.
//!
//! Construction validates credentials synchronously, then spawns an
//! idempotent "create queue" request that is never awaited. Each log call
//! builds one [`LogRecord`], serializes it and submits it as a single queue
//! message from its own task.

use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, error};

use crate::config::{validate_queue_name, Credentials, TransportConfig};
use crate::constants::TRANSPORT_NAME;
use crate::error::{ConfigError, QueueError, TransportError};
use crate::event_bus::{EventBus, EventEmitter, TransportEvent};
use crate::hostname::get_hostname;
use crate::queue::{AzureQueueClient, QueueHandle, QueueService};
use crate::record::{LogRecord, RecordContext};

/// Reported when a submission is dropped before it runs.
pub const RUNTIME_SHUT_DOWN: &str = "runtime shut down";

/// Completion invoked once per log call: `Ok(true)` when the record was
/// accepted (or silently dropped), the error otherwise.
pub type Completion = Box<dyn FnOnce(Result<bool, TransportError>) + Send + 'static>;

pub fn completion<F>(f: F) -> Completion
where
    F: FnOnce(Result<bool, TransportError>) + Send + 'static,
{
    Box::new(f)
}

/// Third argument of [`QueueLogTransport::log`]: either metadata or the completion.
pub enum LogArg {
    None,
    Metadata(Map<String, Value>),
    Callback(Completion),
}

impl LogArg {
    pub fn callback<F>(f: F) -> Self
    where
        F: FnOnce(Result<bool, TransportError>) + Send + 'static,
    {
        LogArg::Callback(Box::new(f))
    }

    /// Resolves the overloaded argument into `(metadata, completion)`.
    /// A callback in third position replaces the fourth argument.
    fn normalize(self, callback: Option<Completion>) -> (Map<String, Value>, Option<Completion>) {
        match self {
            LogArg::None => (Map::new(), callback),
            LogArg::Metadata(metadata) => (metadata, callback),
            LogArg::Callback(callback) => (Map::new(), Some(callback)),
        }
    }
}

impl From<Map<String, Value>> for LogArg {
    fn from(metadata: Map<String, Value>) -> Self {
        LogArg::Metadata(metadata)
    }
}

impl From<Option<Map<String, Value>>> for LogArg {
    fn from(metadata: Option<Map<String, Value>>) -> Self {
        metadata.map_or(LogArg::None, LogArg::Metadata)
    }
}

impl From<Completion> for LogArg {
    fn from(callback: Completion) -> Self {
        LogArg::Callback(callback)
    }
}

impl fmt::Debug for LogArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogArg::None => write!(f, "LogArg::None"),
            LogArg::Metadata(metadata) => f.debug_tuple("LogArg::Metadata").field(metadata).finish(),
            LogArg::Callback(_) => write!(f, "LogArg::Callback"),
        }
    }
}

#[derive(Debug)]
pub struct QueueLogTransport {
    level: String,
    silent: bool,
    encode_base64: bool,
    context: RecordContext,
    queue: QueueHandle,
    events: EventEmitter,
    runtime: Handle,
}

impl QueueLogTransport {
    /// Builds the transport and starts provisioning its queue.
    ///
    /// Must be called from within a tokio runtime; all queue operations run
    /// on that runtime. Provisioning failures are reported on the returned
    /// [`EventBus`] as [`TransportError::Provisioning`].
    pub fn new(config: TransportConfig) -> Result<(Self, EventBus), ConfigError> {
        validate_queue_name(&config.queue_name)?;
        let service = build_service(&config)?;
        let runtime = Handle::try_current().map_err(|_| ConfigError::NoRuntime)?;

        let context = RecordContext {
            host: config.host.clone().unwrap_or_else(get_hostname),
            env: config.resolve_env(),
            pid: config.pid.unwrap_or_else(std::process::id),
        };
        let (events, bus) = EventEmitter::channel();

        let transport = QueueLogTransport {
            level: config.level,
            silent: config.silent,
            encode_base64: config.encode_base64,
            context,
            queue: QueueHandle::new(service, &config.queue_name),
            events,
            runtime,
        };
        transport.provision();

        Ok((transport, bus))
    }

    fn provision(&self) {
        let queue = self.queue.clone();
        let events = self.events.clone();
        self.runtime.spawn(async move {
            match queue.ensure_exists().await {
                Ok(created) => {
                    debug!(
                        "QUEUE | Queue '{}' is ready (created: {created})",
                        queue.queue_name()
                    );
                }
                Err(source) => {
                    error!(
                        "QUEUE | Failed to create queue '{}': {source}",
                        queue.queue_name()
                    );
                    events.emit(TransportEvent::Error(TransportError::Provisioning {
                        queue: queue.queue_name().to_string(),
                        source,
                    }));
                }
            }
        });
    }

    /// Forwards one log record without waiting for the outcome.
    ///
    /// `meta` is either the record metadata or, in the three-argument form,
    /// the completion itself. The outcome goes to the completion and to the
    /// event bus; consumers should not rely on only one of them firing.
    pub fn log(
        &self,
        level: &str,
        message: impl Into<Value>,
        meta: impl Into<LogArg>,
        callback: Option<Completion>,
    ) {
        let (metadata, callback) = meta.into().normalize(callback);

        if self.silent {
            if let Some(callback) = callback {
                callback(Ok(true));
            }
            return;
        }

        let body = self.body(level, message.into(), metadata);
        let queue = self.queue.clone();
        let events = self.events.clone();
        let pending = PendingCompletion::new(callback, events.clone());
        // A runtime that has shut down drops the task unpolled; the guard
        // still reports the outcome.
        self.runtime.spawn(async move {
            let result = submit(&queue, &events, body).await;
            pending.finish(result);
        });
    }

    /// Awaitable form of [`QueueLogTransport::log`], with the same events.
    pub async fn log_async(
        &self,
        level: &str,
        message: impl Into<Value>,
        metadata: Map<String, Value>,
    ) -> Result<bool, TransportError> {
        if self.silent {
            return Ok(true);
        }
        let body = self.body(level, message.into(), metadata);
        submit(&self.queue, &self.events, body).await
    }

    fn body(
        &self,
        level: &str,
        message: Value,
        metadata: Map<String, Value>,
    ) -> Result<String, TransportError> {
        LogRecord::new(&self.context, level, message, metadata).into_body(self.encode_base64)
    }

    /// Adds another event subscriber. Only events emitted afterwards are seen.
    #[must_use]
    pub fn subscribe(&self) -> EventBus {
        self.events.subscribe()
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        TRANSPORT_NAME
    }

    #[must_use]
    pub fn level(&self) -> &str {
        &self.level
    }

    #[must_use]
    pub fn is_silent(&self) -> bool {
        self.silent
    }

    #[must_use]
    pub fn queue_name(&self) -> &str {
        self.queue.queue_name()
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.context.host
    }

    #[must_use]
    pub fn env(&self) -> Option<&str> {
        self.context.env.as_deref()
    }

    #[must_use]
    pub fn pid(&self) -> u32 {
        self.context.pid
    }
}

/// Completion of a spawned submission. Dropped without `finish`, it reports
/// [`RUNTIME_SHUT_DOWN`] to the callback and the event bus.
struct PendingCompletion {
    callback: Option<Completion>,
    events: EventEmitter,
    finished: bool,
}

impl PendingCompletion {
    fn new(callback: Option<Completion>, events: EventEmitter) -> Self {
        Self {
            callback,
            events,
            finished: false,
        }
    }

    fn finish(mut self, result: Result<bool, TransportError>) {
        self.finished = true;
        if let Some(callback) = self.callback.take() {
            callback(result);
        }
    }
}

impl Drop for PendingCompletion {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let err = TransportError::Submission(QueueError::Request(RUNTIME_SHUT_DOWN.to_string()));
        error!("QUEUE | {err}");
        self.events.emit(TransportEvent::Error(err.clone()));
        if let Some(callback) = self.callback.take() {
            callback(Err(err));
        }
    }
}

fn build_service(config: &TransportConfig) -> Result<Arc<dyn QueueService>, ConfigError> {
    let proxy = config.https_proxy.as_deref();
    let service: Arc<dyn QueueService> = match config.resolve_credentials()? {
        Credentials::ServiceClient(client) => client,
        Credentials::ConnectionString(connection_string) => Arc::new(
            AzureQueueClient::from_connection_string(&connection_string, config.retry, proxy)?,
        ),
        Credentials::SharedKey {
            account,
            access_key,
        } => Arc::new(AzureQueueClient::from_shared_key(
            &account,
            &access_key,
            config.retry,
            proxy,
        )?),
    };
    Ok(service)
}

async fn submit(
    queue: &QueueHandle,
    events: &EventEmitter,
    body: Result<String, TransportError>,
) -> Result<bool, TransportError> {
    let result = match body {
        Ok(body) => queue.send(&body).await.map_err(TransportError::Submission),
        Err(e) => Err(e),
    };

    match result {
        Ok(response) => {
            debug!(
                "QUEUE | Enqueued log record on '{}' (status {})",
                queue.queue_name(),
                response.status
            );
            events.emit(TransportEvent::Logged(response));
            Ok(true)
        }
        Err(e) => {
            error!("QUEUE | {e}");
            events.emit(TransportEvent::Error(e.clone()));
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QueueError;
    use crate::queue::QueueResponse;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use tracing_test::traced_test;

    #[derive(Default)]
    struct RecordingService {
        messages: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl QueueService for RecordingService {
        async fn create_queue_if_not_exists(&self, _queue_name: &str) -> Result<bool, QueueError> {
            Ok(true)
        }

        async fn create_message(
            &self,
            _queue_name: &str,
            message_text: &str,
        ) -> Result<QueueResponse, QueueError> {
            self.messages.lock().unwrap().push(message_text.to_string());
            Ok(QueueResponse {
                status: 201,
                ..Default::default()
            })
        }
    }

    fn config(service: Arc<RecordingService>) -> TransportConfig {
        TransportConfig {
            env: Some("test".to_string()),
            host: Some("H".to_string()),
            pid: Some(123),
            service_client: Some(service),
            ..Default::default()
        }
    }

    #[test]
    fn test_normalize_metadata_and_callback() {
        let metadata = json!({"a": 1}).as_object().cloned().unwrap();
        let (meta, callback) = LogArg::from(metadata.clone()).normalize(None);
        assert_eq!(meta, metadata);
        assert!(callback.is_none());

        let (meta, callback) = LogArg::None.normalize(Some(completion(|_| {})));
        assert!(meta.is_empty());
        assert!(callback.is_some());
    }

    #[test]
    fn test_normalize_callback_in_third_position() {
        let (tx, rx) = std::sync::mpsc::channel();
        let third = LogArg::callback(move |_| tx.send("third").unwrap());
        let (meta, callback) = third.normalize(Some(completion(|_| panic!("fourth called"))));
        assert!(meta.is_empty());
        callback.unwrap()(Ok(true));
        assert_eq!(rx.recv().unwrap(), "third");
    }

    #[test]
    fn test_new_outside_runtime_fails() {
        let result = QueueLogTransport::new(config(Arc::new(RecordingService::default())));
        assert_eq!(result.unwrap_err(), ConfigError::NoRuntime);
    }

    #[tokio::test]
    async fn test_invalid_queue_name_rejected() {
        let config = TransportConfig {
            queue_name: "Bad_Name".to_string(),
            ..config(Arc::new(RecordingService::default()))
        };
        assert_eq!(
            QueueLogTransport::new(config).unwrap_err(),
            ConfigError::InvalidQueueName("Bad_Name".to_string())
        );
    }

    #[tokio::test]
    async fn test_accessors() {
        let (transport, _bus) =
            QueueLogTransport::new(config(Arc::new(RecordingService::default()))).unwrap();
        assert_eq!(transport.name(), "azureQueueTransport");
        assert_eq!(transport.level(), "info");
        assert_eq!(transport.queue_name(), "logs");
        assert_eq!(transport.host(), "H");
        assert_eq!(transport.env(), Some("test"));
        assert_eq!(transport.pid(), 123);
        assert!(!transport.is_silent());
    }

    #[tokio::test]
    async fn test_default_pid_is_current_process() {
        let config = TransportConfig {
            pid: None,
            ..config(Arc::new(RecordingService::default()))
        };
        let (transport, _bus) = QueueLogTransport::new(config).unwrap();
        assert_eq!(transport.pid(), std::process::id());
    }

    #[tokio::test]
    async fn test_log_async_submits_record() {
        let service = Arc::new(RecordingService::default());
        let (transport, mut bus) = QueueLogTransport::new(config(Arc::clone(&service))).unwrap();

        assert_eq!(transport.log_async("info", "hello", Map::new()).await, Ok(true));
        assert_eq!(
            service.messages.lock().unwrap().as_slice(),
            [r#"{"message":"hello","level":"info","host":"H","env":"test","pid":123}"#]
        );
        assert!(matches!(bus.recv().await, Some(TransportEvent::Logged(_))));
    }

    struct RejectingService;

    #[async_trait]
    impl QueueService for RejectingService {
        async fn create_queue_if_not_exists(&self, _queue_name: &str) -> Result<bool, QueueError> {
            Ok(false)
        }

        async fn create_message(
            &self,
            _queue_name: &str,
            _message_text: &str,
        ) -> Result<QueueResponse, QueueError> {
            Err(QueueError::Status {
                status: 400,
                code: Some("MessageTooLarge".to_string()),
                message: "message too large".to_string(),
            })
        }
    }

    #[tokio::test]
    #[traced_test]
    async fn test_rejected_log_async_is_logged_and_emitted() {
        let config = TransportConfig {
            service_client: Some(Arc::new(RejectingService)),
            ..config(Arc::new(RecordingService::default()))
        };
        let (transport, mut bus) = QueueLogTransport::new(config).unwrap();

        let err = transport
            .log_async("info", "hello", Map::new())
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::Submission(QueueError::Status { status: 400, .. })));
        assert_eq!(bus.recv().await, Some(TransportEvent::Error(err)));
        assert!(logs_contain("QUEUE | failed to submit log record"));
    }

    #[test]
    fn test_log_after_runtime_shutdown_still_completes() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let service = Arc::new(RecordingService::default());
        let (transport, mut bus) = runtime
            .block_on(async { QueueLogTransport::new(config(Arc::clone(&service))) })
            .unwrap();
        drop(runtime);

        let (tx, rx) = std::sync::mpsc::channel();
        transport.log(
            "info",
            "hello",
            LogArg::None,
            Some(completion(move |result| {
                let _ = tx.send(result);
            })),
        );

        let expected =
            TransportError::Submission(QueueError::Request(RUNTIME_SHUT_DOWN.to_string()));
        let result = rx
            .recv_timeout(std::time::Duration::from_secs(5))
            .unwrap();
        assert_eq!(result, Err(expected.clone()));
        assert_eq!(bus.try_recv(), Some(TransportEvent::Error(expected)));
        assert!(service.messages.lock().unwrap().is_empty());
    }

    #[test]
    fn test_finished_completion_reports_once() {
        let (events, mut bus) = EventEmitter::channel();
        let (tx, rx) = std::sync::mpsc::channel();
        let pending = PendingCompletion::new(
            Some(completion(move |result| {
                let _ = tx.send(result);
            })),
            events,
        );

        pending.finish(Ok(true));

        assert_eq!(rx.try_recv(), Ok(Ok(true)));
        assert!(rx.try_recv().is_err());
        assert_eq!(bus.try_recv(), None);
    }

    #[tokio::test]
    async fn test_silent_log_async_skips_submission() {
        let service = Arc::new(RecordingService::default());
        let config = TransportConfig {
            silent: true,
            ..config(Arc::clone(&service))
        };
        let (transport, _bus) = QueueLogTransport::new(config).unwrap();

        assert_eq!(transport.log_async("info", "hello", Map::new()).await, Ok(true));
        assert!(service.messages.lock().unwrap().is_empty());
    }
}
