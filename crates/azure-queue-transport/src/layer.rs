// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! `tracing` integration: a [`Layer`] that forwards events to the queue.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tracing_subscriber::layer::SubscriberExt;
//! use azure_queue_transport::{QueueLogLayer, QueueLogTransport, TransportConfig};
//!
//! let (transport, mut events) = QueueLogTransport::new(TransportConfig {
//!     connection_string: Some(connection_string),
//!     ..Default::default()
//! })?;
//! let subscriber = tracing_subscriber::registry().with(QueueLogLayer::new(Arc::new(transport)));
//! tracing::subscriber::set_global_default(subscriber)?;
//!
//! tracing::info!(order_id = 42, "order shipped");
//! ```
//!
//! The event's `message` field becomes the record message; every other field
//! becomes metadata, together with the event `target`.

use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::level_filters::LevelFilter;
use tracing::{warn, Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use crate::transport::{LogArg, QueueLogTransport};

/// Crates whose events are never forwarded: the transport's own diagnostics
/// and the HTTP stack it submits through.
const INTERNAL_TARGETS: &[&str] = &[
    "azure_queue_transport",
    "reqwest",
    "hyper",
    "hyper_util",
    "h2",
    "rustls",
];

#[allow(clippy::module_name_repetitions)]
#[derive(Debug, Clone)]
pub struct QueueLogLayer {
    transport: Arc<QueueLogTransport>,
    max_level: LevelFilter,
}

impl QueueLogLayer {
    /// Uses the transport's configured level as the threshold.
    #[must_use]
    pub fn new(transport: Arc<QueueLogTransport>) -> Self {
        let max_level = parse_level(transport.level());
        Self {
            transport,
            max_level,
        }
    }

    #[must_use]
    pub fn max_level(&self) -> LevelFilter {
        self.max_level
    }
}

impl<S> Layer<S> for QueueLogLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if *metadata.level() > self.max_level || is_internal(metadata.target()) {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        visitor
            .fields
            .entry("target")
            .or_insert_with(|| Value::from(metadata.target()));

        let message = visitor.message.unwrap_or_else(|| Value::from(""));
        self.transport.log(
            level_name(metadata.level()),
            message,
            LogArg::Metadata(visitor.fields),
            None,
        );
    }
}

/// Maps a level name to a tracing filter. Accepts tracing names and the
/// npm-style names `http`, `verbose` and `silly`.
#[must_use]
pub fn parse_level(level: &str) -> LevelFilter {
    match level.trim().to_ascii_lowercase().as_str() {
        "off" => LevelFilter::OFF,
        "error" => LevelFilter::ERROR,
        "warn" | "warning" => LevelFilter::WARN,
        "info" => LevelFilter::INFO,
        "http" | "verbose" | "debug" => LevelFilter::DEBUG,
        "silly" | "trace" => LevelFilter::TRACE,
        other => {
            warn!("QUEUE | Unknown log level '{other}', using 'info'");
            LevelFilter::INFO
        }
    }
}

#[must_use]
pub fn level_name(level: &Level) -> &'static str {
    match *level {
        Level::ERROR => "error",
        Level::WARN => "warn",
        Level::INFO => "info",
        Level::DEBUG => "debug",
        Level::TRACE => "trace",
    }
}

fn is_internal(target: &str) -> bool {
    let root = target.split("::").next().unwrap_or(target);
    INTERNAL_TARGETS.contains(&root)
}

#[derive(Default)]
struct FieldVisitor {
    message: Option<Value>,
    fields: Map<String, Value>,
}

impl FieldVisitor {
    fn insert(&mut self, field: &Field, value: Value) {
        if field.name() == "message" {
            self.message = Some(value);
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for FieldVisitor {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, Value::from(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::from(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.insert(field, Value::from(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, Value::from(format!("{value:?}")));
    }
}
