// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The JSON record submitted for each log call.
//!
//! Fixed fields come first in the order `message, level, host, env, pid`,
//! followed by caller metadata. A metadata key that collides with a fixed
//! field is dropped: the transport's value always wins.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{Map, Value};

use crate::error::TransportError;

/// Process and host values stamped on every record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordContext {
    pub host: String,
    pub env: Option<String>,
    pub pid: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    fields: Map<String, Value>,
}

impl LogRecord {
    #[must_use]
    pub fn new(
        context: &RecordContext,
        level: &str,
        message: Value,
        metadata: Map<String, Value>,
    ) -> Self {
        let mut fields = Map::new();
        fields.insert("message".to_string(), message);
        fields.insert("level".to_string(), Value::from(level));
        fields.insert("host".to_string(), Value::from(context.host.as_str()));
        if let Some(env) = &context.env {
            fields.insert("env".to_string(), Value::from(env.as_str()));
        }
        fields.insert("pid".to_string(), Value::from(context.pid));

        for (key, value) in metadata {
            fields.entry(key).or_insert(value);
        }
        Self { fields }
    }

    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Serializes the record. U+FFFE and U+FFFF are written as JSON escapes
    /// since XML 1.0 message bodies cannot carry them.
    pub fn to_json(&self) -> Result<String, TransportError> {
        let json = serde_json::to_string(&self.fields)
            .map_err(|e| TransportError::Serialization(e.to_string()))?;
        Ok(escape_xml_noncharacters(json))
    }

    /// Message text to enqueue: the JSON itself, or its base64 encoding.
    pub fn into_body(self, encode_base64: bool) -> Result<String, TransportError> {
        let json = self.to_json()?;
        if encode_base64 {
            Ok(STANDARD.encode(json))
        } else {
            Ok(json)
        }
    }
}

// Both only occur inside JSON strings, where `\uXXXX` decodes back to them.
fn escape_xml_noncharacters(json: String) -> String {
    if json.contains(['\u{FFFE}', '\u{FFFF}']) {
        json.replace('\u{FFFE}', "\\ufffe")
            .replace('\u{FFFF}', "\\uffff")
    } else {
        json
    }
}
