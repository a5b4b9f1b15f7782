// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! REST client for Azure Storage queues.
//!
//! Each operation is retried according to the configured [`RetryPolicy`]:
//! network errors, 408, 429 and most 5xx responses are retried with
//! exponential backoff; other 4xx responses fail immediately.

use async_trait::async_trait;
use core::time::Duration;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Method, Response, StatusCode, Url};
use std::error::Error;
use std::time::Instant;
use tracing::{debug, error};

use crate::config::RetryPolicy;
use crate::constants::STORAGE_API_VERSION;
use crate::error::{ConfigError, QueueError};
use crate::queue::auth::{authorization_header, rfc1123_now};
use crate::queue::connection_string::{StorageConnection, StorageCredential};
use crate::queue::{QueueResponse, QueueService};

const XML_CONTENT_TYPE: &str = "application/xml; charset=utf-8";

#[derive(Debug, Clone)]
pub struct AzureQueueClient {
    client: reqwest::Client,
    connection: StorageConnection,
    retry: RetryPolicy,
}

impl AzureQueueClient {
    pub fn new(
        connection: StorageConnection,
        retry: RetryPolicy,
        https_proxy: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let client = build_client(https_proxy, retry.try_timeout())
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Ok(Self {
            client,
            connection,
            retry,
        })
    }

    pub fn from_connection_string(
        connection_string: &str,
        retry: RetryPolicy,
        https_proxy: Option<&str>,
    ) -> Result<Self, ConfigError> {
        Self::new(
            StorageConnection::from_connection_string(connection_string)?,
            retry,
            https_proxy,
        )
    }

    pub fn from_shared_key(
        account: &str,
        access_key: &str,
        retry: RetryPolicy,
        https_proxy: Option<&str>,
    ) -> Result<Self, ConfigError> {
        Self::new(
            StorageConnection::from_shared_key(account, access_key)?,
            retry,
            https_proxy,
        )
    }

    #[must_use]
    pub fn queue_endpoint(&self) -> &str {
        &self.connection.queue_endpoint
    }

    fn queue_url(&self, queue_name: &str, suffix: &str) -> Result<Url, QueueError> {
        let mut url = Url::parse(&format!(
            "{}/{queue_name}{suffix}",
            self.connection.queue_endpoint
        ))
        .map_err(|e| QueueError::InvalidRequest(e.to_string()))?;
        if let StorageCredential::Sas(sas) = &self.connection.credential {
            url.set_query(Some(sas));
        }
        Ok(url)
    }

    async fn execute(
        &self,
        method: Method,
        url: &Url,
        body: Option<&str>,
    ) -> Result<Response, QueueError> {
        let max_tries = self.retry.max_tries();
        let mut attempts = 0;
        let time = Instant::now();

        loop {
            attempts += 1;
            let err = match self.send_once(method.clone(), url, body).await {
                Ok(resp) if resp.status().is_success() => return Ok(resp),
                Ok(resp) => status_error(resp).await,
                Err(e) => e,
            };

            if !err.is_retryable() || attempts >= max_tries {
                if err.is_retryable() {
                    error!(
                        "QUEUE | {method} {} failed after {} ms and {attempts} attempts: {err}",
                        url.path(),
                        time.elapsed().as_millis()
                    );
                }
                return Err(err);
            }

            let delay = self.retry.delay_before_retry(attempts);
            debug!(
                "QUEUE | {method} {} attempt {attempts} failed: {err}, retrying in {} ms",
                url.path(),
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn send_once(
        &self,
        method: Method,
        url: &Url,
        body: Option<&str>,
    ) -> Result<Response, QueueError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-ms-date",
            HeaderValue::from_str(&rfc1123_now())
                .map_err(|e| QueueError::InvalidRequest(e.to_string()))?,
        );
        headers.insert("x-ms-version", HeaderValue::from_static(STORAGE_API_VERSION));
        if let Some(body) = body {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(XML_CONTENT_TYPE));
            headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        }
        if let StorageCredential::SharedKey { account, key } = &self.connection.credential {
            let authorization = authorization_header(account, key, &method, url, &headers)?;
            headers.insert(AUTHORIZATION, authorization);
        }

        let mut request = self.client.request(method, url.clone()).headers(headers);
        if let Some(body) = body {
            request = request.body(body.to_string());
        }
        request
            .send()
            .await
            .map_err(|e| QueueError::Request(e.to_string()))
    }
}

#[async_trait]
impl QueueService for AzureQueueClient {
    async fn create_queue_if_not_exists(&self, queue_name: &str) -> Result<bool, QueueError> {
        let url = self.queue_url(queue_name, "")?;
        match self.execute(Method::PUT, &url, None).await {
            Ok(resp) => Ok(resp.status() == StatusCode::CREATED),
            Err(QueueError::Status {
                status: 409,
                code: Some(code),
                ..
            }) if code == "QueueAlreadyExists" => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn create_message(
        &self,
        queue_name: &str,
        message_text: &str,
    ) -> Result<QueueResponse, QueueError> {
        let url = self.queue_url(queue_name, "/messages")?;
        let body = format!(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?><QueueMessage><MessageText>{}</MessageText></QueueMessage>",
            xml_escape(message_text)
        );

        let resp = self.execute(Method::POST, &url, Some(&body)).await?;
        let status = resp.status().as_u16();
        let request_id = header_string(&resp, "x-ms-request-id");
        let text = body_or_empty(resp.text().await, "accepted message");

        Ok(QueueResponse {
            status,
            request_id,
            message_id: extract_element(&text, "MessageId"),
        })
    }
}

/// Builds a reqwest client with an optional HTTPS proxy.
pub fn build_client(
    proxy_url: Option<&str>,
    timeout: Duration,
) -> Result<reqwest::Client, Box<dyn Error>> {
    let mut builder = reqwest::Client::builder().timeout(timeout);
    if let Some(proxy) = proxy_url {
        builder = builder.proxy(reqwest::Proxy::https(proxy)?);
    }
    Ok(builder.build()?)
}

async fn status_error(resp: Response) -> QueueError {
    let status = resp.status();
    let code = header_string(&resp, "x-ms-error-code");
    let body = body_or_empty(resp.text().await, "error response");
    let message = extract_element(&body, "Message")
        .or_else(|| (!body.is_empty()).then_some(body))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or_default().to_string());

    QueueError::Status {
        status: status.as_u16(),
        code,
        message,
    }
}

fn body_or_empty<E: std::fmt::Display>(body: Result<String, E>, what: &str) -> String {
    match body {
        Ok(body) => body,
        Err(e) => {
            debug!("QUEUE | Failed to read body of {what}: {e}");
            String::new()
        }
    }
}

fn header_string(resp: &Response, name: &str) -> Option<String> {
    resp.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn xml_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn extract_element(xml: &str, name: &str) -> Option<String> {
    let open = format!("<{name}>");
    let close = format!("</{name}>");
    let start = xml.find(&open)? + open.len();
    let end = xml.get(start..)?.find(&close)? + start;
    xml.get(start..end).map(str::to_string)
}
