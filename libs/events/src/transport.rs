//! HTTP transport abstraction.
//!
//! Provides:
//! - `Transport` trait: POST a JSON body, get back a status and a parsed body
//! - `HttpTransport`: reqwest-backed implementation
//! - `MockTransport`: scripted responses for tests (no network)

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::TransportError;

/// Header names to values, sent with every attempt of a delivery.
pub type Headers = BTreeMap<String, String>;

/// Status code and parsed body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,

    /// Parsed JSON body; `Null` when empty, a JSON string when not JSON.
    pub body: Value,
}

impl TransportResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }
}

/// Trait for posting JSON to the event API.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one POST. Connection-level failures come back as `Err`.
    async fn post_json(
        &self,
        url: &str,
        headers: &Headers,
        body: &Value,
    ) -> Result<TransportResponse, TransportError>;
}

/// reqwest-backed transport.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_json(
        &self,
        url: &str,
        headers: &Headers,
        body: &Value,
    ) -> Result<TransportResponse, TransportError> {
        let mut request = self.client.post(url).json(body);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        debug!(url = %url, status, "Event API responded");
        Ok(TransportResponse { status, body })
    }
}

/// A request captured by [`MockTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub url: String,
    pub headers: Headers,
    pub body: Value,
}

/// Mock transport for testing.
///
/// Replays scripted outcomes in order, then answers every further request
/// with `201 {"failedRecords": 0}`.
pub struct MockTransport {
    script: Mutex<VecDeque<Result<TransportResponse, TransportError>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockTransport {
    /// Create a mock transport that accepts everything.
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock transport replaying `outcomes` first.
    pub fn scripted(
        outcomes: impl IntoIterator<Item = Result<TransportResponse, TransportError>>,
    ) -> Self {
        Self {
            script: Mutex::new(outcomes.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue another outcome.
    pub fn push(&self, outcome: Result<TransportResponse, TransportError>) {
        lock(&self.script).push_back(outcome);
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.requests).clone()
    }

    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn post_json(
        &self,
        url: &str,
        headers: &Headers,
        body: &Value,
    ) -> Result<TransportResponse, TransportError> {
        info!(url = %url, "[MOCK] POST");

        lock(&self.requests).push(RecordedRequest {
            url: url.to_string(),
            headers: headers.clone(),
            body: body.clone(),
        });

        lock(&self.script).pop_front().unwrap_or_else(|| {
            Ok(TransportResponse::new(
                201,
                serde_json::json!({"failedRecords": 0}),
            ))
        })
    }
}

// A poisoned lock only means another test thread panicked mid-push.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_mock_transport_replays_script_then_accepts() {
        let transport = MockTransport::scripted([
            Ok(TransportResponse::new(
                500,
                json!({"errorType": "InternalFailureException"}),
            )),
            Err(TransportError::Timeout("slow".into())),
        ]);

        let headers = Headers::new();
        let body = json!({"hello": "world"});

        let first = transport.post_json("http://hub/events", &headers, &body).await;
        assert_eq!(first.unwrap().status, 500);

        let second = transport.post_json("http://hub/events", &headers, &body).await;
        assert_eq!(second, Err(TransportError::Timeout("slow".into())));

        let third = transport.post_json("http://hub/events", &headers, &body).await;
        assert_eq!(third.unwrap().status, 201);

        assert_eq!(transport.request_count(), 3);
        assert_eq!(transport.requests()[0].body, body);
    }

    #[tokio::test]
    async fn test_mock_transport_push_appends_to_script() {
        let transport = MockTransport::scripted([Ok(TransportResponse::new(400, json!(null)))]);
        transport.push(Err(TransportError::Timeout("slow".into())));

        let headers = Headers::new();
        let body = json!({});

        let first = transport.post_json("http://hub/events", &headers, &body).await;
        assert_eq!(first.unwrap().status, 400);
        let second = transport.post_json("http://hub/events", &headers, &body).await;
        assert!(matches!(second, Err(TransportError::Timeout(_))));
        let third = transport.post_json("http://hub/events", &headers, &body).await;
        assert_eq!(third.unwrap().status, 201);
    }

    #[test]
    fn test_http_transport_builds() {
        assert!(HttpTransport::new(Duration::from_secs(5)).is_ok());
    }
}
