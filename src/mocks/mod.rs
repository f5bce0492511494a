//! Mock implementations for testing.
//!
//! `MockTransport` replays scripted responses and records every request,
//! so services can be exercised without a network.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::transport::{
    HttpMethod, HttpRequest, HttpResponse, HttpTransport, MultipartPart, MultipartRequest,
    TransportError,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mock HTTP transport for testing.
pub struct MockTransport {
    responses: Mutex<VecDeque<MockOutcome>>,
    requests: Mutex<Vec<RecordedRequest>>,
    default_response: Mutex<Option<MockResponse>>,
}

/// A recorded request.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// Request path.
    pub path: String,
    /// Request body. Multipart requests record `None`.
    pub body: Option<Vec<u8>>,
    /// Request headers.
    pub headers: HashMap<String, String>,
    /// Text fields of a multipart request.
    pub fields: Vec<(String, String)>,
    /// File names of a multipart request.
    pub file_names: Vec<String>,
}

impl RecordedRequest {
    /// Returns the value of a multipart text field.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }
}

/// A mock response.
#[derive(Debug, Clone)]
pub struct MockResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HashMap<String, String>,
    /// Response body.
    pub body: Vec<u8>,
    /// Simulated latency.
    pub delay: Option<Duration>,
}

impl MockResponse {
    /// Creates a successful JSON response.
    pub fn json<T: serde::Serialize>(value: &T) -> Self {
        let body = serde_json::to_vec(value).unwrap_or_default();
        Self::text(200, "")
            .with_body(body)
            .with_header("content-type", "application/json")
    }

    /// Creates a plain text response.
    pub fn text(status: u16, body: &str) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.as_bytes().to_vec(),
            delay: None,
        }
    }

    /// Creates a response without a body.
    pub fn empty(status: u16) -> Self {
        Self::text(status, "")
    }

    /// Creates an error response in the API's error shape.
    pub fn error(status: u16, message: &str) -> Self {
        let error = serde_json::json!({
            "error": {
                "message": message,
                "type": "error"
            }
        });

        Self::json(&error).with_status(status)
    }

    /// Creates a response with custom status.
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Replaces the body.
    #[must_use]
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    /// Delays the response.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[derive(Debug)]
enum MockOutcome {
    Response(MockResponse),
    Failure(TransportError),
}

impl MockTransport {
    /// Creates a new mock transport.
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            default_response: Mutex::new(None),
        }
    }

    /// Queues a response.
    pub fn queue(&self, response: MockResponse) {
        lock(&self.responses).push_back(MockOutcome::Response(response));
    }

    /// Queues a JSON response.
    pub fn queue_json<T: serde::Serialize>(&self, value: &T) {
        self.queue(MockResponse::json(value));
    }

    /// Queues an error response.
    pub fn queue_error(&self, status: u16, message: &str) {
        self.queue(MockResponse::error(status, message));
    }

    /// Queues a transport-level failure (no response at all).
    pub fn queue_failure(&self, error: TransportError) {
        lock(&self.responses).push_back(MockOutcome::Failure(error));
    }

    /// Sets the response used once the queue is empty.
    pub fn set_default(&self, response: MockResponse) {
        *lock(&self.default_response) = Some(response);
    }

    /// Gets all recorded requests.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.requests).clone()
    }

    /// Gets the last recorded request.
    pub fn last_request(&self) -> Option<RecordedRequest> {
        lock(&self.requests).last().cloned()
    }

    /// Returns the number of requests made.
    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }

    /// Returns the number of requests made to a path.
    pub fn count_path(&self, path: &str) -> usize {
        lock(&self.requests)
            .iter()
            .filter(|request| request.path == path)
            .count()
    }

    async fn respond(&self) -> Result<HttpResponse, TransportError> {
        let outcome = lock(&self.responses).pop_front();

        let response = match outcome {
            Some(MockOutcome::Response(response)) => response,
            Some(MockOutcome::Failure(error)) => return Err(error),
            None => lock(&self.default_response)
                .clone()
                .unwrap_or_else(|| MockResponse::error(500, "No mock response configured")),
        };

        if let Some(delay) = response.delay {
            tokio::time::sleep(delay).await;
        }

        Ok(HttpResponse {
            status: response.status,
            headers: response.headers,
            body: response.body,
        })
    }

    fn record(&self, request: RecordedRequest) {
        lock(&self.requests).push(request);
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.record(RecordedRequest {
            method: request.method,
            path: request.path,
            body: request.body,
            headers: request.headers,
            fields: Vec::new(),
            file_names: Vec::new(),
        });

        self.respond().await
    }

    async fn send_multipart(
        &self,
        request: MultipartRequest,
    ) -> Result<HttpResponse, TransportError> {
        let mut fields = Vec::new();
        let mut file_names = Vec::new();

        for part in request.parts {
            match part {
                MultipartPart::Text { name, value } => fields.push((name, value)),
                MultipartPart::File { filename, .. } => file_names.push(filename),
            }
        }

        self.record(RecordedRequest {
            method: HttpMethod::Post,
            path: request.path,
            body: None,
            headers: request.headers,
            fields,
            file_names,
        });

        self.respond().await
    }
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("request_count", &self.request_count())
            .finish()
    }
}

/// Test fixtures for common response bodies.
pub mod fixtures {
    use serde_json::{json, Value};

    /// Upload response carrying a file id.
    pub fn upload(id: &str) -> Value {
        json!({
            "id": id,
            "object": "file",
            "bytes": 1024,
            "filename": "document.pdf",
            "purpose": "file-extract",
            "status": "ok"
        })
    }

    /// Content response with a `text` field.
    pub fn content(text: &str) -> Value {
        json!({ "text": text, "type": "file" })
    }

    /// Chat completion response with a single reply.
    pub fn completion(reply: &str) -> Value {
        json!({
            "id": "chatcmpl-mock",
            "object": "chat.completion",
            "model": "moonshot-v1-32k",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": reply },
                "finish_reason": "stop"
            }],
            "usage": { "prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15 }
        })
    }
}
