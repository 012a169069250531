//! Scriptable in-process transport for tests.
//!
//! # Features
//!
//! - **Scripted replies**: queue replies per request path, consumed in order
//! - **Request recording**: every request is kept for later assertions
//! - **Gating**: a gated transport holds each reply until the test releases it, which
//!   lets a test observe the caller while a request is in flight
//! - **Failure injection**: transport failures and requests that never complete
//!
//! # Example
//!
//! ```no_run
//! use odc_client::mock::{MockReply, MockTransport};
//! use serde_json::json;
//!
//! let transport = MockTransport::new();
//! transport.enqueue("/donors", MockReply::ok(json!({ "id": 42 })));
//! ```

use crate::transport::{HttpRequest, HttpResponse, Transport};
use crate::{ApiEnvelope, ClientError, ClientResult};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{watch, Semaphore};

/// A scripted reply.
#[derive(Clone, Debug)]
pub enum MockReply {
    /// Return this response.
    Respond(HttpResponse),
    /// Fail the send as a transport error with this message.
    Fail(String),
    /// Never complete.
    Hang,
}

impl MockReply {
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        MockReply::Respond(HttpResponse {
            status,
            body: body.to_string().into_bytes(),
        })
    }

    /// `200 {success: true, data}`.
    pub fn ok<T: serde::Serialize>(data: T) -> Self {
        let body = serde_json::to_value(ApiEnvelope::ok(data)).unwrap_or_default();
        Self::json(200, body)
    }

    /// `{success: false, message}` with the given status.
    pub fn rejected(status: u16, message: &str) -> Self {
        let body = serde_json::to_value(ApiEnvelope::<()>::rejected(message)).unwrap_or_default();
        Self::json(status, body)
    }

    pub fn unauthorised() -> Self {
        Self::rejected(401, "unauthorised")
    }

    pub fn raw(status: u16, body: &str) -> Self {
        MockReply::Respond(HttpResponse {
            status,
            body: body.as_bytes().to_vec(),
        })
    }
}

#[derive(Debug)]
struct MockState {
    replies: Mutex<HashMap<String, VecDeque<MockReply>>>,
    requests: Mutex<Vec<HttpRequest>>,
    sent: watch::Sender<usize>,
    gate: Option<Semaphore>,
}

/// In-process [`Transport`]. Clones share the same script and recordings.
#[derive(Clone, Debug)]
pub struct MockTransport {
    state: Arc<MockState>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self::build(None)
    }

    /// A transport that holds every reply until [`MockTransport::release`] is called.
    pub fn gated() -> Self {
        Self::build(Some(Semaphore::new(0)))
    }

    fn build(gate: Option<Semaphore>) -> Self {
        let (sent, _) = watch::channel(0);
        Self {
            state: Arc::new(MockState {
                replies: Mutex::new(HashMap::new()),
                requests: Mutex::new(Vec::new()),
                sent,
                gate,
            }),
        }
    }

    /// Queues a reply for the next request to `path`.
    pub fn enqueue(&self, path: &str, reply: MockReply) -> &Self {
        self.state
            .replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(path.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    /// Lets `n` held replies through a gated transport.
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.state.gate {
            gate.add_permits(n);
        }
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.state
            .requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }

    pub fn request_count(&self) -> usize {
        *self.state.sent.borrow()
    }

    /// Resolves once at least `n` requests have been sent.
    pub async fn wait_for_requests(&self, n: usize) {
        let mut rx = self.state.sent.subscribe();
        // The sender lives as long as `self`, so the wait cannot fail.
        let _ = rx.wait_for(|count| *count >= n).await;
    }

    fn next_reply(&self, path: &str) -> Option<MockReply> {
        self.state
            .replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(path)
            .and_then(VecDeque::pop_front)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: HttpRequest) -> ClientResult<HttpResponse> {
        let path = request.path.clone();
        self.state
            .requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);
        self.state.sent.send_modify(|count| *count += 1);

        if let Some(gate) = &self.state.gate {
            match gate.acquire().await {
                Ok(permit) => permit.forget(),
                Err(_) => return Err(ClientError::Transport("mock gate closed".into())),
            }
        }

        match self.next_reply(&path) {
            Some(MockReply::Respond(response)) => Ok(response),
            Some(MockReply::Fail(message)) => Err(ClientError::Transport(message)),
            Some(MockReply::Hang) => std::future::pending().await,
            None => Ok(HttpResponse {
                status: 404,
                body: format!(r#"{{"success":false,"message":"no mock reply for {}"}}"#, path)
                    .into_bytes(),
            }),
        }
    }
}
