//! Mock transport for testing
//!
//! Answers from per-route queues without touching the network. A route can
//! also be deferred: the test holds a [`Responder`] and decides when (and in
//! which order) responses arrive, which is how response races are exercised.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use super::{Method, Request, Response, Transport};
use crate::error::{NucleonError, Result};

type Route = (Method, String);
type Answer = std::result::Result<Response, String>;

enum Reply {
    Ready(Answer),
    Deferred(oneshot::Receiver<Answer>),
}

/// Test-side handle for a deferred response
pub struct Responder {
    tx: oneshot::Sender<Answer>,
}

impl Responder {
    /// Resolve the deferred request with a response
    pub fn respond(self, response: Response) {
        // Receiver gone means the request was never sent; nothing to do
        let _ = self.tx.send(Ok(response));
    }

    /// Reject the deferred request as a transport failure
    pub fn fail(self, message: impl Into<String>) {
        let _ = self.tx.send(Err(message.into()));
    }
}

/// Mock transport that returns predefined responses per method + URL
#[derive(Clone, Default)]
pub struct MockTransport {
    /// Queue of replies per route (FIFO)
    routes: Arc<Mutex<HashMap<Route, VecDeque<Reply>>>>,
    /// Track all requests made (for assertions)
    requests: Arc<Mutex<Vec<Request>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for `method url`
    pub fn respond(&self, method: Method, url: impl Into<String>, response: Response) {
        self.push(method, url.into(), Reply::Ready(Ok(response)));
    }

    /// Queue a transport failure for `method url`
    pub fn fail(&self, method: Method, url: impl Into<String>, message: impl Into<String>) {
        self.push(method, url.into(), Reply::Ready(Err(message.into())));
    }

    /// Queue a response that the caller resolves later
    pub fn defer(&self, method: Method, url: impl Into<String>) -> Responder {
        let (tx, rx) = oneshot::channel();
        self.push(method, url.into(), Reply::Deferred(rx));
        Responder { tx }
    }

    fn push(&self, method: Method, url: String, reply: Reply) {
        self.routes
            .lock()
            .entry((method, url))
            .or_default()
            .push_back(reply);
    }

    /// Get all requests made to this transport
    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().clone()
    }

    /// Get the last request made
    pub fn last_request(&self) -> Option<Request> {
        self.requests.lock().last().cloned()
    }

    /// Number of queued replies not consumed yet
    pub fn pending_replies(&self) -> usize {
        self.routes.lock().values().map(VecDeque::len).sum()
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn name(&self) -> &str {
        "mock"
    }

    async fn send(&self, request: Request) -> Result<Response> {
        self.requests.lock().push(request.clone());

        let reply = self
            .routes
            .lock()
            .get_mut(&(request.method, request.url.clone()))
            .and_then(VecDeque::pop_front);

        let answer = match reply {
            Some(Reply::Ready(answer)) => answer,
            Some(Reply::Deferred(rx)) => rx
                .await
                .unwrap_or_else(|_| Err("deferred responder dropped".to_string())),
            None => Err(format!(
                "no mock response for {} {}",
                request.method, request.url
            )),
        };

        answer.map_err(NucleonError::Transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_mock_queued_responses() {
        let transport = MockTransport::new();
        transport.respond(Method::Get, "https://api/x/1", Response::json(200, &json!({"id": 1})));
        transport.respond(Method::Get, "https://api/x/1", Response::empty(404));

        let first = transport.send(Request::new(Method::Get, "https://api/x/1")).await.unwrap();
        let second = transport.send(Request::new(Method::Get, "https://api/x/1")).await.unwrap();
        let third = transport.send(Request::new(Method::Get, "https://api/x/1")).await;

        assert_eq!(first.status, 200);
        assert_eq!(second.status, 404);
        assert!(matches!(third, Err(NucleonError::Transport(_))));
    }

    #[tokio::test]
    async fn test_mock_routes_by_method() {
        let transport = MockTransport::new();
        transport.respond(Method::Delete, "https://api/x/1", Response::empty(204));

        let get = transport.send(Request::new(Method::Get, "https://api/x/1")).await;
        assert!(get.is_err());
        assert_eq!(transport.pending_replies(), 1);

        let delete = transport.send(Request::new(Method::Delete, "https://api/x/1")).await.unwrap();
        assert_eq!(delete.status, 204);
        assert_eq!(transport.pending_replies(), 0);
    }

    #[tokio::test]
    async fn test_mock_deferred_response() {
        let transport = MockTransport::new();
        let responder = transport.defer(Method::Get, "https://api/x/1");

        let send = transport.send(Request::new(Method::Get, "https://api/x/1"));
        responder.respond(Response::json(200, &json!({"id": 1})));

        assert_eq!(send.await.unwrap().status, 200);
    }

    #[tokio::test]
    async fn test_mock_deferred_failure_and_drop() {
        let transport = MockTransport::new();
        transport.defer(Method::Get, "https://api/dropped");
        let failing = transport.defer(Method::Get, "https://api/failing");
        failing.fail("connection reset");

        let dropped = transport.send(Request::new(Method::Get, "https://api/dropped")).await;
        let failed = transport.send(Request::new(Method::Get, "https://api/failing")).await;

        assert!(matches!(dropped, Err(NucleonError::Transport(m)) if m.contains("dropped")));
        assert!(matches!(failed, Err(NucleonError::Transport(m)) if m == "connection reset"));
    }

    #[tokio::test]
    async fn test_mock_records_requests() {
        let transport = MockTransport::new();
        let _ = transport.send(Request::new(Method::Get, "https://api/a")).await;
        let _ = transport
            .send(Request::new(Method::Post, "https://api/b").with_body(json!({"x": 1})))
            .await;

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].url, "https://api/a");
        assert_eq!(transport.last_request().unwrap().body, Some(json!({"x": 1})));
    }
}
