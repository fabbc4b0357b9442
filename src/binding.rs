//! # Resource Binding
//!
//! State machine wrapping the lifecycle of one remote resource.
//!
//! ```text
//! idle.template --set_href--> busy.fetching
//! idle.snapshot --set_href(new)--> busy.fetching
//! busy.fetching --success--> idle.snapshot
//! busy.fetching --error--> fail
//! fail --set_href/load--> busy.fetching
//! idle.* / fail --submit--> busy.updating
//! busy.updating --success--> idle.snapshot
//! busy.updating --error--> fail
//! idle.snapshot --delete--> busy.deleting
//! busy.deleting --success--> idle.template
//! busy.deleting --error--> fail
//! ```
//!
//! ## Driving requests
//!
//! Operations that do I/O move the state synchronously and return a
//! [`Pending`] future. The request goes out when the future is first polled
//! and its outcome is applied when it completes. Every request carries a
//! generation token; a response whose token is no longer current is
//! discarded, so a slow answer to a superseded request never overwrites a
//! newer one.
//!
//! ```rust,no_run
//! # async fn demo() -> nucleon::Result<()> {
//! use std::sync::Arc;
//! use nucleon::{MockTransport, ResourceBinding};
//!
//! let binding: ResourceBinding = ResourceBinding::new(Arc::new(MockTransport::new()));
//! binding.set_href(Some("https://api.example.com/coupons/1"))?.await;
//! binding.edit(serde_json::json!({"name": "Spring sale"}))?;
//! binding.submit()?.await;
//! # Ok(())
//! # }
//! ```
//!
//! I/O failures never surface as `Err`: they move the binding to `fail`.
//! `Err` is returned only when an operation is refused up front.
//!
//! Dropping a [`Pending`] before it completes (a timeout, a `select!`
//! branch, an aborted task) cancels its request. If it was still the
//! current one the binding moves to `fail` with the message `cancelled`
//! instead of staying busy.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::config::BindingConfig;
use crate::error::{NucleonError, Result};
use crate::event_log::{EventKind, EventLog};
use crate::hal;
use crate::intercept::{self, FetchListener};
use crate::state::{BindingState, BusyState, Failure, IdleState, StateMatcher};
use crate::transport::{Method, Request, Response, Transport};
use crate::validate::{self, Validator};

/// Types a binding can hold
pub trait Resource: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> Resource for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

/// What happened to a request once its [`Pending`] completed
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The response was applied; the binding is now in this state
    Applied(BindingState),
    /// A newer request (or disposal) superseded this one
    Discarded,
    /// No request was needed
    Noop,
}

type CancelGuard = Box<dyn FnOnce() + Send>;

/// In-flight request of a binding
#[must_use = "the request is sent only when the pending future is awaited or spawned"]
pub struct Pending {
    generation: Option<u64>,
    future: BoxFuture<'static, Outcome>,
    /// Runs when the future is dropped before completing
    on_cancel: Option<CancelGuard>,
}

impl Pending {
    fn ready(outcome: Outcome) -> Self {
        Self {
            generation: None,
            future: futures::future::ready(outcome).boxed(),
            on_cancel: None,
        }
    }

    /// Generation token of the request (`None` when nothing is sent)
    pub fn generation(&self) -> Option<u64> {
        self.generation
    }

    /// Drive the request on the tokio runtime
    pub fn spawn(self) -> tokio::task::JoinHandle<Outcome> {
        tokio::spawn(self)
    }
}

impl Future for Pending {
    type Output = Outcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Outcome> {
        let outcome = ready!(self.future.as_mut().poll(cx));
        self.on_cancel = None;
        Poll::Ready(outcome)
    }
}

impl Drop for Pending {
    fn drop(&mut self) {
        if let Some(cancel) = self.on_cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Pending {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pending")
            .field("generation", &self.generation)
            .finish()
    }
}

#[derive(Debug, Clone, Copy)]
enum Operation {
    Fetch,
    Save,
    Delete,
}

struct Inner<T> {
    state: BindingState,
    href: Option<String>,
    /// Collection URL new resources are POSTed to
    parent: Option<String>,
    /// Last server-confirmed resource
    snapshot: Option<T>,
    /// Full form with local edits; `None` when there are none
    draft: Option<Map<String, Value>>,
    generation: u64,
    disposed: bool,
}

impl<T: Serialize> Inner<T> {
    fn snapshot_value(&self) -> Value {
        match &self.snapshot {
            Some(resource) => serde_json::to_value(resource).unwrap_or_else(|e| {
                warn!(error = %e, "resource does not serialize to JSON");
                Value::Null
            }),
            None => Value::Object(Map::new()),
        }
    }

    fn form(&self) -> Value {
        match &self.draft {
            Some(draft) => Value::Object(draft.clone()),
            None => self.snapshot_value(),
        }
    }

    fn is_dirty(&self) -> bool {
        match &self.draft {
            Some(draft) => self.snapshot_value().as_object() != Some(draft),
            None => false,
        }
    }
}

struct Shared<T> {
    inner: Mutex<Inner<T>>,
    transport: Arc<dyn Transport>,
    config: BindingConfig,
    listeners: RwLock<Vec<Arc<dyn FetchListener>>>,
    validators: RwLock<Vec<Arc<dyn Validator>>>,
    events: EventLog,
    state_tx: watch::Sender<BindingState>,
}

impl<T> Shared<T> {
    fn transition(&self, inner: &mut Inner<T>, next: BindingState) {
        if inner.state == next {
            return;
        }
        let from = std::mem::replace(&mut inner.state, next.clone());
        debug!(from = %from, to = %next, "binding state changed");
        self.events.emit(EventKind::StateChanged {
            from: from.to_string(),
            to: next.to_string(),
        });
        self.state_tx.send_replace(next);
    }

    /// The pending future of `generation` was dropped unfinished
    fn cancel(&self, generation: u64) {
        let mut inner = self.inner.lock();
        if inner.disposed || inner.generation != generation {
            return;
        }
        inner.generation += 1;
        warn!(generation, "request dropped before it settled");
        self.events.emit(EventKind::RequestCancelled { generation });
        self.transition(&mut inner, BindingState::Fail(Failure::network("cancelled")));
    }

    fn dispose(&self) {
        let mut inner = self.inner.lock();
        if !inner.disposed {
            inner.disposed = true;
            inner.generation += 1;
            debug!(generation = inner.generation, "binding disposed");
        }
    }
}

impl<T: Resource> Shared<T> {
    fn errors(&self, inner: &Inner<T>) -> Vec<String> {
        validate::run_all(self.validators.read().iter(), &inner.form())
    }

    fn idle(&self, inner: &Inner<T>, idle: IdleState) -> BindingState {
        BindingState::Idle {
            idle,
            dirty: inner.is_dirty(),
            valid: self.errors(inner).is_empty(),
        }
    }

    /// Recompute dirty/valid flags after a local change
    fn resettle_idle(&self, inner: &mut Inner<T>) {
        if let BindingState::Idle { idle, .. } = inner.state {
            let next = self.idle(inner, idle);
            self.transition(inner, next);
        }
    }

    fn begin_request(
        &self,
        inner: &mut Inner<T>,
        busy: BusyState,
        method: Method,
        url: String,
        body: Option<Value>,
    ) -> (u64, Request) {
        inner.generation += 1;
        let generation = inner.generation;
        self.transition(inner, BindingState::Busy(busy));

        let mut request = Request::new(method, url).with_header("accept", &self.config.accept);
        for (name, value) in &self.config.headers {
            request = request.with_header(name, value);
        }
        if let Some(body) = body {
            request = request
                .with_header("content-type", &self.config.content_type)
                .with_body(body);
        }

        debug!(generation, method = %method, url = %request.url, "request issued");
        self.events.emit(EventKind::RequestIssued {
            generation,
            method,
            url: request.url.clone(),
        });
        (generation, request)
    }

    /// Offer the request to listeners, then build the future that sends it.
    /// Must be called without holding the inner lock.
    fn send(self: &Arc<Self>, generation: u64, operation: Operation, request: Request) -> Pending {
        let listeners: Vec<Arc<dyn FetchListener>> = self.listeners.read().clone();
        let event = intercept::dispatch(&listeners, request);

        if event.ignored() > 0 {
            warn!(
                generation,
                ignored = event.ignored(),
                "respond_with called more than once, keeping the first response"
            );
        }
        if event.is_intercepted() {
            self.events.emit(EventKind::RequestIntercepted {
                generation,
                url: event.request().url.clone(),
                ignored: event.ignored(),
            });
        }

        let (request, intercepted) = event.into_parts();
        let weak = Arc::downgrade(self);
        let on_cancel: CancelGuard = Box::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared.cancel(generation);
            }
        });
        let shared = Arc::clone(self);
        let transport = Arc::clone(&self.transport);
        let future = async move {
            let result = match intercepted {
                Some(response) => response.await,
                None => transport.send(request).await,
            };
            shared.settle(generation, operation, result)
        }
        .boxed();

        Pending {
            generation: Some(generation),
            future,
            on_cancel: Some(on_cancel),
        }
    }

    fn settle(&self, generation: u64, operation: Operation, result: Result<Response>) -> Outcome {
        let mut inner = self.inner.lock();
        if inner.disposed || inner.generation != generation {
            debug!(generation, current = inner.generation, "discarding stale response");
            self.events.emit(EventKind::ResponseDiscarded {
                generation,
                current: inner.generation,
            });
            return Outcome::Discarded;
        }

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                let message = match e {
                    NucleonError::Transport(message) => message,
                    other => other.to_string(),
                };
                warn!(generation, error = %message, "request failed");
                self.events.emit(EventKind::ResponseApplied {
                    generation,
                    status: None,
                });
                self.transition(&mut inner, BindingState::Fail(Failure::network(message)));
                return Outcome::Applied(inner.state.clone());
            }
        };

        self.events.emit(EventKind::ResponseApplied {
            generation,
            status: Some(response.status),
        });

        let next = if response.is_ok() {
            self.apply(&mut inner, operation, &response)
                .unwrap_or_else(BindingState::Fail)
        } else {
            warn!(generation, status = response.status, "request rejected");
            let body = match response.json_value() {
                Ok(body) => body,
                Err(_) => Some(Value::String(response.body.clone())),
            };
            BindingState::Fail(Failure::http(response.status, body))
        };

        self.transition(&mut inner, next);
        Outcome::Applied(inner.state.clone())
    }

    fn apply(
        &self,
        inner: &mut Inner<T>,
        operation: Operation,
        response: &Response,
    ) -> std::result::Result<BindingState, Failure> {
        let decode_failure = |e: NucleonError| Failure::decode(response.status, e.to_string());

        match operation {
            Operation::Fetch => {
                let value = response
                    .json_value()
                    .map_err(decode_failure)?
                    .ok_or_else(|| Failure::decode(response.status, "empty response body"))?;
                let resource: T = serde_json::from_value(value)
                    .map_err(|e| decode_failure(NucleonError::Json(e)))?;
                inner.snapshot = Some(resource);
                Ok(self.idle(inner, IdleState::Snapshot))
            }
            Operation::Save => {
                // Servers answering 204 keep what we sent
                let value = match response.json_value().map_err(decode_failure)? {
                    Some(value) => value,
                    None => inner.form(),
                };
                let resource: T = serde_json::from_value(value.clone())
                    .map_err(|e| decode_failure(NucleonError::Json(e)))?;
                if inner.href.is_none() {
                    let created = hal::self_href(&value).or_else(|| response.header("location"));
                    inner.href = match created.map(|h| resolve_href(inner.parent.as_deref(), h)) {
                        Some(Ok(url)) => Some(url),
                        Some(Err(e)) => {
                            warn!(error = %e, "created resource has no usable href");
                            None
                        }
                        None => None,
                    };
                }
                inner.snapshot = Some(resource);
                inner.draft = None;
                Ok(self.idle(inner, IdleState::Snapshot))
            }
            Operation::Delete => {
                inner.snapshot = None;
                inner.draft = None;
                inner.href = None;
                Ok(self.idle(inner, IdleState::Template))
            }
        }
    }
}

fn check_url(href: &str) -> Result<()> {
    url::Url::parse(href)
        .map(|_| ())
        .map_err(|e| NucleonError::InvalidHref {
            href: href.to_string(),
            reason: e.to_string(),
        })
}

/// Absolute URL for `href`, resolving relative references against `base`
fn resolve_href(base: Option<&str>, href: &str) -> Result<String> {
    let invalid = |reason: String| NucleonError::InvalidHref {
        href: href.to_string(),
        reason,
    };
    match url::Url::parse(href) {
        Ok(_) => Ok(href.to_string()),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let base = base.ok_or_else(|| invalid("relative URL without a base".to_string()))?;
            let base = url::Url::parse(base).map_err(|e| invalid(e.to_string()))?;
            base.join(href)
                .map(String::from)
                .map_err(|e| invalid(e.to_string()))
        }
        Err(e) => Err(invalid(e.to_string())),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Binding between one owner (a form, a card) and one remote resource
pub struct ResourceBinding<T = Value> {
    shared: Arc<Shared<T>>,
}

impl<T: Resource> ResourceBinding<T> {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_config(transport, BindingConfig::default())
    }

    pub fn with_config(transport: Arc<dyn Transport>, config: BindingConfig) -> Self {
        let (state_tx, _) = watch::channel(BindingState::template());
        let events = EventLog::with_capacity(config.max_events);
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    state: BindingState::template(),
                    href: None,
                    parent: None,
                    snapshot: None,
                    draft: None,
                    generation: 0,
                    disposed: false,
                }),
                transport,
                config,
                listeners: RwLock::new(Vec::new()),
                validators: RwLock::new(Vec::new()),
                events,
                state_tx,
            }),
        }
    }

    /// Create a binding already fetching `href`
    pub fn open(transport: Arc<dyn Transport>, href: &str) -> Result<(Self, Pending)> {
        let binding = Self::new(transport);
        let pending = binding.set_href(Some(href))?;
        Ok((binding, pending))
    }

    // ─────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────

    pub fn state(&self) -> BindingState {
        self.shared.inner.lock().state.clone()
    }

    /// `binding.in_state("busy")`, `binding.in_state("idle.snapshot.dirty")`,
    /// `binding.in_state(("busy", "fetching"))`
    pub fn in_state(&self, matcher: impl Into<StateMatcher>) -> bool {
        self.shared.inner.lock().state.matches(&matcher.into())
    }

    pub fn failure(&self) -> Option<Failure> {
        self.shared.inner.lock().state.failure().cloned()
    }

    pub fn href(&self) -> Option<String> {
        self.shared.inner.lock().href.clone()
    }

    pub fn parent(&self) -> Option<String> {
        self.shared.inner.lock().parent.clone()
    }

    /// Last server-confirmed resource
    pub fn data(&self) -> Option<T> {
        self.shared.inner.lock().snapshot.clone()
    }

    /// Pending local edits merged over the snapshot, if any
    pub fn draft(&self) -> Option<Value> {
        self.shared.inner.lock().draft.clone().map(Value::Object)
    }

    /// What a form should display: the draft, else the snapshot, else `{}`
    pub fn form(&self) -> Value {
        self.shared.inner.lock().form()
    }

    /// Current violation codes of the form
    pub fn errors(&self) -> Vec<String> {
        let inner = self.shared.inner.lock();
        self.shared.errors(&inner)
    }

    pub fn events(&self) -> &EventLog {
        &self.shared.events
    }

    /// Receive every state change
    pub fn subscribe(&self) -> watch::Receiver<BindingState> {
        self.shared.state_tx.subscribe()
    }

    // ─────────────────────────────────────────────────────────────
    // Registration
    // ─────────────────────────────────────────────────────────────

    /// Listen to (and optionally answer) every outbound request
    pub fn on_fetch<L: FetchListener + 'static>(&self, listener: L) {
        self.shared.listeners.write().push(Arc::new(listener));
    }

    pub fn add_validator<V: Validator + 'static>(&self, validator: V) {
        self.shared.validators.write().push(Arc::new(validator));
        let mut inner = self.shared.inner.lock();
        self.shared.resettle_idle(&mut inner);
    }

    /// Collection URL used when submitting a resource that has no href yet
    pub fn set_parent(&self, parent: Option<&str>) -> Result<()> {
        let parent = parent.map(str::trim).filter(|p| !p.is_empty());
        if let Some(url) = parent {
            check_url(url)?;
        }
        self.shared.inner.lock().parent = parent.map(str::to_string);
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────
    // Transitions
    // ─────────────────────────────────────────────────────────────

    /// Point the binding at another resource.
    ///
    /// `None` (or a blank string) clears the binding back to `idle.template`.
    /// Any request still in flight is superseded. Only an idle binding
    /// already at `href` is left alone.
    pub fn set_href(&self, href: Option<&str>) -> Result<Pending> {
        let href = href.map(str::trim).filter(|h| !h.is_empty());
        if let Some(url) = href {
            check_url(url)?;
        }

        let mut inner = self.shared.inner.lock();
        if inner.href.as_deref() == href && inner.state.is_idle() {
            return Ok(Pending::ready(Outcome::Noop));
        }

        inner.href = href.map(str::to_string);
        inner.snapshot = None;
        inner.draft = None;

        match href {
            None => {
                inner.generation += 1;
                let next = self.shared.idle(&inner, IdleState::Template);
                self.shared.transition(&mut inner, next);
                Ok(Pending::ready(Outcome::Applied(inner.state.clone())))
            }
            Some(url) => {
                let (generation, request) = self.shared.begin_request(
                    &mut inner,
                    BusyState::Fetching,
                    Method::Get,
                    url.to_string(),
                    None,
                );
                drop(inner);
                Ok(self.shared.send(generation, Operation::Fetch, request))
            }
        }
    }

    /// Fetch the current href again
    pub fn load(&self) -> Result<Pending> {
        let mut inner = self.shared.inner.lock();
        if inner.state.is_busy() {
            return Err(NucleonError::Busy {
                state: inner.state.to_string(),
            });
        }
        let url = inner.href.clone().ok_or(NucleonError::NoTarget)?;
        let (generation, request) =
            self.shared
                .begin_request(&mut inner, BusyState::Fetching, Method::Get, url, None);
        drop(inner);
        Ok(self.shared.send(generation, Operation::Fetch, request))
    }

    pub fn refresh(&self) -> Result<Pending> {
        self.load()
    }

    /// Merge top-level fields into the draft. Nested values are replaced.
    pub fn edit<P: Serialize>(&self, partial: P) -> Result<()> {
        let fields = match serde_json::to_value(partial)? {
            Value::Object(fields) => fields,
            other => {
                return Err(NucleonError::InvalidEdit {
                    value_type: json_type(&other).to_string(),
                })
            }
        };

        let mut inner = self.shared.inner.lock();
        if inner.state == BindingState::Busy(BusyState::Deleting) {
            debug!("edit ignored while deleting");
            return Ok(());
        }

        if inner.draft.is_none() {
            let base = match inner.snapshot_value() {
                Value::Object(map) => map,
                _ => Map::new(),
            };
            inner.draft = Some(base);
        }

        let names: Vec<String> = fields.keys().cloned().collect();
        if let Some(draft) = inner.draft.as_mut() {
            draft.extend(fields);
        }

        self.shared.events.emit(EventKind::Edited { fields: names });
        self.shared.resettle_idle(&mut inner);
        Ok(())
    }

    /// Send the draft: POST to `parent` when there is no href, PATCH otherwise
    pub fn submit(&self) -> Result<Pending> {
        let mut inner = self.shared.inner.lock();
        if inner.state.is_busy() {
            return Err(NucleonError::Busy {
                state: inner.state.to_string(),
            });
        }

        if inner.href.is_some() && !inner.is_dirty() {
            self.shared.events.emit(EventKind::SubmitRejected {
                reason: "clean".to_string(),
            });
            return Err(NucleonError::NothingToSubmit);
        }

        let codes = self.shared.errors(&inner);
        if !codes.is_empty() {
            debug!(codes = ?codes, "submit refused by validators");
            self.shared.events.emit(EventKind::SubmitRejected {
                reason: codes.join(" "),
            });
            return Err(NucleonError::Validation { codes });
        }

        let (method, url) = match inner.href.clone() {
            Some(href) => (Method::Patch, href),
            None => (
                Method::Post,
                inner.parent.clone().ok_or(NucleonError::NoTarget)?,
            ),
        };

        let form = inner.form();
        let (generation, request) = self.shared.begin_request(
            &mut inner,
            BusyState::Updating,
            method,
            url,
            Some(form),
        );
        drop(inner);
        Ok(self.shared.send(generation, Operation::Save, request))
    }

    /// Delete the loaded resource
    pub fn delete(&self) -> Result<Pending> {
        let mut inner = self.shared.inner.lock();
        if inner.state.is_busy() {
            return Err(NucleonError::Busy {
                state: inner.state.to_string(),
            });
        }

        let url = match (&inner.snapshot, &inner.href) {
            (Some(_), Some(href)) => href.clone(),
            _ => return Err(NucleonError::NoResource),
        };

        let (generation, request) =
            self.shared
                .begin_request(&mut inner, BusyState::Deleting, Method::Delete, url, None);
        drop(inner);
        Ok(self.shared.send(generation, Operation::Delete, request))
    }

    /// Discard local edits
    pub fn undo(&self) {
        let mut inner = self.shared.inner.lock();
        if inner.draft.take().is_some() {
            self.shared.events.emit(EventKind::Undone);
            self.shared.resettle_idle(&mut inner);
        }
    }

    /// Stop applying responses; in-flight requests resolve as discarded
    pub fn dispose(&self) {
        self.shared.dispose();
    }
}

impl<T> Drop for ResourceBinding<T> {
    fn drop(&mut self) {
        self.shared.dispose();
    }
}

impl<T> std::fmt::Debug for ResourceBinding<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.shared.inner.lock();
        f.debug_struct("ResourceBinding")
            .field("state", &inner.state.to_string())
            .field("href", &inner.href)
            .field("generation", &inner.generation)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use serde_json::json;

    const URL: &str = "https://api/x/1";

    fn binding() -> (ResourceBinding, MockTransport) {
        let transport = MockTransport::new();
        (ResourceBinding::new(Arc::new(transport.clone())), transport)
    }

    #[test]
    fn test_initial_state_is_template() {
        let (binding, _) = binding();
        assert!(binding.in_state("idle.template"));
        assert!(binding.in_state("idle.template.clean.valid"));
        assert_eq!(binding.form(), json!({}));
        assert!(binding.data().is_none());
    }

    #[test]
    fn test_set_href_moves_to_fetching_synchronously() {
        let (binding, _) = binding();
        let pending = binding.set_href(Some(URL)).unwrap();
        assert!(binding.in_state(("busy", "fetching")));
        assert_eq!(pending.generation(), Some(1));
    }

    #[test]
    fn test_dropping_pending_cancels_request() {
        let (binding, transport) = binding();
        drop(binding.set_href(Some(URL)).unwrap());

        assert_eq!(binding.failure().map(|f| f.message), Some("cancelled".to_string()));
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn test_resolve_href() {
        assert_eq!(resolve_href(Some("https://api/x"), "/x/9").unwrap(), "https://api/x/9");
        assert_eq!(resolve_href(Some("https://api/x/"), "9").unwrap(), "https://api/x/9");
        assert_eq!(resolve_href(None, URL).unwrap(), URL);
        assert!(matches!(resolve_href(None, "/x/9"), Err(NucleonError::InvalidHref { .. })));
    }

    #[test]
    fn test_invalid_href_leaves_state_untouched() {
        let (binding, _) = binding();
        let err = binding.set_href(Some("coupons/1")).unwrap_err();
        assert!(matches!(err, NucleonError::InvalidHref { .. }));
        assert!(binding.in_state("idle.template"));
        assert!(binding.href().is_none());
    }

    #[test]
    fn test_same_href_while_fetching_restarts() {
        let (binding, _) = binding();
        let first = binding.set_href(Some(URL)).unwrap();
        let second = binding.set_href(Some(URL)).unwrap();

        assert_eq!(first.generation(), Some(1));
        assert_eq!(second.generation(), Some(2));
        assert!(binding.in_state("busy.fetching"));
    }

    #[tokio::test]
    async fn test_same_href_is_noop() {
        let (binding, transport) = binding();
        transport.respond(Method::Get, URL, Response::json(200, &json!({"id": 1})));
        binding.set_href(Some(URL)).unwrap().await;

        let outcome = binding.set_href(Some(URL)).unwrap().await;
        assert_eq!(outcome, Outcome::Noop);
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_edit_ignored_while_deleting() {
        let (binding, transport) = binding();
        transport.respond(Method::Get, URL, Response::json(200, &json!({"id": 1})));
        binding.set_href(Some(URL)).unwrap().await;

        let responder = transport.defer(Method::Delete, URL);
        let pending = binding.delete().unwrap();
        binding.edit(json!({"name": "late"})).unwrap();
        assert!(binding.draft().is_none());

        responder.respond(Response::empty(204));
        pending.await;
        assert!(binding.in_state("idle.template"));
    }

    #[test]
    fn test_edit_rejects_non_objects() {
        let (binding, _) = binding();
        let err = binding.edit(json!(["a"])).unwrap_err();
        assert!(matches!(err, NucleonError::InvalidEdit { value_type } if value_type == "array"));
    }

    #[test]
    fn test_operations_refused_while_busy() {
        let (binding, _) = binding();
        let _pending = binding.set_href(Some(URL)).unwrap();

        assert!(matches!(binding.load(), Err(NucleonError::Busy { .. })));
        assert!(matches!(binding.submit(), Err(NucleonError::Busy { .. })));
        assert!(matches!(binding.delete(), Err(NucleonError::Busy { .. })));
    }

    #[test]
    fn test_load_without_href() {
        let (binding, _) = binding();
        assert!(matches!(binding.load(), Err(NucleonError::NoTarget)));
    }

    #[test]
    fn test_delete_without_resource() {
        let (binding, _) = binding();
        assert!(matches!(binding.delete(), Err(NucleonError::NoResource)));
    }

    #[tokio::test]
    async fn test_dispose_discards_in_flight_response() {
        let (binding, transport) = binding();
        transport.respond(Method::Get, URL, Response::json(200, &json!({"id": 1})));
        let pending = binding.set_href(Some(URL)).unwrap();

        binding.dispose();
        assert_eq!(pending.await, Outcome::Discarded);
        assert!(binding.data().is_none());
    }

    #[tokio::test]
    async fn test_drop_discards_in_flight_response() {
        let (binding, transport) = binding();
        transport.respond(Method::Get, URL, Response::json(200, &json!({"id": 1})));
        let pending = binding.set_href(Some(URL)).unwrap();

        drop(binding);
        assert_eq!(pending.await, Outcome::Discarded);
    }

    #[tokio::test]
    async fn test_subscribe_sees_latest_state() {
        let (binding, transport) = binding();
        let mut rx = binding.subscribe();
        transport.respond(Method::Get, URL, Response::json(200, &json!({"id": 1})));

        binding.set_href(Some(URL)).unwrap().await;

        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().matches(&"idle.snapshot".into()));
    }
}
