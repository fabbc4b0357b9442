//! Fetch interception
//!
//! Before a binding sends a request it hands a [`FetchEvent`] to every
//! registered [`FetchListener`]. A listener may inspect the request and
//! answer it with [`FetchEvent::respond_with`]; the binding then awaits that
//! future instead of calling its transport. The first answer wins.
//!
//! ```rust
//! use nucleon::intercept::FetchEvent;
//! use nucleon::transport::{Method, Request, Response};
//!
//! let mut event = FetchEvent::new(Request::new(Method::Get, "https://api/x/1"));
//! assert!(event.respond_with(async { Ok(Response::empty(204)) }));
//! assert!(!event.respond_with(async { Ok(Response::empty(500)) }));
//! assert!(event.is_intercepted());
//! ```

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::error::Result;
use crate::transport::{Request, Response};

/// Future answering an intercepted request
pub type ResponseFuture = BoxFuture<'static, Result<Response>>;

/// A request about to be sent
pub struct FetchEvent {
    request: Request,
    response: Option<ResponseFuture>,
    ignored: usize,
}

impl FetchEvent {
    pub fn new(request: Request) -> Self {
        Self {
            request,
            response: None,
            ignored: 0,
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Answer the request. Returns `false` (and drops `response`) if another
    /// listener already answered.
    pub fn respond_with<F>(&mut self, response: F) -> bool
    where
        F: Future<Output = Result<Response>> + Send + 'static,
    {
        if self.response.is_some() {
            self.ignored += 1;
            return false;
        }
        self.response = Some(response.boxed());
        true
    }

    pub fn is_intercepted(&self) -> bool {
        self.response.is_some()
    }

    /// How many `respond_with` calls were ignored
    pub fn ignored(&self) -> usize {
        self.ignored
    }

    pub(crate) fn into_parts(self) -> (Request, Option<ResponseFuture>) {
        (self.request, self.response)
    }
}

impl std::fmt::Debug for FetchEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchEvent")
            .field("request", &self.request)
            .field("intercepted", &self.is_intercepted())
            .finish()
    }
}

/// Observer of outbound requests
pub trait FetchListener: Send + Sync {
    fn on_fetch(&self, event: &mut FetchEvent);
}

impl<F> FetchListener for F
where
    F: Fn(&mut FetchEvent) + Send + Sync,
{
    fn on_fetch(&self, event: &mut FetchEvent) {
        self(event)
    }
}

/// Dispatch `request` to `listeners` in registration order
pub fn dispatch(listeners: &[Arc<dyn FetchListener>], request: Request) -> FetchEvent {
    let mut event = FetchEvent::new(request);
    for listener in listeners {
        listener.on_fetch(&mut event);
    }
    event
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Method;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_first_respond_with_wins() {
        let first: Arc<dyn FetchListener> = Arc::new(|event: &mut FetchEvent| {
            event.respond_with(async { Ok(Response::empty(201)) });
        });
        let second: Arc<dyn FetchListener> = Arc::new(|event: &mut FetchEvent| {
            event.respond_with(async { Ok(Response::empty(500)) });
        });

        let event = dispatch(&[first, second], Request::new(Method::Post, "https://api/x"));
        assert_eq!(event.ignored(), 1);

        let (_, response) = event.into_parts();
        assert_eq!(response.unwrap().await.unwrap().status, 201);
    }

    #[test]
    fn test_every_listener_sees_request() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let listener: Arc<dyn FetchListener> = Arc::new(move |event: &mut FetchEvent| {
            assert_eq!(event.request().url, "https://api/x");
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let event = dispatch(
            &[Arc::clone(&listener), listener],
            Request::new(Method::Get, "https://api/x"),
        );

        assert_eq!(seen.load(Ordering::SeqCst), 2);
        assert!(!event.is_intercepted());
    }
}
