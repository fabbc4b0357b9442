//! Binding state model
//!
//! One [`BindingState`] is active at a time. Idle states carry two
//! orthogonal flags (clean/dirty, valid/invalid) so callers can match on
//! `idle.snapshot.dirty` or `idle.template.invalid`.
//!
//! Matchers accept the forms used by rendering code:
//!
//! ```rust
//! use nucleon::state::{BindingState, BusyState, StateMatcher};
//!
//! let state = BindingState::Busy(BusyState::Fetching);
//! assert!(state.matches(&StateMatcher::parse("busy")));
//! assert!(state.matches(&StateMatcher::parse("busy.fetching")));
//! assert!(!state.matches(&StateMatcher::parse("idle")));
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Whether an idle binding holds a server-confirmed resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdleState {
    /// No resource loaded (blank slate or new-entity form)
    Template,
    /// Resource loaded successfully
    Snapshot,
}

/// Which request is in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusyState {
    Fetching,
    Updating,
    Deleting,
}

/// Why the last operation failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Transport rejected the request (connectivity)
    Network,
    /// Server answered with a non-2xx status
    Http,
    /// Response body could not be decoded into the resource type
    Decode,
}

/// Error descriptor held by the `fail` state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: FailureKind,
    /// HTTP status, when the server answered
    pub status: Option<u16>,
    pub message: String,
    /// Response body, when the server sent one
    pub body: Option<Value>,
}

impl Failure {
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Network,
            status: None,
            message: message.into(),
            body: None,
        }
    }

    pub fn http(status: u16, body: Option<Value>) -> Self {
        let message = body
            .as_ref()
            .and_then(|b| b.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("HTTP {}", status));
        Self {
            kind: FailureKind::Http,
            status: Some(status),
            message,
            body,
        }
    }

    pub fn decode(status: u16, message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Decode,
            status: Some(status),
            message: message.into(),
            body: None,
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} ({})", self.message, status),
            None => f.write_str(&self.message),
        }
    }
}

/// The single active state of a resource binding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum BindingState {
    Idle {
        idle: IdleState,
        dirty: bool,
        valid: bool,
    },
    Busy(BusyState),
    Fail(Failure),
}

impl BindingState {
    /// Blank template: clean and valid
    pub fn template() -> Self {
        Self::Idle {
            idle: IdleState::Template,
            dirty: false,
            valid: true,
        }
    }

    pub fn snapshot() -> Self {
        Self::Idle {
            idle: IdleState::Snapshot,
            dirty: false,
            valid: true,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle { .. })
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Busy(_))
    }

    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Self::Fail(failure) => Some(failure),
            _ => None,
        }
    }

    /// Dotted path of the state (`idle.snapshot.dirty.valid`, `busy.fetching`, `fail`)
    pub fn segments(&self) -> Vec<&'static str> {
        match self {
            Self::Idle { idle, dirty, valid } => vec![
                "idle",
                match idle {
                    IdleState::Template => "template",
                    IdleState::Snapshot => "snapshot",
                },
                if *dirty { "dirty" } else { "clean" },
                if *valid { "valid" } else { "invalid" },
            ],
            Self::Busy(busy) => vec![
                "busy",
                match busy {
                    BusyState::Fetching => "fetching",
                    BusyState::Updating => "updating",
                    BusyState::Deleting => "deleting",
                },
            ],
            Self::Fail(_) => vec!["fail"],
        }
    }

    /// Check the state against a matcher
    pub fn matches(&self, matcher: &StateMatcher) -> bool {
        let segments = self.segments();
        let (top, rest) = match segments.split_first() {
            Some(split) => split,
            None => return false,
        };
        match matcher {
            StateMatcher::Top(name) => name == top,
            StateMatcher::Nested(name, inner) => name == top && matches_rest(rest, inner),
        }
    }
}

// Idle sub-flags are orthogonal, so each matcher step may skip segments
// as long as the order is kept.
fn matches_rest(rest: &[&str], matcher: &StateMatcher) -> bool {
    match matcher {
        StateMatcher::Top(name) => rest.iter().any(|s| s == name),
        StateMatcher::Nested(name, inner) => match rest.iter().position(|s| s == name) {
            Some(idx) => matches_rest(&rest[idx + 1..], inner),
            None => false,
        },
    }
}

impl Default for BindingState {
    fn default() -> Self {
        Self::template()
    }
}

impl fmt::Display for BindingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments().join("."))
    }
}

/// Predicate over [`BindingState`]
///
/// `Top("busy")` matches any busy state; `Nested("idle", Top("snapshot"))`
/// matches `idle.snapshot` whatever its sub-flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateMatcher {
    Top(String),
    Nested(String, Box<StateMatcher>),
}

impl StateMatcher {
    /// Parse a dotted matcher (`"idle"`, `"busy.fetching"`, `"idle.snapshot.dirty"`)
    pub fn parse(raw: &str) -> Self {
        let mut parts: Vec<&str> = raw.split('.').filter(|p| !p.is_empty()).collect();
        let last = parts.pop().unwrap_or_default();
        let mut matcher = Self::Top(last.to_string());
        while let Some(part) = parts.pop() {
            matcher = Self::Nested(part.to_string(), Box::new(matcher));
        }
        matcher
    }

    pub fn nested(top: impl Into<String>, inner: impl Into<StateMatcher>) -> Self {
        Self::Nested(top.into(), Box::new(inner.into()))
    }
}

impl From<&str> for StateMatcher {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl From<String> for StateMatcher {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<(&str, &str)> for StateMatcher {
    fn from((top, inner): (&str, &str)) -> Self {
        Self::nested(top, inner)
    }
}
