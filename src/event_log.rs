//! Binding event log
//!
//! Audit trail of what a binding did:
//! - Event: envelope with id + timestamp + kind
//! - EventKind: state moves, requests, and discarded responses
//! - EventLog: thread-safe, shared between a binding and its pending requests
//!
//! A binding lives as long as its owner, so its log is bounded: once
//! `capacity` events are held the oldest is dropped. Ids keep counting.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::transport::Method;

/// Single entry in a binding's log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic sequence ID (for ordering)
    pub id: u64,
    /// Time since the binding was created (ms)
    pub timestamp_ms: u64,
    /// Event type and data
    pub kind: EventKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    // ═══════════════════════════════════════════
    // STATE
    // ═══════════════════════════════════════════
    StateChanged {
        from: String,
        to: String,
    },
    Edited {
        fields: Vec<String>,
    },
    Undone,
    SubmitRejected {
        reason: String,
    },

    // ═══════════════════════════════════════════
    // I/O
    // ═══════════════════════════════════════════
    RequestIssued {
        generation: u64,
        method: Method,
        url: String,
    },
    RequestIntercepted {
        generation: u64,
        url: String,
        /// Extra `respond_with` calls that were ignored
        ignored: usize,
    },
    ResponseApplied {
        generation: u64,
        status: Option<u16>,
    },
    /// A superseded request answered after a newer one started
    ResponseDiscarded {
        generation: u64,
        current: u64,
    },
    /// The pending future was dropped before the request settled
    RequestCancelled {
        generation: u64,
    },
}

impl EventKind {
    /// Extract the generation token if the event belongs to a request
    pub fn generation(&self) -> Option<u64> {
        match self {
            Self::RequestIssued { generation, .. }
            | Self::RequestIntercepted { generation, .. }
            | Self::ResponseApplied { generation, .. }
            | Self::ResponseDiscarded { generation, .. }
            | Self::RequestCancelled { generation } => Some(*generation),
            Self::StateChanged { .. }
            | Self::Edited { .. }
            | Self::Undone
            | Self::SubmitRejected { .. } => None,
        }
    }
}

/// Thread-safe event log
#[derive(Clone)]
pub struct EventLog {
    events: Arc<RwLock<VecDeque<Event>>>,
    /// Max events kept (`0` = unbounded)
    capacity: usize,
    start_time: Instant,
    next_id: Arc<AtomicU64>,
}

impl EventLog {
    /// Unbounded log
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Log keeping at most `capacity` events (`0` = unbounded)
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Arc::new(RwLock::new(VecDeque::new())),
            capacity,
            start_time: Instant::now(),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Emit an event (thread-safe, returns event ID)
    pub fn emit(&self, kind: EventKind) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let event = Event {
            id,
            timestamp_ms: self.start_time.elapsed().as_millis() as u64,
            kind,
        };

        let mut events = self.events.write();
        if self.capacity > 0 && events.len() >= self.capacity {
            events.pop_front();
        }
        events.push_back(event);
        id
    }

    /// Get all events (cloned)
    pub fn events(&self) -> Vec<Event> {
        self.events.read().iter().cloned().collect()
    }

    /// Remove and return every held event
    pub fn drain(&self) -> Vec<Event> {
        self.events.write().drain(..).collect()
    }

    pub fn clear(&self) {
        self.events.write().clear();
    }

    /// Events belonging to one request generation
    pub fn filter_generation(&self, generation: u64) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| e.kind.generation() == Some(generation))
            .collect()
    }

    /// Sequence of states the binding went through (`to` of each change)
    pub fn state_trail(&self) -> Vec<String> {
        self.events
            .read()
            .iter()
            .filter_map(|e| match &e.kind {
                EventKind::StateChanged { to, .. } => Some(to.clone()),
                _ => None,
            })
            .collect()
    }

    /// Serialize to JSON for persistence/debugging
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self.events()).unwrap_or(Value::Null)
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_monotonic() {
        let log = EventLog::new();
        let a = log.emit(EventKind::Undone);
        let b = log.emit(EventKind::Edited {
            fields: vec!["name".into()],
        });
        assert_eq!((a, b), (0, 1));
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_filter_generation() {
        let log = EventLog::new();
        log.emit(EventKind::RequestIssued {
            generation: 1,
            method: Method::Get,
            url: "https://api/x/1".into(),
        });
        log.emit(EventKind::RequestIssued {
            generation: 2,
            method: Method::Get,
            url: "https://api/x/2".into(),
        });
        log.emit(EventKind::ResponseDiscarded {
            generation: 1,
            current: 2,
        });

        let first = log.filter_generation(1);
        assert_eq!(first.len(), 2);
        assert!(matches!(
            first[1].kind,
            EventKind::ResponseDiscarded { current: 2, .. }
        ));
    }

    #[test]
    fn test_state_trail_and_json() {
        let log = EventLog::new();
        log.emit(EventKind::StateChanged {
            from: "idle.template.clean.valid".into(),
            to: "busy.fetching".into(),
        });
        log.emit(EventKind::Undone);
        log.emit(EventKind::StateChanged {
            from: "busy.fetching".into(),
            to: "fail".into(),
        });

        assert_eq!(log.state_trail(), vec!["busy.fetching", "fail"]);

        let json = log.to_json();
        assert_eq!(json[0]["kind"]["type"], "state_changed");
        assert_eq!(json[1]["kind"]["type"], "undone");
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let log = EventLog::with_capacity(3);
        for _ in 0..10 {
            log.emit(EventKind::Undone);
        }

        let events = log.events();
        assert_eq!(log.len(), 3);
        assert_eq!(events.iter().map(|e| e.id).collect::<Vec<_>>(), vec![7, 8, 9]);
    }

    #[test]
    fn test_drain_and_clear() {
        let log = EventLog::new();
        log.emit(EventKind::Undone);
        log.emit(EventKind::RequestCancelled { generation: 4 });

        let drained = log.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[1].kind.generation(), Some(4));
        assert!(log.is_empty());

        log.emit(EventKind::Undone);
        log.clear();
        assert!(log.is_empty());
        assert_eq!(log.emit(EventKind::Undone), 3);
    }
}
