//! Nucleon - state-machine binding for remote HAL/JSON resources

pub mod binding;
pub mod config;
pub mod controls;
pub mod error;
pub mod event_log;
pub mod hal;
pub mod intercept;
pub mod selector;
pub mod state;
pub mod transport;
pub mod validate;

pub use binding::{Outcome, Pending, Resource, ResourceBinding};
pub use config::BindingConfig;
pub use controls::{ControlFlags, ControlScope};
pub use error::{FixSuggestion, NucleonError, Result};
pub use event_log::{Event, EventKind, EventLog};
pub use intercept::{FetchEvent, FetchListener};
pub use selector::ControlSelector;
pub use state::{BindingState, BusyState, Failure, FailureKind, IdleState, StateMatcher};
pub use transport::{HttpTransport, Method, MockTransport, Request, Response, Transport};
pub use validate::{SchemaValidator, Validator};
