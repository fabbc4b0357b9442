//! Error types with fix suggestions
//!
//! Synchronous refusals are returned as [`NucleonError`]. Failures of the
//! remote I/O itself never surface here: they are captured in the binding's
//! `fail` state as a [`Failure`](crate::state::Failure).

use thiserror::Error;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

pub type Result<T, E = NucleonError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum NucleonError {
    // ─────────────────────────────────────────────────────────────
    // Binding refusals (NUCLEON-010 to NUCLEON-016)
    // ─────────────────────────────────────────────────────────────
    #[error("NUCLEON-010: Draft is invalid: {}", codes.join(", "))]
    Validation { codes: Vec<String> },

    #[error("NUCLEON-011: Nothing to submit (draft matches the last known resource)")]
    NothingToSubmit,

    #[error("NUCLEON-012: Operation not allowed while {state}")]
    Busy { state: String },

    #[error("NUCLEON-013: No target URL: set href or parent before submitting")]
    NoTarget,

    #[error("NUCLEON-014: No resource loaded")]
    NoResource,

    #[error("NUCLEON-015: Invalid href '{href}': {reason}")]
    InvalidHref { href: String, reason: String },

    #[error("NUCLEON-016: Edit must be a JSON object, got {value_type}")]
    InvalidEdit { value_type: String },

    // ─────────────────────────────────────────────────────────────
    // Selector errors (NUCLEON-020)
    // ─────────────────────────────────────────────────────────────
    #[error("NUCLEON-020: Invalid selector token '{token}': {reason}")]
    InvalidSelector { token: String, reason: String },

    // ─────────────────────────────────────────────────────────────
    // Ambient errors (NUCLEON-030 to NUCLEON-034)
    // ─────────────────────────────────────────────────────────────
    #[error("NUCLEON-030: Config error: {reason}")]
    Config { reason: String },

    #[error("NUCLEON-031: IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("NUCLEON-032: YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("NUCLEON-033: JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("NUCLEON-034: Transport error: {0}")]
    Transport(String),

    #[error("NUCLEON-035: Invalid JSON schema: {details}")]
    Schema { details: String },
}

impl NucleonError {
    /// Stable error code (e.g. `NUCLEON-010`)
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "NUCLEON-010",
            Self::NothingToSubmit => "NUCLEON-011",
            Self::Busy { .. } => "NUCLEON-012",
            Self::NoTarget => "NUCLEON-013",
            Self::NoResource => "NUCLEON-014",
            Self::InvalidHref { .. } => "NUCLEON-015",
            Self::InvalidEdit { .. } => "NUCLEON-016",
            Self::InvalidSelector { .. } => "NUCLEON-020",
            Self::Config { .. } => "NUCLEON-030",
            Self::Io(_) => "NUCLEON-031",
            Self::Yaml(_) => "NUCLEON-032",
            Self::Json(_) => "NUCLEON-033",
            Self::Transport(_) => "NUCLEON-034",
            Self::Schema { .. } => "NUCLEON-035",
        }
    }
}

impl FixSuggestion for NucleonError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            NucleonError::Validation { .. } => Some("Fix the reported fields, then submit again"),
            NucleonError::NothingToSubmit => Some("Call edit() before submit()"),
            NucleonError::Busy { .. } => {
                Some("Await the pending request before starting another operation")
            }
            NucleonError::NoTarget => {
                Some("Set parent to the collection URL to create a new resource")
            }
            NucleonError::NoResource => Some("Load a resource with set_href() first"),
            NucleonError::InvalidHref { .. } => {
                Some("Use an absolute URL, e.g. https://api.example.com/coupons/1")
            }
            NucleonError::InvalidEdit { .. } => {
                Some("Pass an object with the fields to change, e.g. {\"name\": \"A\"}")
            }
            NucleonError::InvalidSelector { .. } => {
                Some("Use space-separated paths like 'codes !codes:form:foo', '*' for one segment")
            }
            NucleonError::Config { .. } => Some("Check the config file syntax and field names"),
            NucleonError::Io(_) => Some("Check file path and permissions"),
            NucleonError::Yaml(_) => Some("Check YAML syntax: indentation and quoting"),
            NucleonError::Json(_) => Some("Ensure the value is valid JSON"),
            NucleonError::Transport(_) => Some("Check the URL is reachable and the server is up"),
            NucleonError::Schema { .. } => Some("Validate the schema against JSON Schema draft 7"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_carries_code() {
        let err = NucleonError::Validation {
            codes: vec!["name:v8n_required".to_string(), "amount:v8n_too_small".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.starts_with("NUCLEON-010"));
        assert!(msg.contains("name:v8n_required, amount:v8n_too_small"));
        assert_eq!(err.code(), "NUCLEON-010");
    }

    #[test]
    fn test_every_variant_has_suggestion() {
        let errors = vec![
            NucleonError::NothingToSubmit,
            NucleonError::Busy {
                state: "busy.fetching".into(),
            },
            NucleonError::NoTarget,
            NucleonError::NoResource,
            NucleonError::InvalidHref {
                href: "x".into(),
                reason: "relative".into(),
            },
            NucleonError::InvalidEdit {
                value_type: "array".into(),
            },
            NucleonError::InvalidSelector {
                token: "!".into(),
                reason: "empty".into(),
            },
            NucleonError::Transport("refused".into()),
        ];
        for err in errors {
            assert!(err.fix_suggestion().is_some(), "missing suggestion for {}", err.code());
        }
    }
}
