//! Draft validation
//!
//! Validators look at the whole form and report violation codes such as
//! `name:v8n_required`. Codes are data, not errors: the binding exposes them
//! through `errors()` and refuses to submit while any are present.

use serde_json::Value;

use crate::error::{NucleonError, Result};

/// Checks a form and returns its violation codes (empty when valid)
pub trait Validator: Send + Sync {
    fn validate(&self, form: &Value) -> Vec<String>;
}

/// Closures return one code when the form is invalid
impl<F> Validator for F
where
    F: Fn(&Value) -> Option<String> + Send + Sync,
{
    fn validate(&self, form: &Value) -> Vec<String> {
        self(form).into_iter().collect()
    }
}

/// Validator backed by a JSON Schema
///
/// Each schema error becomes `<control path>:v8n_schema`, where the control
/// path is the failing instance location with `/` replaced by `:`
/// (`form` for the root).
pub struct SchemaValidator {
    validator: jsonschema::Validator,
}

impl SchemaValidator {
    pub fn new(schema: &Value) -> Result<Self> {
        let validator = jsonschema::validator_for(schema).map_err(|e| NucleonError::Schema {
            details: e.to_string(),
        })?;
        Ok(Self { validator })
    }
}

impl Validator for SchemaValidator {
    fn validate(&self, form: &Value) -> Vec<String> {
        let mut codes: Vec<String> = Vec::new();
        for error in self.validator.iter_errors(form) {
            let code = format!(
                "{}:v8n_schema",
                pointer_to_control_path(&error.instance_path.to_string())
            );
            if !codes.contains(&code) {
                codes.push(code);
            }
        }
        codes
    }
}

fn pointer_to_control_path(pointer: &str) -> String {
    let path = pointer.trim_start_matches('/').replace('/', ":");
    if path.is_empty() {
        "form".to_string()
    } else {
        path
    }
}

/// Run every validator and concatenate their codes
pub fn run_all<'a, I>(validators: I, form: &Value) -> Vec<String>
where
    I: IntoIterator<Item = &'a std::sync::Arc<dyn Validator>>,
{
    validators
        .into_iter()
        .flat_map(|v| v.validate(form))
        .collect()
}
