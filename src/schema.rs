//! JSON Schema (draft 4) validation that fills in declared defaults.
//!
//! Before an instance is checked, every property that the schema declares with
//! a `default` and that is absent from the instance is set to that default.
//! Defaults are applied wherever a `properties` keyword applies to an object,
//! including nested objects and array items, so optional properties become
//! effectively present while caller-supplied values are still validated
//! strictly.

use jsonschema::{Draft, Validator};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("{message}")]
    Invalid {
        /// JSON pointer to the offending value, empty for the root.
        path: String,
        message: String,
    },

    #[error("invalid schema: {0}")]
    Schema(String),
}

impl ValidationError {
    pub fn message(&self) -> String {
        self.to_string()
    }
}

/// Injects the defaults declared in `schema` into `instance`, then validates it.
pub fn validate(instance: &mut Value, schema: &Value) -> Result<(), ValidationError> {
    inject_defaults(instance, schema);
    check(instance, schema)
}

/// Validates `instance` against `schema` without modifying it. Reports the
/// first violation found.
pub fn check(instance: &Value, schema: &Value) -> Result<(), ValidationError> {
    let validator = compile(schema)?;
    if let Some(error) = validator.iter_errors(instance).next() {
        let path = error.instance_path.to_string();
        let message = if path.is_empty() {
            error.to_string()
        } else {
            format!("{} at {}", error, path)
        };
        return Err(ValidationError::Invalid { path, message });
    }
    Ok(())
}

fn compile(schema: &Value) -> Result<Validator, ValidationError> {
    Validator::options()
        .with_draft(Draft::Draft4)
        .should_validate_formats(true)
        .build(schema)
        .map_err(|e| ValidationError::Schema(e.to_string()))
}

fn inject_defaults(instance: &mut Value, schema: &Value) {
    match *instance {
        Value::Object(ref mut object) => {
            let properties = match schema.get("properties").and_then(Value::as_object) {
                Some(properties) => properties,
                None => return,
            };

            for (name, subschema) in properties {
                if let Some(default) = subschema.get("default") {
                    if !object.contains_key(name) {
                        object.insert(name.clone(), default.clone());
                    }
                }
                if let Some(value) = object.get_mut(name) {
                    inject_defaults(value, subschema);
                }
            }
        },
        Value::Array(ref mut items) => {
            if let Some(item_schema) = schema.get("items").filter(|s| s.is_object()) {
                for item in items {
                    inject_defaults(item, item_schema);
                }
            }
        },
        _ => (),
    }
}
