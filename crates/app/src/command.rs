//! Command protocol — uniform perform/validate contract.
//!
//! Consumers pre-validate a perform request to get field-level feedback,
//! then execute it. Execution re-parses defensively and rejects unknown
//! performs again: validation is advisory, not a gate the engine trusts.

use serde_json::{Map, Value};

use crate::handle::DeviceHandle;
use crate::ports::DeviceStore;

/// The one perform every device supports at the base level.
pub const PERFORM_SET: &str = "set";

/// Structural validation outcome. Empty lists mean the request is
/// well-formed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PerformValidation {
    /// Fields (or the perform itself) that are present but unusable.
    pub invalid: Vec<String>,
    /// Required fields that are missing.
    pub requires: Vec<String>,
}

impl PerformValidation {
    /// Whether the request may be executed.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.invalid.is_empty() && self.requires.is_empty()
    }
}

/// Validate a perform request against the base parameter schema.
#[must_use]
pub fn validate_perform(perform: &str, parameter: &str) -> PerformValidation {
    let mut result = PerformValidation::default();

    if perform != PERFORM_SET {
        result.invalid.push("perform".to_string());
        return result;
    }
    if parameter.is_empty() {
        result.requires.push("parameter".to_string());
        return result;
    }

    let params = match serde_json::from_str::<Value>(parameter) {
        Ok(Value::Object(map)) => map,
        Ok(_) | Err(_) => {
            result.invalid.push("parameter".to_string());
            Map::new()
        }
    };

    if params
        .get("name")
        .and_then(Value::as_str)
        .is_none_or(str::is_empty)
    {
        result.requires.push("name".to_string());
    }

    result
}

/// Execute a perform against a device. Returns whether the mutation was
/// carried out.
pub async fn perform<S: DeviceStore>(
    handle: &DeviceHandle<S>,
    perform: &str,
    parameter: &str,
) -> bool {
    if perform != PERFORM_SET {
        return false;
    }

    let params: Value = serde_json::from_str(parameter).unwrap_or(Value::Null);
    let Some(name) = params
        .get("name")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
    else {
        return false;
    };

    handle.set_name(name).await.is_ok()
}
