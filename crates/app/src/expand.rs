//! Addressing & expansion language.
//!
//! Resolves `.[` … `].` placeholders in message templates against live
//! entities: `.[3.status].` reads the status of device 3, `.[.name].`
//! reads the caller-supplied default entity, `.[device/3.temperature].`
//! goes through the pluggable actor directory. Unresolvable fragments are
//! preserved verbatim — templates degrade, they do not error.

use std::collections::HashMap;

use serde_json::Value;

use hearth_domain::device::{SharedDevice, with_device};

/// Resolver for one actor category (`device`, `place`, …), mapping a
/// sub-id to an entity.
pub type ActorLookup = Box<dyn Fn(&str) -> Option<SharedDevice> + Send + Sync>;

/// Pluggable per-category entity lookups, populated by each actor
/// collaborator at startup.
#[derive(Default)]
pub struct ActorDirectory {
    categories: HashMap<String, ActorLookup>,
}

impl ActorDirectory {
    /// Register the resolver for `category`.
    pub fn register(&mut self, category: impl Into<String>, lookup: ActorLookup) {
        self.categories.insert(category.into(), lookup);
    }

    /// Resolve `category/sub_id`.
    #[must_use]
    pub fn lookup(&self, category: &str, sub_id: &str) -> Option<SharedDevice> {
        self.categories.get(category).and_then(|lookup| lookup(sub_id))
    }
}

/// Expand every `.[` … `].` occurrence in `line`.
///
/// The bracket head picks the entity: empty → `default`, containing `/` →
/// actor directory, anything else → `resolve` (the registry). Remaining
/// dot-separated segments read fields in order — `name` and `status` are
/// entity-level, everything else indexes the `info` bag — stopping at the
/// first segment that cannot be found. An unresolvable entity leaves the
/// whole fragment untouched and the scan resumes after it, so malformed
/// input cannot loop.
#[must_use]
pub fn expand(
    line: &str,
    default: Option<&SharedDevice>,
    actors: &ActorDirectory,
    resolve: &dyn Fn(&str) -> Option<SharedDevice>,
) -> String {
    let mut result = String::new();
    let mut rest = line;

    while let Some(start) = rest.find(".[") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let Some(end) = after.find("].") else {
            result.push_str(".[");
            rest = after;
            continue;
        };
        let expression = &after[..end];
        rest = &after[end + 2..];

        match resolve_expression(expression, default, actors, resolve) {
            Some(text) => result.push_str(&text),
            None => {
                result.push_str(".[");
                result.push_str(expression);
                result.push_str("].");
            }
        }
    }

    result.push_str(rest);
    result
}

fn resolve_expression(
    expression: &str,
    default: Option<&SharedDevice>,
    actors: &ActorDirectory,
    resolve: &dyn Fn(&str) -> Option<SharedDevice>,
) -> Option<String> {
    let mut parts = expression.split('.');
    let head = parts.next()?;

    let entity = if head.is_empty() {
        default?.clone()
    } else if let Some((category, sub_id)) = head.split_once('/') {
        actors.lookup(category, sub_id)?
    } else {
        resolve(head)?
    };

    Some(with_device(&entity, |d| {
        let core = d.core();
        let mut field = String::new();
        for part in parts {
            if part == "name" {
                field = core.name.clone();
            } else if part == "status" {
                field = core.status.to_string();
            } else if let Some(value) = core.info.get(part) {
                field = value_text(value);
            } else {
                break;
            }
        }
        field
    }))
}

fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
