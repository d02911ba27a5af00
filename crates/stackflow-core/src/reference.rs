//! `${resource.attribute}` references between resources
//!
//! References are written inside string property values and resolved at
//! apply time from the attributes the control plane returned for
//! already-materialized resources.

use crate::error::{Result, StackError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

static REFERENCE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z0-9_-]+)\.([A-Za-z0-9_]+)\}").expect("valid reference pattern")
});

/// A reference to an attribute of another resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    pub resource: String,
    pub attribute: String,
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${{{}.{}}}", self.resource, self.attribute)
    }
}

/// Find every reference in a string, in order of appearance
pub fn find_references(s: &str) -> Vec<Reference> {
    REFERENCE_PATTERN
        .captures_iter(s)
        .map(|c| Reference {
            resource: c[1].to_string(),
            attribute: c[2].to_string(),
        })
        .collect()
}

/// If `s` is exactly one reference and nothing else, return it
pub fn as_whole_reference(s: &str) -> Option<Reference> {
    let caps = REFERENCE_PATTERN.captures(s)?;
    let whole = caps.get(0)?;
    if whole.start() == 0 && whole.end() == s.len() {
        Some(Reference {
            resource: caps[1].to_string(),
            attribute: caps[2].to_string(),
        })
    } else {
        None
    }
}

/// Collect references from a property value, recursing into lists and maps
pub fn collect_references(value: &serde_json::Value, out: &mut Vec<Reference>) {
    match value {
        serde_json::Value::String(s) => {
            for r in find_references(s) {
                if !out.contains(&r) {
                    out.push(r);
                }
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                collect_references(item, out);
            }
        }
        serde_json::Value::Object(map) => {
            for item in map.values() {
                collect_references(item, out);
            }
        }
        _ => {}
    }
}

/// Substitute references in a property value.
///
/// `lookup` returns the attribute value of a materialized resource. A string
/// that is a single reference takes the attribute's JSON value verbatim;
/// references embedded in longer strings are substituted textually.
pub fn resolve_value<F>(owner: &str, value: &serde_json::Value, lookup: &F) -> Result<serde_json::Value>
where
    F: Fn(&Reference) -> Option<serde_json::Value>,
{
    match value {
        serde_json::Value::String(s) => {
            if let Some(r) = as_whole_reference(s) {
                return lookup(&r).ok_or_else(|| StackError::UnresolvedReference {
                    resource: owner.to_string(),
                    reference: r.to_string(),
                });
            }

            let mut unresolved = None;
            let replaced = REFERENCE_PATTERN.replace_all(s, |caps: &regex::Captures<'_>| {
                let r = Reference {
                    resource: caps[1].to_string(),
                    attribute: caps[2].to_string(),
                };
                match lookup(&r) {
                    Some(serde_json::Value::String(v)) => v,
                    Some(other) => other.to_string(),
                    None => {
                        unresolved.get_or_insert_with(|| r.to_string());
                        String::new()
                    }
                }
            });

            match unresolved {
                Some(reference) => Err(StackError::UnresolvedReference {
                    resource: owner.to_string(),
                    reference,
                }),
                None => Ok(serde_json::Value::String(replaced.into_owned())),
            }
        }
        serde_json::Value::Array(items) => items
            .iter()
            .map(|item| resolve_value(owner, item, lookup))
            .collect::<Result<Vec<_>>>()
            .map(serde_json::Value::Array),
        serde_json::Value::Object(map) => {
            let mut resolved = serde_json::Map::new();
            for (key, item) in map {
                resolved.insert(key.clone(), resolve_value(owner, item, lookup)?);
            }
            Ok(serde_json::Value::Object(resolved))
        }
        other => Ok(other.clone()),
    }
}
