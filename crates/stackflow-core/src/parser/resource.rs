//! resource node parsing

use crate::error::{Result, StackError};
use crate::model::{ResourceKind, ResourceSpec};
use kdl::{KdlNode, KdlValue};

/// Parse a `resource "name" kind="..." { ... }` node
pub fn parse_resource(node: &KdlNode) -> Result<ResourceSpec> {
    let name = first_argument(node)
        .and_then(|v| v.as_string())
        .ok_or_else(|| StackError::InvalidConfig("resource requires a name".to_string()))?
        .to_string();

    validate_name(&name)?;

    let kind_str = node
        .get("kind")
        .and_then(|v| v.as_string())
        .ok_or_else(|| {
            StackError::InvalidConfig(format!("resource '{}' requires kind=\"...\"", name))
        })?;

    let kind: ResourceKind = kind_str.parse().map_err(|kind| StackError::UnknownKind {
        resource: name.clone(),
        kind,
    })?;

    let mut spec = ResourceSpec::new(name, kind);

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "depends-on" | "depends_on" => {
                    for dep in positional(child).filter_map(|v| v.as_string()) {
                        spec = spec.with_dependency(dep);
                    }
                }
                "properties" => {
                    if let Some(props) = child.children() {
                        for prop in props.nodes() {
                            spec.properties
                                .insert(prop.name().value().to_string(), node_to_json(prop));
                        }
                    }
                }
                // Shorthand: properties written directly under the resource
                other => {
                    spec.properties.insert(other.to_string(), node_to_json(child));
                }
            }
        }
    }

    spec.add_implicit_dependencies();
    Ok(spec)
}

/// Convert a property node into a JSON value.
///
/// - children → object (recursively)
/// - one argument → scalar
/// - several arguments → array
/// - nothing → null
pub fn node_to_json(node: &KdlNode) -> serde_json::Value {
    if let Some(children) = node.children() {
        let mut map = serde_json::Map::new();
        for child in children.nodes() {
            map.insert(child.name().value().to_string(), node_to_json(child));
        }
        return serde_json::Value::Object(map);
    }

    let values: Vec<serde_json::Value> = positional(node).map(kdl_value_to_json).collect();
    match values.len() {
        0 => serde_json::Value::Null,
        1 => values.into_iter().next().unwrap_or(serde_json::Value::Null),
        _ => serde_json::Value::Array(values),
    }
}

pub fn kdl_value_to_json(value: &KdlValue) -> serde_json::Value {
    if let Some(s) = value.as_string() {
        serde_json::Value::String(s.to_string())
    } else if let Some(i) = value.as_integer() {
        i64::try_from(i)
            .map(serde_json::Value::from)
            .unwrap_or_else(|_| serde_json::Value::String(i.to_string()))
    } else if let Some(f) = value.as_float() {
        serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    } else if let Some(b) = value.as_bool() {
        serde_json::Value::Bool(b)
    } else {
        serde_json::Value::Null
    }
}

/// Positional (unnamed) arguments of a node
pub(crate) fn positional(node: &KdlNode) -> impl Iterator<Item = &KdlValue> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .map(|e| e.value())
}

pub(crate) fn first_argument(node: &KdlNode) -> Option<&KdlValue> {
    positional(node).next()
}

/// Logical names appear inside `${name.attribute}` references, so they are
/// limited to the characters the reference syntax accepts.
fn validate_name(name: &str) -> Result<()> {
    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(StackError::InvalidConfig(format!(
            "invalid resource name '{}': use letters, digits, '-' and '_'",
            name
        )));
    }
    Ok(())
}
