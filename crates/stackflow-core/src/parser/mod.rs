//! KDL parser
//!
//! Parses stack files into a [`StackTemplate`]. Node-specific parsing lives
//! in submodules.

mod resource;

pub use resource::{kdl_value_to_json, node_to_json, parse_resource};

use crate::error::Result;
use crate::model::StackTemplate;
use kdl::{KdlDocument, KdlNode};
use resource::first_argument;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Parse a stack file from disk without template rendering
pub fn parse_kdl_file<P: AsRef<Path>>(path: P) -> Result<StackTemplate> {
    let content = fs::read_to_string(path.as_ref())?;
    let name = path
        .as_ref()
        .file_stem()
        .and_then(|n| n.to_str())
        .unwrap_or("unnamed")
        .to_string();
    parse_kdl_string(&content, name)
}

/// Parse stack file contents
pub fn parse_kdl_string(content: &str, default_name: String) -> Result<StackTemplate> {
    let doc: KdlDocument = content.parse()?;

    let mut template = StackTemplate::new(default_name);

    for node in doc.nodes() {
        match node.name().value() {
            "stack" | "project" => parse_stack_settings(node, &mut template),
            "variables" => {
                template.variables.extend(parse_variables(node));
            }
            "resource" => {
                template.resources.push(parse_resource(node)?);
            }
            other => {
                tracing::debug!(node = %other, "Skipping unknown top-level node");
            }
        }
    }

    Ok(template)
}

/// Extract only the `variables` block.
///
/// Used before template rendering, so it must not fail on files that only
/// become valid KDL after rendering.
pub fn extract_variables(content: &str) -> HashMap<String, String> {
    match content.parse::<KdlDocument>() {
        Ok(doc) => doc
            .nodes()
            .iter()
            .filter(|n| n.name().value() == "variables")
            .flat_map(parse_variables)
            .collect(),
        Err(e) => {
            tracing::debug!(error = %e, "Stack file is not plain KDL before rendering, no variables extracted");
            HashMap::new()
        }
    }
}

fn parse_stack_settings(node: &KdlNode, template: &mut StackTemplate) {
    if let Some(name) = first_argument(node).and_then(|v| v.as_string()) {
        template.name = name.to_string();
    }

    if let Some(children) = node.children() {
        for child in children.nodes() {
            if child.name().value() == "region" {
                template.region = first_argument(child)
                    .and_then(|v| v.as_string())
                    .map(|s| s.to_string());
            }
        }
    }
}

fn parse_variables(node: &KdlNode) -> HashMap<String, String> {
    let mut variables = HashMap::new();
    if let Some(vars) = node.children() {
        for var in vars.nodes() {
            let key = var.name().value().to_string();
            let value = match first_argument(var) {
                Some(v) => match v.as_string() {
                    Some(s) => s.to_string(),
                    None => kdl_value_to_json(v).to_string(),
                },
                None => String::new(),
            };
            variables.insert(key, value);
        }
    }
    variables
}
