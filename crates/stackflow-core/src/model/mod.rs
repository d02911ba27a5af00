//! Stack model
//!
//! A stack is a named, ordered set of resource descriptors plus the
//! settings needed to materialize them.

mod resource;

pub use resource::{ResourceKind, ResourceSpec};

use crate::error::Result;
use crate::graph::DependencyGraph;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Stack definition loaded from a stack file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StackTemplate {
    /// Stack name
    pub name: String,

    /// Region to provision into (overridable from the command line)
    pub region: Option<String>,

    /// Variables used while rendering the stack file
    pub variables: HashMap<String, String>,

    /// Resources in declaration order
    pub resources: Vec<ResourceSpec>,
}

impl StackTemplate {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_resource(mut self, resource: ResourceSpec) -> Self {
        self.resources.push(resource);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ResourceSpec> {
        self.resources.iter().find(|r| r.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceSpec> {
        self.resources.iter()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn by_kind(&self, kind: ResourceKind) -> Vec<&ResourceSpec> {
        self.resources.iter().filter(|r| r.kind == kind).collect()
    }

    /// Build the dependency graph, failing on duplicates, unknown
    /// dependencies or cycles
    pub fn graph(&self) -> Result<DependencyGraph<'_>> {
        DependencyGraph::new(&self.resources)
    }

    /// Check the stack is well-formed and a creation order exists
    pub fn validate(&self) -> Result<()> {
        self.graph()?.creation_order()?;
        Ok(())
    }
}
