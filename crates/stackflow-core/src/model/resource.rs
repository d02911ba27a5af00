//! Resource descriptors
//!
//! A [`ResourceSpec`] is pure data: what kind of cloud resource to create,
//! its properties, and which other resources must exist first.

use crate::reference::{self, Reference};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Kind of cloud resource a descriptor materializes into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    /// Object storage bucket
    Bucket,
    /// Object uploaded into a bucket (function code archive)
    Object,
    /// Execution role assumed by the function
    Role,
    /// Serverless function
    Function,
    /// REST API container
    RestApi,
    /// Request/response model attached to a REST API
    Model,
    /// Path segment under a REST API
    ResourcePath,
    /// HTTP method on a resource path, integrated with a function
    Method,
    /// Deployment of a REST API to a stage
    Deployment,
    /// Permission allowing the API to invoke the function
    Permission,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 10] = [
        ResourceKind::Bucket,
        ResourceKind::Object,
        ResourceKind::Role,
        ResourceKind::Function,
        ResourceKind::RestApi,
        ResourceKind::Model,
        ResourceKind::ResourcePath,
        ResourceKind::Method,
        ResourceKind::Deployment,
        ResourceKind::Permission,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Bucket => "bucket",
            ResourceKind::Object => "object",
            ResourceKind::Role => "role",
            ResourceKind::Function => "function",
            ResourceKind::RestApi => "rest-api",
            ResourceKind::Model => "model",
            ResourceKind::ResourcePath => "resource-path",
            ResourceKind::Method => "method",
            ResourceKind::Deployment => "deployment",
            ResourceKind::Permission => "permission",
        }
    }

    /// Attributes every control plane publishes for this kind once the
    /// resource exists. Property references may only name these.
    pub fn attributes(&self) -> &'static [&'static str] {
        match self {
            ResourceKind::Bucket => &["name", "arn"],
            ResourceKind::Object => &["bucket", "key", "etag"],
            ResourceKind::Role => &["name", "arn"],
            ResourceKind::Function => &["name", "arn"],
            ResourceKind::RestApi => &["id", "name", "root_resource_id"],
            ResourceKind::Model => &["name", "rest_api_id"],
            ResourceKind::ResourcePath => &["id", "path", "rest_api_id"],
            ResourceKind::Method => &["http_method", "resource_id", "rest_api_id", "path"],
            ResourceKind::Deployment => &["id", "stage", "invoke_url", "rest_api_id"],
            ResourceKind::Permission => &["statement_id", "function_name"],
        }
    }

    /// Properties a control plane needs to find an existing resource of
    /// this kind. Everything else only matters when creating it.
    pub fn identity_properties(&self) -> &'static [&'static str] {
        match self {
            ResourceKind::Bucket => &["bucket-name"],
            ResourceKind::Object => &["bucket", "key"],
            ResourceKind::Role => &["role-name"],
            ResourceKind::Function => &["function-name"],
            ResourceKind::RestApi => &["name"],
            ResourceKind::Model => &["rest-api-id", "name"],
            ResourceKind::ResourcePath => &["rest-api-id", "parent-id", "path-part"],
            ResourceKind::Method => &["rest-api-id", "resource-id", "http-method"],
            ResourceKind::Deployment => &["rest-api-id", "stage-name"],
            ResourceKind::Permission => &["function-name", "statement-id"],
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bucket" => Ok(ResourceKind::Bucket),
            "object" => Ok(ResourceKind::Object),
            "role" => Ok(ResourceKind::Role),
            "function" => Ok(ResourceKind::Function),
            "rest-api" | "rest_api" => Ok(ResourceKind::RestApi),
            "model" => Ok(ResourceKind::Model),
            "resource-path" | "resource_path" => Ok(ResourceKind::ResourcePath),
            "method" => Ok(ResourceKind::Method),
            "deployment" => Ok(ResourceKind::Deployment),
            "permission" => Ok(ResourceKind::Permission),
            other => Err(other.to_string()),
        }
    }
}

/// Declarative description of one cloud resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSpec {
    /// Logical name, unique within a stack
    pub name: String,

    pub kind: ResourceKind,

    /// Provider-facing properties; string values may contain
    /// `${resource.attribute}` references
    pub properties: BTreeMap<String, serde_json::Value>,

    /// Resources that must exist before this one (and be destroyed after it)
    pub depends_on: Vec<String>,
}

impl ResourceSpec {
    pub fn new(name: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            name: name.into(),
            kind,
            properties: BTreeMap::new(),
            depends_on: Vec::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    pub fn with_dependency(mut self, dependency: impl Into<String>) -> Self {
        let dependency = dependency.into();
        if !self.depends_on.contains(&dependency) {
            self.depends_on.push(dependency);
        }
        self
    }

    /// Get a property as a string slice
    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(|v| v.as_str())
    }

    /// All `${resource.attribute}` references found in the properties
    pub fn references(&self) -> Vec<Reference> {
        let mut refs = Vec::new();
        for value in self.properties.values() {
            reference::collect_references(value, &mut refs);
        }
        refs
    }

    /// Append every referenced resource to `depends_on` if it is not
    /// already listed. Explicit entries keep their position.
    pub fn add_implicit_dependencies(&mut self) {
        for r in self.references() {
            if !self.depends_on.contains(&r.resource) {
                self.depends_on.push(r.resource);
            }
        }
    }
}
