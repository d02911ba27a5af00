//! Control-plane trait definition

use crate::error::{CloudError, Result};
use crate::state::{ResourceState, StackState};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stackflow_core::{ResourceKind, ResourceSpec, StackError, resolve_value};
use std::collections::BTreeMap;

/// Remote API that materializes resources
///
/// Implementations hold no stack state of their own; everything they need
/// to find a resource again is in its resolved properties.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Returns the control plane name (e.g., "aws", "memory")
    fn name(&self) -> &str;

    /// Returns the display name for UI
    fn display_name(&self) -> &str;

    /// Check if the control plane is properly configured and authenticated
    async fn check_auth(&self) -> Result<AuthStatus>;

    /// Create the resource and return its state with the attributes its
    /// kind publishes
    async fn create(&self, resource: &ResolvedResource) -> Result<ResourceState>;

    /// Look the resource up; `None` if it does not exist
    async fn describe(&self, resource: &ResolvedResource) -> Result<Option<ResourceState>>;

    /// Delete a resource previously returned by `create` or `describe`
    async fn delete(&self, resource: &ResolvedResource, state: &ResourceState) -> Result<()>;
}

/// Authentication status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthStatus {
    /// Whether authentication is valid
    pub authenticated: bool,

    /// Account/user information if available
    pub account_info: Option<String>,

    /// Error message if not authenticated
    pub error: Option<String>,
}

impl AuthStatus {
    pub fn ok(account_info: impl Into<String>) -> Self {
        Self {
            authenticated: true,
            account_info: Some(account_info.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            authenticated: false,
            account_info: None,
            error: Some(error.into()),
        }
    }
}

/// A resource whose `${x.attr}` references have been replaced by the
/// attributes of already-materialized resources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedResource {
    pub name: String,
    pub kind: ResourceKind,
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl ResolvedResource {
    pub fn new(name: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            name: name.into(),
            kind,
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    /// Resolve every reference in `spec` against `state`
    pub fn resolve(spec: &ResourceSpec, state: &StackState) -> Result<Self> {
        let lookup = |r: &stackflow_core::Reference| {
            state
                .get(&r.resource)
                .and_then(|s| s.attributes.get(&r.attribute))
                .cloned()
        };

        let mut properties = BTreeMap::new();
        for (key, value) in &spec.properties {
            properties.insert(key.clone(), resolve_value(&spec.name, value, &lookup)?);
        }

        tracing::debug!(resource = %spec.name, "Resolved references");
        Ok(Self {
            name: spec.name.clone(),
            kind: spec.kind,
            properties,
        })
    }

    /// Resolve `spec` well enough to look it up.
    ///
    /// Identity properties (see [`ResourceKind::identity_properties`]) must
    /// resolve; other properties whose references point at missing
    /// resources are dropped.
    pub fn resolve_identity(spec: &ResourceSpec, state: &StackState) -> Result<Self> {
        let lookup = |r: &stackflow_core::Reference| {
            state
                .get(&r.resource)
                .and_then(|s| s.attributes.get(&r.attribute))
                .cloned()
        };
        let identity = spec.kind.identity_properties();

        let mut properties = BTreeMap::new();
        for (key, value) in &spec.properties {
            match resolve_value(&spec.name, value, &lookup) {
                Ok(resolved) => {
                    properties.insert(key.clone(), resolved);
                }
                Err(StackError::UnresolvedReference { reference, .. })
                    if !identity.contains(&key.as_str()) =>
                {
                    tracing::debug!(resource = %spec.name, %key, %reference, "Dropped unresolved property");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(Self {
            name: spec.name.clone(),
            kind: spec.kind,
            properties,
        })
    }

    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(|v| v.as_str())
    }

    /// A string property that must be present
    pub fn require_str(&self, key: &str) -> Result<&str> {
        self.property_str(key).ok_or_else(|| {
            CloudError::InvalidConfig(format!(
                "{} '{}' requires property '{}'",
                self.kind, self.name, key
            ))
        })
    }

    pub fn property_i64(&self, key: &str) -> Option<i64> {
        self.properties.get(key).and_then(|v| v.as_i64())
    }

    /// A property that may be written as one string or a list of strings
    pub fn property_list(&self, key: &str) -> Vec<String> {
        match self.properties.get(key) {
            Some(serde_json::Value::String(s)) => vec![s.clone()],
            Some(serde_json::Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// A string-to-string map property (e.g. tags)
    pub fn property_map(&self, key: &str) -> BTreeMap<String, String> {
        match self.properties.get(key) {
            Some(serde_json::Value::Object(map)) => map
                .iter()
                .map(|(k, v)| {
                    let v = v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string());
                    (k.clone(), v)
                })
                .collect(),
            _ => BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ResourceStatus;
    use serde_json::json;

    #[test]
    fn test_resolve_from_state() {
        let mut state = StackState::new();
        state.insert(
            "code-bucket",
            ResourceState::new("generic-lambda-functions-01234", ResourceKind::Bucket)
                .with_status(ResourceStatus::Available)
                .with_attribute("name", json!("generic-lambda-functions-01234")),
        );

        let spec = ResourceSpec::new("code", ResourceKind::Object)
            .with_property("bucket", json!("${code-bucket.name}"))
            .with_property("key", json!("echo.zip"));

        let resolved = ResolvedResource::resolve(&spec, &state).unwrap();
        assert_eq!(
            resolved.property_str("bucket"),
            Some("generic-lambda-functions-01234")
        );
        assert_eq!(resolved.property_str("key"), Some("echo.zip"));
    }

    #[test]
    fn test_resolve_missing_dependency_fails() {
        let spec = ResourceSpec::new("code", ResourceKind::Object)
            .with_property("bucket", json!("${code-bucket.name}"));

        let err = ResolvedResource::resolve(&spec, &StackState::new()).unwrap_err();
        assert!(matches!(
            err,
            CloudError::Stack(StackError::UnresolvedReference { .. })
        ));
    }

    #[test]
    fn test_resolve_identity_drops_non_identity_references() {
        let mut state = StackState::new();
        state.insert(
            "role",
            ResourceState::new("echo-role", ResourceKind::Role)
                .with_attribute("arn", json!("arn:aws:iam::000000000000:role/echo-role")),
        );

        // the code object is gone, the function is still findable by name
        let spec = ResourceSpec::new("fn", ResourceKind::Function)
            .with_property("function-name", json!("echo"))
            .with_property("role", json!("${role.arn}"))
            .with_property("code-bucket", json!("${code.bucket}"))
            .with_property("code-key", json!("${code.key}"));

        let resolved = ResolvedResource::resolve_identity(&spec, &state).unwrap();
        assert_eq!(resolved.property_str("function-name"), Some("echo"));
        assert!(resolved.property_str("role").is_some());
        assert!(!resolved.properties.contains_key("code-bucket"));
        assert!(!resolved.properties.contains_key("code-key"));
    }

    #[test]
    fn test_resolve_identity_requires_identity_references() {
        let spec = ResourceSpec::new("perm", ResourceKind::Permission)
            .with_property("function-name", json!("${fn.name}"))
            .with_property("statement-id", json!("echo-apigateway"));

        let err = ResolvedResource::resolve_identity(&spec, &StackState::new()).unwrap_err();
        assert!(matches!(
            err,
            CloudError::Stack(StackError::UnresolvedReference { .. })
        ));
    }

    #[test]
    fn test_property_helpers() {
        let resource = ResolvedResource::new("role", ResourceKind::Role)
            .with_property("managed-policies", json!("arn:a"))
            .with_property("layers", json!(["x", "y"]))
            .with_property("tags", json!({ "Documentation": "Documentation", "n": 1 }))
            .with_property("memory-size", json!(128));

        assert_eq!(resource.property_list("managed-policies"), vec!["arn:a"]);
        assert_eq!(resource.property_list("layers"), vec!["x", "y"]);
        assert!(resource.property_list("missing").is_empty());
        assert_eq!(resource.property_map("tags")["n"], "1");
        assert_eq!(resource.property_i64("memory-size"), Some(128));
        assert!(matches!(
            resource.require_str("role-name"),
            Err(CloudError::InvalidConfig(_))
        ));
    }
}
