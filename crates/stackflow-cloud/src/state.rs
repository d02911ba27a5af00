//! In-run state of materialized resources
//!
//! A [`StackState`] lives for one orchestration run. Create fills it in
//! creation order; the discovery pass of delete rebuilds it from the control
//! plane. Nothing is written to disk.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stackflow_core::ResourceKind;
use std::collections::BTreeMap;

/// Resources materialized so far, in the order they were recorded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackState {
    /// Last modified timestamp
    pub updated_at: DateTime<Utc>,

    resources: Vec<StateEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StateEntry {
    name: String,
    #[serde(flatten)]
    state: ResourceState,
}

impl Default for StackState {
    fn default() -> Self {
        Self {
            updated_at: Utc::now(),
            resources: Vec::new(),
        }
    }
}

impl StackState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a resource, replacing any earlier entry with the same name
    pub fn insert(&mut self, name: impl Into<String>, state: ResourceState) {
        let name = name.into();
        match self.resources.iter_mut().find(|e| e.name == name) {
            Some(entry) => entry.state = state,
            None => self.resources.push(StateEntry { name, state }),
        }
        self.updated_at = Utc::now();
    }

    pub fn remove(&mut self, name: &str) -> Option<ResourceState> {
        let index = self.resources.iter().position(|e| e.name == name)?;
        self.updated_at = Utc::now();
        Some(self.resources.remove(index).state)
    }

    pub fn get(&self, name: &str) -> Option<&ResourceState> {
        self.resources
            .iter()
            .find(|e| e.name == name)
            .map(|e| &e.state)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Logical names in recording order
    pub fn names(&self) -> Vec<&str> {
        self.resources.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResourceState)> {
        self.resources.iter().map(|e| (e.name.as_str(), &e.state))
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

/// State of a single resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    /// Provider-assigned identifier (bucket name, API id, ...)
    pub id: String,

    pub kind: ResourceKind,

    /// Current status
    pub status: ResourceStatus,

    /// Published attributes, referenced as `${name.attribute}`
    pub attributes: BTreeMap<String, serde_json::Value>,

    /// When the resource was created (or first observed)
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl ResourceState {
    pub fn new(id: impl Into<String>, kind: ResourceKind) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            kind,
            status: ResourceStatus::Unknown,
            attributes: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_status(mut self, status: ResourceStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.attributes.insert(key.into(), value);
        self.updated_at = Utc::now();
    }

    pub fn attribute_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(|v| v.as_str())
    }

    pub fn get_attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// Status of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    /// Resource is being created
    Creating,
    /// Resource exists and is usable
    Available,
    /// Resource is being deleted
    Deleting,
    /// Resource has been deleted
    Deleted,
    /// Resource is in error state
    Error,
    /// Status is unknown
    Unknown,
}

impl std::fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceStatus::Creating => write!(f, "creating"),
            ResourceStatus::Available => write!(f, "available"),
            ResourceStatus::Deleting => write!(f, "deleting"),
            ResourceStatus::Deleted => write!(f, "deleted"),
            ResourceStatus::Error => write!(f, "error"),
            ResourceStatus::Unknown => write!(f, "unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_insert_keeps_recording_order() {
        let mut state = StackState::new();
        state.insert("b", ResourceState::new("b-id", ResourceKind::Bucket));
        state.insert("a", ResourceState::new("a-id", ResourceKind::Role));
        state.insert(
            "b",
            ResourceState::new("b-id", ResourceKind::Bucket).with_status(ResourceStatus::Available),
        );

        assert_eq!(state.names(), vec!["b", "a"]);
        assert_eq!(state.get("b").unwrap().status, ResourceStatus::Available);
    }

    #[test]
    fn test_remove() {
        let mut state = StackState::new();
        state.insert("a", ResourceState::new("a-id", ResourceKind::Role));

        assert!(state.remove("a").is_some());
        assert!(state.remove("a").is_none());
        assert!(state.is_empty());
    }

    #[test]
    fn test_attributes() {
        let state = ResourceState::new("fn", ResourceKind::Function)
            .with_attribute("name", json!("fn"))
            .with_attribute("memory", json!(128));

        assert_eq!(state.attribute_str("name"), Some("fn"));
        assert_eq!(state.get_attribute::<u32>("memory"), Some(128));
        assert_eq!(state.attribute_str("missing"), None);
    }

    #[test]
    fn test_state_serializes_entries_by_name() {
        let mut state = StackState::new();
        state.insert(
            "code-bucket",
            ResourceState::new("bucket-01234", ResourceKind::Bucket)
                .with_status(ResourceStatus::Available),
        );

        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["resources"][0]["name"], "code-bucket");
        assert_eq!(value["resources"][0]["kind"], "bucket");
        assert_eq!(value["resources"][0]["status"], "available");
    }
}
