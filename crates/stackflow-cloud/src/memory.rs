//! In-memory control plane
//!
//! A deterministic stand-in for the cloud, used by `--dry-run` and tests.
//! It follows the same rules the real APIs enforce where they matter for
//! ordering: names are unique, children need their parents, and a bucket
//! cannot be deleted while it still holds objects.

use crate::error::{CloudError, Result};
use crate::provider::{AuthStatus, ControlPlane, ResolvedResource};
use crate::state::{ResourceState, ResourceStatus};
use async_trait::async_trait;
use serde_json::json;
use stackflow_core::ResourceKind;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

pub const DEFAULT_ACCOUNT: &str = "000000000000";
pub const DEFAULT_REGION: &str = "us-east-1";

#[derive(Default)]
struct Inner {
    resources: BTreeMap<(ResourceKind, String), ResourceState>,
    calls: Vec<String>,
    failures: HashMap<String, CloudError>,
    next_id: u64,
}

impl Inner {
    fn generate_id(&mut self) -> String {
        self.next_id += 1;
        format!("{:010x}", self.next_id)
    }

    fn get(&self, kind: ResourceKind, id: &str) -> Option<&ResourceState> {
        self.resources.get(&(kind, id.to_string()))
    }

    fn exists(&self, kind: ResourceKind, id: &str) -> bool {
        self.get(kind, id).is_some()
    }

    fn find(&self, kind: ResourceKind, matches: impl Fn(&ResourceState) -> bool) -> Option<&ResourceState> {
        self.resources
            .iter()
            .filter(|((k, _), _)| *k == kind)
            .map(|(_, state)| state)
            .find(|state| matches(state))
    }

    fn put(&mut self, state: ResourceState) -> ResourceState {
        self.resources
            .insert((state.kind, state.id.clone()), state.clone());
        state
    }

    fn remove_where(&mut self, matches: impl Fn(&ResourceState) -> bool) -> usize {
        let before = self.resources.len();
        self.resources.retain(|_, state| !matches(state));
        before - self.resources.len()
    }
}

/// Control plane that keeps everything in process memory
pub struct InMemoryControlPlane {
    region: String,
    account: String,
    inner: Mutex<Inner>,
}

impl Default for InMemoryControlPlane {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryControlPlane {
    pub fn new() -> Self {
        Self::with_region(DEFAULT_REGION)
    }

    pub fn with_region(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            account: DEFAULT_ACCOUNT.to_string(),
            inner: Mutex::new(Inner::default()),
        }
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fail the next create or delete of `resource` with `error`
    pub fn fail_on(&self, resource: impl Into<String>, error: CloudError) {
        self.inner().failures.insert(resource.into(), error);
    }

    pub fn clear_failures(&self) {
        self.inner().failures.clear();
    }

    /// Calls made so far, e.g. `create bucket code-bucket`
    pub fn calls(&self) -> Vec<String> {
        self.inner().calls.clone()
    }

    /// Number of resources that currently exist
    pub fn resource_count(&self) -> usize {
        self.inner().resources.len()
    }

    fn log(&self, inner: &mut Inner, op: &str, resource: &ResolvedResource) -> Result<()> {
        inner
            .calls
            .push(format!("{} {} {}", op, resource.kind, resource.name));
        if op != "describe"
            && let Some(error) = inner.failures.remove(&resource.name)
        {
            return Err(error);
        }
        Ok(())
    }

    fn invoke_url(&self, api: &str, stage: &str) -> String {
        format!(
            "https://{}.execute-api.{}.amazonaws.com/{}",
            api, self.region, stage
        )
    }

    fn require_api(inner: &Inner, resource: &ResolvedResource) -> Result<String> {
        let api = resource.require_str("rest-api-id")?;
        if !inner.exists(ResourceKind::RestApi, api) {
            return Err(CloudError::DependencyNotReady(format!(
                "REST API {} does not exist",
                api
            )));
        }
        Ok(api.to_string())
    }

    /// Path of the resource-path `parent` would get for `part`
    fn child_path(inner: &Inner, api: &str, parent: &str, part: &str) -> Result<String> {
        let root = inner
            .get(ResourceKind::RestApi, api)
            .and_then(|s| s.attribute_str("root_resource_id"))
            .map(str::to_string);
        if root.as_deref() == Some(parent) {
            return Ok(format!("/{}", part));
        }
        match inner.get(ResourceKind::ResourcePath, parent) {
            Some(p) if p.attribute_str("rest_api_id") == Some(api) => Ok(format!(
                "{}/{}",
                p.attribute_str("path").unwrap_or_default(),
                part
            )),
            _ => Err(CloudError::DependencyNotReady(format!(
                "parent resource {} not found in REST API {}",
                parent, api
            ))),
        }
    }

    fn identity(&self, inner: &Inner, resource: &ResolvedResource) -> Result<Option<ResourceState>> {
        let r = resource;
        let found = match r.kind {
            ResourceKind::Bucket => inner.get(r.kind, r.require_str("bucket-name")?).cloned(),
            ResourceKind::Object => {
                let id = format!("{}/{}", r.require_str("bucket")?, r.require_str("key")?);
                inner.get(r.kind, &id).cloned()
            }
            ResourceKind::Role => inner.get(r.kind, r.require_str("role-name")?).cloned(),
            ResourceKind::Function => inner.get(r.kind, r.require_str("function-name")?).cloned(),
            ResourceKind::RestApi => {
                let name = r.require_str("name")?;
                inner
                    .find(r.kind, |s| s.attribute_str("name") == Some(name))
                    .cloned()
            }
            ResourceKind::Model => {
                let id = format!("{}/{}", r.require_str("rest-api-id")?, r.require_str("name")?);
                inner.get(r.kind, &id).cloned()
            }
            ResourceKind::ResourcePath => {
                let api = r.require_str("rest-api-id")?;
                let Ok(path) = Self::child_path(
                    inner,
                    api,
                    r.require_str("parent-id")?,
                    r.require_str("path-part")?,
                ) else {
                    return Ok(None);
                };
                inner
                    .find(r.kind, |s| {
                        s.attribute_str("rest_api_id") == Some(api)
                            && s.attribute_str("path") == Some(path.as_str())
                    })
                    .cloned()
            }
            ResourceKind::Method => {
                let id = format!(
                    "{}/{}/{}",
                    r.require_str("rest-api-id")?,
                    r.require_str("resource-id")?,
                    r.require_str("http-method")?.to_ascii_uppercase()
                );
                inner.get(r.kind, &id).cloned()
            }
            ResourceKind::Deployment => {
                let api = r.require_str("rest-api-id")?;
                let stage = r.require_str("stage-name")?;
                inner
                    .find(r.kind, |s| {
                        s.attribute_str("rest_api_id") == Some(api)
                            && s.attribute_str("stage") == Some(stage)
                    })
                    .cloned()
            }
            ResourceKind::Permission => {
                let id = format!(
                    "{}/{}",
                    r.require_str("function-name")?,
                    r.require_str("statement-id")?
                );
                inner.get(r.kind, &id).cloned()
            }
        };
        Ok(found)
    }

    fn materialize(&self, inner: &mut Inner, r: &ResolvedResource) -> Result<ResourceState> {
        if self.identity(inner, r)?.is_some() {
            return Err(CloudError::ResourceAlreadyExists(format!(
                "{} '{}'",
                r.kind, r.name
            )));
        }

        let state = match r.kind {
            ResourceKind::Bucket => {
                let name = r.require_str("bucket-name")?;
                ResourceState::new(name, r.kind)
                    .with_attribute("name", json!(name))
                    .with_attribute("arn", json!(format!("arn:aws:s3:::{}", name)))
            }
            ResourceKind::Object => {
                let bucket = r.require_str("bucket")?;
                let key = r.require_str("key")?;
                if !inner.exists(ResourceKind::Bucket, bucket) {
                    return Err(CloudError::DependencyNotReady(format!(
                        "bucket {} does not exist",
                        bucket
                    )));
                }
                let etag = format!("\"{}\"", inner.generate_id());
                ResourceState::new(format!("{}/{}", bucket, key), r.kind)
                    .with_attribute("bucket", json!(bucket))
                    .with_attribute("key", json!(key))
                    .with_attribute("etag", json!(etag))
            }
            ResourceKind::Role => {
                let name = r.require_str("role-name")?;
                ResourceState::new(name, r.kind)
                    .with_attribute("name", json!(name))
                    .with_attribute(
                        "arn",
                        json!(format!("arn:aws:iam::{}:role/{}", self.account, name)),
                    )
            }
            ResourceKind::Function => {
                let name = r.require_str("function-name")?;
                let role_arn = r.require_str("role")?;
                let role = role_arn.rsplit('/').next().unwrap_or(role_arn);
                if !inner.exists(ResourceKind::Role, role) {
                    return Err(CloudError::DependencyNotReady(format!(
                        "role {} cannot be assumed",
                        role_arn
                    )));
                }
                let code = format!(
                    "{}/{}",
                    r.require_str("code-bucket")?,
                    r.require_str("code-key")?
                );
                if !inner.exists(ResourceKind::Object, &code) {
                    return Err(CloudError::DependencyNotReady(format!(
                        "code object s3://{} does not exist",
                        code
                    )));
                }
                ResourceState::new(name, r.kind)
                    .with_attribute("name", json!(name))
                    .with_attribute(
                        "arn",
                        json!(format!(
                            "arn:aws:lambda:{}:{}:function:{}",
                            self.region, self.account, name
                        )),
                    )
            }
            ResourceKind::RestApi => {
                let name = r.require_str("name")?;
                let id = inner.generate_id();
                let root = inner.generate_id();
                ResourceState::new(&id, r.kind)
                    .with_attribute("id", json!(id))
                    .with_attribute("name", json!(name))
                    .with_attribute("root_resource_id", json!(root))
            }
            ResourceKind::Model => {
                let api = Self::require_api(inner, r)?;
                let name = r.require_str("name")?;
                ResourceState::new(format!("{}/{}", api, name), r.kind)
                    .with_attribute("name", json!(name))
                    .with_attribute("rest_api_id", json!(api))
            }
            ResourceKind::ResourcePath => {
                let api = Self::require_api(inner, r)?;
                let path = Self::child_path(
                    inner,
                    &api,
                    r.require_str("parent-id")?,
                    r.require_str("path-part")?,
                )?;
                let id = inner.generate_id();
                ResourceState::new(&id, r.kind)
                    .with_attribute("id", json!(id))
                    .with_attribute("path", json!(path))
                    .with_attribute("rest_api_id", json!(api))
            }
            ResourceKind::Method => {
                let api = Self::require_api(inner, r)?;
                let resource_id = r.require_str("resource-id")?;
                let http_method = r.require_str("http-method")?.to_ascii_uppercase();
                let path = match inner.get(ResourceKind::ResourcePath, resource_id) {
                    Some(p) => p.attribute_str("path").unwrap_or_default().to_string(),
                    None => {
                        return Err(CloudError::DependencyNotReady(format!(
                            "resource {} not found in REST API {}",
                            resource_id, api
                        )));
                    }
                };
                if let Some(function_arn) = r.property_str("function-arn") {
                    let function = function_arn.rsplit(':').next().unwrap_or(function_arn);
                    if !inner.exists(ResourceKind::Function, function) {
                        return Err(CloudError::DependencyNotReady(format!(
                            "integration target {} does not exist",
                            function_arn
                        )));
                    }
                }
                ResourceState::new(format!("{}/{}/{}", api, resource_id, http_method), r.kind)
                    .with_attribute("http_method", json!(http_method))
                    .with_attribute("resource_id", json!(resource_id))
                    .with_attribute("rest_api_id", json!(api))
                    .with_attribute("path", json!(path))
            }
            ResourceKind::Deployment => {
                let api = Self::require_api(inner, r)?;
                let has_methods = inner
                    .find(ResourceKind::Method, |s| {
                        s.attribute_str("rest_api_id") == Some(api.as_str())
                    })
                    .is_some();
                if !has_methods {
                    return Err(CloudError::DependencyNotReady(format!(
                        "REST API {} has no methods to deploy",
                        api
                    )));
                }
                let stage = r.require_str("stage-name")?;
                let id = inner.generate_id();
                ResourceState::new(&id, r.kind)
                    .with_attribute("id", json!(id))
                    .with_attribute("stage", json!(stage))
                    .with_attribute("invoke_url", json!(self.invoke_url(&api, stage)))
                    .with_attribute("rest_api_id", json!(api))
            }
            ResourceKind::Permission => {
                let function = r.require_str("function-name")?;
                let statement = r.require_str("statement-id")?;
                if !inner.exists(ResourceKind::Function, function) {
                    return Err(CloudError::DependencyNotReady(format!(
                        "function {} does not exist",
                        function
                    )));
                }
                ResourceState::new(format!("{}/{}", function, statement), r.kind)
                    .with_attribute("statement_id", json!(statement))
                    .with_attribute("function_name", json!(function))
            }
        };

        Ok(inner.put(state.with_status(ResourceStatus::Available)))
    }

    fn remove(&self, inner: &mut Inner, state: &ResourceState) -> Result<()> {
        if !inner.exists(state.kind, &state.id) {
            return Err(CloudError::ResourceNotFound(format!(
                "{} {}",
                state.kind, state.id
            )));
        }

        match state.kind {
            ResourceKind::Bucket => {
                let prefix = format!("{}/", state.id);
                let objects = inner
                    .resources
                    .keys()
                    .filter(|(k, id)| *k == ResourceKind::Object && id.starts_with(&prefix))
                    .count();
                if objects > 0 {
                    return Err(CloudError::ApiError(format!(
                        "BucketNotEmpty: bucket {} still holds {} object(s)",
                        state.id, objects
                    )));
                }
            }
            ResourceKind::RestApi => {
                // children go with the API
                let api = state.id.clone();
                inner.remove_where(|s| {
                    s.kind != ResourceKind::RestApi
                        && s.attribute_str("rest_api_id") == Some(api.as_str())
                });
            }
            ResourceKind::Function => {
                let function = state.id.clone();
                inner.remove_where(|s| {
                    s.kind == ResourceKind::Permission
                        && s.attribute_str("function_name") == Some(function.as_str())
                });
            }
            _ => {}
        }

        inner.resources.remove(&(state.kind, state.id.clone()));
        Ok(())
    }
}

#[async_trait]
impl ControlPlane for InMemoryControlPlane {
    fn name(&self) -> &str {
        "memory"
    }

    fn display_name(&self) -> &str {
        "In-memory (dry run)"
    }

    async fn check_auth(&self) -> Result<AuthStatus> {
        Ok(AuthStatus::ok(format!("account {}", self.account)))
    }

    async fn create(&self, resource: &ResolvedResource) -> Result<ResourceState> {
        let mut inner = self.inner();
        self.log(&mut inner, "create", resource)?;
        self.materialize(&mut inner, resource)
    }

    async fn describe(&self, resource: &ResolvedResource) -> Result<Option<ResourceState>> {
        let mut inner = self.inner();
        self.log(&mut inner, "describe", resource)?;
        self.identity(&inner, resource)
    }

    async fn delete(&self, resource: &ResolvedResource, state: &ResourceState) -> Result<()> {
        let mut inner = self.inner();
        self.log(&mut inner, "delete", resource)?;
        self.remove(&mut inner, state)
    }
}
