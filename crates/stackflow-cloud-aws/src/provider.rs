//! AWS control plane implementation

use crate::apigateway::{ApiGatewayOps, MethodRequest, execute_api_arn};
use crate::context::AwsContext;
use crate::error::SdkResultExt;
use crate::iam::{IamOps, RoleRequest};
use crate::lambda::{FunctionRequest, LambdaOps};
use crate::s3::S3Ops;
use async_trait::async_trait;
use serde_json::json;
use stackflow_cloud::{
    AuthStatus, CloudError, ControlPlane, ResolvedResource, ResourceState, ResourceStatus, Result,
    WaitConfig, retry_while_not_ready,
};
use stackflow_core::ResourceKind;
use std::path::Path;
use tokio::sync::OnceCell;
use tracing::debug;

/// Control plane backed by the AWS APIs
pub struct AwsControlPlane {
    ctx: AwsContext,
    s3: S3Ops,
    iam: IamOps,
    lambda: LambdaOps,
    apigateway: ApiGatewayOps,
    sts: aws_sdk_sts::Client,
    wait: WaitConfig,
    account: OnceCell<String>,
}

impl AwsControlPlane {
    /// Load credentials and build the service clients
    pub async fn new(region: Option<&str>, profile: Option<&str>) -> Self {
        Self::from_context(AwsContext::new(region, profile).await)
    }

    pub fn from_context(ctx: AwsContext) -> Self {
        Self {
            s3: S3Ops::from_context(&ctx),
            iam: IamOps::from_context(&ctx),
            lambda: LambdaOps::from_context(&ctx),
            apigateway: ApiGatewayOps::from_context(&ctx),
            sts: ctx.sts_client(),
            wait: WaitConfig::default(),
            account: OnceCell::new(),
            ctx,
        }
    }

    pub fn region(&self) -> &str {
        self.ctx.region()
    }

    /// Account id of the caller, fetched once
    async fn account_id(&self) -> Result<String> {
        let account = self
            .account
            .get_or_try_init(|| async {
                let identity = self
                    .sts
                    .get_caller_identity()
                    .send()
                    .await
                    .classify("GetCallerIdentity")?;
                identity.account().map(str::to_string).ok_or_else(|| {
                    CloudError::AuthenticationFailed(
                        "GetCallerIdentity returned no account".to_string(),
                    )
                })
            })
            .await?;
        Ok(account.clone())
    }

    /// Full path a child segment gets under `parent_id`, if the parent exists
    async fn child_path(&self, api: &str, parent_id: &str, part: &str) -> Result<Option<String>> {
        let parent = self.apigateway.resource_path(api, parent_id).await?;
        Ok(parent.map(|p| join_path(&p, part)))
    }

    /// Refuse to create over an existing resource where AWS itself would
    /// accept the call (and overwrite or duplicate)
    async fn ensure_absent(&self, r: &ResolvedResource) -> Result<()> {
        if !overwrites_silently(r.kind) {
            return Ok(());
        }
        if let Some(existing) = self.describe_resource(r).await? {
            debug!(resource = %r.name, id = %existing.id, "Resource already exists");
            return Err(CloudError::ResourceAlreadyExists(format!(
                "{} '{}' ({})",
                r.kind, r.name, existing.id
            )));
        }
        Ok(())
    }

    async fn create_resource(&self, r: &ResolvedResource) -> Result<ResourceState> {
        self.ensure_absent(r).await?;
        let state = match r.kind {
            ResourceKind::Bucket => {
                let name = r.require_str("bucket-name")?;
                self.s3.create_bucket(name, &r.property_map("tags")).await?;
                bucket_state(name)
            }
            ResourceKind::Object => {
                let bucket = r.require_str("bucket")?;
                let key = r.require_str("key")?;
                let source = Path::new(r.require_str("source")?);
                let etag = self
                    .s3
                    .put_object(bucket, key, source, r.property_str("content-type"))
                    .await?;
                object_state(bucket, key, &etag)
            }
            ResourceKind::Role => {
                let name = r.require_str("role-name")?;
                let request = RoleRequest {
                    role_name: name,
                    service: r.property_str("service").unwrap_or("lambda.amazonaws.com"),
                    description: r.property_str("description"),
                    managed_policies: r.property_list("managed-policies"),
                    inline_policy: r.properties.get("inline-policy").cloned(),
                };
                let arn = self.iam.create_role(&request, &self.wait).await?;
                named_state(name, ResourceKind::Role, &arn)
            }
            ResourceKind::Function => {
                let name = r.require_str("function-name")?;
                let request = FunctionRequest {
                    function_name: name,
                    role_arn: r.require_str("role")?,
                    code_bucket: r.require_str("code-bucket")?,
                    code_key: r.require_str("code-key")?,
                    runtime: r.require_str("runtime")?,
                    handler: r.require_str("handler")?,
                    description: r.property_str("description"),
                    memory_size: property_i32(r, "memory-size")?,
                    timeout: property_i32(r, "timeout")?,
                    architecture: r.property_str("architecture"),
                };
                let arn = self
                    .lambda
                    .create_function(&request, &WaitConfig::long())
                    .await?;
                named_state(name, ResourceKind::Function, &arn)
            }
            ResourceKind::RestApi => {
                let name = r.require_str("name")?;
                let (id, root) = self
                    .apigateway
                    .create_rest_api(
                        name,
                        r.property_str("description"),
                        r.property_str("endpoint-type"),
                    )
                    .await?;
                rest_api_state(&id, name, &root)
            }
            ResourceKind::Model => {
                let api = r.require_str("rest-api-id")?;
                let name = r.require_str("name")?;
                self.apigateway
                    .create_model(
                        api,
                        name,
                        r.property_str("content-type").unwrap_or("application/json"),
                        r.properties.get("schema"),
                    )
                    .await?;
                model_state(api, name)
            }
            ResourceKind::ResourcePath => {
                let api = r.require_str("rest-api-id")?;
                let (id, path) = self
                    .apigateway
                    .create_resource(api, r.require_str("parent-id")?, r.require_str("path-part")?)
                    .await?;
                resource_path_state(api, &id, &path)
            }
            ResourceKind::Method => {
                let api = r.require_str("rest-api-id")?;
                let resource_id = r.require_str("resource-id")?;
                let request = MethodRequest {
                    rest_api_id: api,
                    resource_id,
                    http_method: r.require_str("http-method")?,
                    authorization_type: r.property_str("authorization-type").unwrap_or("NONE"),
                    query_parameters: r.property_list("query-parameters"),
                    function_arn: r.property_str("function-arn"),
                    response_model: r.property_str("response-model"),
                };
                self.apigateway.put_method(&request).await?;

                let path = match r.property_str("resource-path") {
                    Some(path) => path.to_string(),
                    None => self
                        .apigateway
                        .resource_path(api, resource_id)
                        .await?
                        .unwrap_or_default(),
                };
                method_state(api, resource_id, request.http_method, &path)
            }
            ResourceKind::Deployment => {
                let api = r.require_str("rest-api-id")?;
                let stage = r.require_str("stage-name")?;
                let description = r.property_str("description");
                // a method put moments ago may not be visible to the deployment yet
                let this = self;
                let id = retry_while_not_ready(&self.wait, &r.name, move || async move {
                    this.apigateway.create_deployment(api, stage, description).await
                })
                .await?;
                deployment_state(&id, api, stage, &self.apigateway.invoke_url(api, stage))
            }
            ResourceKind::Permission => {
                let function = r.require_str("function-name")?;
                let statement = r.require_str("statement-id")?;
                let source_arn = match r.property_str("source-arn") {
                    Some(arn) => arn.to_string(),
                    None => {
                        let api = r.require_str("rest-api-id")?;
                        let account = self.account_id().await?;
                        execute_api_arn(
                            self.region(),
                            &account,
                            api,
                            r.property_str("source-path").unwrap_or("/*/*/*"),
                        )
                    }
                };
                self.lambda
                    .add_permission(
                        function,
                        statement,
                        r.property_str("principal").unwrap_or("apigateway.amazonaws.com"),
                        &source_arn,
                    )
                    .await?;
                permission_state(function, statement)
            }
        };

        Ok(state.with_status(ResourceStatus::Available))
    }

    async fn describe_resource(&self, r: &ResolvedResource) -> Result<Option<ResourceState>> {
        let state = match r.kind {
            ResourceKind::Bucket => {
                let name = r.require_str("bucket-name")?;
                self.s3
                    .bucket_exists(name)
                    .await?
                    .then(|| bucket_state(name))
            }
            ResourceKind::Object => {
                let bucket = r.require_str("bucket")?;
                let key = r.require_str("key")?;
                self.s3
                    .head_object(bucket, key)
                    .await?
                    .map(|etag| object_state(bucket, key, &etag))
            }
            ResourceKind::Role => {
                let name = r.require_str("role-name")?;
                self.iam
                    .get_role(name)
                    .await?
                    .map(|arn| named_state(name, ResourceKind::Role, &arn))
            }
            ResourceKind::Function => {
                let name = r.require_str("function-name")?;
                self.lambda.get_function(name).await?.map(|config| {
                    named_state(
                        name,
                        ResourceKind::Function,
                        config.function_arn().unwrap_or_default(),
                    )
                })
            }
            ResourceKind::RestApi => {
                let name = r.require_str("name")?;
                self.apigateway
                    .find_rest_api(name)
                    .await?
                    .map(|(id, root)| rest_api_state(&id, name, &root))
            }
            ResourceKind::Model => {
                let api = r.require_str("rest-api-id")?;
                let name = r.require_str("name")?;
                self.apigateway
                    .model_exists(api, name)
                    .await?
                    .then(|| model_state(api, name))
            }
            ResourceKind::ResourcePath => {
                let api = r.require_str("rest-api-id")?;
                let Some(path) = self
                    .child_path(api, r.require_str("parent-id")?, r.require_str("path-part")?)
                    .await?
                else {
                    return Ok(None);
                };
                self.apigateway
                    .find_resource(api, &path)
                    .await?
                    .map(|id| resource_path_state(api, &id, &path))
            }
            ResourceKind::Method => {
                let api = r.require_str("rest-api-id")?;
                let resource_id = r.require_str("resource-id")?;
                let http_method = r.require_str("http-method")?;
                let Some(path) = self.apigateway.resource_path(api, resource_id).await? else {
                    return Ok(None);
                };
                self.apigateway
                    .method_exists(api, resource_id, http_method)
                    .await?
                    .then(|| method_state(api, resource_id, http_method, &path))
            }
            ResourceKind::Deployment => {
                let api = r.require_str("rest-api-id")?;
                let stage = r.require_str("stage-name")?;
                self.apigateway
                    .stage_deployment(api, stage)
                    .await?
                    .map(|id| {
                        deployment_state(&id, api, stage, &self.apigateway.invoke_url(api, stage))
                    })
            }
            ResourceKind::Permission => {
                let function = r.require_str("function-name")?;
                let statement = r.require_str("statement-id")?;
                self.lambda
                    .has_permission(function, statement)
                    .await?
                    .then(|| permission_state(function, statement))
            }
        };

        Ok(state.map(|s| s.with_status(ResourceStatus::Available)))
    }

    async fn delete_resource(&self, state: &ResourceState) -> Result<()> {
        let attr = |key: &str| {
            state.attribute_str(key).ok_or_else(|| {
                CloudError::InvalidConfig(format!(
                    "{} {} has no '{}' attribute",
                    state.kind, state.id, key
                ))
            })
        };

        match state.kind {
            ResourceKind::Bucket => self.s3.delete_bucket(&state.id).await,
            ResourceKind::Object => self.s3.delete_object(attr("bucket")?, attr("key")?).await,
            ResourceKind::Role => self.iam.delete_role(&state.id).await,
            ResourceKind::Function => self.lambda.delete_function(&state.id).await,
            ResourceKind::RestApi => self.apigateway.delete_rest_api(&state.id).await,
            ResourceKind::Model => {
                self.apigateway
                    .delete_model(attr("rest_api_id")?, attr("name")?)
                    .await
            }
            ResourceKind::ResourcePath => {
                self.apigateway
                    .delete_resource(attr("rest_api_id")?, attr("id")?)
                    .await
            }
            ResourceKind::Method => {
                self.apigateway
                    .delete_method(attr("rest_api_id")?, attr("resource_id")?, attr("http_method")?)
                    .await
            }
            ResourceKind::Deployment => {
                self.apigateway
                    .delete_deployment(attr("rest_api_id")?, attr("stage")?, attr("id")?)
                    .await
            }
            ResourceKind::Permission => {
                self.lambda
                    .remove_permission(attr("function_name")?, attr("statement_id")?)
                    .await
            }
        }
    }
}

#[async_trait]
impl ControlPlane for AwsControlPlane {
    fn name(&self) -> &str {
        "aws"
    }

    fn display_name(&self) -> &str {
        "Amazon Web Services"
    }

    async fn check_auth(&self) -> Result<AuthStatus> {
        match self.account_id().await {
            Ok(account) => Ok(AuthStatus::ok(format!(
                "account {} ({})",
                account,
                self.region()
            ))),
            Err(e) => Ok(AuthStatus::failed(e.to_string())),
        }
    }

    async fn create(&self, resource: &ResolvedResource) -> Result<ResourceState> {
        debug!(resource = %resource.name, kind = %resource.kind, "AWS create");
        self.create_resource(resource).await
    }

    async fn describe(&self, resource: &ResolvedResource) -> Result<Option<ResourceState>> {
        debug!(resource = %resource.name, kind = %resource.kind, "AWS describe");
        self.describe_resource(resource).await
    }

    async fn delete(&self, resource: &ResolvedResource, state: &ResourceState) -> Result<()> {
        debug!(resource = %resource.name, kind = %resource.kind, id = %state.id, "AWS delete");
        self.delete_resource(state).await
    }
}

fn property_i32(r: &ResolvedResource, key: &str) -> Result<Option<i32>> {
    r.property_i64(key)
        .map(|v| {
            i32::try_from(v).map_err(|_| {
                CloudError::InvalidConfig(format!("{} '{}': {} is out of range", r.kind, r.name, key))
            })
        })
        .transpose()
}

/// Kinds whose create call succeeds against an existing resource: a bucket
/// you already own (us-east-1), an object put, a REST API (names are not
/// unique) and a deployment onto an existing stage
fn overwrites_silently(kind: ResourceKind) -> bool {
    matches!(
        kind,
        ResourceKind::Bucket | ResourceKind::Object | ResourceKind::RestApi | ResourceKind::Deployment
    )
}

/// `/` + `users` is `/users`; `/users` + `{id}` is `/users/{id}`
fn join_path(parent: &str, part: &str) -> String {
    format!("{}/{}", parent.trim_end_matches('/'), part)
}

fn bucket_state(name: &str) -> ResourceState {
    ResourceState::new(name, ResourceKind::Bucket)
        .with_attribute("name", json!(name))
        .with_attribute("arn", json!(format!("arn:aws:s3:::{}", name)))
}

fn object_state(bucket: &str, key: &str, etag: &str) -> ResourceState {
    ResourceState::new(format!("{}/{}", bucket, key), ResourceKind::Object)
        .with_attribute("bucket", json!(bucket))
        .with_attribute("key", json!(key))
        .with_attribute("etag", json!(etag))
}

fn named_state(name: &str, kind: ResourceKind, arn: &str) -> ResourceState {
    ResourceState::new(name, kind)
        .with_attribute("name", json!(name))
        .with_attribute("arn", json!(arn))
}

fn rest_api_state(id: &str, name: &str, root: &str) -> ResourceState {
    ResourceState::new(id, ResourceKind::RestApi)
        .with_attribute("id", json!(id))
        .with_attribute("name", json!(name))
        .with_attribute("root_resource_id", json!(root))
}

fn model_state(api: &str, name: &str) -> ResourceState {
    ResourceState::new(format!("{}/{}", api, name), ResourceKind::Model)
        .with_attribute("name", json!(name))
        .with_attribute("rest_api_id", json!(api))
}

fn resource_path_state(api: &str, id: &str, path: &str) -> ResourceState {
    ResourceState::new(id, ResourceKind::ResourcePath)
        .with_attribute("id", json!(id))
        .with_attribute("path", json!(path))
        .with_attribute("rest_api_id", json!(api))
}

fn method_state(api: &str, resource_id: &str, http_method: &str, path: &str) -> ResourceState {
    let http_method = http_method.to_ascii_uppercase();
    ResourceState::new(
        format!("{}/{}/{}", api, resource_id, http_method),
        ResourceKind::Method,
    )
    .with_attribute("http_method", json!(http_method))
    .with_attribute("resource_id", json!(resource_id))
    .with_attribute("rest_api_id", json!(api))
    .with_attribute("path", json!(path))
}

fn deployment_state(id: &str, api: &str, stage: &str, invoke_url: &str) -> ResourceState {
    ResourceState::new(id, ResourceKind::Deployment)
        .with_attribute("id", json!(id))
        .with_attribute("stage", json!(stage))
        .with_attribute("invoke_url", json!(invoke_url))
        .with_attribute("rest_api_id", json!(api))
}

fn permission_state(function: &str, statement: &str) -> ResourceState {
    ResourceState::new(format!("{}/{}", function, statement), ResourceKind::Permission)
        .with_attribute("statement_id", json!(statement))
        .with_attribute("function_name", json!(function))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("/", "users"), "/users");
        assert_eq!(join_path("/users", "{id}"), "/users/{id}");
    }

    #[test]
    fn test_overwriting_kinds_are_checked_before_create() {
        assert!(overwrites_silently(ResourceKind::Bucket));
        assert!(overwrites_silently(ResourceKind::Object));
        assert!(overwrites_silently(ResourceKind::RestApi));
        assert!(overwrites_silently(ResourceKind::Deployment));
        // AWS rejects these itself
        assert!(!overwrites_silently(ResourceKind::Role));
        assert!(!overwrites_silently(ResourceKind::Function));
        assert!(!overwrites_silently(ResourceKind::Permission));
    }

    #[test]
    fn test_method_state_matches_in_memory_shape() {
        let state = method_state("api1", "res1", "get", "/users");
        assert_eq!(state.id, "api1/res1/GET");
        assert_eq!(state.attribute_str("http_method"), Some("GET"));
        assert_eq!(state.attribute_str("path"), Some("/users"));
    }

    #[test]
    fn test_property_i32() {
        let r = ResolvedResource::new("fn", ResourceKind::Function)
            .with_property("memory-size", json!(128))
            .with_property("timeout", json!(i64::MAX));
        assert_eq!(property_i32(&r, "memory-size").unwrap(), Some(128));
        assert_eq!(property_i32(&r, "missing").unwrap(), None);
        assert!(property_i32(&r, "timeout").is_err());
    }

    #[test]
    fn test_missing_property_is_invalid_config() {
        let plane = AwsControlPlane::from_context(tokio_test::block_on(AwsContext::new(
            Some("us-east-1"),
            None,
        )));
        let err = tokio_test::block_on(
            plane.create(&ResolvedResource::new("bucket", ResourceKind::Bucket)),
        )
        .unwrap_err();
        assert!(matches!(err, CloudError::InvalidConfig(_)));
        assert_eq!(plane.region(), "us-east-1");
    }
}
