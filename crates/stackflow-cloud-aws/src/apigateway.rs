//! API Gateway REST APIs

use crate::context::AwsContext;
use crate::error::{SdkResultExt, not_found_as_none};
use aws_sdk_apigateway::Client;
use aws_sdk_apigateway::types::{EndpointConfiguration, EndpointType, IntegrationType};
use stackflow_cloud::{CloudError, Result};
use tracing::{debug, info};

/// Largest page the listing calls accept
const PAGE_LIMIT: i32 = 500;

/// Parameters for [`ApiGatewayOps::put_method`]
#[derive(Debug, Clone, Default)]
pub struct MethodRequest<'a> {
    pub rest_api_id: &'a str,
    pub resource_id: &'a str,
    pub http_method: &'a str,
    pub authorization_type: &'a str,
    /// Optional query string parameters to declare
    pub query_parameters: Vec<String>,
    /// Lambda function receiving proxied requests
    pub function_arn: Option<&'a str>,
    /// Model for the `200` response
    pub response_model: Option<&'a str>,
}

pub struct ApiGatewayOps {
    client: Client,
    region: String,
}

impl ApiGatewayOps {
    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.apigateway_client(),
            region: ctx.region().to_string(),
        }
    }

    /// Public URL of a deployed stage
    pub fn invoke_url(&self, rest_api_id: &str, stage: &str) -> String {
        invoke_url(rest_api_id, &self.region, stage)
    }

    /// Create the API; returns `(id, root_resource_id)`
    pub async fn create_rest_api(
        &self,
        name: &str,
        description: Option<&str>,
        endpoint_type: Option<&str>,
    ) -> Result<(String, String)> {
        info!(name = %name, "Creating REST API");

        let output = self
            .client
            .create_rest_api()
            .name(name)
            .set_description(description.map(str::to_string))
            .set_endpoint_configuration(endpoint_type.map(|t| {
                EndpointConfiguration::builder()
                    .types(EndpointType::from(t))
                    .build()
            }))
            .send()
            .await
            .classify("CreateRestApi")?;

        let id = output
            .id()
            .ok_or_else(|| CloudError::ApiError(format!("CreateRestApi returned no id for {}", name)))?
            .to_string();
        let root = self.find_resource(&id, "/").await?.ok_or_else(|| {
            CloudError::ApiError(format!("REST API {} has no root resource", id))
        })?;
        debug!(id = %id, root = %root, "REST API created");
        Ok((id, root))
    }

    /// Look an API up by name; returns `(id, root_resource_id)`
    pub async fn find_rest_api(&self, name: &str) -> Result<Option<(String, String)>> {
        let mut position: Option<String> = None;
        loop {
            let output = self
                .client
                .get_rest_apis()
                .limit(PAGE_LIMIT)
                .set_position(position.clone())
                .send()
                .await
                .classify("GetRestApis")?;

            if let Some(id) = output
                .items()
                .iter()
                .find(|api| api.name() == Some(name))
                .and_then(|api| api.id())
            {
                let id = id.to_string();
                let root = self.find_resource(&id, "/").await?.unwrap_or_default();
                return Ok(Some((id, root)));
            }

            match output.position() {
                Some(next) if output.items().len() as i32 >= PAGE_LIMIT => {
                    position = Some(next.to_string())
                }
                _ => return Ok(None),
            }
        }
    }

    pub async fn delete_rest_api(&self, rest_api_id: &str) -> Result<()> {
        info!(rest_api_id = %rest_api_id, "Deleting REST API");
        self.client
            .delete_rest_api()
            .rest_api_id(rest_api_id)
            .send()
            .await
            .classify("DeleteRestApi")?;
        Ok(())
    }

    pub async fn create_model(
        &self,
        rest_api_id: &str,
        name: &str,
        content_type: &str,
        schema: Option<&serde_json::Value>,
    ) -> Result<()> {
        info!(rest_api_id = %rest_api_id, model = %name, "Creating model");
        self.client
            .create_model()
            .rest_api_id(rest_api_id)
            .name(name)
            .content_type(content_type)
            .set_schema(schema.map(|s| s.to_string()))
            .send()
            .await
            .classify("CreateModel")?;
        Ok(())
    }

    pub async fn model_exists(&self, rest_api_id: &str, name: &str) -> Result<bool> {
        let result = self
            .client
            .get_model()
            .rest_api_id(rest_api_id)
            .model_name(name)
            .send()
            .await
            .classify("GetModel");
        Ok(not_found_as_none(result)?.is_some())
    }

    pub async fn delete_model(&self, rest_api_id: &str, name: &str) -> Result<()> {
        info!(rest_api_id = %rest_api_id, model = %name, "Deleting model");
        self.client
            .delete_model()
            .rest_api_id(rest_api_id)
            .model_name(name)
            .send()
            .await
            .classify("DeleteModel")?;
        Ok(())
    }

    /// Create a path segment; returns `(id, path)`
    pub async fn create_resource(
        &self,
        rest_api_id: &str,
        parent_id: &str,
        path_part: &str,
    ) -> Result<(String, String)> {
        info!(rest_api_id = %rest_api_id, path_part = %path_part, "Creating resource");
        let output = self
            .client
            .create_resource()
            .rest_api_id(rest_api_id)
            .parent_id(parent_id)
            .path_part(path_part)
            .send()
            .await
            .classify("CreateResource")?;

        let id = output.id().unwrap_or_default().to_string();
        let path = output.path().unwrap_or_default().to_string();
        Ok((id, path))
    }

    /// Full path of a resource, if it exists
    pub async fn resource_path(&self, rest_api_id: &str, resource_id: &str) -> Result<Option<String>> {
        let result = self
            .client
            .get_resource()
            .rest_api_id(rest_api_id)
            .resource_id(resource_id)
            .send()
            .await
            .classify("GetResource");
        Ok(not_found_as_none(result)?.map(|r| r.path().unwrap_or_default().to_string()))
    }

    /// Id of the resource at `path`, if any
    pub async fn find_resource(&self, rest_api_id: &str, path: &str) -> Result<Option<String>> {
        let mut position: Option<String> = None;
        loop {
            let result = self
                .client
                .get_resources()
                .rest_api_id(rest_api_id)
                .limit(PAGE_LIMIT)
                .set_position(position.clone())
                .send()
                .await
                .classify("GetResources");
            let Some(output) = not_found_as_none(result)? else {
                return Ok(None);
            };

            if let Some(id) = output
                .items()
                .iter()
                .find(|r| r.path() == Some(path))
                .and_then(|r| r.id())
            {
                return Ok(Some(id.to_string()));
            }

            match output.position() {
                Some(next) if output.items().len() as i32 >= PAGE_LIMIT => {
                    position = Some(next.to_string())
                }
                _ => return Ok(None),
            }
        }
    }

    pub async fn delete_resource(&self, rest_api_id: &str, resource_id: &str) -> Result<()> {
        info!(rest_api_id = %rest_api_id, resource_id = %resource_id, "Deleting resource");
        self.client
            .delete_resource()
            .rest_api_id(rest_api_id)
            .resource_id(resource_id)
            .send()
            .await
            .classify("DeleteResource")?;
        Ok(())
    }

    /// Declare the method, integrate it with the function (Lambda proxy)
    /// and declare its `200` response
    pub async fn put_method(&self, request: &MethodRequest<'_>) -> Result<()> {
        let http_method = request.http_method.to_ascii_uppercase();
        info!(
            rest_api_id = %request.rest_api_id,
            resource_id = %request.resource_id,
            http_method = %http_method,
            "Creating method"
        );

        let mut call = self
            .client
            .put_method()
            .rest_api_id(request.rest_api_id)
            .resource_id(request.resource_id)
            .http_method(&http_method)
            .authorization_type(request.authorization_type);
        for name in &request.query_parameters {
            call = call.request_parameters(format!("method.request.querystring.{}", name), false);
        }
        call.send().await.classify("PutMethod")?;

        if let Some(function_arn) = request.function_arn {
            self.client
                .put_integration()
                .rest_api_id(request.rest_api_id)
                .resource_id(request.resource_id)
                .http_method(&http_method)
                .r#type(IntegrationType::AwsProxy)
                .integration_http_method("POST")
                .uri(lambda_integration_uri(&self.region, function_arn))
                .send()
                .await
                .classify("PutIntegration")?;
            debug!(function_arn = %function_arn, "Lambda proxy integration added");
        }

        if let Some(model) = request.response_model {
            self.client
                .put_method_response()
                .rest_api_id(request.rest_api_id)
                .resource_id(request.resource_id)
                .http_method(&http_method)
                .status_code("200")
                .response_models("application/json", model)
                .send()
                .await
                .classify("PutMethodResponse")?;
        }

        Ok(())
    }

    pub async fn method_exists(&self, rest_api_id: &str, resource_id: &str, http_method: &str) -> Result<bool> {
        let result = self
            .client
            .get_method()
            .rest_api_id(rest_api_id)
            .resource_id(resource_id)
            .http_method(http_method.to_ascii_uppercase())
            .send()
            .await
            .classify("GetMethod");
        Ok(not_found_as_none(result)?.is_some())
    }

    pub async fn delete_method(&self, rest_api_id: &str, resource_id: &str, http_method: &str) -> Result<()> {
        info!(rest_api_id = %rest_api_id, resource_id = %resource_id, http_method = %http_method, "Deleting method");
        self.client
            .delete_method()
            .rest_api_id(rest_api_id)
            .resource_id(resource_id)
            .http_method(http_method.to_ascii_uppercase())
            .send()
            .await
            .classify("DeleteMethod")?;
        Ok(())
    }

    /// Deploy the API to `stage`; returns the deployment id
    pub async fn create_deployment(
        &self,
        rest_api_id: &str,
        stage: &str,
        description: Option<&str>,
    ) -> Result<String> {
        info!(rest_api_id = %rest_api_id, stage = %stage, "Creating deployment");
        let output = self
            .client
            .create_deployment()
            .rest_api_id(rest_api_id)
            .stage_name(stage)
            .set_description(description.map(str::to_string))
            .send()
            .await
            .classify("CreateDeployment")?;
        Ok(output.id().unwrap_or_default().to_string())
    }

    /// Deployment currently serving `stage`, if the stage exists
    pub async fn stage_deployment(&self, rest_api_id: &str, stage: &str) -> Result<Option<String>> {
        let result = self
            .client
            .get_stage()
            .rest_api_id(rest_api_id)
            .stage_name(stage)
            .send()
            .await
            .classify("GetStage");
        Ok(not_found_as_none(result)?.and_then(|s| s.deployment_id().map(str::to_string)))
    }

    /// Delete the stage, then the deployment behind it
    pub async fn delete_deployment(&self, rest_api_id: &str, stage: &str, deployment_id: &str) -> Result<()> {
        info!(rest_api_id = %rest_api_id, stage = %stage, deployment_id = %deployment_id, "Deleting deployment");
        let stage_result = self
            .client
            .delete_stage()
            .rest_api_id(rest_api_id)
            .stage_name(stage)
            .send()
            .await
            .classify("DeleteStage");
        not_found_as_none(stage_result)?;

        self.client
            .delete_deployment()
            .rest_api_id(rest_api_id)
            .deployment_id(deployment_id)
            .send()
            .await
            .classify("DeleteDeployment")?;
        Ok(())
    }
}

/// `https://{api}.execute-api.{region}.amazonaws.com/{stage}`
pub fn invoke_url(rest_api_id: &str, region: &str, stage: &str) -> String {
    format!(
        "https://{}.execute-api.{}.amazonaws.com/{}",
        rest_api_id, region, stage
    )
}

/// Integration URI API Gateway uses to call a Lambda function
pub fn lambda_integration_uri(region: &str, function_arn: &str) -> String {
    format!(
        "arn:aws:apigateway:{}:lambda:path/2015-03-31/functions/{}/invocations",
        region, function_arn
    )
}

/// Source ARN restricting which API routes may invoke a function
pub fn execute_api_arn(region: &str, account: &str, rest_api_id: &str, source_path: &str) -> String {
    format!(
        "arn:aws:execute-api:{}:{}:{}{}",
        region, account, rest_api_id, source_path
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invoke_url() {
        assert_eq!(
            invoke_url("a1b2c3", "us-east-1", "v1"),
            "https://a1b2c3.execute-api.us-east-1.amazonaws.com/v1"
        );
    }

    #[test]
    fn test_lambda_integration_uri() {
        assert_eq!(
            lambda_integration_uri(
                "us-east-1",
                "arn:aws:lambda:us-east-1:123456789012:function:stackflow-echo"
            ),
            "arn:aws:apigateway:us-east-1:lambda:path/2015-03-31/functions/arn:aws:lambda:us-east-1:123456789012:function:stackflow-echo/invocations"
        );
    }

    #[test]
    fn test_execute_api_arn() {
        assert_eq!(
            execute_api_arn("us-east-1", "123456789012", "a1b2c3", "/*/GET/users"),
            "arn:aws:execute-api:us-east-1:123456789012:a1b2c3/*/GET/users"
        );
    }
}
