//! Lambda functions and their resource policies

use crate::context::AwsContext;
use crate::error::{SdkResultExt, not_found_as_none};
use aws_sdk_lambda::Client;
use aws_sdk_lambda::types::{Architecture, FunctionCode, FunctionConfiguration, Runtime, State};
use stackflow_cloud::{CloudError, Result, WaitConfig, retry_while_not_ready, wait_until};
use tracing::{debug, info};

/// Parameters for [`LambdaOps::create_function`]
#[derive(Debug, Clone, Default)]
pub struct FunctionRequest<'a> {
    pub function_name: &'a str,
    pub role_arn: &'a str,
    pub code_bucket: &'a str,
    pub code_key: &'a str,
    pub runtime: &'a str,
    pub handler: &'a str,
    pub description: Option<&'a str>,
    pub memory_size: Option<i32>,
    pub timeout: Option<i32>,
    pub architecture: Option<&'a str>,
}

pub struct LambdaOps {
    client: Client,
}

impl LambdaOps {
    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.lambda_client(),
        }
    }

    /// Create the function from code in S3 and wait until it is `Active`.
    ///
    /// A role created moments ago may not be assumable yet; that rejection
    /// is retried within `wait`. Returns the function ARN.
    pub async fn create_function(&self, request: &FunctionRequest<'_>, wait: &WaitConfig) -> Result<String> {
        let name = request.function_name;
        info!(function = %name, runtime = %request.runtime, "Creating Lambda function");

        let this = self;
        let output = retry_while_not_ready(wait, name, move || async move {
            let code = FunctionCode::builder()
                .s3_bucket(request.code_bucket)
                .s3_key(request.code_key)
                .build();

            let mut call = this
                .client
                .create_function()
                .function_name(name)
                .role(request.role_arn)
                .runtime(Runtime::from(request.runtime))
                .handler(request.handler)
                .code(code)
                .set_description(request.description.map(str::to_string))
                .set_memory_size(request.memory_size)
                .set_timeout(request.timeout);
            if let Some(arch) = request.architecture {
                call = call.architectures(Architecture::from(arch));
            }
            call.send()
                .await
                .classify("CreateFunction")
                .map_err(CloudError::from)
        })
        .await?;

        let arn = output.function_arn().unwrap_or_default().to_string();
        debug!(function = %name, arn = %arn, "Function created, waiting for Active");

        wait_until(wait, name, move || async move {
            let Some(config) = this.get_function(name).await? else {
                return Ok(false);
            };
            match config.state() {
                Some(State::Active) => Ok(true),
                Some(State::Failed) => Err(CloudError::ApiError(format!(
                    "function {} failed to start: {}",
                    name,
                    config.state_reason().unwrap_or("no reason given")
                ))),
                _ => Ok(false),
            }
        })
        .await?;

        Ok(arn)
    }

    /// Function configuration, if the function exists
    pub async fn get_function(&self, function_name: &str) -> Result<Option<FunctionConfiguration>> {
        let result = self
            .client
            .get_function()
            .function_name(function_name)
            .send()
            .await
            .classify("GetFunction");
        Ok(not_found_as_none(result)?.and_then(|o| o.configuration().cloned()))
    }

    pub async fn delete_function(&self, function_name: &str) -> Result<()> {
        info!(function = %function_name, "Deleting Lambda function");
        self.client
            .delete_function()
            .function_name(function_name)
            .send()
            .await
            .classify("DeleteFunction")?;
        Ok(())
    }

    /// Allow `principal` to invoke the function from `source_arn`
    pub async fn add_permission(
        &self,
        function_name: &str,
        statement_id: &str,
        principal: &str,
        source_arn: &str,
    ) -> Result<()> {
        info!(
            function = %function_name,
            statement_id = %statement_id,
            principal = %principal,
            "Adding invoke permission"
        );
        self.client
            .add_permission()
            .function_name(function_name)
            .statement_id(statement_id)
            .action("lambda:InvokeFunction")
            .principal(principal)
            .source_arn(source_arn)
            .send()
            .await
            .classify("AddPermission")?;
        Ok(())
    }

    /// Whether the function's resource policy has `statement_id`
    pub async fn has_permission(&self, function_name: &str, statement_id: &str) -> Result<bool> {
        let result = self
            .client
            .get_policy()
            .function_name(function_name)
            .send()
            .await
            .classify("GetPolicy");
        let Some(output) = not_found_as_none(result)? else {
            return Ok(false);
        };
        let Some(policy) = output.policy() else {
            return Ok(false);
        };
        Ok(policy_has_statement(policy, statement_id)?)
    }

    pub async fn remove_permission(&self, function_name: &str, statement_id: &str) -> Result<()> {
        info!(function = %function_name, statement_id = %statement_id, "Removing invoke permission");
        self.client
            .remove_permission()
            .function_name(function_name)
            .statement_id(statement_id)
            .send()
            .await
            .classify("RemovePermission")?;
        Ok(())
    }
}

/// Whether a resource policy document contains a statement with `sid`
pub fn policy_has_statement(policy: &str, sid: &str) -> serde_json::Result<bool> {
    let document: serde_json::Value = serde_json::from_str(policy)?;
    Ok(document["Statement"]
        .as_array()
        .is_some_and(|statements| statements.iter().any(|s| s["Sid"] == sid)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_has_statement() {
        let policy = r#"{
            "Version": "2012-10-17",
            "Id": "default",
            "Statement": [
                { "Sid": "stackflow-echo-apigateway", "Effect": "Allow" }
            ]
        }"#;
        assert!(policy_has_statement(policy, "stackflow-echo-apigateway").unwrap());
        assert!(!policy_has_statement(policy, "other").unwrap());
    }

    #[test]
    fn test_policy_without_statements() {
        assert!(!policy_has_statement(r#"{"Version":"2012-10-17"}"#, "x").unwrap());
        assert!(policy_has_statement("not json", "x").is_err());
    }
}
