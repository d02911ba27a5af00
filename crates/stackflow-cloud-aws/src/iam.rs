//! IAM execution roles

use crate::context::AwsContext;
use crate::error::{SdkResultExt, not_found_as_none};
use aws_sdk_iam::Client;
use stackflow_cloud::{CloudError, Result, WaitConfig, wait_until};
use stackflow_core::cloudformation::assume_role_policy;
use tracing::{debug, info};

/// Parameters for [`IamOps::create_role`]
#[derive(Debug, Clone, Default)]
pub struct RoleRequest<'a> {
    pub role_name: &'a str,
    /// Service principal allowed to assume the role
    pub service: &'a str,
    pub description: Option<&'a str>,
    pub managed_policies: Vec<String>,
    pub inline_policy: Option<serde_json::Value>,
}

pub struct IamOps {
    client: Client,
}

impl IamOps {
    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.iam_client(),
        }
    }

    /// Name of the inline policy a role carries
    pub fn inline_policy_name(role_name: &str) -> String {
        format!("{}-inline", role_name)
    }

    /// Create the role, attach its policies and wait until it is readable.
    /// Returns the role ARN.
    pub async fn create_role(&self, request: &RoleRequest<'_>, wait: &WaitConfig) -> Result<String> {
        let role_name = request.role_name;
        info!(role_name = %role_name, service = %request.service, "Creating IAM role");

        let output = self
            .client
            .create_role()
            .role_name(role_name)
            .assume_role_policy_document(assume_role_policy(request.service).to_string())
            .set_description(request.description.map(str::to_string))
            .send()
            .await
            .classify("CreateRole")?;

        let arn = output
            .role()
            .map(|r| r.arn().to_string())
            .ok_or_else(|| CloudError::ApiError(format!("CreateRole returned no role for {}", role_name)))?;
        debug!(role_name = %role_name, arn = %arn, "IAM role created");

        for policy_arn in &request.managed_policies {
            self.client
                .attach_role_policy()
                .role_name(role_name)
                .policy_arn(policy_arn)
                .send()
                .await
                .classify("AttachRolePolicy")?;
            debug!(role_name = %role_name, policy_arn = %policy_arn, "Managed policy attached");
        }

        if let Some(policy) = &request.inline_policy {
            self.client
                .put_role_policy()
                .role_name(role_name)
                .policy_name(Self::inline_policy_name(role_name))
                .policy_document(policy.to_string())
                .send()
                .await
                .classify("PutRolePolicy")?;
            debug!(role_name = %role_name, "Inline policy attached");
        }

        let this = self;
        wait_until(wait, role_name, move || async move {
            Ok(this.get_role(role_name).await?.is_some())
        })
        .await?;

        Ok(arn)
    }

    /// ARN of the role, if it exists
    pub async fn get_role(&self, role_name: &str) -> Result<Option<String>> {
        let result = self
            .client
            .get_role()
            .role_name(role_name)
            .send()
            .await
            .classify("GetRole");
        Ok(not_found_as_none(result)?.and_then(|o| o.role().map(|r| r.arn().to_string())))
    }

    /// Detach managed policies and delete inline ones, then the role
    pub async fn delete_role(&self, role_name: &str) -> Result<()> {
        info!(role_name = %role_name, "Deleting IAM role");

        let attached = self
            .client
            .list_attached_role_policies()
            .role_name(role_name)
            .send()
            .await
            .classify("ListAttachedRolePolicies")?;
        for policy_arn in attached.attached_policies().iter().filter_map(|p| p.policy_arn()) {
            self.client
                .detach_role_policy()
                .role_name(role_name)
                .policy_arn(policy_arn)
                .send()
                .await
                .classify("DetachRolePolicy")?;
            debug!(role_name = %role_name, policy_arn = %policy_arn, "Managed policy detached");
        }

        let inline = self
            .client
            .list_role_policies()
            .role_name(role_name)
            .send()
            .await
            .classify("ListRolePolicies")?;
        for policy_name in inline.policy_names() {
            self.client
                .delete_role_policy()
                .role_name(role_name)
                .policy_name(policy_name)
                .send()
                .await
                .classify("DeleteRolePolicy")?;
            debug!(role_name = %role_name, policy_name = %policy_name, "Inline policy deleted");
        }

        self.client
            .delete_role()
            .role_name(role_name)
            .send()
            .await
            .classify("DeleteRole")?;
        Ok(())
    }
}
