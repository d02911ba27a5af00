use crate::GlobalOpts;
use colored::Colorize;
use stackflow_cloud::{ControlPlane, InMemoryControlPlane, StackState};
use stackflow_cloud_aws::AwsControlPlane;
use stackflow_config::ConfigError;
use stackflow_core::{ResourceKind, StackTemplate};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Where a stack came from
pub enum StackSource {
    File(PathBuf),
    Builtin,
}

impl std::fmt::Display for StackSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StackSource::File(path) => write!(f, "{}", path.display()),
            StackSource::Builtin => write!(f, "built-in lambda-api stack"),
        }
    }
}

/// Find and load the stack file, falling back to the built-in stack
pub fn load_stack(file: Option<&Path>) -> anyhow::Result<(StackTemplate, StackSource)> {
    match stackflow_config::find_stack_file(file) {
        Ok(path) => {
            debug!(path = %path.display(), "Loading stack file");
            let template = stackflow_core::load_stack_file(&path)?;
            Ok((template, StackSource::File(path)))
        }
        Err(ConfigError::StackFileNotFound) => {
            eprintln!(
                "{}",
                "No stack file found, using the built-in lambda-api stack".yellow()
            );
            let template = stackflow_core::load_builtin_stack()?;
            Ok((template, StackSource::Builtin))
        }
        Err(e) => Err(e.into()),
    }
}

pub fn print_stack_header(action: &str, template: &StackTemplate, source: &StackSource) {
    println!(
        "{}",
        format!("{} stack '{}'", action, template.name).blue().bold()
    );
    println!("  source: {}", source.to_string().cyan());
}

/// Region from the command line, else the stack
pub fn region(opts: &GlobalOpts, template: &StackTemplate) -> Option<String> {
    opts.region.clone().or_else(|| template.region.clone())
}

/// Control plane for this run, AWS unless `--dry-run`, with a line
/// describing it
pub async fn connect(
    opts: &GlobalOpts,
    template: &StackTemplate,
) -> anyhow::Result<(Arc<dyn ControlPlane>, String)> {
    let region = region(opts, template);

    if opts.dry_run {
        let plane = match region {
            Some(region) => InMemoryControlPlane::with_region(region),
            None => InMemoryControlPlane::new(),
        };
        let plane: Arc<dyn ControlPlane> = Arc::new(plane);
        let description = "in-memory (dry run, nothing is created in AWS)".yellow().to_string();
        return Ok((plane, description));
    }

    debug!(region = ?region, profile = ?opts.profile, "Connecting to AWS");
    let plane = AwsControlPlane::new(region.as_deref(), opts.profile.as_deref()).await;
    let auth = plane.check_auth().await?;
    if !auth.authenticated {
        anyhow::bail!(
            "AWS authentication failed: {}",
            auth.error.unwrap_or_else(|| "unknown error".to_string())
        );
    }
    let description = format!(
        "{} ({})",
        plane.display_name().cyan(),
        auth.account_info.unwrap_or_default()
    );
    let plane: Arc<dyn ControlPlane> = Arc::new(plane);
    Ok((plane, description))
}

/// `GET https://…/v1/users` for every method of every deployed API
pub fn endpoints(state: &StackState) -> Vec<String> {
    let mut lines = Vec::new();
    for (_, deployment) in state.iter().filter(|(_, s)| s.kind == ResourceKind::Deployment) {
        let (Some(api), Some(url)) = (
            deployment.attribute_str("rest_api_id"),
            deployment.attribute_str("invoke_url"),
        ) else {
            continue;
        };
        for (_, method) in state.iter().filter(|(_, s)| {
            s.kind == ResourceKind::Method && s.attribute_str("rest_api_id") == Some(api)
        }) {
            lines.push(format!(
                "{} {}{}",
                method.attribute_str("http_method").unwrap_or("ANY"),
                url,
                method.attribute_str("path").unwrap_or_default()
            ));
        }
    }
    lines
}

pub fn print_endpoints(state: &StackState) {
    let endpoints = endpoints(state);
    if endpoints.is_empty() {
        return;
    }
    println!();
    println!("{}", "Endpoints:".bold());
    for endpoint in endpoints {
        println!("  {}", endpoint.green());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stackflow_cloud::ResourceState;

    #[test]
    fn test_endpoints() {
        let mut state = StackState::new();
        state.insert(
            "users-get",
            ResourceState::new("a1/r1/GET", ResourceKind::Method)
                .with_attribute("rest_api_id", json!("a1"))
                .with_attribute("http_method", json!("GET"))
                .with_attribute("path", json!("/users")),
        );
        state.insert(
            "deploy",
            ResourceState::new("d1", ResourceKind::Deployment)
                .with_attribute("rest_api_id", json!("a1"))
                .with_attribute(
                    "invoke_url",
                    json!("https://a1.execute-api.us-east-1.amazonaws.com/v1"),
                ),
        );

        assert_eq!(
            endpoints(&state),
            vec!["GET https://a1.execute-api.us-east-1.amazonaws.com/v1/users"]
        );
    }

    #[test]
    fn test_no_deployment_no_endpoints() {
        let mut state = StackState::new();
        state.insert(
            "users-get",
            ResourceState::new("a1/r1/GET", ResourceKind::Method)
                .with_attribute("rest_api_id", json!("a1")),
        );
        assert!(endpoints(&state).is_empty());
    }
}
