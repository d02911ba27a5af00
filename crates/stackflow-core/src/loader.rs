//! Stack loading: render, parse, validate

use crate::error::{Result, StackError};
use crate::model::StackTemplate;
use crate::parser::{extract_variables, parse_kdl_string};
use crate::template::TemplateProcessor;
use std::path::Path;
use tracing::{debug, info};

/// Stack compiled into the binary: bucket, code upload, role, function and
/// a REST API exposing it.
pub const BUILTIN_STACK: &str = include_str!("../templates/lambda-api.kdl");

/// Load a stack file: extract variables, render with Tera, parse, validate
pub fn load_stack_file(path: &Path) -> Result<StackTemplate> {
    let content = std::fs::read_to_string(path).map_err(|e| StackError::IoError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let default_name = path
        .file_stem()
        .and_then(|n| n.to_str())
        .unwrap_or("stack")
        .to_string();

    load_stack_str(&content, default_name).map_err(|e| match e {
        StackError::TemplateRenderError(message) => StackError::TemplateError {
            file: path.to_path_buf(),
            message,
        },
        other => other,
    })
}

/// Load the built-in stack
pub fn load_builtin_stack() -> Result<StackTemplate> {
    load_stack_str(BUILTIN_STACK, "lambda-api".to_string())
}

/// Render and parse stack file contents
pub fn load_stack_str(content: &str, default_name: String) -> Result<StackTemplate> {
    let variables = extract_variables(content);
    debug!(count = variables.len(), "Extracted stack variables");

    let mut processor = TemplateProcessor::new();
    processor.add_variables(&variables);
    processor.add_env_variables();
    let rendered = processor.render_str(content)?;

    let mut template = parse_kdl_string(&rendered, default_name)?;
    // Keep the pre-render values; rendering may have expanded them
    for (key, value) in variables {
        template.variables.entry(key).or_insert(value);
    }

    template.validate()?;
    info!(
        stack = %template.name,
        resources = template.len(),
        "Loaded stack"
    );
    Ok(template)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ResourceKind;

    #[test]
    fn test_builtin_stack_is_valid() {
        let template = load_builtin_stack().unwrap();
        assert_eq!(template.name, "lambda-api");
        assert_eq!(template.region.as_deref(), Some("us-east-1"));
        assert_eq!(template.len(), 10);

        for kind in ResourceKind::ALL {
            assert_eq!(template.by_kind(kind).len(), 1, "one {} expected", kind);
        }
    }

    #[test]
    fn test_builtin_stack_renders_variables() {
        temp_env::with_var_unset("STACKFLOW_SUFFIX", || {
            let template = load_builtin_stack().unwrap();
            let bucket = template.get("code-bucket").unwrap();
            assert_eq!(
                bucket.property_str("bucket-name"),
                Some("generic-lambda-functions-01234")
            );
            let function = template.get("echo-function").unwrap();
            assert_eq!(function.property_str("function-name"), Some("stackflow-echo"));
        });
    }

    #[test]
    fn test_builtin_order_uploads_code_before_function() {
        let template = load_builtin_stack().unwrap();
        let graph = template.graph().unwrap();
        let order: Vec<&str> = graph
            .creation_order()
            .unwrap()
            .iter()
            .map(|r| r.name.as_str())
            .collect();

        let pos = |n: &str| order.iter().position(|x| *x == n).unwrap();
        assert!(pos("code-bucket") < pos("function-code"));
        assert!(pos("function-code") < pos("echo-function"));
        assert!(pos("execution-role") < pos("echo-function"));
        assert!(pos("users-get") < pos("api-deployment"));
        assert!(pos("echo-function") < pos("invoke-permission"));
    }

    #[test]
    fn test_env_overrides_suffix() {
        temp_env::with_var("STACKFLOW_SUFFIX", Some("99999"), || {
            let template = load_builtin_stack().unwrap();
            assert_eq!(
                template.get("code-bucket").unwrap().property_str("bucket-name"),
                Some("generic-lambda-functions-99999")
            );
        });
    }

    #[test]
    fn test_load_stack_file_reports_template_errors_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stack.kdl");
        std::fs::write(
            &path,
            r#"resource "b" kind="bucket" { bucket-name "{{ undefined_var }}" }"#,
        )
        .unwrap();

        match load_stack_file(&path) {
            Err(StackError::TemplateError { file, .. }) => assert_eq!(file, path),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_load_stack_file_uses_file_stem_as_default_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("demo.kdl");
        std::fs::write(&path, r#"resource "b" kind="bucket""#).unwrap();

        let template = load_stack_file(&path).unwrap();
        assert_eq!(template.name, "demo");
        assert_eq!(template.len(), 1);
    }

    #[test]
    fn test_load_rejects_cycles() {
        let content = r#"
            resource "a" kind="bucket" { depends-on "b" }
            resource "b" kind="bucket" { depends-on "a" }
        "#;
        assert!(matches!(
            load_stack_str(content, "cyclic".to_string()),
            Err(StackError::CircularDependency(_))
        ));
    }
}
