//! Template rendering
//!
//! Stack files are rendered with Tera before parsing, so names such as the
//! bucket suffix can be set per environment.

use crate::error::{Result, StackError};
use std::collections::HashMap;
use std::path::Path;
use tera::{Context, Tera};
use tracing::{debug, info};

/// Only environment variables with this prefix are exposed to templates
pub const ENV_PREFIX: &str = "STACKFLOW_";

/// Template processor
pub struct TemplateProcessor {
    tera: Tera,
    context: Context,
}

impl TemplateProcessor {
    pub fn new() -> Self {
        Self {
            tera: Tera::default(),
            context: Context::new(),
        }
    }

    pub fn add_variable(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.context.insert(key.into(), &value);
    }

    pub fn add_variables(&mut self, variables: &HashMap<String, String>) {
        for (key, value) in variables {
            self.context
                .insert(key.as_str(), &serde_json::Value::String(value.clone()));
        }
    }

    /// Add `STACKFLOW_*` environment variables.
    ///
    /// `STACKFLOW_SUFFIX=abc` is available both as `STACKFLOW_SUFFIX` and as
    /// `suffix`, so it overrides a `suffix` entry from the `variables` block.
    #[tracing::instrument(skip(self))]
    pub fn add_env_variables(&mut self) {
        let mut count = 0;

        for (key, value) in std::env::vars() {
            if let Some(short) = key.strip_prefix(ENV_PREFIX) {
                debug!(key = %key, "Adding environment variable");
                let value = serde_json::Value::String(value);
                self.context.insert(short.to_lowercase(), &value);
                self.context.insert(key, &value);
                count += 1;
            }
        }

        info!(env_var_count = count, "Added filtered environment variables");
    }

    /// Render a string as a template
    pub fn render_str(&mut self, template: &str) -> Result<String> {
        self.tera
            .render_str(template, &self.context)
            .map_err(|e| StackError::TemplateRenderError(extract_tera_error_detail(&e)))
    }

    /// Read and render a file
    pub fn render_file(&mut self, path: &Path) -> Result<String> {
        let content = std::fs::read_to_string(path).map_err(|e| StackError::IoError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        self.render_str(&content).map_err(|e| match e {
            StackError::TemplateRenderError(message) => StackError::TemplateError {
                file: path.to_path_buf(),
                message,
            },
            other => other,
        })
    }
}

impl Default for TemplateProcessor {
    fn default() -> Self {
        Self::new()
    }
}

/// Tera nests the useful message in the source chain
fn extract_tera_error_detail(e: &tera::Error) -> String {
    let mut message = e.to_string();
    let mut source = std::error::Error::source(e);
    while let Some(inner) = source {
        message = format!("{}: {}", message, inner);
        source = inner.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_with_variables() {
        let mut processor = TemplateProcessor::new();
        let mut vars = HashMap::new();
        vars.insert("suffix".to_string(), "01234".to_string());
        processor.add_variables(&vars);

        let rendered = processor
            .render_str(r#"bucket-name "generic-lambda-functions-{{ suffix }}""#)
            .unwrap();
        assert_eq!(rendered, r#"bucket-name "generic-lambda-functions-01234""#);
    }

    #[test]
    fn test_references_pass_through_untouched() {
        let mut processor = TemplateProcessor::new();
        let rendered = processor.render_str(r#"bucket "${code-bucket.name}""#).unwrap();
        assert_eq!(rendered, r#"bucket "${code-bucket.name}""#);
    }

    #[test]
    fn test_env_variables_are_prefixed_and_lowercased() {
        temp_env::with_vars(
            [
                ("STACKFLOW_SUFFIX", Some("from-env")),
                ("UNRELATED_SECRET", Some("hidden")),
            ],
            || {
                let mut processor = TemplateProcessor::new();
                processor.add_env_variables();

                let rendered = processor
                    .render_str("{{ suffix }} {{ STACKFLOW_SUFFIX }}")
                    .unwrap();
                assert_eq!(rendered, "from-env from-env");

                assert!(processor.render_str("{{ UNRELATED_SECRET }}").is_err());
            },
        );
    }

    #[test]
    fn test_undefined_variable_is_render_error() {
        let mut processor = TemplateProcessor::new();
        let err = processor.render_str("{{ missing }}").unwrap_err();
        assert!(matches!(err, StackError::TemplateRenderError(_)));
    }

    #[test]
    fn test_render_file_error_names_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stack.kdl");
        std::fs::write(&path, "{{ nope }}").unwrap();

        let mut processor = TemplateProcessor::new();
        match processor.render_file(&path) {
            Err(StackError::TemplateError { file, .. }) => assert_eq!(file, path),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
