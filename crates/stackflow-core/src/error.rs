use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StackError {
    #[error("KDL parse error: {0}")]
    KdlParse(#[from] kdl::KdlError),

    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("IO error: {path}\nreason: {message}")]
    IoError { path: PathBuf, message: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Resource '{resource}' has unknown kind '{kind}'")]
    UnknownKind { resource: String, kind: String },

    #[error("Resource '{0}' is declared more than once")]
    DuplicateResource(String),

    #[error("Resource '{resource}' depends on undeclared resource '{dependency}'")]
    UnknownDependency {
        resource: String,
        dependency: String,
    },

    #[error("Circular dependency detected: {0}")]
    CircularDependency(String),

    #[error("Template error: {file}\nreason: {message}")]
    TemplateError { file: PathBuf, message: String },

    #[error("Template render error: {0}")]
    TemplateRenderError(String),

    #[error("Resource '{resource}' references unresolved value '{reference}'")]
    UnresolvedReference { resource: String, reference: String },

    #[error("Export error: {0}")]
    ExportError(String),
}

pub type Result<T> = std::result::Result<T, StackError>;
