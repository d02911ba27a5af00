use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config directory not found")]
    ConfigDirNotFound,

    #[error(
        "Stack file not found. Looked in:\n\
        - current directory: stack.local.kdl, .stack.local.kdl, stack.kdl, .stack.kdl\n\
        - ./.stackflow/ directory\n\
        - ~/.config/stackflow/stack.kdl\n\
        Set STACKFLOW_FILE or pass --file to choose one explicitly"
    )]
    StackFileNotFound,

    #[error("Stack file given by {source_name} does not exist: {path}")]
    ExplicitFileMissing {
        source_name: &'static str,
        path: std::path::PathBuf,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
