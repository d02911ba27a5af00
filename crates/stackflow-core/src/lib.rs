//! Stackflow core
//!
//! Stack files, the resource model and dependency ordering.
//!
//! A stack file is KDL rendered through Tera. Each `resource` node becomes a
//! [`ResourceSpec`]; references of the form `${name.attribute}` between them
//! add implicit dependencies, and [`DependencyGraph`] turns the whole set
//! into a creation order (and its reverse for deletion).

pub mod cloudformation;
pub mod error;
pub mod graph;
pub mod loader;
pub mod model;
pub mod parser;
pub mod reference;
pub mod template;

// Re-exports
pub use cloudformation::{ExportFormat, render_cloudformation, to_cloudformation};
pub use error::{Result, StackError};
pub use graph::DependencyGraph;
pub use loader::{BUILTIN_STACK, load_builtin_stack, load_stack_file, load_stack_str};
pub use model::{ResourceKind, ResourceSpec, StackTemplate};
pub use parser::{parse_kdl_file, parse_kdl_string};
pub use reference::{Reference, resolve_value};
pub use template::TemplateProcessor;
