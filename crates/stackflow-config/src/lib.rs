pub mod error;

pub use error::*;

use std::path::{Path, PathBuf};

/// Environment variable naming the stack file directly
pub const STACK_FILE_ENV: &str = "STACKFLOW_FILE";

/// Candidate file names, highest priority first
pub const CANDIDATES: [&str; 4] = ["stack.local.kdl", ".stack.local.kdl", "stack.kdl", ".stack.kdl"];

/// Stackflow's config directory (`~/.config/stackflow`), created if missing
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("stackflow");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

/// Locate the stack file.
///
/// Search order:
/// 1. `explicit` (the `--file` flag)
/// 2. the `STACKFLOW_FILE` environment variable
/// 3. current directory: stack.local.kdl, .stack.local.kdl, stack.kdl, .stack.kdl
/// 4. the same names inside `./.stackflow/`
/// 5. `~/.config/stackflow/stack.kdl`
///
/// A path given explicitly must exist; it is never silently skipped.
pub fn find_stack_file(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return existing(path.to_path_buf(), "--file");
    }

    if let Ok(env_path) = std::env::var(STACK_FILE_ENV)
        && !env_path.is_empty()
    {
        return existing(PathBuf::from(env_path), STACK_FILE_ENV);
    }

    let current_dir = std::env::current_dir()?;

    if let Some(path) = find_in_dir(&current_dir) {
        return Ok(path);
    }

    let stack_dir = current_dir.join(".stackflow");
    if stack_dir.is_dir()
        && let Some(path) = find_in_dir(&stack_dir)
    {
        return Ok(path);
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global = config_dir.join("stackflow").join("stack.kdl");
        if global.exists() {
            return Ok(global);
        }
    }

    Err(ConfigError::StackFileNotFound)
}

fn find_in_dir(dir: &Path) -> Option<PathBuf> {
    CANDIDATES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.exists())
}

fn existing(path: PathBuf, source_name: &'static str) -> Result<PathBuf> {
    if path.exists() {
        tracing::debug!(path = %path.display(), source = source_name, "Using stack file");
        Ok(path)
    } else {
        Err(ConfigError::ExplicitFileMissing { source_name, path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    /// Run `f` with the working directory set to `dir`
    fn in_dir<T>(dir: &Path, f: impl FnOnce() -> T) -> T {
        let original_dir = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir).unwrap();
        let result = f();
        std::env::set_current_dir(original_dir).unwrap();
        result
    }

    #[test]
    fn test_get_config_dir() {
        let config_dir = get_config_dir().unwrap();
        assert!(config_dir.ends_with("stackflow"));
        assert!(config_dir.exists());
    }

    #[test]
    #[serial]
    fn test_find_stack_file_in_current_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("stack.kdl"), "// test").unwrap();

        let found = in_dir(temp_dir.path(), || find_stack_file(None)).unwrap();
        assert!(found.ends_with("stack.kdl"));
    }

    #[test]
    #[serial]
    fn test_local_file_takes_priority() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("stack.kdl"), "// shared").unwrap();
        fs::write(temp_dir.path().join("stack.local.kdl"), "// local").unwrap();

        let found = in_dir(temp_dir.path(), || find_stack_file(None)).unwrap();
        assert!(found.ends_with("stack.local.kdl"));
    }

    #[test]
    #[serial]
    fn test_hidden_local_file_beats_visible_shared_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join(".stack.local.kdl"), "// hidden local").unwrap();
        fs::write(temp_dir.path().join("stack.kdl"), "// visible").unwrap();

        let found = in_dir(temp_dir.path(), || find_stack_file(None)).unwrap();
        assert!(found.ends_with(".stack.local.kdl"));
    }

    #[test]
    #[serial]
    fn test_find_stack_file_in_stackflow_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let stack_dir = temp_dir.path().join(".stackflow");
        fs::create_dir(&stack_dir).unwrap();
        fs::write(stack_dir.join("stack.kdl"), "// in dir").unwrap();

        let found = in_dir(temp_dir.path(), || find_stack_file(None)).unwrap();
        assert!(found.ends_with(".stackflow/stack.kdl"));
    }

    #[test]
    #[serial]
    fn test_env_var_selects_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let custom = temp_dir.path().join("custom.kdl");
        fs::write(&custom, "// custom").unwrap();

        unsafe {
            std::env::set_var(STACK_FILE_ENV, &custom);
        }
        let result = find_stack_file(None);
        unsafe {
            std::env::remove_var(STACK_FILE_ENV);
        }

        assert_eq!(result.unwrap(), custom);
    }

    #[test]
    #[serial]
    fn test_explicit_path_must_exist() {
        let temp_dir = tempfile::tempdir().unwrap();
        let missing = temp_dir.path().join("missing.kdl");

        match find_stack_file(Some(&missing)) {
            Err(ConfigError::ExplicitFileMissing { source_name, path }) => {
                assert_eq!(source_name, "--file");
                assert_eq!(path, missing);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    #[serial]
    fn test_explicit_path_wins_over_current_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("stack.kdl"), "// cwd").unwrap();
        let other = temp_dir.path().join("other.kdl");
        fs::write(&other, "// explicit").unwrap();

        let found = in_dir(temp_dir.path(), || find_stack_file(Some(&other))).unwrap();
        assert_eq!(found, other);
    }

    #[test]
    #[serial]
    fn test_find_stack_file_not_found() {
        let temp_dir = tempfile::tempdir().unwrap();

        let result = in_dir(temp_dir.path(), || find_stack_file(None));

        // A global ~/.config/stackflow/stack.kdl on the test machine would be found
        let global_exists = dirs::config_dir()
            .map(|d| d.join("stackflow").join("stack.kdl").exists())
            .unwrap_or(false);
        if !global_exists {
            assert!(matches!(result, Err(ConfigError::StackFileNotFound)));
        }
    }
}
