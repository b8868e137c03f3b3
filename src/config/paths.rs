//! Path resolution for vitalsync configuration and data files.
//!
//! All vitalsync data is stored in `~/.vitalsync/` unless a different root is
//! given with `--home` or `VITALSYNC_HOME`:
//! - `config.yaml` - Main configuration file
//! - `vitalsync.db` - SQLite database holding the durable queue

use std::path::PathBuf;

use crate::error::VitalSyncError;

/// Paths to vitalsync configuration and data files.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Root directory: `~/.vitalsync/`
    pub root: PathBuf,
    /// Config file: `~/.vitalsync/config.yaml`
    pub config_file: PathBuf,
    /// Database file: `~/.vitalsync/vitalsync.db`
    pub database: PathBuf,
}

impl Paths {
    /// Create paths based on the user's home directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new() -> Result<Self, VitalSyncError> {
        let home = std::env::var("HOME").map_err(|_| {
            VitalSyncError::Config("Could not determine home directory".to_string())
        })?;

        Ok(Self::with_root(PathBuf::from(home).join(".vitalsync")))
    }

    /// Resolve paths from an optional override, falling back to the home directory.
    ///
    /// # Errors
    ///
    /// Returns an error if no override is given and the home directory cannot be determined.
    pub fn resolve(root_override: Option<PathBuf>) -> Result<Self, VitalSyncError> {
        root_override.map_or_else(Self::new, |root| Ok(Self::with_root(root)))
    }

    /// Create paths with a custom root directory.
    #[must_use]
    pub fn with_root(root: PathBuf) -> Self {
        Self {
            config_file: root.join("config.yaml"),
            database: root.join("vitalsync.db"),
            root,
        }
    }

    /// Ensure the root directory exists, creating it if necessary.
    ///
    /// # Errors
    ///
    /// Returns an error if directory creation fails.
    pub fn ensure_dirs(&self) -> Result<(), VitalSyncError> {
        if !self.root.exists() {
            std::fs::create_dir_all(&self.root).map_err(|e| {
                VitalSyncError::Config(format!(
                    "Failed to create directory {}: {e}",
                    self.root.display()
                ))
            })?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_paths_with_root() {
        let root = PathBuf::from("/tmp/test-vitalsync");
        let paths = Paths::with_root(root.clone());

        assert_eq!(paths.root, root);
        assert_eq!(paths.config_file, root.join("config.yaml"));
        assert_eq!(paths.database, root.join("vitalsync.db"));
    }

    #[test]
    fn test_resolve_prefers_override() {
        let root = PathBuf::from("/tmp/override");
        let paths = Paths::resolve(Some(root.clone())).unwrap();
        assert_eq!(paths.root, root);
    }

    #[test]
    fn test_ensure_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let paths = Paths::with_root(temp_dir.path().join("nested").join("root"));

        paths.ensure_dirs().unwrap();

        assert!(paths.root.exists());
    }
}
