//! Project discovery and structure
//!
//! A roster project is any directory holding a `.roster/` folder with the
//! project config and (by default) the database file.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the project marker directory
pub const PROJECT_DIR: &str = ".roster";

/// Default database file name inside [`PROJECT_DIR`]
pub const DATABASE_FILE: &str = "roster.db";

/// Represents a roster project
#[derive(Debug)]
pub struct Project {
    /// Root directory of the project (parent of .roster/)
    root: PathBuf,
}

impl Project {
    /// Find project root by walking up from the current directory
    pub fn discover() -> Result<Self, ProjectError> {
        let current =
            std::env::current_dir().map_err(|e| ProjectError::IoError(e.to_string()))?;
        Self::discover_from(&current)
    }

    /// Find project root by walking up from the given directory
    pub fn discover_from(start: &Path) -> Result<Self, ProjectError> {
        let mut current = start
            .canonicalize()
            .map_err(|e| ProjectError::IoError(e.to_string()))?;

        loop {
            if current.join(PROJECT_DIR).is_dir() {
                return Ok(Self { root: current });
            }

            if !current.pop() {
                return Err(ProjectError::NotFound {
                    searched_from: start.to_path_buf(),
                });
            }
        }
    }

    /// Create the `.roster/` directory and default config at `path`
    ///
    /// The database itself is created by the caller opening
    /// [`Project::database_path`].
    pub fn init(path: &Path) -> Result<Self, ProjectError> {
        std::fs::create_dir_all(path).map_err(|e| ProjectError::IoError(e.to_string()))?;
        let root = path
            .canonicalize()
            .unwrap_or_else(|_| path.to_path_buf());

        let roster_dir = root.join(PROJECT_DIR);
        if roster_dir.exists() {
            return Err(ProjectError::AlreadyExists(root.clone()));
        }

        std::fs::create_dir_all(&roster_dir).map_err(|e| ProjectError::IoError(e.to_string()))?;
        std::fs::write(roster_dir.join("config.yaml"), Self::default_config())
            .map_err(|e| ProjectError::IoError(e.to_string()))?;

        Ok(Self { root })
    }

    fn default_config() -> &'static str {
        r#"# Roster project configuration

# SQLite database file, relative to the project root
# (default: .roster/roster.db)
# database: .roster/roster.db

# Log filter, e.g. "roster=debug" (ROSTER_LOG overrides this)
# log_level: roster=info

# Also write logs to this file
# log_file: .roster/roster.log

# Default output format (auto, tsv, csv, json)
# default_format: auto
"#
    }

    /// Get the project root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the .roster configuration directory
    pub fn roster_dir(&self) -> PathBuf {
        self.root.join(PROJECT_DIR)
    }

    pub fn config_path(&self) -> PathBuf {
        self.roster_dir().join("config.yaml")
    }

    /// Default database location for this project
    pub fn database_path(&self) -> PathBuf {
        self.roster_dir().join(DATABASE_FILE)
    }

    /// Resolve a possibly relative path against the project root
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

/// Errors that can occur during project operations
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("not a roster project (searched from {searched_from:?}). Run 'roster init' to create one, or pass --db.")]
    NotFound { searched_from: PathBuf },

    #[error("roster project already exists at {0:?}")]
    AlreadyExists(PathBuf),

    #[error("IO error: {0}")]
    IoError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_project_init_creates_structure() {
        let tmp = tempdir().unwrap();
        let project = Project::init(tmp.path()).unwrap();

        assert!(project.roster_dir().is_dir());
        assert!(project.config_path().exists());
        assert!(project.database_path().ends_with(".roster/roster.db"));
    }

    #[test]
    fn test_project_init_fails_if_exists() {
        let tmp = tempdir().unwrap();
        Project::init(tmp.path()).unwrap();

        let err = Project::init(tmp.path()).unwrap_err();
        assert!(matches!(err, ProjectError::AlreadyExists(_)));
    }

    #[test]
    fn test_discover_from_subdirectory() {
        let tmp = tempdir().unwrap();
        Project::init(tmp.path()).unwrap();
        let nested = tmp.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();

        let project = Project::discover_from(&nested).unwrap();
        assert_eq!(project.root(), tmp.path().canonicalize().unwrap());
    }

    #[test]
    fn test_discover_fails_outside_project() {
        let tmp = tempdir().unwrap();
        let err = Project::discover_from(tmp.path()).unwrap_err();
        assert!(matches!(err, ProjectError::NotFound { .. }));
    }

    #[test]
    fn test_resolve_relative_paths() {
        let tmp = tempdir().unwrap();
        let project = Project::init(tmp.path()).unwrap();

        assert_eq!(project.resolve(Path::new("data/x.db")), project.root().join("data/x.db"));
        let abs = tmp.path().join("abs.db");
        assert_eq!(project.resolve(&abs), abs);
    }
}
