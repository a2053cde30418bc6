//! Configuration management with layered hierarchy

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::core::Project;

/// Environment variable overriding the database path
pub const DB_ENV: &str = "ROSTER_DB";

/// Environment variable overriding the log filter
pub const LOG_ENV: &str = "ROSTER_LOG";

/// Roster configuration with layered hierarchy
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// SQLite database file
    pub database: Option<PathBuf>,

    /// Log filter directive (tracing EnvFilter syntax)
    pub log_level: Option<String>,

    /// Optional log file written alongside stderr
    pub log_file: Option<PathBuf>,

    /// Default output format
    pub default_format: Option<String>,
}

impl Config {
    /// Load configuration from all sources, merging in priority order
    pub fn load() -> Self {
        let project = Project::discover().ok();
        Self::load_for(project.as_ref())
    }

    /// Load configuration for a known (or absent) project
    pub fn load_for(project: Option<&Project>) -> Self {
        let mut config = Config::default();

        // 1. Built-in defaults (already in Default impl)

        // 2. Global user config (~/.config/roster/config.yaml)
        if let Some(global_path) = Self::global_config_path() {
            if let Some(global) = Self::read_file(&global_path) {
                config.merge(global);
            }
        }

        // 3. Project config (.roster/config.yaml), paths relative to the root
        if let Some(project) = project {
            if let Some(mut project_config) = Self::read_file(&project.config_path()) {
                project_config.database = project_config.database.map(|p| project.resolve(&p));
                project_config.log_file = project_config.log_file.map(|p| project.resolve(&p));
                config.merge(project_config);
            }
        }

        // 4. Environment variables
        if let Ok(db) = std::env::var(DB_ENV) {
            if !db.trim().is_empty() {
                config.database = Some(PathBuf::from(db));
            }
        }
        if let Ok(level) = std::env::var(LOG_ENV) {
            if !level.trim().is_empty() {
                config.log_level = Some(level);
            }
        }

        config
    }

    fn read_file(path: &Path) -> Option<Config> {
        if !path.exists() {
            return None;
        }
        let contents = std::fs::read_to_string(path).ok()?;
        match serde_yml::from_str::<Config>(&contents) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!("ignoring malformed config {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Get the path to the global config file
    fn global_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "roster")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Merge another config into this one (other takes precedence)
    fn merge(&mut self, other: Config) {
        if other.database.is_some() {
            self.database = other.database;
        }
        if other.log_level.is_some() {
            self.log_level = other.log_level;
        }
        if other.log_file.is_some() {
            self.log_file = other.log_file;
        }
        if other.default_format.is_some() {
            self.default_format = other.default_format;
        }
    }

    /// Database path: explicit setting, else the project's default file
    pub fn database_path(&self, project: Option<&Project>) -> Option<PathBuf> {
        self.database
            .clone()
            .or_else(|| project.map(Project::database_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_prefers_other() {
        let mut base = Config {
            database: Some("a.db".into()),
            log_level: Some("roster=info".into()),
            ..Default::default()
        };
        base.merge(Config {
            database: Some("b.db".into()),
            ..Default::default()
        });

        assert_eq!(base.database, Some(PathBuf::from("b.db")));
        assert_eq!(base.log_level.as_deref(), Some("roster=info"));
    }

    #[test]
    fn test_parse_yaml() {
        let config: Config =
            serde_yml::from_str("database: data/roster.db\ndefault_format: json\n").unwrap();
        assert_eq!(config.database, Some(PathBuf::from("data/roster.db")));
        assert_eq!(config.default_format.as_deref(), Some("json"));
        assert!(config.log_file.is_none());
    }

    #[test]
    fn test_database_defaults_to_project_file() {
        let tmp = tempfile::tempdir().unwrap();
        let project = Project::init(tmp.path()).unwrap();

        let config = Config::default();
        assert_eq!(
            config.database_path(Some(&project)),
            Some(project.database_path())
        );
        assert_eq!(config.database_path(None), None);
    }
}
