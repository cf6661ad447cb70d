//! core::config
//!
//! Configuration schema and loading.
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Config file
//! 3. CLI flags, applied through [`Config::with_overrides`]
//!
//! # Config Locations
//!
//! The first existing file wins:
//! 1. Explicit path (`--config`), which must exist
//! 2. `$REVREPO_CONFIG` if set
//! 3. `./revrepo.toml`
//! 4. `$XDG_CONFIG_HOME/revrepo/config.toml`
//! 5. `~/.revrepo/config.toml` (canonical write location)
//!
//! # Example
//!
//! ```no_run
//! use revrepo::core::config::{Config, Overrides};
//!
//! let config = Config::load(None)
//!     .unwrap()
//!     .with_overrides(Overrides {
//!         repository: Some("/srv/repo".into()),
//!         ..Default::default()
//!     })
//!     .unwrap();
//!
//! println!("Repository: {}", config.repository_path().unwrap().display());
//! println!("Cache capacity: {}", config.cache_capacity());
//! ```

pub mod schema;

pub use schema::RepositoryConfig;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::cache::DEFAULT_CAPACITY;

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "REVREPO_CONFIG";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("failed to write config file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("home directory not found")]
    NoHomeDir,

    #[error("no repository configured (set `path` in the config file or pass --repo)")]
    MissingRepository,
}

/// Values supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub repository: Option<PathBuf>,
    pub workarea: Option<PathBuf>,
    pub attic: Option<PathBuf>,
}

/// Loaded configuration with precedence applied.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Parsed file contents (or defaults)
    pub file: RepositoryConfig,
    /// Path the file was loaded from
    loaded_from: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// # Errors
    ///
    /// Returns an error if `explicit` is missing, or if a config file exists
    /// but cannot be read, parsed or validated. Missing files at the
    /// implicit locations are not an error (defaults are used).
    pub fn load(explicit: Option<&Path>) -> Result<Config, ConfigError> {
        if let Some(path) = explicit {
            return Self::load_file(path);
        }

        let candidates = candidate_paths(
            std::env::var_os(CONFIG_ENV).map(PathBuf::from),
            std::env::current_dir().ok(),
            std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from),
            dirs::home_dir(),
        );

        match candidates.into_iter().find(|p| p.is_file()) {
            Some(path) => Self::load_file(&path),
            None => Ok(Config::default()),
        }
    }

    /// Load and validate one specific file.
    pub fn load_file(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let file: RepositoryConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        file.validate()?;

        tracing::debug!(path = %path.display(), "loaded config");
        Ok(Config {
            file,
            loaded_from: Some(path.to_path_buf()),
        })
    }

    /// Apply command-line values on top of the file and re-validate.
    pub fn with_overrides(mut self, overrides: Overrides) -> Result<Config, ConfigError> {
        if overrides.repository.is_some() {
            self.file.path = overrides.repository;
        }
        if overrides.workarea.is_some() {
            self.file.workarea = overrides.workarea;
        }
        if overrides.attic.is_some() {
            self.file.attic = overrides.attic;
        }
        self.file.validate()?;
        Ok(self)
    }

    /// Get the canonical path for the user config.
    ///
    /// Returns `~/.revrepo/config.toml`.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".revrepo/config.toml"))
    }

    /// Write a config file atomically.
    ///
    /// Creates parent directories if needed. Uses atomic write
    /// (write to temp file, then rename) to prevent corruption.
    pub fn write(path: &Path, config: &RepositoryConfig) -> Result<(), ConfigError> {
        config.validate()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
                path: path.to_path_buf(),
                source: e,
            })?;
        }

        let contents =
            toml::to_string_pretty(config).map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

        // Write to temp file in same directory (for atomic rename)
        let temp_path = path.with_extension("toml.tmp");
        let write_err = |source| ConfigError::WriteError {
            path: temp_path.clone(),
            source,
        };
        let mut file = fs::File::create(&temp_path).map_err(write_err)?;
        file.write_all(contents.as_bytes()).map_err(write_err)?;
        file.sync_all().map_err(write_err)?;

        fs::rename(&temp_path, path).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Repository root.
    pub fn repository_path(&self) -> Result<&Path, ConfigError> {
        self.file
            .path
            .as_deref()
            .ok_or(ConfigError::MissingRepository)
    }

    pub fn workarea(&self) -> Option<&Path> {
        self.file.workarea.as_deref()
    }

    pub fn attic(&self) -> Option<&Path> {
        self.file.attic.as_deref()
    }

    pub fn superusers(&self) -> &[String] {
        &self.file.superusers
    }

    /// Cache capacity (default: 4096).
    pub fn cache_capacity(&self) -> usize {
        self.file.cache_capacity.unwrap_or(DEFAULT_CAPACITY)
    }

    /// Path the config was loaded from, if any.
    pub fn loaded_from(&self) -> Option<&Path> {
        self.loaded_from.as_deref()
    }
}

/// Implicit lookup locations in priority order.
fn candidate_paths(
    env: Option<PathBuf>,
    cwd: Option<PathBuf>,
    xdg_home: Option<PathBuf>,
    home: Option<PathBuf>,
) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    paths.extend(env);
    paths.extend(cwd.map(|d| d.join("revrepo.toml")));
    paths.extend(xdg_home.map(|d| d.join("revrepo/config.toml")));
    paths.extend(home.map(|d| d.join(".revrepo/config.toml")));
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn candidate_order() {
        let paths = candidate_paths(
            Some("/env.toml".into()),
            Some("/cwd".into()),
            Some("/xdg".into()),
            Some("/home/u".into()),
        );
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/env.toml"),
                PathBuf::from("/cwd/revrepo.toml"),
                PathBuf::from("/xdg/revrepo/config.toml"),
                PathBuf::from("/home/u/.revrepo/config.toml"),
            ]
        );
        assert!(candidate_paths(None, None, None, None).is_empty());
    }

    #[test]
    fn load_explicit_file() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("revrepo.toml");
        fs::write(
            &config_path,
            r#"
            path = "/srv/repo"
            superusers = ["admin"]
            "#,
        )
        .unwrap();

        let config = Config::load(Some(&config_path)).unwrap();
        assert_eq!(config.repository_path().unwrap(), Path::new("/srv/repo"));
        assert_eq!(config.superusers(), ["admin".to_string()]);
        assert_eq!(config.cache_capacity(), DEFAULT_CAPACITY);
        assert_eq!(config.loaded_from(), Some(config_path.as_path()));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let result = Config::load(Some(&temp.path().join("nope.toml")));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn parse_errors_name_the_file() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("bad.toml");
        fs::write(&config_path, "path = [").unwrap();

        let err = Config::load_file(&config_path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn unknown_fields_rejected() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("c.toml");
        fs::write(&config_path, "path = \"/r\"\nunknown_field = true").unwrap();
        assert!(Config::load_file(&config_path).is_err());
    }

    #[test]
    fn overrides_replace_file_values() {
        let config = Config {
            file: RepositoryConfig {
                path: Some("/from/file".into()),
                attic: Some("/attic".into()),
                ..Default::default()
            },
            loaded_from: None,
        };

        let config = config
            .with_overrides(Overrides {
                repository: Some("/from/flag".into()),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(config.repository_path().unwrap(), Path::new("/from/flag"));
        assert_eq!(config.attic(), Some(Path::new("/attic")));
        assert_eq!(config.workarea(), None);
    }

    #[test]
    fn overrides_are_validated() {
        let result = Config::default().with_overrides(Overrides {
            repository: Some("/same".into()),
            workarea: Some("/same".into()),
            attic: None,
        });
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn missing_repository_reported() {
        let config = Config::default();
        assert!(matches!(
            config.repository_path(),
            Err(ConfigError::MissingRepository)
        ));
    }

    #[test]
    fn write_config_atomic() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/revrepo.toml");

        let written = RepositoryConfig {
            path: Some("/srv/repo".into()),
            cache_capacity: Some(64),
            ..Default::default()
        };
        Config::write(&path, &written).unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("toml.tmp").exists());
        let loaded = Config::load_file(&path).unwrap();
        assert_eq!(loaded.file, written);
        assert_eq!(loaded.cache_capacity(), 64);
    }

    #[test]
    fn error_display_formatting() {
        let err = ConfigError::MissingRepository;
        assert!(err.to_string().contains("--repo"));

        let err = ConfigError::InvalidValue("x".into());
        assert!(err.to_string().contains("invalid config value"));
    }
}
