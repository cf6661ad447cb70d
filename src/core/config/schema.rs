//! core::config::schema
//!
//! Configuration file schema.
//!
//! # Validation
//!
//! Values are validated after parsing: the repository path must be
//! non-empty, the work area and attic must be distinct from the repository
//! and from each other, superuser names must be non-empty, and the cache
//! capacity must be positive.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Repository configuration file.
///
/// # Example
///
/// ```toml
/// path = "/srv/repo"
/// workarea = "/srv/work"
/// attic = "/srv/attic"
/// superusers = ["admin"]
/// cache_capacity = 4096
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RepositoryConfig {
    /// Repository root directory
    pub path: Option<PathBuf>,

    /// Work-area mirror directory
    pub workarea: Option<PathBuf>,

    /// Attic directory receiving deleted entries
    pub attic: Option<PathBuf>,

    /// Users allowed to unlock entries held by others
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub superusers: Vec<String>,

    /// Metadata cache bound (entries)
    pub cache_capacity: Option<usize>,
}

impl RepositoryConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let named = [
            ("path", &self.path),
            ("workarea", &self.workarea),
            ("attic", &self.attic),
        ];

        for (key, value) in &named {
            if value.as_ref().is_some_and(|p| p.as_os_str().is_empty()) {
                return Err(ConfigError::InvalidValue(format!("{key} cannot be empty")));
            }
        }

        for (i, (key_a, a)) in named.iter().enumerate() {
            for (key_b, b) in &named[i + 1..] {
                if let (Some(a), Some(b)) = (a, b) {
                    if a == b {
                        return Err(ConfigError::InvalidValue(format!(
                            "{key_a} and {key_b} must differ, both are '{}'",
                            a.display()
                        )));
                    }
                }
            }
        }

        if self.superusers.iter().any(|u| u.trim().is_empty()) {
            return Err(ConfigError::InvalidValue(
                "superuser names cannot be empty".to_string(),
            ));
        }

        if self.cache_capacity == Some(0) {
            return Err(ConfigError::InvalidValue(
                "cache_capacity must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}
