//! Configuration file handling.
//!
//! Looked up at `<config dir>/spaced-review/config.toml`; a missing file means
//! defaults. Command-line flags override whatever the file says.

use crate::error::{Result, ReviewError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "spaced-review";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database file
    pub database_path: PathBuf,
    /// Learner the CLI acts for (the id issued by the auth provider)
    pub learner_id: String,
    /// `env_logger` filter used when `RUST_LOG` is unset
    pub log_level: String,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Cap on cards per session; unlimited when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_cards: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_data_dir().join("reviews.sqlite3"),
            learner_id: "local".to_string(),
            log_level: "warn".to_string(),
            session: SessionConfig::default(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

impl Config {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.toml"))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(contents).map_err(|e| ReviewError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path`, or the default location when `path` is `None`.
    /// A missing default file yields defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => match Self::default_path() {
                Some(path) => (path, false),
                None => return Ok(Self::default()),
            },
        };

        if !path.exists() {
            if explicit {
                return Err(ReviewError::Config(format!(
                    "config file {} does not exist",
                    path.display()
                )));
            }
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)?;
        let config = Self::from_toml(&contents)?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.learner_id.trim().is_empty() {
            return Err(ReviewError::Config("learner_id must not be empty".into()));
        }
        if self.session.max_cards == Some(0) {
            return Err(ReviewError::Config(
                "session.max_cards must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ReviewError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            learner_id = "0b6f3c1e"

            [session]
            max_cards = 20
            "#,
        )
        .unwrap();

        assert_eq!(config.learner_id, "0b6f3c1e");
        assert_eq!(config.session.max_cards, Some(20));
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.database_path, Config::default().database_path);
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(matches!(
            Config::from_toml(r#"learner_id = "  ""#),
            Err(ReviewError::Config(_))
        ));
        assert!(Config::from_toml("[session]\nmax_cards = 0").is_err());
        assert!(Config::from_toml("learner_id = [1, 2]").is_err());
    }

    #[test]
    fn test_load_from_explicit_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.database_path = dir.path().join("db.sqlite3");
        config.learner_id = "learner-42".into();
        fs::write(&path, config.to_toml().unwrap()).unwrap();

        assert_eq!(Config::load(Some(&path)).unwrap(), config);
        assert!(Config::load(Some(&dir.path().join("missing.toml"))).is_err());
    }
}
