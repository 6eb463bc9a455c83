//! Editor settings consumed by the document model.
//!
//! None of these change how text is stored. They control how inserted
//! strings are split into lines, how wide a tab is when counting columns,
//! whether a selection may hold several ranges, and how many undo steps a
//! document keeps.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {config_path}: {source}")]
    ConfigReadError {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {config_path}: {source}")]
    ConfigParseError {
        config_path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Separator used to split inserted strings into lines. `None` splits on
    /// `\r\n`, `\r` and `\n`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_separator: Option<String>,
    /// Width of a tab stop when counting columns.
    pub tab_size: usize,
    /// When false, selections are collapsed to their main range.
    pub allow_multiple_selections: bool,
    /// Maximum number of undo steps retained by a document.
    pub history_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            line_separator: None,
            tab_size: 4,
            allow_multiple_selections: true,
            history_depth: 100,
        }
    }
}

impl Config {
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Option<Self>, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            log::debug!("No config file at {}", config_path.display());
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path).map_err(|source| {
            ConfigError::ConfigReadError {
                config_path: config_path.to_path_buf(),
                source,
            }
        })?;

        let mut config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::ConfigParseError {
                config_path: config_path.to_path_buf(),
                source,
            })?;

        // Tab stops must be at least one column wide
        if config.tab_size == 0 {
            log::warn!(
                "tab_size = 0 in {}, falling back to {}",
                config_path.display(),
                Config::default().tab_size
            );
            config.tab_size = Config::default().tab_size;
        }

        log::debug!("Loaded config from {}", config_path.display());
        Ok(Some(config))
    }

    pub fn load() -> Result<Option<Self>, ConfigError> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    /// Load the user's config, or the defaults when there is none.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        Ok(Self::load()?.unwrap_or_default())
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, config_path: P) -> anyhow::Result<()> {
        let config_path = config_path.as_ref();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        self.save_to_path(&config_path)
    }

    pub fn config_path() -> PathBuf {
        let config_dir = shellexpand::tilde("~/.config/tabnote");
        PathBuf::from(config_dir.as_ref()).join("config.toml")
    }

    /// The separator to split inserted strings on, if one is configured.
    pub fn line_separator(&self) -> Option<&str> {
        self.line_separator.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_config_path() {
        let config_path = Config::config_path();
        let path_str = config_path.to_string_lossy();

        // Should not contain tilde anymore
        assert!(!path_str.starts_with('~'));
        assert!(path_str.ends_with(".config/tabnote/config.toml"));
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.line_separator(), None);
        assert_eq!(config.tab_size, 4);
        assert!(config.allow_multiple_selections);
        assert_eq!(config.history_depth, 100);
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let original = Config {
            line_separator: Some("\r\n".to_string()),
            tab_size: 2,
            allow_multiple_selections: false,
            history_depth: 10,
        };

        let toml_str = toml::to_string(&original).unwrap();
        let deserialized: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(original, deserialized);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str("tab_size = 8\n").unwrap();

        assert_eq!(config.tab_size, 8);
        assert_eq!(config.line_separator, None);
        assert!(config.allow_multiple_selections);
        assert_eq!(config.history_depth, 100);
    }

    #[test]
    fn test_load_config_file_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let non_existent_config = temp_dir.path().join("nonexistent.toml");

        let result = Config::load_from_path(&non_existent_config).unwrap();

        assert!(result.is_none());
    }

    #[test]
    fn test_save_and_load_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("nested").join("config.toml");
        let test_config = Config {
            line_separator: Some("\n".to_string()),
            tab_size: 3,
            allow_multiple_selections: false,
            history_depth: 5,
        };

        test_config.save_to_path(&config_file).unwrap();
        let loaded_config = Config::load_from_path(&config_file).unwrap().unwrap();

        assert_eq!(loaded_config, test_config);
    }

    #[test]
    fn test_zero_tab_size_falls_back_to_default() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("config.toml");
        std::fs::write(&config_file, "tab_size = 0\n").unwrap();

        let config = Config::load_from_path(&config_file).unwrap().unwrap();

        assert_eq!(config.tab_size, 4);
    }

    #[test]
    fn test_invalid_toml_reports_path() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("config.toml");
        std::fs::write(&config_file, "tab_size = \"wide\"\n").unwrap();

        let err = Config::load_from_path(&config_file).unwrap_err();

        assert!(matches!(err, ConfigError::ConfigParseError { .. }));
        assert!(err.to_string().contains("config.toml"));
    }
}
