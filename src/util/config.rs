//! Configuration file support for Crank.
//!
//! Crank reads two configuration file locations:
//! - Global: `~/.crank/config.toml` - User-wide defaults and programs
//! - Project: `<knell home>/crank.toml` - Project-specific overrides
//!
//! Project config takes precedence over global config. Only the project file
//! is ever written back.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// File name of the project configuration inside the knell home.
pub const PROJECT_CONFIG_FILE: &str = "crank.toml";

/// Crank configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default build settings
    pub defaults: DefaultsConfig,

    /// Registered programs, alias -> executable path
    pub programs: BTreeMap<String, PathBuf>,
}

/// Default values for build-related settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Build directory, relative to the knell home (default: `build`)
    pub build_dir: Option<String>,

    /// CMake configuration (Debug or Release)
    pub build_config: Option<String>,

    /// Registered program alias used as the C compiler
    pub compiler: Option<String>,

    /// Demo to launch when none is named
    pub demo: Option<String>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create config directory: {}", parent.display())
                })?;
            }
        }

        let contents =
            toml::to_string_pretty(self).with_context(|| "failed to serialize config")?;

        std::fs::write(path, contents)
            .with_context(|| format!("failed to write config file: {}", path.display()))?;

        Ok(())
    }
}

/// Get the global crank config directory (~/.crank).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".crank"))
}

/// Get the global config path (~/.crank/config.toml).
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the project config path inside a knell home.
pub fn project_config_path(home: &Path) -> PathBuf {
    home.join(PROJECT_CONFIG_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.defaults.build_dir.is_none());
        assert!(config.defaults.compiler.is_none());
        assert!(config.programs.is_empty());
    }

    #[test]
    fn test_config_load() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("crank.toml");

        std::fs::write(
            &config_path,
            r#"
[defaults]
build_dir = "build-clang"
build_config = "Release"
compiler = "clang"

[programs]
cmake = "/usr/bin/cmake"
clang = "/usr/bin/clang"
"#,
        )
        .unwrap();

        let config = Config::load(&config_path).unwrap();
        assert_eq!(config.defaults.build_dir, Some("build-clang".to_string()));
        assert_eq!(config.defaults.build_config, Some("Release".to_string()));
        assert_eq!(config.defaults.compiler, Some("clang".to_string()));
        assert_eq!(
            config.programs.get("cmake"),
            Some(&PathBuf::from("/usr/bin/cmake"))
        );
        assert_eq!(config.programs.len(), 2);
    }

    #[test]
    fn test_config_load_or_default_bad_file() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("crank.toml");
        std::fs::write(&config_path, "this is = = not toml").unwrap();

        assert_eq!(Config::load_or_default(&config_path), Config::default());
    }

    #[test]
    fn test_config_save_and_reload() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("nested").join("crank.toml");

        let mut config = Config::default();
        config.defaults.demo = Some("sample".to_string());
        config
            .programs
            .insert("python3".to_string(), PathBuf::from("/usr/bin/python3"));

        config.save(&config_path).unwrap();

        let loaded = Config::load(&config_path).unwrap();
        assert_eq!(loaded, config);
    }
}
