//! Recipe tool configuration

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const SYSTEM_CONFIG: &str = "/etc/dd4hep-recipe/config.toml";

/// Configuration for resolution and builds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding per-package build trees
    pub stage_dir: PathBuf,
    /// Number of parallel jobs
    pub jobs: usize,
    /// CMAKE_BUILD_TYPE
    pub build_type: String,
    /// Path to cmake; looked up in PATH when unset
    pub cmake_path: Option<PathBuf>,
    /// Path to ninja; looked up in PATH when unset
    pub ninja_path: Option<PathBuf>,
    /// Run tests unless the request says otherwise
    pub run_tests: bool,
}

impl Default for Config {
    fn default() -> Self {
        let jobs = std::thread::available_parallelism()
            .map(|p| p.get())
            .unwrap_or(4);

        Self {
            stage_dir: std::env::temp_dir().join("dd4hep-recipe-stage"),
            jobs,
            build_type: "Release".to_string(),
            cmake_path: None,
            ninja_path: None,
            run_tests: false,
        }
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// The system file wins over the user file; with neither, defaults apply.
    pub fn load() -> Result<Self> {
        let system = PathBuf::from(SYSTEM_CONFIG);
        if system.exists() {
            return Self::load_from(&system);
        }
        if let Some(user) = Self::user_config_path() {
            if user.exists() {
                return Self::load_from(&user);
            }
        }
        Ok(Self::default())
    }

    /// `<config dir>/dd4hep-recipe/config.toml`
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("dd4hep-recipe").join("config.toml"))
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        if config.jobs == 0 {
            return Err(Error::ConfigError(format!(
                "{}: jobs must be at least 1",
                path.display()
            )));
        }
        Ok(config)
    }

    /// Save configuration to a path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| Error::ConfigError(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Build directory for one package version
    pub fn build_dir_for(&self, package: &str, version: &str) -> PathBuf {
        self.stage_dir.join(format!("{}-{}", package, version)).join("build")
    }
}
