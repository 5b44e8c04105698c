//! Configuration management for Portico.
//!
//! Handles loading and saving configuration from TOML files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Shim behavior
    pub shims: ShimConfig,

    /// Host process settings
    pub host: HostConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory extensions are installed into. Defaults to the per-user
    /// data dir.
    pub extensions_dir: Option<PathBuf>,

    /// Refuse to install packages scoring below this threshold.
    pub min_install_score: u8,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self { extensions_dir: None, min_install_score: 0 }
    }
}

/// Shim behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShimConfig {
    /// Whether the AppleScript shim may execute `do shell script` bodies.
    pub allow_shell_scripts: bool,

    /// Whether wrapper scripts are installed automatically during install.
    pub auto_reshim: bool,
}

impl Default for ShimConfig {
    fn default() -> Self {
        Self { allow_shell_scripts: true, auto_reshim: false }
    }
}

/// Host process settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Host binary to spawn for plugin sessions.
    pub program: String,

    /// Extra arguments passed to the host binary.
    pub args: Vec<String>,

    /// Whether sessions get access to platform-only capabilities
    /// (clipboard, OAuth, AI).
    pub platform_feature_access: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            program: "portico-host".to_string(),
            args: Vec::new(),
            platform_feature_access: true,
        }
    }
}

impl Config {
    /// Load configuration, local file first, then global, then defaults.
    pub fn load() -> anyhow::Result<Self> {
        let local_config = PathBuf::from(".portico.toml");
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let global_config = config_dir.join("portico").join("config.toml");
            if global_config.exists() {
                return Self::load_from_file(&global_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &PathBuf) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the global config file.
    pub fn save(&self) -> anyhow::Result<()> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        let portico_dir = config_dir.join("portico");
        std::fs::create_dir_all(&portico_dir)?;

        let config_path = portico_dir.join("config.toml");
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;

        Ok(())
    }

    /// Get the config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("portico"))
    }

    /// Get the data directory path (extensions, storage, shims).
    pub fn data_dir() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join("portico"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.host.program, "portico-host");
        assert!(config.host.platform_feature_access);
        assert!(config.shims.allow_shell_scripts);
        assert_eq!(config.general.min_install_score, 0);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [shims]
            allow_shell_scripts = false
            "#,
        )
        .unwrap();
        assert!(!config.shims.allow_shell_scripts);
        assert_eq!(config.host.program, "portico-host");
    }

    #[test]
    fn test_round_trip() {
        let mut config = Config::default();
        config.general.min_install_score = 50;
        let serialized = toml::to_string_pretty(&config).unwrap();
        let back: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(back.general.min_install_score, 50);
    }
}
