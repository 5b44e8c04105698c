//! Discovered-extension record types.

use serde::{Deserialize, Serialize};

use crate::compat::CompatibilityWarning;

use super::manifest::{Author, Preference};

/// How a command renders when launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CommandMode {
    #[default]
    View,
    NoView,
    MenuBar,
}

impl CommandMode {
    /// Parse a manifest mode string, defaulting to `View` for missing or
    /// unrecognized values.
    pub fn parse(mode: Option<&str>) -> Self {
        match mode {
            Some("no-view") => Self::NoView,
            Some("menu-bar") => Self::MenuBar,
            _ => Self::View,
        }
    }
}

/// One launchable command of one installed extension, flattened for
/// consumers. A package with three commands yields three of these.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PluginInfo {
    pub title: String,
    pub description: Option<String>,
    pub plugin_title: String,
    pub plugin_name: String,
    pub command_name: String,
    pub plugin_path: String,
    pub icon: Option<String>,
    pub preferences: Option<Vec<Preference>>,
    pub command_preferences: Option<Vec<Preference>>,
    pub mode: CommandMode,
    pub author: Option<Author>,
    pub owner: Option<String>,
    pub compatibility_warnings: Option<Vec<CompatibilityWarning>>,
    pub compatibility_score: Option<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_mode_parse() {
        assert_eq!(CommandMode::parse(Some("view")), CommandMode::View);
        assert_eq!(CommandMode::parse(Some("no-view")), CommandMode::NoView);
        assert_eq!(CommandMode::parse(Some("menu-bar")), CommandMode::MenuBar);
        assert_eq!(CommandMode::parse(Some("garbage")), CommandMode::View);
        assert_eq!(CommandMode::parse(None), CommandMode::View);
    }

    #[test]
    fn test_command_mode_wire_format() {
        assert_eq!(serde_json::to_string(&CommandMode::NoView).unwrap(), r#""no-view""#);
        assert_eq!(serde_json::to_string(&CommandMode::MenuBar).unwrap(), r#""menu-bar""#);
    }
}
