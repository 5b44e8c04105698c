//! Extension manifest (`package.json`) parsing.
//!
//! Manifests come from the wild, so every field that can be optional is.
//! `author` appears both as a bare string and as an object in real
//! packages, hence the untagged enum.

use serde::{Deserialize, Serialize};

/// Extension author, as a plain name or a structured record.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Author {
    Simple(String),
    Detailed { name: String },
}

impl Author {
    pub fn name(&self) -> &str {
        match self {
            Self::Simple(name) | Self::Detailed { name } => name,
        }
    }
}

/// One selectable value for a dropdown preference.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceData {
    pub title: String,
    pub value: String,
}

/// A user-configurable preference declared by the extension or one of its
/// commands.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Preference {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub required: Option<bool>,
    #[serde(default)]
    pub default: serde_json::Value,
    pub data: Option<Vec<PreferenceData>>,
    pub label: Option<String>,
}

/// One command entry in the manifest.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CommandInfo {
    pub name: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub subtitle: Option<String>,
    pub mode: Option<String>,
    pub preferences: Option<Vec<Preference>>,
}

/// The parts of `package.json` the store cares about.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PackageJson {
    pub name: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub author: Option<Author>,
    pub owner: Option<String>,
    #[serde(default)]
    pub commands: Vec<CommandInfo>,
    pub preferences: Option<Vec<Preference>>,
}
