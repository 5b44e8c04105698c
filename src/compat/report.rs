//! Compatibility report types, persisted alongside each installed package.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One warning, attributed to a specific command within the package.
///
/// Issues detected at package level (native binaries, shared source files)
/// are attributed to every command; the attribution is best effort, not a
/// source map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompatibilityWarning {
    pub command_name: String,
    pub command_title: String,
    pub reason: String,
}

/// The immutable result of analyzing one extracted package.
///
/// Recomputed wholesale on reinstall or reshim; never patched in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompatibilityReport {
    /// 0-100; higher is more compatible.
    pub score: u8,
    pub warnings: Vec<CompatibilityWarning>,
    /// True when a Mach-O binary was found anywhere in the package.
    pub has_native_binaries: bool,
    pub analyzed_at: DateTime<Utc>,
}

impl CompatibilityReport {
    /// Band label for a score. The bands are a display contract for
    /// consumers; nothing in scoring depends on them.
    pub fn band(score: u8) -> &'static str {
        match score {
            90..=100 => "excellent",
            70..=89 => "good",
            50..=69 => "fair",
            _ => "poor",
        }
    }
}
