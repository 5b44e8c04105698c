//! Compatibility scoring for extracted extension packages.
//!
//! The scorer is advisory except for one hard blocker: a Mach-O binary
//! anywhere in the package means some functionality cannot run on Linux at
//! all, and the score is capped accordingly. Everything else (macOS API
//! use, AppleScript, hardcoded paths, shell tools) deducts points but lets
//! the package install.
//!
//! Analysis is a read-only walk; it never mutates the package and never
//! executes any of its code.

pub mod heuristics;
pub mod report;

use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::Utc;
use walkdir::WalkDir;

use crate::extension::manifest::PackageJson;
use heuristics::{all_heuristics, is_macho_magic, IssueCategory};
pub use report::{CompatibilityReport, CompatibilityWarning};

/// Score every package starts from.
const BASE_SCORE: u32 = 100;
/// Ceiling applied when a hard blocker is present.
const HARD_BLOCKER_CAP: u32 = 20;

/// File extensions that are source code and get the text heuristics.
const SOURCE_EXTENSIONS: &[&str] = &["js", "jsx", "ts", "tsx", "mjs", "cjs", "sh", "swift"];

/// Extensions that are known text or asset formats and are skipped by the
/// binary scan. Everything else gets its leading bytes checked.
const NON_BINARY_EXTENSIONS: &[&str] = &[
    "js", "jsx", "ts", "tsx", "mjs", "cjs", "json", "md", "txt", "css", "html", "svg", "sh",
    "yml", "yaml", "toml", "lock", "map", "png", "jpg", "jpeg", "gif", "ico", "webp", "woff",
    "woff2", "ttf",
];

/// Analyze an extracted package directory and produce its report.
///
/// Commands are read from the package's `package.json`; if it is missing or
/// unreadable, findings are attributed to a single pseudo-command named
/// after the directory.
pub fn analyze(package_path: &Path) -> CompatibilityReport {
    let commands = command_identities(package_path);
    let heuristics = all_heuristics();

    // Distinct (category, reason) findings across the whole package.
    let mut categories: HashSet<IssueCategory> = HashSet::new();
    let mut reasons: Vec<(IssueCategory, String)> = Vec::new();
    let mut has_native_binaries = false;

    for entry in WalkDir::new(package_path)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        if SOURCE_EXTENSIONS.contains(&ext) {
            let Ok(source) = std::fs::read_to_string(path) else {
                continue;
            };
            for heuristic in &heuristics {
                if let Some(reason) = heuristic.check(&source) {
                    let category = heuristic.category();
                    categories.insert(category);
                    if !reasons.iter().any(|(_, r)| r == &reason) {
                        reasons.push((category, reason));
                    }
                }
            }
        } else if !NON_BINARY_EXTENSIONS.contains(&ext) && file_is_macho(path) {
            has_native_binaries = true;
            categories.insert(IssueCategory::NativeBinary);
            let reason = format!(
                "Contains native macOS binary '{}', which cannot run on Linux",
                path.file_name().map_or_else(String::new, |n| n.to_string_lossy().to_string())
            );
            if !reasons.iter().any(|(_, r)| r == &reason) {
                reasons.push((IssueCategory::NativeBinary, reason));
            }
            tracing::warn!(file = %path.display(), "found Mach-O binary in package");
        }
    }

    let mut score = BASE_SCORE;
    for category in &categories {
        score = score.saturating_sub(category.deduction());
    }
    if categories.iter().any(|c| c.is_hard_blocker()) {
        score = score.min(HARD_BLOCKER_CAP);
    }

    // Package-level findings attribute to every command.
    let mut warnings = Vec::new();
    for (name, title) in &commands {
        for (_, reason) in &reasons {
            warnings.push(CompatibilityWarning {
                command_name: name.clone(),
                command_title: title.clone(),
                reason: reason.clone(),
            });
        }
    }

    tracing::debug!(
        package = %package_path.display(),
        score,
        warnings = warnings.len(),
        "compatibility analysis complete"
    );

    CompatibilityReport {
        score: score.min(100) as u8,
        warnings,
        has_native_binaries,
        analyzed_at: Utc::now(),
    }
}

fn command_identities(package_path: &Path) -> Vec<(String, String)> {
    let fallback = || {
        let name = package_path
            .file_name()
            .map_or_else(|| "package".to_string(), |n| n.to_string_lossy().to_string());
        vec![(name.clone(), name)]
    };

    let manifest_path = package_path.join("package.json");
    let Ok(raw) = std::fs::read_to_string(&manifest_path) else {
        return fallback();
    };
    let Ok(manifest) = serde_json::from_str::<PackageJson>(&raw) else {
        return fallback();
    };
    if manifest.commands.is_empty() {
        return fallback();
    }
    manifest
        .commands
        .iter()
        .map(|c| (c.name.clone(), c.title.clone().unwrap_or_else(|| c.name.clone())))
        .collect()
}

fn file_is_macho(path: &Path) -> bool {
    let Ok(mut file) = File::open(path) else {
        return false;
    };
    let mut header = [0u8; 8];
    let Ok(n) = file.read(&mut header) else {
        return false;
    };
    is_macho_magic(&header[..n])
}
