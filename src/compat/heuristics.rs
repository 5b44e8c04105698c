//! Source-level compatibility heuristics.
//!
//! Each heuristic inspects one source file's text and reports a reason
//! string when it finds a macOS dependency. Heuristics are substring and
//! regex checks, deliberately cheap: the scorer runs all of them over every
//! source file in a package.

use once_cell::sync::Lazy;
use regex::Regex;

/// Issue categories, each with a fixed score deduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssueCategory {
    /// Native Mach-O binary shipped in the package. Hard blocker.
    NativeBinary,
    /// Use of macOS-only system APIs.
    MacOsApi,
    /// AppleScript execution.
    AppleScript,
    /// Hardcoded macOS filesystem paths.
    MacOsPath,
    /// Shelling out to macOS-only command-line tools.
    ShellCommand,
}

impl IssueCategory {
    /// Points deducted from the compatibility score for this category.
    pub fn deduction(self) -> u32 {
        match self {
            Self::NativeBinary => 40,
            Self::MacOsApi => 20,
            Self::AppleScript => 15,
            Self::MacOsPath => 10,
            Self::ShellCommand => 5,
        }
    }

    pub fn is_hard_blocker(self) -> bool {
        matches!(self, Self::NativeBinary)
    }
}

/// A single heuristic over extension source text.
pub trait Heuristic: Send + Sync {
    fn category(&self) -> IssueCategory;

    /// A human-readable reason if the source trips this heuristic.
    fn check(&self, source: &str) -> Option<String>;
}

pub struct AppleScriptHeuristic;

impl Heuristic for AppleScriptHeuristic {
    fn category(&self) -> IssueCategory {
        IssueCategory::AppleScript
    }

    fn check(&self, source: &str) -> Option<String> {
        (source.contains("runAppleScript") || source.contains("osascript -e")).then(|| {
            "Uses AppleScript, which is translated by a pattern shim with partial coverage"
                .to_string()
        })
    }
}

pub struct MacOsPathHeuristic;

static MACOS_PATHS: &[&str] = &["/Applications/", "/Library/", "/System/", "/Users/"];

impl Heuristic for MacOsPathHeuristic {
    fn category(&self) -> IssueCategory {
        IssueCategory::MacOsPath
    }

    fn check(&self, source: &str) -> Option<String> {
        let hit = MACOS_PATHS.iter().find(|p| source.contains(*p))?;
        Some(format!("References macOS path {hit}, which will be translated where possible"))
    }
}

pub struct MacOsApiHeuristic;

static MACOS_APIS: &[&str] = &[
    "NSWorkspace",
    "NSApplication",
    "NSFileManager",
    "NSPasteboard",
    "com.apple.",
    r#"tell application "Finder""#,
];

impl Heuristic for MacOsApiHeuristic {
    fn category(&self) -> IssueCategory {
        IssueCategory::MacOsApi
    }

    fn check(&self, source: &str) -> Option<String> {
        let hit = MACOS_APIS.iter().find(|p| source.contains(*p))?;
        Some(format!("Uses macOS-only API {hit}, which has no Linux equivalent"))
    }
}

pub struct ShellCommandHeuristic;

static SHELL_COMMANDS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r#"["'`]osascript"#, "osascript"),
        (r"open\s+-a\s", "open -a"),
        (r#"["'`]mdfind"#, "mdfind"),
        (r#"["'`]mdls"#, "mdls"),
        (r#"["'`]defaults\s+(read|write)"#, "defaults"),
        (r#"["'`]pbcopy"#, "pbcopy"),
        (r#"["'`]pbpaste"#, "pbpaste"),
    ]
    .into_iter()
    .map(|(pattern, tool)| (Regex::new(pattern).expect("valid regex"), tool))
    .collect()
});

impl Heuristic for ShellCommandHeuristic {
    fn category(&self) -> IssueCategory {
        IssueCategory::ShellCommand
    }

    fn check(&self, source: &str) -> Option<String> {
        let (_, tool) = SHELL_COMMANDS.iter().find(|(re, _)| re.is_match(source))?;
        Some(format!("Shells out to macOS tool '{tool}', which may need a shim"))
    }
}

/// All source heuristics, in the order findings are reported.
pub fn all_heuristics() -> Vec<Box<dyn Heuristic>> {
    vec![
        Box::new(MacOsApiHeuristic),
        Box::new(AppleScriptHeuristic),
        Box::new(MacOsPathHeuristic),
        Box::new(ShellCommandHeuristic),
    ]
}

/// Mach-O magic numbers: 32/64-bit thin images in both byte orders, plus
/// the two fat (universal) variants.
const MACHO_MAGICS: [[u8; 4]; 6] = [
    [0xFE, 0xED, 0xFA, 0xCE],
    [0xCE, 0xFA, 0xED, 0xFE],
    [0xFE, 0xED, 0xFA, 0xCF],
    [0xCF, 0xFA, 0xED, 0xFE],
    [0xCA, 0xFE, 0xBA, 0xBE],
    [0xBE, 0xBA, 0xFE, 0xCA],
];

/// Check a file's leading bytes for a Mach-O signature.
pub fn is_macho_magic(bytes: &[u8]) -> bool {
    bytes.len() >= 4 && MACHO_MAGICS.iter().any(|magic| &bytes[..4] == magic)
}
