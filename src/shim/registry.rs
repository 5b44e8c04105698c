//! Registry of macOS command-line tools and their Linux stand-ins.
//!
//! Extensions shell out to tools like `pbcopy` and `osascript` that do not
//! exist on Linux. The registry maps each known tool to a native package or
//! wrapper script, can spot tool usage in extension source, and installs
//! wrapper scripts into a shim directory that gets prepended to the PATH of
//! hosted plugin commands.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};

use crate::extension::{ExtensionError, ExtensionResult};

/// How a missing tool can be obtained on this machine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum LinuxPackage {
    /// Install via the distro package manager.
    Distro { package: String },
    /// Download and unpack a release binary.
    Binary { url: String },
    /// Shipped by this crate, nothing to install.
    Builtin,
}

/// Strategy used to stand the tool in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ShimKind {
    /// The native tool is a drop-in replacement.
    DirectExec,
    /// A generated wrapper script translates the invocation.
    WrapperScript,
    /// Routed into this crate's own shim code (e.g. the script shim).
    Native,
    /// No workable stand-in exists.
    Unsupported,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolMapping {
    /// Foreign tool name as it appears in extension code.
    pub tool: String,
    pub package: LinuxPackage,
    /// Probe command; zero exit status means the backing tool is present.
    pub probe: String,
    pub kind: ShimKind,
    pub description: Option<String>,
}

impl ToolMapping {
    pub fn new(
        tool: impl Into<String>,
        package: LinuxPackage,
        probe: impl Into<String>,
        kind: ShimKind,
    ) -> Self {
        Self { tool: tool.into(), package, probe: probe.into(), kind, description: None }
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }
}

/// Ordered tool registry. Iteration order is registration order, so lookups
/// and reports are deterministic.
pub struct ToolRegistry {
    tools: Vec<ToolMapping>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        let mut registry = Self { tools: Vec::new() };
        registry.register_default_tools();
        registry
    }

    fn register_default_tools(&mut self) {
        self.add(
            ToolMapping::new(
                "pbcopy",
                LinuxPackage::Distro { package: "xclip".to_string() },
                "xclip -version",
                ShimKind::WrapperScript,
            )
            .with_description("Clipboard copy"),
        );
        self.add(
            ToolMapping::new(
                "pbpaste",
                LinuxPackage::Distro { package: "xclip".to_string() },
                "xclip -version",
                ShimKind::WrapperScript,
            )
            .with_description("Clipboard paste"),
        );
        self.add(
            ToolMapping::new("open", LinuxPackage::Builtin, "xdg-open --version", ShimKind::DirectExec)
                .with_description("Open files and URLs"),
        );
        self.add(
            ToolMapping::new("osascript", LinuxPackage::Builtin, "true", ShimKind::Native)
                .with_description("AppleScript execution, routed through the script shim"),
        );
        self.add(
            ToolMapping::new(
                "say",
                LinuxPackage::Distro { package: "espeak".to_string() },
                "espeak --version",
                ShimKind::WrapperScript,
            )
            .with_description("Text to speech"),
        );
        self.add(
            ToolMapping::new(
                "caffeinate",
                LinuxPackage::Builtin,
                "systemd-inhibit --version",
                ShimKind::WrapperScript,
            )
            .with_description("Prevent system sleep"),
        );
        self.add(
            ToolMapping::new(
                "jq",
                LinuxPackage::Distro { package: "jq".to_string() },
                "jq --version",
                ShimKind::DirectExec,
            )
            .with_description("JSON processor"),
        );
        self.add(
            ToolMapping::new(
                "sips",
                LinuxPackage::Distro { package: "imagemagick".to_string() },
                "magick --version",
                ShimKind::WrapperScript,
            )
            .with_description("Image processing"),
        );
        self.add(
            ToolMapping::new(
                "speedtest",
                LinuxPackage::Binary {
                    url: "https://install.speedtest.net/app/cli/ookla-speedtest-1.2.0-linux-x86_64.tgz"
                        .to_string(),
                },
                "speedtest --version",
                ShimKind::DirectExec,
            )
            .with_description("Network speed testing"),
        );
        self.add(
            ToolMapping::new("qlmanage", LinuxPackage::Builtin, "false", ShimKind::Unsupported)
                .with_description("Quick Look has no Linux equivalent"),
        );
        self.add(
            ToolMapping::new(
                "mdfind",
                LinuxPackage::Distro { package: "plocate".to_string() },
                "locate --version",
                ShimKind::WrapperScript,
            )
            .with_description("Spotlight search"),
        );
    }

    pub fn add(&mut self, mapping: ToolMapping) {
        self.tools.push(mapping);
    }

    pub fn get(&self, tool: &str) -> Option<&ToolMapping> {
        self.tools.iter().find(|m| m.tool == tool)
    }

    pub fn all(&self) -> &[ToolMapping] {
        &self.tools
    }

    /// Find registered tools referenced by a chunk of extension source.
    ///
    /// Matches the quoting and spawn idioms extension code actually uses;
    /// a bare identifier is too noisy to match on.
    pub fn find_tools_in_code(&self, code: &str) -> Vec<&ToolMapping> {
        self.tools
            .iter()
            .filter(|mapping| {
                let patterns = [
                    format!("\"{}\"", mapping.tool),
                    format!("'{}'", mapping.tool),
                    format!("`{}`", mapping.tool),
                    format!("exec('{}'", mapping.tool),
                    format!("spawn('{}'", mapping.tool),
                ];
                patterns.iter().any(|p| code.contains(p))
            })
            .collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Check whether a mapping's backing tool is present, via its probe command.
pub fn is_tool_installed(probe: &str) -> bool {
    let parts: Vec<&str> = probe.split_whitespace().collect();
    let Some((cmd, args)) = parts.split_first() else {
        return false;
    };
    Command::new(cmd)
        .args(args)
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Directory wrapper scripts are installed into.
pub fn shim_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("~/.local/share"))
        .join("portico")
        .join("shims")
}

/// Generate the wrapper script for a tool, if one exists.
pub fn generate_wrapper_script(mapping: &ToolMapping) -> Option<String> {
    match mapping.tool.as_str() {
        "pbcopy" => Some(
            r#"#!/bin/bash
if command -v wl-copy &> /dev/null; then
    wl-copy "$@"
elif command -v xclip &> /dev/null; then
    xclip -selection clipboard -i "$@"
else
    echo "Error: No clipboard tool found. Install wl-copy (Wayland) or xclip (X11)" >&2
    exit 1
fi
"#
            .to_string(),
        ),
        "pbpaste" => Some(
            r#"#!/bin/bash
if command -v wl-paste &> /dev/null; then
    wl-paste "$@"
elif command -v xclip &> /dev/null; then
    xclip -selection clipboard -o "$@"
else
    echo "Error: No clipboard tool found. Install wl-paste (Wayland) or xclip (X11)" >&2
    exit 1
fi
"#
            .to_string(),
        ),
        "say" => Some(
            r#"#!/bin/bash
if command -v espeak &> /dev/null; then
    echo "$@" | espeak
elif command -v festival &> /dev/null; then
    echo "$@" | festival --tts
else
    echo "Error: No TTS tool found. Install espeak or festival" >&2
    exit 1
fi
"#
            .to_string(),
        ),
        "caffeinate" => Some(
            r#"#!/bin/bash
if command -v systemd-inhibit &> /dev/null; then
    systemd-inhibit --what=idle:sleep "$@"
else
    "$@"
fi
"#
            .to_string(),
        ),
        "sips" => Some(
            r#"#!/bin/bash
echo "Error: sips is not available. Use 'magick' (ImageMagick) directly" >&2
exit 1
"#
            .to_string(),
        ),
        "mdfind" => Some(
            r#"#!/bin/bash
if command -v locate &> /dev/null; then
    locate "$@"
else
    echo "Error: locate not found. Install plocate" >&2
    exit 1
fi
"#
            .to_string(),
        ),
        _ => None,
    }
}

/// Write wrapper scripts for the given mappings into the shim directory.
pub fn install_shims(mappings: &[&ToolMapping]) -> ExtensionResult<()> {
    install_shims_into(mappings, &shim_dir())
}

fn install_shims_into(mappings: &[&ToolMapping], dir: &Path) -> ExtensionResult<()> {
    fs::create_dir_all(dir)?;

    for mapping in mappings {
        if mapping.kind != ShimKind::WrapperScript {
            continue;
        }
        let Some(script) = generate_wrapper_script(mapping) else {
            continue;
        };
        let script_path = dir.join(&mapping.tool);
        fs::write(&script_path, script)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&script_path)?.permissions();
            perms.set_mode(0o755);
            fs::set_permissions(&script_path, perms)?;
        }
        tracing::info!(tool = %mapping.tool, path = %script_path.display(), "installed shim");
    }

    Ok(())
}

/// Result of scanning an installed package for shimmable tool usage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReshimAnalysis {
    /// Tools we can shim right now (backing tool present, wrapper missing).
    pub can_shim: Vec<String>,
    /// Tools whose wrapper script is already installed.
    pub already_shimmed: Vec<String>,
    /// Tools whose native package must be installed first.
    pub needs_install: Vec<String>,
    /// Tools with no workable Linux stand-in.
    pub cannot_shim: Vec<String>,
}

/// Outcome of applying shims for a named set of tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReshimOutcome {
    pub shimmed: Vec<String>,
    /// Tools that could not be shimmed, each with the reason.
    pub failed: Vec<(String, String)>,
}

const SOURCE_EXTENSIONS: &[&str] = &["js", "jsx", "ts", "tsx", "mjs", "cjs", "sh"];

/// Scan an installed extension package and classify every referenced tool.
pub fn analyze_for_reshim(package_path: &Path) -> ExtensionResult<ReshimAnalysis> {
    if !package_path.exists() {
        return Err(ExtensionError::NotFound(package_path.display().to_string()));
    }

    let registry = ToolRegistry::new();
    let dir = shim_dir();
    let mut analysis = ReshimAnalysis::default();

    let mut seen: Vec<String> = Vec::new();
    for entry in walkdir::WalkDir::new(package_path)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
    {
        let is_source = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext));
        if !is_source {
            continue;
        }
        let Ok(code) = fs::read_to_string(entry.path()) else {
            continue;
        };
        for mapping in registry.find_tools_in_code(&code) {
            if !seen.contains(&mapping.tool) {
                seen.push(mapping.tool.clone());
            }
        }
    }

    // Classification follows registration order for a stable report.
    for mapping in registry.all() {
        if !seen.contains(&mapping.tool) {
            continue;
        }
        match mapping.kind {
            ShimKind::Unsupported => analysis.cannot_shim.push(mapping.tool.clone()),
            _ if dir.join(&mapping.tool).exists() => {
                analysis.already_shimmed.push(mapping.tool.clone());
            }
            _ if is_tool_installed(&mapping.probe) => analysis.can_shim.push(mapping.tool.clone()),
            _ => analysis.needs_install.push(mapping.tool.clone()),
        }
    }

    Ok(analysis)
}

/// Install wrapper scripts for the named tools.
///
/// Unknown names and tools without a wrapper land in `failed` with a
/// reason; the rest are written to the shim directory.
pub fn apply_reshim(tool_names: &[String]) -> ReshimOutcome {
    let registry = ToolRegistry::new();
    let mut outcome = ReshimOutcome::default();

    for name in tool_names {
        let Some(mapping) = registry.get(name) else {
            tracing::warn!(tool = %name, "reshim requested for unknown tool");
            outcome.failed.push((name.clone(), "not a registered tool".to_string()));
            continue;
        };
        if mapping.kind != ShimKind::WrapperScript || generate_wrapper_script(mapping).is_none() {
            outcome
                .failed
                .push((name.clone(), "no wrapper script exists for this tool".to_string()));
            continue;
        }
        match install_shims(&[mapping]) {
            Ok(()) => outcome.shimmed.push(name.clone()),
            Err(e) => {
                tracing::warn!(tool = %name, error = %e, "failed to install shim");
                outcome.failed.push((name.clone(), e.to_string()));
            }
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_registry_has_default_tools() {
        let registry = ToolRegistry::new();
        assert!(registry.get("pbcopy").is_some());
        assert!(registry.get("osascript").is_some());
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn test_registry_order_is_stable() {
        let registry = ToolRegistry::new();
        let tools: Vec<_> = registry.all().iter().map(|m| m.tool.as_str()).collect();
        assert_eq!(tools[0], "pbcopy");
        assert_eq!(tools[1], "pbpaste");
        // Same tool list every construction.
        let again: Vec<_> = ToolRegistry::new().all().iter().map(|m| m.tool.clone()).collect();
        assert_eq!(tools, again);
    }

    #[test]
    fn test_find_tools_in_code() {
        let registry = ToolRegistry::new();
        let code = r#"
            const result = exec('pbcopy');
            spawn('jq', ['.name']);
        "#;

        let found = registry.find_tools_in_code(code);
        assert!(found.iter().any(|t| t.tool == "pbcopy"));
        assert!(found.iter().any(|t| t.tool == "jq"));
    }

    #[test]
    fn test_find_tools_ignores_bare_identifiers() {
        let registry = ToolRegistry::new();
        let found = registry.find_tools_in_code("let open = true; openWindow();");
        assert!(found.is_empty());
    }

    #[test]
    fn test_wrapper_generation() {
        let registry = ToolRegistry::new();
        let script = generate_wrapper_script(registry.get("pbcopy").unwrap());
        let script = script.expect("pbcopy has a wrapper");
        assert!(script.contains("#!/bin/bash"));
        assert!(script.contains("xclip"));
        assert!(script.contains("wl-copy"));
    }

    #[test]
    fn test_no_wrapper_for_direct_exec_tools() {
        let registry = ToolRegistry::new();
        assert!(generate_wrapper_script(registry.get("jq").unwrap()).is_none());
    }

    #[test]
    fn test_install_shims_writes_executable_scripts() {
        let dir = TempDir::new().unwrap();
        let registry = ToolRegistry::new();
        let mappings = [registry.get("pbcopy").unwrap(), registry.get("say").unwrap()];
        install_shims_into(&mappings, dir.path()).unwrap();

        let script = dir.path().join("pbcopy");
        assert!(script.exists());
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&script).unwrap().permissions().mode();
            assert_eq!(mode & 0o111, 0o111);
        }
    }

    #[test]
    fn test_analyze_for_reshim_missing_path() {
        let err = analyze_for_reshim(Path::new("/nonexistent/package")).unwrap_err();
        assert!(matches!(err, ExtensionError::NotFound(_)));
    }

    #[test]
    fn test_analyze_for_reshim_classifies_unsupported() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("index.js"), r#"exec('qlmanage'); exec('pbcopy');"#).unwrap();

        let analysis = analyze_for_reshim(dir.path()).unwrap();
        assert!(analysis.cannot_shim.contains(&"qlmanage".to_string()));
        // pbcopy ends up in one of the other buckets depending on the machine.
        let elsewhere = analysis.can_shim.contains(&"pbcopy".to_string())
            || analysis.already_shimmed.contains(&"pbcopy".to_string())
            || analysis.needs_install.contains(&"pbcopy".to_string());
        assert!(elsewhere);
    }

    #[test]
    fn test_apply_reshim_unknown_tool_fails_with_reason() {
        let outcome = apply_reshim(&["definitely-not-a-tool".to_string()]);
        assert!(outcome.shimmed.is_empty());
        assert_eq!(outcome.failed.len(), 1);
        let (tool, reason) = &outcome.failed[0];
        assert_eq!(tool, "definitely-not-a-tool");
        assert!(reason.contains("not a registered tool"));
    }

    #[test]
    fn test_apply_reshim_reports_missing_wrapper() {
        // jq is a direct-exec tool; there is no wrapper to install.
        let outcome = apply_reshim(&["jq".to_string()]);
        assert!(outcome.shimmed.is_empty());
        let (tool, reason) = &outcome.failed[0];
        assert_eq!(tool, "jq");
        assert!(reason.contains("no wrapper script"));
    }

    #[test]
    fn test_is_tool_installed_handles_garbage() {
        assert!(!is_tool_installed(""));
        assert!(!is_tool_installed("no-such-binary-xyz --version"));
    }
}
