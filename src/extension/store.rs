//! Installed-extension store.
//!
//! Extensions arrive as zip archives, get extracted into a per-package
//! directory, scored for compatibility, and discovered back out as flat
//! per-command [`PluginInfo`] records. The compatibility report is
//! persisted next to the package as `compatibility.json` and recomputed
//! wholesale on reinstall or rescore.

use std::fs;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use zip::ZipArchive;

use crate::compat::{self, CompatibilityReport};

use super::error::{ExtensionError, ExtensionResult};
use super::manifest::PackageJson;
use super::types::{CommandMode, PluginInfo};

const COMPATIBILITY_FILE_NAME: &str = "compatibility.json";

/// Result of a successful install.
#[derive(Debug)]
pub struct InstalledExtension {
    pub name: String,
    pub path: PathBuf,
    pub report: CompatibilityReport,
}

/// Store rooted at a directory of extracted extension packages.
pub struct ExtensionStore {
    extensions_dir: PathBuf,
}

impl ExtensionStore {
    pub fn new(extensions_dir: impl Into<PathBuf>) -> Self {
        Self { extensions_dir: extensions_dir.into() }
    }

    /// Store at the default per-user location.
    pub fn open_default() -> Self {
        let dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("portico")
            .join("extensions");
        Self::new(dir)
    }

    pub fn extensions_dir(&self) -> &Path {
        &self.extensions_dir
    }

    fn package_dir(&self, name: &str) -> PathBuf {
        self.extensions_dir.join(name)
    }

    /// Install an extension from a local zip archive.
    ///
    /// Reinstalling an existing package replaces it and recomputes its
    /// compatibility report.
    pub fn install_from_file(&self, archive_path: &Path) -> ExtensionResult<InstalledExtension> {
        if !archive_path.exists() {
            return Err(ExtensionError::NotFound(archive_path.display().to_string()));
        }
        let data = fs::read(archive_path)?;

        let checksum = format!("{:x}", Sha256::digest(&data));
        tracing::info!(archive = %archive_path.display(), sha256 = %checksum, "installing extension");

        let name = archive_package_name(&data)?.unwrap_or_else(|| {
            archive_path
                .file_stem()
                .map_or_else(|| "extension".to_string(), |s| s.to_string_lossy().to_string())
        });

        let target = self.package_dir(&name);
        extract_archive(&data, &target)?;

        let report = compat::analyze(&target);
        save_report(&target, &report)?;

        tracing::info!(name = %name, score = report.score, "extension installed");
        Ok(InstalledExtension { name, path: target, report })
    }

    /// Install an extension by downloading its archive.
    #[cfg(feature = "downloads")]
    pub fn install_from_url(&self, url: &str) -> ExtensionResult<InstalledExtension> {
        tracing::info!(url, "downloading extension archive");
        let response = reqwest::blocking::get(url)
            .map_err(|e| ExtensionError::Network(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ExtensionError::Network(format!(
                "download failed with status {}",
                response.status()
            )));
        }
        let bytes = response.bytes().map_err(|e| ExtensionError::Network(e.to_string()))?;

        let mut temp = tempfile::NamedTempFile::new()?;
        std::io::Write::write_all(&mut temp, &bytes)?;
        self.install_from_file(temp.path())
    }

    /// List every launchable command across all installed packages.
    ///
    /// Packages with a missing or unparseable manifest are skipped with a
    /// warning rather than failing discovery outright.
    pub fn discover(&self) -> ExtensionResult<Vec<PluginInfo>> {
        let mut plugins = Vec::new();

        if !self.extensions_dir.exists() {
            fs::create_dir_all(&self.extensions_dir)?;
            return Ok(plugins);
        }

        let package_dirs = fs::read_dir(&self.extensions_dir)?
            .filter_map(std::result::Result::ok)
            .filter(|entry| entry.path().is_dir());

        for entry in package_dirs {
            let package_dir = entry.path();
            let package_name = package_dir
                .file_name()
                .map_or_else(String::new, |s| s.to_string_lossy().to_string());

            let manifest_path = package_dir.join("package.json");
            let manifest: PackageJson = match fs::read_to_string(&manifest_path)
                .map_err(ExtensionError::from)
                .and_then(|raw| serde_json::from_str(&raw).map_err(ExtensionError::from))
            {
                Ok(manifest) => manifest,
                Err(e) => {
                    tracing::warn!(package = %package_name, error = %e, "skipping package with bad manifest");
                    continue;
                }
            };

            let report = load_report(&package_dir);
            let package_title =
                manifest.title.clone().unwrap_or_else(|| package_name.clone());

            for command in &manifest.commands {
                // Commands without an entry file are declared but not built.
                if !package_dir.join(format!("{}.js", command.name)).exists() {
                    tracing::debug!(
                        package = %package_name,
                        command = %command.name,
                        "command has no entry file, skipping"
                    );
                    continue;
                }

                let warnings = report.as_ref().map(|r| {
                    r.warnings
                        .iter()
                        .filter(|w| w.command_name == command.name)
                        .cloned()
                        .collect::<Vec<_>>()
                });

                plugins.push(PluginInfo {
                    title: command.title.clone().unwrap_or_else(|| command.name.clone()),
                    description: command.description.clone().or_else(|| manifest.description.clone()),
                    plugin_title: package_title.clone(),
                    plugin_name: package_name.clone(),
                    command_name: command.name.clone(),
                    plugin_path: package_dir.display().to_string(),
                    icon: command.icon.clone().or_else(|| manifest.icon.clone()),
                    preferences: manifest.preferences.clone(),
                    command_preferences: command.preferences.clone(),
                    mode: CommandMode::parse(command.mode.as_deref()),
                    author: manifest.author.clone(),
                    owner: manifest.owner.clone(),
                    compatibility_warnings: warnings,
                    compatibility_score: report.as_ref().map(|r| r.score),
                });
            }
        }

        Ok(plugins)
    }

    /// Remove an installed package and everything under it.
    pub fn uninstall(&self, name: &str) -> ExtensionResult<()> {
        let dir = self.package_dir(name);
        if !dir.exists() {
            return Err(ExtensionError::NotFound(name.to_string()));
        }
        fs::remove_dir_all(&dir)?;
        tracing::info!(name, "extension uninstalled");
        Ok(())
    }

    /// Recompute and persist the compatibility report for a package.
    ///
    /// Called after reshimming, since installed shims change what the
    /// package can do.
    pub fn rescore(&self, name: &str) -> ExtensionResult<CompatibilityReport> {
        let dir = self.package_dir(name);
        if !dir.exists() {
            return Err(ExtensionError::NotFound(name.to_string()));
        }
        let report = compat::analyze(&dir);
        save_report(&dir, &report)?;
        Ok(report)
    }
}

fn save_report(package_dir: &Path, report: &CompatibilityReport) -> ExtensionResult<()> {
    let data = serde_json::to_string_pretty(report)?;
    fs::write(package_dir.join(COMPATIBILITY_FILE_NAME), data)?;
    Ok(())
}

fn load_report(package_dir: &Path) -> Option<CompatibilityReport> {
    let raw = fs::read_to_string(package_dir.join(COMPATIBILITY_FILE_NAME)).ok()?;
    match serde_json::from_str(&raw) {
        Ok(report) => Some(report),
        Err(e) => {
            tracing::warn!(package = %package_dir.display(), error = %e, "bad compatibility metadata");
            None
        }
    }
}

/// Read the package name out of the archive's manifest without extracting.
fn archive_package_name(data: &[u8]) -> ExtensionResult<Option<String>> {
    let mut archive = ZipArchive::new(Cursor::new(data))?;
    let file_names: Vec<PathBuf> = archive.file_names().map(PathBuf::from).collect();
    let prefix = find_common_prefix(&file_names);

    let manifest_path = prefix
        .as_ref()
        .map_or_else(|| PathBuf::from("package.json"), |p| p.join("package.json"));

    let mut raw = String::new();
    match archive.by_name(&manifest_path.to_string_lossy()) {
        Ok(mut file) => {
            file.read_to_string(&mut raw)?;
        }
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let manifest: PackageJson = serde_json::from_str(&raw)
        .map_err(|e| ExtensionError::InvalidManifest(e.to_string()))?;
    Ok(manifest.name)
}

/// Archives produced from a repo checkout usually wrap everything in one
/// top-level directory; detect it so extraction can strip it.
fn find_common_prefix(file_names: &[PathBuf]) -> Option<PathBuf> {
    if file_names.len() <= 1 {
        return None;
    }
    file_names.first().and_then(|p| p.components().next()).and_then(|first| {
        file_names
            .iter()
            .all(|path| path.starts_with(first))
            .then(|| PathBuf::from(first.as_os_str()))
    })
}

fn extract_archive(data: &[u8], target_dir: &Path) -> ExtensionResult<()> {
    if target_dir.exists() {
        fs::remove_dir_all(target_dir)?;
    }
    fs::create_dir_all(target_dir)?;

    let mut archive = ZipArchive::new(Cursor::new(data))?;
    let file_names: Vec<PathBuf> = archive.file_names().map(PathBuf::from).collect();
    let prefix = find_common_prefix(&file_names);

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        // Reject entries that would escape the target directory.
        let Some(enclosed) = file.enclosed_name() else {
            tracing::warn!(entry = %file.name(), "skipping archive entry with unsafe path");
            continue;
        };

        let relative = prefix
            .as_ref()
            .and_then(|p| enclosed.strip_prefix(p).ok())
            .unwrap_or(enclosed.as_path())
            .to_path_buf();
        if relative.as_os_str().is_empty() {
            continue;
        }

        let outpath = target_dir.join(relative);

        if file.is_dir() {
            fs::create_dir_all(&outpath)?;
            continue;
        }

        if let Some(parent) = outpath.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut outfile = fs::File::create(&outpath)?;
        std::io::copy(&mut file, &mut outfile)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = file.unix_mode() {
                fs::set_permissions(&outpath, fs::Permissions::from_mode(mode))?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn build_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buf);
            for (name, data) in entries {
                writer.start_file(*name, SimpleFileOptions::default()).unwrap();
                writer.write_all(data).unwrap();
            }
            writer.finish().unwrap();
        }
        buf.into_inner()
    }

    fn write_archive_file(dir: &Path, entries: &[(&str, &[u8])]) -> PathBuf {
        let path = dir.join("ext.zip");
        fs::write(&path, build_archive(entries)).unwrap();
        path
    }

    const MANIFEST: &[u8] = br#"{
        "name": "clipboard-history",
        "title": "Clipboard History",
        "commands": [{"name": "history", "title": "Show History", "mode": "view"}]
    }"#;

    #[test]
    fn test_install_extracts_and_scores() {
        let tmp = TempDir::new().unwrap();
        let store = ExtensionStore::new(tmp.path().join("store"));
        let archive = write_archive_file(
            tmp.path(),
            &[("package.json", MANIFEST), ("history.js", b"export default () => null;")],
        );

        let installed = store.install_from_file(&archive).unwrap();
        assert_eq!(installed.name, "clipboard-history");
        assert!(installed.path.join("package.json").exists());
        assert!(installed.path.join("history.js").exists());
        assert!(installed.path.join("compatibility.json").exists());
        assert_eq!(installed.report.score, 100);
    }

    #[test]
    fn test_install_strips_common_prefix() {
        let tmp = TempDir::new().unwrap();
        let store = ExtensionStore::new(tmp.path().join("store"));
        let archive = write_archive_file(
            tmp.path(),
            &[
                ("repo-main/package.json", MANIFEST),
                ("repo-main/history.js", b"export default () => null;"),
            ],
        );

        let installed = store.install_from_file(&archive).unwrap();
        // Files land at the package root, not under repo-main/.
        assert!(installed.path.join("package.json").exists());
        assert!(!installed.path.join("repo-main").exists());
    }

    #[test]
    fn test_install_missing_archive() {
        let tmp = TempDir::new().unwrap();
        let store = ExtensionStore::new(tmp.path().join("store"));
        let err = store.install_from_file(Path::new("/no/such/archive.zip")).unwrap_err();
        assert!(matches!(err, ExtensionError::NotFound(_)));
    }

    #[test]
    fn test_discover_lists_commands_with_scores() {
        let tmp = TempDir::new().unwrap();
        let store = ExtensionStore::new(tmp.path().join("store"));
        let archive = write_archive_file(
            tmp.path(),
            &[
                ("package.json", MANIFEST),
                ("history.js", br#"const p = "/Applications/Notes.app";"#),
            ],
        );
        store.install_from_file(&archive).unwrap();

        let plugins = store.discover().unwrap();
        assert_eq!(plugins.len(), 1);
        let plugin = &plugins[0];
        assert_eq!(plugin.command_name, "history");
        assert_eq!(plugin.plugin_name, "clipboard-history");
        assert_eq!(plugin.mode, CommandMode::View);
        assert_eq!(plugin.compatibility_score, Some(90));
        assert!(plugin.compatibility_warnings.as_ref().is_some_and(|w| !w.is_empty()));
    }

    #[test]
    fn test_discover_skips_commands_without_entry_file() {
        let tmp = TempDir::new().unwrap();
        let store = ExtensionStore::new(tmp.path().join("store"));
        let manifest = br#"{
            "name": "half-built",
            "commands": [{"name": "ready"}, {"name": "missing"}]
        }"#;
        let archive = write_archive_file(
            tmp.path(),
            &[("package.json", manifest.as_slice()), ("ready.js", b"//")],
        );
        store.install_from_file(&archive).unwrap();

        let plugins = store.discover().unwrap();
        assert_eq!(plugins.len(), 1);
        assert_eq!(plugins[0].command_name, "ready");
    }

    #[test]
    fn test_uninstall_then_discover_empty() {
        let tmp = TempDir::new().unwrap();
        let store = ExtensionStore::new(tmp.path().join("store"));
        let archive = write_archive_file(
            tmp.path(),
            &[("package.json", MANIFEST), ("history.js", b"//")],
        );
        store.install_from_file(&archive).unwrap();

        store.uninstall("clipboard-history").unwrap();
        assert!(store.discover().unwrap().is_empty());

        let err = store.uninstall("clipboard-history").unwrap_err();
        assert!(matches!(err, ExtensionError::NotFound(_)));
    }

    #[test]
    fn test_rescore_rewrites_report() {
        let tmp = TempDir::new().unwrap();
        let store = ExtensionStore::new(tmp.path().join("store"));
        let archive = write_archive_file(
            tmp.path(),
            &[("package.json", MANIFEST), ("history.js", b"//")],
        );
        let installed = store.install_from_file(&archive).unwrap();
        assert_eq!(installed.report.score, 100);

        // The package changes on disk; rescore must pick it up.
        fs::write(installed.path.join("history.js"), r#"runAppleScript("beep")"#).unwrap();
        let report = store.rescore("clipboard-history").unwrap();
        assert_eq!(report.score, 85);

        let plugins = store.discover().unwrap();
        assert_eq!(plugins[0].compatibility_score, Some(85));
    }

    #[test]
    fn test_reinstall_replaces_package() {
        let tmp = TempDir::new().unwrap();
        let store = ExtensionStore::new(tmp.path().join("store"));
        let first = write_archive_file(
            tmp.path(),
            &[("package.json", MANIFEST), ("history.js", b"//"), ("stale.js", b"//")],
        );
        store.install_from_file(&first).unwrap();

        let second = tmp.path().join("ext2.zip");
        fs::write(
            &second,
            build_archive(&[("package.json", MANIFEST), ("history.js", b"//")]),
        )
        .unwrap();
        let installed = store.install_from_file(&second).unwrap();
        assert!(!installed.path.join("stale.js").exists());
    }

    #[test]
    fn test_find_common_prefix() {
        let with_prefix = vec![
            PathBuf::from("repo/package.json"),
            PathBuf::from("repo/src/index.js"),
        ];
        assert_eq!(find_common_prefix(&with_prefix), Some(PathBuf::from("repo")));

        let flat = vec![PathBuf::from("package.json"), PathBuf::from("index.js")];
        assert_eq!(find_common_prefix(&flat), None);

        let single = vec![PathBuf::from("repo/package.json")];
        assert_eq!(find_common_prefix(&single), None);
    }
}
