//! Portico - Linux extension host for macOS-targeted launcher plugins.
//!
//! The supervising CLI: installs and scores extension packages, exercises
//! the shims directly, and launches plugin commands in the isolated host
//! process.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use portico::bridge::{BridgeEvent, NativeHostHandler, PluginSession, RunRequest};
use portico::compat::{self, CompatibilityReport};
use portico::extension::ExtensionStore;
use portico::host::UiTree;
use portico::shim;
use portico::Config;

/// Linux extension host for macOS-targeted launcher plugins
#[derive(Parser)]
#[command(name = "portico")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List installed extension commands
    List {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Install an extension from a zip archive or URL
    Install {
        /// Path to a .zip archive, or an http(s) URL
        source: String,
    },

    /// Uninstall an extension package
    Uninstall {
        /// Package name as shown by `list`
        name: String,
    },

    /// Analyze a package directory for Linux compatibility
    Analyze {
        /// Extracted package directory
        path: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Inspect and install command-line tool shims for a package
    Reshim {
        /// Installed package name
        name: String,

        /// Install wrapper scripts for these tools (repeatable)
        #[arg(long)]
        apply: Vec<String>,
    },

    /// Translate an AppleScript snippet through the script shim
    Script {
        /// The script text
        script: String,
    },

    /// Translate a macOS path to its Linux equivalent
    TranslatePath {
        /// Path to translate
        path: String,
    },

    /// Run an extension command in the host process
    Run {
        /// Package name
        name: String,

        /// Command name within the package
        command: String,
    },

    /// Show system information as reported to extensions
    Info,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { EnvFilter::new("debug") } else { EnvFilter::new("warn") };
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = Config::load()?;
    let store = match &config.general.extensions_dir {
        Some(dir) => ExtensionStore::new(dir.clone()),
        None => ExtensionStore::open_default(),
    };

    match cli.command {
        Commands::List { format } => cmd_list(&store, &format),
        Commands::Install { source } => cmd_install(&store, &config, &source),
        Commands::Uninstall { name } => {
            store.uninstall(&name)?;
            println!("Uninstalled '{name}'");
            Ok(())
        }
        Commands::Analyze { path, format } => cmd_analyze(&path, &format),
        Commands::Reshim { name, apply } => cmd_reshim(&store, &name, &apply),
        Commands::Script { script } => cmd_script(&config, &script),
        Commands::TranslatePath { path } => {
            println!("{}", shim::translate_path(&path));
            Ok(())
        }
        Commands::Run { name, command } => cmd_run(&store, &config, &name, &command),
        Commands::Info => {
            let info = shim::system_info();
            let mut keys: Vec<_> = info.keys().collect();
            keys.sort();
            for key in keys {
                println!("{key}: {}", info[key]);
            }
            Ok(())
        }
        Commands::Completions { shell } => {
            generate(shell, &mut Cli::command(), "portico", &mut io::stdout());
            Ok(())
        }
    }
}

fn cmd_list(store: &ExtensionStore, format: &str) -> Result<()> {
    let plugins = store.discover()?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&plugins)?);
        return Ok(());
    }

    if plugins.is_empty() {
        println!("No extensions installed.");
        return Ok(());
    }
    for plugin in plugins {
        let score = plugin
            .compatibility_score
            .map_or_else(|| "unscored".to_string(), |s| {
                format!("{s} ({})", CompatibilityReport::band(s))
            });
        println!("{}/{}  {}  [{}]", plugin.plugin_name, plugin.command_name, plugin.title, score);
    }
    Ok(())
}

fn cmd_install(store: &ExtensionStore, config: &Config, source: &str) -> Result<()> {
    let installed = if source.starts_with("http://") || source.starts_with("https://") {
        #[cfg(feature = "downloads")]
        {
            store.install_from_url(source)?
        }
        #[cfg(not(feature = "downloads"))]
        {
            return Err(anyhow!("URL installs require the 'downloads' feature"));
        }
    } else {
        store.install_from_file(Path::new(source))?
    };

    let report = &installed.report;
    if report.score < config.general.min_install_score {
        store.uninstall(&installed.name)?;
        return Err(anyhow!(
            "'{}' scored {} which is below the configured minimum of {}",
            installed.name,
            report.score,
            config.general.min_install_score
        ));
    }

    println!(
        "Installed '{}' (compatibility {} - {})",
        installed.name,
        report.score,
        CompatibilityReport::band(report.score)
    );
    if report.has_native_binaries {
        println!("Warning: package ships native macOS binaries that cannot run here.");
    }
    for warning in &report.warnings {
        println!("  [{}] {}", warning.command_name, warning.reason);
    }

    if config.shims.auto_reshim {
        let analysis = shim::registry::analyze_for_reshim(&installed.path)?;
        if !analysis.can_shim.is_empty() {
            let outcome = shim::registry::apply_reshim(&analysis.can_shim);
            for tool in &outcome.shimmed {
                println!("auto-shimmed: {tool}");
            }
            let rescored = store.rescore(&installed.name)?;
            println!("Rescored after shimming: {}", rescored.score);
        }
    }
    Ok(())
}

fn cmd_analyze(path: &Path, format: &str) -> Result<()> {
    if !path.is_dir() {
        return Err(anyhow!("not a directory: {}", path.display()));
    }
    let report = compat::analyze(path);

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Score: {} ({})", report.score, CompatibilityReport::band(report.score));
    if report.has_native_binaries {
        println!("Hard blocker: native macOS binaries present");
    }
    for warning in &report.warnings {
        println!("  [{}] {}", warning.command_name, warning.reason);
    }
    Ok(())
}

fn cmd_reshim(store: &ExtensionStore, name: &str, apply: &[String]) -> Result<()> {
    let package_dir = store.extensions_dir().join(name);

    if apply.is_empty() {
        let analysis = shim::registry::analyze_for_reshim(&package_dir)?;
        println!("{}", serde_json::to_string_pretty(&analysis)?);
        return Ok(());
    }

    let outcome = shim::registry::apply_reshim(apply);
    for tool in &outcome.shimmed {
        println!("shimmed: {tool}");
    }
    for (tool, reason) in &outcome.failed {
        println!("failed: {tool}: {reason}");
    }
    // Installed shims change what the package can do, so the persisted
    // score is stale.
    let report = store.rescore(name)?;
    println!("Rescored '{name}': {}", report.score);
    Ok(())
}

fn cmd_script(config: &Config, script: &str) -> Result<()> {
    let result = shim::run_with_shell_policy(script, config.shims.allow_shell_scripts);
    if result.success {
        if let Some(output) = result.output {
            println!("{output}");
        }
        Ok(())
    } else {
        Err(anyhow!(result.error.unwrap_or_else(|| "shim failed".to_string())))
    }
}

fn cmd_run(store: &ExtensionStore, config: &Config, name: &str, command: &str) -> Result<()> {
    let plugins = store.discover()?;
    let plugin = plugins
        .iter()
        .find(|p| p.plugin_name == name && p.command_name == command)
        .ok_or_else(|| anyhow!("no command '{command}' in package '{name}'"))?;

    let request = RunRequest {
        plugin_path: plugin.plugin_path.clone(),
        command_name: plugin.command_name.clone(),
        mode: plugin.mode,
        has_platform_feature_access: config.host.platform_feature_access,
    };

    let runtime = tokio::runtime::Runtime::new().context("starting async runtime")?;
    runtime.block_on(async {
        let (tx, mut rx) = tokio::sync::mpsc::channel(64);
        let session = PluginSession::spawn(
            &config.host.program,
            &config.host.args,
            request,
            Arc::new(NativeHostHandler::new()),
            tx,
        )
        .await?;
        tracing::info!(session = %session.handle().session_id, "session started");

        let mut tree = UiTree::new();
        while let Some(event) = rx.recv().await {
            match event {
                BridgeEvent::UiUpdate(delta) => {
                    if let Err(e) = tree.apply(&delta) {
                        tracing::warn!(error = %e, "rejected ui delta");
                        continue;
                    }
                    if let Some(root) = tree.root() {
                        println!("[ui] {} (seq {})", root.kind, tree.last_seq());
                    }
                }
                BridgeEvent::PopView => println!("[nav] view popped"),
                BridgeEvent::GoBackToPluginList => {
                    println!("[nav] back to plugin list");
                    session.shutdown().await;
                }
                BridgeEvent::PluginError(message) => eprintln!("[error] {message}"),
                BridgeEvent::Terminated { abnormal } => {
                    if abnormal {
                        eprintln!("[session] host process died unexpectedly");
                    }
                    break;
                }
            }
        }
        Ok::<_, anyhow::Error>(())
    })
}
