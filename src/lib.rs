#![allow(dead_code)]

//! # Portico
//!
//! Linux extension host for macOS-targeted launcher plugins.
//!
//! Portico installs launcher extension packages written against the macOS
//! extension API, scores how well each one can work on Linux, translates
//! their macOS assumptions (paths, AppleScript, command-line tools) through
//! a layer of shims, and runs their commands in an isolated host process
//! supervised over a line-oriented JSON bridge.
//!
//! ## Subsystems
//!
//! - [`shim`] - path translation, pattern-matched AppleScript execution,
//!   and the command-line tool registry
//! - [`compat`] - read-only package analysis and compatibility scoring
//! - [`extension`] - the installed-package store and manifest model
//! - [`bridge`] - wire protocol and host process supervision
//! - [`host`] - the extension host runtime behind `portico-host`

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow common patterns that are intentional in this codebase
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::map_unwrap_or)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_possible_truncation)]

pub mod bridge;
pub mod compat;
pub mod config;
pub mod extension;
pub mod host;
pub mod shim;

#[cfg(feature = "secrets")]
pub mod secrets;

// Re-export commonly used types
pub use bridge::{BridgeError, BridgeEvent, HostHandle, PluginSession, RunRequest};
pub use compat::{CompatibilityReport, CompatibilityWarning};
pub use config::Config;
pub use extension::{ExtensionError, ExtensionStore, PluginInfo};
pub use shim::ShimResult;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "portico";
