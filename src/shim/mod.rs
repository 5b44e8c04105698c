//! Compatibility shims for macOS-targeted extensions.
//!
//! Three layers: path translation ([`paths`]), pattern-matched AppleScript
//! translation ([`script`]), and a registry of command-line tool stand-ins
//! ([`registry`]). [`system`] answers the system-information queries
//! extensions make through the same surface.

pub mod paths;
pub mod registry;
pub mod script;
pub mod system;

pub use registry::{ReshimAnalysis, ReshimOutcome, ToolRegistry};
pub use script::{run as run_applescript, run_with_shell_policy, ShimResult};
pub use system::{detect_display_server, system_info, DisplayServer};

/// Translate a macOS path to its Linux equivalent. See [`paths::translate`].
pub fn translate_path(path: &str) -> String {
    paths::translate(path)
}
