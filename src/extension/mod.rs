//! Extension packages: manifests, installation, and discovery.

pub mod error;
pub mod manifest;
pub mod store;
pub mod types;

pub use error::{ExtensionError, ExtensionResult};
pub use manifest::{Author, CommandInfo, PackageJson, Preference};
pub use store::{ExtensionStore, InstalledExtension};
pub use types::{CommandMode, PluginInfo};
