//! Supervisor-side handling of plugin host calls.
//!
//! The host process forwards every host-facing API call the plugin makes;
//! the supervisor answers them here. The trait seam exists so tests (and
//! alternative frontends) can substitute their own handler.

use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;

use crate::shim::script::{self, ScriptCommand};

use super::protocol::{HostCall, HostCallResult};

/// Answers host calls on behalf of a plugin session.
#[async_trait]
pub trait HostCallHandler: Send + Sync {
    async fn handle(&self, call: HostCall) -> HostCallResult;
}

/// Simple persistent key-value storage, one JSON file per user.
struct KvStorage {
    path: PathBuf,
    entries: Mutex<serde_json::Map<String, serde_json::Value>>,
}

impl KvStorage {
    fn open(path: PathBuf) -> Self {
        let entries = std::fs::read_to_string(&path)
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();
        Self { path, entries: Mutex::new(entries) }
    }

    fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: String, value: serde_json::Value) -> std::io::Result<()> {
        let snapshot = {
            let mut entries = self.entries.lock();
            entries.insert(key, value);
            entries.clone()
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(&snapshot)?;
        std::fs::write(&self.path, data)
    }
}

/// Default handler backed by the native shims.
pub struct NativeHostHandler {
    storage: KvStorage,
}

impl NativeHostHandler {
    pub fn new() -> Self {
        let path = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("portico")
            .join("storage.json");
        Self { storage: KvStorage::open(path) }
    }

    /// Handler with storage rooted at an explicit path, for tests.
    pub fn with_storage_path(path: PathBuf) -> Self {
        Self { storage: KvStorage::open(path) }
    }
}

impl Default for NativeHostHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HostCallHandler for NativeHostHandler {
    async fn handle(&self, call: HostCall) -> HostCallResult {
        tracing::debug!(?call, "handling host call");
        match call {
            HostCall::ClipboardReadText => {
                run_shim(ScriptCommand::GetClipboard).await
            }
            HostCall::ClipboardWriteText { text } => {
                run_shim(ScriptCommand::SetClipboard { text }).await
            }
            HostCall::ShowNotification { title, message } => {
                show_notification(title, message).await
            }
            HostCall::ShowToast { toast_id, title, style } => {
                // No supervisor UI surface; toasts degrade to desktop
                // notifications, keyed so actions can still refer to them.
                tracing::info!(toast_id, style = style.as_deref().unwrap_or("default"), "toast");
                show_notification(title, String::new()).await
            }
            #[cfg(feature = "secrets")]
            HostCall::OauthGetToken { provider } => {
                match crate::secrets::TokenStore::new().get(&provider) {
                    Ok(Some(token)) => HostCallResult::ok(Some(json!(token))),
                    Ok(None) => HostCallResult::ok(None),
                    Err(e) => HostCallResult::err(e.to_string()),
                }
            }
            #[cfg(feature = "secrets")]
            HostCall::OauthSetToken { provider, token } => {
                match crate::secrets::TokenStore::new().set(&provider, &token) {
                    Ok(()) => HostCallResult::ok(None),
                    Err(e) => HostCallResult::err(e.to_string()),
                }
            }
            #[cfg(not(feature = "secrets"))]
            HostCall::OauthGetToken { .. } | HostCall::OauthSetToken { .. } => {
                HostCallResult::err("OAuth token storage requires the 'secrets' feature")
            }
            HostCall::StorageGet { key } => HostCallResult::ok(self.storage.get(&key)),
            HostCall::StorageSet { key, value } => match self.storage.set(key, value) {
                Ok(()) => HostCallResult::ok(None),
                Err(e) => HostCallResult::err(format!("storage write failed: {e}")),
            },
            HostCall::AiComplete { .. } => {
                HostCallResult::err("AI completion is not available on this host")
            }
        }
    }
}

/// Run a blocking shim command off the async runtime.
async fn run_shim(command: ScriptCommand) -> HostCallResult {
    let result = tokio::task::spawn_blocking(move || script::execute(&command)).await;
    match result {
        Ok(shim) if shim.success => HostCallResult::ok(shim.output.map(|o| json!(o))),
        Ok(shim) => HostCallResult::err(shim.error.unwrap_or_else(|| "shim failed".to_string())),
        Err(e) => HostCallResult::err(format!("shim task panicked: {e}")),
    }
}

#[cfg(feature = "notifications")]
async fn show_notification(title: String, message: String) -> HostCallResult {
    let result = tokio::task::spawn_blocking(move || {
        notify_rust::Notification::new().summary(&title).body(&message).show()
    })
    .await;
    match result {
        Ok(Ok(_)) => HostCallResult::ok(None),
        Ok(Err(e)) => HostCallResult::err(format!("notification failed: {e}")),
        Err(e) => HostCallResult::err(format!("notification task panicked: {e}")),
    }
}

#[cfg(not(feature = "notifications"))]
async fn show_notification(title: String, message: String) -> HostCallResult {
    run_shim(ScriptCommand::Notification { title, message }).await
}
