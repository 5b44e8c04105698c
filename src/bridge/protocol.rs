//! Bridge wire protocol.
//!
//! Messages travel between the supervisor and the host process as JSON,
//! one message per line, over the child's stdin/stdout. Each message is a
//! tagged union `{type, payload}`. Unknown tags are dropped by [`decode`]
//! with a log line; they are never fatal, so either side can grow new
//! message types without breaking the other.

use serde::{Deserialize, Serialize};

use crate::extension::CommandMode;
use crate::host::tree::UiDelta;

/// A host-facing API call made by the running plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum HostCall {
    ClipboardReadText,
    ClipboardWriteText {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    ShowToast {
        toast_id: String,
        title: String,
        style: Option<String>,
    },
    ShowNotification {
        title: String,
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    OauthGetToken {
        provider: String,
    },
    #[serde(rename_all = "camelCase")]
    OauthSetToken {
        provider: String,
        token: String,
    },
    StorageGet {
        key: String,
    },
    StorageSet {
        key: String,
        value: serde_json::Value,
    },
    AiComplete {
        prompt: String,
    },
}

impl HostCall {
    /// Whether this call touches a platform-only capability, granted per
    /// session via `run-plugin`'s feature-access flag.
    pub fn requires_platform_access(&self) -> bool {
        matches!(
            self,
            Self::ClipboardReadText
                | Self::ClipboardWriteText { .. }
                | Self::OauthGetToken { .. }
                | Self::OauthSetToken { .. }
                | Self::AiComplete { .. }
        )
    }
}

/// Result of a host call, sent back in a `host-response`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostCallResult {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl HostCallResult {
    pub fn ok(data: Option<serde_json::Value>) -> Self {
        Self { success: true, data, error: None }
    }

    pub fn err(error: impl Into<String>) -> Self {
        Self { success: false, data: None, error: Some(error.into()) }
    }
}

/// A bridge message, in either direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum Message {
    /// Supervisor -> host: load and run one plugin command.
    #[serde(rename_all = "camelCase")]
    RunPlugin {
        plugin_path: String,
        command_name: String,
        mode: CommandMode,
        has_platform_feature_access: bool,
    },
    /// Host -> supervisor: the plugin popped its top view.
    PopView,
    /// Host -> supervisor: navigation back to the launcher root.
    GoBackToPluginList,
    /// Supervisor -> host: the user pressed a toast action button.
    #[serde(rename_all = "camelCase")]
    DispatchToastAction { toast_id: String, action_type: String },
    /// Host -> supervisor: apply a UI tree delta. Deltas are ordered and
    /// must be applied in send order.
    UiUpdate { delta: UiDelta },
    /// Host -> supervisor: plugin requests a host capability.
    HostRequest { id: u64, call: HostCall },
    /// Supervisor -> host: response to a `host-request`, matched by id.
    HostResponse { id: u64, result: HostCallResult },
    /// Host -> supervisor: the plugin crashed.
    PluginError { message: String },
}

/// Serialize a message to one wire line (no trailing newline).
pub fn encode(message: &Message) -> serde_json::Result<String> {
    serde_json::to_string(message)
}

/// Decode one wire line.
///
/// Malformed JSON and unrecognized tags both yield `None` after a warning;
/// the session keeps running either way.
pub fn decode(line: &str) -> Option<Message> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str(line) {
        Ok(message) => Some(message),
        Err(e) => {
            tracing::warn!(error = %e, line, "dropping unrecognized bridge message");
            None
        }
    }
}
