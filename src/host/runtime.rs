//! Extension host runtime.
//!
//! This is the program behind `portico-host`. It is handed one plugin
//! command per invocation via a `run-plugin` message, executes it inside
//! this process, renders into the retained [`UiTree`], and routes every
//! host-facing capability back over the bridge as a `host-request`.
//!
//! The boundary rule: a plugin failure of any kind becomes a
//! `plugin-error` message. The host never dies silently on bad input;
//! it only exits when its stdin closes.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::oneshot;

use crate::bridge::protocol::{self, HostCall, HostCallResult, Message};
use crate::extension::{CommandMode, PackageJson};

use super::tree::{UiNode, UiTree};

/// Host side of the bridge: serializes outgoing messages and correlates
/// `host-request` / `host-response` pairs by id.
pub struct HostChannel<W> {
    writer: Arc<tokio::sync::Mutex<W>>,
    pending: Arc<parking_lot::Mutex<HashMap<u64, oneshot::Sender<HostCallResult>>>>,
    next_id: AtomicU64,
}

impl<W: AsyncWrite + Unpin + Send + 'static> HostChannel<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Arc::new(tokio::sync::Mutex::new(writer)),
            pending: Arc::new(parking_lot::Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        }
    }

    pub async fn send(&self, message: &Message) -> std::io::Result<()> {
        let line = protocol::encode(message).map_err(std::io::Error::other)?;
        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await
    }

    /// Issue a host call and wait for its response.
    ///
    /// Responses are matched strictly by id; two in-flight calls may
    /// complete in either order.
    pub async fn call(&self, call: HostCall) -> HostCallResult {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        if let Err(e) = self.send(&Message::HostRequest { id, call }).await {
            self.pending.lock().remove(&id);
            return HostCallResult::err(format!("bridge write failed: {e}"));
        }

        match rx.await {
            Ok(result) => result,
            Err(_) => HostCallResult::err("session closed before the host responded"),
        }
    }

    /// Route an incoming `host-response` to its waiting caller.
    pub fn complete(&self, id: u64, result: HostCallResult) {
        match self.pending.lock().remove(&id) {
            Some(tx) => {
                let _ = tx.send(result);
            }
            None => tracing::warn!(id, "response for unknown or stale request, discarding"),
        }
    }

    /// Fail every in-flight call. Called on session teardown.
    pub fn fail_pending(&self, reason: &str) {
        let pending: Vec<_> = self.pending.lock().drain().collect();
        for (id, tx) in pending {
            tracing::debug!(id, "failing pending host call: {reason}");
            let _ = tx.send(HostCallResult::err(reason));
        }
    }
}

/// Run the host loop over the given transport until EOF.
pub async fn run<R, W>(reader: R, writer: W) -> anyhow::Result<()>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let channel = Arc::new(HostChannel::new(writer));
    let mut lines = BufReader::new(reader).lines();
    let mut started = false;

    while let Ok(Some(line)) = lines.next_line().await {
        let Some(message) = protocol::decode(&line) else {
            continue;
        };
        match message {
            Message::RunPlugin { plugin_path, command_name, mode, has_platform_feature_access } => {
                if started {
                    tracing::warn!("run-plugin received twice, ignoring");
                    continue;
                }
                started = true;
                let channel = Arc::clone(&channel);
                tokio::spawn(async move {
                    let outcome = execute_command(
                        &channel,
                        Path::new(&plugin_path),
                        &command_name,
                        mode,
                        has_platform_feature_access,
                    )
                    .await;
                    if let Err(message) = outcome {
                        tracing::warn!(%message, "plugin command failed");
                        let _ = channel.send(&Message::PluginError { message }).await;
                    }
                });
            }
            Message::HostResponse { id, result } => channel.complete(id, result),
            Message::DispatchToastAction { toast_id, action_type } => {
                tracing::info!(toast_id, action_type, "toast action dispatched");
            }
            other => {
                tracing::warn!(?other, "unexpected message direction, dropping");
            }
        }
    }

    channel.fail_pending("host shutting down");
    Ok(())
}

/// Load and run one plugin command. Every failure path returns a message
/// destined for `plugin-error`.
async fn execute_command<W: AsyncWrite + Unpin + Send + 'static>(
    channel: &HostChannel<W>,
    plugin_path: &Path,
    command_name: &str,
    mode: CommandMode,
    has_platform_feature_access: bool,
) -> Result<(), String> {
    let manifest_path = plugin_path.join("package.json");
    let raw = std::fs::read_to_string(&manifest_path)
        .map_err(|e| format!("cannot read {}: {e}", manifest_path.display()))?;
    let manifest: PackageJson =
        serde_json::from_str(&raw).map_err(|e| format!("invalid package.json: {e}"))?;

    let command = manifest
        .commands
        .iter()
        .find(|c| c.name == command_name)
        .ok_or_else(|| format!("command '{command_name}' not declared in package.json"))?;

    let entry = plugin_path.join(format!("{command_name}.js"));
    if !entry.exists() {
        return Err(format!("command entry file missing: {}", entry.display()));
    }

    tracing::info!(
        command = command_name,
        ?mode,
        platform_features = has_platform_feature_access,
        "running plugin command"
    );

    match mode {
        CommandMode::NoView => {
            // Background command: nothing to render, hand control straight
            // back to the launcher.
            channel.send(&Message::GoBackToPluginList).await.map_err(|e| e.to_string())
        }
        CommandMode::View | CommandMode::MenuBar => {
            let mut tree = UiTree::new();
            let title = command.title.clone().unwrap_or_else(|| command.name.clone());
            let mut root = UiNode::new(1, "detail")
                .with_prop("title", json!(title))
                .with_prop("isLoading", json!(false));
            if let Some(description) = command.description.clone().or_else(|| manifest.description.clone()) {
                root = root.with_prop("markdown", json!(description));
            }
            let delta = tree.render(root);
            channel.send(&Message::UiUpdate { delta }).await.map_err(|e| e.to_string())
        }
    }
}
