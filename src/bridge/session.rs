//! Plugin session supervision.
//!
//! One session is one host process running one plugin command. The
//! supervisor spawns the host, speaks the line protocol over its
//! stdin/stdout, answers host calls through a [`HostCallHandler`], and
//! surfaces everything the consumer cares about as [`BridgeEvent`]s on an
//! ordered channel.
//!
//! Host process death is always observed: the stdout reader hits EOF, the
//! exit status is reaped, and consumers receive a `Terminated` event they
//! can treat like `go-back-to-plugin-list`. Responses produced for a
//! session that has already died are discarded via the session's live
//! flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::extension::CommandMode;
use crate::host::tree::UiDelta;

use super::handler::HostCallHandler;
use super::protocol::{self, HostCallResult, Message};

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors that can occur while supervising a session.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Failed to spawn host process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Session is not running")]
    NotRunning,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Spawning,
    Running,
    AwaitingHostCall,
    Terminated,
}

/// What the consumer sees of a running session.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    /// Ordered UI delta; apply in receipt order.
    UiUpdate(UiDelta),
    PopView,
    GoBackToPluginList,
    PluginError(String),
    /// The host process exited. Consumers navigate back to the plugin
    /// list either way; `abnormal` is true when the exit was not
    /// requested by the supervisor.
    Terminated { abnormal: bool },
}

/// Identity of a live (or once-live) host process.
#[derive(Debug, Clone)]
pub struct HostHandle {
    pub session_id: Uuid,
    pub pid: Option<u32>,
    alive: Arc<AtomicBool>,
}

impl HostHandle {
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

/// Parameters of the command to run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub plugin_path: String,
    pub command_name: String,
    pub mode: CommandMode,
    pub has_platform_feature_access: bool,
}

/// A supervised host process running one plugin command.
pub struct PluginSession {
    session_id: Uuid,
    pid: Option<u32>,
    alive: Arc<AtomicBool>,
    state: Arc<parking_lot::Mutex<SessionState>>,
    stdin: Arc<tokio::sync::Mutex<ChildStdin>>,
    child: Arc<tokio::sync::Mutex<Child>>,
}

impl PluginSession {
    /// Spawn the host process and start the session.
    ///
    /// `program`/`args` name the host binary; tests substitute a shell
    /// stand-in. The `run-plugin` message is written before this returns,
    /// so the session is `Running` on success.
    pub async fn spawn(
        program: &str,
        args: &[String],
        request: RunRequest,
        handler: Arc<dyn HostCallHandler>,
        events: mpsc::Sender<BridgeEvent>,
    ) -> BridgeResult<Self> {
        let session_id = Uuid::new_v4();
        let state = Arc::new(parking_lot::Mutex::new(SessionState::Spawning));
        tracing::info!(%session_id, program, "spawning host process");

        let mut child = Command::new(program)
            .args(args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(BridgeError::Spawn)?;

        let pid = child.id();
        let mut stdin = child.stdin.take().ok_or(BridgeError::NotRunning)?;
        let stdout = child.stdout.take().ok_or(BridgeError::NotRunning)?;

        let platform_access = request.has_platform_feature_access;
        let run = Message::RunPlugin {
            plugin_path: request.plugin_path,
            command_name: request.command_name,
            mode: request.mode,
            has_platform_feature_access: request.has_platform_feature_access,
        };
        let line = protocol::encode(&run)?;
        stdin.write_all(line.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;

        *state.lock() = SessionState::Running;

        let session = Self {
            session_id,
            pid,
            alive: Arc::new(AtomicBool::new(true)),
            state,
            stdin: Arc::new(tokio::sync::Mutex::new(stdin)),
            child: Arc::new(tokio::sync::Mutex::new(child)),
        };
        session.start_reader(stdout, handler, events, platform_access);
        Ok(session)
    }

    fn start_reader(
        &self,
        stdout: tokio::process::ChildStdout,
        handler: Arc<dyn HostCallHandler>,
        events: mpsc::Sender<BridgeEvent>,
        platform_access: bool,
    ) {
        let session_id = self.session_id;
        let alive = Arc::clone(&self.alive);
        let state = Arc::clone(&self.state);
        let stdin = Arc::clone(&self.stdin);
        let child = Arc::clone(&self.child);

        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let Some(message) = protocol::decode(&line) else {
                    continue;
                };
                match message {
                    Message::UiUpdate { delta } => {
                        let _ = events.send(BridgeEvent::UiUpdate(delta)).await;
                    }
                    Message::PopView => {
                        let _ = events.send(BridgeEvent::PopView).await;
                    }
                    Message::GoBackToPluginList => {
                        let _ = events.send(BridgeEvent::GoBackToPluginList).await;
                    }
                    Message::PluginError { message } => {
                        tracing::warn!(%session_id, error = %message, "plugin reported an error");
                        let _ = events.send(BridgeEvent::PluginError(message)).await;
                    }
                    Message::HostRequest { id, call } => {
                        // Sessions without platform feature access never get
                        // their platform calls handled.
                        if !platform_access && call.requires_platform_access() {
                            tracing::warn!(%session_id, id, ?call, "refusing platform call");
                            let response = Message::HostResponse {
                                id,
                                result: HostCallResult::err(
                                    "platform feature access is not granted to this session",
                                ),
                            };
                            if let Ok(line) = protocol::encode(&response) {
                                let mut stdin = stdin.lock().await;
                                if stdin.write_all(line.as_bytes()).await.is_ok() {
                                    let _ = stdin.write_all(b"\n").await;
                                    let _ = stdin.flush().await;
                                }
                            }
                            continue;
                        }
                        *state.lock() = SessionState::AwaitingHostCall;
                        let handler = Arc::clone(&handler);
                        let alive = Arc::clone(&alive);
                        let stdin = Arc::clone(&stdin);
                        let state = Arc::clone(&state);
                        tokio::spawn(async move {
                            let result = handler.handle(call).await;
                            // A response for a dead session must never be
                            // written into a reused pipe.
                            if !alive.load(Ordering::SeqCst) {
                                tracing::debug!(%session_id, id, "discarding response for dead session");
                                return;
                            }
                            let response = Message::HostResponse { id, result };
                            if let Ok(line) = protocol::encode(&response) {
                                let mut stdin = stdin.lock().await;
                                if stdin.write_all(line.as_bytes()).await.is_ok() {
                                    let _ = stdin.write_all(b"\n").await;
                                    let _ = stdin.flush().await;
                                }
                            }
                            let mut state = state.lock();
                            if *state == SessionState::AwaitingHostCall {
                                *state = SessionState::Running;
                            }
                        });
                    }
                    other => {
                        tracing::warn!(%session_id, ?other, "unexpected message direction, dropping");
                    }
                }
            }

            // EOF: the host process is gone. Reap it and classify.
            alive.store(false, Ordering::SeqCst);
            let requested = { *state.lock() == SessionState::Terminated };
            let status = child.lock().await.wait().await.ok();
            *state.lock() = SessionState::Terminated;

            let abnormal = !requested && !status.is_some_and(|s| s.success());
            if abnormal {
                tracing::warn!(%session_id, ?status, "host process died abnormally");
            } else {
                tracing::debug!(%session_id, "host process exited");
            }
            let _ = events.send(BridgeEvent::Terminated { abnormal }).await;
        });
    }

    pub fn handle(&self) -> HostHandle {
        HostHandle {
            session_id: self.session_id,
            pid: self.pid,
            alive: Arc::clone(&self.alive),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Send a supervisor-to-host message.
    pub async fn send(&self, message: &Message) -> BridgeResult<()> {
        if !self.is_alive() {
            return Err(BridgeError::NotRunning);
        }
        let line = protocol::encode(message)?;
        let mut stdin = self.stdin.lock().await;
        stdin.write_all(line.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        Ok(())
    }

    /// Forward a toast action button press to the plugin.
    pub async fn dispatch_toast_action(&self, toast_id: &str, action_type: &str) -> BridgeResult<()> {
        self.send(&Message::DispatchToastAction {
            toast_id: toast_id.to_string(),
            action_type: action_type.to_string(),
        })
        .await
    }

    /// Tear the session down. Idempotent.
    pub async fn shutdown(&self) {
        *self.state.lock() = SessionState::Terminated;
        self.alive.store(false, Ordering::SeqCst);
        let mut child = self.child.lock().await;
        let _ = child.kill().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::protocol::{HostCall, HostCallResult};
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::time::timeout;

    struct RecordingHandler {
        calls: tokio::sync::Mutex<mpsc::Sender<HostCall>>,
    }

    #[async_trait]
    impl HostCallHandler for RecordingHandler {
        async fn handle(&self, call: HostCall) -> HostCallResult {
            let _ = self.calls.lock().await.send(call).await;
            HostCallResult::ok(None)
        }
    }

    struct NullHandler;

    #[async_trait]
    impl HostCallHandler for NullHandler {
        async fn handle(&self, _call: HostCall) -> HostCallResult {
            HostCallResult::ok(None)
        }
    }

    fn request() -> RunRequest {
        RunRequest {
            plugin_path: "/tmp/ext".to_string(),
            command_name: "test".to_string(),
            mode: CommandMode::View,
            has_platform_feature_access: false,
        }
    }

    async fn spawn_sh(
        script: &str,
        events: mpsc::Sender<BridgeEvent>,
        handler: Arc<dyn HostCallHandler>,
    ) -> PluginSession {
        PluginSession::spawn(
            "sh",
            &["-c".to_string(), script.to_string()],
            request(),
            handler,
            events,
        )
        .await
        .expect("spawn sh stand-in")
    }

    async fn next_event(rx: &mut mpsc::Receiver<BridgeEvent>) -> BridgeEvent {
        timeout(Duration::from_secs(5), rx.recv()).await.expect("event timeout").expect("channel open")
    }

    #[tokio::test]
    async fn test_events_arrive_in_send_order() {
        let (tx, mut rx) = mpsc::channel(16);
        let script = r#"
            read ignored
            echo '{"type":"pop-view"}'
            echo '{"type":"go-back-to-plugin-list"}'
        "#;
        let _session = spawn_sh(script, tx, Arc::new(NullHandler)).await;

        assert_eq!(next_event(&mut rx).await, BridgeEvent::PopView);
        assert_eq!(next_event(&mut rx).await, BridgeEvent::GoBackToPluginList);
        assert_eq!(next_event(&mut rx).await, BridgeEvent::Terminated { abnormal: false });
    }

    #[tokio::test]
    async fn test_unknown_tags_are_skipped_not_fatal() {
        let (tx, mut rx) = mpsc::channel(16);
        let script = r#"
            read ignored
            echo '{"type":"quantum-flux","payload":{"x":1}}'
            echo 'not even json'
            echo '{"type":"pop-view"}'
        "#;
        let _session = spawn_sh(script, tx, Arc::new(NullHandler)).await;

        assert_eq!(next_event(&mut rx).await, BridgeEvent::PopView);
    }

    #[tokio::test]
    async fn test_crash_reports_abnormal_termination() {
        let (tx, mut rx) = mpsc::channel(16);
        let session = spawn_sh("read ignored; exit 3", tx, Arc::new(NullHandler)).await;

        assert_eq!(next_event(&mut rx).await, BridgeEvent::Terminated { abnormal: true });
        assert!(!session.is_alive());
        assert_eq!(session.state(), SessionState::Terminated);
    }

    #[tokio::test]
    async fn test_plugin_error_is_forwarded() {
        let (tx, mut rx) = mpsc::channel(16);
        let script = r#"
            read ignored
            echo '{"type":"plugin-error","payload":{"message":"boom"}}'
        "#;
        let _session = spawn_sh(script, tx, Arc::new(NullHandler)).await;

        assert_eq!(next_event(&mut rx).await, BridgeEvent::PluginError("boom".to_string()));
    }

    #[tokio::test]
    async fn test_host_request_reaches_handler() {
        let (tx, mut rx) = mpsc::channel(16);
        let (call_tx, mut call_rx) = mpsc::channel(4);
        let handler = Arc::new(RecordingHandler { calls: tokio::sync::Mutex::new(call_tx) });
        let script = r#"
            read ignored
            echo '{"type":"host-request","payload":{"id":1,"call":{"type":"storage-get","key":"k"}}}'
            sleep 1
        "#;
        let _session = spawn_sh(script, tx, handler).await;

        let call = timeout(Duration::from_secs(5), call_rx.recv()).await.unwrap().unwrap();
        assert_eq!(call, HostCall::StorageGet { key: "k".to_string() });
        // Session winds down normally afterwards.
        assert_eq!(next_event(&mut rx).await, BridgeEvent::Terminated { abnormal: false });
    }

    #[tokio::test]
    async fn test_platform_calls_refused_without_feature_access() {
        let (tx, mut rx) = mpsc::channel(16);
        let (call_tx, mut call_rx) = mpsc::channel(4);
        let handler = Arc::new(RecordingHandler { calls: tokio::sync::Mutex::new(call_tx) });
        // The request() fixture grants no platform feature access.
        let script = r#"
            read ignored
            echo '{"type":"host-request","payload":{"id":1,"call":{"type":"clipboard-read-text"}}}'
            echo '{"type":"host-request","payload":{"id":2,"call":{"type":"storage-get","key":"k"}}}'
            sleep 1
        "#;
        let _session = spawn_sh(script, tx, handler).await;

        // Only the non-platform call reaches the handler.
        let call = timeout(Duration::from_secs(5), call_rx.recv()).await.unwrap().unwrap();
        assert_eq!(call, HostCall::StorageGet { key: "k".to_string() });
        assert_eq!(next_event(&mut rx).await, BridgeEvent::Terminated { abnormal: false });
        assert!(call_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_platform_calls_allowed_with_feature_access() {
        let (tx, mut rx) = mpsc::channel(16);
        let (call_tx, mut call_rx) = mpsc::channel(4);
        let handler = Arc::new(RecordingHandler { calls: tokio::sync::Mutex::new(call_tx) });
        let script = r#"
            read ignored
            echo '{"type":"host-request","payload":{"id":1,"call":{"type":"clipboard-read-text"}}}'
            sleep 1
        "#;
        let request = RunRequest { has_platform_feature_access: true, ..request() };
        let _session = PluginSession::spawn(
            "sh",
            &["-c".to_string(), script.to_string()],
            request,
            handler,
            tx,
        )
        .await
        .expect("spawn sh stand-in");

        let call = timeout(Duration::from_secs(5), call_rx.recv()).await.unwrap().unwrap();
        assert_eq!(call, HostCall::ClipboardReadText);
        assert_eq!(next_event(&mut rx).await, BridgeEvent::Terminated { abnormal: false });
    }

    #[tokio::test]
    async fn test_send_after_death_fails() {
        let (tx, mut rx) = mpsc::channel(16);
        let session = spawn_sh("read ignored; exit 0", tx, Arc::new(NullHandler)).await;
        let _ = next_event(&mut rx).await;

        let err = session.dispatch_toast_action("t", "primary").await.unwrap_err();
        assert!(matches!(err, BridgeError::NotRunning));
    }

    #[tokio::test]
    async fn test_shutdown_is_not_abnormal() {
        let (tx, mut rx) = mpsc::channel(16);
        let session = spawn_sh("read ignored; sleep 30", tx, Arc::new(NullHandler)).await;
        let handle = session.handle();
        assert!(handle.is_alive());
        assert!(handle.pid.is_some());

        session.shutdown().await;
        assert_eq!(next_event(&mut rx).await, BridgeEvent::Terminated { abnormal: false });
        assert!(!handle.is_alive());
    }

    #[tokio::test]
    async fn test_spawn_failure_surfaces() {
        let (tx, _rx) = mpsc::channel(16);
        let result = PluginSession::spawn(
            "/no/such/host/binary",
            &[],
            request(),
            Arc::new(NullHandler),
            tx,
        )
        .await;
        assert!(matches!(result, Err(BridgeError::Spawn(_))));
    }
}
