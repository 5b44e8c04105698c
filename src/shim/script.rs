//! Pattern-matched AppleScript shim.
//!
//! Extensions call `runAppleScript` expecting macOS inter-app automation.
//! We cannot interpret AppleScript, but a closed set of idioms covers the
//! vast majority of real extension scripts, and each of those idioms has a
//! reasonable Linux equivalent. Anything outside the table is reported as
//! unsupported, with the original script embedded in the error so the
//! failure is debuggable from a log line alone.
//!
//! The pattern table is an explicit ordered list, not a map: matchers are
//! tried in registration order and the first match wins, so more specific
//! patterns are registered before more general ones (e.g. `set the
//! clipboard to` before the generic clipboard matcher).

use std::io::Write as _;
use std::process::{Command, Stdio};
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::system::{detect_display_server, DisplayServer};

/// Outcome of a single shim invocation.
///
/// Invariant: `success == false` always carries a non-empty `error`;
/// `success == true` never carries one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShimResult {
    pub success: bool,
    pub output: Option<String>,
    pub error: Option<String>,
}

impl ShimResult {
    /// Successful invocation, optionally with captured output.
    pub fn ok(output: Option<String>) -> Self {
        Self { success: true, output, error: None }
    }

    /// Failed invocation with a human-readable reason.
    pub fn fail(error: impl Into<String>) -> Self {
        let error = error.into();
        debug_assert!(!error.is_empty());
        Self { success: false, output: None, error: Some(error) }
    }
}

/// Keyboard modifiers in AppleScript `using {...}` clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    /// Maps to Super/Meta on Linux.
    Command,
    Control,
    /// Maps to Alt on Linux.
    Option,
    Shift,
}

/// A recognized scripting idiom, parsed out of the raw script text.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptCommand {
    ShellScript { command: String, needs_sudo: bool },
    OpenLocation { location: String },
    ActivateApp { app: String },
    QuitApp { app: String },
    Notification { title: String, message: String },
    SetVolume { volume: i32 },
    Delay { seconds: f64 },
    SetClipboard { text: String },
    GetClipboard,
    Keystroke { text: String, modifiers: Vec<Modifier> },
    KeyCode { code: i32, modifiers: Vec<Modifier> },
}

/// One entry in the pattern table.
struct Pattern {
    /// Idiom name, used in trace logs.
    name: &'static str,
    matcher: fn(&str) -> Option<ScriptCommand>,
}

/// The ordered pattern table. Registration order is part of the contract.
static PATTERNS: &[Pattern] = &[
    Pattern { name: "do-shell-script", matcher: match_shell_script },
    Pattern { name: "open-location", matcher: match_open_location },
    Pattern { name: "activate-app", matcher: match_activate_app },
    Pattern { name: "quit-app", matcher: match_quit_app },
    Pattern { name: "display-notification", matcher: match_notification },
    Pattern { name: "set-volume", matcher: match_set_volume },
    Pattern { name: "delay", matcher: match_delay },
    Pattern { name: "set-clipboard", matcher: match_set_clipboard },
    Pattern { name: "get-clipboard", matcher: match_get_clipboard },
    Pattern { name: "keystroke", matcher: match_keystroke },
    Pattern { name: "key-code", matcher: match_key_code },
];

/// Parse a script against the pattern table without executing anything.
pub fn parse(script: &str) -> Option<ScriptCommand> {
    let script = script.trim();
    for pattern in PATTERNS {
        if let Some(command) = (pattern.matcher)(script) {
            tracing::debug!(pattern = pattern.name, "script matched shim pattern");
            return Some(command);
        }
    }
    None
}

/// Translate and execute an AppleScript snippet.
///
/// A translation miss is not an error condition here - it produces a
/// well-formed failure result that embeds the original script.
pub fn run(script: &str) -> ShimResult {
    run_with_shell_policy(script, true)
}

/// Like [`run`], but refuses `do shell script` bodies when the
/// configuration disables them. All other idioms are unaffected.
pub fn run_with_shell_policy(script: &str, allow_shell_scripts: bool) -> ShimResult {
    match parse(script) {
        Some(ScriptCommand::ShellScript { .. }) if !allow_shell_scripts => {
            ShimResult::fail("Shell script execution is disabled by configuration")
        }
        Some(command) => execute(&command),
        None => ShimResult::fail(format!(
            "AppleScript scripting not supported on Linux. Script: {}",
            script.trim()
        )),
    }
}

// ---------------------------------------------------------------------------
// Matchers
// ---------------------------------------------------------------------------

static RE_SHELL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"do shell script "([^"]+)""#).expect("valid regex"));
static RE_OPEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?:open location "([^"]+)"|tell application "Finder" to open "([^"]+)"|^open "([^"]+)")"#,
    )
    .expect("valid regex")
});
static RE_ACTIVATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:tell application "([^"]+)" to activate|activate application "([^"]+)")"#)
        .expect("valid regex")
});
static RE_QUIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"tell application "([^"]+)" to quit"#).expect("valid regex"));
static RE_NOTIFICATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"display notification "([^"]+)"(?:\s+with title "([^"]+)")?"#)
        .expect("valid regex")
});
static RE_VOLUME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"set volume (?:output volume )?(\d+)").expect("valid regex"));
static RE_DELAY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^delay\s+([0-9]*\.?[0-9]+)").expect("valid regex"));
static RE_SET_CLIPBOARD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"set the clipboard to "([^"]+)""#).expect("valid regex"));
static RE_KEYSTROKE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"keystroke "([^"]+)"(?:\s+using\s+\{([^}]+)\})?"#).expect("valid regex"));
static RE_KEY_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"key code (\d+)(?:\s+using\s+\{([^}]+)\})?").expect("valid regex"));

fn match_shell_script(script: &str) -> Option<ScriptCommand> {
    let caps = RE_SHELL.captures(script)?;
    Some(ScriptCommand::ShellScript {
        command: caps.get(1)?.as_str().to_string(),
        needs_sudo: script.contains("with administrator privileges"),
    })
}

fn match_open_location(script: &str) -> Option<ScriptCommand> {
    let caps = RE_OPEN.captures(script)?;
    let location = caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3))?;
    Some(ScriptCommand::OpenLocation { location: location.as_str().to_string() })
}

fn match_activate_app(script: &str) -> Option<ScriptCommand> {
    let caps = RE_ACTIVATE.captures(script)?;
    let app = caps.get(1).or_else(|| caps.get(2))?;
    Some(ScriptCommand::ActivateApp { app: app.as_str().to_string() })
}

fn match_quit_app(script: &str) -> Option<ScriptCommand> {
    let caps = RE_QUIT.captures(script)?;
    Some(ScriptCommand::QuitApp { app: caps.get(1)?.as_str().to_string() })
}

fn match_notification(script: &str) -> Option<ScriptCommand> {
    let caps = RE_NOTIFICATION.captures(script)?;
    Some(ScriptCommand::Notification {
        message: caps.get(1)?.as_str().to_string(),
        title: caps.get(2).map_or_else(|| "Notification".to_string(), |m| m.as_str().to_string()),
    })
}

fn match_set_volume(script: &str) -> Option<ScriptCommand> {
    let caps = RE_VOLUME.captures(script)?;
    Some(ScriptCommand::SetVolume { volume: caps.get(1)?.as_str().parse().ok()? })
}

fn match_delay(script: &str) -> Option<ScriptCommand> {
    let caps = RE_DELAY.captures(script)?;
    Some(ScriptCommand::Delay { seconds: caps.get(1)?.as_str().parse().ok()? })
}

fn match_set_clipboard(script: &str) -> Option<ScriptCommand> {
    let caps = RE_SET_CLIPBOARD.captures(script)?;
    Some(ScriptCommand::SetClipboard { text: caps.get(1)?.as_str().to_string() })
}

// Deliberately generic: any remaining mention of "the clipboard" is a read.
// Relies on set-clipboard being registered first.
fn match_get_clipboard(script: &str) -> Option<ScriptCommand> {
    script.contains("the clipboard").then_some(ScriptCommand::GetClipboard)
}

fn match_keystroke(script: &str) -> Option<ScriptCommand> {
    let caps = RE_KEYSTROKE.captures(script)?;
    Some(ScriptCommand::Keystroke {
        text: caps.get(1)?.as_str().to_string(),
        modifiers: caps.get(2).map_or_else(Vec::new, |m| parse_modifiers(m.as_str())),
    })
}

fn match_key_code(script: &str) -> Option<ScriptCommand> {
    let caps = RE_KEY_CODE.captures(script)?;
    Some(ScriptCommand::KeyCode {
        code: caps.get(1)?.as_str().parse().ok()?,
        modifiers: caps.get(2).map_or_else(Vec::new, |m| parse_modifiers(m.as_str())),
    })
}

fn parse_modifiers(mods: &str) -> Vec<Modifier> {
    let mut modifiers = Vec::new();
    if mods.contains("command down") {
        modifiers.push(Modifier::Command);
    }
    if mods.contains("control down") {
        modifiers.push(Modifier::Control);
    }
    if mods.contains("option down") || mods.contains("alt down") {
        modifiers.push(Modifier::Option);
    }
    if mods.contains("shift down") {
        modifiers.push(Modifier::Shift);
    }
    modifiers
}

// ---------------------------------------------------------------------------
// Executors
// ---------------------------------------------------------------------------

/// Execute an already-parsed script command against native utilities.
pub fn execute(command: &ScriptCommand) -> ShimResult {
    match command {
        ScriptCommand::ShellScript { command, needs_sudo } => run_shell(command, *needs_sudo),
        ScriptCommand::OpenLocation { location } => open_location(location),
        ScriptCommand::ActivateApp { app } => activate_app(app),
        ScriptCommand::QuitApp { app } => quit_app(app),
        ScriptCommand::Notification { title, message } => show_notification(title, message),
        ScriptCommand::SetVolume { volume } => set_volume(*volume),
        ScriptCommand::Delay { seconds } => delay(*seconds),
        ScriptCommand::SetClipboard { text } => set_clipboard(text),
        ScriptCommand::GetClipboard => get_clipboard(),
        ScriptCommand::Keystroke { text, modifiers } => send_keystroke(text, modifiers),
        ScriptCommand::KeyCode { code, modifiers } => send_key_code(*code, modifiers),
    }
}

fn result_from_output(output: std::process::Output, context: &str) -> ShimResult {
    if output.status.success() {
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        ShimResult::ok((!stdout.is_empty()).then_some(stdout))
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if stderr.is_empty() {
            ShimResult::fail(format!("{context}: exited with {}", output.status))
        } else {
            ShimResult::fail(stderr)
        }
    }
}

fn run_shell(command: &str, needs_sudo: bool) -> ShimResult {
    let mut cmd = if needs_sudo {
        let mut c = Command::new("pkexec");
        c.arg("sh").arg("-c").arg(command);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(command);
        c
    };

    match cmd.output() {
        Ok(output) => result_from_output(output, "shell script"),
        Err(e) => ShimResult::fail(format!("Failed to execute shell script: {e}")),
    }
}

fn open_location(location: &str) -> ShimResult {
    let target = if let Some(path) = location.strip_prefix("file://") {
        super::paths::expand_home(path).to_string_lossy().to_string()
    } else if location.starts_with("http://") || location.starts_with("https://") {
        location.to_string()
    } else {
        super::paths::expand_home(location).to_string_lossy().to_string()
    };

    match Command::new("xdg-open").arg(&target).output() {
        Ok(output) if output.status.success() => {
            ShimResult::ok(Some(format!("Opened: {location}")))
        }
        Ok(output) => result_from_output(output, "xdg-open"),
        Err(e) => ShimResult::fail(format!("Failed to open location: {e}")),
    }
}

/// macOS settings app names route to the desktop's own control center,
/// not to a .desktop lookup.
fn is_settings_app(app: &str) -> bool {
    let app = app.to_lowercase();
    app == "system settings" || app == "system preferences"
}

fn open_system_settings() -> ShimResult {
    for candidate in ["gnome-control-center", "systemsettings", "systemsettings5"] {
        if Command::new(candidate).spawn().is_ok() {
            return ShimResult::ok(Some("Opened system settings".to_string()));
        }
    }
    ShimResult::fail("No system settings application found")
}

fn activate_app(app: &str) -> ShimResult {
    if is_settings_app(app) {
        return open_system_settings();
    }
    let desktop_name = app.to_lowercase();

    // gtk-launch works across most desktop environments; xdg-open is the
    // fallback for environments without it.
    match Command::new("gtk-launch").arg(&desktop_name).output() {
        Ok(output) if output.status.success() => {
            return ShimResult::ok(Some(format!("Activated application: {app}")));
        }
        _ => {}
    }

    match Command::new("xdg-open").arg(&desktop_name).output() {
        Ok(output) if output.status.success() => {
            ShimResult::ok(Some(format!("Activated application: {app}")))
        }
        _ => ShimResult::fail(format!("Failed to activate application: {app}")),
    }
}

fn quit_app(app: &str) -> ShimResult {
    match Command::new("pkill").arg("-f").arg(app.to_lowercase()).output() {
        Ok(output) if output.status.success() => {
            ShimResult::ok(Some(format!("Quit application: {app}")))
        }
        _ => ShimResult::fail(format!("Failed to quit application: {app}")),
    }
}

fn show_notification(title: &str, message: &str) -> ShimResult {
    match Command::new("notify-send").arg(title).arg(message).output() {
        Ok(output) if output.status.success() => {
            ShimResult::ok(Some("Notification sent".to_string()))
        }
        Ok(output) => result_from_output(output, "notify-send"),
        Err(e) => ShimResult::fail(format!("Failed to send notification: {e}")),
    }
}

fn set_volume(volume: i32) -> ShimResult {
    let vol = volume.clamp(0, 100);

    // pactl covers PulseAudio and PipeWire; amixer is the ALSA fallback.
    let pactl = Command::new("pactl")
        .arg("set-sink-volume")
        .arg("@DEFAULT_SINK@")
        .arg(format!("{vol}%"))
        .output();
    if matches!(&pactl, Ok(output) if output.status.success()) {
        return ShimResult::ok(Some(format!("Set volume to {vol}%")));
    }

    match Command::new("amixer").arg("set").arg("Master").arg(format!("{vol}%")).output() {
        Ok(output) if output.status.success() => {
            ShimResult::ok(Some(format!("Set volume to {vol}%")))
        }
        Ok(output) => result_from_output(output, "amixer"),
        Err(_) => ShimResult::fail("Failed to set volume: neither pactl nor amixer available"),
    }
}

fn delay(seconds: f64) -> ShimResult {
    // Scripts occasionally carry absurd delays; cap so one script cannot
    // wedge a shim worker for minutes.
    let capped = seconds.clamp(0.0, 60.0);
    std::thread::sleep(Duration::from_secs_f64(capped));
    ShimResult::ok(None)
}

fn set_clipboard(text: &str) -> ShimResult {
    let result = match detect_display_server() {
        DisplayServer::Wayland => Command::new("wl-copy").arg(text).output(),
        DisplayServer::X11 | DisplayServer::Unknown => Command::new("xclip")
            .arg("-selection")
            .arg("clipboard")
            .arg("-i")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .spawn()
            .and_then(|mut child| {
                if let Some(mut stdin) = child.stdin.take() {
                    stdin.write_all(text.as_bytes())?;
                }
                child.wait_with_output()
            })
            .or_else(|_| {
                Command::new("xsel").arg("--clipboard").arg("--input").arg(text).output()
            }),
    };

    match result {
        Ok(output) if output.status.success() => ShimResult::ok(Some("Clipboard updated".to_string())),
        _ => ShimResult::fail(
            "Failed to set clipboard. Install wl-copy (Wayland) or xclip/xsel (X11)",
        ),
    }
}

fn get_clipboard() -> ShimResult {
    let result = match detect_display_server() {
        DisplayServer::Wayland => Command::new("wl-paste").output(),
        DisplayServer::X11 | DisplayServer::Unknown => Command::new("xclip")
            .arg("-selection")
            .arg("clipboard")
            .arg("-o")
            .output()
            .or_else(|_| Command::new("xsel").arg("--clipboard").arg("--output").output()),
    };

    match result {
        Ok(output) if output.status.success() => {
            ShimResult::ok(Some(String::from_utf8_lossy(&output.stdout).to_string()))
        }
        _ => ShimResult::fail(
            "Failed to get clipboard. Install wl-paste (Wayland) or xclip/xsel (X11)",
        ),
    }
}

fn send_keystroke(text: &str, modifiers: &[Modifier]) -> ShimResult {
    match detect_display_server() {
        DisplayServer::X11 => {
            let mut cmd = Command::new("xdotool");
            if modifiers.is_empty() {
                cmd.arg("type").arg("--").arg(text);
            } else {
                cmd.arg("key").arg("--").arg(format!("{}+{}", modifiers_x11(modifiers), text));
            }
            match cmd.output() {
                Ok(output) if output.status.success() => {
                    ShimResult::ok(Some("Keystroke simulated".to_string()))
                }
                Ok(output) => result_from_output(output, "xdotool"),
                Err(_) => ShimResult::fail("Failed to execute xdotool. Install xdotool"),
            }
        }
        DisplayServer::Wayland => {
            let mut cmd = Command::new("ydotool");
            if modifiers.is_empty() {
                cmd.arg("type").arg(text);
            } else {
                cmd.arg("key").arg(format!("{}:{}", modifiers_wayland(modifiers), text));
            }
            match cmd.output() {
                Ok(output) if output.status.success() => {
                    ShimResult::ok(Some("Keystroke simulated".to_string()))
                }
                Ok(output) => result_from_output(output, "ydotool"),
                Err(_) => ShimResult::fail("Failed to execute ydotool. Install ydotool"),
            }
        }
        DisplayServer::Unknown => {
            ShimResult::fail("Cannot detect display server (X11/Wayland)")
        }
    }
}

fn send_key_code(code: i32, modifiers: &[Modifier]) -> ShimResult {
    let linux_key = keycode_to_linux(code);

    match detect_display_server() {
        DisplayServer::X11 => {
            let combo = if modifiers.is_empty() {
                linux_key
            } else {
                format!("{}+{linux_key}", modifiers_x11(modifiers))
            };
            match Command::new("xdotool").arg("key").arg("--").arg(combo).output() {
                Ok(output) if output.status.success() => {
                    ShimResult::ok(Some("Key code simulated".to_string()))
                }
                _ => ShimResult::fail("Failed to simulate key code"),
            }
        }
        DisplayServer::Wayland => {
            ShimResult::fail("Key code simulation not yet supported on Wayland")
        }
        DisplayServer::Unknown => ShimResult::fail("Cannot detect display server"),
    }
}

fn modifiers_x11(modifiers: &[Modifier]) -> String {
    modifiers
        .iter()
        .map(|m| match m {
            Modifier::Command => "super",
            Modifier::Control => "ctrl",
            Modifier::Option => "alt",
            Modifier::Shift => "shift",
        })
        .collect::<Vec<_>>()
        .join("+")
}

fn modifiers_wayland(modifiers: &[Modifier]) -> String {
    // ydotool wants raw input key codes for the left-hand modifiers.
    modifiers
        .iter()
        .map(|m| match m {
            Modifier::Command => "125",
            Modifier::Control => "29",
            Modifier::Option => "56",
            Modifier::Shift => "42",
        })
        .collect::<Vec<_>>()
        .join(":")
}

/// Map macOS virtual key codes to X11 key names.
fn keycode_to_linux(code: i32) -> String {
    match code {
        36 => "Return".to_string(),
        48 => "Tab".to_string(),
        49 => "space".to_string(),
        51 => "BackSpace".to_string(),
        53 => "Escape".to_string(),
        115 => "Home".to_string(),
        116 => "Page_Up".to_string(),
        117 => "Delete".to_string(),
        119 => "End".to_string(),
        121 => "Page_Down".to_string(),
        123 => "Left".to_string(),
        124 => "Right".to_string(),
        125 => "Down".to_string(),
        126 => "Up".to_string(),
        _ => format!("KEY_{code}"),
    }
}
