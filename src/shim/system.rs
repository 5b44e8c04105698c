//! System information shim and display-server detection.

use std::collections::HashMap;
use std::process::Command;

/// Display server the current session runs under.
///
/// Several shims pick different native utilities depending on this
/// (wl-copy vs xclip, ydotool vs xdotool).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayServer {
    X11,
    Wayland,
    Unknown,
}

/// Detect the session's display server from the environment.
pub fn detect_display_server() -> DisplayServer {
    if std::env::var("WAYLAND_DISPLAY").is_ok() {
        DisplayServer::Wayland
    } else if std::env::var("DISPLAY").is_ok() {
        DisplayServer::X11
    } else {
        DisplayServer::Unknown
    }
}

/// Collect system information that extensions commonly request.
///
/// Extensions written against the macOS API expect platform/arch/hostname
/// style answers; everything here is best effort and missing keys are
/// simply absent from the map.
pub fn system_info() -> HashMap<String, String> {
    let mut info = HashMap::new();

    info.insert("platform".to_string(), "linux".to_string());

    if let Ok(output) = Command::new("uname").arg("-m").output() {
        if let Ok(arch) = String::from_utf8(output.stdout) {
            info.insert("arch".to_string(), arch.trim().to_string());
        }
    }

    if let Ok(output) = Command::new("hostname").output() {
        if let Ok(hostname) = String::from_utf8(output.stdout) {
            info.insert("hostname".to_string(), hostname.trim().to_string());
        }
    }

    if let Ok(de) = std::env::var("XDG_CURRENT_DESKTOP") {
        info.insert("desktop_environment".to_string(), de);
    }

    match detect_display_server() {
        DisplayServer::Wayland => info.insert("display_server".to_string(), "wayland".to_string()),
        DisplayServer::X11 => info.insert("display_server".to_string(), "x11".to_string()),
        DisplayServer::Unknown => None,
    };

    info
}
