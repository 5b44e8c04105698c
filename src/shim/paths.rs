//! macOS path translation.
//!
//! Maps macOS filesystem conventions onto their Linux equivalents so that
//! extensions with hardcoded macOS paths have a chance of finding something
//! sensible on disk. Translation is a pure function: unrecognized input
//! passes through unchanged and nothing here ever errors.

use std::path::PathBuf;

/// Ordered prefix rewrite rules, applied first-match-wins.
///
/// Order is load-bearing: `~/Library/Application Support/` must be tried
/// before the generic `~/Library/` rule or it would never fire. Once a rule
/// matches, the remainder of the path is preserved verbatim - rules are not
/// applied cumulatively.
const PREFIX_RULES: &[(&str, &str)] = &[
    ("/Applications/", "/usr/share/applications/"),
    ("~/Library/Application Support/", "~/.local/share/"),
    ("~/Library/Preferences/", "~/.config/"),
    ("~/Library/Caches/", "~/.cache/"),
    ("~/Library/", "~/.local/lib/"),
    ("/Library/", "/usr/lib/"),
    ("/Users/", "/home/"),
];

/// Translate a macOS path to its Linux equivalent.
///
/// Total over all string inputs: relative paths, empty strings, and paths
/// with no recognized macOS prefix are returned unmodified. Already-native
/// paths match no rule, which makes the function idempotent.
pub fn translate(path: &str) -> String {
    for (prefix, replacement) in PREFIX_RULES {
        if let Some(rest) = path.strip_prefix(prefix) {
            return format!("{replacement}{rest}");
        }
    }
    path.to_string()
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_applications_prefix_preserves_suffix() {
        assert_eq!(
            translate("/Applications/Foo.app/Contents/MacOS/Foo"),
            "/usr/share/applications/Foo.app/Contents/MacOS/Foo"
        );
    }

    #[test]
    fn test_library_prefix() {
        assert_eq!(translate("/Library/Frameworks/Something"), "/usr/lib/Frameworks/Something");
    }

    #[test]
    fn test_users_prefix() {
        assert_eq!(translate("/Users/john/Documents"), "/home/john/Documents");
    }

    #[test]
    fn test_user_library_application_support() {
        assert_eq!(
            translate("~/Library/Application Support/MyApp/state.json"),
            "~/.local/share/MyApp/state.json"
        );
    }

    #[test]
    fn test_user_library_preferences() {
        assert_eq!(translate("~/Library/Preferences/com.foo.plist"), "~/.config/com.foo.plist");
    }

    #[test]
    fn test_user_library_generic_rule_is_last_resort() {
        assert_eq!(translate("~/Library/QuickLook/Foo"), "~/.local/lib/QuickLook/Foo");
    }

    #[test]
    fn test_unrecognized_passes_through() {
        assert_eq!(translate("/opt/thing/bin/tool"), "/opt/thing/bin/tool");
        assert_eq!(translate("relative/path.txt"), "relative/path.txt");
        assert_eq!(translate(""), "");
    }

    #[test]
    fn test_idempotent_on_native_paths() {
        for input in [
            "/Applications/Foo.app/Contents/MacOS/Foo",
            "/Users/jane/Desktop",
            "~/Library/Preferences/net.example.plist",
            "/home/jane/.config/app.toml",
            "not-a-path",
        ] {
            let once = translate(input);
            assert_eq!(translate(&once), once, "translate must be idempotent for {input:?}");
        }
    }

    #[test]
    fn test_expand_home_passthrough_for_absolute() {
        assert_eq!(expand_home("/tmp/x"), PathBuf::from("/tmp/x"));
    }

    #[test]
    fn test_expand_home_tilde() {
        let expanded = expand_home("~/foo");
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.to_string_lossy().ends_with("/foo"));
    }
}
