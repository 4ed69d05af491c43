//! Cross-platform path utilities for the file browser
//!
//! Unified path handling over the two path styles a pane can be bound to:
//! remote SFTP paths (always `/`, per the SFTP protocol, even for Windows
//! SSH servers) and local Windows drive paths (`C:\...`). Also the display
//! formatting helpers for sizes, speeds, and dates.

use chrono::{Local, TimeZone};
use serde::{Deserialize, Serialize};

/// Path style in use by a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathStyle {
    /// POSIX paths (`/home/user`); all remote SFTP paths use this style.
    #[default]
    Posix,
    /// Windows drive paths (`C:\Users`), local panes on Windows only.
    WindowsDrive,
}

impl PathStyle {
    pub fn separator(self) -> char {
        match self {
            PathStyle::Posix => '/',
            PathStyle::WindowsDrive => '\\',
        }
    }
}

/// Detect the style of an absolute path string.
pub fn detect_style(path: &str) -> PathStyle {
    if is_windows_drive_path(path) {
        PathStyle::WindowsDrive
    } else {
        PathStyle::Posix
    }
}

fn is_windows_drive_path(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Check if a path is absolute in the given style.
///
/// # Examples
/// - Posix: `/home/user`, `/`
/// - WindowsDrive: `C:\Users`, `D:/data`, `C:`
pub fn is_absolute(path: &str, style: PathStyle) -> bool {
    match style {
        PathStyle::Posix => path.starts_with('/'),
        PathStyle::WindowsDrive => {
            if !is_windows_drive_path(path) {
                return false;
            }
            let rest = &path[2..];
            rest.is_empty() || rest.starts_with('\\') || rest.starts_with('/')
        }
    }
}

/// Check if a path is a filesystem root (`/` or `X:\`).
/// The pane injects the synthetic parent entry only when this is false.
pub fn is_root(path: &str, style: PathStyle) -> bool {
    match style {
        PathStyle::Posix => path == "/",
        PathStyle::WindowsDrive => {
            is_windows_drive_path(path) && matches!(&path[2..], "" | "\\" | "/")
        }
    }
}

/// Join a directory path and a child name with the style's separator.
pub fn join(base: &str, component: &str, style: PathStyle) -> String {
    let sep = style.separator();
    let trimmed = base.trim_end_matches(['/', '\\']);
    if trimmed.is_empty() {
        match style {
            PathStyle::Posix => format!("/{}", component),
            PathStyle::WindowsDrive => component.to_string(),
        }
    } else {
        format!("{}{}{}", trimmed, sep, component)
    }
}

/// Parent directory of a path; roots are their own parent.
pub fn parent_of(path: &str, style: PathStyle) -> String {
    if is_root(path, style) {
        return path.to_string();
    }
    let trimmed = path.trim_end_matches(['/', '\\']);
    match trimmed.rfind(['/', '\\']) {
        Some(0) => "/".to_string(),
        Some(idx) => {
            let parent = &trimmed[..idx];
            if is_windows_drive_path(parent) && parent.len() == 2 {
                format!("{}{}", parent, style.separator())
            } else {
                parent.to_string()
            }
        }
        None => trimmed.to_string(),
    }
}

/// Final component of a path ("" for roots).
pub fn file_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches(['/', '\\']);
    match trimmed.rfind(['/', '\\']) {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

/// Format file size for display
pub fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.1} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.1} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.1} KB", size as f64 / KB as f64)
    } else {
        format!("{} B", size)
    }
}

/// Format transfer speed for display
pub fn format_speed(bytes_per_sec: u64) -> String {
    format!("{}/s", format_size(bytes_per_sec))
}

/// Format a Unix timestamp as a local date string.
pub fn format_date(timestamp: i64) -> String {
    match Local.timestamp_opt(timestamp, 0) {
        chrono::LocalResult::Single(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
        _ => String::new(),
    }
}

/// Format an ETA in seconds as mm:ss or h:mm:ss.
pub fn format_eta(eta_seconds: u64) -> String {
    let hours = eta_seconds / 3600;
    let minutes = (eta_seconds % 3600) / 60;
    let seconds = eta_seconds % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_absolute() {
        assert!(is_absolute("/home/user", PathStyle::Posix));
        assert!(is_absolute("/", PathStyle::Posix));
        assert!(!is_absolute("relative/path", PathStyle::Posix));

        assert!(is_absolute("C:\\Users", PathStyle::WindowsDrive));
        assert!(is_absolute("D:/data", PathStyle::WindowsDrive));
        assert!(is_absolute("c:", PathStyle::WindowsDrive));
        assert!(!is_absolute("\\no\\drive", PathStyle::WindowsDrive));
        assert!(!is_absolute("/home/user", PathStyle::WindowsDrive));
    }

    #[test]
    fn test_is_root() {
        assert!(is_root("/", PathStyle::Posix));
        assert!(!is_root("/home", PathStyle::Posix));
        assert!(is_root("C:\\", PathStyle::WindowsDrive));
        assert!(is_root("C:", PathStyle::WindowsDrive));
        assert!(!is_root("C:\\Users", PathStyle::WindowsDrive));
    }

    #[test]
    fn test_join() {
        assert_eq!(join("/home", "file.txt", PathStyle::Posix), "/home/file.txt");
        assert_eq!(join("/home/", "file.txt", PathStyle::Posix), "/home/file.txt");
        assert_eq!(join("/", "home", PathStyle::Posix), "/home");
        assert_eq!(
            join("C:\\Users", "me", PathStyle::WindowsDrive),
            "C:\\Users\\me"
        );
        assert_eq!(join("C:\\", "Users", PathStyle::WindowsDrive), "C:\\Users");
    }

    #[test]
    fn test_parent_of() {
        assert_eq!(parent_of("/home/user", PathStyle::Posix), "/home");
        assert_eq!(parent_of("/home", PathStyle::Posix), "/");
        assert_eq!(parent_of("/", PathStyle::Posix), "/");
        assert_eq!(
            parent_of("C:\\Users\\me", PathStyle::WindowsDrive),
            "C:\\Users"
        );
        assert_eq!(parent_of("C:\\Users", PathStyle::WindowsDrive), "C:\\");
        assert_eq!(parent_of("C:\\", PathStyle::WindowsDrive), "C:\\");
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name("/home/user/notes.txt"), "notes.txt");
        assert_eq!(file_name("/home/user/"), "user");
        assert_eq!(file_name("C:\\Users\\me"), "me");
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.0 GB");
    }

    #[test]
    fn test_format_eta() {
        assert_eq!(format_eta(59), "0:59");
        assert_eq!(format_eta(61), "1:01");
        assert_eq!(format_eta(3700), "1:01:40");
    }
}
