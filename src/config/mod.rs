//! Browser settings
//!
//! The small set of preferences the SFTP browser core consults, persisted as
//! JSON under the user's config directory by the embedding shell.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::sftp::connection::ReconnectConfig;
use crate::sftp::types::SortSpec;

/// What a double-click on a non-navigable entry does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DoubleClickAction {
    /// Hand the file to the external open flow (download to temp + open).
    #[default]
    Open,
    /// Submit a copy to the other pane's current path.
    Transfer,
}

/// Persisted browser settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub double_click: DoubleClickAction,
    pub show_hidden: bool,
    pub default_sort: SortSpec,
    pub reconnect: ReconnectConfig,
    /// External application picked via "open with", if any.
    pub external_app_path: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            double_click: DoubleClickAction::default(),
            show_hidden: false,
            default_sort: SortSpec::default(),
            reconnect: ReconnectConfig::default(),
            external_app_path: None,
        }
    }
}

impl Settings {
    /// Default settings path (in ~/.ironpane)
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".ironpane").join("settings.json"))
    }

    /// Load settings from `path`; missing or unreadable files fall back to
    /// defaults so the browser always starts.
    pub fn load(path: &PathBuf) -> Self {
        match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(settings) => settings,
                Err(err) => {
                    warn!("settings at {:?} unparseable ({}), using defaults", path, err);
                    Self::default()
                }
            },
            Err(_) => {
                debug!("no settings at {:?}, using defaults", path);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &PathBuf) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let mut settings = Settings::default();
        settings.double_click = DoubleClickAction::Transfer;
        settings.show_hidden = true;
        settings.save(&path).unwrap();

        let loaded = Settings::load(&path);
        assert_eq!(loaded.double_click, DoubleClickAction::Transfer);
        assert!(loaded.show_hidden);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let loaded = Settings::load(&PathBuf::from("/definitely/not/here.json"));
        assert_eq!(loaded.double_click, DoubleClickAction::Open);
        assert!(!loaded.show_hidden);
    }

    #[test]
    fn garbage_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not json at all").unwrap();
        let loaded = Settings::load(&path);
        assert!(!loaded.show_hidden);
    }
}
