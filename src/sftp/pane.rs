//! Per-tab pane state
//!
//! One [`PaneState`] per open tab. The pane owns its connection binding,
//! listing, and selection; the orchestrator mutates it through the
//! operations here and nothing else.

use std::collections::HashSet;

use serde::Serialize;

use crate::backend::{BackendHandle, ConnectTarget};

use super::path_utils::PathStyle;
use super::types::{FileEntry, SortSpec, PARENT_NAME};

/// Connection lifecycle status of a pane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Error,
}

/// One live pane-to-filesystem binding. Owned exclusively by its pane;
/// destroyed when the pane disconnects or the tab closes.
#[derive(Debug, Clone)]
pub struct Connection {
    pub target: ConnectTarget,
    pub handle: Option<BackendHandle>,
    pub status: ConnectionStatus,
    pub current_path: String,
    pub home_dir: String,
    pub path_style: PathStyle,
    pub last_error: Option<String>,
}

impl Connection {
    pub fn connecting(target: ConnectTarget) -> Self {
        Self {
            target,
            handle: None,
            status: ConnectionStatus::Connecting,
            current_path: String::new(),
            home_dir: String::new(),
            path_style: PathStyle::default(),
            last_error: None,
        }
    }

    pub fn is_local(&self) -> bool {
        self.target.is_local()
    }

    pub fn label(&self) -> &str {
        self.target.label()
    }
}

/// State of a single tab.
#[derive(Debug, Clone)]
pub struct PaneState {
    /// Tab identity; stable across reorders and cross-side moves.
    pub id: String,
    pub connection: Option<Connection>,
    /// Listing in backend order. Never contains the synthetic parent entry.
    pub files: Vec<FileEntry>,
    /// Selected file names; always a subset of `files` names, never `..`.
    pub selected: HashSet<String>,
    pub filter: String,
    pub show_hidden: bool,
    pub sort: SortSpec,
    pub loading: bool,
    pub reconnecting: bool,
    pub error: Option<String>,
}

impl PaneState {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            connection: None,
            files: Vec::new(),
            selected: HashSet::new(),
            filter: String::new(),
            show_hidden: false,
            sort: SortSpec::default(),
            loading: false,
            reconnecting: false,
            error: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection
            .as_ref()
            .map(|c| c.status == ConnectionStatus::Connected)
            .unwrap_or(false)
    }

    pub fn current_path(&self) -> Option<&str> {
        self.connection.as_ref().map(|c| c.current_path.as_str())
    }

    pub fn path_style(&self) -> PathStyle {
        self.connection
            .as_ref()
            .map(|c| c.path_style)
            .unwrap_or_default()
    }

    pub fn handle(&self) -> Option<&BackendHandle> {
        self.connection.as_ref().and_then(|c| c.handle.as_ref())
    }

    /// Toggle or replace the selection. With `multi_select` (ctrl/cmd click)
    /// the name is XORed into the set, otherwise it becomes the sole
    /// selection. The synthetic parent entry is never selectable; names
    /// absent from the listing are ignored.
    pub fn toggle_selection(&mut self, name: &str, multi_select: bool) {
        if name == PARENT_NAME || !self.files.iter().any(|e| e.name == name) {
            return;
        }
        if multi_select {
            if !self.selected.remove(name) {
                self.selected.insert(name.to_string());
            }
        } else {
            self.selected.clear();
            self.selected.insert(name.to_string());
        }
    }

    /// Replace the selection with exactly the given names (shift-click range,
    /// computed by the view over visual order). Unknown names and the parent
    /// entry are dropped.
    pub fn select_exact(&mut self, names: impl IntoIterator<Item = String>) {
        let known: HashSet<&str> = self.files.iter().map(|e| e.name.as_str()).collect();
        self.selected = names
            .into_iter()
            .filter(|n| n != PARENT_NAME && known.contains(n.as_str()))
            .collect();
    }

    pub fn clear_selection(&mut self) {
        self.selected.clear();
    }

    pub fn set_filter(&mut self, text: impl Into<String>) {
        self.filter = text.into();
    }

    /// Entries currently selected, in listing order.
    pub fn selected_entries(&self) -> Vec<&FileEntry> {
        self.files
            .iter()
            .filter(|e| self.selected.contains(&e.name))
            .collect()
    }

    /// Apply a fresh listing for `path`. Stale selections are pruned to the
    /// names present in the new listing.
    pub fn apply_listing(&mut self, path: &str, files: Vec<FileEntry>) {
        let names: HashSet<&str> = files.iter().map(|e| e.name.as_str()).collect();
        self.selected.retain(|n| names.contains(n.as_str()));
        drop(names);
        self.files = files;
        self.loading = false;
        self.error = None;
        if let Some(connection) = &mut self.connection {
            connection.current_path = path.to_string();
            connection.status = ConnectionStatus::Connected;
            connection.last_error = None;
        }
    }

    /// Record a listing/navigation failure. `current_path` stays unchanged
    /// so the user can retry from the same location.
    pub fn apply_listing_error(&mut self, message: impl Into<String>) {
        self.loading = false;
        self.error = Some(message.into());
    }

    /// Drop the connection binding and everything derived from it.
    pub fn clear_connection(&mut self) {
        self.connection = None;
        self.files.clear();
        self.selected.clear();
        self.loading = false;
        self.reconnecting = false;
        self.error = None;
    }

    pub fn snapshot(&self) -> PaneSnapshot {
        PaneSnapshot {
            id: self.id.clone(),
            label: self
                .connection
                .as_ref()
                .map(|c| c.label().to_string())
                .unwrap_or_else(|| "New tab".to_string()),
            connected: self.is_connected(),
            status: self.connection.as_ref().map(|c| c.status),
            current_path: self.current_path().map(String::from),
            file_count: self.files.len(),
            selected_count: self.selected.len(),
            loading: self.loading,
            reconnecting: self.reconnecting,
            error: self.error.clone(),
        }
    }
}

/// Serializable pane view for the UI bridge.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaneSnapshot {
    pub id: String,
    pub label: String,
    pub connected: bool,
    pub status: Option<ConnectionStatus>,
    pub current_path: Option<String>,
    pub file_count: usize,
    pub selected_count: usize,
    pub loading: bool,
    pub reconnecting: bool,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sftp::types::FileType;

    fn pane_with_files(names: &[&str]) -> PaneState {
        let mut pane = PaneState::new("tab-1");
        pane.files = names
            .iter()
            .map(|n| FileEntry::new(*n, FileType::File, 1, 0))
            .collect();
        pane
    }

    #[test]
    fn toggle_selection_single_replaces() {
        let mut pane = pane_with_files(&["a", "b", "c"]);
        pane.toggle_selection("a", false);
        pane.toggle_selection("b", false);
        assert_eq!(pane.selected.len(), 1);
        assert!(pane.selected.contains("b"));
    }

    #[test]
    fn toggle_selection_multi_xors() {
        let mut pane = pane_with_files(&["a", "b"]);
        pane.toggle_selection("a", true);
        pane.toggle_selection("b", true);
        assert_eq!(pane.selected.len(), 2);
        pane.toggle_selection("a", true);
        assert_eq!(pane.selected.len(), 1);
        assert!(pane.selected.contains("b"));
    }

    #[test]
    fn parent_entry_is_never_selectable() {
        let mut pane = pane_with_files(&["a"]);
        pane.files.push(FileEntry::parent());
        pane.toggle_selection(PARENT_NAME, false);
        pane.toggle_selection(PARENT_NAME, true);
        assert!(pane.selected.is_empty());
        pane.select_exact(vec![PARENT_NAME.to_string(), "a".to_string()]);
        assert_eq!(pane.selected.len(), 1);
        assert!(pane.selected.contains("a"));
    }

    #[test]
    fn unknown_names_are_ignored() {
        let mut pane = pane_with_files(&["a"]);
        pane.toggle_selection("ghost", false);
        assert!(pane.selected.is_empty());
        pane.select_exact(vec!["ghost".to_string()]);
        assert!(pane.selected.is_empty());
    }

    #[test]
    fn refresh_prunes_stale_selection() {
        let mut pane = pane_with_files(&["a", "b", "c"]);
        pane.toggle_selection("a", true);
        pane.toggle_selection("c", true);

        let fresh = vec![
            FileEntry::new("a", FileType::File, 1, 0),
            FileEntry::new("d", FileType::File, 1, 0),
        ];
        pane.connection = Some(Connection::connecting(ConnectTarget::Local));
        pane.apply_listing("/home/user", fresh);

        assert_eq!(pane.selected.len(), 1);
        assert!(pane.selected.contains("a"));
        assert_eq!(pane.current_path(), Some("/home/user"));
    }

    #[test]
    fn listing_error_preserves_path_and_files() {
        let mut pane = pane_with_files(&["a"]);
        pane.connection = Some(Connection::connecting(ConnectTarget::Local));
        pane.apply_listing("/home/user", vec![FileEntry::new("a", FileType::File, 1, 0)]);

        pane.apply_listing_error("listing failed");
        assert_eq!(pane.current_path(), Some("/home/user"));
        assert_eq!(pane.files.len(), 1);
        assert_eq!(pane.error.as_deref(), Some("listing failed"));
    }
}
