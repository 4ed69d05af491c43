//! Tab management
//!
//! One [`TabSet`] per side of the dual-pane view. A tab is one
//! [`PaneState`] plus its [`ConnectionManager`]; reordering and cross-side
//! moves shuffle the sequence but never touch the pane's identity or its
//! live connection.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::connection::ConnectionManager;
use super::pane::{PaneSnapshot, PaneState};

/// Which side of the dual-pane view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn other(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Left => write!(f, "left"),
            Side::Right => write!(f, "right"),
        }
    }
}

/// Where to reinsert a dragged tab relative to its drop target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DropPosition {
    Before,
    After,
}

/// One open tab.
pub struct TabEntry {
    pub id: String,
    pub pane: Arc<RwLock<PaneState>>,
    pub manager: Arc<ConnectionManager>,
}

/// Ordered tabs of one side plus the active-tab pointer.
///
/// `active` is either `None` (first tab is active) or the id of a tab
/// present in the sequence.
pub struct TabSet {
    side: Side,
    tabs: Vec<TabEntry>,
    active: Option<String>,
}

impl TabSet {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            tabs: Vec::new(),
            active: None,
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        self.tabs.iter().map(|t| t.id.clone()).collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tabs.iter().any(|t| t.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&TabEntry> {
        self.tabs.iter().find(|t| t.id == id)
    }

    /// Append a tab and make it active.
    pub fn push_active(&mut self, entry: TabEntry) {
        self.active = Some(entry.id.clone());
        self.tabs.push(entry);
    }

    /// Remove a tab. If it was active, activity falls to the tab immediately
    /// preceding it in sequence (or the new first tab when none precedes).
    pub fn remove(&mut self, id: &str) -> Option<TabEntry> {
        let index = self.tabs.iter().position(|t| t.id == id)?;
        let entry = self.tabs.remove(index);
        if self.active_id() == Some(&entry.id) {
            self.active = if index > 0 {
                Some(self.tabs[index - 1].id.clone())
            } else {
                self.tabs.first().map(|t| t.id.clone())
            };
        }
        Some(entry)
    }

    /// Set the active tab; ignored for unknown ids.
    pub fn select(&mut self, id: &str) -> bool {
        if self.contains(id) {
            self.active = Some(id.to_string());
            true
        } else {
            false
        }
    }

    /// Id of the active tab (`None` only when the set is empty).
    pub fn active_id(&self) -> Option<&str> {
        match &self.active {
            Some(id) if self.contains(id) => Some(id),
            _ => self.tabs.first().map(|t| t.id.as_str()),
        }
    }

    pub fn active_entry(&self) -> Option<&TabEntry> {
        self.active_id()
            .map(String::from)
            .and_then(|id| self.get(&id))
    }

    /// Move `dragged_id` immediately before/after `target_id`.
    pub fn reorder(&mut self, dragged_id: &str, target_id: &str, position: DropPosition) {
        if dragged_id == target_id || !self.contains(target_id) {
            return;
        }
        let Some(from) = self.tabs.iter().position(|t| t.id == dragged_id) else {
            return;
        };
        let entry = self.tabs.remove(from);
        let target = self
            .tabs
            .iter()
            .position(|t| t.id == target_id)
            .unwrap_or(self.tabs.len());
        let insert_at = match position {
            DropPosition::Before => target,
            DropPosition::After => target + 1,
        };
        self.tabs.insert(insert_at.min(self.tabs.len()), entry);
    }

    pub fn iter(&self) -> impl Iterator<Item = &TabEntry> {
        self.tabs.iter()
    }

    pub fn snapshot(&self) -> TabSetSnapshot {
        TabSetSnapshot {
            side: self.side,
            active_tab_id: self.active_id().map(String::from),
            tabs: self.tabs.iter().map(|t| t.pane.read().snapshot()).collect(),
        }
    }
}

/// Serializable tab-bar view for the UI bridge.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TabSetSnapshot {
    pub side: Side,
    pub active_tab_id: Option<String>,
    pub tabs: Vec<PaneSnapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;

    fn entry(id: &str) -> TabEntry {
        let pane = Arc::new(RwLock::new(PaneState::new(id)));
        let manager = Arc::new(ConnectionManager::new(
            Arc::new(MemoryBackend::new()),
            pane.clone(),
        ));
        TabEntry {
            id: id.to_string(),
            pane,
            manager,
        }
    }

    fn set_with(ids: &[&str]) -> TabSet {
        let mut set = TabSet::new(Side::Left);
        for id in ids {
            set.push_active(entry(id));
        }
        set
    }

    #[test]
    fn push_makes_new_tab_active() {
        let set = set_with(&["a", "b"]);
        assert_eq!(set.active_id(), Some("b"));
    }

    #[test]
    fn closing_active_falls_to_preceding_tab() {
        let mut set = set_with(&["a", "b", "c"]);
        set.select("b");
        set.remove("b");
        assert_eq!(set.ids(), vec!["a", "c"]);
        assert_eq!(set.active_id(), Some("a"));
    }

    #[test]
    fn closing_first_active_falls_to_next() {
        let mut set = set_with(&["a", "b", "c"]);
        set.select("a");
        set.remove("a");
        assert_eq!(set.ids(), vec!["b", "c"]);
        assert_eq!(set.active_id(), Some("b"));
    }

    #[test]
    fn closing_inactive_keeps_active() {
        let mut set = set_with(&["a", "b", "c"]);
        set.select("c");
        set.remove("a");
        assert_eq!(set.active_id(), Some("c"));
    }

    #[test]
    fn closing_last_tab_empties_active() {
        let mut set = set_with(&["a"]);
        set.remove("a");
        assert!(set.is_empty());
        assert_eq!(set.active_id(), None);
    }

    #[test]
    fn reorder_before_and_after() {
        let mut set = set_with(&["a", "b", "c"]);
        set.reorder("c", "a", DropPosition::Before);
        assert_eq!(set.ids(), vec!["c", "a", "b"]);
        set.reorder("c", "b", DropPosition::After);
        assert_eq!(set.ids(), vec!["a", "b", "c"]);
    }

    #[test]
    fn reorder_ignores_unknown_targets() {
        let mut set = set_with(&["a", "b"]);
        set.reorder("a", "ghost", DropPosition::Before);
        assert_eq!(set.ids(), vec!["a", "b"]);
    }

    #[test]
    fn select_unknown_id_is_rejected() {
        let mut set = set_with(&["a"]);
        assert!(!set.select("ghost"));
        assert_eq!(set.active_id(), Some("a"));
    }
}
