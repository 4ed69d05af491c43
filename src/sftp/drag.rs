//! Cross-pane drag coordination
//!
//! A single drag can be in flight at a time (single-pointer input), so the
//! bridge holds one process-wide [`DragSelection`]. Dragging an entry that is
//! part of the current selection carries the whole selection; a drop is
//! accepted only on the opposite side, over a navigable entry or the pane's
//! empty area. The selection is cleared unconditionally on drop, accepted or
//! not.

use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use super::pane::PaneState;
use super::tabs::Side;
use super::types::FileEntry;

/// One dragged entry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DragItem {
    pub name: String,
    pub is_directory: bool,
    pub side: Side,
}

/// The payload of an in-flight drag.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DragSelection {
    pub items: Vec<DragItem>,
    pub source_side: Side,
}

/// Process-wide drag state.
#[derive(Default)]
pub struct DragBridge {
    active: Mutex<Option<DragSelection>>,
}

impl DragBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a drag starting on `grabbed` in `pane`. If the grabbed entry is
    /// part of the current selection, the entire selection becomes the
    /// payload. The synthetic parent entry is not draggable.
    ///
    /// Returns `false` (and records nothing) when there is nothing to drag.
    pub fn drag_start(&self, pane: &PaneState, grabbed: &str, side: Side) -> bool {
        let Some(grabbed_entry) = pane.files.iter().find(|e| e.name == grabbed) else {
            return false;
        };
        if grabbed_entry.is_parent() {
            return false;
        }

        let items: Vec<DragItem> = if pane.selected.contains(grabbed) {
            pane.selected_entries()
                .into_iter()
                .map(|e| DragItem {
                    name: e.name.clone(),
                    is_directory: e.is_navigable(),
                    side,
                })
                .collect()
        } else {
            vec![DragItem {
                name: grabbed_entry.name.clone(),
                is_directory: grabbed_entry.is_navigable(),
                side,
            }]
        };

        debug!("drag start: {} item(s) from {}", items.len(), side);
        *self.active.lock() = Some(DragSelection {
            items,
            source_side: side,
        });
        true
    }

    /// The in-flight selection, if any (for drop-target highlighting).
    pub fn active(&self) -> Option<DragSelection> {
        self.active.lock().clone()
    }

    /// Whether a drop at this position would be accepted: opposite side only,
    /// over a navigable entry or the empty area (`None`).
    pub fn accepts_drop(&self, target_side: Side, over: Option<&FileEntry>) -> bool {
        let guard = self.active.lock();
        let Some(selection) = guard.as_ref() else {
            return false;
        };
        if selection.source_side == target_side {
            return false;
        }
        match over {
            None => true,
            Some(entry) => entry.is_navigable() && !entry.is_parent(),
        }
    }

    /// Complete the drag. The selection is cleared unconditionally; the
    /// payload is returned only when the drop is accepted.
    pub fn drop_on(&self, target_side: Side, over: Option<&FileEntry>) -> Option<DragSelection> {
        let accepted = self.accepts_drop(target_side, over);
        let selection = self.active.lock().take();
        if accepted {
            debug!("drop accepted on {}", target_side);
            selection
        } else {
            debug!("drop rejected on {}", target_side);
            None
        }
    }

    /// Abort the drag (escape, drag leaving the window).
    pub fn drag_end(&self) {
        *self.active.lock() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sftp::types::FileType;

    fn pane() -> PaneState {
        let mut pane = PaneState::new("tab-1");
        pane.files = vec![
            FileEntry::new("report.pdf", FileType::File, 100, 0),
            FileEntry::new("notes.txt", FileType::File, 50, 0),
            FileEntry::new("data.csv", FileType::File, 20, 0),
            FileEntry::new("archive", FileType::Directory, 0, 0),
        ];
        pane
    }

    #[test]
    fn dragging_selected_entry_carries_whole_selection() {
        let mut pane = pane();
        pane.toggle_selection("report.pdf", true);
        pane.toggle_selection("notes.txt", true);
        pane.toggle_selection("data.csv", true);

        let bridge = DragBridge::new();
        assert!(bridge.drag_start(&pane, "report.pdf", Side::Left));
        let selection = bridge.active().unwrap();
        assert_eq!(selection.items.len(), 3);
        assert_eq!(selection.source_side, Side::Left);
    }

    #[test]
    fn dragging_unselected_entry_carries_only_itself() {
        let mut pane = pane();
        pane.toggle_selection("notes.txt", true);

        let bridge = DragBridge::new();
        assert!(bridge.drag_start(&pane, "report.pdf", Side::Left));
        let selection = bridge.active().unwrap();
        assert_eq!(selection.items.len(), 1);
        assert_eq!(selection.items[0].name, "report.pdf");
    }

    #[test]
    fn parent_entry_is_not_draggable() {
        let mut pane = pane();
        pane.files.insert(0, FileEntry::parent());
        let bridge = DragBridge::new();
        assert!(!bridge.drag_start(&pane, "..", Side::Left));
        assert!(bridge.active().is_none());
    }

    #[test]
    fn same_side_drop_is_rejected_and_cleared() {
        let pane = pane();
        let bridge = DragBridge::new();
        bridge.drag_start(&pane, "report.pdf", Side::Left);

        assert!(!bridge.accepts_drop(Side::Left, None));
        assert!(bridge.drop_on(Side::Left, None).is_none());
        // Cleared even though rejected
        assert!(bridge.active().is_none());
    }

    #[test]
    fn opposite_side_empty_area_accepts() {
        let pane = pane();
        let bridge = DragBridge::new();
        bridge.drag_start(&pane, "report.pdf", Side::Left);

        let dropped = bridge.drop_on(Side::Right, None).unwrap();
        assert_eq!(dropped.items[0].name, "report.pdf");
        assert!(bridge.active().is_none());
    }

    #[test]
    fn drop_over_directory_accepts_over_file_rejects() {
        let pane = pane();
        let directory = FileEntry::new("archive", FileType::Directory, 0, 0);
        let file = FileEntry::new("other.txt", FileType::File, 1, 0);

        let bridge = DragBridge::new();
        bridge.drag_start(&pane, "report.pdf", Side::Left);
        assert!(bridge.accepts_drop(Side::Right, Some(&directory)));
        assert!(!bridge.accepts_drop(Side::Right, Some(&file)));
    }
}
