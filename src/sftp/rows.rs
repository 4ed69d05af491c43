//! Pane row model
//!
//! Derives what one pane actually renders from its [`PaneState`]: the
//! synthetic parent entry (a pure derivation, never stored in the listing),
//! hidden-file and substring filtering, sorting with the parent row pinned
//! first, shift-click ranges over the *visual* order, and the index window
//! materialized by the virtualized list.

use std::ops::Range;

use super::pane::PaneState;
use super::path_utils::is_root;
use super::types::{matches_filter, sort_entries, FileEntry};

/// Rows kept alive above/below the viewport.
pub const OVERSCAN_ROWS: usize = 6;

/// The rows a pane displays, in visual order.
///
/// The parent entry is injected whenever the pane is connected somewhere
/// other than a filesystem root, survives every filter, and is pinned first
/// regardless of sort field or direction.
pub fn visible_rows(pane: &PaneState) -> Vec<FileEntry> {
    let mut rows: Vec<FileEntry> = pane
        .files
        .iter()
        .filter(|e| pane.show_hidden || !e.name.starts_with('.'))
        .filter(|e| matches_filter(e, &pane.filter))
        .cloned()
        .collect();
    sort_entries(&mut rows, pane.sort);

    let needs_parent = pane
        .connection
        .as_ref()
        .map(|c| !c.current_path.is_empty() && !is_root(&c.current_path, c.path_style))
        .unwrap_or(false);
    if needs_parent {
        rows.insert(0, FileEntry::parent());
    }
    rows
}

/// Names spanned by a shift-click from `anchor` to `clicked`, inclusive,
/// over the given visual order. The parent entry never enters the range.
/// An unknown anchor degrades to selecting just the clicked row.
pub fn range_between(rows: &[FileEntry], anchor: &str, clicked: &str) -> Vec<String> {
    let position = |name: &str| rows.iter().position(|e| e.name == name);
    let Some(clicked_idx) = position(clicked) else {
        return Vec::new();
    };
    let Some(anchor_idx) = position(anchor) else {
        return vec![clicked.to_string()];
    };
    let (lo, hi) = if anchor_idx <= clicked_idx {
        (anchor_idx, clicked_idx)
    } else {
        (clicked_idx, anchor_idx)
    };
    rows[lo..=hi]
        .iter()
        .filter(|e| !e.is_parent())
        .map(|e| e.name.clone())
        .collect()
}

/// Viewport geometry for the virtualized row list.
#[derive(Debug, Clone, Copy)]
pub struct Viewport {
    pub scroll_top: f64,
    pub height: f64,
    pub row_height: f64,
}

/// The index range of rows to materialize: rows whose vertical position
/// falls within the viewport extended by [`OVERSCAN_ROWS`] on both ends.
pub fn visible_window(row_count: usize, viewport: Viewport) -> Range<usize> {
    if row_count == 0 || viewport.row_height <= 0.0 {
        return 0..0;
    }
    let overscan = OVERSCAN_ROWS as f64 * viewport.row_height;
    let first = ((viewport.scroll_top - overscan) / viewport.row_height).floor();
    let last = ((viewport.scroll_top + viewport.height + overscan) / viewport.row_height).ceil();
    let first = first.max(0.0) as usize;
    let last = (last.max(0.0) as usize).min(row_count);
    first..last.max(first)
}

/// Total pixel height of the row list (scrollbar sizing).
pub fn content_height(row_count: usize, row_height: f64) -> f64 {
    row_count as f64 * row_height
}

/// Pixel offset of the first materialized row (spacer above the window).
pub fn window_offset(window: &Range<usize>, row_height: f64) -> f64 {
    window.start as f64 * row_height
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ConnectTarget;
    use crate::sftp::pane::Connection;
    use crate::sftp::types::{FileType, SortField, SortSpec};

    fn connected_pane(path: &str, names: &[(&str, FileType)]) -> PaneState {
        let mut pane = PaneState::new("tab-1");
        let mut connection = Connection::connecting(ConnectTarget::Local);
        connection.current_path = path.to_string();
        pane.connection = Some(connection);
        pane.files = names
            .iter()
            .map(|(n, t)| FileEntry::new(*n, *t, 100, 0))
            .collect();
        pane
    }

    #[test]
    fn parent_injected_for_non_root_only() {
        let pane = connected_pane("/home/user", &[("a.txt", FileType::File)]);
        assert!(visible_rows(&pane)[0].is_parent());

        let root_pane = connected_pane("/", &[("a.txt", FileType::File)]);
        assert!(!visible_rows(&root_pane)[0].is_parent());
    }

    #[test]
    fn parent_pinned_first_under_descending_sort() {
        let mut pane = connected_pane(
            "/home/user",
            &[("a.txt", FileType::File), ("z.txt", FileType::File)],
        );
        pane.sort = SortSpec::new(SortField::Name, true);
        let rows = visible_rows(&pane);
        assert!(rows[0].is_parent());
        assert_eq!(rows[1].name, "z.txt");
    }

    #[test]
    fn filter_keeps_parent_and_matches_substring() {
        let pane = {
            let mut pane = connected_pane(
                "/home/user",
                &[("a.txt", FileType::File), ("docs", FileType::Directory)],
            );
            pane.filter = "do".to_string();
            pane
        };
        let names: Vec<_> = visible_rows(&pane)
            .iter()
            .map(|e| e.name.clone())
            .collect();
        assert_eq!(names, vec!["..", "docs"]);
    }

    #[test]
    fn hidden_files_follow_toggle() {
        let mut pane = connected_pane(
            "/home/user",
            &[(".env", FileType::File), ("app.rs", FileType::File)],
        );
        let names: Vec<_> = visible_rows(&pane).iter().map(|e| e.name.clone()).collect();
        assert_eq!(names, vec!["..", "app.rs"]);

        pane.show_hidden = true;
        let names: Vec<_> = visible_rows(&pane).iter().map(|e| e.name.clone()).collect();
        assert_eq!(names, vec!["..", ".env", "app.rs"]);
    }

    #[test]
    fn range_is_inclusive_and_excludes_parent() {
        let pane = connected_pane(
            "/home/user",
            &[
                ("a.txt", FileType::File),
                ("b.txt", FileType::File),
                ("c.txt", FileType::File),
            ],
        );
        let rows = visible_rows(&pane);
        // rows: [.., a.txt, b.txt, c.txt]
        let range = range_between(&rows, "a.txt", "c.txt");
        assert_eq!(range, vec!["a.txt", "b.txt", "c.txt"]);

        // Reversed direction yields the same span
        let range = range_between(&rows, "c.txt", "a.txt");
        assert_eq!(range, vec!["a.txt", "b.txt", "c.txt"]);

        // Anchor at the parent never includes it
        let range = range_between(&rows, "..", "b.txt");
        assert_eq!(range, vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn missing_anchor_selects_clicked_only() {
        let pane = connected_pane("/home/user", &[("a.txt", FileType::File)]);
        let rows = visible_rows(&pane);
        assert_eq!(range_between(&rows, "gone", "a.txt"), vec!["a.txt"]);
        assert!(range_between(&rows, "a.txt", "gone").is_empty());
    }

    #[test]
    fn window_clamps_to_bounds() {
        let viewport = Viewport {
            scroll_top: 0.0,
            height: 200.0,
            row_height: 20.0,
        };
        // 10 visible + 6 overscan below
        assert_eq!(visible_window(100, viewport), 0..16);

        let scrolled = Viewport {
            scroll_top: 400.0,
            height: 200.0,
            row_height: 20.0,
        };
        // 20 rows above, minus 6 overscan; 30 at the bottom edge plus 6
        assert_eq!(visible_window(100, scrolled), 14..36);

        // Near the end the window clamps to the row count
        let bottom = Viewport {
            scroll_top: 1900.0,
            height: 200.0,
            row_height: 20.0,
        };
        assert_eq!(visible_window(100, bottom), 89..100);
    }

    #[test]
    fn window_handles_empty_lists() {
        let viewport = Viewport {
            scroll_top: 0.0,
            height: 200.0,
            row_height: 20.0,
        };
        assert_eq!(visible_window(0, viewport), 0..0);
        assert_eq!(window_offset(&(3..10), 20.0), 60.0);
        assert_eq!(content_height(50, 20.0), 1000.0);
    }
}
