//! SFTP browser data types
//!
//! The directory-listing value types shared between panes, the transfer
//! queue, and the UI bridge.

use serde::{Deserialize, Serialize};

use super::path_utils::{format_date, format_size};

/// One filesystem object in a directory listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    /// File name (not full path)
    pub name: String,
    /// File type
    pub file_type: FileType,
    /// File size in bytes
    pub size: u64,
    /// Last modified time (Unix timestamp)
    pub modified: i64,
    /// File permissions (octal string, e.g. "755"), if the backend reports them
    pub permissions: Option<String>,
    /// Symlink target kind, if the backend resolved it
    #[serde(default)]
    pub symlink_target_is_dir: bool,
    /// Pre-formatted size for display
    pub display_size: String,
    /// Pre-formatted modified date for display
    pub display_modified: String,
}

impl FileEntry {
    pub fn new(name: impl Into<String>, file_type: FileType, size: u64, modified: i64) -> Self {
        let display_size = match file_type {
            FileType::Directory => String::new(),
            _ => format_size(size),
        };
        Self {
            name: name.into(),
            file_type,
            size,
            modified,
            permissions: None,
            symlink_target_is_dir: false,
            display_size,
            display_modified: format_date(modified),
        }
    }

    pub fn with_permissions(mut self, mode: impl Into<String>) -> Self {
        self.permissions = Some(mode.into());
        self
    }

    /// The synthetic parent-directory row injected by the pane view.
    /// Never produced by a backend listing.
    pub fn parent() -> Self {
        let mut entry = Self::new(PARENT_NAME, FileType::Directory, 0, 0);
        entry.display_modified = String::new();
        entry
    }

    /// Check if this is the synthetic parent entry (`..`)
    pub fn is_parent(&self) -> bool {
        self.name == PARENT_NAME
    }

    /// A directory, or a symlink resolving to one.
    pub fn is_navigable(&self) -> bool {
        match self.file_type {
            FileType::Directory => true,
            FileType::Symlink => self.symlink_target_is_dir,
            _ => false,
        }
    }

    /// Get file extension if any
    pub fn extension(&self) -> Option<&str> {
        if self.file_type == FileType::Directory {
            None
        } else {
            std::path::Path::new(&self.name)
                .extension()
                .and_then(|e| e.to_str())
        }
    }
}

/// Name of the synthetic parent entry.
pub const PARENT_NAME: &str = "..";

/// File type enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    File,
    Directory,
    Symlink,
    Unknown,
}

impl FileType {
    /// Get icon name for UI
    pub fn icon(&self) -> &'static str {
        match self {
            FileType::File => "file",
            FileType::Directory => "folder",
            FileType::Symlink => "link",
            FileType::Unknown => "file-question",
        }
    }
}

/// Sortable listing column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    #[default]
    Name,
    Size,
    Modified,
    Type,
}

/// Sort specification for a pane listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortSpec {
    #[serde(default)]
    pub field: SortField,
    #[serde(default)]
    pub descending: bool,
}

impl SortSpec {
    pub fn new(field: SortField, descending: bool) -> Self {
        Self { field, descending }
    }

    /// Toggle direction if the field is already active, otherwise switch
    /// to the new field ascending.
    pub fn toggled(self, field: SortField) -> Self {
        if self.field == field {
            Self {
                field,
                descending: !self.descending,
            }
        } else {
            Self {
                field,
                descending: false,
            }
        }
    }
}

/// Sort entries in place. The sort is stable; directories precede files under
/// every field except `Type`, where the raw type/extension drives grouping.
/// Callers pin the synthetic parent entry separately, it never passes
/// through here.
pub fn sort_entries(entries: &mut [FileEntry], spec: SortSpec) {
    entries.sort_by(|a, b| {
        if spec.field != SortField::Type {
            let a_dir = a.file_type == FileType::Directory;
            let b_dir = b.file_type == FileType::Directory;
            if a_dir != b_dir {
                return b_dir.cmp(&a_dir);
            }
        }

        let ordering = match spec.field {
            SortField::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            SortField::Size => a.size.cmp(&b.size),
            SortField::Modified => a.modified.cmp(&b.modified),
            SortField::Type => {
                let a_key = (a.file_type.icon(), a.extension().unwrap_or(""));
                let b_key = (b.file_type.icon(), b.extension().unwrap_or(""));
                a_key.cmp(&b_key)
            }
        };

        if spec.descending {
            ordering.reverse()
        } else {
            ordering
        }
    });
}

/// Case-insensitive substring filter. The parent entry is always retained.
pub fn matches_filter(entry: &FileEntry, filter: &str) -> bool {
    if entry.is_parent() || filter.is_empty() {
        return true;
    }
    entry.name.to_lowercase().contains(&filter.to_lowercase())
}

/// Nine permission toggles, (owner/group/others) x (read/write/execute).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionBits {
    pub owner_read: bool,
    pub owner_write: bool,
    pub owner_execute: bool,
    pub group_read: bool,
    pub group_write: bool,
    pub group_execute: bool,
    pub other_read: bool,
    pub other_write: bool,
    pub other_execute: bool,
}

impl PermissionBits {
    /// Parse from an octal mode string ("755", "0644"). Unparseable input
    /// yields all-off bits.
    pub fn from_octal(mode: &str) -> Self {
        let parsed = u32::from_str_radix(mode.trim(), 8).unwrap_or(0);
        Self::from_mode(parsed)
    }

    pub fn from_mode(mode: u32) -> Self {
        Self {
            owner_read: mode & 0o400 != 0,
            owner_write: mode & 0o200 != 0,
            owner_execute: mode & 0o100 != 0,
            group_read: mode & 0o040 != 0,
            group_write: mode & 0o020 != 0,
            group_execute: mode & 0o010 != 0,
            other_read: mode & 0o004 != 0,
            other_write: mode & 0o002 != 0,
            other_execute: mode & 0o001 != 0,
        }
    }

    /// Each octal digit = 4*read + 2*write + 1*execute.
    pub fn to_mode(self) -> u32 {
        let digit = |r: bool, w: bool, x: bool| (r as u32) * 4 + (w as u32) * 2 + (x as u32);
        digit(self.owner_read, self.owner_write, self.owner_execute) * 64
            + digit(self.group_read, self.group_write, self.group_execute) * 8
            + digit(self.other_read, self.other_write, self.other_execute)
    }

    pub fn to_octal(self) -> String {
        format!("{:03o}", self.to_mode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, size: u64) -> FileEntry {
        FileEntry::new(name, FileType::File, size, 1_700_000_000)
    }

    fn dir(name: &str) -> FileEntry {
        FileEntry::new(name, FileType::Directory, 0, 1_700_000_000)
    }

    #[test]
    fn sort_puts_directories_first_by_name() {
        let mut entries = vec![file("b.txt", 1), dir("zeta"), file("a.txt", 2), dir("alpha")];
        sort_entries(&mut entries, SortSpec::default());
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "zeta", "a.txt", "b.txt"]);
    }

    #[test]
    fn sort_name_round_trips() {
        let original = vec![file("b.txt", 1), file("a.txt", 2), file("c.txt", 3)];
        let mut entries = original.clone();
        sort_entries(&mut entries, SortSpec::new(SortField::Name, false));
        let ascending = entries.clone();
        sort_entries(&mut entries, SortSpec::new(SortField::Name, true));
        sort_entries(&mut entries, SortSpec::new(SortField::Name, false));
        assert_eq!(entries, ascending);
    }

    #[test]
    fn type_sort_mixes_directories_and_files() {
        let mut entries = vec![file("a.txt", 1), dir("docs"), file("b.rs", 2)];
        sort_entries(&mut entries, SortSpec::new(SortField::Type, false));
        // "file" < "folder" as icon keys, so plain files come before directories
        assert_eq!(entries.last().unwrap().name, "docs");
    }

    #[test]
    fn filter_is_case_insensitive_and_spares_parent() {
        let parent = FileEntry::parent();
        assert!(matches_filter(&parent, "zzz"));
        assert!(matches_filter(&file("Notes.TXT", 1), "notes"));
        assert!(!matches_filter(&file("image.png", 1), "notes"));
    }

    #[test]
    fn symlink_navigability_follows_target() {
        let mut link = FileEntry::new("ref", FileType::Symlink, 0, 0);
        assert!(!link.is_navigable());
        link.symlink_target_is_dir = true;
        assert!(link.is_navigable());
    }

    #[test]
    fn permission_bits_octal_round_trip() {
        let bits = PermissionBits::from_octal("754");
        assert!(bits.owner_read && bits.owner_write && bits.owner_execute);
        assert!(bits.group_read && !bits.group_write && bits.group_execute);
        assert!(bits.other_read && !bits.other_write && !bits.other_execute);
        assert_eq!(bits.to_mode(), 0o754);
        assert_eq!(bits.to_octal(), "754");
    }
}
