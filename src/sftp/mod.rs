//! SFTP dual-pane browser module
//!
//! Pane state, tab management, the transfer queue, and the drag bridge for
//! the dual-pane file browser. All filesystem work goes through the
//! [`crate::backend`] abstraction.

pub mod connection;
pub mod drag;
pub mod error;
pub mod pane;
pub mod path_utils;
pub mod rows;
pub mod tabs;
pub mod transfer;
pub mod types;
pub mod view;

pub use connection::{ConnectionManager, ReconnectConfig};
pub use drag::{DragBridge, DragItem, DragSelection};
pub use error::SftpError;
pub use pane::{Connection, ConnectionStatus, PaneSnapshot, PaneState};
pub use rows::{range_between, visible_rows, visible_window, Viewport, OVERSCAN_ROWS};
pub use tabs::{DropPosition, Side, TabEntry, TabSet, TabSetSnapshot};
pub use transfer::{
    ConflictAction, ConflictItem, QueueEvent, QueueStats, TransferItem, TransferQueue,
    TransferRoute, TransferStatus, TransferTask, VISIBLE_TRANSFER_LIMIT,
};
pub use types::*;
pub use view::{validate_entry_name, PaneCommands, SftpView, ViewSnapshot};
