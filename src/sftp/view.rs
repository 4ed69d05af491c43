//! Dual-pane orchestrator
//!
//! [`SftpView`] owns both sides' tab sets, the shared [`TransferQueue`] and
//! [`DragBridge`], and hands each side one fixed [`PaneCommands`] object at
//! startup. Panes talk to the orchestrator only through that surface, so no
//! callback identity ever changes underneath the presentation layer.
//! Active-tab changes go out over per-side watch channels; tab-bar and
//! pane-visibility consumers subscribe independently.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::backend::{ConnectTarget, FsBackend};
use crate::config::{DoubleClickAction, Settings};

use super::connection::ConnectionManager;
use super::drag::DragBridge;
use super::error::SftpError;
use super::pane::PaneState;
use super::path_utils::join;
use super::rows::{range_between, visible_rows};
use super::tabs::{DropPosition, Side, TabEntry, TabSet, TabSetSnapshot};
use super::transfer::{
    ConflictItem, QueueStats, TransferItem, TransferQueue, TransferRoute, TransferTask,
};
use super::types::{FileEntry, PermissionBits, SortField};

/// The dual-pane SFTP browser core.
pub struct SftpView {
    backend: Arc<dyn FsBackend>,
    left: RwLock<TabSet>,
    right: RwLock<TabSet>,
    queue: TransferQueue,
    drag: DragBridge,
    settings: RwLock<Settings>,
    active_left: watch::Sender<Option<String>>,
    active_right: watch::Sender<Option<String>>,
}

impl SftpView {
    pub fn new(backend: Arc<dyn FsBackend>) -> Arc<Self> {
        Self::with_settings(backend, Settings::default())
    }

    pub fn with_settings(backend: Arc<dyn FsBackend>, settings: Settings) -> Arc<Self> {
        let (active_left, _) = watch::channel(None);
        let (active_right, _) = watch::channel(None);
        Arc::new(Self {
            backend: backend.clone(),
            left: RwLock::new(TabSet::new(Side::Left)),
            right: RwLock::new(TabSet::new(Side::Right)),
            queue: TransferQueue::new(backend),
            drag: DragBridge::new(),
            settings: RwLock::new(settings),
            active_left,
            active_right,
        })
    }

    fn tabs(&self, side: Side) -> &RwLock<TabSet> {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    fn active_channel(&self, side: Side) -> &watch::Sender<Option<String>> {
        match side {
            Side::Left => &self.active_left,
            Side::Right => &self.active_right,
        }
    }

    fn publish_active(&self, side: Side) {
        let active = self.tabs(side).read().active_id().map(String::from);
        self.active_channel(side).send_replace(active);
    }

    /// Subscribe to one side's active-tab id (narrow pub/sub; tab bar and
    /// pane visibility subscribe here instead of re-rendering the world).
    pub fn subscribe_active_tab(&self, side: Side) -> watch::Receiver<Option<String>> {
        self.active_channel(side).subscribe()
    }

    pub fn queue(&self) -> TransferQueue {
        self.queue.clone()
    }

    pub fn drag_bridge(&self) -> &DragBridge {
        &self.drag
    }

    pub fn settings(&self) -> Settings {
        self.settings.read().clone()
    }

    pub fn update_settings(&self, f: impl FnOnce(&mut Settings)) {
        f(&mut self.settings.write());
    }

    // ---- Tab management -------------------------------------------------

    /// Open a new empty tab (no connection yet) and make it active.
    pub fn add_tab(&self, side: Side) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let mut pane = PaneState::new(id.clone());
        {
            let settings = self.settings.read();
            pane.show_hidden = settings.show_hidden;
            pane.sort = settings.default_sort;
        }
        let pane = Arc::new(RwLock::new(pane));
        let manager = Arc::new(
            ConnectionManager::new(self.backend.clone(), pane.clone())
                .with_reconnect_config(self.settings.read().reconnect.clone()),
        );
        self.tabs(side).write().push_active(TabEntry {
            id: id.clone(),
            pane,
            manager,
        });
        info!("opened tab {} on {}", id, side);
        self.publish_active(side);
        id
    }

    /// Close a tab, disconnecting it first. Activity falls to the preceding
    /// tab in sequence.
    pub async fn close_tab(&self, side: Side, tab_id: &str) -> Result<(), SftpError> {
        let entry = self
            .tabs(side)
            .write()
            .remove(tab_id)
            .ok_or_else(|| SftpError::TabNotFound(tab_id.to_string()))?;
        entry.manager.disconnect().await;
        info!("closed tab {} on {}", tab_id, side);
        self.publish_active(side);
        Ok(())
    }

    pub fn select_tab(&self, side: Side, tab_id: &str) -> Result<(), SftpError> {
        if !self.tabs(side).write().select(tab_id) {
            return Err(SftpError::TabNotFound(tab_id.to_string()));
        }
        self.publish_active(side);
        Ok(())
    }

    pub fn reorder_tabs(
        &self,
        side: Side,
        dragged_id: &str,
        target_id: &str,
        position: DropPosition,
    ) {
        self.tabs(side)
            .write()
            .reorder(dragged_id, target_id, position);
    }

    /// Relocate a tab (with its live connection) to the other side, appended
    /// at the end and made active there.
    pub fn move_tab_to_other_side(&self, origin: Side, tab_id: &str) -> Result<(), SftpError> {
        let entry = self
            .tabs(origin)
            .write()
            .remove(tab_id)
            .ok_or_else(|| SftpError::TabNotFound(tab_id.to_string()))?;
        self.tabs(origin.other()).write().push_active(entry);
        info!("moved tab {} from {} to {}", tab_id, origin, origin.other());
        self.publish_active(origin);
        self.publish_active(origin.other());
        Ok(())
    }

    pub fn tab_ids(&self, side: Side) -> Vec<String> {
        self.tabs(side).read().ids()
    }

    pub fn active_tab_id(&self, side: Side) -> Option<String> {
        self.tabs(side).read().active_id().map(String::from)
    }

    fn active_manager(&self, side: Side) -> Option<Arc<ConnectionManager>> {
        self.tabs(side)
            .read()
            .active_entry()
            .map(|entry| entry.manager.clone())
    }

    fn manager_for(&self, side: Side, tab_id: &str) -> Option<Arc<ConnectionManager>> {
        self.tabs(side).read().get(tab_id).map(|e| e.manager.clone())
    }

    /// Shared state of the active pane on `side`.
    pub fn active_pane(&self, side: Side) -> Option<Arc<RwLock<PaneState>>> {
        self.tabs(side)
            .read()
            .active_entry()
            .map(|entry| entry.pane.clone())
    }

    // ---- Connection / navigation ---------------------------------------

    /// Connect the active tab on `side` (opens one first if none exists).
    pub async fn connect_active(&self, side: Side, target: ConnectTarget) {
        if self.active_manager(side).is_none() {
            self.add_tab(side);
        }
        if let Some(manager) = self.active_manager(side) {
            manager.connect(target).await;
        }
    }

    pub async fn connect_tab(&self, side: Side, tab_id: &str, target: ConnectTarget) {
        if let Some(manager) = self.manager_for(side, tab_id) {
            manager.connect(target).await;
        }
    }

    /// Open an entry: navigate into navigable entries, otherwise apply the
    /// double-click behavior (external open, or transfer to the other pane).
    pub async fn open_entry(&self, side: Side, entry: &FileEntry) -> Result<(), SftpError> {
        let manager = self
            .active_manager(side)
            .ok_or(SftpError::NotConnected)?;

        if entry.is_parent() {
            manager.navigate_up().await;
            return Ok(());
        }
        if entry.is_navigable() {
            let target = {
                let state = manager.state();
                let pane = state.read();
                pane.current_path()
                    .map(|path| join(path, &entry.name, pane.path_style()))
            };
            if let Some(target) = target {
                manager.navigate_to(&target).await;
            }
            return Ok(());
        }

        let action = self.settings.read().double_click;
        match action {
            DoubleClickAction::Open => self.open_externally(side, entry).await,
            DoubleClickAction::Transfer => {
                let item = TransferItem {
                    name: entry.name.clone(),
                    is_directory: false,
                };
                self.submit_transfer(side, side.other(), vec![item], None)
                    .await
            }
        }
    }

    /// Download to a temp location and open with the configured or default
    /// external application.
    pub async fn open_externally(&self, side: Side, entry: &FileEntry) -> Result<(), SftpError> {
        let manager = self
            .active_manager(side)
            .ok_or(SftpError::NotConnected)?;
        let (handle, path) = {
            let state = manager.state();
            let pane = state.read();
            let handle = pane.handle().cloned().ok_or(SftpError::NotConnected)?;
            let path = pane
                .current_path()
                .map(|p| join(p, &entry.name, pane.path_style()))
                .ok_or(SftpError::NotConnected)?;
            (handle, path)
        };
        let app = self.settings.read().external_app_path.clone();
        self.backend
            .download_to_temp_and_open(&handle, &path, &entry.name, app.as_deref())
            .await
    }

    /// Native "open with" picker; remembers the chosen application.
    pub async fn pick_external_application(&self) -> Result<Option<String>, SftpError> {
        let choice = self.backend.select_application().await?;
        if let Some(choice) = &choice {
            self.settings.write().external_app_path = Some(choice.path.clone());
        }
        Ok(choice.map(|c| c.path))
    }

    // ---- File operations ------------------------------------------------

    /// Create a directory in the active pane's current path, refreshing on
    /// success. Failures surface to the caller; pane state is untouched.
    pub async fn create_directory(&self, side: Side, name: &str) -> Result<(), SftpError> {
        let name = validate_entry_name(name)?;
        let manager = self
            .active_manager(side)
            .ok_or(SftpError::NotConnected)?;
        let (handle, path) = Self::resolve_in_pane(&manager, &name)?;
        self.backend.create_dir(&handle, &path).await?;
        manager.refresh().await;
        Ok(())
    }

    /// Delete entries by name from the active pane, refreshing on success.
    pub async fn delete_files(&self, side: Side, names: &[String]) -> Result<(), SftpError> {
        let manager = self
            .active_manager(side)
            .ok_or(SftpError::NotConnected)?;
        let (handle, paths) = {
            let state = manager.state();
            let pane = state.read();
            let handle = pane.handle().cloned().ok_or(SftpError::NotConnected)?;
            let base = pane.current_path().ok_or(SftpError::NotConnected)?;
            let style = pane.path_style();
            let paths: Vec<String> = names
                .iter()
                .filter(|n| n.as_str() != super::types::PARENT_NAME)
                .map(|n| join(base, n, style))
                .collect();
            (handle, paths)
        };
        if paths.is_empty() {
            return Ok(());
        }
        self.backend.remove_entries(&handle, &paths).await?;
        manager.refresh().await;
        Ok(())
    }

    /// Rename an entry in the active pane, refreshing on success. A failed
    /// rename leaves the original entry listed (no refresh happens).
    pub async fn rename_file(
        &self,
        side: Side,
        old_name: &str,
        new_name: &str,
    ) -> Result<(), SftpError> {
        let new_name = validate_entry_name(new_name)?;
        let manager = self
            .active_manager(side)
            .ok_or(SftpError::NotConnected)?;
        let (handle, old_path) = Self::resolve_in_pane(&manager, old_name)?;
        let (_, new_path) = Self::resolve_in_pane(&manager, &new_name)?;
        self.backend
            .rename_entry(&handle, &old_path, &new_path)
            .await?;
        manager.refresh().await;
        Ok(())
    }

    /// Apply a permission-toggle grid to an entry.
    pub async fn change_permissions(
        &self,
        side: Side,
        name: &str,
        bits: PermissionBits,
    ) -> Result<(), SftpError> {
        let manager = self
            .active_manager(side)
            .ok_or(SftpError::NotConnected)?;
        let (handle, path) = Self::resolve_in_pane(&manager, name)?;
        self.backend
            .set_permissions(&handle, &path, bits.to_mode())
            .await?;
        manager.refresh().await;
        Ok(())
    }

    pub async fn read_text_file(&self, side: Side, name: &str) -> Result<String, SftpError> {
        let manager = self
            .active_manager(side)
            .ok_or(SftpError::NotConnected)?;
        let (handle, path) = Self::resolve_in_pane(&manager, name)?;
        self.backend.read_text_file(&handle, &path).await
    }

    /// Write a text file and refresh the listing so size/date update.
    pub async fn write_text_file(
        &self,
        side: Side,
        name: &str,
        content: &str,
    ) -> Result<(), SftpError> {
        let manager = self
            .active_manager(side)
            .ok_or(SftpError::NotConnected)?;
        let (handle, path) = Self::resolve_in_pane(&manager, name)?;
        self.backend.write_text_file(&handle, &path, content).await?;
        manager.refresh().await;
        Ok(())
    }

    fn resolve_in_pane(
        manager: &Arc<ConnectionManager>,
        name: &str,
    ) -> Result<(crate::backend::BackendHandle, String), SftpError> {
        let state = manager.state();
        let pane = state.read();
        let handle = pane.handle().cloned().ok_or(SftpError::NotConnected)?;
        let base = pane.current_path().ok_or(SftpError::NotConnected)?;
        Ok((handle, join(base, name, pane.path_style())))
    }

    // ---- Drag and transfer ----------------------------------------------

    /// Record a drag starting on `grabbed` in the active pane of `side`.
    pub fn start_drag(&self, side: Side, grabbed: &str) -> bool {
        let Some(pane) = self.active_pane(side) else {
            return false;
        };
        let pane = pane.read();
        self.drag.drag_start(&pane, grabbed, side)
    }

    /// Complete a drag over `side`. The drop target is either a navigable
    /// entry of that pane or its empty area; the drag selection is cleared
    /// unconditionally.
    pub async fn drop_on(&self, side: Side, over: Option<&FileEntry>) -> Result<usize, SftpError> {
        let Some(selection) = self.drag.drop_on(side, over) else {
            return Ok(0);
        };
        let items: Vec<TransferItem> = selection
            .items
            .iter()
            .map(|item| TransferItem {
                name: item.name.clone(),
                is_directory: item.is_directory,
            })
            .collect();
        let count = items.len();
        let subdir = over.map(|entry| entry.name.clone());
        self.submit_transfer(selection.source_side, side, items, subdir.as_deref())
            .await?;
        Ok(count)
    }

    /// Submit copies of `items` from the active pane of `source_side` into
    /// the active pane of `target_side` (optionally into `subdir` of it).
    pub async fn submit_transfer(
        &self,
        source_side: Side,
        target_side: Side,
        items: Vec<TransferItem>,
        subdir: Option<&str>,
    ) -> Result<(), SftpError> {
        if items.is_empty() {
            return Ok(());
        }
        let route = self
            .build_route(source_side, target_side, subdir)
            .ok_or(SftpError::NotConnected)?;
        debug!(
            "submitting {} transfer(s) {} -> {}",
            items.len(),
            route.source_dir,
            route.target_dir
        );
        self.queue.start_transfer(items, route).await;
        Ok(())
    }

    fn build_route(
        &self,
        source_side: Side,
        target_side: Side,
        subdir: Option<&str>,
    ) -> Option<TransferRoute> {
        let source = self.active_pane(source_side)?;
        let target = self.active_pane(target_side)?;
        let source = source.read();
        let target = target.read();

        let source_handle = source.handle().cloned()?;
        let target_handle = target.handle().cloned()?;
        let source_dir = source.current_path()?.to_string();
        let mut target_dir = target.current_path()?.to_string();
        let target_style = target.path_style();
        if let Some(subdir) = subdir {
            target_dir = join(&target_dir, subdir, target_style);
        }
        Some(TransferRoute {
            source_side,
            target_side,
            source_handle,
            target_handle,
            source_dir,
            target_dir,
            source_style: source.path_style(),
            target_style,
        })
    }

    // ---- Snapshots -------------------------------------------------------

    pub fn snapshot(&self) -> ViewSnapshot {
        ViewSnapshot {
            left: self.left.read().snapshot(),
            right: self.right.read().snapshot(),
            transfers: self.queue.recent_visible(),
            conflict: self.queue.current_conflict(),
            stats: self.queue.stats(),
        }
    }
}

/// Serializable whole-view state for the UI bridge.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewSnapshot {
    pub left: TabSetSnapshot,
    pub right: TabSetSnapshot,
    pub transfers: Vec<TransferTask>,
    pub conflict: Option<ConflictItem>,
    pub stats: QueueStats,
}

/// Fixed per-side command surface handed to a pane at startup. Cheap to
/// clone; its identity never changes, so the presentation layer can hold it
/// for the life of the pane.
#[derive(Clone)]
pub struct PaneCommands {
    view: Arc<SftpView>,
    side: Side,
}

impl PaneCommands {
    /// Build the fixed command surface for one side, once at startup.
    pub fn new(view: Arc<SftpView>, side: Side) -> Self {
        Self { view, side }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub async fn connect(&self, target: ConnectTarget) {
        self.view.connect_active(self.side, target).await;
    }

    pub async fn navigate_to(&self, path: &str) {
        if let Some(manager) = self.view.active_manager(self.side) {
            manager.navigate_to(path).await;
        }
    }

    pub async fn navigate_up(&self) {
        if let Some(manager) = self.view.active_manager(self.side) {
            manager.navigate_up().await;
        }
    }

    pub async fn refresh(&self) {
        if let Some(manager) = self.view.active_manager(self.side) {
            manager.refresh().await;
        }
    }

    pub async fn open_entry(&self, entry: &FileEntry) -> Result<(), SftpError> {
        self.view.open_entry(self.side, entry).await
    }

    /// Ctrl/cmd- or plain click on a row.
    pub fn toggle_selection(&self, name: &str, multi_select: bool) {
        if let Some(manager) = self.view.active_manager(self.side) {
            manager.update_pane(|pane| pane.toggle_selection(name, multi_select));
        }
    }

    /// Shift-click: select the visual-order range from `anchor` to `clicked`.
    pub fn range_select(&self, anchor: &str, clicked: &str) {
        if let Some(manager) = self.view.active_manager(self.side) {
            manager.update_pane(|pane| {
                let rows = visible_rows(pane);
                let names = range_between(&rows, anchor, clicked);
                pane.select_exact(names);
            });
        }
    }

    pub fn set_filter(&self, text: &str) {
        if let Some(manager) = self.view.active_manager(self.side) {
            manager.update_pane(|pane| pane.set_filter(text));
        }
    }

    pub fn set_sort(&self, field: SortField) {
        if let Some(manager) = self.view.active_manager(self.side) {
            manager.update_pane(|pane| pane.sort = pane.sort.toggled(field));
        }
    }

    pub fn set_show_hidden(&self, show: bool) {
        if let Some(manager) = self.view.active_manager(self.side) {
            manager.update_pane(|pane| pane.show_hidden = show);
        }
    }

    pub fn start_drag(&self, grabbed: &str) -> bool {
        self.view.start_drag(self.side, grabbed)
    }

    pub async fn drop_here(&self, over: Option<&FileEntry>) -> Result<usize, SftpError> {
        self.view.drop_on(self.side, over).await
    }

    pub async fn create_directory(&self, name: &str) -> Result<(), SftpError> {
        self.view.create_directory(self.side, name).await
    }

    pub async fn delete_files(&self, names: &[String]) -> Result<(), SftpError> {
        self.view.delete_files(self.side, names).await
    }

    pub async fn rename_file(&self, old_name: &str, new_name: &str) -> Result<(), SftpError> {
        self.view.rename_file(self.side, old_name, new_name).await
    }

    pub async fn change_permissions(
        &self,
        name: &str,
        bits: PermissionBits,
    ) -> Result<(), SftpError> {
        self.view.change_permissions(self.side, name, bits).await
    }
}

/// Dialog-level name validation for create/rename. Duplicate names stay a
/// backend-reported error; only shape is checked here.
pub fn validate_entry_name(name: &str) -> Result<String, SftpError> {
    let trimmed = name.trim();
    if trimmed.is_empty()
        || trimmed == "."
        || trimmed == ".."
        || trimmed.contains('/')
        || trimmed.contains('\\')
    {
        warn!("rejected entry name {:?}", name);
        return Err(SftpError::InvalidName(name.to_string()));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::sftp::transfer::TransferStatus;
    use crate::sftp::types::FileType;
    use std::time::Duration;

    fn remote(id: &str) -> ConnectTarget {
        ConnectTarget::Host {
            host_id: id.to_string(),
            label: id.to_string(),
        }
    }

    async fn wait_until<F: Fn() -> bool>(condition: F) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached in time");
    }

    async fn dual_view(backend: Arc<MemoryBackend>) -> Arc<SftpView> {
        let view = SftpView::new(backend);
        view.add_tab(Side::Left);
        view.add_tab(Side::Right);
        view.connect_active(Side::Left, ConnectTarget::Local).await;
        view.connect_active(Side::Right, remote("h1")).await;
        view
    }

    #[tokio::test]
    async fn dragging_one_of_three_selected_submits_three_tasks() {
        let backend = Arc::new(MemoryBackend::new());
        for name in ["report.pdf", "notes.txt", "data.csv"] {
            backend.seed_file(&ConnectTarget::Local, &format!("/home/user/{}", name), 10);
        }
        backend.seed_dir(&remote("h1"), "/home/user/archive");
        let view = dual_view(backend.clone()).await;

        let left = PaneCommands::new(view.clone(), Side::Left);
        left.toggle_selection("report.pdf", true);
        left.toggle_selection("notes.txt", true);
        left.toggle_selection("data.csv", true);

        assert!(left.start_drag("report.pdf"));
        let archive = FileEntry::new("archive", FileType::Directory, 0, 0);
        let submitted = view.drop_on(Side::Right, Some(&archive)).await.unwrap();
        assert_eq!(submitted, 3);

        let queue = view.queue();
        wait_until(move || {
            let tasks = queue.tasks_snapshot();
            tasks.len() == 3 && tasks.iter().all(|t| t.status == TransferStatus::Completed)
        })
        .await;

        for name in ["report.pdf", "notes.txt", "data.csv"] {
            assert!(backend.exists(&remote("h1"), &format!("/home/user/archive/{}", name)));
        }
    }

    #[tokio::test]
    async fn same_side_drop_submits_nothing() {
        let backend = Arc::new(MemoryBackend::new());
        backend.seed_file(&ConnectTarget::Local, "/home/user/a.txt", 10);
        let view = dual_view(backend).await;

        assert!(view.start_drag(Side::Left, "a.txt"));
        let submitted = view.drop_on(Side::Left, None).await.unwrap();
        assert_eq!(submitted, 0);
        assert!(view.queue().tasks_snapshot().is_empty());
        // Cleared even though rejected
        assert!(view.drag_bridge().active().is_none());
    }

    #[tokio::test]
    async fn double_click_transfer_setting_copies_to_other_pane() {
        let backend = Arc::new(MemoryBackend::new());
        backend.seed_file(&ConnectTarget::Local, "/home/user/a.txt", 10);
        let view = dual_view(backend.clone()).await;
        view.update_settings(|s| s.double_click = DoubleClickAction::Transfer);

        let entry = FileEntry::new("a.txt", FileType::File, 10, 0);
        view.open_entry(Side::Left, &entry).await.unwrap();

        let queue = view.queue();
        wait_until(move || {
            queue
                .tasks_snapshot()
                .first()
                .map(|t| t.status == TransferStatus::Completed)
                .unwrap_or(false)
        })
        .await;
        assert!(backend.exists(&remote("h1"), "/home/user/a.txt"));
    }

    #[tokio::test]
    async fn double_click_open_setting_uses_external_flow() {
        let backend = Arc::new(MemoryBackend::new());
        backend.seed_file(&ConnectTarget::Local, "/home/user/a.txt", 10);
        let view = dual_view(backend.clone()).await;

        let entry = FileEntry::new("a.txt", FileType::File, 10, 0);
        view.open_entry(Side::Left, &entry).await.unwrap();

        let opened = backend.opened_files();
        assert_eq!(opened.len(), 1);
        assert_eq!(opened[0].0, "/home/user/a.txt");
        assert!(view.queue().tasks_snapshot().is_empty());
    }

    #[tokio::test]
    async fn open_entry_navigates_into_directories() {
        let backend = Arc::new(MemoryBackend::new());
        backend.seed_dir(&ConnectTarget::Local, "/home/user/docs");
        let view = dual_view(backend).await;

        let docs = FileEntry::new("docs", FileType::Directory, 0, 0);
        view.open_entry(Side::Left, &docs).await.unwrap();
        let pane = view.active_pane(Side::Left).unwrap();
        assert_eq!(pane.read().current_path(), Some("/home/user/docs"));

        view.open_entry(Side::Left, &FileEntry::parent())
            .await
            .unwrap();
        let pane = view.active_pane(Side::Left).unwrap();
        assert_eq!(pane.read().current_path(), Some("/home/user"));
    }

    #[tokio::test]
    async fn create_rename_delete_round_trip() {
        let backend = Arc::new(MemoryBackend::new());
        let view = dual_view(backend.clone()).await;

        view.create_directory(Side::Left, "fresh").await.unwrap();
        assert!(backend.exists(&ConnectTarget::Local, "/home/user/fresh"));
        let pane = view.active_pane(Side::Left).unwrap();
        assert!(pane.read().files.iter().any(|e| e.name == "fresh"));

        view.rename_file(Side::Left, "fresh", "renamed").await.unwrap();
        assert!(backend.exists(&ConnectTarget::Local, "/home/user/renamed"));

        view.delete_files(Side::Left, &["renamed".to_string()])
            .await
            .unwrap();
        assert!(!backend.exists(&ConnectTarget::Local, "/home/user/renamed"));
        let pane = view.active_pane(Side::Left).unwrap();
        assert!(pane.read().files.is_empty());
    }

    #[tokio::test]
    async fn invalid_names_are_rejected_client_side() {
        let backend = Arc::new(MemoryBackend::new());
        let view = dual_view(backend).await;

        for bad in ["", "   ", ".", "..", "a/b", "a\\b"] {
            let result = view.create_directory(Side::Left, bad).await;
            assert!(matches!(result, Err(SftpError::InvalidName(_))), "{:?}", bad);
        }
    }

    #[tokio::test]
    async fn chmod_applies_computed_mode() {
        let backend = Arc::new(MemoryBackend::new());
        backend.seed_file(&ConnectTarget::Local, "/home/user/run.sh", 10);
        let view = dual_view(backend.clone()).await;

        let bits = PermissionBits::from_octal("754");
        view.change_permissions(Side::Left, "run.sh", bits)
            .await
            .unwrap();
        assert_eq!(
            backend.mode_of(&ConnectTarget::Local, "/home/user/run.sh"),
            Some(0o754)
        );
    }

    #[tokio::test]
    async fn moving_tab_across_sides_preserves_connection_state() {
        let backend = Arc::new(MemoryBackend::new());
        backend.seed_file(&ConnectTarget::Local, "/home/user/a.txt", 10);
        backend.seed_dir(&ConnectTarget::Local, "/home/user/docs");
        let view = dual_view(backend).await;

        let commands = PaneCommands::new(view.clone(), Side::Left);
        commands.navigate_to("/home/user/docs").await;
        let tab_id = view.active_tab_id(Side::Left).unwrap();

        view.move_tab_to_other_side(Side::Left, &tab_id).unwrap();

        assert!(view.tab_ids(Side::Right).contains(&tab_id));
        assert!(!view.tab_ids(Side::Left).contains(&tab_id));
        assert_eq!(view.active_tab_id(Side::Right), Some(tab_id.clone()));
        let pane = view.active_pane(Side::Right).unwrap();
        assert_eq!(pane.read().current_path(), Some("/home/user/docs"));
    }

    #[tokio::test]
    async fn active_tab_channel_tracks_changes() {
        let backend = Arc::new(MemoryBackend::new());
        let view = SftpView::new(backend);
        let mut rx = view.subscribe_active_tab(Side::Left);
        assert_eq!(*rx.borrow(), None);

        let first = view.add_tab(Side::Left);
        let second = view.add_tab(Side::Left);
        assert_eq!(rx.borrow_and_update().clone(), Some(second.clone()));

        view.select_tab(Side::Left, &first).unwrap();
        assert_eq!(rx.borrow_and_update().clone(), Some(first.clone()));

        view.close_tab(Side::Left, &first).await.unwrap();
        assert_eq!(rx.borrow_and_update().clone(), Some(second));
    }

    #[tokio::test]
    async fn range_select_follows_visual_order() {
        let backend = Arc::new(MemoryBackend::new());
        for name in ["b.txt", "a.txt", "c.txt"] {
            backend.seed_file(&ConnectTarget::Local, &format!("/home/user/{}", name), 1);
        }
        let view = dual_view(backend).await;
        let commands = PaneCommands::new(view.clone(), Side::Left);

        // Visual order is sorted: [.., a.txt, b.txt, c.txt]
        commands.range_select("a.txt", "c.txt");
        let pane = view.active_pane(Side::Left).unwrap();
        let pane = pane.read();
        assert_eq!(pane.selected.len(), 3);
        for name in ["a.txt", "b.txt", "c.txt"] {
            assert!(pane.selected.contains(name));
        }
    }

    #[tokio::test]
    async fn snapshot_reflects_both_sides() {
        let backend = Arc::new(MemoryBackend::new());
        backend.seed_file(&ConnectTarget::Local, "/home/user/a.txt", 1);
        let view = dual_view(backend).await;

        let snapshot = view.snapshot();
        assert_eq!(snapshot.left.tabs.len(), 1);
        assert_eq!(snapshot.right.tabs.len(), 1);
        assert!(snapshot.left.tabs[0].connected);
        assert_eq!(snapshot.stats.total, 0);
    }

    #[test]
    fn entry_name_validation() {
        assert_eq!(validate_entry_name("  notes.txt ").unwrap(), "notes.txt");
        assert!(validate_entry_name("").is_err());
        assert!(validate_entry_name(" . ").is_err());
        assert!(validate_entry_name("..").is_err());
        assert!(validate_entry_name("a/b").is_err());
        assert!(validate_entry_name("a\\b").is_err());
    }
}
