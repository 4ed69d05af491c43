//! Transfer queue
//!
//! Serializes and tracks copy operations between the two panes' connections.
//! Transfers run concurrently; a name collision at the destination parks the
//! colliding task behind a [`ConflictItem`] until the user resolves it, while
//! unrelated tasks proceed. Completed tasks are retained until explicitly
//! cleared; the UI renders only the most recent few live.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, warn};

use crate::backend::{BackendHandle, FsBackend};

use super::error::SftpError;
use super::path_utils::{join, PathStyle};
use super::tabs::Side;

/// How many tasks the transfers panel renders live.
pub const VISIBLE_TRANSFER_LIMIT: usize = 5;

/// Transfer state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    /// Waiting to start (possibly parked behind a conflict)
    Queued,
    /// Currently transferring
    Running,
    /// Completed successfully
    Completed,
    /// Failed with error
    Error,
    /// Cancelled by user or skipped conflict
    Cancelled,
}

impl TransferStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TransferStatus::Completed | TransferStatus::Error | TransferStatus::Cancelled
        )
    }
}

/// One tracked copy operation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferTask {
    pub id: String,
    pub source_side: Side,
    pub target_side: Side,
    pub source_path: String,
    pub target_path: String,
    pub file_name: String,
    pub is_directory: bool,
    pub status: TransferStatus,
    pub bytes_transferred: u64,
    pub total_bytes: u64,
    pub speed_bps: u64,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TransferTask {
    /// Completion percentage (0-100); unknown totals report 0 until done.
    pub fn percentage(&self) -> f64 {
        if self.total_bytes == 0 {
            if self.status == TransferStatus::Completed {
                100.0
            } else {
                0.0
            }
        } else {
            (self.bytes_transferred as f64 / self.total_bytes as f64) * 100.0
        }
    }
}

/// A target-name collision awaiting a user decision.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictItem {
    pub id: String,
    pub transfer_id: String,
    pub file_name: String,
    pub source_path: String,
    pub target_path: String,
    pub source_size: u64,
    pub target_size: u64,
    pub source_modified: i64,
    pub target_modified: i64,
}

/// How to resolve a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictAction {
    /// Overwrite the target
    Replace,
    /// Cancel the colliding transfer
    Skip,
    /// Copy under a non-colliding name (`name (1).ext`, ...)
    Duplicate,
}

/// One file/directory to copy, as picked up from a pane listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferItem {
    pub name: String,
    pub is_directory: bool,
}

/// Where a batch of transfers goes: resolved pane endpoints at submit time.
#[derive(Debug, Clone)]
pub struct TransferRoute {
    pub source_side: Side,
    pub target_side: Side,
    pub source_handle: BackendHandle,
    pub target_handle: BackendHandle,
    pub source_dir: String,
    pub target_dir: String,
    pub source_style: PathStyle,
    pub target_style: PathStyle,
}

/// Queue change notifications for the transfers panel.
#[derive(Debug, Clone)]
pub enum QueueEvent {
    TaskQueued(String),
    TaskStarted(String),
    TaskProgress(String),
    TaskFinished(String),
    ConflictDetected(String),
    ConflictResolved(String),
}

/// Cancellation signal for one transfer, observed by the backend at chunk
/// boundaries.
struct TransferControl {
    cancel_tx: watch::Sender<bool>,
    cancel_rx: watch::Receiver<bool>,
}

impl TransferControl {
    fn new() -> Self {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        Self {
            cancel_tx,
            cancel_rx,
        }
    }

    fn cancel(&self) {
        let _ = self.cancel_tx.send(true);
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.cancel_rx.clone()
    }
}

struct QueueInner {
    backend: Arc<dyn FsBackend>,
    tasks: DashMap<String, TransferTask>,
    /// Task ids in submission order.
    order: RwLock<Vec<String>>,
    routes: RwLock<HashMap<String, TransferRoute>>,
    controls: RwLock<HashMap<String, Arc<TransferControl>>>,
    /// Tasks whose runner has not exited yet; a cancel-pending task stays
    /// here until the backend resolves, blocking re-submission.
    in_flight: DashMap<String, ()>,
    /// Unresolved conflicts in submission order; the front one is shown.
    conflicts: RwLock<VecDeque<ConflictItem>>,
    events: broadcast::Sender<QueueEvent>,
}

/// The background transfer engine shared by both sides' panes. Cheap to
/// clone; clones share one queue.
#[derive(Clone)]
pub struct TransferQueue {
    inner: Arc<QueueInner>,
}

impl TransferQueue {
    pub fn new(backend: Arc<dyn FsBackend>) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(QueueInner {
                backend,
                tasks: DashMap::new(),
                order: RwLock::new(Vec::new()),
                routes: RwLock::new(HashMap::new()),
                controls: RwLock::new(HashMap::new()),
                in_flight: DashMap::new(),
                conflicts: RwLock::new(VecDeque::new()),
                events,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.inner.events.subscribe()
    }

    fn emit(&self, event: QueueEvent) {
        let _ = self.inner.events.send(event);
    }

    /// Submit a batch of copies along `route`. Each file either starts
    /// immediately or parks behind a conflict if the target name exists.
    pub async fn start_transfer(&self, files: Vec<TransferItem>, route: TransferRoute) {
        for item in files {
            let source_path = join(&route.source_dir, &item.name, route.source_style);
            let target_path = join(&route.target_dir, &item.name, route.target_style);
            let id = uuid::Uuid::new_v4().to_string();
            let now = Utc::now();

            let source_stat = self
                .inner
                .backend
                .stat(&route.source_handle, &source_path)
                .await
                .ok()
                .flatten();
            let total_bytes = source_stat
                .as_ref()
                .filter(|_| !item.is_directory)
                .map(|e| e.size)
                .unwrap_or(0);

            let task = TransferTask {
                id: id.clone(),
                source_side: route.source_side,
                target_side: route.target_side,
                source_path: source_path.clone(),
                target_path: target_path.clone(),
                file_name: item.name.clone(),
                is_directory: item.is_directory,
                status: TransferStatus::Queued,
                bytes_transferred: 0,
                total_bytes,
                speed_bps: 0,
                error: None,
                created_at: now,
                updated_at: now,
            };
            self.inner.tasks.insert(id.clone(), task);
            self.inner.order.write().push(id.clone());
            self.inner.routes.write().insert(id.clone(), route.clone());
            info!("queued transfer {}: {} -> {}", id, source_path, target_path);
            self.emit(QueueEvent::TaskQueued(id.clone()));

            match self
                .inner
                .backend
                .stat(&route.target_handle, &target_path)
                .await
            {
                Ok(Some(existing)) => {
                    let conflict = ConflictItem {
                        id: uuid::Uuid::new_v4().to_string(),
                        transfer_id: id.clone(),
                        file_name: item.name.clone(),
                        source_path,
                        target_path,
                        source_size: source_stat.as_ref().map(|e| e.size).unwrap_or(0),
                        target_size: existing.size,
                        source_modified: source_stat.as_ref().map(|e| e.modified).unwrap_or(0),
                        target_modified: existing.modified,
                    };
                    debug!("conflict on {} for transfer {}", conflict.target_path, id);
                    let conflict_id = conflict.id.clone();
                    self.inner.conflicts.write().push_back(conflict);
                    self.emit(QueueEvent::ConflictDetected(conflict_id));
                }
                Ok(None) => self.run_task(&id),
                Err(err) => self.finish_task(&id, TransferStatus::Error, Some(err.to_string())),
            }
        }
    }

    /// Spawn the backend copy for a queued task.
    fn run_task(&self, task_id: &str) {
        let route = match self.inner.routes.read().get(task_id) {
            Some(route) => route.clone(),
            None => {
                warn!("transfer {} has no route; dropping", task_id);
                return;
            }
        };
        let (source_path, target_path) = match self.inner.tasks.get(task_id) {
            Some(task) => (task.source_path.clone(), task.target_path.clone()),
            None => return,
        };

        let control = Arc::new(TransferControl::new());
        self.inner
            .controls
            .write()
            .insert(task_id.to_string(), control.clone());
        self.inner.in_flight.insert(task_id.to_string(), ());
        self.update_task(task_id, |task| {
            task.status = TransferStatus::Running;
            task.error = None;
        });
        self.emit(QueueEvent::TaskStarted(task_id.to_string()));

        let queue = self.clone();
        let id = task_id.to_string();
        tokio::spawn(async move {
            let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<u64>();
            let cancel_rx = control.subscribe();

            let consumer = {
                let queue = queue.clone();
                let id = id.clone();
                tokio::spawn(async move {
                    let started = Instant::now();
                    while let Some(bytes) = progress_rx.recv().await {
                        queue.update_task(&id, |task| {
                            task.bytes_transferred = bytes;
                            let secs = started.elapsed().as_secs_f64();
                            if secs > 0.0 {
                                task.speed_bps = (bytes as f64 / secs) as u64;
                            }
                        });
                        queue.emit(QueueEvent::TaskProgress(id.clone()));
                    }
                })
            };

            let result = queue
                .inner
                .backend
                .transfer(
                    &route.source_handle,
                    &source_path,
                    &route.target_handle,
                    &target_path,
                    progress_tx,
                    cancel_rx,
                )
                .await;
            let _ = consumer.await;

            match result {
                Ok(total) => {
                    queue.update_task(&id, |task| {
                        task.bytes_transferred = total;
                        if task.total_bytes == 0 {
                            task.total_bytes = total;
                        }
                    });
                    queue.finish_task(&id, TransferStatus::Completed, None);
                    info!("transfer {} completed ({} bytes)", id, total);
                }
                Err(SftpError::TransferCancelled) => {
                    queue.finish_task(&id, TransferStatus::Cancelled, None);
                    info!("transfer {} cancelled", id);
                }
                Err(err) => {
                    warn!("transfer {} failed: {}", id, err);
                    queue.finish_task(&id, TransferStatus::Error, Some(err.to_string()));
                }
            }

            queue.inner.controls.write().remove(&id);
            queue.inner.in_flight.remove(&id);
        });
    }

    fn update_task(&self, task_id: &str, f: impl FnOnce(&mut TransferTask)) {
        if let Some(mut task) = self.inner.tasks.get_mut(task_id) {
            f(&mut task);
            task.updated_at = Utc::now();
        }
    }

    fn finish_task(&self, task_id: &str, status: TransferStatus, error: Option<String>) {
        self.update_task(task_id, |task| {
            task.status = status;
            task.error = error;
        });
        self.emit(QueueEvent::TaskFinished(task_id.to_string()));
    }

    /// Request cancellation. Optimistically marks the task cancelled; the
    /// runner reconciles if the backend reports differently.
    pub async fn cancel_transfer(&self, task_id: &str) {
        let control = self.inner.controls.read().get(task_id).cloned();
        match control {
            Some(control) => {
                control.cancel();
                let _ = self.inner.backend.cancel_transfer(task_id).await;
                self.update_task(task_id, |task| {
                    if !task.status.is_terminal() {
                        task.status = TransferStatus::Cancelled;
                    }
                });
                self.emit(QueueEvent::TaskFinished(task_id.to_string()));
                info!("cancel requested for transfer {}", task_id);
            }
            None => {
                // Not running: a queued (possibly conflict-parked) task just
                // gets cancelled and its conflict discarded.
                self.inner
                    .conflicts
                    .write()
                    .retain(|c| c.transfer_id != task_id);
                self.finish_task(task_id, TransferStatus::Cancelled, None);
            }
        }
    }

    /// Re-submit a failed or cancelled task with identical source/target,
    /// keeping its id. Refused while the previous run is still winding down.
    pub async fn retry_transfer(&self, task_id: &str) -> Result<(), SftpError> {
        if self.inner.in_flight.contains_key(task_id) {
            return Err(SftpError::OperationFailed(format!(
                "transfer {} is still resolving",
                task_id
            )));
        }
        let eligible = self
            .inner
            .tasks
            .get(task_id)
            .map(|t| matches!(t.status, TransferStatus::Error | TransferStatus::Cancelled))
            .ok_or_else(|| SftpError::TransferNotFound(task_id.to_string()))?;
        if !eligible {
            return Err(SftpError::OperationFailed(format!(
                "transfer {} is not retryable",
                task_id
            )));
        }

        self.update_task(task_id, |task| {
            task.status = TransferStatus::Queued;
            task.bytes_transferred = 0;
            task.speed_bps = 0;
            task.error = None;
        });
        self.emit(QueueEvent::TaskQueued(task_id.to_string()));

        // Re-check the destination: the collision picture may have changed
        // since the original submission.
        let route = self
            .inner
            .routes
            .read()
            .get(task_id)
            .cloned()
            .ok_or_else(|| SftpError::TransferNotFound(task_id.to_string()))?;
        let (file_name, source_path, target_path, source_size) = self
            .inner
            .tasks
            .get(task_id)
            .map(|t| {
                (
                    t.file_name.clone(),
                    t.source_path.clone(),
                    t.target_path.clone(),
                    t.total_bytes,
                )
            })
            .ok_or_else(|| SftpError::TransferNotFound(task_id.to_string()))?;

        match self
            .inner
            .backend
            .stat(&route.target_handle, &target_path)
            .await
        {
            Ok(Some(existing)) => {
                let conflict = ConflictItem {
                    id: uuid::Uuid::new_v4().to_string(),
                    transfer_id: task_id.to_string(),
                    file_name,
                    source_path,
                    target_path,
                    source_size,
                    target_size: existing.size,
                    source_modified: 0,
                    target_modified: existing.modified,
                };
                let conflict_id = conflict.id.clone();
                self.inner.conflicts.write().push_back(conflict);
                self.emit(QueueEvent::ConflictDetected(conflict_id));
            }
            Ok(None) => self.run_task(task_id),
            Err(err) => self.finish_task(task_id, TransferStatus::Error, Some(err.to_string())),
        }
        Ok(())
    }

    /// The conflict currently shown to the user (submission order).
    pub fn current_conflict(&self) -> Option<ConflictItem> {
        self.inner.conflicts.read().front().cloned()
    }

    pub fn pending_conflicts(&self) -> usize {
        self.inner.conflicts.read().len()
    }

    /// Resolve a conflict. With `apply_to_all`, the same action resolves
    /// every currently queued conflict, not just the named one.
    pub async fn resolve_conflict(
        &self,
        conflict_id: &str,
        action: ConflictAction,
        apply_to_all: bool,
    ) -> Result<(), SftpError> {
        let resolved: Vec<ConflictItem> = {
            let mut conflicts = self.inner.conflicts.write();
            if apply_to_all {
                conflicts.drain(..).collect()
            } else {
                let index = conflicts
                    .iter()
                    .position(|c| c.id == conflict_id)
                    .ok_or_else(|| SftpError::TransferNotFound(conflict_id.to_string()))?;
                conflicts.remove(index).into_iter().collect()
            }
        };

        for conflict in resolved {
            self.emit(QueueEvent::ConflictResolved(conflict.id.clone()));
            match action {
                ConflictAction::Replace => {
                    debug!("conflict {}: replacing {}", conflict.id, conflict.target_path);
                    self.run_task(&conflict.transfer_id);
                }
                ConflictAction::Skip => {
                    debug!("conflict {}: skipped", conflict.id);
                    self.finish_task(&conflict.transfer_id, TransferStatus::Cancelled, None);
                }
                ConflictAction::Duplicate => {
                    let route = self
                        .inner
                        .routes
                        .read()
                        .get(&conflict.transfer_id)
                        .cloned()
                        .ok_or_else(|| {
                            SftpError::TransferNotFound(conflict.transfer_id.clone())
                        })?;
                    let renamed = self.find_free_target(&route, &conflict.target_path).await?;
                    debug!("conflict {}: duplicating to {}", conflict.id, renamed);
                    self.update_task(&conflict.transfer_id, |task| {
                        task.target_path = renamed.clone();
                    });
                    self.run_task(&conflict.transfer_id);
                }
            }
        }
        Ok(())
    }

    /// First `name (n)` variant that does not exist at the destination.
    async fn find_free_target(
        &self,
        route: &TransferRoute,
        target_path: &str,
    ) -> Result<String, SftpError> {
        for counter in 1..1000u32 {
            let candidate = duplicate_path(target_path, route.target_style, counter);
            match self
                .inner
                .backend
                .stat(&route.target_handle, &candidate)
                .await?
            {
                Some(_) => continue,
                None => return Ok(candidate),
            }
        }
        Err(SftpError::OperationFailed(format!(
            "no free duplicate name for {}",
            target_path
        )))
    }

    /// Remove one task from the list. In-flight backend work is unaffected;
    /// later progress for a dismissed task is dropped on the floor.
    pub fn dismiss_transfer(&self, task_id: &str) {
        self.inner
            .conflicts
            .write()
            .retain(|c| c.transfer_id != task_id);
        self.inner.tasks.remove(task_id);
        self.inner.routes.write().remove(task_id);
        self.inner.order.write().retain(|id| id != task_id);
    }

    /// Remove every terminal task (completed/cancelled/error) from the list.
    pub fn clear_completed_transfers(&self) {
        let terminal: Vec<String> = self
            .inner
            .tasks
            .iter()
            .filter(|t| t.status.is_terminal())
            .map(|t| t.id.clone())
            .collect();
        for id in terminal {
            self.dismiss_transfer(&id);
        }
    }

    pub fn task(&self, task_id: &str) -> Option<TransferTask> {
        self.inner.tasks.get(task_id).map(|t| t.clone())
    }

    /// Whether the backend run for this task has fully resolved.
    pub fn is_settled(&self, task_id: &str) -> bool {
        !self.inner.in_flight.contains_key(task_id)
    }

    /// All tasks in submission order.
    pub fn tasks_snapshot(&self) -> Vec<TransferTask> {
        self.inner
            .order
            .read()
            .iter()
            .filter_map(|id| self.inner.tasks.get(id).map(|t| t.clone()))
            .collect()
    }

    /// The most recent tasks rendered live by the UI.
    pub fn recent_visible(&self) -> Vec<TransferTask> {
        let all = self.tasks_snapshot();
        let skip = all.len().saturating_sub(VISIBLE_TRANSFER_LIMIT);
        all.into_iter().skip(skip).collect()
    }

    /// Counts by status for the transfers badge.
    pub fn stats(&self) -> QueueStats {
        let mut stats = QueueStats::default();
        for task in self.inner.tasks.iter() {
            stats.total += 1;
            match task.status {
                TransferStatus::Queued => stats.queued += 1,
                TransferStatus::Running => stats.running += 1,
                TransferStatus::Completed => stats.completed += 1,
                TransferStatus::Error => stats.failed += 1,
                TransferStatus::Cancelled => stats.cancelled += 1,
            }
        }
        stats.conflicts = self.pending_conflicts();
        stats
    }
}

/// Queue statistics
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub total: usize,
    pub queued: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub conflicts: usize,
}

/// `path/name.ext` -> `path/name (n).ext`; directories get the bare suffix.
fn duplicate_path(target_path: &str, style: PathStyle, counter: u32) -> String {
    let sep = style.separator();
    let (dir, name) = match target_path.rfind(sep) {
        Some(idx) => (&target_path[..=idx], &target_path[idx + 1..]),
        None => ("", target_path),
    };
    let renamed = match name.rfind('.') {
        Some(dot) if dot > 0 => {
            format!("{} ({}){}", &name[..dot], counter, &name[dot..])
        }
        _ => format!("{} ({})", name, counter),
    };
    format!("{}{}", dir, renamed)
}
