//! Per-pane connection lifecycle
//!
//! One [`ConnectionManager`] per tab. Owns connect/disconnect, navigation,
//! refresh, and the silent reconnection path. Listing responses are tagged
//! with the request they answer; a response that is no longer the newest
//! request for the pane is discarded (last-writer-wins on `current_path`
//! and `files`).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::backend::{ConnectTarget, FsBackend};

use super::error::SftpError;
use super::pane::{Connection, ConnectionStatus, PaneState};
use super::path_utils::{is_absolute, parent_of};

/// Reconnection tuning.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconnectConfig {
    /// Maximum number of reconnection attempts
    pub max_attempts: u32,
    /// Initial delay before first retry (ms)
    pub initial_delay_ms: u64,
    /// Maximum delay between attempts (ms)
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Whether silent reconnection is enabled at all
    pub enabled: bool,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 1000,
            max_delay_ms: 30000,
            backoff_multiplier: 1.5,
            enabled: true,
        }
    }
}

impl ReconnectConfig {
    /// Delay before `attempt` (1-based), exponential with a cap.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay_ms as f64;
        let delay = base * self.backoff_multiplier.powi(attempt as i32 - 1);
        Duration::from_millis(delay.min(self.max_delay_ms as f64) as u64)
    }
}

/// Manages the single connection of one pane.
pub struct ConnectionManager {
    backend: Arc<dyn FsBackend>,
    state: Arc<RwLock<PaneState>>,
    reconnect_config: ReconnectConfig,
    /// Monotonic listing-request counter; only the newest request may apply.
    list_seq: AtomicU64,
    /// Bumped when the connection binding changes; stale reconnect loops and
    /// listing responses from a previous binding abort when it moves.
    epoch: AtomicU64,
    /// Navigations issued while reconnecting, replayed in order on success.
    pending_nav: Mutex<VecDeque<String>>,
    /// Revision counter for view subscriptions.
    revision: watch::Sender<u64>,
}

impl ConnectionManager {
    pub fn new(backend: Arc<dyn FsBackend>, state: Arc<RwLock<PaneState>>) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            backend,
            state,
            reconnect_config: ReconnectConfig::default(),
            list_seq: AtomicU64::new(0),
            epoch: AtomicU64::new(0),
            pending_nav: Mutex::new(VecDeque::new()),
            revision,
        }
    }

    pub fn with_reconnect_config(mut self, config: ReconnectConfig) -> Self {
        self.reconnect_config = config;
        self
    }

    /// Subscribe to pane-state revisions (narrow pub/sub for the view layer).
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn state(&self) -> Arc<RwLock<PaneState>> {
        self.state.clone()
    }

    /// Mutate the pane synchronously (selection, filter, sort) and notify
    /// revision subscribers.
    pub fn update_pane<R>(&self, f: impl FnOnce(&mut PaneState) -> R) -> R {
        self.mutate(f)
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut PaneState) -> R) -> R {
        let result = f(&mut self.state.write());
        self.revision.send_modify(|v| *v += 1);
        result
    }

    /// Connect the pane to `target`. Safe to call on an already-connected
    /// pane; the previous connection is released and replaced.
    pub async fn connect(&self, target: ConnectTarget) {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        self.pending_nav.lock().clear();

        let old_handle = self.mutate(|pane| {
            let old = pane.connection.take().and_then(|c| c.handle);
            pane.files.clear();
            pane.selected.clear();
            pane.error = None;
            pane.reconnecting = false;
            pane.loading = true;
            pane.connection = Some(Connection::connecting(target.clone()));
            old
        });
        if let Some(handle) = old_handle {
            self.backend.disconnect(&handle).await;
        }

        info!("pane {}: connecting to {}", self.pane_id(), target.label());
        match self.backend.connect(&target).await {
            Ok(info) => {
                if self.epoch.load(Ordering::SeqCst) != epoch {
                    debug!("pane {}: discarding superseded connect", self.pane_id());
                    self.backend.disconnect(&info.handle).await;
                    return;
                }
                let home = info.home_dir.clone();
                self.mutate(|pane| {
                    if let Some(connection) = &mut pane.connection {
                        connection.handle = Some(info.handle.clone());
                        connection.home_dir = info.home_dir.clone();
                        connection.current_path = info.home_dir.clone();
                        connection.path_style = info.path_style;
                        connection.status = ConnectionStatus::Connected;
                    }
                });
                self.list_path(&home).await;
            }
            Err(err) => {
                if self.epoch.load(Ordering::SeqCst) != epoch {
                    return;
                }
                warn!("pane {}: connect failed: {}", self.pane_id(), err);
                self.mutate(|pane| {
                    pane.loading = false;
                    pane.error = Some(err.to_string());
                    if let Some(connection) = &mut pane.connection {
                        connection.status = ConnectionStatus::Error;
                        connection.last_error = Some(err.to_string());
                    }
                });
            }
        }
    }

    /// Release backend resources and clear the pane's connection.
    pub async fn disconnect(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.pending_nav.lock().clear();
        let handle = self.mutate(|pane| {
            let handle = pane.connection.as_mut().and_then(|c| c.handle.take());
            pane.clear_connection();
            handle
        });
        if let Some(handle) = handle {
            self.backend.disconnect(&handle).await;
        }
    }

    /// Navigate to an absolute path. While reconnecting, the navigation is
    /// queued and replayed once the connection is back.
    pub async fn navigate_to(&self, path: &str) {
        let (style, reconnecting) = {
            let pane = self.state.read();
            (pane.path_style(), pane.reconnecting)
        };
        if !is_absolute(path, style) {
            self.mutate(|pane| {
                pane.error = Some(SftpError::InvalidPath(path.to_string()).to_string());
            });
            return;
        }
        if reconnecting {
            debug!("pane {}: queueing navigation to {}", self.pane_id(), path);
            self.pending_nav.lock().push_back(path.to_string());
            return;
        }
        self.list_path(path).await;
    }

    /// Navigate to the parent of the current path (no-op at a root).
    pub async fn navigate_up(&self) {
        let target = {
            let pane = self.state.read();
            pane.connection
                .as_ref()
                .map(|c| parent_of(&c.current_path, c.path_style))
        };
        if let Some(target) = target {
            self.navigate_to(&target).await;
        }
    }

    /// Re-issue the listing for the current path. Selection survives the
    /// refresh intersected with the new listing.
    pub async fn refresh(&self) {
        let (path, reconnecting) = {
            let pane = self.state.read();
            (
                pane.current_path().map(String::from),
                pane.reconnecting,
            )
        };
        let Some(path) = path else { return };
        if reconnecting {
            self.pending_nav.lock().push_back(path);
            return;
        }
        self.list_path(&path).await;
    }

    /// Issue a listing request for `path` and apply the response unless a
    /// newer request or connection change superseded it.
    async fn list_path(&self, path: &str) {
        let seq = self.list_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let epoch = self.epoch.load(Ordering::SeqCst);
        let handle = self.mutate(|pane| {
            pane.loading = true;
            pane.handle().cloned()
        });
        let Some(handle) = handle else {
            self.mutate(|pane| {
                pane.loading = false;
                pane.error = Some(SftpError::NotConnected.to_string());
            });
            return;
        };

        let result = self.backend.list_dir(&handle, path).await;

        if self.list_seq.load(Ordering::SeqCst) != seq
            || self.epoch.load(Ordering::SeqCst) != epoch
        {
            debug!(
                "pane {}: discarding stale listing for {} (seq {})",
                self.pane_id(),
                path,
                seq
            );
            return;
        }

        match result {
            Ok(files) => {
                debug!("pane {}: listed {} entries in {}", self.pane_id(), files.len(), path);
                self.mutate(|pane| pane.apply_listing(path, files));
            }
            Err(err) if err.is_connection_loss() => {
                warn!("pane {}: connection drop detected: {}", self.pane_id(), err);
                self.pending_nav.lock().push_back(path.to_string());
                Box::pin(self.reconnect(epoch)).await;
            }
            Err(err) => {
                self.mutate(|pane| pane.apply_listing_error(err.to_string()));
            }
        }
    }

    /// Silent reconnection with exponential backoff. Navigation requests
    /// arriving while this runs are queued, then replayed in order.
    async fn reconnect(&self, epoch: u64) {
        if !self.reconnect_config.enabled {
            self.fail_connection("Connection lost");
            return;
        }
        let already = self.mutate(|pane| std::mem::replace(&mut pane.reconnecting, true));
        if already {
            return;
        }

        let target = {
            let pane = self.state.read();
            pane.connection.as_ref().map(|c| c.target.clone())
        };
        let Some(target) = target else {
            self.mutate(|pane| pane.reconnecting = false);
            return;
        };

        for attempt in 1..=self.reconnect_config.max_attempts {
            if self.epoch.load(Ordering::SeqCst) != epoch {
                debug!("pane {}: reconnect superseded", self.pane_id());
                return;
            }
            if attempt > 1 {
                sleep(self.reconnect_config.delay_for_attempt(attempt)).await;
            }
            info!(
                "pane {}: reconnect attempt {}/{}",
                self.pane_id(),
                attempt,
                self.reconnect_config.max_attempts
            );
            match self.backend.connect(&target).await {
                Ok(info) => {
                    if self.epoch.load(Ordering::SeqCst) != epoch {
                        self.backend.disconnect(&info.handle).await;
                        return;
                    }
                    self.mutate(|pane| {
                        pane.reconnecting = false;
                        if let Some(connection) = &mut pane.connection {
                            connection.handle = Some(info.handle.clone());
                            connection.home_dir = info.home_dir.clone();
                            connection.path_style = info.path_style;
                            connection.status = ConnectionStatus::Connected;
                            connection.last_error = None;
                        }
                    });
                    info!("pane {}: reconnected on attempt {}", self.pane_id(), attempt);
                    self.drain_pending_nav().await;
                    return;
                }
                Err(err) => {
                    warn!(
                        "pane {}: reconnect attempt {} failed: {}",
                        self.pane_id(),
                        attempt,
                        err
                    );
                }
            }
        }

        self.mutate(|pane| pane.reconnecting = false);
        self.fail_connection("Connection lost; reconnection attempts exhausted");
    }

    async fn drain_pending_nav(&self) {
        loop {
            let next = self.pending_nav.lock().pop_front();
            match next {
                Some(path) => Box::pin(self.list_path(&path)).await,
                None => break,
            }
        }
        // Nothing queued: make sure the listing reflects the live connection.
        let needs_refresh = self.state.read().files.is_empty();
        if needs_refresh {
            self.refresh().await;
        }
    }

    fn fail_connection(&self, message: &str) {
        self.mutate(|pane| {
            pane.loading = false;
            pane.error = Some(message.to_string());
            if let Some(connection) = &mut pane.connection {
                connection.status = ConnectionStatus::Error;
                connection.last_error = Some(message.to_string());
            }
        });
    }

    fn pane_id(&self) -> String {
        self.state.read().id.clone()
    }
}
