//! Backend abstraction
//!
//! The native SSH/SFTP/filesystem service this core calls but does not
//! implement. Everything the panes and the transfer queue do goes through
//! [`FsBackend`]; the shipping client binds this trait to the IPC bridge,
//! tests bind it to [`MemoryBackend`].

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};

use crate::sftp::error::SftpError;
use crate::sftp::path_utils::PathStyle;
use crate::sftp::types::FileEntry;

pub use memory::MemoryBackend;

/// What a pane connects to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum ConnectTarget {
    /// The local filesystem.
    Local,
    /// A configured remote host.
    Host {
        host_id: String,
        label: String,
    },
}

impl ConnectTarget {
    pub fn is_local(&self) -> bool {
        matches!(self, ConnectTarget::Local)
    }

    pub fn label(&self) -> &str {
        match self {
            ConnectTarget::Local => "Local",
            ConnectTarget::Host { label, .. } => label,
        }
    }

    pub fn host_id(&self) -> Option<&str> {
        match self {
            ConnectTarget::Local => None,
            ConnectTarget::Host { host_id, .. } => Some(host_id),
        }
    }
}

/// Opaque handle to a live backend connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BackendHandle(pub String);

impl BackendHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Result of a successful connect call.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub handle: BackendHandle,
    pub home_dir: String,
    pub path_style: PathStyle,
}

/// Native "open with" picker result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationChoice {
    pub path: String,
    pub name: String,
}

/// The backend contract consumed by this core.
///
/// All calls are suspension points; callers never block the event loop.
/// Failures come back as [`SftpError`] and are recovered into pane/queue
/// status fields at the boundary.
#[async_trait]
pub trait FsBackend: Send + Sync {
    /// Open a connection. Safe to call for a target that is already
    /// connected elsewhere; each call yields an independent handle.
    async fn connect(&self, target: &ConnectTarget) -> Result<ConnectionInfo, SftpError>;

    /// Release a handle's resources. Idempotent.
    async fn disconnect(&self, handle: &BackendHandle);

    /// List a directory. Never contains `.` or `..`.
    async fn list_dir(
        &self,
        handle: &BackendHandle,
        path: &str,
    ) -> Result<Vec<FileEntry>, SftpError>;

    /// Stat a single path. `Ok(None)` means the path does not exist.
    async fn stat(
        &self,
        handle: &BackendHandle,
        path: &str,
    ) -> Result<Option<FileEntry>, SftpError>;

    async fn create_dir(&self, handle: &BackendHandle, path: &str) -> Result<(), SftpError>;

    async fn remove_entries(
        &self,
        handle: &BackendHandle,
        paths: &[String],
    ) -> Result<(), SftpError>;

    async fn rename_entry(
        &self,
        handle: &BackendHandle,
        old_path: &str,
        new_path: &str,
    ) -> Result<(), SftpError>;

    /// Apply an octal permission mode.
    async fn set_permissions(
        &self,
        handle: &BackendHandle,
        path: &str,
        mode: u32,
    ) -> Result<(), SftpError>;

    async fn read_text_file(
        &self,
        handle: &BackendHandle,
        path: &str,
    ) -> Result<String, SftpError>;

    async fn write_text_file(
        &self,
        handle: &BackendHandle,
        path: &str,
        content: &str,
    ) -> Result<(), SftpError>;

    /// Copy one file or directory tree between two handles (which may be the
    /// same handle, or belong to different hosts).
    ///
    /// Cumulative transferred byte counts are reported through `progress`;
    /// `cancel` flipping to `true` is an advisory stop request answered with
    /// [`SftpError::TransferCancelled`]. Returns total bytes written.
    async fn transfer(
        &self,
        source: &BackendHandle,
        source_path: &str,
        target: &BackendHandle,
        target_path: &str,
        progress: mpsc::UnboundedSender<u64>,
        cancel: watch::Receiver<bool>,
    ) -> Result<u64, SftpError>;

    /// Request cancellation of an in-flight transfer by the queue's task id.
    /// Advisory; the transfer observes it at its next chunk boundary.
    async fn cancel_transfer(&self, _task_id: &str) -> Result<(), SftpError> {
        Ok(())
    }

    /// Download a remote file to a temp location and open it with the default
    /// or a specific external application.
    async fn download_to_temp_and_open(
        &self,
        handle: &BackendHandle,
        path: &str,
        suggested_name: &str,
        external_app: Option<&str>,
    ) -> Result<(), SftpError>;

    /// Native file picker for "open with". `Ok(None)` when the user cancels.
    async fn select_application(&self) -> Result<Option<ApplicationChoice>, SftpError>;
}
