//! In-memory backend
//!
//! A complete [`FsBackend`] over an in-memory tree, one filesystem per
//! connect target. The test suite drives every pane/queue path against this
//! implementation; it also backs demo/preview builds of the client where no
//! native bridge is present.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, watch};
use tracing::debug;

use crate::sftp::error::SftpError;
use crate::sftp::path_utils::{file_name, is_root, parent_of, PathStyle};
use crate::sftp::types::{FileEntry, FileType};

use super::{ApplicationChoice, BackendHandle, ConnectTarget, ConnectionInfo, FsBackend};

const TRANSFER_CHUNK: usize = 32 * 1024;

#[derive(Clone)]
enum MemNode {
    Dir { modified: i64, mode: u32 },
    File { data: Vec<u8>, modified: i64, mode: u32 },
}

impl MemNode {
    fn dir() -> Self {
        MemNode::Dir {
            modified: now(),
            mode: 0o755,
        }
    }

    fn file(data: Vec<u8>) -> Self {
        MemNode::File {
            data,
            modified: now(),
            mode: 0o644,
        }
    }

    fn to_entry(&self, name: &str) -> FileEntry {
        match self {
            MemNode::Dir { modified, mode } => {
                FileEntry::new(name, FileType::Directory, 0, *modified)
                    .with_permissions(format!("{:03o}", mode))
            }
            MemNode::File {
                data,
                modified,
                mode,
            } => FileEntry::new(name, FileType::File, data.len() as u64, *modified)
                .with_permissions(format!("{:03o}", mode)),
        }
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// One in-memory filesystem (per connect target).
struct MemFs {
    home: String,
    nodes: RwLock<BTreeMap<String, MemNode>>,
}

impl MemFs {
    fn new(home: &str) -> Self {
        let mut nodes = BTreeMap::new();
        let mut path = home.to_string();
        nodes.insert(path.clone(), MemNode::dir());
        while !is_root(&path, PathStyle::Posix) {
            path = parent_of(&path, PathStyle::Posix);
            nodes.insert(path.clone(), MemNode::dir());
        }
        Self {
            home: home.to_string(),
            nodes: RwLock::new(nodes),
        }
    }

    fn ensure_dir(&self, path: &str) -> Result<(), SftpError> {
        match self.nodes.read().get(path) {
            Some(MemNode::Dir { .. }) => Ok(()),
            Some(_) => Err(SftpError::InvalidPath(format!("not a directory: {}", path))),
            None => Err(SftpError::NoSuchPath(path.to_string())),
        }
    }
}

/// In-memory [`FsBackend`] implementation.
pub struct MemoryBackend {
    filesystems: DashMap<String, Arc<MemFs>>,
    handles: DashMap<String, Arc<MemFs>>,
    failing_hosts: DashMap<String, String>,
    transfer_delay: Mutex<Option<Duration>>,
    opened: Mutex<Vec<(String, Option<String>)>>,
    application: Mutex<Option<ApplicationChoice>>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            filesystems: DashMap::new(),
            handles: DashMap::new(),
            failing_hosts: DashMap::new(),
            transfer_delay: Mutex::new(None),
            opened: Mutex::new(Vec::new()),
            application: Mutex::new(None),
        }
    }

    fn fs_key(target: &ConnectTarget) -> String {
        match target {
            ConnectTarget::Local => "local".to_string(),
            ConnectTarget::Host { host_id, .. } => host_id.clone(),
        }
    }

    fn fs_for_target(&self, target: &ConnectTarget) -> Arc<MemFs> {
        self.filesystems
            .entry(Self::fs_key(target))
            .or_insert_with(|| Arc::new(MemFs::new("/home/user")))
            .clone()
    }

    fn fs_for_handle(&self, handle: &BackendHandle) -> Result<Arc<MemFs>, SftpError> {
        self.handles
            .get(handle.as_str())
            .map(|fs| fs.clone())
            .ok_or(SftpError::Disconnected)
    }

    /// Kill a handle without a disconnect call, as a dropped connection
    /// would; later calls on it report [`SftpError::Disconnected`].
    pub fn drop_handle(&self, handle: &BackendHandle) {
        self.handles.remove(handle.as_str());
    }

    /// Seed a directory (creating missing ancestors) for tests and demos.
    pub fn seed_dir(&self, target: &ConnectTarget, path: &str) {
        let fs = self.fs_for_target(target);
        let mut nodes = fs.nodes.write();
        let mut current = path.to_string();
        loop {
            nodes.entry(current.clone()).or_insert_with(MemNode::dir);
            if is_root(&current, PathStyle::Posix) {
                break;
            }
            current = parent_of(&current, PathStyle::Posix);
        }
    }

    /// Seed a file of `size` zero bytes.
    pub fn seed_file(&self, target: &ConnectTarget, path: &str, size: usize) {
        self.seed_dir(target, &parent_of(path, PathStyle::Posix));
        let fs = self.fs_for_target(target);
        fs.nodes
            .write()
            .insert(path.to_string(), MemNode::file(vec![0u8; size]));
    }

    /// Make connects to `host_id` fail until cleared.
    pub fn set_connect_failure(&self, host_id: &str, message: &str) {
        self.failing_hosts
            .insert(host_id.to_string(), message.to_string());
    }

    pub fn clear_connect_failure(&self, host_id: &str) {
        self.failing_hosts.remove(host_id);
    }

    /// Slow transfers down by sleeping between chunks (cancellation tests).
    pub fn set_transfer_delay(&self, delay: Option<Duration>) {
        *self.transfer_delay.lock() = delay;
    }

    /// Size of the file at `path`, if present.
    pub fn file_size(&self, target: &ConnectTarget, path: &str) -> Option<u64> {
        let fs = self.fs_for_target(target);
        let nodes = fs.nodes.read();
        match nodes.get(path) {
            Some(MemNode::File { data, .. }) => Some(data.len() as u64),
            _ => None,
        }
    }

    /// Whether any node exists at `path`.
    pub fn exists(&self, target: &ConnectTarget, path: &str) -> bool {
        let fs = self.fs_for_target(target);
        let exists = fs.nodes.read().contains_key(path);
        exists
    }

    /// Octal mode of the node at `path`, if present.
    pub fn mode_of(&self, target: &ConnectTarget, path: &str) -> Option<u32> {
        let fs = self.fs_for_target(target);
        let nodes = fs.nodes.read();
        match nodes.get(path) {
            Some(MemNode::File { mode, .. }) | Some(MemNode::Dir { mode, .. }) => Some(*mode),
            None => None,
        }
    }

    /// Files handed to `download_to_temp_and_open`.
    pub fn opened_files(&self) -> Vec<(String, Option<String>)> {
        self.opened.lock().clone()
    }

    /// Preset the answer `select_application` returns.
    pub fn set_application_choice(&self, choice: Option<ApplicationChoice>) {
        *self.application.lock() = choice;
    }

    /// Copy plan for one file: (target path, bytes).
    fn collect_transfer_plan(
        &self,
        source: &Arc<MemFs>,
        source_path: &str,
        target_path: &str,
    ) -> Result<(Vec<String>, Vec<(String, Vec<u8>)>), SftpError> {
        let nodes = source.nodes.read();
        match nodes.get(source_path) {
            None => Err(SftpError::NoSuchPath(source_path.to_string())),
            Some(MemNode::File { data, .. }) => {
                Ok((Vec::new(), vec![(target_path.to_string(), data.clone())]))
            }
            Some(MemNode::Dir { .. }) => {
                let mut dirs = vec![target_path.to_string()];
                let mut files = Vec::new();
                let prefix = format!("{}/", source_path.trim_end_matches('/'));
                for (path, node) in nodes.iter() {
                    let Some(rest) = path.strip_prefix(&prefix) else {
                        continue;
                    };
                    let mapped = format!("{}/{}", target_path.trim_end_matches('/'), rest);
                    match node {
                        MemNode::Dir { .. } => dirs.push(mapped),
                        MemNode::File { data, .. } => files.push((mapped, data.clone())),
                    }
                }
                Ok((dirs, files))
            }
        }
    }
}

#[async_trait]
impl FsBackend for MemoryBackend {
    async fn connect(&self, target: &ConnectTarget) -> Result<ConnectionInfo, SftpError> {
        if let Some(host_id) = target.host_id() {
            if let Some(message) = self.failing_hosts.get(host_id) {
                return Err(SftpError::ConnectionFailed(message.clone()));
            }
        }
        let fs = self.fs_for_target(target);
        let handle = BackendHandle(uuid::Uuid::new_v4().to_string());
        self.handles.insert(handle.0.clone(), fs.clone());
        debug!("memory backend connect {} -> {}", target.label(), handle.0);
        Ok(ConnectionInfo {
            handle,
            home_dir: fs.home.clone(),
            path_style: PathStyle::Posix,
        })
    }

    async fn disconnect(&self, handle: &BackendHandle) {
        self.handles.remove(handle.as_str());
    }

    async fn list_dir(
        &self,
        handle: &BackendHandle,
        path: &str,
    ) -> Result<Vec<FileEntry>, SftpError> {
        let fs = self.fs_for_handle(handle)?;
        fs.ensure_dir(path)?;
        let nodes = fs.nodes.read();
        let entries = nodes
            .iter()
            .filter(|(p, _)| p.as_str() != path && parent_of(p, PathStyle::Posix) == path)
            .map(|(p, node)| node.to_entry(file_name(p)))
            .collect();
        Ok(entries)
    }

    async fn stat(
        &self,
        handle: &BackendHandle,
        path: &str,
    ) -> Result<Option<FileEntry>, SftpError> {
        let fs = self.fs_for_handle(handle)?;
        let nodes = fs.nodes.read();
        Ok(nodes.get(path).map(|node| node.to_entry(file_name(path))))
    }

    async fn create_dir(&self, handle: &BackendHandle, path: &str) -> Result<(), SftpError> {
        let fs = self.fs_for_handle(handle)?;
        fs.ensure_dir(&parent_of(path, PathStyle::Posix))?;
        let mut nodes = fs.nodes.write();
        if nodes.contains_key(path) {
            return Err(SftpError::AlreadyExists(path.to_string()));
        }
        nodes.insert(path.to_string(), MemNode::dir());
        Ok(())
    }

    async fn remove_entries(
        &self,
        handle: &BackendHandle,
        paths: &[String],
    ) -> Result<(), SftpError> {
        let fs = self.fs_for_handle(handle)?;
        let mut nodes = fs.nodes.write();
        for path in paths {
            if nodes.remove(path).is_none() {
                return Err(SftpError::NoSuchPath(path.clone()));
            }
            let prefix = format!("{}/", path.trim_end_matches('/'));
            nodes.retain(|p, _| !p.starts_with(&prefix));
        }
        Ok(())
    }

    async fn rename_entry(
        &self,
        handle: &BackendHandle,
        old_path: &str,
        new_path: &str,
    ) -> Result<(), SftpError> {
        let fs = self.fs_for_handle(handle)?;
        let mut nodes = fs.nodes.write();
        if nodes.contains_key(new_path) {
            return Err(SftpError::AlreadyExists(new_path.to_string()));
        }
        let node = nodes
            .remove(old_path)
            .ok_or_else(|| SftpError::NoSuchPath(old_path.to_string()))?;
        let prefix = format!("{}/", old_path.trim_end_matches('/'));
        let descendants: Vec<String> = nodes
            .keys()
            .filter(|p| p.starts_with(&prefix))
            .cloned()
            .collect();
        for path in descendants {
            if let Some(child) = nodes.remove(&path) {
                let mapped = format!(
                    "{}/{}",
                    new_path.trim_end_matches('/'),
                    &path[prefix.len()..]
                );
                nodes.insert(mapped, child);
            }
        }
        nodes.insert(new_path.to_string(), node);
        Ok(())
    }

    async fn set_permissions(
        &self,
        handle: &BackendHandle,
        path: &str,
        new_mode: u32,
    ) -> Result<(), SftpError> {
        let fs = self.fs_for_handle(handle)?;
        let mut nodes = fs.nodes.write();
        match nodes.get_mut(path) {
            Some(MemNode::File { mode, .. }) | Some(MemNode::Dir { mode, .. }) => {
                *mode = new_mode & 0o777;
                Ok(())
            }
            None => Err(SftpError::NoSuchPath(path.to_string())),
        }
    }

    async fn read_text_file(
        &self,
        handle: &BackendHandle,
        path: &str,
    ) -> Result<String, SftpError> {
        let fs = self.fs_for_handle(handle)?;
        let nodes = fs.nodes.read();
        match nodes.get(path) {
            Some(MemNode::File { data, .. }) => String::from_utf8(data.clone())
                .map_err(|_| SftpError::OperationFailed(format!("not valid UTF-8: {}", path))),
            Some(MemNode::Dir { .. }) => {
                Err(SftpError::InvalidPath(format!("is a directory: {}", path)))
            }
            None => Err(SftpError::NoSuchPath(path.to_string())),
        }
    }

    async fn write_text_file(
        &self,
        handle: &BackendHandle,
        path: &str,
        content: &str,
    ) -> Result<(), SftpError> {
        let fs = self.fs_for_handle(handle)?;
        fs.ensure_dir(&parent_of(path, PathStyle::Posix))?;
        fs.nodes
            .write()
            .insert(path.to_string(), MemNode::file(content.as_bytes().to_vec()));
        Ok(())
    }

    async fn transfer(
        &self,
        source: &BackendHandle,
        source_path: &str,
        target: &BackendHandle,
        target_path: &str,
        progress: mpsc::UnboundedSender<u64>,
        cancel: watch::Receiver<bool>,
    ) -> Result<u64, SftpError> {
        let source_fs = self.fs_for_handle(source)?;
        let target_fs = self.fs_for_handle(target)?;
        let (dirs, files) = self.collect_transfer_plan(&source_fs, source_path, target_path)?;

        {
            let mut nodes = target_fs.nodes.write();
            for dir in &dirs {
                nodes.entry(dir.clone()).or_insert_with(MemNode::dir);
            }
        }

        let delay = *self.transfer_delay.lock();
        let mut total: u64 = 0;
        for (path, data) in files {
            let mut written = 0usize;
            loop {
                if *cancel.borrow() {
                    return Err(SftpError::TransferCancelled);
                }
                if written >= data.len() {
                    break;
                }
                let chunk = (data.len() - written).min(TRANSFER_CHUNK);
                written += chunk;
                total += chunk as u64;
                let _ = progress.send(total);
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                } else {
                    tokio::task::yield_now().await;
                }
            }
            target_fs.nodes.write().insert(path, MemNode::file(data));
        }
        Ok(total)
    }

    async fn download_to_temp_and_open(
        &self,
        handle: &BackendHandle,
        path: &str,
        _suggested_name: &str,
        external_app: Option<&str>,
    ) -> Result<(), SftpError> {
        let fs = self.fs_for_handle(handle)?;
        if !fs.nodes.read().contains_key(path) {
            return Err(SftpError::NoSuchPath(path.to_string()));
        }
        self.opened
            .lock()
            .push((path.to_string(), external_app.map(String::from)));
        Ok(())
    }

    async fn select_application(&self) -> Result<Option<ApplicationChoice>, SftpError> {
        Ok(self.application.lock().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn list_dir_excludes_self_and_reports_children() {
        let backend = MemoryBackend::new();
        let target = ConnectTarget::Local;
        backend.seed_file(&target, "/home/user/a.txt", 10);
        backend.seed_dir(&target, "/home/user/docs");

        let info = backend.connect(&target).await.unwrap();
        let entries = backend.list_dir(&info.handle, "/home/user").await.unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "docs"]);
    }

    #[tokio::test]
    async fn transfer_copies_directory_trees() {
        let backend = MemoryBackend::new();
        let src = ConnectTarget::Local;
        let dst = ConnectTarget::Host {
            host_id: "h1".into(),
            label: "h1".into(),
        };
        backend.seed_file(&src, "/home/user/proj/src/main.rs", 100);
        backend.seed_file(&src, "/home/user/proj/README.md", 50);
        backend.seed_dir(&dst, "/home/user/backup");

        let src_info = backend.connect(&src).await.unwrap();
        let dst_info = backend.connect(&dst).await.unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        let total = backend
            .transfer(
                &src_info.handle,
                "/home/user/proj",
                &dst_info.handle,
                "/home/user/backup/proj",
                tx,
                cancel_rx,
            )
            .await
            .unwrap();

        assert_eq!(total, 150);
        assert_eq!(
            backend.file_size(&dst, "/home/user/backup/proj/src/main.rs"),
            Some(100)
        );
        assert_eq!(
            backend.file_size(&dst, "/home/user/backup/proj/README.md"),
            Some(50)
        );
    }

    #[tokio::test]
    async fn cancelled_transfer_stops_before_writing() {
        let backend = MemoryBackend::new();
        let target = ConnectTarget::Local;
        backend.seed_file(&target, "/home/user/big.bin", 256 * 1024);
        backend.seed_dir(&target, "/home/user/out");

        let info = backend.connect(&target).await.unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let (cancel_tx, cancel_rx) = watch::channel(true);
        let result = backend
            .transfer(
                &info.handle,
                "/home/user/big.bin",
                &info.handle,
                "/home/user/out/big.bin",
                tx,
                cancel_rx,
            )
            .await;
        drop(cancel_tx);

        assert!(matches!(result, Err(SftpError::TransferCancelled)));
        assert!(!backend.exists(&target, "/home/user/out/big.bin"));
    }

    #[tokio::test]
    async fn rename_moves_descendants() {
        let backend = MemoryBackend::new();
        let target = ConnectTarget::Local;
        backend.seed_file(&target, "/home/user/old/data.txt", 5);

        let info = backend.connect(&target).await.unwrap();
        backend
            .rename_entry(&info.handle, "/home/user/old", "/home/user/new")
            .await
            .unwrap();

        assert!(backend.exists(&target, "/home/user/new/data.txt"));
        assert!(!backend.exists(&target, "/home/user/old"));
    }

    #[tokio::test]
    async fn connect_failure_is_reported() {
        let backend = MemoryBackend::new();
        backend.set_connect_failure("h1", "auth failed");
        let target = ConnectTarget::Host {
            host_id: "h1".into(),
            label: "h1".into(),
        };
        let result = backend.connect(&target).await;
        assert!(matches!(result, Err(SftpError::ConnectionFailed(_))));
    }
}
