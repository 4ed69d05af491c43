//! SFTP browser error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SftpError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Connection lost")]
    Disconnected,

    #[error("No such path: {0}")]
    NoSuchPath(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Operation failed: {0}")]
    OperationFailed(String),

    #[error("Transfer failed: {0}")]
    TransferError(String),

    #[error("Transfer cancelled")]
    TransferCancelled,

    #[error("Transfer not found: {0}")]
    TransferNotFound(String),

    #[error("Tab not found: {0}")]
    TabNotFound(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl SftpError {
    /// True for failures worth retrying silently (connection drops, IO hiccups).
    pub fn is_connection_loss(&self) -> bool {
        matches!(self, SftpError::Disconnected | SftpError::IoError(_))
    }
}

// Make SftpError serializable for the UI bridge
impl serde::Serialize for SftpError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
