//! IronPane - dual-pane SFTP browser core
//!
//! The renderer-side state machine of the IronPane SSH client's file
//! browser: per-tab pane state, navigation, selection, a shared background
//! transfer queue with conflict handling, and cross-pane drag coordination.
//! SSH transport, PTY handling, and the SFTP wire protocol live in the
//! native backend consumed through [`backend::FsBackend`].

pub mod backend;
pub mod config;
pub mod sftp;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging for the embedding shell.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
