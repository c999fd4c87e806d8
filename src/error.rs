//! Control-plane error types

use crate::supervisor::ProcessKind;

/// Errors surfaced by configuration handling and process supervision
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    /// Malformed configuration, on disk or in the environment
    #[error("configuration error: {0}")]
    Config(String),

    /// The forwarder never answered its health endpoint in time
    #[error("no response from {url} within {secs}s")]
    StartupTimeout { url: String, secs: u64 },

    /// Invalid command-line usage
    #[error("{0}")]
    Usage(String),

    /// A start request raced with a live process of the same kind
    #[error("{0} is already running")]
    AlreadyRunning(ProcessKind),

    /// The child process could not be launched
    #[error("failed to spawn {kind}: {source}")]
    Spawn {
        kind: ProcessKind,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ControlError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
