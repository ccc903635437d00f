use std::path::PathBuf;

use thiserror::Error;

use crate::model::NoteId;

/// Failures reported by (or while talking to) the audio engine.
///
/// These never interrupt editing. The note store logs them and keeps its
/// local mirror; see [`crate::store::FailurePolicy`] for what happens next.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("engine rejected request: {0}")]
    Rejected(String),
    #[error("engine request queue is full")]
    QueueFull,
    #[error("engine disconnected")]
    Disconnected,
    #[error("engine does not know note {0}")]
    UnknownNote(NoteId),
}

impl EngineError {
    pub fn rejected(message: impl Into<String>) -> Self {
        EngineError::Rejected(message.into())
    }
}

/// Errors produced while loading or validating an [`crate::config::EditorConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{} is not a valid editor config", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}
