//! Error types for the chat capture sink.

use thiserror::Error;

/// Errors that can occur while recording captured events.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("unknown log: {0}")]
    UnknownLog(String),
}

/// Convenience result type for sink operations.
pub type SinkResult<T> = Result<T, SinkError>;
