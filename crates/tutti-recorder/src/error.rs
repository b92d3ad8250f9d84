//! Error types for capture sessions.

use crate::session::RecordingState;
use thiserror::Error;

/// An operation was invoked from a state that does not allow it.
///
/// Returned synchronously; nothing changes when it is raised.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Cannot {operation} a recorder that is {state}")]
pub struct StateError {
    pub operation: &'static str,
    pub state: RecordingState,
}

impl StateError {
    pub fn new(operation: &'static str, state: RecordingState) -> Self {
        Self { operation, state }
    }
}

/// The capture input became unusable during a session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// Tracks were added to or removed from the input mid-session.
    #[error("The tracks of the input changed while recording")]
    TracksChanged,

    #[error("Audio device not found: {0}")]
    NotFound(String),

    #[error("Audio device error: {0}")]
    Stream(String),
}

/// Error type.
#[derive(Error, Debug)]
pub enum RecorderError {
    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("Encoder call failed: {0}")]
    Rpc(#[from] tutti_rpc::RpcError),

    #[error("Unsupported MIME type: {0}")]
    UnsupportedMimeType(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    /// A realm answered with a reply that does not match the call.
    #[error("Unexpected reply to {0}")]
    UnexpectedReply(&'static str),

    /// `start` was called outside a tokio runtime.
    #[error("No async runtime available: {0}")]
    Runtime(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Hound error: {0}")]
    HoundError(#[from] hound::Error),
}

/// Result type.
pub type Result<T> = std::result::Result<T, RecorderError>;
