//! Events emitted by a recorder session.

use crate::error::RecorderError;
use bytes::Bytes;

/// Encoded output delivered by one `DataAvailable` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub parts: Vec<Bytes>,
    pub mime_type: String,
}

impl Blob {
    pub fn new(parts: Vec<Bytes>, mime_type: impl Into<String>) -> Self {
        Self {
            parts,
            mime_type: mime_type.into(),
        }
    }

    /// Total byte length.
    pub fn size(&self) -> usize {
        self.parts.iter().map(Bytes::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Concatenate the parts.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.size());
        for part in &self.parts {
            bytes.extend_from_slice(part);
        }
        bytes
    }
}

#[derive(Debug)]
pub enum RecorderEvent {
    Start,
    Pause,
    Resume,
    DataAvailable(Blob),
    /// The session ended cleanly.
    Stop,
    /// The session ended because of an error; no `Stop` follows.
    Error(RecorderError),
}

impl RecorderEvent {
    /// Lower-case event name.
    pub fn name(&self) -> &'static str {
        match self {
            RecorderEvent::Start => "start",
            RecorderEvent::Pause => "pause",
            RecorderEvent::Resume => "resume",
            RecorderEvent::DataAvailable(_) => "dataavailable",
            RecorderEvent::Stop => "stop",
            RecorderEvent::Error(_) => "error",
        }
    }
}
