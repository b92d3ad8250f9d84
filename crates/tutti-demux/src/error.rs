//! Error types for container demuxing.

use thiserror::Error;

/// A read addressed bytes outside the view's window.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("read of {len} bytes at offset {offset} exceeds view length {available}")]
pub struct BoundsError {
    pub offset: usize,
    pub len: usize,
    pub available: usize,
}

/// Container bytes that violate the element grammar.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("variable-length integer at offset {offset} is {width} bytes wide (max 8)")]
    VintTooWide { offset: usize, width: usize },

    #[error("element {id:#x} has an unknown size but is not a container")]
    UnknownSize { id: u64 },

    #[error("element {id:#x} declares {size} bytes, above the {limit} byte limit")]
    Oversized { id: u64, size: u64, limit: u64 },

    #[error("binary element has no control byte")]
    MissingControlByte,

    #[error("payload of {len} sample bytes does not split into {channels} channels")]
    ChannelMismatch { len: usize, channels: usize },

    #[error("invalid channel count: {0}")]
    InvalidChannelCount(usize),

    #[error(transparent)]
    Bounds(#[from] BoundsError),
}

pub type Result<T> = std::result::Result<T, FormatError>;
