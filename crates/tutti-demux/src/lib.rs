//! Incremental demuxing of chunked container streams.
//!
//! Encoded capture output arrives as a series of independently received byte
//! buffers. This crate reassembles container elements across those fragments
//! without copying and decodes sample payloads into per-channel arrays.
//!
//! - [`CrossBufferView`] - typed reads over a window spanning many [`Fragment`]s
//! - [`ElementScanner`] - variable-length id/size decoding, `NeedMoreData` when short
//! - [`Demuxer`] - stateful driver yielding [`SampleBlock`]s per pushed fragment
//! - [`ElementWriter`] - the inverse, used by the container encoder
//!
//! # Example
//!
//! ```ignore
//! use tutti_demux::Demuxer;
//!
//! let mut demuxer = Demuxer::new(2)?;
//! let first: Vec<_> = demuxer.push(fragment_a).collect(); // may be empty
//! let more: Vec<_> = demuxer.push(fragment_b).collect();
//! ```

pub mod error;
pub use error::{BoundsError, FormatError, Result};

mod block;
mod demuxer;
pub mod scanner;
mod view;
pub mod vint;
mod writer;

pub use block::{SampleBlock, END_OF_STREAM, END_OF_STREAM_SAMPLE};
pub use demuxer::{Blocks, Demuxer};
pub use scanner::{ElementHeader, ElementKind, ElementScanner, Scan};
pub use view::{CrossBufferView, Endian, Fragment};
pub use writer::ElementWriter;
