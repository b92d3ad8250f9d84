//! # Tutti Capture - Audio Capture and Encoding Pipeline
//!
//! Live capture, isolated encoding, and incremental demuxing built from
//! modular subsystems.
//!
//! ## Architecture
//!
//! Tutti Capture is an umbrella crate that coordinates:
//! - **tutti-recorder** - Capture sessions (render realm, encoder broker, start/pause/resume/stop)
//! - **tutti-rpc** - Correlated calls between realms over message ports
//! - **tutti-demux** - Incremental container demuxing across fragmented buffers
//! - **tutti-automation** - Scheduled parameter automation timelines
//!
//! ## Quick Start
//!
//! ```ignore
//! use tutti_capture::prelude::*;
//!
//! let host = RecorderHost::default();
//! let input = MediaInput::new(48000, 2);
//! let config = RecorderConfig::builder().mime_type(CONTAINER_MIME_TYPE).build();
//! let session = RecorderSession::new(host, input.clone(), config)?;
//! let mut events = session.events().unwrap();
//!
//! session.start(Some(Duration::from_millis(500)))?;
//! // ... feed input ...
//! session.stop()?;
//!
//! let mut decoder = BlobDecoder::new(2)?;
//! while let Some(event) = events.recv().await {
//!     if let RecorderEvent::DataAvailable(blob) = &event {
//!         decoder.push(blob)?;
//!     }
//! }
//! ```
//!
//! ## Feature Flags
//!
//! - `default` - demux, automation, recorder
//! - `demux` - Container demuxing
//! - `automation` - Parameter automation
//! - `rpc` - Realm messaging
//! - `recorder` - Capture sessions (implies `rpc` and `demux`)
//! - `cpal-input` - Hardware capture devices

mod error;
pub use error::{Error, Result};

#[cfg(feature = "demux")]
pub use tutti_demux as demux;

#[cfg(feature = "automation")]
pub use tutti_automation as automation;

#[cfg(feature = "rpc")]
pub use tutti_rpc as rpc;

#[cfg(feature = "recorder")]
pub use tutti_recorder as recorder;

#[cfg(feature = "recorder")]
mod capture;
#[cfg(feature = "recorder")]
pub use capture::{decode_blobs, BlobDecoder};

/// Convenience prelude for common imports
pub mod prelude {
    pub use std::time::Duration;

    // Demuxing
    #[cfg(feature = "demux")]
    pub use crate::demux::{Demuxer, SampleBlock};

    // Automation
    #[cfg(feature = "automation")]
    pub use crate::automation::{
        AutomationEvent, AutomationTimeline, ParamDescriptor, ParamGraph, ParamId,
    };

    // Messaging
    #[cfg(feature = "rpc")]
    pub use crate::rpc::{port_pair, Incoming, Responder, RpcChannel, RpcMethod};

    // Capture
    #[cfg(feature = "recorder")]
    pub use crate::recorder::{
        Blob, MediaInput, RecorderConfig, RecorderEvent, RecorderHost, RecorderSession,
        RecordingState, CONTAINER_MIME_TYPE, WAV_MIME_TYPE,
    };
    #[cfg(feature = "recorder")]
    pub use crate::{decode_blobs, BlobDecoder};

    #[cfg(feature = "cpal-input")]
    pub use crate::recorder::CpalInput;
}
