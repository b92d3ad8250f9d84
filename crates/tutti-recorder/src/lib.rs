//! # Tutti Recorder
//!
//! Capture sessions with a start/pause/resume/stop surface.
//!
//! Three realms cooperate and share nothing but message ports:
//! - the caller, which owns a [`RecorderSession`]
//! - the render realm, a thread that pulls fixed quanta from a
//!   [`MediaInput`] through a [`CaptureNode`]
//! - the encoder broker, a thread running the encoders, reached only over
//!   [`tutti_rpc`] channels
//!
//! Both realm threads belong to a [`RecorderHost`], spawned on first use and
//! shut down when the last session lets go of them.
//!
//! ```ignore
//! use tutti_recorder::{MediaInput, RecorderConfig, RecorderEvent, RecorderHost, RecorderSession};
//!
//! let host = RecorderHost::default();
//! let input = MediaInput::new(48000, 2);
//! let session = RecorderSession::new(host, input.clone(), RecorderConfig::default())?;
//! let mut events = session.events().unwrap();
//!
//! session.start(None)?;
//! input.push(vec![vec![0.0; 128]; 2]);
//! session.stop()?;
//!
//! while let Some(event) = events.recv().await {
//!     if let RecorderEvent::DataAvailable(blob) = &event {
//!         std::fs::write("take.wav", blob.to_vec())?;
//!     }
//! }
//! ```

pub mod broker;
pub mod config;
#[cfg(feature = "cpal-input")]
pub mod device;
pub mod error;
pub mod events;
pub mod format;
pub mod host;
pub mod input;
pub mod render;
pub mod session;

pub use broker::{BrokerPort, BrokerReply, BrokerRequest, EncoderFrame, FramePort};
pub use config::{
    HostConfig, RecorderConfig, RecorderConfigBuilder, DEFAULT_CHANNEL_COUNT, MIN_WARM_UP_FRAMES,
    RENDER_QUANTUM,
};
#[cfg(feature = "cpal-input")]
pub use device::CpalInput;
pub use error::{DeviceError, RecorderError, Result, StateError};
pub use events::{Blob, RecorderEvent};
pub use format::{
    ContainerEncoder, ContainerEncoderFactory, Encoder, EncoderFactory, EncoderRegistry,
    WavEncoder, WavEncoderFactory, CONTAINER_MIME_TYPE, WAV_MIME_TYPE,
};
pub use host::{BrokerChannel, HostLease, RecorderHost};
pub use input::{deinterleave, AudioBlock, MediaInput, TrackId, TrackInfo};
pub use render::{CaptureNode, NodeId, NodeRequest, NodeState, RenderContext, RenderHandle};
pub use session::{RecorderSession, RecordingState, SessionId};
