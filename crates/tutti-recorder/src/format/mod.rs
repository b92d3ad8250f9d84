//! Encoders and the MIME type registry.
//!
//! - `wav`: 16-bit PCM WAV via hound
//! - `container`: the element stream read by `tutti_demux::Demuxer`

mod container;
mod wav;

pub use container::{ContainerEncoder, ContainerEncoderFactory, CONTAINER_MIME_TYPE};
pub use wav::{WavEncoder, WavEncoderFactory, WAV_MIME_TYPE};

use crate::error::Result;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Turns planar sample frames into encoded bytes.
pub trait Encoder: Send {
    /// Append one block of per-channel samples.
    fn push_frames(&mut self, channels: &[Vec<f32>]) -> Result<()>;

    /// Everything encoded since the previous call. The output so far,
    /// concatenated, must be a valid prefix of the final stream.
    fn flush_partial(&mut self) -> Result<Vec<Bytes>>;

    /// Finalize and return the remaining output.
    fn finish(self: Box<Self>) -> Result<Vec<Bytes>>;
}

/// Creates encoders for one MIME type.
pub trait EncoderFactory: Send + Sync {
    fn mime_type(&self) -> &str;

    fn create(&self, sample_rate: u32, channels: u16) -> Result<Box<dyn Encoder>>;
}

/// MIME type to encoder factory table.
///
/// Append-only: factories are registered while building a host and never
/// removed.
#[derive(Clone)]
pub struct EncoderRegistry {
    factories: BTreeMap<String, Arc<dyn EncoderFactory>>,
}

impl Default for EncoderRegistry {
    /// Registry with the built-in encoders.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(WavEncoderFactory);
        registry.register(ContainerEncoderFactory);
        registry
    }
}

impl EncoderRegistry {
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Returns `false` if the MIME type was already registered; the first
    /// registration wins.
    pub fn register(&mut self, factory: impl EncoderFactory + 'static) -> bool {
        let mime_type = normalize(factory.mime_type());
        if self.factories.contains_key(&mime_type) {
            return false;
        }
        self.factories.insert(mime_type, Arc::new(factory));
        true
    }

    /// Matches on the essence only, so `audio/wav; codecs=1` finds `audio/wav`.
    pub fn get(&self, mime_type: &str) -> Option<&Arc<dyn EncoderFactory>> {
        self.factories.get(&normalize(mime_type))
    }

    pub fn supports(&self, mime_type: &str) -> bool {
        self.get(mime_type).is_some()
    }

    pub fn mime_types(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for EncoderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncoderRegistry")
            .field("mime_types", &self.mime_types())
            .finish()
    }
}

fn normalize(mime_type: &str) -> String {
    mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Interleave planar channels, padding short channels with silence.
pub(crate) fn interleave(channels: &[Vec<f32>], channel_count: usize) -> Vec<f32> {
    let frames = channels.iter().map(Vec::len).max().unwrap_or(0);
    let mut interleaved = Vec::with_capacity(frames * channel_count);
    for frame in 0..frames {
        for channel in 0..channel_count {
            let sample = channels
                .get(channel)
                .and_then(|samples| samples.get(frame))
                .copied()
                .unwrap_or(0.0);
            interleaved.push(sample);
        }
    }
    interleaved
}
