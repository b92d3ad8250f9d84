//! Sample blocks decoded from binary element payloads.

use crate::error::{FormatError, Result};
use crate::view::{CrossBufferView, Endian};

/// Control byte marking the final block of a stream.
pub const END_OF_STREAM: u8 = 128;

/// Sample value that marks the final block when every sample carries it.
pub const END_OF_STREAM_SAMPLE: f32 = 128.0;

/// Per-channel samples decoded from one binary element.
///
/// The payload is one control byte followed by little-endian `f32` samples
/// interleaved by channel.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBlock {
    channels: Vec<Vec<f32>>,
    end_of_stream: bool,
}

impl SampleBlock {
    pub fn new(channels: Vec<Vec<f32>>, end_of_stream: bool) -> Self {
        Self {
            channels,
            end_of_stream,
        }
    }

    /// Deinterleave a payload view into `channel_count` channels.
    pub fn decode(payload: &CrossBufferView, channel_count: usize) -> Result<Self> {
        if channel_count == 0 {
            return Err(FormatError::InvalidChannelCount(channel_count));
        }
        if payload.is_empty() {
            return Err(FormatError::MissingControlByte);
        }

        let control = payload.get_u8(0)?;
        let sample_bytes = payload.len() - 1;
        let stride = channel_count * 4;
        if sample_bytes % stride != 0 {
            return Err(FormatError::ChannelMismatch {
                len: sample_bytes,
                channels: channel_count,
            });
        }

        let frames = sample_bytes / stride;
        let mut channels = vec![Vec::with_capacity(frames); channel_count];
        for i in 0..frames * channel_count {
            let sample = payload.get_f32(1 + i * 4, Endian::Little)?;
            channels[i % channel_count].push(sample);
        }

        let sentinel_samples = frames > 0
            && channels
                .iter()
                .flatten()
                .all(|sample| *sample == END_OF_STREAM_SAMPLE);

        Ok(Self {
            channels,
            end_of_stream: control == END_OF_STREAM || sentinel_samples,
        })
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Samples per channel.
    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    pub fn into_channels(self) -> Vec<Vec<f32>> {
        self.channels
    }

    pub fn is_end_of_stream(&self) -> bool {
        self.end_of_stream
    }
}
