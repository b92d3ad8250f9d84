//! Decoding recorded output back into samples.

use crate::error::Result;
use tutti_demux::Demuxer;
use tutti_recorder::{Blob, CONTAINER_MIME_TYPE};

/// Accumulates the samples carried by successive container blobs of one
/// session.
///
/// Blobs must be pushed in the order they were delivered. Decoding stops at
/// the first malformed element; samples decoded before it are kept and the
/// error is returned from that push.
#[derive(Debug)]
pub struct BlobDecoder {
    demuxer: Demuxer,
    channels: Vec<Vec<f32>>,
    ended: bool,
}

impl BlobDecoder {
    pub fn new(channel_count: usize) -> Result<Self> {
        Ok(Self {
            demuxer: Demuxer::new(channel_count)?,
            channels: vec![Vec::new(); channel_count],
            ended: false,
        })
    }

    /// Whether a blob of `mime_type` can be decoded.
    pub fn accepts(mime_type: &str) -> bool {
        mime_type.eq_ignore_ascii_case(CONTAINER_MIME_TYPE)
    }

    /// Decode one blob. Returns the number of frames it added.
    pub fn push(&mut self, blob: &Blob) -> Result<usize> {
        let before = self.frames();
        for part in &blob.parts {
            for block in self.demuxer.push(part.clone()) {
                if block.is_end_of_stream() {
                    self.ended = true;
                    continue;
                }
                for (channel, samples) in self.channels.iter_mut().zip(block.channels()) {
                    channel.extend_from_slice(samples);
                }
            }
        }
        if let Some(err) = self.demuxer.last_error() {
            return Err(err.clone().into());
        }
        Ok(self.frames() - before)
    }

    /// Frames decoded so far.
    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    /// Whether the end-of-stream marker has been seen.
    pub fn is_finished(&self) -> bool {
        self.ended
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    pub fn into_channels(self) -> Vec<Vec<f32>> {
        self.channels
    }
}

/// Decode a complete recording delivered as `blobs`.
pub fn decode_blobs<'a>(
    blobs: impl IntoIterator<Item = &'a Blob>,
    channel_count: usize,
) -> Result<Vec<Vec<f32>>> {
    let mut decoder = BlobDecoder::new(channel_count)?;
    for blob in blobs {
        decoder.push(blob)?;
    }
    Ok(decoder.into_channels())
}
