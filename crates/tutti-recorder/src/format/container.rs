//! Live element-stream encoder.

use super::{interleave, Encoder, EncoderFactory};
use crate::error::{RecorderError, Result};
use bytes::Bytes;
use tutti_demux::scanner::ids;
use tutti_demux::ElementWriter;

pub const CONTAINER_MIME_TYPE: &str = "audio/x-tutti-pcm";

const DOC_TYPE: &str = "tutti-pcm";

#[derive(Debug, Clone, Copy, Default)]
pub struct ContainerEncoderFactory;

impl EncoderFactory for ContainerEncoderFactory {
    fn mime_type(&self) -> &str {
        CONTAINER_MIME_TYPE
    }

    fn create(&self, sample_rate: u32, channels: u16) -> Result<Box<dyn Encoder>> {
        Ok(Box::new(ContainerEncoder::new(sample_rate, channels)?))
    }
}

/// Writes a live stream of sample blocks.
///
/// The segment and cluster have unknown size so output can be emitted at any
/// time; the stream ends with an end-of-stream block.
#[derive(Debug)]
pub struct ContainerEncoder {
    channels: u16,
    writer: ElementWriter,
    blocks: u64,
}

impl ContainerEncoder {
    pub fn new(sample_rate: u32, channels: u16) -> Result<Self> {
        if channels == 0 {
            return Err(RecorderError::Encoding(
                "Container streams need at least one channel".into(),
            ));
        }

        let mut audio = ElementWriter::new();
        audio
            .element(ids::SAMPLING_FREQUENCY, &(sample_rate as f64).to_be_bytes())
            .uint(ids::CHANNELS, channels as u64);
        let mut track = ElementWriter::new();
        track.element(ids::AUDIO, &audio.into_bytes());
        let mut tracks = ElementWriter::new();
        tracks.element(ids::TRACK_ENTRY, &track.into_bytes());

        let mut writer = ElementWriter::new();
        writer
            .ebml_header(DOC_TYPE)
            .start_master(ids::SEGMENT, None)
            .element(ids::TRACKS, &tracks.into_bytes())
            .start_master(ids::CLUSTER, None)
            .uint(ids::TIMECODE, 0);

        Ok(Self {
            channels,
            writer,
            blocks: 0,
        })
    }

    pub fn blocks_written(&self) -> u64 {
        self.blocks
    }
}

impl Encoder for ContainerEncoder {
    fn push_frames(&mut self, channels: &[Vec<f32>]) -> Result<()> {
        let interleaved = interleave(channels, self.channels as usize);
        if interleaved.is_empty() {
            return Ok(());
        }
        self.writer.simple_block(&interleaved, false);
        self.blocks += 1;
        Ok(())
    }

    fn flush_partial(&mut self) -> Result<Vec<Bytes>> {
        if self.writer.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![self.writer.take()])
    }

    fn finish(mut self: Box<Self>) -> Result<Vec<Bytes>> {
        self.writer.simple_block(&[], true);
        tracing::debug!(blocks = self.blocks, "container encoder finished");
        Ok(vec![self.writer.take()])
    }
}
