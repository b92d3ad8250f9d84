//! WAV encoder using hound

use super::{interleave, Encoder, EncoderFactory};
use crate::error::{RecorderError, Result};
use bytes::Bytes;
use hound::{SampleFormat, WavSpec, WavWriter};
use std::io::Cursor;

pub const WAV_MIME_TYPE: &str = "audio/wav";

/// Size value written into RIFF and data headers of a stream whose length is
/// not known yet.
const OPEN_SIZE: [u8; 4] = [0xFF; 4];

#[derive(Debug, Clone, Copy, Default)]
pub struct WavEncoderFactory;

impl EncoderFactory for WavEncoderFactory {
    fn mime_type(&self) -> &str {
        WAV_MIME_TYPE
    }

    fn create(&self, sample_rate: u32, channels: u16) -> Result<Box<dyn Encoder>> {
        Ok(Box::new(WavEncoder::new(sample_rate, channels)?))
    }
}

/// 16-bit PCM WAV.
///
/// Without partial output the whole file is written by hound at `finish`.
/// Once `flush_partial` has been called the output becomes a stream: a
/// header with open sizes followed by raw sample data.
#[derive(Debug)]
pub struct WavEncoder {
    spec: WavSpec,
    pending: Vec<i16>,
    streaming: bool,
}

impl WavEncoder {
    pub fn new(sample_rate: u32, channels: u16) -> Result<Self> {
        if channels == 0 || sample_rate == 0 {
            return Err(RecorderError::Encoding(format!(
                "Invalid WAV layout: {channels} channels at {sample_rate} Hz"
            )));
        }
        Ok(Self {
            spec: WavSpec {
                channels,
                sample_rate,
                bits_per_sample: 16,
                sample_format: SampleFormat::Int,
            },
            pending: Vec::new(),
            streaming: false,
        })
    }

    pub fn spec(&self) -> WavSpec {
        self.spec
    }

    /// Frames waiting to be emitted.
    pub fn pending_frames(&self) -> usize {
        self.pending.len() / self.spec.channels as usize
    }

    fn stream_header(&self) -> Result<Vec<u8>> {
        let mut header = self.write_file(&[])?;
        header[4..8].copy_from_slice(&OPEN_SIZE);
        if let Some(position) = header[12..].windows(4).position(|id| id == b"data") {
            let size_at = 12 + position + 4;
            header[size_at..size_at + 4].copy_from_slice(&OPEN_SIZE);
        }
        Ok(header)
    }

    fn write_file(&self, samples: &[i16]) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        {
            let mut writer = WavWriter::new(Cursor::new(&mut buffer), self.spec)?;
            for &sample in samples {
                writer.write_sample(sample)?;
            }
            writer.finalize()?;
        }
        Ok(buffer)
    }

    fn take_pcm(&mut self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.pending.len() * 2);
        for sample in self.pending.drain(..) {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        bytes
    }
}

impl Encoder for WavEncoder {
    fn push_frames(&mut self, channels: &[Vec<f32>]) -> Result<()> {
        let interleaved = interleave(channels, self.spec.channels as usize);
        self.pending
            .extend(interleaved.into_iter().map(float_to_i16));
        Ok(())
    }

    fn flush_partial(&mut self) -> Result<Vec<Bytes>> {
        let mut parts = Vec::with_capacity(2);
        if !self.streaming {
            self.streaming = true;
            parts.push(Bytes::from(self.stream_header()?));
        }
        let pcm = self.take_pcm();
        if !pcm.is_empty() {
            parts.push(Bytes::from(pcm));
        }
        Ok(parts)
    }

    fn finish(mut self: Box<Self>) -> Result<Vec<Bytes>> {
        if self.streaming {
            let pcm = self.take_pcm();
            return Ok(if pcm.is_empty() {
                Vec::new()
            } else {
                vec![Bytes::from(pcm)]
            });
        }
        let file = self.write_file(&self.pending)?;
        tracing::debug!(
            frames = self.pending_frames(),
            bytes = file.len(),
            "wav encoder finished"
        );
        Ok(vec![Bytes::from(file)])
    }
}

/// Convert float sample to 16-bit integer with clipping
#[inline]
fn float_to_i16(sample: f32) -> i16 {
    let clamped = sample.clamp(-1.0, 1.0);
    (clamped * 32767.0) as i16
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::WavReader;

    fn concat(parts: &[Bytes]) -> Vec<u8> {
        parts.iter().flat_map(|part| part.iter().copied()).collect()
    }

    #[test]
    fn test_single_shot_file() {
        let mut encoder = Box::new(WavEncoder::new(48000, 2).unwrap());
        encoder
            .push_frames(&[vec![0.5, -1.0], vec![-0.5, 2.0]])
            .unwrap();
        assert_eq!(encoder.pending_frames(), 2);

        let parts = encoder.finish().unwrap();
        assert_eq!(parts.len(), 1);

        let reader = WavReader::new(Cursor::new(concat(&parts))).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.spec().sample_rate, 48000);
        let samples: Vec<i16> = reader.into_samples().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![16383, -16383, -32767, 32767]);
    }

    #[test]
    fn test_empty_file_is_valid() {
        let encoder = Box::new(WavEncoder::new(44100, 1).unwrap());
        let parts = encoder.finish().unwrap();
        let reader = WavReader::new(Cursor::new(concat(&parts))).unwrap();
        assert_eq!(reader.len(), 0);
    }

    #[test]
    fn test_streaming_output() {
        let mut encoder = Box::new(WavEncoder::new(8000, 1).unwrap());
        encoder.push_frames(&[vec![0.0, 1.0]]).unwrap();

        let first = encoder.flush_partial().unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(&first[0][..4], b"RIFF");
        assert_eq!(&first[0][4..8], &OPEN_SIZE);
        assert_eq!(&first[0][first[0].len() - 4..], &OPEN_SIZE);
        assert_eq!(first[1].as_ref(), &[0, 0, 0xFF, 0x7F]);

        assert!(encoder.flush_partial().unwrap().is_empty());

        encoder.push_frames(&[vec![-1.0]]).unwrap();
        let last = encoder.finish().unwrap();
        assert_eq!(concat(&last), vec![0x01, 0x80]);
    }

    #[test]
    fn test_rejects_zero_channels() {
        assert!(WavEncoder::new(44100, 0).is_err());
    }
}
