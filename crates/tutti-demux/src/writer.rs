//! Writes element streams the [`Demuxer`](crate::Demuxer) can read back.

use crate::block::END_OF_STREAM;
use crate::scanner::ids;
use crate::vint::{encode_id, encode_size, UNKNOWN_SIZE};
use bytes::Bytes;

/// Append-only builder for container bytes.
#[derive(Debug, Default, Clone)]
pub struct ElementWriter {
    buf: Vec<u8>,
}

impl ElementWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Write the stream header with the given document type.
    pub fn ebml_header(&mut self, doc_type: &str) -> &mut Self {
        let mut body = ElementWriter::new();
        body.uint(ids::EBML_VERSION, 1);
        body.element(ids::DOC_TYPE, doc_type.as_bytes());
        self.element(ids::EBML, &body.buf)
    }

    /// Open a container. `None` writes the unknown-size form used for live
    /// streams whose length is not known up front.
    pub fn start_master(&mut self, id: u64, size: Option<u64>) -> &mut Self {
        encode_id(id, &mut self.buf);
        match size {
            Some(size) => encode_size(size, &mut self.buf),
            None => self.buf.extend_from_slice(&UNKNOWN_SIZE),
        }
        self
    }

    /// Write a complete element.
    pub fn element(&mut self, id: u64, payload: &[u8]) -> &mut Self {
        encode_id(id, &mut self.buf);
        encode_size(payload.len() as u64, &mut self.buf);
        self.buf.extend_from_slice(payload);
        self
    }

    /// Write an unsigned integer element using the fewest bytes.
    pub fn uint(&mut self, id: u64, value: u64) -> &mut Self {
        let bytes = value.to_be_bytes();
        let skip = (value.leading_zeros() as usize / 8).min(7);
        self.element(id, &bytes[skip..])
    }

    /// Write a sample block of interleaved samples.
    pub fn simple_block(&mut self, interleaved: &[f32], end_of_stream: bool) -> &mut Self {
        let mut payload = Vec::with_capacity(1 + interleaved.len() * 4);
        payload.push(if end_of_stream { END_OF_STREAM } else { 0 });
        for sample in interleaved {
            payload.extend_from_slice(&sample.to_le_bytes());
        }
        self.element(ids::SIMPLE_BLOCK, &payload)
    }

    /// Take the bytes written so far, leaving the writer empty.
    pub fn take(&mut self) -> Bytes {
        Bytes::from(std::mem::take(&mut self.buf))
    }

    pub fn into_bytes(self) -> Bytes {
        Bytes::from(self.buf)
    }
}
