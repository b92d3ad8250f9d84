//! Streaming demuxer that turns container fragments into sample blocks.

use crate::block::SampleBlock;
use crate::error::{FormatError, Result};
use crate::scanner::{ElementHeader, ElementKind, ElementScanner, Scan};
use crate::view::{CrossBufferView, Fragment};
use bytes::Bytes;

/// Incrementally demuxes a chunked container stream.
///
/// Bytes may arrive in arbitrarily sized pieces. Each [`push`](Self::push)
/// appends a fragment and yields every [`SampleBlock`] that became complete.
/// A header whose payload has not fully arrived is remembered so the next
/// push only has to check the available length.
///
/// # Example
///
/// ```ignore
/// let mut demuxer = Demuxer::new(2)?;
/// for chunk in encoded_chunks {
///     for block in demuxer.push(chunk) {
///         sink.write(block.channel(0).unwrap_or_default());
///     }
/// }
/// ```
#[derive(Debug)]
pub struct Demuxer {
    channel_count: usize,
    scanner: ElementScanner,
    remainder: CrossBufferView,
    current: Option<ElementHeader>,
    received: u64,
    error: Option<FormatError>,
}

impl Demuxer {
    pub fn new(channel_count: usize) -> Result<Self> {
        Self::with_scanner(channel_count, ElementScanner::default())
    }

    pub fn with_scanner(channel_count: usize, scanner: ElementScanner) -> Result<Self> {
        if channel_count == 0 {
            return Err(FormatError::InvalidChannelCount(channel_count));
        }

        Ok(Self {
            channel_count,
            scanner,
            remainder: CrossBufferView::empty(),
            current: None,
            received: 0,
            error: None,
        })
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// Append `bytes` and decode lazily.
    ///
    /// The returned iterator decodes one block per `next()`. Dropping it early
    /// leaves undecoded bytes in the remainder for the following call.
    pub fn push(&mut self, bytes: impl Into<Bytes>) -> Blocks<'_> {
        let bytes = bytes.into();
        if self.error.is_none() && !bytes.is_empty() {
            let len = bytes.len() as u64;
            self.remainder = self.remainder.append(Fragment::new(bytes, self.received));
            self.received += len;
        }
        Blocks { demuxer: self }
    }

    /// Unconsumed bytes carried into the next call.
    pub fn remainder(&self) -> &CrossBufferView {
        &self.remainder
    }

    /// Header decoded on a previous call whose payload is still incomplete.
    pub fn pending_element(&self) -> Option<&ElementHeader> {
        self.current.as_ref()
    }

    /// The error that stopped decoding, if any.
    pub fn last_error(&self) -> Option<&FormatError> {
        self.error.as_ref()
    }

    pub fn bytes_received(&self) -> u64 {
        self.received
    }

    /// Forget all buffered state and any prior error.
    pub fn reset(&mut self) {
        self.remainder = CrossBufferView::empty();
        self.current = None;
        self.received = 0;
        self.error = None;
    }

    fn next_block(&mut self) -> Option<SampleBlock> {
        if self.error.is_some() {
            return None;
        }

        loop {
            if let Some(pending) = &self.current {
                if (self.remainder.len() as u64) < pending.consumed() {
                    return None;
                }
            }

            match self.step() {
                Ok(Step::Block(block)) => return Some(block),
                Ok(Step::Skipped) => continue,
                Ok(Step::NeedMoreData) => return None,
                Err(err) => {
                    tracing::warn!(
                        offset = self.remainder.global_offset(),
                        discarded = self.remainder.len(),
                        "Discarding malformed container tail: {err}"
                    );
                    self.remainder = CrossBufferView::empty();
                    self.current = None;
                    self.error = Some(err);
                    return None;
                }
            }
        }
    }

    fn step(&mut self) -> Result<Step> {
        let header = match self.scanner.next(&self.remainder, 0)? {
            Scan::NeedMoreData(header) => {
                self.current = header;
                return Ok(Step::NeedMoreData);
            }
            Scan::Element(header) => header,
        };
        self.current = None;

        let step = match header.kind {
            ElementKind::Binary => {
                let payload = self.remainder.slice(
                    header.header_length,
                    header.payload_length.map(|len| len as usize),
                )?;
                Step::Block(SampleBlock::decode(&payload, self.channel_count)?)
            }
            ElementKind::Master | ElementKind::Unknown => Step::Skipped,
        };

        self.remainder = self
            .remainder
            .slice(header.consumed() as usize, None)?
            .trimmed();
        Ok(step)
    }
}

enum Step {
    Block(SampleBlock),
    Skipped,
    NeedMoreData,
}

/// Blocks decoded by one [`Demuxer::push`] call.
pub struct Blocks<'a> {
    demuxer: &'a mut Demuxer,
}

impl Iterator for Blocks<'_> {
    type Item = SampleBlock;

    fn next(&mut self) -> Option<SampleBlock> {
        self.demuxer.next_block()
    }
}
