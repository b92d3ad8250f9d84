//! Incremental element header decoding.

use crate::error::{FormatError, Result};
use crate::view::CrossBufferView;
use crate::vint::read_vint;

/// Element ids recognized by the scanner (length marker included).
pub mod ids {
    pub const EBML: u64 = 0x1A45_DFA3;
    pub const SEGMENT: u64 = 0x1853_8067;
    pub const INFO: u64 = 0x1549_A966;
    pub const TRACKS: u64 = 0x1654_AE6B;
    pub const TRACK_ENTRY: u64 = 0xAE;
    pub const AUDIO: u64 = 0xE1;
    pub const CLUSTER: u64 = 0x1F43_B675;
    pub const SIMPLE_BLOCK: u64 = 0xA3;

    // Leaf elements written by the encoder and skipped on read.
    pub const EBML_VERSION: u64 = 0x4286;
    pub const DOC_TYPE: u64 = 0x4282;
    pub const TIMECODE: u64 = 0xE7;
    pub const CHANNELS: u64 = 0x9F;
    pub const SAMPLING_FREQUENCY: u64 = 0xB5;
}

/// Default upper bound for skipping unknown elements.
pub const DEFAULT_MAX_SKIP: u64 = 16 * 1024 * 1024;

/// How an element's payload is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// Pure nesting marker, contributes no payload bytes itself.
    Master,
    /// Carries interleaved sample data.
    Binary,
    /// Skipped by its declared size.
    Unknown,
}

/// Classify an element id.
pub fn classify(id: u64) -> ElementKind {
    match id {
        ids::EBML
        | ids::SEGMENT
        | ids::INFO
        | ids::TRACKS
        | ids::TRACK_ENTRY
        | ids::AUDIO
        | ids::CLUSTER => ElementKind::Master,
        ids::SIMPLE_BLOCK => ElementKind::Binary,
        _ => ElementKind::Unknown,
    }
}

/// A decoded element header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementHeader {
    pub id: u64,
    pub kind: ElementKind,
    pub header_length: usize,
    /// Declared payload size. `None` for a master of unknown size.
    pub payload_length: Option<u64>,
}

impl ElementHeader {
    /// Bytes to advance past this element: the header alone for masters,
    /// header plus payload otherwise.
    pub fn consumed(&self) -> u64 {
        match self.kind {
            ElementKind::Master => self.header_length as u64,
            _ => self.header_length as u64 + self.payload_length.unwrap_or(0),
        }
    }
}

/// Result of one scanner step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scan {
    /// A complete element is available.
    Element(ElementHeader),
    /// Not enough bytes yet. Carries the header when it was already decodable.
    NeedMoreData(Option<ElementHeader>),
}

/// Decodes element headers from a [`CrossBufferView`].
#[derive(Debug, Clone, Copy)]
pub struct ElementScanner {
    max_skip: u64,
}

impl Default for ElementScanner {
    fn default() -> Self {
        Self {
            max_skip: DEFAULT_MAX_SKIP,
        }
    }
}

impl ElementScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit the payload size of elements that are not containers.
    pub fn with_max_skip(max_skip: u64) -> Self {
        Self { max_skip }
    }

    pub fn max_skip(&self) -> u64 {
        self.max_skip
    }

    /// Decode the element starting at `offset`.
    ///
    /// Running out of bytes is not an error: the scanner reports
    /// [`Scan::NeedMoreData`] and the caller retries once more data arrived.
    pub fn next(&self, view: &CrossBufferView, offset: usize) -> Result<Scan> {
        let Some(id) = read_vint(view, offset)? else {
            return Ok(Scan::NeedMoreData(None));
        };
        let Some(size) = read_vint(view, offset + id.width)? else {
            return Ok(Scan::NeedMoreData(None));
        };

        let kind = classify(id.raw);
        let header_length = id.width + size.width;

        if kind == ElementKind::Master {
            return Ok(Scan::Element(ElementHeader {
                id: id.raw,
                kind,
                header_length,
                payload_length: (!size.is_unknown()).then_some(size.value),
            }));
        }

        if size.is_unknown() {
            return Err(FormatError::UnknownSize { id: id.raw });
        }
        if size.value > self.max_skip {
            return Err(FormatError::Oversized {
                id: id.raw,
                size: size.value,
                limit: self.max_skip,
            });
        }

        let header = ElementHeader {
            id: id.raw,
            kind,
            header_length,
            payload_length: Some(size.value),
        };
        let available = view.len().saturating_sub(offset) as u64;
        if header.consumed() > available {
            return Ok(Scan::NeedMoreData(Some(header)));
        }

        Ok(Scan::Element(header))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::Fragment;

    fn view(bytes: &[u8]) -> CrossBufferView {
        CrossBufferView::new(vec![Fragment::new(bytes.to_vec(), 0)], 0, None).unwrap()
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(ids::CLUSTER), ElementKind::Master);
        assert_eq!(classify(ids::EBML), ElementKind::Master);
        assert_eq!(classify(ids::SIMPLE_BLOCK), ElementKind::Binary);
        assert_eq!(classify(ids::TIMECODE), ElementKind::Unknown);
    }

    #[test]
    fn test_master_consumes_header_only() {
        let scan = ElementScanner::new()
            .next(&view(&[0x1F, 0x43, 0xB6, 0x75, 0x84, 0, 0, 0, 0]), 0)
            .unwrap();
        let Scan::Element(header) = scan else {
            panic!("expected element, got {scan:?}");
        };
        assert_eq!(header.kind, ElementKind::Master);
        assert_eq!(header.header_length, 5);
        assert_eq!(header.payload_length, Some(4));
        assert_eq!(header.consumed(), 5);
    }

    #[test]
    fn test_master_with_unknown_size() {
        let mut bytes = vec![0x18, 0x53, 0x80, 0x67];
        bytes.extend_from_slice(&crate::vint::UNKNOWN_SIZE);
        let scan = ElementScanner::new().next(&view(&bytes), 0).unwrap();
        let Scan::Element(header) = scan else {
            panic!("expected element, got {scan:?}");
        };
        assert_eq!(header.payload_length, None);
        assert_eq!(header.consumed(), 12);
    }

    #[test]
    fn test_binary_waits_for_payload() {
        let scanner = ElementScanner::new();
        let partial = view(&[0xA3, 0x89, 0, 1, 2, 3, 4]);
        match scanner.next(&partial, 0).unwrap() {
            Scan::NeedMoreData(Some(header)) => {
                assert_eq!(header.kind, ElementKind::Binary);
                assert_eq!(header.consumed(), 11);
            }
            other => panic!("expected NeedMoreData, got {other:?}"),
        }

        let full = view(&[0xA3, 0x89, 0, 1, 2, 3, 4, 5, 6, 7, 8]);
        assert!(matches!(scanner.next(&full, 0).unwrap(), Scan::Element(_)));
    }

    #[test]
    fn test_partial_header_needs_more_data() {
        let scanner = ElementScanner::new();
        assert_eq!(
            scanner.next(&view(&[0x1F, 0x43]), 0).unwrap(),
            Scan::NeedMoreData(None)
        );
        assert_eq!(
            scanner.next(&view(&[0xA3]), 0).unwrap(),
            Scan::NeedMoreData(None)
        );
        assert_eq!(
            scanner.next(&view(&[]), 0).unwrap(),
            Scan::NeedMoreData(None)
        );
    }

    #[test]
    fn test_oversized_unknown_element() {
        let scanner = ElementScanner::with_max_skip(16);
        let err = scanner.next(&view(&[0xEC, 0xA0]), 0).unwrap_err();
        assert_eq!(
            err,
            FormatError::Oversized {
                id: 0xEC,
                size: 32,
                limit: 16
            }
        );
    }

    #[test]
    fn test_unknown_size_leaf_is_malformed() {
        let err = ElementScanner::new().next(&view(&[0xA3, 0xFF]), 0).unwrap_err();
        assert_eq!(err, FormatError::UnknownSize { id: 0xA3 });
    }

    #[test]
    fn test_scans_at_offset() {
        let bytes = [0xEC, 0x81, 0x00, 0xA3, 0x81, 0x80];
        let scan = ElementScanner::new().next(&view(&bytes), 3).unwrap();
        assert!(matches!(
            scan,
            Scan::Element(ElementHeader {
                kind: ElementKind::Binary,
                header_length: 2,
                ..
            })
        ));
    }
}
