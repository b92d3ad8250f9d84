//! Read-only cursor over an ordered list of byte fragments.
//!
//! A [`CrossBufferView`] addresses a virtual contiguous window that may span
//! several independently received [`Fragment`]s. Nothing is copied until a
//! value is materialized: single-byte reads resolve against the owning
//! fragment, multi-byte reads that straddle a boundary are reassembled into a
//! small scratch array first.

use crate::error::BoundsError;
use bytes::Bytes;
use std::sync::Arc;

/// One immutable buffer received from the stream, tagged with its global offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    bytes: Bytes,
    offset: u64,
}

impl Fragment {
    pub fn new(bytes: impl Into<Bytes>, offset: u64) -> Self {
        Self {
            bytes: bytes.into(),
            offset,
        }
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// Global offset of the first byte.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Global offset one past the last byte.
    pub fn end(&self) -> u64 {
        self.offset + self.bytes.len() as u64
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Byte order for multi-byte reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endian {
    #[default]
    Big,
    Little,
}

/// A window over a shared, ordered list of fragments.
///
/// Slicing produces a new view over the same fragments; the underlying
/// buffers are reference counted and never copied.
#[derive(Debug, Clone)]
pub struct CrossBufferView {
    fragments: Arc<[Fragment]>,
    /// Offset of the window start, counted from the first fragment's first byte.
    byte_offset: usize,
    byte_length: usize,
}

macro_rules! impl_read {
    ($($name:ident => $ty:ty, $size:literal),* $(,)?) => {
        $(
            #[doc = concat!("Read a `", stringify!($ty), "` at `offset`.")]
            pub fn $name(&self, offset: usize, endian: Endian) -> Result<$ty, BoundsError> {
                let bytes = self.read_array::<$size>(offset)?;
                Ok(match endian {
                    Endian::Big => <$ty>::from_be_bytes(bytes),
                    Endian::Little => <$ty>::from_le_bytes(bytes),
                })
            }
        )*
    };
}

impl CrossBufferView {
    /// Create a view over `fragments` starting `byte_offset` bytes in.
    ///
    /// `byte_length` defaults to the rest of the data.
    pub fn new(
        fragments: impl Into<Arc<[Fragment]>>,
        byte_offset: usize,
        byte_length: Option<usize>,
    ) -> Result<Self, BoundsError> {
        let fragments = fragments.into();
        debug_assert!(
            fragments.windows(2).all(|w| w[0].end() == w[1].offset()),
            "fragments must be contiguous"
        );

        let total: usize = fragments.iter().map(Fragment::len).sum();
        let available = total.saturating_sub(byte_offset);
        let byte_length = byte_length.unwrap_or(available);

        if byte_offset > total || byte_length > available {
            return Err(BoundsError {
                offset: byte_offset,
                len: byte_length,
                available: total,
            });
        }

        Ok(Self {
            fragments,
            byte_offset,
            byte_length,
        })
    }

    /// An empty view with no fragments.
    pub fn empty() -> Self {
        Self {
            fragments: Arc::from(Vec::new()),
            byte_offset: 0,
            byte_length: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.byte_length
    }

    pub fn is_empty(&self) -> bool {
        self.byte_length == 0
    }

    pub fn byte_offset(&self) -> usize {
        self.byte_offset
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    /// Global stream offset of the window start.
    pub fn global_offset(&self) -> u64 {
        self.fragments
            .first()
            .map_or(0, |f| f.offset() + self.byte_offset as u64)
    }

    /// A new view sharing the same fragments with the window narrowed to
    /// `[begin, begin + length)`. `length` defaults to the rest of this view.
    pub fn slice(&self, begin: usize, length: Option<usize>) -> Result<Self, BoundsError> {
        let rest = self.byte_length.checked_sub(begin).ok_or(BoundsError {
            offset: begin,
            len: length.unwrap_or(0),
            available: self.byte_length,
        })?;
        let length = length.unwrap_or(rest);
        if length > rest {
            return Err(BoundsError {
                offset: begin,
                len: length,
                available: self.byte_length,
            });
        }

        Ok(Self {
            fragments: Arc::clone(&self.fragments),
            byte_offset: self.byte_offset + begin,
            byte_length: length,
        })
    }

    /// Drop fragments lying entirely before the window.
    pub fn trimmed(&self) -> Self {
        let mut skipped = 0;
        let mut first = 0;
        for fragment in self.fragments.iter() {
            if skipped + fragment.len() > self.byte_offset {
                break;
            }
            skipped += fragment.len();
            first += 1;
        }

        if first == 0 {
            return self.clone();
        }

        Self {
            fragments: Arc::from(&self.fragments[first..]),
            byte_offset: self.byte_offset - skipped,
            byte_length: self.byte_length,
        }
    }

    /// A view covering this window followed by `fragment`.
    pub fn append(&self, fragment: Fragment) -> Self {
        let trimmed = self.trimmed();
        let mut fragments = trimmed.fragments.to_vec();
        let extra = fragment.len();
        fragments.push(fragment);

        Self {
            fragments: Arc::from(fragments),
            byte_offset: trimmed.byte_offset,
            byte_length: trimmed.byte_length + extra,
        }
    }

    pub fn get_u8(&self, offset: usize) -> Result<u8, BoundsError> {
        self.check(offset, 1)?;
        let (index, local) = self.locate(offset).ok_or(BoundsError {
            offset,
            len: 1,
            available: self.byte_length,
        })?;
        Ok(self.fragments[index].bytes[local])
    }

    pub fn get_i8(&self, offset: usize) -> Result<i8, BoundsError> {
        self.get_u8(offset).map(|b| b as i8)
    }

    impl_read! {
        get_u16 => u16, 2,
        get_i16 => i16, 2,
        get_u32 => u32, 4,
        get_i32 => i32, 4,
        get_u64 => u64, 8,
        get_i64 => i64, 8,
        get_f32 => f32, 4,
        get_f64 => f64, 8,
    }

    /// Copy `dst.len()` bytes starting at `offset` into `dst`.
    pub fn copy_to_slice(&self, offset: usize, dst: &mut [u8]) -> Result<(), BoundsError> {
        self.check(offset, dst.len())?;
        let mut written = 0;
        while written < dst.len() {
            let (index, local) = self.locate(offset + written).ok_or(BoundsError {
                offset,
                len: dst.len(),
                available: self.byte_length,
            })?;
            let src = &self.fragments[index].bytes[local..];
            let n = src.len().min(dst.len() - written);
            dst[written..written + n].copy_from_slice(&src[..n]);
            written += n;
        }
        Ok(())
    }

    pub fn to_vec(&self, offset: usize, len: usize) -> Result<Vec<u8>, BoundsError> {
        let mut out = vec![0u8; len];
        self.copy_to_slice(offset, &mut out)?;
        Ok(out)
    }

    fn read_array<const N: usize>(&self, offset: usize) -> Result<[u8; N], BoundsError> {
        self.check(offset, N)?;
        let (index, local) = self.locate(offset).ok_or(BoundsError {
            offset,
            len: N,
            available: self.byte_length,
        })?;

        let mut scratch = [0u8; N];
        let fragment = &self.fragments[index].bytes;
        if local + N <= fragment.len() {
            scratch.copy_from_slice(&fragment[local..local + N]);
        } else {
            for (i, byte) in scratch.iter_mut().enumerate() {
                *byte = self.get_u8(offset + i)?;
            }
        }
        Ok(scratch)
    }

    fn check(&self, offset: usize, len: usize) -> Result<(), BoundsError> {
        match offset.checked_add(len) {
            Some(end) if end <= self.byte_length => Ok(()),
            _ => Err(BoundsError {
                offset,
                len,
                available: self.byte_length,
            }),
        }
    }

    /// Linear scan for the fragment holding view offset `offset`.
    fn locate(&self, offset: usize) -> Option<(usize, usize)> {
        let mut position = self.byte_offset + offset;
        for (index, fragment) in self.fragments.iter().enumerate() {
            if position < fragment.len() {
                return Some((index, position));
            }
            position -= fragment.len();
        }
        None
    }
}

impl Default for CrossBufferView {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragments(parts: &[&[u8]]) -> Vec<Fragment> {
        let mut offset = 0;
        parts
            .iter()
            .map(|part| {
                let fragment = Fragment::new(part.to_vec(), offset);
                offset += part.len() as u64;
                fragment
            })
            .collect()
    }

    #[test]
    fn test_single_byte_reads_span_fragments() {
        let view = CrossBufferView::new(fragments(&[&[1, 2], &[3], &[4, 5]]), 0, None).unwrap();
        assert_eq!(view.len(), 5);
        let bytes: Vec<u8> = (0..5).map(|i| view.get_u8(i).unwrap()).collect();
        assert_eq!(bytes, vec![1, 2, 3, 4, 5]);
        assert_eq!(view.get_i8(0).unwrap(), 1);
    }

    #[test]
    fn test_multi_byte_read_straddles_boundary() {
        let view =
            CrossBufferView::new(fragments(&[&[0x12], &[0x34, 0x56], &[0x78]]), 0, None).unwrap();
        assert_eq!(view.get_u32(0, Endian::Big).unwrap(), 0x1234_5678);
        assert_eq!(view.get_u32(0, Endian::Little).unwrap(), 0x7856_3412);
        assert_eq!(view.get_u16(1, Endian::Big).unwrap(), 0x3456);
    }

    #[test]
    fn test_float_read_across_fragments() {
        let bytes = 0.25f32.to_le_bytes();
        let view =
            CrossBufferView::new(fragments(&[&bytes[..1], &bytes[1..3], &bytes[3..]]), 0, None)
                .unwrap();
        assert_eq!(view.get_f32(0, Endian::Little).unwrap(), 0.25);

        let wide = (-1.5f64).to_be_bytes();
        let view = CrossBufferView::new(fragments(&[&wide[..5], &wide[5..]]), 0, None).unwrap();
        assert_eq!(view.get_f64(0, Endian::Big).unwrap(), -1.5);
    }

    #[test]
    fn test_read_past_end_is_bounds_error() {
        let view = CrossBufferView::new(fragments(&[&[1, 2, 3]]), 0, None).unwrap();
        let err = view.get_u32(0, Endian::Big).unwrap_err();
        assert_eq!(err.len, 4);
        assert_eq!(err.available, 3);
        assert!(view.get_u8(3).is_err());
        assert!(view.get_u16(usize::MAX, Endian::Big).is_err());
    }

    #[test]
    fn test_constructor_rejects_out_of_range_window() {
        assert!(CrossBufferView::new(fragments(&[&[1, 2]]), 3, None).is_err());
        assert!(CrossBufferView::new(fragments(&[&[1, 2]]), 1, Some(2)).is_err());
        let view = CrossBufferView::new(fragments(&[&[1, 2]]), 2, None).unwrap();
        assert!(view.is_empty());
    }

    #[test]
    fn test_slice_shares_fragments() {
        let view = CrossBufferView::new(fragments(&[&[1, 2, 3], &[4, 5, 6]]), 1, None).unwrap();
        let slice = view.slice(1, Some(3)).unwrap();
        assert_eq!(slice.len(), 3);
        assert_eq!(slice.to_vec(0, 3).unwrap(), vec![3, 4, 5]);
        assert!(Arc::ptr_eq(&view.fragments, &slice.fragments));
        assert!(view.slice(4, Some(2)).is_err());
        assert!(view.slice(6, None).is_err());
    }

    #[test]
    fn test_trimmed_drops_consumed_fragments() {
        let view = CrossBufferView::new(fragments(&[&[1, 2], &[3, 4], &[5]]), 0, None).unwrap();
        let rest = view.slice(3, None).unwrap().trimmed();
        assert_eq!(rest.fragments().len(), 2);
        assert_eq!(rest.byte_offset(), 1);
        assert_eq!(rest.global_offset(), 3);
        assert_eq!(rest.to_vec(0, 2).unwrap(), vec![4, 5]);
    }

    #[test]
    fn test_append_extends_window() {
        let view = CrossBufferView::new(fragments(&[&[1, 2]]), 0, None).unwrap();
        let view = view.slice(2, None).unwrap().append(Fragment::new(vec![9, 8], 2));
        assert_eq!(view.len(), 2);
        assert_eq!(view.fragments().len(), 1);
        assert_eq!(view.get_u16(0, Endian::Big).unwrap(), 0x0908);
    }
}
