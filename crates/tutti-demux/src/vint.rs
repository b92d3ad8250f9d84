//! Variable-length integers as used for element ids and sizes.

use crate::error::{FormatError, Result};
use crate::view::CrossBufferView;

/// Widest vint that fits in a `u64`.
pub const MAX_VINT_WIDTH: usize = 8;

/// A decoded variable-length integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vint {
    /// Encoded width in bytes.
    pub width: usize,
    /// All bytes including the length marker, big-endian.
    pub raw: u64,
    /// Value with the length marker masked out.
    pub value: u64,
}

impl Vint {
    /// Whether every value bit is set, the reserved "unknown size" form.
    pub fn is_unknown(&self) -> bool {
        self.value == max_value(self.width)
    }
}

/// Width implied by the leading zero bits of `first`.
///
/// Returns `None` for a zero octet: the width then continues into the
/// following octet.
pub fn width_from_first_octet(first: u8) -> Option<usize> {
    if first == 0 {
        None
    } else {
        Some(first.leading_zeros() as usize + 1)
    }
}

/// Decode the width of the vint at `offset`, or `None` if the view ends first.
pub fn read_width(view: &CrossBufferView, offset: usize) -> Option<usize> {
    let mut width = 0;
    let mut cursor = offset;
    loop {
        let octet = view.get_u8(cursor).ok()?;
        match width_from_first_octet(octet) {
            Some(w) => return Some(width + w),
            None => {
                width += MAX_VINT_WIDTH;
                cursor += 1;
            }
        }
    }
}

/// Decode the vint at `offset`.
///
/// `Ok(None)` means the view does not yet hold the whole integer.
pub fn read_vint(view: &CrossBufferView, offset: usize) -> Result<Option<Vint>> {
    // A zero first octet already implies more than eight bytes.
    if matches!(view.get_u8(offset), Ok(0)) {
        let width = read_width(view, offset).unwrap_or(MAX_VINT_WIDTH + 1);
        return Err(FormatError::VintTooWide { offset, width });
    }
    let Some(width) = read_width(view, offset) else {
        return Ok(None);
    };
    if width > MAX_VINT_WIDTH {
        return Err(FormatError::VintTooWide { offset, width });
    }
    if offset + width > view.len() {
        return Ok(None);
    }

    let mut raw = 0u64;
    for i in 0..width {
        raw = (raw << 8) | u64::from(view.get_u8(offset + i)?);
    }

    Ok(Some(Vint {
        width,
        raw,
        value: raw & max_value(width),
    }))
}

/// Largest value representable in `width` bytes.
pub(crate) fn max_value(width: usize) -> u64 {
    (1u64 << (7 * width)) - 1
}

/// Smallest width that encodes `value` without colliding with the unknown-size form.
pub fn size_width(value: u64) -> usize {
    (1..=MAX_VINT_WIDTH)
        .find(|&w| value < max_value(w))
        .unwrap_or(MAX_VINT_WIDTH)
}

/// Encode `value` as a size vint of minimal width.
pub fn encode_size(value: u64, out: &mut Vec<u8>) {
    let width = size_width(value);
    let marked = value | (1u64 << (7 * width));
    out.extend_from_slice(&marked.to_be_bytes()[8 - width..]);
}

/// The 8-byte "unknown size" marker.
pub const UNKNOWN_SIZE: [u8; 8] = [0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];

/// Encode an element id, which already carries its length marker.
pub fn encode_id(id: u64, out: &mut Vec<u8>) {
    let width = (8 - (id.leading_zeros() as usize / 8)).max(1);
    out.extend_from_slice(&id.to_be_bytes()[8 - width..]);
}
