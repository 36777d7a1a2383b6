//! Generic get/set/address-of over big-endian 32-bit words.
//!
//! Every accessor takes the [`StructLayout`] the field belongs to and a
//! buffer whose start is that layout's base. Offsets and widths come from
//! validated schema data, so the arithmetic here never checks them again.
//! Touching a field that lies past the end of the buffer is a caller bug
//! and panics.
//!
//! # Example
//!
//! ```
//! use mlx5_rscdump::layout::{self, Field, StructLayout};
//!
//! const SEQ: Field = Field::scalar("seq_num", 12, 4);
//! const HDR: StructLayout = StructLayout::new("hdr", 32, &[SEQ]);
//!
//! let mut buf = [0u8; 4];
//! layout::set(&HDR, &SEQ, &mut buf, 0xA);
//! assert_eq!(buf, [0x00, 0x0A, 0x00, 0x00]);
//! assert_eq!(layout::get(&HDR, &SEQ, &buf), 0xA);
//! ```

use super::{Field, FieldKind, StructLayout};

#[inline]
fn dw_index(field: &Field) -> usize {
    4 * (field.bit_offset / 32)
}

/// Left shift that places the field's low bit inside its word.
#[inline]
fn dw_shift(field: &Field) -> u32 {
    (32 - field.bit_width - field.bit_offset % 32) as u32
}

#[inline]
fn mask(width: usize) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

#[inline]
fn check_span(layout: &StructLayout, field: &Field, buf_len: usize) {
    let end_byte = field.end().div_ceil(8);
    assert!(
        end_byte <= buf_len,
        "{}.{}: field ends at byte {} but buffer holds {} bytes",
        layout.name,
        field.name,
        end_byte,
        buf_len
    );
}

#[inline]
fn read_be32(buf: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

#[inline]
fn write_be32(buf: &mut [u8], at: usize, value: u32) {
    buf[at..at + 4].copy_from_slice(&value.to_be_bytes());
}

/// Read an unsigned scalar field.
///
/// Widths up to 32 are extracted from their containing word; a 64-bit field
/// is two consecutive words read as one big-endian value.
pub fn get(layout: &StructLayout, field: &Field, buf: &[u8]) -> u64 {
    check_span(layout, field, buf.len());
    let at = dw_index(field);

    if field.bit_width == 64 {
        let hi = read_be32(buf, at) as u64;
        let lo = read_be32(buf, at + 4) as u64;
        return (hi << 32) | lo;
    }

    let word = read_be32(buf, at) as u64;
    (word >> dw_shift(field)) & mask(field.bit_width)
}

/// Write an unsigned scalar field, leaving every other bit of the word intact.
///
/// `value` is truncated to the field width.
pub fn set(layout: &StructLayout, field: &Field, buf: &mut [u8], value: u64) {
    check_span(layout, field, buf.len());
    let at = dw_index(field);

    if field.bit_width == 64 {
        write_be32(buf, at, (value >> 32) as u32);
        write_be32(buf, at + 4, value as u32);
        return;
    }

    let shift = dw_shift(field);
    let field_mask = (mask(field.bit_width) as u32) << shift;
    let word = read_be32(buf, at);
    let updated = (word & !field_mask) | (((value as u32) << shift) & field_mask);
    write_be32(buf, at, updated);
}

#[inline]
fn byte_span(layout: &StructLayout, field: &Field, buf_len: usize) -> (usize, usize) {
    assert!(
        field.bit_offset % 8 == 0,
        "{}.{}: address of a field at bit {} is not byte addressable",
        layout.name,
        field.name,
        field.bit_offset
    );
    check_span(layout, field, buf_len);
    let start = field.byte_offset();
    let end = match field.kind {
        FieldKind::Array { count: 0, .. } => buf_len,
        _ => start + field.bit_width / 8,
    };
    (start, end)
}

/// Byte slice covering a byte-aligned field.
///
/// For a nested struct this is the base of the sub-layout; for a flexible
/// trailing array it runs to the end of `buf`.
pub fn addr_of<'a>(layout: &StructLayout, field: &Field, buf: &'a [u8]) -> &'a [u8] {
    let (start, end) = byte_span(layout, field, buf.len());
    &buf[start..end]
}

/// Mutable counterpart of [`addr_of`].
pub fn addr_of_mut<'a>(layout: &StructLayout, field: &Field, buf: &'a mut [u8]) -> &'a mut [u8] {
    let (start, end) = byte_span(layout, field, buf.len());
    &mut buf[start..end]
}

#[inline]
fn element_span(layout: &StructLayout, field: &Field, buf_len: usize, index: usize) -> (usize, usize) {
    let FieldKind::Array { element, count } = field.kind else {
        panic!("{}.{}: not an array field", layout.name, field.name);
    };
    assert!(
        count == 0 || index < count,
        "{}.{}: index {} out of {} elements",
        layout.name,
        field.name,
        index,
        count
    );
    let stride = element.size_bytes();
    let start = field.byte_offset() + index * stride;
    let end = start + stride;
    assert!(
        end <= buf_len,
        "{}.{}[{}]: element ends at byte {} but buffer holds {} bytes",
        layout.name,
        field.name,
        index,
        end,
        buf_len
    );
    (start, end)
}

/// Base of element `index` of an array field: `base + index * stride`.
pub fn element<'a>(layout: &StructLayout, field: &Field, buf: &'a [u8], index: usize) -> &'a [u8] {
    let (start, end) = element_span(layout, field, buf.len(), index);
    &buf[start..end]
}

/// Mutable counterpart of [`element`].
pub fn element_mut<'a>(
    layout: &StructLayout,
    field: &Field,
    buf: &'a mut [u8],
    index: usize,
) -> &'a mut [u8] {
    let (start, end) = element_span(layout, field, buf.len(), index);
    &mut buf[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const WIDE: StructLayout = StructLayout::new("wide", 256, &[]);

    const REC: StructLayout = StructLayout::new("rec", 64, &[Field::scalar("id", 0, 32)]);
    const ID: Field = Field::scalar("id", 0, 32);
    const RECS: Field = Field::array("recs", 32, &REC, 3);
    const TAIL: Field = Field::array("tail", 64, &REC, 0);
    const HOLDER: StructLayout = StructLayout::new("holder", 256, &[RECS]);
    const FLEX: StructLayout = StructLayout::new("flex", 64, &[TAIL]);

    #[test]
    fn test_get_matches_prm_example() {
        // more_dump:1 inline_dump:1 reserved:10 seq_num:4 segment_type:16
        let buf = [0b1100_0000, 0x03, 0xFF, 0xFF];
        let more = Field::scalar("more_dump", 0, 1);
        let inline = Field::scalar("inline_dump", 1, 1);
        let seq = Field::scalar("seq_num", 12, 4);
        let seg = Field::scalar("segment_type", 16, 16);
        assert_eq!(get(&WIDE, &more, &buf), 1);
        assert_eq!(get(&WIDE, &inline, &buf), 1);
        assert_eq!(get(&WIDE, &seq, &buf), 3);
        assert_eq!(get(&WIDE, &seg, &buf), 0xFFFF);
    }

    #[test]
    fn test_set_preserves_neighbours() {
        let mut buf = [0xFFu8; 4];
        let seq = Field::scalar("seq_num", 12, 4);
        set(&WIDE, &seq, &mut buf, 0);
        assert_eq!(buf, [0xFF, 0xF0, 0xFF, 0xFF]);
    }

    #[test]
    fn test_set_truncates_to_width() {
        let mut buf = [0u8; 4];
        let nibble = Field::scalar("nibble", 28, 4);
        set(&WIDE, &nibble, &mut buf, 0x1F);
        assert_eq!(buf, [0, 0, 0, 0x0F]);
    }

    #[test]
    fn test_64_bit_field_is_two_words() {
        let mut buf = [0u8; 16];
        let opaque = Field::scalar("device_opaque", 64, 64);
        set(&WIDE, &opaque, &mut buf, 0x0102_0304_0506_0708);
        assert_eq!(&buf[8..16], &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(get(&WIDE, &opaque, &buf), 0x0102_0304_0506_0708);
        assert_eq!(&buf[..8], &[0u8; 8]);
    }

    #[test]
    fn test_addr_of_and_elements() {
        let mut buf = vec![0u8; HOLDER.size_bytes()];
        for i in 0..3 {
            let rec = element_mut(&HOLDER, &RECS, &mut buf, i);
            set(&REC, &ID, rec, 100 + i as u64);
        }
        assert_eq!(addr_of(&HOLDER, &RECS, &buf).len(), 24);
        assert_eq!(&buf[4..8], &100u32.to_be_bytes());
        assert_eq!(get(&REC, &ID, element(&HOLDER, &RECS, &buf, 2)), 102);
    }

    #[test]
    fn test_flexible_array_runs_to_end() {
        let mut buf = vec![0u8; 8 + 3 * 8];
        set(&REC, &ID, element_mut(&FLEX, &TAIL, &mut buf, 2), 7);
        assert_eq!(addr_of(&FLEX, &TAIL, &buf).len(), 24);
        assert_eq!(get(&REC, &ID, element(&FLEX, &TAIL, &buf, 2)), 7);
    }

    #[test]
    #[should_panic(expected = "buffer holds 4 bytes")]
    fn test_field_past_buffer_panics() {
        let buf = [0u8; 4];
        get(&WIDE, &Field::scalar("x", 32, 8), &buf);
    }

    #[test]
    #[should_panic(expected = "out of 3 elements")]
    fn test_element_out_of_range_panics() {
        let buf = vec![0u8; HOLDER.size_bytes()];
        element(&HOLDER, &RECS, &buf, 3);
    }

    /// Any valid (offset, width) for a field inside a 256-bit buffer.
    fn arb_field() -> impl Strategy<Value = Field> {
        let narrow = (0usize..8, 1usize..=32).prop_flat_map(|(word, width)| {
            (0..=(32 - width)).prop_map(move |bit| Field::scalar("f", word * 32 + bit, width))
        });
        let wide = (0usize..4).prop_map(|qw| Field::scalar("f", qw * 64, 64));
        prop_oneof![4 => narrow, 1 => wide]
    }

    proptest! {
        #[test]
        fn set_then_get_returns_value(
            field in arb_field(),
            raw in any::<u64>(),
            fill in proptest::collection::vec(any::<u8>(), 32),
        ) {
            let value = raw & mask(field.bit_width);
            let mut buf = fill.clone();
            set(&WIDE, &field, &mut buf, value);
            prop_assert_eq!(get(&WIDE, &field, &buf), value);
        }

        #[test]
        fn set_leaves_other_bits_untouched(
            field in arb_field(),
            raw in any::<u64>(),
            fill in proptest::collection::vec(any::<u8>(), 32),
        ) {
            let mut buf = fill.clone();
            set(&WIDE, &field, &mut buf, raw);

            for bit in 0..256 {
                if bit >= field.bit_offset && bit < field.end() {
                    continue;
                }
                let (byte, shift) = (bit / 8, 7 - bit % 8);
                prop_assert_eq!(
                    (buf[byte] >> shift) & 1,
                    (fill[byte] >> shift) & 1,
                    "bit {} changed", bit
                );
            }
        }
    }
}
