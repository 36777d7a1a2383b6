//! Declarative PRM field layouts.
//!
//! A [`StructLayout`] mirrors one `mlx5_ifc_*_bits` structure of the
//! programmer's reference manual: an ordered list of [`Field`]s, each a
//! `(bit_offset, bit_width)` span inside a buffer of big-endian 32-bit words.
//! Layouts are `const` data; the generic accessors in [`bits`] interpret them.
//!
//! ```text
//! bit 0                              bit 31
//! ┌─┬─┬──────────┬────┬────────────────┐
//! │M│I│ reserved │seq │  segment_type  │  word 0
//! └─┴─┴──────────┴────┴────────────────┘
//!  more_dump (offset 0, width 1) ... segment_type (offset 16, width 16)
//! ```
//!
//! Layouts are validated once, when first used (see [`prm::ensure_valid`]),
//! so an accessor never has to re-check widths or alignment.

pub mod bits;
pub mod prm;

use crate::error::SchemaError;

pub use bits::{addr_of, addr_of_mut, element, element_mut, get, set};

/// What a field's bit span holds.
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    /// Unsigned integer of 1..=32 bits, or exactly 64 bits.
    Scalar,
    /// Opaque byte-aligned blob (fixed strings, reserved areas, inline data).
    Bytes,
    /// Nested structure.
    Struct(&'static StructLayout),
    /// Fixed array of a sub-layout. `count == 0` is a flexible trailing array.
    Array {
        element: &'static StructLayout,
        count: usize,
    },
}

/// One named bit span within a [`StructLayout`].
#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub bit_offset: usize,
    pub bit_width: usize,
    pub kind: FieldKind,
}

impl Field {
    /// Unsigned integer field.
    pub const fn scalar(name: &'static str, bit_offset: usize, bit_width: usize) -> Self {
        Self {
            name,
            bit_offset,
            bit_width,
            kind: FieldKind::Scalar,
        }
    }

    /// Opaque byte blob.
    pub const fn bytes(name: &'static str, bit_offset: usize, bit_width: usize) -> Self {
        Self {
            name,
            bit_offset,
            bit_width,
            kind: FieldKind::Bytes,
        }
    }

    /// Nested structure occupying exactly `layout.size_bits`.
    pub const fn nested(name: &'static str, bit_offset: usize, layout: &'static StructLayout) -> Self {
        Self {
            name,
            bit_offset,
            bit_width: layout.size_bits,
            kind: FieldKind::Struct(layout),
        }
    }

    /// Array of `count` elements, or a flexible trailing array when `count == 0`.
    pub const fn array(
        name: &'static str,
        bit_offset: usize,
        element: &'static StructLayout,
        count: usize,
    ) -> Self {
        Self {
            name,
            bit_offset,
            bit_width: element.size_bits * count,
            kind: FieldKind::Array { element, count },
        }
    }

    /// First bit after the field.
    #[inline]
    pub const fn end(&self) -> usize {
        self.bit_offset + self.bit_width
    }

    /// Byte offset of a byte-aligned field.
    #[inline]
    pub const fn byte_offset(&self) -> usize {
        self.bit_offset / 8
    }

    fn validate_in(&self, layout: &StructLayout) -> Result<(), SchemaError> {
        let (layout_name, field) = (layout.name, self.name);

        match self.kind {
            FieldKind::Scalar => match self.bit_width {
                1..=32 => {
                    if self.bit_offset % 32 + self.bit_width > 32 {
                        return Err(SchemaError::StraddlesWord {
                            layout: layout_name,
                            field,
                            offset: self.bit_offset,
                            width: self.bit_width,
                        });
                    }
                }
                64 => {
                    if self.bit_offset % 64 != 0 {
                        return Err(SchemaError::Misaligned64 {
                            layout: layout_name,
                            field,
                            offset: self.bit_offset,
                        });
                    }
                }
                width => {
                    return Err(SchemaError::UnsupportedWidth {
                        layout: layout_name,
                        field,
                        width,
                    })
                }
            },
            FieldKind::Bytes => {
                if self.bit_offset % 8 != 0 {
                    return Err(SchemaError::Misaligned {
                        layout: layout_name,
                        field,
                        offset: self.bit_offset,
                        required: 8,
                    });
                }
                if self.bit_width == 0 || self.bit_width % 8 != 0 {
                    return Err(SchemaError::UnsupportedWidth {
                        layout: layout_name,
                        field,
                        width: self.bit_width,
                    });
                }
            }
            FieldKind::Struct(nested) => {
                self.require_word_aligned(layout_name)?;
                if self.bit_width != nested.size_bits {
                    return Err(SchemaError::NestedSize {
                        layout: layout_name,
                        field,
                        width: self.bit_width,
                        expected: nested.size_bits,
                    });
                }
                nested.validate()?;
            }
            FieldKind::Array { element, count } => {
                self.require_word_aligned(layout_name)?;
                if self.bit_width != element.size_bits * count {
                    return Err(SchemaError::NestedSize {
                        layout: layout_name,
                        field,
                        width: self.bit_width,
                        expected: element.size_bits * count,
                    });
                }
                // Flexible arrays hang off the end of the fixed part.
                if count == 0 && self.bit_offset != layout.size_bits {
                    return Err(SchemaError::OutOfBounds {
                        layout: layout_name,
                        field,
                        end: self.bit_offset,
                        size_bits: layout.size_bits,
                    });
                }
                element.validate()?;
            }
        }

        if self.end() > layout.size_bits {
            return Err(SchemaError::OutOfBounds {
                layout: layout_name,
                field,
                end: self.end(),
                size_bits: layout.size_bits,
            });
        }

        Ok(())
    }

    fn require_word_aligned(&self, layout: &'static str) -> Result<(), SchemaError> {
        if self.bit_offset % 32 != 0 {
            return Err(SchemaError::Misaligned {
                layout,
                field: self.name,
                offset: self.bit_offset,
                required: 32,
            });
        }
        Ok(())
    }
}

/// An ordered set of fields with a fixed total size.
#[derive(Debug, Clone, Copy)]
pub struct StructLayout {
    pub name: &'static str,
    pub size_bits: usize,
    pub fields: &'static [Field],
}

impl StructLayout {
    pub const fn new(name: &'static str, size_bits: usize, fields: &'static [Field]) -> Self {
        Self {
            name,
            size_bits,
            fields,
        }
    }

    /// Size of the fixed part in bytes.
    #[inline]
    pub const fn size_bytes(&self) -> usize {
        self.size_bits / 8
    }

    /// Size of the fixed part in 32-bit words.
    #[inline]
    pub const fn size_dw(&self) -> usize {
        self.size_bits / 32
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&'static Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Check every field (recursively) against the codec's constraints.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.size_bits % 32 != 0 {
            return Err(SchemaError::LayoutSize {
                layout: self.name,
                size_bits: self.size_bits,
            });
        }
        self.fields.iter().try_for_each(|f| f.validate_in(self))
    }
}

/// `(name, value)` of every scalar field, in layout order.
///
/// Used for trace-level dumps of request/response registers.
pub fn describe(layout: &StructLayout, buf: &[u8]) -> Vec<(&'static str, u64)> {
    layout
        .fields
        .iter()
        .filter(|f| matches!(f.kind, FieldKind::Scalar) && !f.name.starts_with("reserved"))
        .map(|f| (f.name, get(layout, f, buf)))
        .collect()
}
