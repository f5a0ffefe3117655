// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The WebAssembly binary format, to the extent the type system round-trips
//! through it: the module preamble, section framing, and the full GC type
//! section grammar in both directions.

pub mod emit;
pub mod module_parser;
pub mod reader;

pub use emit::emit_type_section;
pub use module_parser::{parse_module, parse_type_section};
pub use reader::BinaryReader;

use core::cmp;

use num_enum::TryFromPrimitive;

/// The module magic, `\0asm`.
pub const MAGIC: [u8; 4] = *b"\0asm";
/// The core module preamble version field.
pub const VERSION_MODULE: [u8; 4] = [0x01, 0x00, 0x00, 0x00];
/// The component-model preamble version/layer field.
pub const VERSION_COMPONENT: [u8; 4] = [0x0D, 0x00, 0x01, 0x00];

// Value type encodings.
pub(crate) const TYPE_I32: u8 = 0x7F;
pub(crate) const TYPE_I64: u8 = 0x7E;
pub(crate) const TYPE_F32: u8 = 0x7D;
pub(crate) const TYPE_F64: u8 = 0x7C;
pub(crate) const TYPE_V128: u8 = 0x7B;
// Packed storage-only codes.
pub(crate) const TYPE_I8: u8 = 0x78;
pub(crate) const TYPE_I16: u8 = 0x77;
// Reference type prefixes.
pub(crate) const TYPE_REF: u8 = 0x64;
pub(crate) const TYPE_REF_NULL: u8 = 0x63;
// Abstract heap type codes.
pub(crate) const HEAP_NOFUNC: u8 = 0x73;
pub(crate) const HEAP_NOEXTERN: u8 = 0x72;
pub(crate) const HEAP_NONE: u8 = 0x71;
pub(crate) const HEAP_FUNC: u8 = 0x70;
pub(crate) const HEAP_EXTERN: u8 = 0x6F;
pub(crate) const HEAP_ANY: u8 = 0x6E;
pub(crate) const HEAP_EQ: u8 = 0x6D;
pub(crate) const HEAP_I31: u8 = 0x6C;
pub(crate) const HEAP_STRUCT: u8 = 0x6B;
pub(crate) const HEAP_ARRAY: u8 = 0x6A;
// Composite type tags.
pub(crate) const COMP_FUNC: u8 = 0x60;
pub(crate) const COMP_STRUCT: u8 = 0x5F;
pub(crate) const COMP_ARRAY: u8 = 0x5E;
// Subtype and recursion-group markers.
pub(crate) const SUB: u8 = 0x50;
pub(crate) const SUB_FINAL: u8 = 0x4F;
pub(crate) const REC: u8 = 0x4E;
// Field mutability.
pub(crate) const MUT_CONST: u8 = 0x00;
pub(crate) const MUT_VAR: u8 = 0x01;

/// Section identifier within a module.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, TryFromPrimitive)]
#[repr(u8)]
pub enum SectionId {
    /// Custom section with arbitrary data.
    Custom = 0,
    /// Type declarations, grouped into recursion groups.
    Type = 1,
    /// Import declarations.
    Import = 2,
    /// Function type indices for module functions.
    Function = 3,
    /// Table declarations.
    Table = 4,
    /// Memory declarations.
    Memory = 5,
    /// Global declarations.
    Global = 6,
    /// Export declarations.
    Export = 7,
    /// Start function index.
    Start = 8,
    /// Element segments for table initialization.
    Element = 9,
    /// Function bodies.
    Code = 10,
    /// Data segments for memory initialization.
    Data = 11,
    /// Data segment count (for bulk memory operations).
    DataCount = 12,
}

// For non-custom section IDs, an ID is less than another precisely when the
// former must appear before the latter in a module when both are present.
// DataCount is the one exception to the numeric order: it sits between
// Element and Code.
impl PartialOrd for SectionId {
    fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> {
        use SectionId::{Code, Data, DataCount};

        match (self, other) {
            (DataCount, Code | Data) => Some(cmp::Ordering::Less),
            (Code | Data, DataCount) => Some(cmp::Ordering::Greater),
            _ => (*self as u8).partial_cmp(&(*other as u8)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_ordering() {
        assert!(SectionId::Type < SectionId::Import);
        assert!(SectionId::Element < SectionId::Code);
        // DataCount precedes Code and Data despite its numeric id.
        assert!(SectionId::DataCount < SectionId::Code);
        assert!(SectionId::DataCount < SectionId::Data);
        assert!(SectionId::Data > SectionId::DataCount);
        assert!(SectionId::Element < SectionId::DataCount);
    }
}
