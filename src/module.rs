// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;

use cranelift_entity::PrimaryMap;

use crate::binary::SectionId;
use crate::const_expr::ConstExpr;
use crate::indices::{DataIndex, ElemIndex, FuncIndex, MemoryIndex, TableIndex, TypeIndex};
use crate::types::{ModuleTypes, RefType};

/// A decoded WebAssembly module, restricted to the entities the GC
/// operations consume.
///
/// The type section is fully decoded; functions carry only their signature
/// index (enough for `ref.func`), and data/element segments are decoded so
/// `array.new_data`/`array.new_elem` can source them. Every other section is
/// captured at frame level.
#[derive(Debug)]
pub struct Module {
    /// The module's flat type list, grouped into recursion groups.
    pub types: ModuleTypes,
    /// Signature index for every function in the index space.
    pub functions: PrimaryMap<FuncIndex, TypeIndex>,
    /// Data segments.
    pub datas: PrimaryMap<DataIndex, DataSegment>,
    /// Element segments.
    pub elements: PrimaryMap<ElemIndex, ElementSegment>,
    /// Custom sections, name and payload.
    pub custom_sections: Vec<CustomSection>,
    /// Sections this module does not decode beyond their frame.
    pub raw_sections: Vec<RawSection>,
}

impl Default for Module {
    fn default() -> Self {
        Self::new()
    }
}

impl Module {
    pub fn new() -> Self {
        Self {
            types: ModuleTypes::new(),
            functions: PrimaryMap::new(),
            datas: PrimaryMap::new(),
            elements: PrimaryMap::new(),
            custom_sections: Vec::new(),
            raw_sections: Vec::new(),
        }
    }

    /// The signature of the function at `index`, if it exists.
    pub fn signature(&self, index: FuncIndex) -> Option<TypeIndex> {
        self.functions.get(index).copied()
    }
}

/// A data segment.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSegment {
    pub mode: DataSegmentMode,
    pub bytes: Box<[u8]>,
}

/// Whether a data segment is copied into a memory at instantiation or kept
/// passive for bulk-memory and `array.new_data` use.
#[derive(Debug, Clone, PartialEq)]
pub enum DataSegmentMode {
    Active {
        memory: MemoryIndex,
        offset: ConstExpr,
    },
    Passive,
}

/// An element segment.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementSegment {
    pub mode: ElementSegmentMode,
    pub items: ElementItems,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ElementSegmentMode {
    Active {
        table: TableIndex,
        offset: ConstExpr,
    },
    Passive,
    Declared,
}

/// The items of an element segment: either bare function indices or constant
/// expressions typed at a reference type.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementItems {
    Functions(Box<[FuncIndex]>),
    Expressions(RefType, Box<[ConstExpr]>),
}

impl ElementItems {
    pub fn len(&self) -> usize {
        match self {
            ElementItems::Functions(items) => items.len(),
            ElementItems::Expressions(_, items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A custom section, name and raw content.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomSection {
    pub name: String,
    pub bytes: Box<[u8]>,
}

/// A section captured at frame level: id byte, LEB128 size, payload.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSection {
    pub id: SectionId,
    pub bytes: Box<[u8]>,
}
