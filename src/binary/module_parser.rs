// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use alloc::boxed::Box;
use alloc::string::ToString;
use alloc::vec::Vec;

use tracing::trace;

use crate::binary::reader::BinaryReader;
use crate::binary::{
    COMP_ARRAY, COMP_FUNC, COMP_STRUCT, HEAP_ANY, HEAP_ARRAY, HEAP_EQ, HEAP_EXTERN, HEAP_FUNC,
    HEAP_I31, HEAP_NOEXTERN, HEAP_NOFUNC, HEAP_NONE, HEAP_STRUCT, MAGIC, MUT_CONST, MUT_VAR, REC,
    SUB, SUB_FINAL, SectionId, TYPE_F32, TYPE_F64, TYPE_I8, TYPE_I16, TYPE_I32, TYPE_I64,
    TYPE_REF, TYPE_REF_NULL, TYPE_V128, VERSION_COMPONENT, VERSION_MODULE,
};
use crate::const_expr::ConstExpr;
use crate::errors::{Error, Malformed};
use crate::indices::{FuncIndex, MemoryIndex, TableIndex, TypeIndex};
use crate::module::{
    CustomSection, DataSegment, DataSegmentMode, ElementItems, ElementSegment, ElementSegmentMode,
    Module, RawSection,
};
use crate::types::{
    ArrayType, CompositeType, FieldType, FuncType, HeapType, ModuleTypes, Mutability, RefType,
    StorageType, StructType, SubType, ValType,
};

/// Decode a module binary.
///
/// The preamble and section frames are always checked; the type, function,
/// data, element, and custom sections are decoded, everything else is kept as
/// a raw payload.
pub fn parse_module(bytes: &[u8]) -> crate::Result<Module> {
    let mut reader = BinaryReader::new(bytes);

    let magic = reader
        .read_bytes(4)
        .map_err(|_| reader.malformed(Malformed::Magic))?;
    if magic != MAGIC {
        return Err(Error::Malformed {
            kind: Malformed::Magic,
            offset: 0,
        });
    }
    let version = reader
        .read_bytes(4)
        .map_err(|_| reader.malformed(Malformed::Version))?;
    if version == VERSION_COMPONENT {
        trace!("component preamble detected");
        return Err(Error::Terminated);
    }
    if version != VERSION_MODULE {
        return Err(Error::Malformed {
            kind: Malformed::Version,
            offset: 4,
        });
    }

    let mut module = Module::new();
    let mut last_section: Option<SectionId> = None;

    while !reader.is_empty() {
        let id_offset = reader.offset();
        let id_byte = reader.read_u8()?;
        let id = SectionId::try_from(id_byte).map_err(|_| Error::Malformed {
            kind: Malformed::Section,
            offset: id_offset,
        })?;
        let size = reader.read_u32_leb()? as usize;
        if size > reader.remaining() {
            return Err(reader.malformed(Malformed::Section));
        }
        let payload_offset = reader.offset();
        let payload = reader.read_bytes(size)?;

        // Non-custom sections must be unique and in ascending logical order.
        if id != SectionId::Custom {
            if last_section.is_some_and(|last| last >= id) {
                return Err(Error::Malformed {
                    kind: Malformed::Section,
                    offset: id_offset,
                });
            }
            last_section = Some(id);
        }

        trace!(?id, size, "parsing section");
        let mut section = BinaryReader::new_with_offset(payload, payload_offset);
        match id {
            SectionId::Custom => module.custom_sections.push(parse_custom(&mut section)?),
            SectionId::Type => module.types = parse_type_section(&mut section)?,
            SectionId::Function => parse_function_section(&mut section, &mut module)?,
            SectionId::Data => parse_data_section(&mut section, &mut module)?,
            SectionId::Element => parse_element_section(&mut section, &mut module)?,
            _ => {
                module.raw_sections.push(RawSection {
                    id,
                    bytes: payload.into(),
                });
                continue;
            }
        }
        if !section.is_empty() {
            return Err(section.malformed(Malformed::Section));
        }
    }

    validate_type_indices(&module, bytes.len())?;
    Ok(module)
}

/// Decode the payload of a type section: a length-prefixed sequence of
/// recursion groups.
///
/// A singleton group is encoded without the `rec` wrapper; groups of two or
/// more begin with the `rec` byte and a count.
pub fn parse_type_section(reader: &mut BinaryReader<'_>) -> crate::Result<ModuleTypes> {
    let group_count = reader.read_u32_leb()?;
    let mut types = ModuleTypes::new();
    for _ in 0..group_count {
        if reader.peek_u8() == Some(REC) {
            reader.read_u8()?;
            let len = reader.read_u32_leb()?;
            let group = (0..len)
                .map(|_| parse_sub_type(reader))
                .collect::<crate::Result<Vec<_>>>()?;
            types.add_rec_group(group);
        } else {
            let ty = parse_sub_type(reader)?;
            types.add_rec_group([ty]);
        }
    }
    Ok(types)
}

fn parse_sub_type(reader: &mut BinaryReader<'_>) -> crate::Result<SubType> {
    match reader.peek_u8() {
        Some(SUB) | Some(SUB_FINAL) => {
            let is_final = reader.read_u8()? == SUB_FINAL;
            let count = reader.read_u32_leb()?;
            let supertypes = (0..count)
                .map(|_| Ok(TypeIndex::from_u32(reader.read_u32_leb()?)))
                .collect::<crate::Result<Vec<_>>>()?
                .into_boxed_slice();
            let composite_type = parse_composite_type(reader)?;
            Ok(SubType {
                is_final,
                supertypes,
                composite_type,
            })
        }
        _ => Ok(SubType {
            is_final: true,
            supertypes: Box::new([]),
            composite_type: parse_composite_type(reader)?,
        }),
    }
}

fn parse_composite_type(reader: &mut BinaryReader<'_>) -> crate::Result<CompositeType> {
    let offset = reader.offset();
    match reader.read_u8()? {
        COMP_FUNC => {
            let params = parse_val_type_vec(reader)?;
            let results = parse_val_type_vec(reader)?;
            Ok(CompositeType::Func(FuncType { params, results }))
        }
        COMP_ARRAY => Ok(CompositeType::Array(ArrayType(parse_field_type(reader)?))),
        COMP_STRUCT => {
            let count = reader.read_u32_leb()?;
            let fields = (0..count)
                .map(|_| parse_field_type(reader))
                .collect::<crate::Result<Vec<_>>>()?
                .into_boxed_slice();
            Ok(CompositeType::Struct(StructType { fields }))
        }
        _ => Err(Error::Malformed {
            kind: Malformed::Sort,
            offset,
        }),
    }
}

fn parse_val_type_vec(reader: &mut BinaryReader<'_>) -> crate::Result<Box<[ValType]>> {
    let count = reader.read_u32_leb()?;
    Ok((0..count)
        .map(|_| parse_val_type(reader))
        .collect::<crate::Result<Vec<_>>>()?
        .into_boxed_slice())
}

pub(crate) fn parse_field_type(reader: &mut BinaryReader<'_>) -> crate::Result<FieldType> {
    let storage = parse_storage_type(reader)?;
    let offset = reader.offset();
    let mutability = match reader.read_u8()? {
        MUT_CONST => Mutability::Const,
        MUT_VAR => Mutability::Var,
        _ => {
            return Err(Error::Malformed {
                kind: Malformed::Mut,
                offset,
            });
        }
    };
    Ok(FieldType {
        mutability,
        storage,
    })
}

pub(crate) fn parse_storage_type(reader: &mut BinaryReader<'_>) -> crate::Result<StorageType> {
    match reader.peek_u8() {
        Some(TYPE_I8) => {
            reader.read_u8()?;
            Ok(StorageType::I8)
        }
        Some(TYPE_I16) => {
            reader.read_u8()?;
            Ok(StorageType::I16)
        }
        _ => Ok(StorageType::Val(parse_val_type(reader)?)),
    }
}

pub(crate) fn parse_val_type(reader: &mut BinaryReader<'_>) -> crate::Result<ValType> {
    let offset = reader.offset();
    match reader.read_u8()? {
        TYPE_I32 => Ok(ValType::I32),
        TYPE_I64 => Ok(ValType::I64),
        TYPE_F32 => Ok(ValType::F32),
        TYPE_F64 => Ok(ValType::F64),
        TYPE_V128 => Ok(ValType::V128),
        byte @ (TYPE_REF | TYPE_REF_NULL) => {
            let heap_type = parse_heap_type(reader)?;
            Ok(ValType::Ref(RefType::new(byte == TYPE_REF_NULL, heap_type)))
        }
        byte => match abstract_heap_type(byte) {
            // The abstract shorthand: a bare heap type code is the nullable
            // reference to it.
            Some(heap_type) => Ok(ValType::Ref(RefType::new(true, heap_type))),
            None => Err(Error::Malformed {
                kind: Malformed::ValType,
                offset,
            }),
        },
    }
}

pub(crate) fn parse_ref_type(reader: &mut BinaryReader<'_>) -> crate::Result<RefType> {
    let offset = reader.offset();
    match parse_val_type(reader)? {
        ValType::Ref(rt) => Ok(rt),
        _ => Err(Error::Malformed {
            kind: Malformed::ValType,
            offset,
        }),
    }
}

/// Decode a heap type: an abstract code byte, or a non-negative s33 defined
/// index.
pub(crate) fn parse_heap_type(reader: &mut BinaryReader<'_>) -> crate::Result<HeapType> {
    if let Some(heap_type) = reader.peek_u8().and_then(abstract_heap_type) {
        reader.read_u8()?;
        return Ok(heap_type);
    }
    let offset = reader.offset();
    let index = reader.read_s33_leb()?;
    let index = u32::try_from(index).map_err(|_| Error::Malformed {
        kind: Malformed::ValType,
        offset,
    })?;
    Ok(HeapType::Defined(TypeIndex::from_u32(index)))
}

fn abstract_heap_type(byte: u8) -> Option<HeapType> {
    match byte {
        HEAP_NOFUNC => Some(HeapType::NoFunc),
        HEAP_NOEXTERN => Some(HeapType::NoExtern),
        HEAP_NONE => Some(HeapType::None),
        HEAP_FUNC => Some(HeapType::Func),
        HEAP_EXTERN => Some(HeapType::Extern),
        HEAP_ANY => Some(HeapType::Any),
        HEAP_EQ => Some(HeapType::Eq),
        HEAP_I31 => Some(HeapType::I31),
        HEAP_STRUCT => Some(HeapType::Struct),
        HEAP_ARRAY => Some(HeapType::Array),
        _ => None,
    }
}

fn parse_custom(reader: &mut BinaryReader<'_>) -> crate::Result<CustomSection> {
    let len = reader.read_u32_leb()? as usize;
    let offset = reader.offset();
    let name = core::str::from_utf8(reader.read_bytes(len)?).map_err(|_| Error::Malformed {
        kind: Malformed::Section,
        offset,
    })?;
    let bytes = reader.read_bytes(reader.remaining())?;
    Ok(CustomSection {
        name: name.to_string(),
        bytes: bytes.into(),
    })
}

fn parse_function_section(
    reader: &mut BinaryReader<'_>,
    module: &mut Module,
) -> crate::Result<()> {
    let count = reader.read_u32_leb()?;
    for _ in 0..count {
        let offset = reader.offset();
        let index = TypeIndex::from_u32(reader.read_u32_leb()?);
        if module.types.get(index).is_none() {
            return Err(Error::Malformed {
                kind: Malformed::Section,
                offset,
            });
        }
        module.functions.push(index);
    }
    Ok(())
}

fn parse_data_section(reader: &mut BinaryReader<'_>, module: &mut Module) -> crate::Result<()> {
    let count = reader.read_u32_leb()?;
    for _ in 0..count {
        let offset = reader.offset();
        let mode = match reader.read_u32_leb()? {
            0 => {
                let (expr, _) = ConstExpr::parse(reader)?;
                DataSegmentMode::Active {
                    memory: MemoryIndex::from_u32(0),
                    offset: expr,
                }
            }
            1 => DataSegmentMode::Passive,
            2 => {
                let memory = MemoryIndex::from_u32(reader.read_u32_leb()?);
                let (expr, _) = ConstExpr::parse(reader)?;
                DataSegmentMode::Active {
                    memory,
                    offset: expr,
                }
            }
            _ => {
                return Err(Error::Malformed {
                    kind: Malformed::Section,
                    offset,
                });
            }
        };
        let len = reader.read_u32_leb()? as usize;
        let bytes = reader.read_bytes(len)?;
        module.datas.push(DataSegment {
            mode,
            bytes: bytes.into(),
        });
    }
    Ok(())
}

fn parse_element_section(reader: &mut BinaryReader<'_>, module: &mut Module) -> crate::Result<()> {
    let count = reader.read_u32_leb()?;
    for _ in 0..count {
        let offset = reader.offset();
        let flags = reader.read_u32_leb()?;
        if flags > 7 {
            return Err(Error::Malformed {
                kind: Malformed::Section,
                offset,
            });
        }

        let mode = if flags & 0b001 == 0 {
            let table = if flags & 0b010 != 0 {
                TableIndex::from_u32(reader.read_u32_leb()?)
            } else {
                TableIndex::from_u32(0)
            };
            let (expr, _) = ConstExpr::parse(reader)?;
            ElementSegmentMode::Active {
                table,
                offset: expr,
            }
        } else if flags & 0b010 != 0 {
            ElementSegmentMode::Declared
        } else {
            ElementSegmentMode::Passive
        };

        // The low bit selects between function indices and expressions; the
        // explicit elemkind/reftype byte is present unless this is the
        // original MVP form (flags == 0 or 4).
        let items = if flags & 0b100 == 0 {
            if flags != 0 {
                let offset = reader.offset();
                // elemkind: only funcref (0x00) is defined.
                if reader.read_u8()? != 0x00 {
                    return Err(Error::Malformed {
                        kind: Malformed::Section,
                        offset,
                    });
                }
            }
            let len = reader.read_u32_leb()?;
            let funcs = (0..len)
                .map(|_| Ok(FuncIndex::from_u32(reader.read_u32_leb()?)))
                .collect::<crate::Result<Vec<_>>>()?
                .into_boxed_slice();
            ElementItems::Functions(funcs)
        } else {
            let ty = if flags != 4 {
                parse_ref_type(reader)?
            } else {
                RefType::FUNCREF
            };
            let len = reader.read_u32_leb()?;
            let exprs = (0..len)
                .map(|_| Ok(ConstExpr::parse(reader)?.0))
                .collect::<crate::Result<Vec<_>>>()?
                .into_boxed_slice();
            ElementItems::Expressions(ty, exprs)
        };

        module.elements.push(ElementSegment { mode, items });
    }
    Ok(())
}

/// Every defined-type reference and declared supertype must point into the
/// final type list (a dangling index could otherwise escape into runtime
/// lookups).
fn validate_type_indices(module: &Module, end_offset: usize) -> crate::Result<()> {
    let len = module.types.len() as u32;
    let check = |index: TypeIndex| {
        if index.as_u32() < len {
            Ok(())
        } else {
            Err(Error::Malformed {
                kind: Malformed::ValType,
                offset: end_offset,
            })
        }
    };

    let check_val = |ty: &ValType| match ty {
        ValType::Ref(RefType {
            heap_type: HeapType::Defined(index),
            ..
        }) => check(*index),
        _ => Ok(()),
    };
    let check_storage = |ty: &StorageType| match ty {
        StorageType::Val(ty) => check_val(ty),
        _ => Ok(()),
    };

    for (_, sub) in module.types.wasm_types() {
        for &sup in &sub.supertypes {
            check(sup)?;
        }
        match &sub.composite_type {
            CompositeType::Func(func) => {
                for ty in func.params.iter().chain(func.results.iter()) {
                    check_val(ty)?;
                }
            }
            CompositeType::Array(array) => check_storage(&array.0.storage)?,
            CompositeType::Struct(strct) => {
                for field in &strct.fields {
                    check_storage(&field.storage)?;
                }
            }
        }
    }
    Ok(())
}
