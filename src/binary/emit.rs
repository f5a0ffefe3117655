// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The type-section emitter, the inverse of [`parse_type_section`].
//!
//! Output is canonical: singleton recursion groups are emitted without the
//! `rec` wrapper, final subtypes without declared supertypes drop the `sub`
//! prefix, nullable abstract references use their shorthand byte, and all
//! integers are minimally encoded. `parse ∘ emit` is the identity on type
//! lists, `emit ∘ parse` is the identity on canonical payloads.
//!
//! [`parse_type_section`]: super::parse_type_section

use alloc::vec::Vec;

use crate::binary::{
    COMP_ARRAY, COMP_FUNC, COMP_STRUCT, HEAP_ANY, HEAP_ARRAY, HEAP_EQ, HEAP_EXTERN, HEAP_FUNC,
    HEAP_I31, HEAP_NOEXTERN, HEAP_NOFUNC, HEAP_NONE, HEAP_STRUCT, MUT_CONST, MUT_VAR, REC, SUB,
    SUB_FINAL, TYPE_F32, TYPE_F64, TYPE_I8, TYPE_I16, TYPE_I32, TYPE_I64, TYPE_REF, TYPE_REF_NULL,
    TYPE_V128,
};
use crate::types::{
    CompositeType, FieldType, HeapType, ModuleTypes, RefType, StorageType, SubType, ValType,
};

/// Emit the payload of a type section for the given type list.
pub fn emit_type_section(types: &ModuleTypes) -> Vec<u8> {
    let mut w = Writer::new();
    w.uleb(types.rec_group_count() as u32);
    for range in types.rec_groups() {
        let len = range.end - range.start;
        if len >= 2 {
            w.byte(REC);
            w.uleb(len);
        }
        for index in range {
            let ty = types
                .get(crate::indices::TypeIndex::from_u32(index))
                .expect("rec group range within type list");
            write_sub_type(&mut w, ty);
        }
    }
    w.finish()
}

struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn new() -> Self {
        Self { buf: Vec::new() }
    }

    fn finish(self) -> Vec<u8> {
        self.buf
    }

    fn byte(&mut self, byte: u8) {
        self.buf.push(byte);
    }

    /// Minimal unsigned LEB128.
    fn uleb(&mut self, mut value: u32) {
        loop {
            let byte = (value & 0x7F) as u8;
            value >>= 7;
            if value == 0 {
                self.buf.push(byte);
                return;
            }
            self.buf.push(byte | 0x80);
        }
    }

    /// Minimal signed LEB128; defined type indices are encoded as s33.
    fn sleb(&mut self, mut value: i64) {
        loop {
            let byte = (value & 0x7F) as u8;
            value >>= 7;
            let done = (value == 0 && byte & 0x40 == 0) || (value == -1 && byte & 0x40 != 0);
            if done {
                self.buf.push(byte);
                return;
            }
            self.buf.push(byte | 0x80);
        }
    }
}

fn write_sub_type(w: &mut Writer, ty: &SubType) {
    if !(ty.is_final && ty.supertypes.is_empty()) {
        w.byte(if ty.is_final { SUB_FINAL } else { SUB });
        w.uleb(ty.supertypes.len() as u32);
        for sup in &ty.supertypes {
            w.uleb(sup.as_u32());
        }
    }
    write_composite_type(w, &ty.composite_type);
}

fn write_composite_type(w: &mut Writer, ty: &CompositeType) {
    match ty {
        CompositeType::Func(func) => {
            w.byte(COMP_FUNC);
            w.uleb(func.params.len() as u32);
            for param in &func.params {
                write_val_type(w, param);
            }
            w.uleb(func.results.len() as u32);
            for result in &func.results {
                write_val_type(w, result);
            }
        }
        CompositeType::Array(array) => {
            w.byte(COMP_ARRAY);
            write_field_type(w, &array.0);
        }
        CompositeType::Struct(strct) => {
            w.byte(COMP_STRUCT);
            w.uleb(strct.fields.len() as u32);
            for field in &strct.fields {
                write_field_type(w, field);
            }
        }
    }
}

fn write_field_type(w: &mut Writer, field: &FieldType) {
    write_storage_type(w, &field.storage);
    w.byte(if field.mutability.is_var() {
        MUT_VAR
    } else {
        MUT_CONST
    });
}

fn write_storage_type(w: &mut Writer, storage: &StorageType) {
    match storage {
        StorageType::I8 => w.byte(TYPE_I8),
        StorageType::I16 => w.byte(TYPE_I16),
        StorageType::Val(ty) => write_val_type(w, ty),
    }
}

fn write_val_type(w: &mut Writer, ty: &ValType) {
    match ty {
        ValType::I32 => w.byte(TYPE_I32),
        ValType::I64 => w.byte(TYPE_I64),
        ValType::F32 => w.byte(TYPE_F32),
        ValType::F64 => w.byte(TYPE_F64),
        ValType::V128 => w.byte(TYPE_V128),
        ValType::Ref(rt) => write_ref_type(w, rt),
    }
}

fn write_ref_type(w: &mut Writer, ty: &RefType) {
    match (ty.nullable, abstract_code(&ty.heap_type)) {
        // The canonical form of a nullable abstract reference is its
        // shorthand byte.
        (true, Some(code)) => w.byte(code),
        _ => {
            w.byte(if ty.nullable { TYPE_REF_NULL } else { TYPE_REF });
            write_heap_type(w, &ty.heap_type);
        }
    }
}

fn write_heap_type(w: &mut Writer, ty: &HeapType) {
    match abstract_code(ty) {
        Some(code) => w.byte(code),
        None => match ty {
            HeapType::Defined(index) => w.sleb(i64::from(index.as_u32())),
            _ => unreachable!("abstract codes are covered above"),
        },
    }
}

fn abstract_code(ty: &HeapType) -> Option<u8> {
    match ty {
        HeapType::NoFunc => Some(HEAP_NOFUNC),
        HeapType::NoExtern => Some(HEAP_NOEXTERN),
        HeapType::None => Some(HEAP_NONE),
        HeapType::Func => Some(HEAP_FUNC),
        HeapType::Extern => Some(HEAP_EXTERN),
        HeapType::Any => Some(HEAP_ANY),
        HeapType::Eq => Some(HEAP_EQ),
        HeapType::I31 => Some(HEAP_I31),
        HeapType::Struct => Some(HEAP_STRUCT),
        HeapType::Array => Some(HEAP_ARRAY),
        HeapType::Defined(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::BinaryReader;
    use crate::binary::module_parser::parse_type_section;
    use crate::indices::TypeIndex;
    use crate::types::{ArrayType, FuncType, Mutability, StructType, sub, sub_final};
    use alloc::boxed::Box;

    fn roundtrip(types: &ModuleTypes) -> ModuleTypes {
        let payload = emit_type_section(types);
        let mut reader = BinaryReader::new(&payload);
        let parsed = parse_type_section(&mut reader).unwrap();
        assert!(reader.is_empty());
        parsed
    }

    #[test]
    fn parse_after_emit_is_identity() {
        let mut types = ModuleTypes::new();
        // A singleton function type with reference-typed params.
        types.add_singleton(sub_final(CompositeType::Func(FuncType {
            params: Box::new([
                ValType::I32,
                ValType::Ref(RefType::ANYREF),
                ValType::Ref(RefType::new(false, HeapType::I31)),
            ]),
            results: Box::new([ValType::F64]),
        })));
        // A two-member recursion group of mutually referential types.
        types.add_rec_group([
            sub(
                [],
                CompositeType::Struct(StructType {
                    fields: Box::new([
                        FieldType {
                            mutability: Mutability::Var,
                            storage: StorageType::I8,
                        },
                        FieldType {
                            mutability: Mutability::Const,
                            storage: StorageType::Val(ValType::Ref(RefType::new(
                                true,
                                HeapType::Defined(TypeIndex::from_u32(2)),
                            ))),
                        },
                    ]),
                }),
            ),
            sub_final(CompositeType::Array(ArrayType(FieldType {
                mutability: Mutability::Var,
                storage: StorageType::I16,
            }))),
        ]);
        // A subtype chain across groups.
        types.add_singleton(SubType {
            is_final: true,
            supertypes: Box::new([TypeIndex::from_u32(1)]),
            composite_type: CompositeType::Struct(StructType {
                fields: Box::new([
                    FieldType {
                        mutability: Mutability::Var,
                        storage: StorageType::I8,
                    },
                    FieldType {
                        mutability: Mutability::Const,
                        storage: StorageType::Val(ValType::Ref(RefType::new(
                            true,
                            HeapType::Defined(TypeIndex::from_u32(2)),
                        ))),
                    },
                    FieldType {
                        mutability: Mutability::Const,
                        storage: StorageType::Val(ValType::V128),
                    },
                ]),
            }),
        });

        assert_eq!(roundtrip(&types), types);
    }

    #[test]
    fn emit_after_parse_is_identity_on_canonical_payloads() {
        // struct (field (mut i8)) (field i32); then
        // sub 0 (struct (field (mut i8)) (field i32) (field externref))
        let payload: &[u8] = &[
            0x02, // two groups
            0x5F, 0x02, 0x78, 0x01, 0x7F, 0x00, // canonical unwrapped struct
            0x50, 0x01, 0x00, // sub with supertype 0
            0x5F, 0x03, 0x78, 0x01, 0x7F, 0x00, 0x6F, 0x00,
        ];
        let mut reader = BinaryReader::new(payload);
        let types = parse_type_section(&mut reader).unwrap();
        assert!(reader.is_empty());
        assert_eq!(emit_type_section(&types), payload);
    }

    #[test]
    fn singleton_groups_are_unwrapped() {
        // A rec-wrapped singleton parses fine but re-emits unwrapped.
        let wrapped: &[u8] = &[0x01, 0x4E, 0x01, 0x5E, 0x77, 0x00];
        let canonical: &[u8] = &[0x01, 0x5E, 0x77, 0x00];
        let mut reader = BinaryReader::new(wrapped);
        let types = parse_type_section(&mut reader).unwrap();
        assert_eq!(emit_type_section(&types), canonical);

        // While a genuine two-member group keeps its wrapper.
        let mut types = ModuleTypes::new();
        types.add_rec_group([
            sub_final(CompositeType::Array(ArrayType(FieldType {
                mutability: Mutability::Const,
                storage: StorageType::I8,
            }))),
            sub_final(CompositeType::Array(ArrayType(FieldType {
                mutability: Mutability::Const,
                storage: StorageType::I16,
            }))),
        ]);
        let payload = emit_type_section(&types);
        assert_eq!(payload[1], REC);
        assert_eq!(roundtrip(&types), types);
    }

    #[test]
    fn large_indices_use_s33() {
        let mut w = Writer::new();
        w.sleb(64);
        // 64 as s33 needs two bytes: 0xC0 0x00.
        assert_eq!(w.finish(), &[0xC0, 0x00]);

        let mut w = Writer::new();
        w.sleb(5);
        assert_eq!(w.finish(), &[0x05]);

        let mut w = Writer::new();
        w.uleb(624485);
        assert_eq!(w.finish(), &[0xE5, 0x8E, 0x26]);
    }

    #[test]
    fn non_nullable_refs_have_no_shorthand() {
        let mut types = ModuleTypes::new();
        types.add_singleton(sub_final(CompositeType::Array(ArrayType(FieldType {
            mutability: Mutability::Const,
            storage: StorageType::Val(ValType::Ref(RefType::new(false, HeapType::Eq))),
        }))));
        let payload = emit_type_section(&types);
        assert_eq!(payload, &[0x01, 0x5E, 0x64, 0x6D, 0x00]);
        assert_eq!(roundtrip(&types), types);
    }
}
