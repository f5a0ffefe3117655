// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The GC instruction semantics.
//!
//! Every operation works against the executor's value stack. A failing
//! operation consumes no operands and pushes no results: operands are
//! inspected in place and the stack is only committed once the operation can
//! no longer trap.

use alloc::vec::Vec;

use tracing::debug;

use crate::const_expr::{ConstExpr, ConstOp};
use crate::errors::Error;
use crate::indices::{DataIndex, ElemIndex, FieldIndex, FuncIndex, TypeIndex};
use crate::matcher::match_ref_types;
use crate::module::{DataSegment, ElementItems, ElementSegment, Module};
use crate::store::Store;
use crate::trap::Trap;
use crate::types::{ArrayType, HeapType, RefType, StorageType, StructType, ValType};
use crate::values::{GcRef, Ref, Val};

/// The executor's value stack.
#[derive(Debug, Default)]
pub struct ValueStack {
    values: Vec<Val>,
}

impl ValueStack {
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn push(&mut self, value: impl Into<Val>) {
        self.values.push(value.into());
    }

    /// Pop the top value.
    ///
    /// # Panics
    ///
    /// Panics on underflow; operand arity is established by validation.
    pub fn pop(&mut self) -> Val {
        self.values.pop().expect("value stack underflow")
    }

    /// Borrow the value `depth` slots below the top without popping it.
    ///
    /// # Panics
    ///
    /// Panics on underflow.
    pub fn peek(&self, depth: usize) -> &Val {
        let len = self.values.len();
        &self.values[len - 1 - depth]
    }

    /// Pop the top `count` values, preserving their bottom-to-top order.
    pub fn pop_many(&mut self, count: usize) -> Vec<Val> {
        let at = self.values.len() - count;
        self.values.split_off(at)
    }
}

/// A GC instruction together with its immediates.
#[derive(Debug, Clone)]
pub enum GcOp {
    RefNull(HeapType),
    RefIsNull,
    RefFunc(FuncIndex),
    RefEq,
    RefAsNonNull,
    RefTest(RefType),
    RefCast(RefType),
    StructNew(TypeIndex),
    StructNewDefault(TypeIndex),
    StructGet(TypeIndex, FieldIndex),
    StructGetS(TypeIndex, FieldIndex),
    StructGetU(TypeIndex, FieldIndex),
    StructSet(TypeIndex, FieldIndex),
    ArrayNew(TypeIndex),
    ArrayNewDefault(TypeIndex),
    ArrayNewFixed(TypeIndex, u32),
    ArrayNewData(TypeIndex, DataIndex),
    ArrayNewElem(TypeIndex, ElemIndex),
    ArrayGet(TypeIndex),
    ArrayGetS(TypeIndex),
    ArrayGetU(TypeIndex),
    ArraySet(TypeIndex),
    ArrayLen,
    AnyConvertExtern,
    ExternConvertAny,
    RefI31,
    I31GetS,
    I31GetU,
}

impl GcOp {
    /// The binary opcode of this instruction; `0xFB`-prefixed opcodes carry
    /// the prefix in the high byte.
    pub fn opcode(&self) -> u32 {
        match self {
            GcOp::RefNull(_) => 0xD0,
            GcOp::RefIsNull => 0xD1,
            GcOp::RefFunc(_) => 0xD2,
            GcOp::RefEq => 0xD3,
            GcOp::RefAsNonNull => 0xD4,
            GcOp::StructNew(_) => 0xFB00,
            GcOp::StructNewDefault(_) => 0xFB01,
            GcOp::StructGet(..) => 0xFB02,
            GcOp::StructGetS(..) => 0xFB03,
            GcOp::StructGetU(..) => 0xFB04,
            GcOp::StructSet(..) => 0xFB05,
            GcOp::ArrayNew(_) => 0xFB06,
            GcOp::ArrayNewDefault(_) => 0xFB07,
            GcOp::ArrayNewFixed(..) => 0xFB08,
            GcOp::ArrayNewData(..) => 0xFB09,
            GcOp::ArrayNewElem(..) => 0xFB0A,
            GcOp::ArrayGet(_) => 0xFB0B,
            GcOp::ArrayGetS(_) => 0xFB0C,
            GcOp::ArrayGetU(_) => 0xFB0D,
            GcOp::ArraySet(_) => 0xFB0E,
            GcOp::ArrayLen => 0xFB0F,
            GcOp::RefTest(rt) => {
                if rt.nullable {
                    0xFB15
                } else {
                    0xFB14
                }
            }
            GcOp::RefCast(rt) => {
                if rt.nullable {
                    0xFB17
                } else {
                    0xFB16
                }
            }
            GcOp::AnyConvertExtern => 0xFB1A,
            GcOp::ExternConvertAny => 0xFB1B,
            GcOp::RefI31 => 0xFB1C,
            GcOp::I31GetS => 0xFB1D,
            GcOp::I31GetU => 0xFB1E,
        }
    }
}

/// Executes GC instructions against a module's types and segments and a
/// store's heap.
pub struct GcOps<'a> {
    module: &'a Module,
    store: &'a Store,
}

impl<'a> GcOps<'a> {
    pub fn new(module: &'a Module, store: &'a Store) -> Self {
        Self { module, store }
    }

    /// Execute one instruction, wrapping a trap with its `(opcode, offset)`
    /// diagnostic context.
    pub fn execute(&self, stack: &mut ValueStack, op: &GcOp, offset: usize) -> crate::Result<()> {
        self.run(stack, op).map_err(|trap| {
            let opcode = op.opcode();
            debug!(opcode, offset, %trap, "gc instruction trapped");
            Error::Trap {
                trap,
                opcode,
                offset,
            }
        })
    }

    /// Execute one instruction.
    pub fn run(&self, stack: &mut ValueStack, op: &GcOp) -> Result<(), Trap> {
        match *op {
            GcOp::RefNull(ref heap_type) => self.ref_null(stack, heap_type),
            GcOp::RefIsNull => self.ref_is_null(stack),
            GcOp::RefFunc(index) => self.ref_func(stack, index),
            GcOp::RefEq => self.ref_eq(stack),
            GcOp::RefAsNonNull => self.ref_as_non_null(stack),
            GcOp::RefTest(ref target) => self.ref_test(stack, target),
            GcOp::RefCast(ref target) => self.ref_cast(stack, target),
            GcOp::StructNew(ty) => self.struct_new(stack, ty),
            GcOp::StructNewDefault(ty) => self.struct_new_default(stack, ty),
            GcOp::StructGet(ty, field) => self.struct_get(stack, ty, field, Extension::None),
            GcOp::StructGetS(ty, field) => self.struct_get(stack, ty, field, Extension::Signed),
            GcOp::StructGetU(ty, field) => self.struct_get(stack, ty, field, Extension::Unsigned),
            GcOp::StructSet(ty, field) => self.struct_set(stack, ty, field),
            GcOp::ArrayNew(ty) => self.array_new(stack, ty),
            GcOp::ArrayNewDefault(ty) => self.array_new_default(stack, ty),
            GcOp::ArrayNewFixed(ty, len) => self.array_new_fixed(stack, ty, len),
            GcOp::ArrayNewData(ty, data) => self.array_new_data(stack, ty, data),
            GcOp::ArrayNewElem(ty, elem) => self.array_new_elem(stack, ty, elem),
            GcOp::ArrayGet(ty) => self.array_get(stack, ty, Extension::None),
            GcOp::ArrayGetS(ty) => self.array_get(stack, ty, Extension::Signed),
            GcOp::ArrayGetU(ty) => self.array_get(stack, ty, Extension::Unsigned),
            GcOp::ArraySet(ty) => self.array_set(stack, ty),
            GcOp::ArrayLen => self.array_len(stack),
            GcOp::AnyConvertExtern => self.any_convert_extern(stack),
            GcOp::ExternConvertAny => self.extern_convert_any(stack),
            GcOp::RefI31 => self.ref_i31(stack),
            GcOp::I31GetS => self.i31_get(stack, true),
            GcOp::I31GetU => self.i31_get(stack, false),
        }
    }

    fn struct_type(&self, ty: TypeIndex) -> &StructType {
        self.module
            .types
            .get(ty)
            .expect("validated type index")
            .unwrap_struct()
    }

    fn array_type(&self, ty: TypeIndex) -> &ArrayType {
        self.module
            .types
            .get(ty)
            .expect("validated type index")
            .unwrap_array()
    }

    /// `ref.null t`: push a null reference; its runtime type is the bottom of
    /// `t`'s hierarchy.
    pub fn ref_null(&self, stack: &mut ValueStack, heap_type: &HeapType) -> Result<(), Trap> {
        let bottom = self.module.types.bottom_of(heap_type);
        stack.push(Ref::null(bottom));
        Ok(())
    }

    /// `ref.is_null`: pop a reference, push 1 if it is null and 0 otherwise.
    pub fn ref_is_null(&self, stack: &mut ValueStack) -> Result<(), Trap> {
        let val = stack.pop();
        stack.push(i32::from(val.unwrap_ref().is_null()));
        Ok(())
    }

    /// `ref.func f`: push a non-null reference to function `f`, typed at its
    /// signature.
    pub fn ref_func(&self, stack: &mut ValueStack, index: FuncIndex) -> Result<(), Trap> {
        let signature = self.module.functions[index];
        stack.push(Ref::func(index, signature));
        Ok(())
    }

    /// `ref.eq`: pop two references, push 1 iff both point to the same object
    /// or both are null.
    pub fn ref_eq(&self, stack: &mut ValueStack) -> Result<(), Trap> {
        let b = stack.pop();
        let a = stack.pop();
        stack.push(i32::from(Ref::same(a.unwrap_ref(), b.unwrap_ref())));
        Ok(())
    }

    /// `ref.as_non_null`: re-tag the top reference as non-nullable, keeping
    /// its payload.
    pub fn ref_as_non_null(&self, stack: &mut ValueStack) -> Result<(), Trap> {
        if stack.peek(0).unwrap_ref().is_null() {
            return Err(Trap::CastNullToNonNull);
        }
        let val = stack.pop().unwrap_ref().clone().as_non_nullable();
        stack.push(val);
        Ok(())
    }

    /// `ref.test t`: push 1 iff the top reference's runtime type matches `t`.
    /// Never faults.
    pub fn ref_test(&self, stack: &mut ValueStack, target: &RefType) -> Result<(), Trap> {
        let matched = self.matches(stack.peek(0).unwrap_ref(), target);
        stack.pop();
        stack.push(i32::from(matched));
        Ok(())
    }

    /// `ref.cast t`: as `ref.test`, but trap on failure and re-tag the
    /// reference with `t` on success.
    pub fn ref_cast(&self, stack: &mut ValueStack, target: &RefType) -> Result<(), Trap> {
        if !self.matches(stack.peek(0).unwrap_ref(), target) {
            return Err(Trap::CastNullToNonNull);
        }
        let val = stack.pop().unwrap_ref().clone().with_type(*target);
        stack.push(val);
        Ok(())
    }

    fn matches(&self, val: &Ref, target: &RefType) -> bool {
        match_ref_types(target, val.ty(), &self.module.types, &self.module.types)
    }

    /// `struct.new t`: pop one value per field, pack each per its field's
    /// storage type, and allocate.
    pub fn struct_new(&self, stack: &mut ValueStack, ty: TypeIndex) -> Result<(), Trap> {
        let struct_ty = self.struct_type(ty);
        let values = stack.pop_many(struct_ty.fields.len());
        let fields = struct_ty
            .fields
            .iter()
            .zip(values)
            .map(|(field, value)| value.pack(&field.storage))
            .collect();
        let obj = self.store.alloc_struct_with(ty, fields);
        stack.push(Ref::struct_obj(ty, obj));
        Ok(())
    }

    /// `struct.new_default t`: allocate with default field values.
    pub fn struct_new_default(&self, stack: &mut ValueStack, ty: TypeIndex) -> Result<(), Trap> {
        let obj = self
            .store
            .alloc_struct(ty, self.struct_type(ty), &self.module.types);
        stack.push(Ref::struct_obj(ty, obj));
        Ok(())
    }

    fn struct_get(
        &self,
        stack: &mut ValueStack,
        ty: TypeIndex,
        field: FieldIndex,
        extension: Extension,
    ) -> Result<(), Trap> {
        let storage = self.struct_type(ty).fields[field.as_u32() as usize].storage;
        extension.check(&storage);
        let Some(payload) = stack.peek(0).unwrap_ref().payload() else {
            return Err(Trap::CastNullToNonNull);
        };
        let value = payload.unwrap_struct().get(field.as_u32() as usize);
        stack.pop();
        stack.push(extension.extend(value, &storage));
        Ok(())
    }

    /// `struct.set t i`: pop a value and a reference, pack the value per the
    /// field's storage type and store it.
    pub fn struct_set(
        &self,
        stack: &mut ValueStack,
        ty: TypeIndex,
        field: FieldIndex,
    ) -> Result<(), Trap> {
        let field_ty = &self.struct_type(ty).fields[field.as_u32() as usize];
        debug_assert!(field_ty.mutability.is_var());
        if stack.peek(1).unwrap_ref().is_null() {
            return Err(Trap::CastNullToNonNull);
        }
        let value = stack.pop().pack(&field_ty.storage);
        let target = stack.pop();
        let obj = target.unwrap_ref().payload().expect("checked above").unwrap_struct();
        obj.set(field.as_u32() as usize, value);
        Ok(())
    }

    /// `array.new t`: pop an initial value and a length, splat the packed
    /// value.
    pub fn array_new(&self, stack: &mut ValueStack, ty: TypeIndex) -> Result<(), Trap> {
        let storage = self.array_type(ty).0.storage;
        let len = stack.pop().unwrap_i32() as u32;
        let value = stack.pop().pack(&storage);
        let obj = self.store.alloc_array_splat(ty, len, value);
        stack.push(Ref::array_obj(ty, obj));
        Ok(())
    }

    /// `array.new_default t`: pop a length, allocate zero/null-filled.
    pub fn array_new_default(&self, stack: &mut ValueStack, ty: TypeIndex) -> Result<(), Trap> {
        let len = stack.pop().unwrap_i32() as u32;
        let obj = self
            .store
            .alloc_array(ty, self.array_type(ty), len, &self.module.types);
        stack.push(Ref::array_obj(ty, obj));
        Ok(())
    }

    /// `array.new_fixed t k`: pop `k` values, pack each individually.
    pub fn array_new_fixed(
        &self,
        stack: &mut ValueStack,
        ty: TypeIndex,
        len: u32,
    ) -> Result<(), Trap> {
        let storage = self.array_type(ty).0.storage;
        let elems = stack
            .pop_many(len as usize)
            .into_iter()
            .map(|value| value.pack(&storage))
            .collect();
        let obj = self.store.alloc_array_with(ty, elems);
        stack.push(Ref::array_obj(ty, obj));
        Ok(())
    }

    /// `array.new_data t d`: pop a byte offset and a length, read `len`
    /// elements from data segment `d` starting at the offset.
    ///
    /// The source range must lie within the segment: `s + n·width` may reach
    /// the segment's length but not exceed it.
    pub fn array_new_data(
        &self,
        stack: &mut ValueStack,
        ty: TypeIndex,
        data: DataIndex,
    ) -> Result<(), Trap> {
        let storage = self.array_type(ty).0.storage;
        let width = storage.bit_width().expect("numeric element storage") / 8;
        let segment: &DataSegment = &self.module.datas[data];

        let len = stack.peek(0).unwrap_i32() as u32;
        let offset = stack.peek(1).unwrap_i32() as u32;
        let byte_len = u64::from(len) * u64::from(width);
        if u64::from(offset) + byte_len > segment.bytes.len() as u64 {
            return Err(Trap::LengthOutOfBounds);
        }

        let start = offset as usize;
        let elems = segment.bytes[start..start + byte_len as usize]
            .chunks_exact(width as usize)
            .map(|chunk| decode_element(&storage, chunk))
            .collect();

        stack.pop();
        stack.pop();
        let obj = self.store.alloc_array_with(ty, elems);
        stack.push(Ref::array_obj(ty, obj));
        Ok(())
    }

    /// `array.new_elem t e`: pop an element offset and a length, source `len`
    /// references from element segment `e`.
    pub fn array_new_elem(
        &self,
        stack: &mut ValueStack,
        ty: TypeIndex,
        elem: ElemIndex,
    ) -> Result<(), Trap> {
        let segment: &ElementSegment = &self.module.elements[elem];

        let len = stack.peek(0).unwrap_i32() as u32;
        let offset = stack.peek(1).unwrap_i32() as u32;
        if u64::from(offset) + u64::from(len) > segment.items.len() as u64 {
            return Err(Trap::LengthOutOfBounds);
        }

        let start = offset as usize;
        let end = start + len as usize;
        let elems = match &segment.items {
            ElementItems::Functions(items) => items[start..end]
                .iter()
                .map(|func| Val::Ref(Ref::func(*func, self.module.functions[*func])))
                .collect(),
            ElementItems::Expressions(_, items) => items[start..end]
                .iter()
                .map(|expr| Val::Ref(self.eval_ref_const(expr)))
                .collect(),
        };

        stack.pop();
        stack.pop();
        let obj = self.store.alloc_array_with(ty, elems);
        stack.push(Ref::array_obj(ty, obj));
        Ok(())
    }

    /// Evaluate an element item down to a reference value.
    fn eval_ref_const(&self, expr: &ConstExpr) -> Ref {
        let mut ops = expr.ops();
        match ops.next() {
            Some(ConstOp::RefNull(heap_type)) => Ref::null(self.module.types.bottom_of(&heap_type)),
            Some(ConstOp::RefFunc(index)) => Ref::func(index, self.module.functions[index]),
            op => {
                debug_assert!(false, "unsupported element item {op:?}");
                Ref::null(HeapType::NoFunc)
            }
        }
    }

    fn array_get(
        &self,
        stack: &mut ValueStack,
        ty: TypeIndex,
        extension: Extension,
    ) -> Result<(), Trap> {
        let storage = self.array_type(ty).0.storage;
        extension.check(&storage);
        let Some(payload) = stack.peek(1).unwrap_ref().payload() else {
            return Err(Trap::CastNullToNonNull);
        };
        let obj = payload.unwrap_array();
        let index = stack.peek(0).unwrap_i32() as u32;
        if index >= obj.len() {
            return Err(Trap::LengthOutOfBounds);
        }
        let value = obj.get(index as usize);
        stack.pop();
        stack.pop();
        stack.push(extension.extend(value, &storage));
        Ok(())
    }

    /// `array.set t`: pop a value, an index, and a reference; pack the value
    /// per the element storage type and store it.
    pub fn array_set(&self, stack: &mut ValueStack, ty: TypeIndex) -> Result<(), Trap> {
        let field = &self.array_type(ty).0;
        debug_assert!(field.mutability.is_var());
        let Some(payload) = stack.peek(2).unwrap_ref().payload() else {
            return Err(Trap::CastNullToNonNull);
        };
        let obj = payload.unwrap_array();
        let index = stack.peek(1).unwrap_i32() as u32;
        if index >= obj.len() {
            return Err(Trap::LengthOutOfBounds);
        }
        let value = stack.pop().pack(&field.storage);
        stack.pop();
        let target = stack.pop();
        target
            .unwrap_ref()
            .payload()
            .expect("checked above")
            .unwrap_array()
            .set(index as usize, value);
        Ok(())
    }

    /// `array.len`: pop an array reference, push its stored length.
    pub fn array_len(&self, stack: &mut ValueStack) -> Result<(), Trap> {
        let Some(payload) = stack.peek(0).unwrap_ref().payload() else {
            return Err(Trap::CastNullToNonNull);
        };
        let len = payload.unwrap_array().len();
        stack.pop();
        stack.push(len as i32);
        Ok(())
    }

    /// `any.convert_extern`: re-tag an external reference back into the
    /// internal hierarchy without changing its identity.
    pub fn any_convert_extern(&self, stack: &mut ValueStack) -> Result<(), Trap> {
        self.convert(stack, HeapType::Any)
    }

    /// `extern.convert_any`: re-tag an internal reference into the external
    /// hierarchy without changing its identity.
    pub fn extern_convert_any(&self, stack: &mut ValueStack) -> Result<(), Trap> {
        self.convert(stack, HeapType::Extern)
    }

    fn convert(&self, stack: &mut ValueStack, target: HeapType) -> Result<(), Trap> {
        let val = stack.pop().unwrap_ref().clone();
        let converted = if val.is_null() {
            Ref::null(self.module.types.bottom_of(&target))
        } else {
            val.with_type(RefType::new(false, target))
        };
        stack.push(converted);
        Ok(())
    }

    /// `ref.i31`: pop an `i32`, push a non-null `i31ref` carrying its low 31
    /// bits.
    pub fn ref_i31(&self, stack: &mut ValueStack) -> Result<(), Trap> {
        let value = stack.pop().unwrap_i32();
        stack.push(Ref::i31(value));
        Ok(())
    }

    fn i31_get(&self, stack: &mut ValueStack, signed: bool) -> Result<(), Trap> {
        let Some(payload) = stack.peek(0).unwrap_ref().payload() else {
            return Err(Trap::CastNullToNonNull);
        };
        let bits = payload.unwrap_i31();
        stack.pop();
        let value = if signed {
            // Sign-extend from 31 bits.
            (bits << 1) as i32 >> 1
        } else {
            bits as i32
        };
        stack.push(value);
        Ok(())
    }
}

/// How a packed slot is widened on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Extension {
    /// The plain accessor; only valid on unpacked storage.
    None,
    Signed,
    Unsigned,
}

impl Extension {
    fn check(&self, storage: &StorageType) {
        // The plain accessor on a packed field (and the suffixed accessors on
        // an unpacked one) are validation errors upstream.
        match self {
            Extension::None => debug_assert!(!storage.is_packed()),
            Extension::Signed | Extension::Unsigned => debug_assert!(storage.is_packed()),
        }
    }

    fn extend(&self, value: Val, storage: &StorageType) -> Val {
        match self {
            Extension::None => value,
            Extension::Signed => value.unpack_signed(storage),
            Extension::Unsigned => value.unpack_unsigned(storage),
        }
    }
}

/// Decode one already-packed element from its little-endian wire
/// representation.
fn decode_element(storage: &StorageType, chunk: &[u8]) -> Val {
    fn array<const N: usize>(chunk: &[u8]) -> [u8; N] {
        let mut out = [0; N];
        out.copy_from_slice(chunk);
        out
    }

    match storage {
        StorageType::I8 => Val::I32(i32::from(chunk[0])),
        StorageType::I16 => Val::I32(i32::from(u16::from_le_bytes(array(chunk)))),
        StorageType::Val(ValType::I32) => Val::I32(i32::from_le_bytes(array(chunk))),
        StorageType::Val(ValType::I64) => Val::I64(i64::from_le_bytes(array(chunk))),
        StorageType::Val(ValType::F32) => Val::F32(u32::from_le_bytes(array(chunk))),
        StorageType::Val(ValType::F64) => Val::F64(u64::from_le_bytes(array(chunk))),
        StorageType::Val(ValType::V128) => Val::V128(u128::from_le_bytes(array(chunk))),
        StorageType::Val(ValType::Ref(_)) => unreachable!("reference elements have no byte source"),
    }
}
