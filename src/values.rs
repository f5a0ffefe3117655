// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use alloc::sync::Arc;

use crate::indices::{FuncIndex, TypeIndex};
use crate::store::{ArrayObj, StructObj};
use crate::types::{HeapType, ModuleTypes, RefType, StorageType, ValType};
use crate::utils::enum_accessors;

/// A runtime value.
///
/// Values are byte-copyable slots; cloning a reference duplicates a cheap
/// handle, never the referenced object. Floats are carried as raw bits.
#[derive(Debug, Clone)]
pub enum Val {
    I32(i32),
    I64(i64),
    F32(u32),
    F64(u64),
    V128(u128),
    /// An opaque reference to an object on the heap, or to host data.
    Ref(Ref),
}

impl Val {
    enum_accessors! {
        e
        (I32(i32) is_i32 get_i32 unwrap_i32 *e)
        (I64(i64) is_i64 get_i64 unwrap_i64 *e)
        (F32(f32) is_f32 get_f32 unwrap_f32 f32::from_bits(*e))
        (F64(f64) is_f64 get_f64 unwrap_f64 f64::from_bits(*e))
        (V128(u128) is_v128 get_v128 unwrap_v128 *e)
        (Ref(&Ref) is_ref get_ref unwrap_ref e)
    }

    /// Returns the default value for the given storage type: numeric zero, or
    /// a null reference.
    ///
    /// The null carries the bottom type of its hierarchy as its runtime type,
    /// which is why the module's type list is needed here.
    pub fn default_for_storage(storage: &StorageType, types: &ModuleTypes) -> Val {
        match storage {
            StorageType::I8 | StorageType::I16 => Val::I32(0),
            StorageType::Val(ValType::I32) => Val::I32(0),
            StorageType::Val(ValType::I64) => Val::I64(0),
            StorageType::Val(ValType::F32) => Val::F32(0),
            StorageType::Val(ValType::F64) => Val::F64(0),
            StorageType::Val(ValType::V128) => Val::V128(0),
            StorageType::Val(ValType::Ref(rt)) => {
                Val::Ref(Ref::null(types.bottom_of(&rt.heap_type)))
            }
        }
    }

    /// Narrow this value to the given storage type.
    ///
    /// `i32` payloads headed for packed storage are masked down to the storage
    /// width; everything else passes through unchanged. Idempotent.
    pub fn pack(self, storage: &StorageType) -> Val {
        match (storage, self) {
            (StorageType::I8, Val::I32(v)) => Val::I32(v & 0xFF),
            (StorageType::I16, Val::I32(v)) => Val::I32(v & 0xFFFF),
            (_, v) => v,
        }
    }

    /// Widen a value read back out of the given storage type, sign-extending
    /// from the storage width to `i32`. Identity on unpacked storage.
    pub fn unpack_signed(self, storage: &StorageType) -> Val {
        match (storage, self) {
            (StorageType::I8, Val::I32(v)) => Val::I32(i32::from(v as i8)),
            (StorageType::I16, Val::I32(v)) => Val::I32(i32::from(v as i16)),
            (_, v) => v,
        }
    }

    /// Widen a value read back out of the given storage type, zero-extending
    /// from the storage width to `i32`. Identity on unpacked storage.
    ///
    /// Packed slots are kept zero-extended at rest, so this is a no-op on
    /// well-formed storage.
    pub fn unpack_unsigned(self, storage: &StorageType) -> Val {
        match (storage, self) {
            (StorageType::I8, Val::I32(v)) => Val::I32(v & 0xFF),
            (StorageType::I16, Val::I32(v)) => Val::I32(v & 0xFFFF),
            (_, v) => v,
        }
    }
}

/// Elementwise lift of [`Val::pack`].
pub fn pack_vals<'a>(
    storages: impl IntoIterator<Item = &'a StorageType>,
    vals: impl IntoIterator<Item = Val>,
) -> impl Iterator<Item = Val> {
    storages
        .into_iter()
        .zip(vals)
        .map(|(storage, val)| val.pack(storage))
}

impl From<i32> for Val {
    #[inline]
    fn from(val: i32) -> Val {
        Val::I32(val)
    }
}

impl From<i64> for Val {
    #[inline]
    fn from(val: i64) -> Val {
        Val::I64(val)
    }
}

impl From<f32> for Val {
    #[inline]
    fn from(val: f32) -> Val {
        Val::F32(val.to_bits())
    }
}

impl From<f64> for Val {
    #[inline]
    fn from(val: f64) -> Val {
        Val::F64(val.to_bits())
    }
}

impl From<u128> for Val {
    #[inline]
    fn from(val: u128) -> Val {
        Val::V128(val)
    }
}

impl From<Ref> for Val {
    #[inline]
    fn from(val: Ref) -> Val {
        Val::Ref(val)
    }
}

/// A reference value: the runtime reference type plus either the null marker
/// or a non-null payload.
///
/// The type travels with the value because `ref.cast` and `ref.as_non_null`
/// re-tag a reference without touching its payload, and `ref.test` inspects
/// the most-precise runtime type of whatever it finds on the stack.
#[derive(Debug, Clone)]
pub struct Ref {
    ty: RefType,
    payload: Option<GcRef>,
}

/// The non-null payload of a reference.
#[derive(Debug, Clone)]
pub enum GcRef {
    /// An unboxed 31-bit integer.
    I31(u32),
    /// A struct allocated in the heap object store.
    Struct(Arc<StructObj>),
    /// An array allocated in the heap object store.
    Array(Arc<ArrayObj>),
    /// A function, resolved through the module's function index space.
    Func(FuncIndex),
}

impl GcRef {
    enum_accessors! {
        e
        (I31(u32) is_i31 get_i31 unwrap_i31 *e)
        (Struct(&Arc<StructObj>) is_struct get_struct unwrap_struct e)
        (Array(&Arc<ArrayObj>) is_array get_array unwrap_array e)
        (Func(FuncIndex) is_func get_func unwrap_func *e)
    }

    /// Do two payloads designate the same object?
    ///
    /// Pointer identity for structs and arrays, value identity for `i31`,
    /// index identity for functions.
    pub fn same(a: &GcRef, b: &GcRef) -> bool {
        match (a, b) {
            (GcRef::I31(a), GcRef::I31(b)) => a == b,
            (GcRef::Struct(a), GcRef::Struct(b)) => Arc::ptr_eq(a, b),
            (GcRef::Array(a), GcRef::Array(b)) => Arc::ptr_eq(a, b),
            (GcRef::Func(a), GcRef::Func(b)) => a == b,
            _ => false,
        }
    }
}

impl Ref {
    /// Construct a reference from its parts.
    pub fn new(ty: RefType, payload: Option<GcRef>) -> Ref {
        debug_assert!(
            ty.nullable || payload.is_some(),
            "non-nullable reference type with null payload"
        );
        Ref { ty, payload }
    }

    /// Create a null reference of the given heap type.
    ///
    /// Callers pass the bottom type of the hierarchy so the null carries its
    /// most precise runtime type (see [`ModuleTypes::bottom_of`]).
    pub fn null(heap_type: HeapType) -> Ref {
        Ref {
            ty: RefType::new(true, heap_type),
            payload: None,
        }
    }

    /// Create a non-null `i31ref` from the low 31 bits of `x`.
    pub fn i31(x: i32) -> Ref {
        Ref {
            ty: RefType::new(false, HeapType::I31),
            payload: Some(GcRef::I31((x as u32) & 0x7FFF_FFFF)),
        }
    }

    /// Create a non-null function reference, typed at the function's
    /// signature.
    pub fn func(func: FuncIndex, signature: TypeIndex) -> Ref {
        Ref {
            ty: RefType::new(false, HeapType::Defined(signature)),
            payload: Some(GcRef::Func(func)),
        }
    }

    /// Create a non-null reference to a struct object.
    pub fn struct_obj(ty: TypeIndex, obj: Arc<StructObj>) -> Ref {
        Ref {
            ty: RefType::new(false, HeapType::Defined(ty)),
            payload: Some(GcRef::Struct(obj)),
        }
    }

    /// Create a non-null reference to an array object.
    pub fn array_obj(ty: TypeIndex, obj: Arc<ArrayObj>) -> Ref {
        Ref {
            ty: RefType::new(false, HeapType::Defined(ty)),
            payload: Some(GcRef::Array(obj)),
        }
    }

    /// Is this a null reference?
    #[inline]
    pub fn is_null(&self) -> bool {
        self.payload.is_none()
    }

    /// Is this a non-null reference?
    #[inline]
    pub fn is_non_null(&self) -> bool {
        !self.is_null()
    }

    /// The runtime type of this reference.
    #[inline]
    pub fn ty(&self) -> &RefType {
        &self.ty
    }

    /// The payload, unless this reference is null.
    #[inline]
    pub fn payload(&self) -> Option<&GcRef> {
        self.payload.as_ref()
    }

    /// Re-tag this reference with a new type, keeping the payload (and
    /// therefore the identity) unchanged.
    pub fn with_type(self, ty: RefType) -> Ref {
        Ref {
            ty,
            payload: self.payload,
        }
    }

    /// Re-tag this reference as non-nullable, keeping the payload.
    pub fn as_non_nullable(self) -> Ref {
        debug_assert!(self.is_non_null());
        Ref {
            ty: self.ty.as_non_nullable(),
            payload: self.payload,
        }
    }

    /// Reference equality: both null, or both designating the same object.
    pub fn same(a: &Ref, b: &Ref) -> bool {
        match (&a.payload, &b.payload) {
            (None, None) => true,
            (Some(a), Some(b)) => GcRef::same(a, b),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ArrayType, CompositeType, FieldType, Mutability, sub_final};
    use alloc::vec;
    use alloc::vec::Vec;

    #[test]
    fn packing_is_idempotent_and_fits() {
        let samples = [
            0i32,
            1,
            -1,
            0x7F,
            0x80,
            0xFF,
            0x100,
            0x1_FF,
            0x7FFF,
            0x8000,
            0xFFFF,
            0x1_0000,
            i32::MIN,
            i32::MAX,
        ];
        for storage in [StorageType::I8, StorageType::I16] {
            let width = storage.bit_width().unwrap();
            for v in samples {
                let once = Val::I32(v).pack(&storage).unwrap_i32();
                let twice = Val::I32(once).pack(&storage).unwrap_i32();
                assert_eq!(once, twice);
                // The packed value fits in the storage width.
                assert_eq!(once as u32 >> width, 0);
            }
        }
        // Unpacked storage passes values through untouched.
        let storage = StorageType::Val(ValType::I64);
        assert_eq!(Val::I64(-5).pack(&storage).unwrap_i64(), -5);
    }

    #[test]
    fn unpacking_extends() {
        let packed = Val::I32(0x1_FF).pack(&StorageType::I8);
        assert_eq!(packed.clone().unwrap_i32(), 0xFF);
        assert_eq!(packed.clone().unpack_unsigned(&StorageType::I8).unwrap_i32(), 0xFF);
        assert_eq!(packed.unpack_signed(&StorageType::I8).unwrap_i32(), -1);

        let packed = Val::I32(0xFFFF).pack(&StorageType::I16);
        assert_eq!(packed.clone().unpack_unsigned(&StorageType::I16).unwrap_i32(), 0xFFFF);
        assert_eq!(packed.unpack_signed(&StorageType::I16).unwrap_i32(), -1);

        let packed = Val::I32(0x42).pack(&StorageType::I8);
        assert_eq!(packed.unpack_signed(&StorageType::I8).unwrap_i32(), 0x42);
    }

    #[test]
    fn pack_vals_is_elementwise() {
        let storages = [
            StorageType::I8,
            StorageType::I16,
            StorageType::Val(ValType::I32),
        ];
        let vals = vec![Val::I32(0x1FF), Val::I32(0x1_FFFF), Val::I32(0x1_FFFF)];
        let packed: Vec<i32> = pack_vals(storages.iter(), vals)
            .map(|v| v.unwrap_i32())
            .collect();
        assert_eq!(packed, [0xFF, 0xFFFF, 0x1_FFFF]);
    }

    #[test]
    fn i31_masks_to_31_bits() {
        let r = Ref::i31(-1);
        assert!(r.is_non_null());
        assert_eq!(r.payload().unwrap().unwrap_i31(), 0x7FFF_FFFF);
        assert_eq!(*r.ty(), RefType::new(false, HeapType::I31));

        let r = Ref::i31(42);
        assert_eq!(r.payload().unwrap().unwrap_i31(), 42);
    }

    #[test]
    fn reference_identity() {
        let store = crate::store::Store::new();
        let mut types = ModuleTypes::new();
        let arr_ty = types.add_singleton(sub_final(CompositeType::Array(ArrayType(FieldType {
            mutability: Mutability::Const,
            storage: StorageType::Val(ValType::I32),
        }))));

        let a = store.alloc_array_splat(arr_ty, 2, Val::I32(7));
        let ra1 = Ref::array_obj(arr_ty, a.clone());
        let ra2 = Ref::array_obj(arr_ty, a);
        let rb = Ref::array_obj(
            arr_ty,
            store.alloc_array_splat(arr_ty, 2, Val::I32(7)),
        );

        // Same object through two handles.
        assert!(Ref::same(&ra1, &ra2));
        // Distinct objects with equal contents are not the same reference.
        assert!(!Ref::same(&ra1, &rb));
        // Nulls are all equal, regardless of hierarchy.
        assert!(Ref::same(
            &Ref::null(HeapType::None),
            &Ref::null(HeapType::NoFunc)
        ));
        // A null is never equal to a non-null.
        assert!(!Ref::same(&ra1, &Ref::null(HeapType::None)));
        // i31 identity is value identity.
        assert!(Ref::same(&Ref::i31(5), &Ref::i31(5)));
        assert!(!Ref::same(&Ref::i31(5), &Ref::i31(6)));
    }

    #[test]
    fn retagging_keeps_payload() {
        let r = Ref::i31(9);
        let cast = r.clone().with_type(RefType::new(false, HeapType::Eq));
        assert!(Ref::same(&r, &cast));
        assert_eq!(cast.ty().heap_type, HeapType::Eq);

        let non_null = r.clone().as_non_nullable();
        assert!(!non_null.ty().nullable);
        assert!(Ref::same(&r, &non_null));
    }

    #[test]
    fn defaults_per_storage() {
        let types = ModuleTypes::new();
        assert_eq!(
            Val::default_for_storage(&StorageType::I8, &types).unwrap_i32(),
            0
        );
        assert_eq!(
            Val::default_for_storage(&StorageType::Val(ValType::I64), &types).unwrap_i64(),
            0
        );
        let null = Val::default_for_storage(
            &StorageType::Val(ValType::Ref(RefType::EQREF)),
            &types,
        );
        let null = null.unwrap_ref();
        assert!(null.is_null());
        assert_eq!(null.ty().heap_type, HeapType::None);
    }
}
