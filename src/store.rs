// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use alloc::sync::Arc;
use alloc::vec::Vec;
use alloc::boxed::Box;
use core::fmt;

use spin::{Mutex, RwLock};

use crate::indices::TypeIndex;
use crate::types::{ArrayType, ModuleTypes, StructType};
use crate::values::Val;

/// A store owns every heap object allocated by the GC instructions.
///
/// The store is the unique owner of all struct and array instances; the
/// references handed out by the allocation methods are cheap handles whose
/// identity is stable for the object's lifetime. The owning list only ever
/// grows, so a failed operation can never leave a half-published object
/// behind, and an object stays resident at least as long as any live handle
/// to it exists.
///
/// Allocation is serialized under a mutex so that host-side threads (for
/// example concurrent instantiations driven from a management thread) cannot
/// race on the growable backing vector. Execution itself is single-mutator;
/// synchronizing field mutations on a shared object across mutators is the
/// caller's responsibility.
pub struct Store {
    objects: Mutex<GcObjects>,
}

/// The owning lists behind the store's allocation mutex.
#[derive(Default)]
struct GcObjects {
    structs: Vec<Arc<StructObj>>,
    arrays: Vec<Arc<ArrayObj>>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// Constructs a new, empty store.
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(GcObjects::default()),
        }
    }

    /// The number of heap objects this store keeps alive.
    pub fn object_count(&self) -> usize {
        let objects = self.objects.lock();
        objects.structs.len() + objects.arrays.len()
    }

    /// Allocate a struct with all fields default-initialized: numeric zero,
    /// null reference.
    pub fn alloc_struct(
        &self,
        ty: TypeIndex,
        struct_ty: &StructType,
        types: &ModuleTypes,
    ) -> Arc<StructObj> {
        let fields = struct_ty
            .fields
            .iter()
            .map(|field| Val::default_for_storage(&field.storage, types))
            .collect();
        self.insert_struct(ty, fields)
    }

    /// Allocate a struct from the given field values.
    ///
    /// The values must already be packed per their field's storage type.
    pub fn alloc_struct_with(&self, ty: TypeIndex, fields: Box<[Val]>) -> Arc<StructObj> {
        self.insert_struct(ty, fields)
    }

    /// Allocate an array of `len` default-initialized elements.
    pub fn alloc_array(
        &self,
        ty: TypeIndex,
        array_ty: &ArrayType,
        len: u32,
        types: &ModuleTypes,
    ) -> Arc<ArrayObj> {
        let init = Val::default_for_storage(&array_ty.0.storage, types);
        self.alloc_array_splat(ty, len, init)
    }

    /// Allocate an array of `len` copies of `value`.
    ///
    /// The value must already be packed per the element storage type.
    pub fn alloc_array_splat(&self, ty: TypeIndex, len: u32, value: Val) -> Arc<ArrayObj> {
        let mut elems = Vec::with_capacity(len as usize);
        elems.resize(len as usize, value);
        self.insert_array(ty, elems)
    }

    /// Allocate an array from the given element values.
    ///
    /// The values must already be packed per the element storage type.
    pub fn alloc_array_with(&self, ty: TypeIndex, elems: Vec<Val>) -> Arc<ArrayObj> {
        self.insert_array(ty, elems)
    }

    fn insert_struct(&self, ty: TypeIndex, fields: Box<[Val]>) -> Arc<StructObj> {
        let obj = Arc::new(StructObj {
            ty,
            fields: RwLock::new(fields),
        });
        self.objects.lock().structs.push(obj.clone());
        obj
    }

    fn insert_array(&self, ty: TypeIndex, elems: Vec<Val>) -> Arc<ArrayObj> {
        let obj = Arc::new(ArrayObj {
            ty,
            elems: RwLock::new(elems),
        });
        self.objects.lock().arrays.push(obj.clone());
        obj
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("objects", &self.object_count())
            .finish()
    }
}

/// A struct instance.
///
/// The composite type never changes after allocation, and the field vector
/// always has exactly as many slots as the type has fields. Packed fields are
/// stored zero-extended in their `i32` slots.
pub struct StructObj {
    ty: TypeIndex,
    fields: RwLock<Box<[Val]>>,
}

impl StructObj {
    /// The defined type this struct was allocated with.
    #[inline]
    pub fn type_index(&self) -> TypeIndex {
        self.ty
    }

    /// The number of fields.
    pub fn len(&self) -> usize {
        self.fields.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read field `index` as stored, without unpacking.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds; field indices are validated against
    /// the struct's type before execution.
    pub fn get(&self, index: usize) -> Val {
        self.fields.read()[index].clone()
    }

    /// Overwrite field `index` with an already-packed value.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn set(&self, index: usize, value: Val) {
        self.fields.write()[index] = value;
    }
}

impl fmt::Debug for StructObj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructObj")
            .field("ty", &self.ty)
            .field("len", &self.len())
            .finish()
    }
}

/// An array instance.
///
/// Arrays are dynamically sized at allocation but not resizable. Packed
/// elements are stored zero-extended in their `i32` slots.
pub struct ArrayObj {
    ty: TypeIndex,
    elems: RwLock<Vec<Val>>,
}

impl ArrayObj {
    /// The defined type this array was allocated with.
    #[inline]
    pub fn type_index(&self) -> TypeIndex {
        self.ty
    }

    /// The stored length.
    pub fn len(&self) -> u32 {
        self.elems.read().len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.elems.read().is_empty()
    }

    /// Read element `index` as stored, without unpacking.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds; callers bounds-check against
    /// [`ArrayObj::len`] first.
    pub fn get(&self, index: usize) -> Val {
        self.elems.read()[index].clone()
    }

    /// Overwrite element `index` with an already-packed value.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn set(&self, index: usize, value: Val) {
        self.elems.write()[index] = value;
    }
}

impl fmt::Debug for ArrayObj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayObj")
            .field("ty", &self.ty)
            .field("len", &self.len())
            .finish()
    }
}
