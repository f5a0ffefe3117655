// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;
use core::ops::Range;

use cranelift_entity::PrimaryMap;

use crate::indices::{RecGroupIndex, TypeIndex};
use crate::utils::enum_accessors;

/// Indicator of whether a global value, struct's field, or array type's
/// elements are mutable or not.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum Mutability {
    /// The global value, struct field, or array elements are constant and the
    /// value does not change.
    Const,
    /// The value of the global, struct field, or array elements can change over
    /// time.
    Var,
}

impl Mutability {
    /// Is this constant?
    #[inline]
    pub fn is_const(&self) -> bool {
        *self == Self::Const
    }

    /// Is this variable?
    #[inline]
    pub fn is_var(&self) -> bool {
        *self == Self::Var
    }
}

/// Represents the types of values in a WebAssembly module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValType {
    /// The value type is i32.
    I32,
    /// The value type is i64.
    I64,
    /// The value type is f32.
    F32,
    /// The value type is f64.
    F64,
    /// The value type is v128.
    V128,
    /// The value type is a reference.
    Ref(RefType),
}

impl ValType {
    /// Returns true if this is any of the numeric types.
    #[inline]
    pub fn is_num(&self) -> bool {
        matches!(self, Self::I32 | Self::I64 | Self::F32 | Self::F64)
    }

    pub fn is_i32(&self) -> bool {
        matches!(self, Self::I32)
    }
    pub fn is_i64(&self) -> bool {
        matches!(self, Self::I64)
    }
    pub fn is_f32(&self) -> bool {
        matches!(self, Self::F32)
    }
    pub fn is_f64(&self) -> bool {
        matches!(self, Self::F64)
    }
    pub fn is_v128(&self) -> bool {
        matches!(self, Self::V128)
    }

    enum_accessors!(
        e
        (Ref(&RefType) is_ref as_ref_type unwrap_ref_type e)
    );

    /// The width of this type's representation in bits.
    ///
    /// References have no fixed width and yield `None`.
    pub fn bit_width(&self) -> Option<u32> {
        match self {
            Self::I32 | Self::F32 => Some(32),
            Self::I64 | Self::F64 => Some(64),
            Self::V128 => Some(128),
            Self::Ref(_) => None,
        }
    }

    /// For a reference type, the same type with nullability stripped.
    /// Identity on all other types.
    pub fn as_non_nullable(self) -> ValType {
        match self {
            Self::Ref(r) => Self::Ref(r.as_non_nullable()),
            other => other,
        }
    }
}

impl fmt::Display for ValType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ValType::I32 => write!(f, "i32"),
            ValType::I64 => write!(f, "i64"),
            ValType::F32 => write!(f, "f32"),
            ValType::F64 => write!(f, "f64"),
            ValType::V128 => write!(f, "v128"),
            ValType::Ref(rt) => write!(f, "{rt}"),
        }
    }
}

/// A reference type: nullability plus the referent's heap type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RefType {
    pub nullable: bool,
    pub heap_type: HeapType,
}

impl RefType {
    /// The `externref` type, aka `(ref null extern)`.
    pub const EXTERNREF: RefType = RefType::new(true, HeapType::Extern);
    /// The `nullexternref` type, aka `(ref null noextern)`.
    pub const NULLEXTERNREF: RefType = RefType::new(true, HeapType::NoExtern);
    /// The `funcref` type, aka `(ref null func)`.
    pub const FUNCREF: RefType = RefType::new(true, HeapType::Func);
    /// The `nullfuncref` type, aka `(ref null nofunc)`.
    pub const NULLFUNCREF: RefType = RefType::new(true, HeapType::NoFunc);
    /// The `anyref` type, aka `(ref null any)`.
    pub const ANYREF: RefType = RefType::new(true, HeapType::Any);
    /// The `eqref` type, aka `(ref null eq)`.
    pub const EQREF: RefType = RefType::new(true, HeapType::Eq);
    /// The `i31ref` type, aka `(ref null i31)`.
    pub const I31REF: RefType = RefType::new(true, HeapType::I31);
    /// The `arrayref` type, aka `(ref null array)`.
    pub const ARRAYREF: RefType = RefType::new(true, HeapType::Array);
    /// The `structref` type, aka `(ref null struct)`.
    pub const STRUCTREF: RefType = RefType::new(true, HeapType::Struct);
    /// The `nullref` type, aka `(ref null none)`.
    pub const NULLREF: RefType = RefType::new(true, HeapType::None);

    /// Construct a new reference type.
    pub const fn new(nullable: bool, heap_type: HeapType) -> RefType {
        RefType {
            nullable,
            heap_type,
        }
    }

    /// Can this type of reference be null?
    #[inline]
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// The same reference type with nullability stripped.
    pub fn as_non_nullable(self) -> RefType {
        RefType {
            nullable: false,
            heap_type: self.heap_type,
        }
    }
}

impl fmt::Display for RefType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::FUNCREF => write!(f, "funcref"),
            Self::EXTERNREF => write!(f, "externref"),
            _ => {
                if self.nullable {
                    write!(f, "(ref null {})", self.heap_type)
                } else {
                    write!(f, "(ref {})", self.heap_type)
                }
            }
        }
    }
}

/// The referent category of a reference.
///
/// Either an abstract code from the fixed subtype lattice, or an index into
/// the enclosing module's flat type list. Whether a defined index names a
/// function, struct, or array type is recovered through
/// [`ModuleTypes::expand`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeapType {
    // External types.
    Extern,
    NoExtern,

    // Function types.
    Func,
    NoFunc,

    // Internal types.
    Any,
    Eq,
    I31,
    Array,
    Struct,
    None,

    /// A user-defined composite type.
    Defined(TypeIndex),
}

impl HeapType {
    /// Is this an abstract type?
    ///
    /// Types that are not abstract are concrete, user-defined types.
    #[inline]
    pub fn is_abstract(&self) -> bool {
        !self.is_defined()
    }

    /// Is this a concrete, user-defined heap type?
    #[inline]
    pub fn is_defined(&self) -> bool {
        matches!(self, Self::Defined(_))
    }

    /// Is this the top type within its type hierarchy?
    #[inline]
    pub fn is_top(&self) -> bool {
        matches!(self, Self::Any | Self::Extern | Self::Func)
    }

    /// Is this the bottom type within its type hierarchy?
    ///
    /// References typed at a bottom type must be null.
    #[inline]
    pub fn is_bottom(&self) -> bool {
        matches!(self, Self::None | Self::NoExtern | Self::NoFunc)
    }

    enum_accessors!(
        e
        (Defined(TypeIndex) is_defined_index as_defined_index unwrap_defined_index *e)
    );
}

impl fmt::Display for HeapType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            HeapType::Extern => write!(f, "extern"),
            HeapType::NoExtern => write!(f, "noextern"),
            HeapType::Func => write!(f, "func"),
            HeapType::NoFunc => write!(f, "nofunc"),
            HeapType::Any => write!(f, "any"),
            HeapType::Eq => write!(f, "eq"),
            HeapType::I31 => write!(f, "i31"),
            HeapType::Array => write!(f, "array"),
            HeapType::Struct => write!(f, "struct"),
            HeapType::None => write!(f, "none"),
            HeapType::Defined(i) => write!(f, "{}", i.as_u32()),
        }
    }
}

/// The storage type of a `struct` field or `array` element.
///
/// This is either a packed 8- or 16-bit integer, or else it is some unpacked
/// value type. The packed codes are storage-only and never appear as full
/// value types; their in-memory representation is zero-extended into an `i32`
/// slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageType {
    /// `i8`, an 8-bit integer.
    I8,
    /// `i16`, a 16-bit integer.
    I16,
    /// A value type.
    Val(ValType),
}

impl StorageType {
    /// Is this one of the packed storage codes?
    #[inline]
    pub fn is_packed(&self) -> bool {
        matches!(self, Self::I8 | Self::I16)
    }

    /// The width of this storage type's wire representation in bits.
    ///
    /// Reference storage has no fixed width and yields `None`.
    pub fn bit_width(&self) -> Option<u32> {
        match self {
            Self::I8 => Some(8),
            Self::I16 => Some(16),
            Self::Val(v) => v.bit_width(),
        }
    }

    /// The value type a read of this storage produces: packed codes unpack to
    /// `i32`, everything else is itself.
    pub fn unpacked(&self) -> ValType {
        match self {
            Self::I8 | Self::I16 => ValType::I32,
            Self::Val(v) => *v,
        }
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StorageType::I8 => write!(f, "i8"),
            StorageType::I16 => write!(f, "i16"),
            StorageType::Val(v) => fmt::Display::fmt(v, f),
        }
    }
}

/// The type of a struct field or an array's elements: the storage type plus
/// its mutability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldType {
    /// Whether this field can be mutated or not.
    pub mutability: Mutability,
    /// The field's storage type.
    pub storage: StorageType,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.mutability.is_var() {
            write!(f, "(mut {})", self.storage)
        } else {
            fmt::Display::fmt(&self.storage, f)
        }
    }
}

/// A WebAssembly function type.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct FuncType {
    pub params: Box<[ValType]>,
    pub results: Box<[ValType]>,
}

impl fmt::Display for FuncType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "(func")?;
        if !self.params.is_empty() {
            write!(f, " (param")?;
            for p in &self.params {
                write!(f, " {p}")?;
            }
            write!(f, ")")?;
        }
        if !self.results.is_empty() {
            write!(f, " (result")?;
            for r in &self.results {
                write!(f, " {r}")?;
            }
            write!(f, ")")?;
        }
        write!(f, ")")
    }
}

/// A GC-proposal array type.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct ArrayType(pub FieldType);

impl fmt::Display for ArrayType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "(array {})", self.0)
    }
}

/// A GC-proposal struct type.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct StructType {
    pub fields: Box<[FieldType]>,
}

impl fmt::Display for StructType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "(struct")?;
        for ty in &self.fields {
            write!(f, " {ty}")?;
        }
        write!(f, ")")
    }
}

/// A function, array, or struct type.
///
/// Introduced by the GC proposal.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum CompositeType {
    /// The type is a regular function.
    Func(FuncType),
    /// The type is a GC-proposal array.
    Array(ArrayType),
    /// The type is a GC-proposal struct.
    Struct(StructType),
}

impl CompositeType {
    enum_accessors! {
        c
        (Func(&FuncType) is_func as_func unwrap_func c)
        (Array(&ArrayType) is_array as_array unwrap_array c)
        (Struct(&StructType) is_struct as_struct unwrap_struct c)
    }

    /// The abstract heap type this composite is a subtype of.
    pub fn expand(&self) -> HeapType {
        match self {
            CompositeType::Func(_) => HeapType::Func,
            CompositeType::Array(_) => HeapType::Array,
            CompositeType::Struct(_) => HeapType::Struct,
        }
    }
}

impl fmt::Display for CompositeType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CompositeType::Func(ty) => fmt::Display::fmt(ty, f),
            CompositeType::Array(ty) => fmt::Display::fmt(ty, f),
            CompositeType::Struct(ty) => fmt::Display::fmt(ty, f),
        }
    }
}

/// A concrete, user-defined Wasm type.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct SubType {
    /// Whether this type is forbidden from being the supertype of any other
    /// type.
    pub is_final: bool,

    /// This type's declared supertypes.
    ///
    /// At most one in current Wasm, but the model permits a general list.
    pub supertypes: Box<[TypeIndex]>,

    /// The array, function, or struct that is defined.
    pub composite_type: CompositeType,
}

impl SubType {
    #[inline]
    pub fn is_func(&self) -> bool {
        self.composite_type.is_func()
    }

    #[inline]
    pub fn unwrap_func(&self) -> &FuncType {
        self.composite_type.unwrap_func()
    }

    #[inline]
    pub fn is_array(&self) -> bool {
        self.composite_type.is_array()
    }

    #[inline]
    pub fn unwrap_array(&self) -> &ArrayType {
        self.composite_type.unwrap_array()
    }

    #[inline]
    pub fn is_struct(&self) -> bool {
        self.composite_type.is_struct()
    }

    #[inline]
    pub fn unwrap_struct(&self) -> &StructType {
        self.composite_type.unwrap_struct()
    }
}

impl fmt::Display for SubType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_final && self.supertypes.is_empty() {
            fmt::Display::fmt(&self.composite_type, f)
        } else {
            write!(f, "(sub")?;
            if self.is_final {
                write!(f, " final")?;
            }
            for sup in &self.supertypes {
                write!(f, " {}", sup.as_u32())?;
            }
            write!(f, " {})", self.composite_type)
        }
    }
}

/// Types defined within a single WebAssembly module.
///
/// Types live in a flat list indexed by [`TypeIndex`]; recursion groups are
/// contiguous ranges of that list and are the unit of parsing and of
/// equi-recursive identity. Cyclic references between types are index values
/// into this list, not pointers.
#[derive(Debug, Clone)]
pub struct ModuleTypes {
    types: PrimaryMap<TypeIndex, SubType>,
    rec_groups: PrimaryMap<RecGroupIndex, Range<u32>>,
}

impl Default for ModuleTypes {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleTypes {
    pub fn new() -> Self {
        Self {
            types: PrimaryMap::new(),
            rec_groups: PrimaryMap::new(),
        }
    }

    /// The number of types defined in this module.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Get the type specified by `index` if it exists.
    ///
    /// A defined-type index is valid iff it is less than this list's length
    /// at the moment of lookup.
    pub fn get(&self, index: TypeIndex) -> Option<&SubType> {
        self.types.get(index)
    }

    /// Returns an iterator over all the types defined in this module.
    pub fn wasm_types(&self) -> impl ExactSizeIterator<Item = (TypeIndex, &SubType)> {
        self.types.iter()
    }

    /// Append a recursion group to the flat type list.
    ///
    /// Returns the index of the new group.
    pub fn add_rec_group(&mut self, group: impl IntoIterator<Item = SubType>) -> RecGroupIndex {
        let start = u32::try_from(self.types.len()).expect("type index space exhausted");
        for ty in group {
            self.types.push(ty);
        }
        let end = u32::try_from(self.types.len()).expect("type index space exhausted");
        self.rec_groups.push(start..end)
    }

    /// The number of recursion groups defined in this module.
    pub fn rec_group_count(&self) -> usize {
        self.rec_groups.len()
    }

    /// Returns an iterator over the recursion group ranges, in definition
    /// order.
    pub fn rec_groups(&self) -> impl ExactSizeIterator<Item = Range<u32>> + '_ {
        self.rec_groups.values().cloned()
    }

    /// Get the elements within a defined recursion group.
    pub fn rec_group_elements(
        &self,
        rec_group: RecGroupIndex,
    ) -> impl ExactSizeIterator<Item = TypeIndex> + use<'_> {
        let range = &self.rec_groups[rec_group];
        (range.start..range.end).map(TypeIndex::from_u32)
    }

    /// Resolve a heap type to the abstract code of its hierarchy: a defined
    /// index expands to the code of its composite type, an abstract code is
    /// itself.
    pub fn expand(&self, heap_type: &HeapType) -> HeapType {
        match heap_type {
            HeapType::Defined(index) => match self.get(*index) {
                Some(sub) => sub.composite_type.expand(),
                Option::None => {
                    debug_assert!(false, "dangling type index {index:?}");
                    HeapType::Any
                }
            },
            other => *other,
        }
    }

    /// Get the top type of the given heap type's hierarchy.
    ///
    /// The returned heap type is a supertype of all types in the hierarchy.
    pub fn top_of(&self, heap_type: &HeapType) -> HeapType {
        match self.expand(heap_type) {
            HeapType::Func | HeapType::NoFunc => HeapType::Func,
            HeapType::Extern | HeapType::NoExtern => HeapType::Extern,
            HeapType::Any
            | HeapType::Eq
            | HeapType::I31
            | HeapType::Array
            | HeapType::Struct
            | HeapType::None => HeapType::Any,
            HeapType::Defined(_) => unreachable!("expand returns abstract codes"),
        }
    }

    /// Get the bottom type of the given heap type's hierarchy.
    ///
    /// The returned heap type is a subtype of all types in the hierarchy.
    pub fn bottom_of(&self, heap_type: &HeapType) -> HeapType {
        match self.expand(heap_type) {
            HeapType::Func | HeapType::NoFunc => HeapType::NoFunc,
            HeapType::Extern | HeapType::NoExtern => HeapType::NoExtern,
            HeapType::Any
            | HeapType::Eq
            | HeapType::I31
            | HeapType::Array
            | HeapType::Struct
            | HeapType::None => HeapType::None,
            HeapType::Defined(_) => unreachable!("expand returns abstract codes"),
        }
    }
}

impl PartialEq for ModuleTypes {
    fn eq(&self, other: &Self) -> bool {
        self.types.len() == other.types.len()
            && self.rec_groups.len() == other.rec_groups.len()
            && self
                .types
                .values()
                .zip(other.types.values())
                .all(|(a, b)| a == b)
            && self
                .rec_groups
                .values()
                .zip(other.rec_groups.values())
                .all(|(a, b)| a == b)
    }
}

impl Eq for ModuleTypes {}

impl fmt::Display for ModuleTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, ty) in self.wasm_types() {
            writeln!(f, "{index:?}: {ty}")?;
        }
        Ok(())
    }
}

/// Convenience constructors used by the parser and in tests.
impl ModuleTypes {
    /// Append a singleton recursion group containing `ty`.
    pub fn add_singleton(&mut self, ty: SubType) -> TypeIndex {
        let group = self.add_rec_group([ty]);
        let range = &self.rec_groups[group];
        TypeIndex::from_u32(range.start)
    }
}

/// Shorthand for a final subtype with no declared supertypes.
pub fn sub_final(composite_type: CompositeType) -> SubType {
    SubType {
        is_final: true,
        supertypes: Box::new([]),
        composite_type,
    }
}

/// Shorthand for a non-final subtype with the given supertypes.
pub fn sub(supertypes: impl IntoIterator<Item = TypeIndex>, composite_type: CompositeType) -> SubType {
    SubType {
        is_final: false,
        supertypes: supertypes.into_iter().collect::<Vec<_>>().into_boxed_slice(),
        composite_type,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;

    fn i32_const_field() -> FieldType {
        FieldType {
            mutability: Mutability::Const,
            storage: StorageType::Val(ValType::I32),
        }
    }

    #[test]
    fn bit_widths() {
        assert_eq!(StorageType::I8.bit_width(), Some(8));
        assert_eq!(StorageType::I16.bit_width(), Some(16));
        assert_eq!(StorageType::Val(ValType::I32).bit_width(), Some(32));
        assert_eq!(StorageType::Val(ValType::F32).bit_width(), Some(32));
        assert_eq!(StorageType::Val(ValType::I64).bit_width(), Some(64));
        assert_eq!(StorageType::Val(ValType::F64).bit_width(), Some(64));
        assert_eq!(StorageType::Val(ValType::V128).bit_width(), Some(128));
        assert_eq!(
            StorageType::Val(ValType::Ref(RefType::ANYREF)).bit_width(),
            None
        );
    }

    #[test]
    fn packed_predicate() {
        assert!(StorageType::I8.is_packed());
        assert!(StorageType::I16.is_packed());
        assert!(!StorageType::Val(ValType::I32).is_packed());
        assert_eq!(StorageType::I8.unpacked(), ValType::I32);
        assert_eq!(StorageType::I16.unpacked(), ValType::I32);
        assert_eq!(
            StorageType::Val(ValType::F64).unpacked(),
            ValType::F64
        );
    }

    #[test]
    fn non_nullable_conversion() {
        let anyref = ValType::Ref(RefType::ANYREF);
        assert_eq!(
            anyref.as_non_nullable(),
            ValType::Ref(RefType::new(false, HeapType::Any))
        );
        // Identity on non-references.
        assert_eq!(ValType::I64.as_non_nullable(), ValType::I64);
    }

    #[test]
    fn composite_expansion() {
        let func = CompositeType::Func(FuncType {
            params: Box::new([]),
            results: Box::new([]),
        });
        let array = CompositeType::Array(ArrayType(i32_const_field()));
        let strct = CompositeType::Struct(StructType {
            fields: Box::new([i32_const_field()]),
        });
        assert_eq!(func.expand(), HeapType::Func);
        assert_eq!(array.expand(), HeapType::Array);
        assert_eq!(strct.expand(), HeapType::Struct);
    }

    #[test]
    fn index_validity_at_lookup() {
        let mut types = ModuleTypes::new();
        let idx = types.add_singleton(sub_final(CompositeType::Array(ArrayType(
            i32_const_field(),
        ))));
        assert!(types.get(idx).is_some());
        assert!(types.get(TypeIndex::from_u32(1)).is_none());
    }

    #[test]
    fn tops_and_bottoms() {
        let mut types = ModuleTypes::new();
        let s = types.add_singleton(sub_final(CompositeType::Struct(StructType {
            fields: Box::new([]),
        })));
        let f = types.add_singleton(sub_final(CompositeType::Func(FuncType {
            params: Box::new([]),
            results: Box::new([]),
        })));

        assert_eq!(types.top_of(&HeapType::Defined(s)), HeapType::Any);
        assert_eq!(types.bottom_of(&HeapType::Defined(s)), HeapType::None);
        assert_eq!(types.top_of(&HeapType::Defined(f)), HeapType::Func);
        assert_eq!(types.bottom_of(&HeapType::Defined(f)), HeapType::NoFunc);
        assert_eq!(types.top_of(&HeapType::I31), HeapType::Any);
        assert_eq!(types.bottom_of(&HeapType::Extern), HeapType::NoExtern);

        assert!(HeapType::Any.is_top());
        assert!(HeapType::None.is_bottom());
        assert!(!HeapType::Eq.is_top());
    }

    #[test]
    fn rec_group_ranges() {
        let mut types = ModuleTypes::new();
        let g0 = types.add_rec_group([
            sub_final(CompositeType::Struct(StructType {
                fields: Box::new([]),
            })),
            sub_final(CompositeType::Array(ArrayType(i32_const_field()))),
        ]);
        let g1 = types.add_rec_group([sub_final(CompositeType::Func(FuncType {
            params: Box::new([]),
            results: Box::new([]),
        }))]);

        let g0_elems: Vec<_> = types.rec_group_elements(g0).collect();
        assert_eq!(g0_elems, [TypeIndex::from_u32(0), TypeIndex::from_u32(1)]);
        let g1_elems: Vec<_> = types.rec_group_elements(g1).collect();
        assert_eq!(g1_elems, [TypeIndex::from_u32(2)]);
        assert_eq!(types.rec_group_count(), 2);
    }

    #[test]
    fn display_forms() {
        let field = FieldType {
            mutability: Mutability::Var,
            storage: StorageType::I8,
        };
        assert_eq!(format!("{field}"), "(mut i8)");
        assert_eq!(format!("{}", RefType::FUNCREF), "funcref");
        assert_eq!(
            format!("{}", RefType::new(false, HeapType::Struct)),
            "(ref struct)"
        );
        assert_eq!(format!("{}", ValType::Ref(RefType::EXTERNREF)), "externref");
    }
}
