// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The subtype relation over value types.
//!
//! `match_val_types(expected, got, ..)` decides "got ≤ expected". The
//! relation is coinductive over the defined-type graph: a pair of indices
//! that recurs during a traversal is assumed equal at the cut, so cycles
//! through recursion groups terminate and count as success.

use hashbrown::HashSet;

use crate::indices::TypeIndex;
use crate::types::{
    CompositeType, FieldType, HeapType, ModuleTypes, RefType, StorageType, ValType,
};

/// Does `got` match `expected`?
///
/// That is, is `got` a subtype of `expected`? `expected_types` and
/// `got_types` are the type lists of the modules each side's defined indices
/// point into; runtime checks within one instance pass the same list twice.
pub fn match_val_types(
    expected: &ValType,
    got: &ValType,
    expected_types: &ModuleTypes,
    got_types: &ModuleTypes,
) -> bool {
    Matcher::new().match_val(expected, expected_types, got, got_types)
}

/// Does the reference type `got` match `expected`?
pub fn match_ref_types(
    expected: &RefType,
    got: &RefType,
    expected_types: &ModuleTypes,
    got_types: &ModuleTypes,
) -> bool {
    Matcher::new().match_ref(expected, expected_types, got, got_types)
}

struct Matcher {
    /// Pairs of defined-type indices currently being compared. A recurrence
    /// is interpreted as success.
    assumed: HashSet<(TypeIndex, TypeIndex)>,
}

impl Matcher {
    fn new() -> Self {
        Self {
            assumed: HashSet::new(),
        }
    }

    fn match_val(
        &mut self,
        expected: &ValType,
        expected_types: &ModuleTypes,
        got: &ValType,
        got_types: &ModuleTypes,
    ) -> bool {
        match (expected, got) {
            (ValType::I32, ValType::I32)
            | (ValType::I64, ValType::I64)
            | (ValType::F32, ValType::F32)
            | (ValType::F64, ValType::F64)
            | (ValType::V128, ValType::V128) => true,
            (ValType::Ref(expected), ValType::Ref(got)) => {
                self.match_ref(expected, expected_types, got, got_types)
            }
            (ValType::I32, _)
            | (ValType::I64, _)
            | (ValType::F32, _)
            | (ValType::F64, _)
            | (ValType::V128, _)
            | (ValType::Ref(_), _) => false,
        }
    }

    fn match_ref(
        &mut self,
        expected: &RefType,
        expected_types: &ModuleTypes,
        got: &RefType,
        got_types: &ModuleTypes,
    ) -> bool {
        if !expected.nullable && got.nullable {
            return false;
        }
        self.match_heap(
            &expected.heap_type,
            expected_types,
            &got.heap_type,
            got_types,
        )
    }

    fn match_heap(
        &mut self,
        expected: &HeapType,
        expected_types: &ModuleTypes,
        got: &HeapType,
        got_types: &ModuleTypes,
    ) -> bool {
        match (expected, got) {
            (HeapType::Defined(expected), HeapType::Defined(got)) => {
                self.match_defined(*expected, expected_types, *got, got_types)
            }
            // A defined type admits only the bottom of its own hierarchy from
            // the abstract side.
            (HeapType::Defined(expected), got) => {
                got.is_bottom()
                    && match expected_types.expand(&HeapType::Defined(*expected)) {
                        HeapType::Func => matches!(got, HeapType::NoFunc),
                        HeapType::Struct | HeapType::Array => matches!(got, HeapType::None),
                        _ => false,
                    }
            }
            // A defined got type behaves like the abstract code it expands to.
            (expected, HeapType::Defined(got)) => {
                let got = got_types.expand(&HeapType::Defined(*got));
                match_abstract(expected, &got)
            }
            (expected, got) => match_abstract(expected, got),
        }
    }

    fn match_defined(
        &mut self,
        expected: TypeIndex,
        expected_types: &ModuleTypes,
        got: TypeIndex,
        got_types: &ModuleTypes,
    ) -> bool {
        if expected == got {
            return true;
        }
        // Coinduction: assume in-progress pairs are equal at the cut.
        if !self.assumed.insert((expected, got)) {
            return true;
        }

        let Some(got_sub) = got_types.get(got) else {
            return false;
        };
        // Nominal step: any declared supertype of `got` that matches wins.
        for &sup in &got_sub.supertypes {
            if self.match_defined(expected, expected_types, sup, got_types) {
                return true;
            }
        }

        let Some(expected_sub) = expected_types.get(expected) else {
            return false;
        };
        self.match_composite(
            &expected_sub.composite_type,
            expected_types,
            &got_sub.composite_type,
            got_types,
        )
    }

    fn match_composite(
        &mut self,
        expected: &CompositeType,
        expected_types: &ModuleTypes,
        got: &CompositeType,
        got_types: &ModuleTypes,
    ) -> bool {
        match (expected, got) {
            (CompositeType::Func(expected), CompositeType::Func(got)) => {
                // Parameters are contravariant, results covariant.
                expected.params.len() == got.params.len()
                    && expected.results.len() == got.results.len()
                    && expected
                        .params
                        .iter()
                        .zip(&got.params)
                        .all(|(e, g)| self.match_val(g, got_types, e, expected_types))
                    && expected
                        .results
                        .iter()
                        .zip(&got.results)
                        .all(|(e, g)| self.match_val(e, expected_types, g, got_types))
            }
            (CompositeType::Struct(expected), CompositeType::Struct(got)) => {
                // Width: got may have extra trailing fields. Depth: each
                // shared field must match.
                got.fields.len() >= expected.fields.len()
                    && expected
                        .fields
                        .iter()
                        .zip(&got.fields)
                        .all(|(e, g)| self.match_field(e, expected_types, g, got_types))
            }
            (CompositeType::Array(expected), CompositeType::Array(got)) => {
                self.match_field(&expected.0, expected_types, &got.0, got_types)
            }
            _ => false,
        }
    }

    fn match_field(
        &mut self,
        expected: &FieldType,
        expected_types: &ModuleTypes,
        got: &FieldType,
        got_types: &ModuleTypes,
    ) -> bool {
        if expected.mutability != got.mutability {
            return false;
        }
        let covariant = self.match_storage(&expected.storage, expected_types, &got.storage, got_types);
        if expected.mutability.is_const() {
            covariant
        } else {
            // Mutable fields are invariant.
            covariant
                && self.match_storage(&got.storage, got_types, &expected.storage, expected_types)
        }
    }

    fn match_storage(
        &mut self,
        expected: &StorageType,
        expected_types: &ModuleTypes,
        got: &StorageType,
        got_types: &ModuleTypes,
    ) -> bool {
        match (expected, got) {
            (StorageType::I8, StorageType::I8) | (StorageType::I16, StorageType::I16) => true,
            (StorageType::Val(expected), StorageType::Val(got)) => {
                self.match_val(expected, expected_types, got, got_types)
            }
            _ => false,
        }
    }
}

/// The fixed lattice over abstract heap types; edges go from subtype to
/// supertype:
///
/// ```text
/// None   ≤ I31, Struct, Array ≤ Eq ≤ Any
/// NoFunc ≤ Func
/// NoExtern ≤ Extern
/// ```
///
/// `Any`, `Func`, and `Extern` are three disjoint tops; any cross-family pair
/// is false.
fn match_abstract(expected: &HeapType, got: &HeapType) -> bool {
    match (got, expected) {
        (HeapType::Extern, HeapType::Extern) => true,
        (HeapType::Extern, _) => false,

        (HeapType::NoExtern, HeapType::NoExtern | HeapType::Extern) => true,
        (HeapType::NoExtern, _) => false,

        (HeapType::Func, HeapType::Func) => true,
        (HeapType::Func, _) => false,

        (HeapType::NoFunc, HeapType::NoFunc | HeapType::Func) => true,
        (HeapType::NoFunc, _) => false,

        (HeapType::Any, HeapType::Any) => true,
        (HeapType::Any, _) => false,

        (HeapType::Eq, HeapType::Eq | HeapType::Any) => true,
        (HeapType::Eq, _) => false,

        (
            HeapType::I31,
            HeapType::I31 | HeapType::Eq | HeapType::Any,
        ) => true,
        (HeapType::I31, _) => false,

        (
            HeapType::Struct,
            HeapType::Struct | HeapType::Eq | HeapType::Any,
        ) => true,
        (HeapType::Struct, _) => false,

        (
            HeapType::Array,
            HeapType::Array | HeapType::Eq | HeapType::Any,
        ) => true,
        (HeapType::Array, _) => false,

        (
            HeapType::None,
            HeapType::None
            | HeapType::I31
            | HeapType::Struct
            | HeapType::Array
            | HeapType::Eq
            | HeapType::Any,
        ) => true,
        (HeapType::None, _) => false,

        (HeapType::Defined(_), _) | (_, HeapType::Defined(_)) => {
            unreachable!("defined indices are resolved before the abstract lattice")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        ArrayType, FuncType, Mutability, StructType, sub, sub_final,
    };
    use alloc::boxed::Box;
    use alloc::vec::Vec;

    const ABSTRACT: [HeapType; 10] = [
        HeapType::Any,
        HeapType::Eq,
        HeapType::I31,
        HeapType::Struct,
        HeapType::Array,
        HeapType::None,
        HeapType::Func,
        HeapType::NoFunc,
        HeapType::Extern,
        HeapType::NoExtern,
    ];

    fn matches_heap(expected: HeapType, got: HeapType, types: &ModuleTypes) -> bool {
        match_ref_types(
            &RefType::new(true, expected),
            &RefType::new(true, got),
            types,
            types,
        )
    }

    fn field(mutability: Mutability, storage: StorageType) -> FieldType {
        FieldType {
            mutability,
            storage,
        }
    }

    #[test]
    fn abstract_lattice_is_reflexive() {
        let types = ModuleTypes::new();
        for ht in ABSTRACT {
            assert!(matches_heap(ht, ht, &types), "{ht} ≤ {ht}");
        }
    }

    #[test]
    fn abstract_lattice_is_transitive() {
        let types = ModuleTypes::new();
        for a in ABSTRACT {
            for b in ABSTRACT {
                for c in ABSTRACT {
                    if matches_heap(b, a, &types) && matches_heap(c, b, &types) {
                        assert!(matches_heap(c, a, &types), "{a} ≤ {b} ≤ {c}");
                    }
                }
            }
        }
    }

    #[test]
    fn abstract_lattice_edges() {
        let types = ModuleTypes::new();
        for sub in [HeapType::I31, HeapType::Struct, HeapType::Array] {
            assert!(matches_heap(HeapType::Eq, sub, &types));
            assert!(matches_heap(HeapType::Any, sub, &types));
            assert!(matches_heap(sub, HeapType::None, &types));
            assert!(!matches_heap(sub, HeapType::Eq, &types));
        }
        assert!(matches_heap(HeapType::Func, HeapType::NoFunc, &types));
        assert!(matches_heap(HeapType::Extern, HeapType::NoExtern, &types));

        // The three tops are disjoint.
        assert!(!matches_heap(HeapType::Any, HeapType::Func, &types));
        assert!(!matches_heap(HeapType::Func, HeapType::Extern, &types));
        assert!(!matches_heap(HeapType::Extern, HeapType::Any, &types));
        assert!(!matches_heap(HeapType::Any, HeapType::NoFunc, &types));
        assert!(!matches_heap(HeapType::Func, HeapType::None, &types));
    }

    #[test]
    fn nullability_gate() {
        let types = ModuleTypes::new();
        let nullable = RefType::new(true, HeapType::Any);
        let non_null = RefType::new(false, HeapType::Any);
        // Non-null is accepted where nullable is expected, not vice versa.
        assert!(match_ref_types(&nullable, &non_null, &types, &types));
        assert!(!match_ref_types(&non_null, &nullable, &types, &types));
        assert!(match_ref_types(&non_null, &non_null, &types, &types));
    }

    #[test]
    fn non_reference_types_match_on_identical_code() {
        let types = ModuleTypes::new();
        assert!(match_val_types(&ValType::I32, &ValType::I32, &types, &types));
        assert!(!match_val_types(&ValType::I32, &ValType::I64, &types, &types));
        assert!(!match_val_types(
            &ValType::F64,
            &ValType::Ref(RefType::ANYREF),
            &types,
            &types
        ));
    }

    #[test]
    fn declared_supertype_chain() {
        // sub $a (struct (field i32));
        // sub $a $b (struct (field i32) (field f64));
        let mut types = ModuleTypes::new();
        let a = types.add_singleton(sub(
            [],
            CompositeType::Struct(StructType {
                fields: Box::new([field(Mutability::Const, StorageType::Val(ValType::I32))]),
            }),
        ));
        let b = types.add_singleton(sub(
            [a],
            CompositeType::Struct(StructType {
                fields: Box::new([
                    field(Mutability::Const, StorageType::Val(ValType::I32)),
                    field(Mutability::Const, StorageType::Val(ValType::F64)),
                ]),
            }),
        ));

        assert!(matches_heap(HeapType::Defined(a), HeapType::Defined(b), &types));
        assert!(!matches_heap(HeapType::Defined(b), HeapType::Defined(a), &types));

        // Defined struct types sit below the abstract struct/eq/any chain.
        assert!(matches_heap(HeapType::Struct, HeapType::Defined(b), &types));
        assert!(matches_heap(HeapType::Eq, HeapType::Defined(b), &types));
        assert!(matches_heap(HeapType::Any, HeapType::Defined(b), &types));
        assert!(!matches_heap(HeapType::I31, HeapType::Defined(b), &types));
        assert!(!matches_heap(HeapType::Func, HeapType::Defined(b), &types));

        // Only the bottom of the matching hierarchy matches a defined type.
        assert!(matches_heap(HeapType::Defined(b), HeapType::None, &types));
        assert!(!matches_heap(HeapType::Defined(b), HeapType::NoFunc, &types));
        assert!(!matches_heap(HeapType::Defined(b), HeapType::I31, &types));
    }

    #[test]
    fn structural_struct_match_without_declared_supertype() {
        let mut types = ModuleTypes::new();
        let narrow = types.add_singleton(sub_final(CompositeType::Struct(StructType {
            fields: Box::new([field(Mutability::Const, StorageType::I8)]),
        })));
        let wide = types.add_singleton(sub_final(CompositeType::Struct(StructType {
            fields: Box::new([
                field(Mutability::Const, StorageType::I8),
                field(Mutability::Var, StorageType::Val(ValType::I64)),
            ]),
        })));

        // No declared chain, but the bodies are structurally compatible.
        assert!(matches_heap(
            HeapType::Defined(narrow),
            HeapType::Defined(wide),
            &types
        ));
        assert!(!matches_heap(
            HeapType::Defined(wide),
            HeapType::Defined(narrow),
            &types
        ));
    }

    #[test]
    fn field_variance() {
        let mut types = ModuleTypes::new();
        let eq_const = types.add_singleton(sub_final(CompositeType::Array(ArrayType(field(
            Mutability::Const,
            StorageType::Val(ValType::Ref(RefType::EQREF)),
        )))));
        let i31_const = types.add_singleton(sub_final(CompositeType::Array(ArrayType(field(
            Mutability::Const,
            StorageType::Val(ValType::Ref(RefType::I31REF)),
        )))));
        let eq_var = types.add_singleton(sub_final(CompositeType::Array(ArrayType(field(
            Mutability::Var,
            StorageType::Val(ValType::Ref(RefType::EQREF)),
        )))));
        let i31_var = types.add_singleton(sub_final(CompositeType::Array(ArrayType(field(
            Mutability::Var,
            StorageType::Val(ValType::Ref(RefType::I31REF)),
        )))));

        // Const fields are covariant.
        assert!(matches_heap(
            HeapType::Defined(eq_const),
            HeapType::Defined(i31_const),
            &types
        ));
        assert!(!matches_heap(
            HeapType::Defined(i31_const),
            HeapType::Defined(eq_const),
            &types
        ));
        // Var fields are invariant.
        assert!(!matches_heap(
            HeapType::Defined(eq_var),
            HeapType::Defined(i31_var),
            &types
        ));
        assert!(matches_heap(
            HeapType::Defined(eq_var),
            HeapType::Defined(eq_var),
            &types
        ));
        // Mutability must coincide.
        assert!(!matches_heap(
            HeapType::Defined(eq_const),
            HeapType::Defined(eq_var),
            &types
        ));
        // Packed storage matches only itself.
        let i8_arr = types.add_singleton(sub_final(CompositeType::Array(ArrayType(field(
            Mutability::Const,
            StorageType::I8,
        )))));
        let i16_arr = types.add_singleton(sub_final(CompositeType::Array(ArrayType(field(
            Mutability::Const,
            StorageType::I16,
        )))));
        assert!(!matches_heap(
            HeapType::Defined(i16_arr),
            HeapType::Defined(i8_arr),
            &types
        ));
        assert!(matches_heap(
            HeapType::Defined(i8_arr),
            HeapType::Defined(i8_arr),
            &types
        ));
    }

    #[test]
    fn func_params_contravariant_results_covariant() {
        let mut types = ModuleTypes::new();
        let take_eq_give_i31 = types.add_singleton(sub_final(CompositeType::Func(FuncType {
            params: Box::new([ValType::Ref(RefType::EQREF)]),
            results: Box::new([ValType::Ref(RefType::I31REF)]),
        })));
        let take_i31_give_eq = types.add_singleton(sub_final(CompositeType::Func(FuncType {
            params: Box::new([ValType::Ref(RefType::I31REF)]),
            results: Box::new([ValType::Ref(RefType::EQREF)]),
        })));

        // A function accepting the wider eqref and returning the narrower
        // i31ref can stand in where i31→eq is expected...
        assert!(matches_heap(
            HeapType::Defined(take_i31_give_eq),
            HeapType::Defined(take_eq_give_i31),
            &types
        ));
        // ...but never the other way around.
        assert!(!matches_heap(
            HeapType::Defined(take_eq_give_i31),
            HeapType::Defined(take_i31_give_eq),
            &types
        ));

        // Arity must agree in both positions.
        let nullary = types.add_singleton(sub_final(CompositeType::Func(FuncType {
            params: Box::new([]),
            results: Box::new([]),
        })));
        assert!(!matches_heap(
            HeapType::Defined(nullary),
            HeapType::Defined(take_eq_give_i31),
            &types
        ));
    }

    #[test]
    fn recursive_types_terminate() {
        // rec { $a = struct (field (ref null $b)); $b = struct (field (ref null $a)) }
        // and an equi-recursive copy of the same group.
        let mut types = ModuleTypes::new();
        let node = |peer: u32| {
            sub_final(CompositeType::Struct(StructType {
                fields: Box::new([field(
                    Mutability::Const,
                    StorageType::Val(ValType::Ref(RefType::new(
                        true,
                        HeapType::Defined(TypeIndex::from_u32(peer)),
                    ))),
                )]),
            }))
        };
        types.add_rec_group([node(1), node(0)]);
        types.add_rec_group([node(3), node(2)]);

        let a = TypeIndex::from_u32(0);
        let a2 = TypeIndex::from_u32(2);

        // The traversal cycles through (a, a2) → (b, b2) → (a, a2); the
        // recurrence is treated as success in both directions.
        assert!(matches_heap(HeapType::Defined(a), HeapType::Defined(a2), &types));
        assert!(matches_heap(HeapType::Defined(a2), HeapType::Defined(a), &types));
    }

    #[test]
    fn match_is_reflexive_and_transitive_over_defined_chains() {
        let mut types = ModuleTypes::new();
        let a = types.add_singleton(sub(
            [],
            CompositeType::Struct(StructType {
                fields: Box::new([]),
            }),
        ));
        let b = types.add_singleton(sub(
            [a],
            CompositeType::Struct(StructType {
                fields: Box::new([field(Mutability::Const, StorageType::I8)]),
            }),
        ));
        let c = types.add_singleton(sub(
            [b],
            CompositeType::Struct(StructType {
                fields: Box::new([
                    field(Mutability::Const, StorageType::I8),
                    field(Mutability::Const, StorageType::I16),
                ]),
            }),
        ));

        let all: Vec<HeapType> = [a, b, c].iter().map(|i| HeapType::Defined(*i)).collect();
        for ht in &all {
            assert!(matches_heap(*ht, *ht, &types));
        }
        // a ≥ b ≥ c pairwise implies a ≥ c.
        assert!(matches_heap(all[0], all[1], &types));
        assert!(matches_heap(all[1], all[2], &types));
        assert!(matches_heap(all[0], all[2], &types));

        // Mutual match implies equality up to equi-recursion: b and c do not
        // mutually match, a distinct pair that does match both ways is the
        // same type.
        assert!(!(matches_heap(all[1], all[2], &types) && matches_heap(all[2], all[1], &types)));
    }
}
