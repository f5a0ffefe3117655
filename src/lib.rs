// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The GC core of a WebAssembly engine: reference values, user-defined
//! struct and array types with recursion groups, the coinductive subtype
//! matcher, the heap object store, the `ref.*`/`struct.*`/`array.*`
//! instruction semantics, and the binary codec for the type section.
//!
//! The crate is `no_std` + `alloc`; the host-facing pieces (instruction
//! dispatch, linear memory, tables, compilation) live elsewhere and consume
//! this crate through [`Module`], [`Store`], [`GcOps`], and the matcher.

#![no_std]

extern crate alloc;

pub mod binary;
pub mod const_expr;
pub mod errors;
pub mod indices;
pub mod matcher;
pub mod module;
pub mod ops;
pub mod store;
pub mod trap;
pub mod types;
pub mod values;
mod utils;

pub use crate::errors::{Error, Malformed};
pub use crate::module::Module;
pub use crate::ops::{GcOp, GcOps, ValueStack};
pub use crate::store::Store;
pub use crate::trap::Trap;
pub use crate::values::{GcRef, Ref, Val};

/// Convenience alias for this crate's error type.
pub type Result<T, E = Error> = core::result::Result<T, E>;
