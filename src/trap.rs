// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::fmt;

/// Runtime failures raised by the GC operations.
///
/// Traps are propagated, never retried. An operation that traps consumes no
/// operands and pushes no results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trap {
    /// A null reference reached a position that requires a non-null one.
    ///
    /// Raised by `ref.as_non_null` on a null operand, by `ref.cast` on a
    /// failed cast, and by `array.len` or any field access through a null
    /// reference.
    CastNullToNonNull,
    /// A source range exceeded the underlying segment or array.
    ///
    /// Raised by `array.new_data`/`array.new_elem` when the requested range
    /// runs past the end of the segment, and by array accessors with an
    /// out-of-bounds index.
    LengthOutOfBounds,
}

impl fmt::Display for Trap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trap::CastNullToNonNull => f.write_str("null reference cast to non-null"),
            Trap::LengthOutOfBounds => f.write_str("length out of bounds"),
        }
    }
}

impl core::error::Error for Trap {}
