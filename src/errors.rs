// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::trap::Trap;
use core::fmt;

/// What exactly is malformed about a rejected binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Malformed {
    /// The module preamble does not start with `\0asm`.
    Magic,
    /// The preamble carries an unknown version/layer combination.
    Version,
    /// An unknown composite- or sub-type discriminator in the type section.
    Sort,
    /// A section is unknown, out of order, duplicated, or has a bad size.
    Section,
    /// An unknown value-, storage-, or heap-type encoding.
    ValType,
    /// An unknown mutability flag on a field or global.
    Mut,
    /// An over-long or over-wide LEB128 integer.
    Leb128,
    /// The input ended in the middle of a construct.
    UnexpectedEof,
}

impl Malformed {
    fn as_str(&self) -> &'static str {
        match self {
            Malformed::Magic => "magic header not detected",
            Malformed::Version => "unknown binary version",
            Malformed::Sort => "malformed sort",
            Malformed::Section => "malformed section",
            Malformed::ValType => "malformed value type",
            Malformed::Mut => "malformed mutability",
            Malformed::Leb128 => "invalid LEB128 encoding",
            Malformed::UnexpectedEof => "unexpected end of input",
        }
    }
}

/// Error type for the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The input WebAssembly binary is malformed.
    Malformed {
        /// What was rejected.
        kind: Malformed,
        /// The bytecode offset where the error occurred.
        offset: usize,
    },
    /// A trap occurred while executing a GC operation.
    ///
    /// The opcode/offset pair is diagnostic context for the caller's logger;
    /// the offset is zero when the caller did not provide one.
    Trap {
        /// The trap that occurred.
        trap: Trap,
        /// The opcode of the trapping instruction.
        opcode: u32,
        /// The bytecode offset of the trapping instruction.
        offset: usize,
    },
    /// The input is a component; the component loader is not finished.
    Terminated,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Malformed { kind, offset } => {
                write!(f, "invalid WASM input at {offset:#x}: {}", kind.as_str())
            }
            Error::Trap {
                trap,
                opcode,
                offset,
            } => {
                write!(f, "trap at {offset:#x} (opcode {opcode:#x}): {trap}")
            }
            Error::Terminated => f.write_str("component model is not supported yet"),
        }
    }
}

impl From<Trap> for Error {
    fn from(trap: Trap) -> Self {
        Error::Trap {
            trap,
            opcode: 0,
            offset: 0,
        }
    }
}

impl core::error::Error for Error {}
