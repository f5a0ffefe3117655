// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use smallvec::SmallVec;

use crate::binary::module_parser::parse_heap_type;
use crate::binary::reader::BinaryReader;
use crate::errors::Malformed;
use crate::indices::{FuncIndex, GlobalIndex};
use crate::types::HeapType;

const END: u8 = 0x0B;
const GLOBAL_GET: u8 = 0x23;
const I32_CONST: u8 = 0x41;
const I64_CONST: u8 = 0x42;
const F32_CONST: u8 = 0x43;
const F64_CONST: u8 = 0x44;
const I32_ADD: u8 = 0x6A;
const I32_SUB: u8 = 0x6B;
const I32_MUL: u8 = 0x6C;
const I64_ADD: u8 = 0x7C;
const I64_SUB: u8 = 0x7D;
const I64_MUL: u8 = 0x7E;
const REF_NULL: u8 = 0xD0;
const REF_FUNC: u8 = 0xD2;
const GC_PREFIX: u8 = 0xFB;
const SIMD_PREFIX: u8 = 0xFD;
const GC_REF_I31: u32 = 0x1C;
const SIMD_V128_CONST: u32 = 0x0C;

/// A constant expression.
///
/// These are used to initialize globals, table elements, data segment
/// offsets, etc...
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ConstExpr {
    ops: SmallVec<[ConstOp; 2]>,
}

impl ConstExpr {
    /// Decode a constant expression, consuming its terminating `end` opcode.
    ///
    /// Returns the expression as well as the escaping function indices that
    /// appeared in `ref.func` instructions, if any.
    pub fn parse(reader: &mut BinaryReader<'_>) -> crate::Result<(Self, SmallVec<[FuncIndex; 1]>)> {
        let mut ops = SmallVec::<[ConstOp; 2]>::new();
        let mut escaped = SmallVec::<[FuncIndex; 1]>::new();
        loop {
            let opcode = reader.read_u8()?;
            if opcode == END {
                break;
            }

            let op = ConstOp::parse(opcode, reader)?;

            // Track any functions that appear in `ref.func` so that callers
            // can make sure to flag them as escaping.
            if let ConstOp::RefFunc(index) = op {
                escaped.push(index);
            }

            ops.push(op);
        }
        Ok((Self { ops }, escaped))
    }

    pub fn ops(&self) -> impl ExactSizeIterator<Item = ConstOp> + use<'_> {
        self.ops.iter().copied()
    }
}

/// The subset of Wasm opcodes that are constant.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ConstOp {
    I32Const(i32),
    I64Const(i64),
    F32Const(u32),
    F64Const(u64),
    V128Const(u128),
    GlobalGet(GlobalIndex),
    RefI31,
    RefNull(HeapType),
    RefFunc(FuncIndex),
    I32Add,
    I32Sub,
    I32Mul,
    I64Add,
    I64Sub,
    I64Mul,
}

impl ConstOp {
    fn parse(opcode: u8, reader: &mut BinaryReader<'_>) -> crate::Result<Self> {
        Ok(match opcode {
            I32_CONST => Self::I32Const(reader.read_s32_leb()?),
            I64_CONST => Self::I64Const(reader.read_s64_leb()?),
            F32_CONST => Self::F32Const(u32::from_le_bytes(reader.read_array()?)),
            F64_CONST => Self::F64Const(u64::from_le_bytes(reader.read_array()?)),
            GLOBAL_GET => Self::GlobalGet(GlobalIndex::from_u32(reader.read_u32_leb()?)),
            REF_NULL => Self::RefNull(parse_heap_type(reader)?),
            REF_FUNC => Self::RefFunc(FuncIndex::from_u32(reader.read_u32_leb()?)),
            I32_ADD => Self::I32Add,
            I32_SUB => Self::I32Sub,
            I32_MUL => Self::I32Mul,
            I64_ADD => Self::I64Add,
            I64_SUB => Self::I64Sub,
            I64_MUL => Self::I64Mul,
            GC_PREFIX => {
                let sub = reader.read_u32_leb()?;
                if sub == GC_REF_I31 {
                    Self::RefI31
                } else {
                    return Err(reader.malformed(Malformed::Section));
                }
            }
            SIMD_PREFIX => {
                let sub = reader.read_u32_leb()?;
                if sub == SIMD_V128_CONST {
                    Self::V128Const(u128::from_le_bytes(reader.read_array()?))
                } else {
                    return Err(reader.malformed(Malformed::Section));
                }
            }
            _ => return Err(reader.malformed(Malformed::Section)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_offset_expression() {
        // i32.const 8; end
        let mut reader = BinaryReader::new(&[0x41, 0x08, 0x0B]);
        let (expr, escaped) = ConstExpr::parse(&mut reader).unwrap();
        assert!(escaped.is_empty());
        let ops: smallvec::SmallVec<[ConstOp; 2]> = expr.ops().collect();
        assert_eq!(ops.as_slice(), &[ConstOp::I32Const(8)]);
        assert!(reader.is_empty());
    }

    #[test]
    fn parses_ref_items_and_tracks_escapes() {
        // ref.func 3; end
        let mut reader = BinaryReader::new(&[0xD2, 0x03, 0x0B]);
        let (expr, escaped) = ConstExpr::parse(&mut reader).unwrap();
        assert_eq!(escaped.as_slice(), &[FuncIndex::from_u32(3)]);
        assert_eq!(
            expr.ops().next(),
            Some(ConstOp::RefFunc(FuncIndex::from_u32(3)))
        );

        // ref.null nofunc; end
        let mut reader = BinaryReader::new(&[0xD0, 0x73, 0x0B]);
        let (expr, _) = ConstExpr::parse(&mut reader).unwrap();
        assert_eq!(expr.ops().next(), Some(ConstOp::RefNull(HeapType::NoFunc)));
    }

    #[test]
    fn rejects_non_constant_opcodes() {
        // local.get is not constant.
        let mut reader = BinaryReader::new(&[0x20, 0x00, 0x0B]);
        assert!(ConstExpr::parse(&mut reader).is_err());
    }
}
