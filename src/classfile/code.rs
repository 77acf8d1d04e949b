//! Bytecode walker for `Code` attributes
//!
//! The shrinker only cares about `invokevirtual`, but finding instruction
//! boundaries requires knowing the length of every opcode.

use super::reader::ByteReader;
use super::{ClassFileError, ConstantPool, MemberRef};

pub const INVOKEVIRTUAL: u8 = 0xb6;

const IINC: u8 = 0x84;
const TABLESWITCH: u8 = 0xaa;
const LOOKUPSWITCH: u8 = 0xab;
const WIDE: u8 = 0xc4;

/// Targets of every `invokevirtual` instruction in a `Code` attribute body,
/// in instruction order
pub fn invoked_virtual_methods<'p>(
    code_attribute: &[u8],
    pool: &'p ConstantPool,
) -> Result<Vec<MemberRef<'p>>, ClassFileError> {
    let code = bytecode(code_attribute)?;
    let mut targets = Vec::new();

    let mut pc = 0;
    while pc < code.len() {
        let len = instruction_length(code, pc)?;
        if code[pc] == INVOKEVIRTUAL {
            let index = u16::from_be_bytes([code[pc + 1], code[pc + 2]]);
            targets.push(pool.method_ref(index)?);
        }
        pc += len;
    }

    Ok(targets)
}

/// The `code` array of a `Code` attribute body
fn bytecode(code_attribute: &[u8]) -> Result<&[u8], ClassFileError> {
    let mut reader = ByteReader::new(code_attribute);
    reader.skip(4)?; // max_stack, max_locals
    let len = reader.u32()? as usize;
    reader.bytes(len)
}

/// Length in bytes of the instruction starting at `pc`, checked against the
/// end of the code array
fn instruction_length(code: &[u8], pc: usize) -> Result<usize, ClassFileError> {
    let opcode = code[pc];
    let len = match opcode {
        0x00..=0x0f => 1,
        0x10 => 2,
        0x11 => 3,
        0x12 => 2,
        0x13 | 0x14 => 3,
        0x15..=0x19 => 2,
        0x1a..=0x35 => 1,
        0x36..=0x3a => 2,
        0x3b..=0x83 => 1,
        IINC => 3,
        0x85..=0x98 => 1,
        0x99..=0xa8 => 3,
        0xa9 => 2,
        TABLESWITCH => switch_length(code, pc, true)?,
        LOOKUPSWITCH => switch_length(code, pc, false)?,
        0xac..=0xb1 => 1,
        0xb2..=0xb8 => 3,
        0xb9 | 0xba => 5,
        0xbb => 3,
        0xbc => 2,
        0xbd => 3,
        0xbe | 0xbf => 1,
        0xc0 | 0xc1 => 3,
        0xc2 | 0xc3 => 1,
        WIDE => match code.get(pc + 1) {
            Some(&IINC) => 6,
            Some(_) => 4,
            None => return Err(malformed(pc, "truncated wide instruction")),
        },
        0xc5 => 4,
        0xc6 | 0xc7 => 3,
        0xc8 | 0xc9 => 5,
        0xca | 0xfe | 0xff => 1,
        _ => return Err(malformed(pc, "unknown opcode")),
    };

    if pc + len > code.len() {
        return Err(malformed(pc, "instruction runs past end of code"));
    }
    Ok(len)
}

fn switch_length(code: &[u8], pc: usize, table: bool) -> Result<usize, ClassFileError> {
    let padding = (4 - (pc + 1) % 4) % 4;
    let operands = code
        .get(pc + 1 + padding..)
        .ok_or_else(|| malformed(pc, "truncated switch"))?;
    let mut reader = ByteReader::new(operands);
    let truncated = |_| malformed(pc, "truncated switch");

    reader.skip(4).map_err(truncated)?; // default offset
    let entries = if table {
        let low = reader.i32().map_err(truncated)?;
        let high = reader.i32().map_err(truncated)?;
        if high < low {
            return Err(malformed(pc, "tableswitch high below low"));
        }
        (high as i64 - low as i64 + 1) as usize * 4
    } else {
        let pairs = reader.i32().map_err(truncated)?;
        if pairs < 0 {
            return Err(malformed(pc, "negative lookupswitch pair count"));
        }
        pairs as usize * 8
    };

    Ok(1 + padding + reader.position() + entries)
}

fn malformed(offset: usize, reason: &'static str) -> ClassFileError {
    ClassFileError::MalformedCode { offset, reason }
}
