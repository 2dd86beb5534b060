//! Instruction decoding.
//!
//! An instruction occupies `instruction_blocks` consecutive blocks:
//! one opcode block, one register-index block, and a word-sized
//! operand, most significant block first. Decoding splits the
//! instruction register contents into those fields and produces a
//! typed [`Instruction`].

use crate::bits::Layout;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// The sixteen operation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Opcode {
    Halt = 0x0,
    LoadMem = 0x1,
    LoadConst = 0x2,
    LoadReg = 0x3,
    Store = 0x4,
    StoreReg = 0x5,
    Move = 0x6,
    AddInt = 0x7,
    AddConst = 0x8,
    MulInt = 0x9,
    SubInt = 0xa,
    Shift = 0xb,
    And = 0xc,
    Or = 0xd,
    Xor = 0xe,
    Jump = 0xf,
}

impl Opcode {
    /// Decode an opcode block.
    pub fn from_block(block: u32) -> Option<Opcode> {
        match block {
            0x0 => Some(Opcode::Halt),
            0x1 => Some(Opcode::LoadMem),
            0x2 => Some(Opcode::LoadConst),
            0x3 => Some(Opcode::LoadReg),
            0x4 => Some(Opcode::Store),
            0x5 => Some(Opcode::StoreReg),
            0x6 => Some(Opcode::Move),
            0x7 => Some(Opcode::AddInt),
            0x8 => Some(Opcode::AddConst),
            0x9 => Some(Opcode::MulInt),
            0xa => Some(Opcode::SubInt),
            0xb => Some(Opcode::Shift),
            0xc => Some(Opcode::And),
            0xd => Some(Opcode::Or),
            0xe => Some(Opcode::Xor),
            0xf => Some(Opcode::Jump),
            _ => None,
        }
    }

    /// The opcode as a block value.
    pub fn to_block(self) -> u32 {
        self as u32
    }
}

/// Condition selector of a jump, taken from the two low bits of its
/// word operand. Every condition compares the named register against
/// register 0, both sign-extended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JumpCond {
    Equal = 0,
    NotEqual = 1,
    Less = 2,
    LessOrEqual = 3,
}

impl JumpCond {
    /// Extract the condition from a jump's word operand.
    pub fn from_word(word: u32) -> JumpCond {
        match word % 4 {
            0 => JumpCond::Equal,
            1 => JumpCond::NotEqual,
            2 => JumpCond::Less,
            _ => JumpCond::LessOrEqual,
        }
    }
}

/// A decoded instruction.
///
/// Register indices come from single blocks; `addr` and `value`
/// operands are full words. The operand positions follow the
/// instruction layout: word-operand instructions take their register
/// from the high field, two-register instructions use the two low
/// fields, three-register instructions use all three.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    /// Stop the machine.
    Halt,
    /// `reg[d] := word at addr`.
    LoadMem { d: usize, addr: u32 },
    /// `reg[d] := value`.
    LoadConst { d: usize, value: u32 },
    /// `reg[d] := word at reg[s]`.
    LoadReg { d: usize, s: usize },
    /// `word at addr := reg[s]`.
    Store { s: usize, addr: u32 },
    /// `word at reg[d] := reg[s]`.
    StoreReg { s: usize, d: usize },
    /// `reg[d] := reg[s]`.
    Move { s: usize, d: usize },
    /// `reg[d] := reg[a] + reg[b]`.
    AddInt { d: usize, a: usize, b: usize },
    /// `reg[d] := reg[d] + value`.
    AddConst { d: usize, value: u32 },
    /// `reg[d] := reg[a] * reg[b]`.
    MulInt { d: usize, a: usize, b: usize },
    /// `reg[d] := reg[a] - reg[b]`.
    SubInt { d: usize, a: usize, b: usize },
    /// Shift `reg[a]` by the signed amount in `reg[b]`: right
    /// arithmetically for a positive amount, left for a negative one.
    Shift { d: usize, a: usize, b: usize },
    /// `reg[d] := reg[a] & reg[b]`.
    And { d: usize, a: usize, b: usize },
    /// `reg[d] := reg[a] | reg[b]`.
    Or { d: usize, a: usize, b: usize },
    /// `reg[d] := reg[a] ^ reg[b]`.
    Xor { d: usize, a: usize, b: usize },
    /// If `reg[r]` compares to `reg[0]` under `cond`, `pc := target`.
    Jump { r: usize, cond: JumpCond, target: u32 },
}

/// Decode an instruction register value.
pub fn decode(bits: u32, layout: &Layout) -> Result<Instruction, DecodeError> {
    let block_size = layout.block_size();
    let block_mask = layout.block_mask();

    // Fields from least to most significant block.
    let field3 = bits & block_mask;
    let bits = bits >> block_size;
    let field2 = bits & block_mask;
    let bits = bits >> block_size;
    let field1 = bits & block_mask;
    let bits = bits >> block_size;
    let op = bits & layout.op_mask();

    let word = (field2 << block_size) | field3;
    let (f1, f2, f3) = (field1 as usize, field2 as usize, field3 as usize);

    let opcode = Opcode::from_block(op).ok_or(DecodeError::UnknownOpcode(op))?;
    Ok(match opcode {
        Opcode::Halt => Instruction::Halt,
        Opcode::LoadMem => Instruction::LoadMem { d: f1, addr: word },
        Opcode::LoadConst => Instruction::LoadConst { d: f1, value: word },
        Opcode::LoadReg => Instruction::LoadReg { d: f2, s: f3 },
        Opcode::Store => Instruction::Store { s: f1, addr: word },
        Opcode::StoreReg => Instruction::StoreReg { s: f2, d: f3 },
        Opcode::Move => Instruction::Move { s: f2, d: f3 },
        Opcode::AddInt => Instruction::AddInt { d: f1, a: f2, b: f3 },
        Opcode::AddConst => Instruction::AddConst { d: f1, value: word },
        Opcode::MulInt => Instruction::MulInt { d: f1, a: f2, b: f3 },
        Opcode::SubInt => Instruction::SubInt { d: f1, a: f2, b: f3 },
        Opcode::Shift => Instruction::Shift { d: f1, a: f2, b: f3 },
        Opcode::And => Instruction::And { d: f1, a: f2, b: f3 },
        Opcode::Or => Instruction::Or { d: f1, a: f2, b: f3 },
        Opcode::Xor => Instruction::Xor { d: f1, a: f2, b: f3 },
        Opcode::Jump => Instruction::Jump {
            r: f1,
            cond: JumpCond::from_word(word),
            target: word & (layout.word_mask() << 2),
        },
    })
}

/// Encode an instruction back to an instruction register value.
pub fn encode(instruction: &Instruction, layout: &Layout) -> u32 {
    let block_size = layout.block_size();
    let block_mask = layout.block_mask();

    let (op, f1, f2, f3) = match *instruction {
        Instruction::Halt => (Opcode::Halt, 0, 0, 0),
        Instruction::LoadMem { d, addr } => (Opcode::LoadMem, d as u32, addr >> block_size, addr),
        Instruction::LoadConst { d, value } => {
            (Opcode::LoadConst, d as u32, value >> block_size, value)
        }
        Instruction::LoadReg { d, s } => (Opcode::LoadReg, 0, d as u32, s as u32),
        Instruction::Store { s, addr } => (Opcode::Store, s as u32, addr >> block_size, addr),
        Instruction::StoreReg { s, d } => (Opcode::StoreReg, 0, s as u32, d as u32),
        Instruction::Move { s, d } => (Opcode::Move, 0, s as u32, d as u32),
        Instruction::AddInt { d, a, b } => (Opcode::AddInt, d as u32, a as u32, b as u32),
        Instruction::AddConst { d, value } => {
            (Opcode::AddConst, d as u32, value >> block_size, value)
        }
        Instruction::MulInt { d, a, b } => (Opcode::MulInt, d as u32, a as u32, b as u32),
        Instruction::SubInt { d, a, b } => (Opcode::SubInt, d as u32, a as u32, b as u32),
        Instruction::Shift { d, a, b } => (Opcode::Shift, d as u32, a as u32, b as u32),
        Instruction::And { d, a, b } => (Opcode::And, d as u32, a as u32, b as u32),
        Instruction::Or { d, a, b } => (Opcode::Or, d as u32, a as u32, b as u32),
        Instruction::Xor { d, a, b } => (Opcode::Xor, d as u32, a as u32, b as u32),
        Instruction::Jump { r, cond, target } => {
            let word = target | cond as u32;
            (Opcode::Jump, r as u32, word >> block_size, word)
        }
    };

    let mut bits = op.to_block() & layout.op_mask();
    bits = (bits << block_size) | (f1 & block_mask);
    bits = (bits << block_size) | (f2 & block_mask);
    bits = (bits << block_size) | (f3 & block_mask);
    bits
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Instruction::Halt => write!(f, "halt"),
            Instruction::LoadMem { d, addr } => write!(f, "load r{d}, [{addr:#x}]"),
            Instruction::LoadConst { d, value } => write!(f, "loadc r{d}, {value:#x}"),
            Instruction::LoadReg { d, s } => write!(f, "loadr r{d}, [r{s}]"),
            Instruction::Store { s, addr } => write!(f, "store [{addr:#x}], r{s}"),
            Instruction::StoreReg { s, d } => write!(f, "storer [r{d}], r{s}"),
            Instruction::Move { s, d } => write!(f, "move r{d}, r{s}"),
            Instruction::AddInt { d, a, b } => write!(f, "add r{d}, r{a}, r{b}"),
            Instruction::AddConst { d, value } => write!(f, "addc r{d}, {value:#x}"),
            Instruction::MulInt { d, a, b } => write!(f, "mul r{d}, r{a}, r{b}"),
            Instruction::SubInt { d, a, b } => write!(f, "sub r{d}, r{a}, r{b}"),
            Instruction::Shift { d, a, b } => write!(f, "shift r{d}, r{a}, r{b}"),
            Instruction::And { d, a, b } => write!(f, "and r{d}, r{a}, r{b}"),
            Instruction::Or { d, a, b } => write!(f, "or r{d}, r{a}, r{b}"),
            Instruction::Xor { d, a, b } => write!(f, "xor r{d}, r{a}, r{b}"),
            Instruction::Jump { r, cond, target } => {
                let suffix = match cond {
                    JumpCond::Equal => "eq",
                    JumpCond::NotEqual => "ne",
                    JumpCond::Less => "lt",
                    JumpCond::LessOrEqual => "le",
                };
                write!(f, "jump{suffix} r{r}, {target:#x}")
            }
        }
    }
}

/// Errors that can occur during instruction decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unknown opcode {0:#x}")]
    UnknownOpcode(u32),
}
