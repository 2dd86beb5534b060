//! The machine core.
//!
//! This module implements the processor and its memory:
//! - a block-addressable circular [`Memory`]
//! - the [`RegisterFile`] with general and special registers
//! - typed instruction [`decode`]/[`encode`]
//! - the fetch/execute [`Processor`]

pub mod decode;
pub mod execute;
pub mod memory;
pub mod registers;

pub use decode::{decode, encode, DecodeError, Instruction, JumpCond, Opcode};
pub use execute::{Phase, Processor, Status};
pub use memory::{Memory, MemoryError};
pub use registers::RegisterFile;
