//! # slate
//!
//! An instructional register machine with a configurable geometry.
//!
//! The machine is deliberately small enough to watch at the level of
//! individual memory cells and registers: a block-addressable
//! circular memory, a fetch/execute processor with sixteen opcodes,
//! and a clocked driver that single-steps the processor at a
//! configurable rate. Programs are hexadecimal images with a magic
//! header; input rides at the top of memory behind a tail pointer,
//! and output is read back through the same pointer.
//!
//! The default geometry is 4-bit blocks, 256 cells, 2-block words and
//! 16 registers, but every size derives from a [`Layout`] fixed at
//! construction.

pub mod bits;
pub mod cpu;
pub mod machine;

// Re-export commonly used types
pub use bits::{Cell, Change, Layout, LayoutError, Register, Role, Watcher, Watchers};
pub use cpu::{
    decode, encode, DecodeError, Instruction, JumpCond, Memory, MemoryError, Opcode, Phase,
    Processor, RegisterFile, Status,
};
pub use machine::{
    load_image, save_image, Computer, ComputerError, ImageError, ProgramImage, MAGIC_HEADER,
};
