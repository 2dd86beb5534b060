//! Machine geometry.
//!
//! Every size in the machine derives from four parameters fixed at
//! construction: the bit-width of a block (the machine's "byte"), the
//! number of memory cells, the number of blocks in a word, and the
//! number of general purpose registers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The geometry of a machine.
///
/// A `Layout` is validated once at construction and immutable after
/// that, so the derived sizes and masks can be computed on demand
/// without further checks.
///
/// The default layout is the classroom machine: 4-bit blocks, 256
/// cells, 2-block words, 16 registers, 16-bit instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
    block_size: u32,
    memory_cells: usize,
    word_blocks: usize,
    registers: usize,
}

impl Layout {
    /// Blocks per instruction in addition to the word operand: one
    /// opcode block and one register-index block.
    const HEADER_BLOCKS: usize = 2;

    /// Create a layout, validating the parameters.
    pub fn new(
        block_size: u32,
        memory_cells: usize,
        word_blocks: usize,
        registers: usize,
    ) -> Result<Self, LayoutError> {
        if block_size == 0 || block_size % 4 != 0 {
            return Err(LayoutError::BadBlockSize(block_size));
        }
        if memory_cells == 0 {
            return Err(LayoutError::NoCells);
        }
        if word_blocks == 0 {
            return Err(LayoutError::NoWordBlocks);
        }
        if registers == 0 {
            return Err(LayoutError::NoRegisters);
        }

        let instruction_bits =
            (Self::HEADER_BLOCKS as u64 + word_blocks as u64) * block_size as u64;
        if instruction_bits > 32 {
            return Err(LayoutError::InstructionTooWide {
                bits: instruction_bits,
            });
        }

        let layout = Self {
            block_size,
            memory_cells,
            word_blocks,
            registers,
        };
        if registers as u64 > 1u64 << block_size {
            return Err(LayoutError::TooManyRegisters {
                count: registers,
                bits: block_size,
            });
        }
        if memory_cells as u64 > 1u64 << layout.word_size() {
            return Err(LayoutError::MemoryNotAddressable {
                cells: memory_cells,
                bits: layout.word_size(),
            });
        }
        Ok(layout)
    }

    /// Bit-width of a block.
    #[inline]
    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    /// Number of memory cells.
    #[inline]
    pub fn memory_cells(&self) -> usize {
        self.memory_cells
    }

    /// Blocks per word.
    #[inline]
    pub fn word_blocks(&self) -> usize {
        self.word_blocks
    }

    /// Number of general purpose registers.
    #[inline]
    pub fn registers(&self) -> usize {
        self.registers
    }

    /// Hexadecimal digits per block.
    #[inline]
    pub fn hex_size(&self) -> usize {
        (self.block_size / 4) as usize
    }

    /// Block with every bit set.
    #[inline]
    pub fn block_mask(&self) -> u32 {
        mask(self.block_size)
    }

    /// Bit-width of a word.
    #[inline]
    pub fn word_size(&self) -> u32 {
        self.word_blocks as u32 * self.block_size
    }

    /// Word with every bit set.
    #[inline]
    pub fn word_mask(&self) -> u32 {
        mask(self.word_size())
    }

    /// Word with only the top bit set.
    #[inline]
    pub fn word_top(&self) -> u32 {
        1 << (self.word_size() - 1)
    }

    /// Bit-width of an operation code. Sixteen opcodes fit in any
    /// block, so this equals one block.
    #[inline]
    pub fn op_size(&self) -> u32 {
        self.block_size
    }

    /// Operation code with every bit set.
    #[inline]
    pub fn op_mask(&self) -> u32 {
        mask(self.op_size())
    }

    /// Blocks per instruction: opcode, register index, word operand.
    #[inline]
    pub fn instruction_blocks(&self) -> usize {
        Self::HEADER_BLOCKS + self.word_blocks
    }

    /// Bit-width of an instruction.
    #[inline]
    pub fn instruction_size(&self) -> u32 {
        self.instruction_blocks() as u32 * self.block_size
    }

    /// Maximal length of a program in hexadecimal digits.
    #[inline]
    pub fn max_program_len(&self) -> usize {
        self.memory_cells * self.hex_size()
    }

    /// Interpret a word as a signed value by extending its top bit.
    pub fn sign_extend(&self, word: u32) -> i64 {
        if word & self.word_top() != 0 {
            word as i64 | (!0i64 << self.word_size())
        } else {
            word as i64
        }
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            block_size: 4,
            memory_cells: 256,
            word_blocks: 2,
            registers: 16,
        }
    }
}

/// A value with the low `bits` bits set.
#[inline]
pub(crate) fn mask(bits: u32) -> u32 {
    ((1u64 << bits) - 1) as u32
}

/// Errors raised when layout parameters are inconsistent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("block size must be a positive multiple of four, got {0}")]
    BadBlockSize(u32),

    #[error("memory must have at least one cell")]
    NoCells,

    #[error("a word must span at least one block")]
    NoWordBlocks,

    #[error("at least one register is required")]
    NoRegisters,

    #[error("{bits}-bit instructions exceed the 32-bit storage limit")]
    InstructionTooWide { bits: u64 },

    #[error("{count} registers cannot be addressed by a {bits}-bit block")]
    TooManyRegisters { count: usize, bits: u32 },

    #[error("{cells} cells cannot be addressed by a {bits}-bit word")]
    MemoryNotAddressable { cells: usize, bits: u32 },
}
