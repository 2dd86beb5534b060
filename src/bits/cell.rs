//! A single block of storage.

use crate::bits::layout::mask;
use crate::bits::watch::{Change, Watchers};
use std::sync::atomic::{AtomicU32, Ordering};

/// One memory cell, holding one block.
///
/// A cell is created zeroed. Writes truncate to the cell width and
/// are atomic with respect to concurrent reads and writes of the same
/// cell; a completed write is published to the cell's watcher set.
#[derive(Debug)]
pub struct Cell {
    block: AtomicU32,
    mask: u32,
    address: usize,
    watchers: Watchers,
}

impl Cell {
    /// Create a zeroed cell of the given bit-width at the given
    /// address, publishing to `watchers`.
    pub fn new(width: u32, address: usize, watchers: Watchers) -> Self {
        Self {
            block: AtomicU32::new(0),
            mask: mask(width),
            address,
            watchers,
        }
    }

    /// The block stored in this cell.
    #[inline]
    pub fn get(&self) -> u32 {
        self.block.load(Ordering::SeqCst)
    }

    /// Store a block, truncated to the cell width.
    pub fn set(&self, block: u32) {
        let block = block & self.mask;
        self.block.store(block, Ordering::SeqCst);
        self.watchers.emit(Change::Cell {
            address: self.address,
            block,
        });
    }
}
