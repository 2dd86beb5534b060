//! Block-addressable random access memory.
//!
//! Addresses are reduced modulo the cell count on every access, so the
//! memory behaves as a circular buffer. Contents move in and out as
//! hexadecimal strings: [`Memory::load`] writes big-endian blocks,
//! [`Memory::read`] scans a circular address range back into digits.

use crate::bits::{Cell, Layout, Watcher, Watchers};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// The memory of a machine: a fixed sequence of [`Cell`]s.
pub struct Memory {
    cells: Vec<Cell>,
    layout: Layout,
    watchers: Watchers,
}

impl Memory {
    /// Create a memory with every cell zeroed.
    pub fn new(layout: Layout) -> Self {
        let watchers = Watchers::new();
        let cells = (0..layout.memory_cells())
            .map(|address| Cell::new(layout.block_size(), address, watchers.clone()))
            .collect();
        Self {
            cells,
            layout,
            watchers,
        }
    }

    /// The geometry this memory was built with.
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the memory has no cells. Never true for a memory built
    /// from a validated [`Layout`].
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// The block at address `p`, reduced modulo the cell count.
    #[inline]
    pub fn get(&self, p: usize) -> u32 {
        self.cells[p % self.cells.len()].get()
    }

    /// Store the low bits of `block` at address `p`, reduced modulo
    /// the cell count.
    #[inline]
    pub fn set(&self, p: usize, block: u32) {
        self.cells[p % self.cells.len()].set(block);
    }

    /// Set every cell to zero.
    pub fn clear(&self) {
        for cell in &self.cells {
            cell.set(0);
        }
    }

    /// Subscribe to every cell write.
    pub fn watch(&self, watcher: Arc<dyn Watcher>) {
        self.watchers.subscribe(watcher);
    }

    /// Write a hexadecimal string as blocks at consecutive addresses
    /// starting at `p`.
    ///
    /// Each group of `hex_size` digits forms one block, most
    /// significant digit first. Nothing is written if any character is
    /// not a hexadecimal digit.
    ///
    /// # Panics
    /// Panics if the string is not a whole number of blocks.
    pub fn load(&self, p: usize, hex: &str) -> Result<(), MemoryError> {
        let digits = hex_to_digits(hex)?;
        assert!(
            digits.len() % self.layout.hex_size() == 0,
            "hex string of {} digits is not a whole number of blocks",
            digits.len()
        );

        for (i, chunk) in digits.chunks(self.layout.hex_size()).enumerate() {
            let mut block = 0;
            for &digit in chunk {
                block = (block << 4) | digit;
            }
            self.set(p + i, block);
        }
        Ok(())
    }

    /// Read the blocks from address `p` (inclusive) to `q` (exclusive)
    /// as a hexadecimal string.
    ///
    /// Both ends are reduced modulo the cell count and the scan wraps
    /// around the end of memory. Each block becomes `hex_size` digits,
    /// most significant first.
    pub fn read(&self, p: usize, q: usize) -> String {
        let len = self.cells.len();
        let width = self.layout.hex_size();
        let mut out = String::new();

        let mut i = p % len;
        let end = q % len;
        while i != end {
            out.push_str(&format!("{:0width$x}", self.get(i)));
            i = (i + 1) % len;
        }
        out
    }
}

impl fmt::Debug for Memory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let non_zero = self.cells.iter().filter(|cell| cell.get() != 0).count();
        f.debug_struct("Memory")
            .field("non_zero_cells", &non_zero)
            .field("total_cells", &self.cells.len())
            .finish()
    }
}

/// Convert a hexadecimal string to one value per digit.
fn hex_to_digits(hex: &str) -> Result<Vec<u32>, MemoryError> {
    hex.chars()
        .map(|c| c.to_digit(16).ok_or(MemoryError::BadHexChar(c)))
        .collect()
}

/// Errors that can occur during memory I/O.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error("not a hexadecimal digit: {0:?}")]
    BadHexChar(char),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::Change;
    use crate::bits::watch::tests::Recorder;
    use proptest::prelude::*;

    #[test]
    fn test_set_get_truncates() {
        let mem = Memory::new(Layout::default());
        mem.set(10, 0x3a);
        assert_eq!(mem.get(10), 0xa);
    }

    #[test]
    fn test_addresses_wrap() {
        let mem = Memory::new(Layout::default());
        mem.set(2, 0x7);
        assert_eq!(mem.get(2 + 256), 0x7);
        mem.set(3 + 512, 0x9);
        assert_eq!(mem.get(3), 0x9);
    }

    #[test]
    fn test_clear() {
        let mem = Memory::new(Layout::default());
        mem.set(0, 0x1);
        mem.set(255, 0xf);
        mem.clear();
        assert_eq!(mem.get(0), 0);
        assert_eq!(mem.get(255), 0);
    }

    #[test]
    fn test_load_big_endian() {
        let mem = Memory::new(Layout::default());
        mem.load(4, "2105").unwrap();
        assert_eq!(mem.get(4), 0x2);
        assert_eq!(mem.get(5), 0x1);
        assert_eq!(mem.get(6), 0x0);
        assert_eq!(mem.get(7), 0x5);
    }

    #[test]
    fn test_load_rejects_bad_digit() {
        let mem = Memory::new(Layout::default());
        assert_eq!(mem.load(0, "12g4"), Err(MemoryError::BadHexChar('g')));
        // Nothing was written.
        assert_eq!(mem.get(0), 0);
        assert_eq!(mem.get(1), 0);
    }

    #[test]
    fn test_load_accepts_uppercase() {
        let mem = Memory::new(Layout::default());
        mem.load(0, "AbCd").unwrap();
        assert_eq!(mem.read(0, 4), "abcd");
    }

    #[test]
    fn test_read_wraps_around() {
        let mem = Memory::new(Layout::default());
        mem.set(254, 0x1);
        mem.set(255, 0x2);
        mem.set(0, 0x3);
        assert_eq!(mem.read(254, 1), "123");
    }

    #[test]
    fn test_read_empty_range() {
        let mem = Memory::new(Layout::default());
        assert_eq!(mem.read(7, 7), "");
    }

    #[test]
    fn test_wide_blocks_read_full_digits() {
        // 8-bit blocks emit two digits each.
        let layout = Layout::new(8, 256, 2, 16).unwrap();
        let mem = Memory::new(layout);
        mem.load(0, "0a1b").unwrap();
        assert_eq!(mem.get(0), 0x0a);
        assert_eq!(mem.get(1), 0x1b);
        assert_eq!(mem.read(0, 2), "0a1b");
    }

    #[test]
    fn test_watchers_see_writes() {
        let mem = Memory::new(Layout::default());
        let recorder = Recorder::new();
        mem.watch(recorder.clone());

        mem.set(9, 0x5);

        assert_eq!(
            *recorder.changes.lock().unwrap(),
            vec![Change::Cell {
                address: 9,
                block: 0x5
            }]
        );
    }

    proptest! {
        #[test]
        fn prop_load_read_roundtrip(hex in "[0-9a-f]{0,200}") {
            let mem = Memory::new(Layout::default());
            mem.load(0, &hex).unwrap();
            prop_assert_eq!(mem.read(0, hex.len()), hex);
        }

        #[test]
        fn prop_set_get_modular(p in 0usize..4096, v: u32) {
            let mem = Memory::new(Layout::default());
            mem.set(p, v);
            prop_assert_eq!(mem.get(p), v & 0xf);
            prop_assert_eq!(mem.get(p + 256), mem.get(p));
        }
    }
}
