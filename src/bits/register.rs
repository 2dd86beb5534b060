//! A processor register.

use crate::bits::layout::mask;
use crate::bits::watch::{Change, Role, Watchers};
use std::sync::atomic::{AtomicU32, Ordering};

/// A register holding a value of a fixed bit-width.
///
/// Like a [`Cell`](crate::bits::Cell) but with a caller-chosen width
/// and a [`Role`] identifying it in change events. Registers are
/// created zeroed; writes truncate to the register width and are
/// atomic.
#[derive(Debug)]
pub struct Register {
    value: AtomicU32,
    mask: u32,
    role: Role,
    watchers: Watchers,
}

impl Register {
    /// Create a zeroed register of the given bit-width, publishing to
    /// `watchers` under `role`.
    pub fn new(width: u32, role: Role, watchers: Watchers) -> Self {
        Self {
            value: AtomicU32::new(0),
            mask: mask(width),
            role,
            watchers,
        }
    }

    /// The value stored in this register.
    #[inline]
    pub fn get(&self) -> u32 {
        self.value.load(Ordering::SeqCst)
    }

    /// Store a value, truncated to the register width.
    pub fn set(&self, value: u32) {
        let value = value & self.mask;
        self.value.store(value, Ordering::SeqCst);
        self.watchers.emit(Change::Register {
            role: self.role,
            value,
        });
    }

    /// The role of this register in change events.
    pub fn role(&self) -> Role {
        self.role
    }
}
