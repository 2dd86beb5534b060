//! The processor's register file.
//!
//! A machine has `registers` general purpose registers, each one word
//! wide, plus four special registers:
//! - `pc`: program counter, one word
//! - `ir`: instruction register, one instruction
//! - `nr`: next-move register, selects fetch or execute
//! - `sr`: status register, outcome of the last half-step

use crate::bits::{Layout, Register, Role, Watcher, Watchers};
use crate::cpu::execute::Phase;
use std::sync::Arc;

/// All registers of a processor.
#[derive(Debug)]
pub struct RegisterFile {
    general: Vec<Register>,
    /// Program counter; address of the next instruction to fetch.
    pub pc: Register,
    /// Instruction register; the most recently fetched instruction.
    pub ir: Register,
    /// Next-move register; selects the next half-step.
    pub nr: Register,
    /// Status register; outcome of the most recent fetch or execute.
    pub sr: Register,
    watchers: Watchers,
}

impl RegisterFile {
    /// Create a register file with every register zeroed.
    pub fn new(layout: &Layout) -> Self {
        let watchers = Watchers::new();
        let general = (0..layout.registers())
            .map(|i| Register::new(layout.word_size(), Role::General(i), watchers.clone()))
            .collect();
        Self {
            general,
            pc: Register::new(layout.word_size(), Role::ProgramCounter, watchers.clone()),
            ir: Register::new(
                layout.instruction_size(),
                Role::Instruction,
                watchers.clone(),
            ),
            nr: Register::new(layout.word_size(), Role::NextMove, watchers.clone()),
            sr: Register::new(layout.word_size(), Role::Status, watchers.clone()),
            watchers,
        }
    }

    /// The general purpose register at `index`, if there is one.
    pub fn general(&self, index: usize) -> Option<&Register> {
        self.general.get(index)
    }

    /// Number of general purpose registers.
    pub fn general_count(&self) -> usize {
        self.general.len()
    }

    /// Zero the program counter, instruction register, status register
    /// and every general purpose register, and make the next move a
    /// fetch.
    pub fn reset(&self) {
        self.pc.set(0);
        self.ir.set(0);
        self.sr.set(0);
        self.nr.set(Phase::Fetch.bits());
        for register in &self.general {
            register.set(0);
        }
    }

    /// Subscribe to every register write.
    pub fn watch(&self, watcher: Arc<dyn Watcher>) {
        self.watchers.subscribe(watcher);
    }
}
