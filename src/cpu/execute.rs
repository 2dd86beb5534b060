//! The fetch/execute engine.
//!
//! A processor alternates between two half-steps: a fetch moves the
//! instruction under the program counter into the instruction
//! register, and an execute decodes and performs it. Every outcome
//! lands in the status register; the processor itself never returns
//! errors. Any status other than [`Status::Success`] stops the
//! stepping loops built on top.

use crate::bits::Layout;
use crate::cpu::decode::{self, Instruction, JumpCond};
use crate::cpu::memory::Memory;
use crate::cpu::registers::RegisterFile;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Outcome of the most recent fetch or execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    /// The half-step completed normally.
    Success,
    /// A halt instruction was executed.
    Halt,
    /// The instruction register held an undecodable instruction, or
    /// one naming a register the machine does not have.
    BadInstruction,
    /// An instruction fetch or word access was not aligned.
    BadAlignment,
    /// The machine was interrupted from outside. Never produced by
    /// the processor itself; reserved for embedding shells.
    Interrupted,
}

impl Status {
    /// Encode for the status register.
    pub fn bits(self) -> u32 {
        match self {
            Status::Success => 0,
            Status::Halt => 1,
            Status::BadInstruction => 2,
            Status::BadAlignment => 3,
            Status::Interrupted => 4,
        }
    }

    /// Decode from the status register. Bits outside the defined
    /// range read as [`Status::Interrupted`].
    pub fn from_bits(bits: u32) -> Status {
        match bits {
            0 => Status::Success,
            1 => Status::Halt,
            2 => Status::BadInstruction,
            3 => Status::BadAlignment,
            _ => Status::Interrupted,
        }
    }
}

/// Which half-step the processor performs next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// The next step fetches an instruction.
    Fetch,
    /// The next step executes the instruction register contents.
    Exec,
}

impl Phase {
    /// Encode for the next-move register.
    pub fn bits(self) -> u32 {
        match self {
            Phase::Fetch => 0,
            Phase::Exec => 1,
        }
    }

    /// Decode from the next-move register.
    pub fn from_bits(bits: u32) -> Phase {
        match bits {
            0 => Phase::Fetch,
            _ => Phase::Exec,
        }
    }
}

/// The processor of a machine.
///
/// Shares its [`Memory`] with the owning computer; all state is
/// atomically readable, so a processor can be stepped by one thread
/// while others observe it.
#[derive(Debug)]
pub struct Processor {
    layout: Layout,
    mem: Arc<Memory>,
    regs: RegisterFile,
}

impl Processor {
    /// Create a processor over the given memory, with every register
    /// zeroed and a fetch as the next move.
    pub fn new(mem: Arc<Memory>) -> Self {
        let layout = *mem.layout();
        Self {
            regs: RegisterFile::new(&layout),
            layout,
            mem,
        }
    }

    /// The geometry of this processor.
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// The register file, for observation and seeding.
    pub fn registers(&self) -> &RegisterFile {
        &self.regs
    }

    /// The memory this processor operates on.
    pub fn memory(&self) -> &Memory {
        &self.mem
    }

    /// Outcome of the most recent half-step.
    pub fn status(&self) -> Status {
        Status::from_bits(self.regs.sr.get())
    }

    /// The half-step the processor performs next.
    pub fn next(&self) -> Phase {
        Phase::from_bits(self.regs.nr.get())
    }

    /// Zero all registers; the next move becomes a fetch.
    pub fn reset(&self) {
        self.regs.reset();
    }

    /// Perform the next half-step, as selected by the next-move
    /// register.
    pub fn step(&self) {
        match self.next() {
            Phase::Fetch => {
                self.fetch();
                self.regs.nr.set(Phase::Exec.bits());
            }
            Phase::Exec => {
                self.execute();
                self.regs.nr.set(Phase::Fetch.bits());
            }
        }
    }

    /// Fetch the instruction under the program counter into the
    /// instruction register and advance the counter.
    ///
    /// A program counter that is not a multiple of the instruction
    /// size reports [`Status::BadAlignment`] and leaves the counter
    /// and the instruction register untouched.
    pub fn fetch(&self) {
        let p = self.regs.pc.get() as usize;
        let blocks = self.layout.instruction_blocks();
        if p % blocks != 0 {
            self.set_status(Status::BadAlignment);
            return;
        }
        self.regs.ir.set(self.read_int(p, blocks));
        self.regs
            .pc
            .set(((p + blocks) % self.layout.memory_cells()) as u32);
        self.set_status(Status::Success);
    }

    /// Decode the instruction register contents and perform the
    /// operation.
    pub fn execute(&self) {
        let status = match decode::decode(self.regs.ir.get(), &self.layout) {
            Ok(instruction) => self.perform(instruction),
            Err(_) => Status::BadInstruction,
        };
        self.set_status(status);
    }

    fn set_status(&self, status: Status) {
        self.regs.sr.set(status.bits());
    }

    /// Read `blocks` consecutive blocks starting at `p` as one
    /// big-endian integer.
    fn read_int(&self, p: usize, blocks: usize) -> u32 {
        let mut value = 0;
        for i in 0..blocks {
            value = (value << self.layout.block_size()) | self.mem.get(p + i);
        }
        value
    }

    /// Write `value` as `blocks` big-endian blocks starting at `p`.
    fn write_int(&self, p: usize, value: u32, blocks: usize) {
        for i in 0..blocks {
            let offset = (blocks - 1 - i) as u32 * self.layout.block_size();
            self.mem.set(p + i, (value >> offset) & self.layout.block_mask());
        }
    }

    fn perform(&self, instruction: Instruction) -> Status {
        match instruction {
            Instruction::Halt => Status::Halt,
            Instruction::LoadMem { d, addr } => self.load_mem(d, addr),
            Instruction::LoadConst { d, value } => self.load_const(d, value),
            Instruction::LoadReg { d, s } => self.load_reg(d, s),
            Instruction::Store { s, addr } => self.store_mem(s, addr),
            Instruction::StoreReg { s, d } => self.store_reg(s, d),
            Instruction::Move { s, d } => self.mov(s, d),
            Instruction::AddInt { d, a, b } => self.binary(d, a, b, u32::wrapping_add),
            Instruction::AddConst { d, value } => self.add_const(d, value),
            Instruction::MulInt { d, a, b } => self.binary(d, a, b, u32::wrapping_mul),
            Instruction::SubInt { d, a, b } => self.binary(d, a, b, u32::wrapping_sub),
            Instruction::Shift { d, a, b } => self.shift(d, a, b),
            Instruction::And { d, a, b } => self.binary(d, a, b, |x, y| x & y),
            Instruction::Or { d, a, b } => self.binary(d, a, b, |x, y| x | y),
            Instruction::Xor { d, a, b } => self.binary(d, a, b, |x, y| x ^ y),
            Instruction::Jump { r, cond, target } => self.jump(r, cond, target),
        }
    }

    /// Load the destination register with the word at `addr`.
    fn load_mem(&self, d: usize, addr: u32) -> Status {
        let addr = addr as usize;
        if addr % self.layout.word_blocks() != 0 {
            return Status::BadAlignment;
        }
        let Some(rd) = self.regs.general(d) else {
            return Status::BadInstruction;
        };
        rd.set(self.read_int(addr, self.layout.word_blocks()));
        Status::Success
    }

    /// Load the destination register with a constant word.
    fn load_const(&self, d: usize, value: u32) -> Status {
        let Some(rd) = self.regs.general(d) else {
            return Status::BadInstruction;
        };
        rd.set(value);
        Status::Success
    }

    /// Load the destination register with the word pointed at by the
    /// source register.
    fn load_reg(&self, d: usize, s: usize) -> Status {
        let Some(rs) = self.regs.general(s) else {
            return Status::BadInstruction;
        };
        self.load_mem(d, rs.get())
    }

    /// Store the source register's word at `addr`.
    fn store_mem(&self, s: usize, addr: u32) -> Status {
        let addr = addr as usize;
        if addr % self.layout.word_blocks() != 0 {
            return Status::BadAlignment;
        }
        let Some(rs) = self.regs.general(s) else {
            return Status::BadInstruction;
        };
        self.write_int(addr, rs.get(), self.layout.word_blocks());
        Status::Success
    }

    /// Store the source register's word at the address in the
    /// destination register.
    fn store_reg(&self, s: usize, d: usize) -> Status {
        let Some(rd) = self.regs.general(d) else {
            return Status::BadInstruction;
        };
        self.store_mem(s, rd.get())
    }

    /// Copy the source register to the destination register.
    fn mov(&self, s: usize, d: usize) -> Status {
        let (Some(rs), Some(rd)) = (self.regs.general(s), self.regs.general(d)) else {
            return Status::BadInstruction;
        };
        rd.set(rs.get());
        Status::Success
    }

    /// Add a constant word to the destination register.
    fn add_const(&self, d: usize, value: u32) -> Status {
        let Some(rd) = self.regs.general(d) else {
            return Status::BadInstruction;
        };
        rd.set(rd.get().wrapping_add(value));
        Status::Success
    }

    /// Combine two source registers into the destination register.
    /// Truncation to the word width happens in the register itself.
    fn binary(&self, d: usize, a: usize, b: usize, op: impl Fn(u32, u32) -> u32) -> Status {
        let (Some(rd), Some(ra), Some(rb)) = (
            self.regs.general(d),
            self.regs.general(a),
            self.regs.general(b),
        ) else {
            return Status::BadInstruction;
        };
        rd.set(op(ra.get(), rb.get()));
        Status::Success
    }

    /// Shift `reg[a]` by the signed amount in `reg[b]`.
    ///
    /// A positive amount shifts right arithmetically, carrying the
    /// sign bit down; a non-positive amount shifts left by its
    /// magnitude. Amounts at or beyond the word width saturate: right
    /// shifts keep only sign bits, left shifts produce zero.
    fn shift(&self, d: usize, a: usize, b: usize) -> Status {
        let (Some(rd), Some(ra), Some(rb)) = (
            self.regs.general(d),
            self.regs.general(a),
            self.regs.general(b),
        ) else {
            return Status::BadInstruction;
        };

        let amount = self.layout.sign_extend(rb.get());
        let value = if amount > 0 {
            (self.layout.sign_extend(ra.get()) >> amount.min(63)) as u32
        } else if -amount >= self.layout.word_size() as i64 {
            0
        } else {
            ra.get() << (-amount) as u32
        };
        rd.set(value);
        Status::Success
    }

    /// Jump to `target` if `reg[r]` compares to `reg[0]` under the
    /// condition, both sign-extended.
    fn jump(&self, r: usize, cond: JumpCond, target: u32) -> Status {
        let (Some(rr), Some(r0)) = (self.regs.general(r), self.regs.general(0)) else {
            return Status::BadInstruction;
        };
        let rx = self.layout.sign_extend(rr.get());
        let r0 = self.layout.sign_extend(r0.get());
        let taken = match cond {
            JumpCond::Equal => rx == r0,
            JumpCond::NotEqual => rx != r0,
            JumpCond::Less => rx < r0,
            JumpCond::LessOrEqual => rx <= r0,
        };
        if taken {
            self.regs.pc.set(target);
        }
        Status::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn processor() -> Processor {
        Processor::new(Arc::new(Memory::new(Layout::default())))
    }

    fn processor_with_program(hex: &str) -> Processor {
        let cpu = processor();
        cpu.memory().load(0, hex).unwrap();
        cpu
    }

    /// Step until the status leaves `Success`.
    fn run(cpu: &Processor) {
        while cpu.status() == Status::Success {
            cpu.step();
        }
    }

    #[test]
    fn test_fetch_assembles_big_endian() {
        let cpu = processor_with_program("2105");
        cpu.fetch();
        assert_eq!(cpu.registers().ir.get(), 0x2105);
        assert_eq!(cpu.registers().pc.get(), 4);
        assert_eq!(cpu.status(), Status::Success);
    }

    #[test]
    fn test_fetch_bad_alignment_leaves_state() {
        let cpu = processor();
        cpu.registers().pc.set(1);
        cpu.step();
        assert_eq!(cpu.status(), Status::BadAlignment);
        assert_eq!(cpu.registers().pc.get(), 1);
        assert_eq!(cpu.registers().ir.get(), 0);
    }

    #[test]
    fn test_halt_after_two_steps() {
        // Zeroed memory holds a halt instruction at address 0.
        let cpu = processor();
        cpu.step();
        assert_eq!(cpu.status(), Status::Success);
        cpu.step();
        assert_eq!(cpu.status(), Status::Halt);
    }

    #[test]
    fn test_fragment_runs_into_zeroed_halt() {
        // One instruction and nothing after it: the second fetch
        // reads a halt out of zeroed memory, with no alignment fault.
        let cpu = processor_with_program("2100");
        run(&cpu);
        assert_eq!(cpu.status(), Status::Halt);
        assert_eq!(cpu.registers().pc.get(), 8);
    }

    #[test]
    fn test_load_const_and_halt() {
        let cpu = processor_with_program("21050000");
        run(&cpu);
        assert_eq!(cpu.registers().general(1).unwrap().get(), 0x05);
        assert_eq!(cpu.status(), Status::Halt);
        assert_eq!(cpu.registers().pc.get(), 8);
    }

    #[test]
    fn test_add_two_constants() {
        let cpu = processor_with_program("2103220770120000");
        run(&cpu);
        assert_eq!(cpu.registers().general(0).unwrap().get(), 0x0a);
        assert_eq!(cpu.status(), Status::Halt);
    }

    #[test]
    fn test_load_and_store_words() {
        // Load the word at 0x10 into r1, store it at 0x20, halt.
        let cpu = processor_with_program("111041200000");
        cpu.memory().load(0x10, "ab").unwrap();
        run(&cpu);
        assert_eq!(cpu.registers().general(1).unwrap().get(), 0xab);
        assert_eq!(cpu.memory().read(0x20, 0x22), "ab");
    }

    #[test]
    fn test_word_access_alignment() {
        // A load from an odd address reports bad alignment.
        let cpu = processor_with_program("1111");
        run(&cpu);
        assert_eq!(cpu.status(), Status::BadAlignment);
    }

    #[test]
    fn test_register_indirect_load_and_store() {
        // r1 := 0x10; r2 := word at [r1]; r3 := 0x20; [r3] := r2.
        let cpu = processor_with_program("21103021232050230000");
        cpu.memory().load(0x10, "cd").unwrap();
        run(&cpu);
        assert_eq!(cpu.registers().general(2).unwrap().get(), 0xcd);
        assert_eq!(cpu.memory().read(0x20, 0x22), "cd");
    }

    #[test]
    fn test_move_operand_order() {
        // r1 := 0x2a; r2 := r1.
        let cpu = processor_with_program("212a60120000");
        run(&cpu);
        assert_eq!(cpu.registers().general(2).unwrap().get(), 0x2a);
    }

    #[test]
    fn test_arithmetic_wraps_to_word() {
        // r1 := 0xff; r1 := r1 + 0x02.
        let cpu = processor_with_program("21ff81020000");
        run(&cpu);
        assert_eq!(cpu.registers().general(1).unwrap().get(), 0x01);
    }

    #[test]
    fn test_mul_and_sub() {
        // r1 := 12; r2 := 13; r3 := r1 * r2; r4 := r1 - r2.
        let cpu = processor_with_program("210c220d9312a4120000");
        run(&cpu);
        // 156 fits the word; 12 - 13 wraps to 0xff.
        assert_eq!(cpu.registers().general(3).unwrap().get(), 0x9c);
        assert_eq!(cpu.registers().general(4).unwrap().get(), 0xff);
    }

    #[test]
    fn test_bitwise_ops() {
        let cpu = processor_with_program("210c220ac312d412e5120000");
        run(&cpu);
        let regs = cpu.registers();
        assert_eq!(regs.general(3).unwrap().get(), 0x0c & 0x0a);
        assert_eq!(regs.general(4).unwrap().get(), 0x0c | 0x0a);
        assert_eq!(regs.general(5).unwrap().get(), 0x0c ^ 0x0a);
    }

    #[test]
    fn test_shift_right_arithmetic() {
        let cpu = processor();
        cpu.registers().general(1).unwrap().set(0x80);
        cpu.registers().general(2).unwrap().set(0x01);
        assert_eq!(cpu.shift(3, 1, 2), Status::Success);
        assert_eq!(cpu.registers().general(3).unwrap().get(), 0xc0);
    }

    #[test]
    fn test_shift_left_on_negative_amount() {
        let cpu = processor();
        cpu.registers().general(1).unwrap().set(0x01);
        cpu.registers().general(2).unwrap().set(0xff);
        cpu.shift(3, 1, 2);
        assert_eq!(cpu.registers().general(3).unwrap().get(), 0x02);
    }

    #[test]
    fn test_shift_by_zero_is_identity() {
        let cpu = processor();
        cpu.registers().general(1).unwrap().set(0x55);
        cpu.shift(3, 1, 2);
        assert_eq!(cpu.registers().general(3).unwrap().get(), 0x55);
    }

    #[test]
    fn test_shift_saturates_beyond_width() {
        let cpu = processor();
        let regs = cpu.registers();
        // Right shift of a negative value by 0x7f keeps only sign.
        regs.general(1).unwrap().set(0x80);
        regs.general(2).unwrap().set(0x7f);
        cpu.shift(3, 1, 2);
        assert_eq!(regs.general(3).unwrap().get(), 0xff);
        // Left shift by 8 or more clears the word.
        regs.general(2).unwrap().set(0xf8);
        cpu.shift(3, 1, 2);
        assert_eq!(regs.general(3).unwrap().get(), 0x00);
    }

    #[test]
    fn test_jump_equal_taken() {
        let cpu = processor();
        cpu.registers().general(0).unwrap().set(0x07);
        cpu.registers().general(5).unwrap().set(0x07);
        assert_eq!(cpu.jump(5, JumpCond::Equal, 0x10), Status::Success);
        assert_eq!(cpu.registers().pc.get(), 0x10);
    }

    #[test]
    fn test_jump_not_taken() {
        let cpu = processor();
        cpu.registers().general(5).unwrap().set(0x01);
        cpu.jump(5, JumpCond::Equal, 0x10);
        assert_eq!(cpu.registers().pc.get(), 0);
    }

    #[test]
    fn test_jump_compares_signed() {
        let cpu = processor();
        // 0xff is -1, less than 0 in register 0.
        cpu.registers().general(5).unwrap().set(0xff);
        cpu.jump(5, JumpCond::Less, 0x20);
        assert_eq!(cpu.registers().pc.get(), 0x20);
    }

    #[test]
    fn test_jump_through_program() {
        // r5 := 7; r0 := 7; jump to 0x10 if equal; the skipped slot
        // holds a halt; at 0x10: r1 := 1, halt.
        let cpu = processor_with_program("25072007f510000021010000");
        run(&cpu);
        assert_eq!(cpu.registers().general(1).unwrap().get(), 0x01);
        assert_eq!(cpu.status(), Status::Halt);
    }

    #[test]
    fn test_pc_wraps_at_memory_end() {
        let cpu = processor();
        cpu.registers().pc.set(252);
        cpu.fetch();
        assert_eq!(cpu.registers().pc.get(), 0);
    }

    #[test]
    fn test_bad_instruction_on_wide_blocks() {
        let layout = Layout::new(8, 256, 2, 16).unwrap();
        let cpu = Processor::new(Arc::new(Memory::new(layout)));
        cpu.registers().ir.set(0x10_00_00_00);
        cpu.execute();
        assert_eq!(cpu.status(), Status::BadInstruction);
    }

    #[test]
    fn test_missing_register_is_bad_instruction() {
        // Eight registers only; the instruction names register 9.
        let layout = Layout::new(4, 256, 2, 8).unwrap();
        let cpu = Processor::new(Arc::new(Memory::new(layout)));
        cpu.registers().ir.set(0x2905);
        cpu.execute();
        assert_eq!(cpu.status(), Status::BadInstruction);
    }

    #[test]
    fn test_reset_zeroes_registers() {
        let cpu = processor_with_program("21050000");
        run(&cpu);
        cpu.reset();
        let regs = cpu.registers();
        assert_eq!(regs.pc.get(), 0);
        assert_eq!(regs.ir.get(), 0);
        assert_eq!(regs.sr.get(), 0);
        assert_eq!(cpu.next(), Phase::Fetch);
        for i in 0..regs.general_count() {
            assert_eq!(regs.general(i).unwrap().get(), 0);
        }
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [
            Status::Success,
            Status::Halt,
            Status::BadInstruction,
            Status::BadAlignment,
            Status::Interrupted,
        ] {
            assert_eq!(Status::from_bits(status.bits()), status);
        }
    }

    proptest! {
        #[test]
        fn prop_pc_stays_in_range(hex in "[0-9a-f]{0,256}", steps in 0usize..64) {
            let cpu = processor_with_program(&hex);
            for _ in 0..steps {
                cpu.step();
                prop_assert!((cpu.registers().pc.get() as usize) < 256);
            }
        }
    }
}
