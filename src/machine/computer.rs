//! The computer: a processor, a memory, and their surroundings.
//!
//! A [`Computer`] owns the machine and everything a front end needs
//! to drive it: program management, reset, the tail-pointer
//! input/output convention, synchronous execution, line-by-line
//! stream execution, and the start/stop lifecycle of the clocked
//! background driver.

use crate::bits::Layout;
use crate::cpu::{Memory, MemoryError, Phase, Processor, Status};
use crate::machine::clock::ClockedComputer;
use crate::machine::image::{ImageError, ProgramImage};
use std::io::{BufRead, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Default delay between an execute and the next fetch, in
/// milliseconds.
const DEFAULT_CLOCK_TICK: u64 = 125;

/// Digits of the input-address pointer kept in the last two cells.
const POINTER_DIGITS: usize = 2;

/// A complete machine.
///
/// All methods take `&self`: the machine state lives in atomically
/// readable cells and registers, so one thread can drive the computer
/// while others observe it or adjust the clock.
pub struct Computer {
    layout: Layout,
    mem: Arc<Memory>,
    processor: Arc<Processor>,
    running: Arc<AtomicBool>,
    clock_tick: Arc<AtomicU64>,
    state: Mutex<State>,
}

/// Mutable odds and ends guarded by the computer mutex.
struct State {
    program: Option<String>,
    driver: Option<ClockedComputer>,
}

impl Computer {
    /// Create a computer with the given geometry and no program.
    pub fn new(layout: Layout) -> Self {
        let mem = Arc::new(Memory::new(layout));
        let processor = Arc::new(Processor::new(Arc::clone(&mem)));
        Self {
            layout,
            mem,
            processor,
            running: Arc::new(AtomicBool::new(false)),
            clock_tick: Arc::new(AtomicU64::new(DEFAULT_CLOCK_TICK)),
            state: Mutex::new(State {
                program: None,
                driver: None,
            }),
        }
    }

    /// The default classroom machine loaded with `image`.
    pub fn with_program(image: &str) -> Result<Self, ComputerError> {
        let computer = Self::new(Layout::default());
        computer.set_program(image)?;
        Ok(computer)
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("computer state lock poisoned")
    }

    /// The geometry of this computer.
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// The memory, for observation and direct manipulation.
    pub fn memory(&self) -> &Memory {
        &self.mem
    }

    /// The processor, for observation and direct manipulation.
    pub fn processor(&self) -> &Processor {
        &self.processor
    }

    /// Store a program image given as hex text with the magic header.
    pub fn set_program(&self, text: &str) -> Result<(), ComputerError> {
        self.set_image(&ProgramImage::parse(text)?)
    }

    /// Store a parsed program image.
    pub fn set_image(&self, image: &ProgramImage) -> Result<(), ComputerError> {
        let max = self.layout.max_program_len();
        if image.len() > max {
            return Err(ComputerError::ProgramTooLarge {
                len: image.len(),
                max,
            });
        }
        self.state().program = Some(image.body().to_string());
        Ok(())
    }

    /// The current program body, if one is set.
    pub fn program(&self) -> Option<String> {
        self.state().program.clone()
    }

    /// Stop the driver, reset the processor, clear memory, and load
    /// the program at address 0.
    pub fn reset(&self) -> Result<(), ComputerError> {
        self.stop();
        let state = self.state();
        self.processor.reset();
        self.mem.clear();
        if let Some(program) = state.program.as_deref() {
            self.mem.load(0, program)?;
        }
        Ok(())
    }

    /// Place an input at the top of memory, with a two-digit pointer
    /// to its start in the very last two cells.
    pub fn load_input(&self, input: &str) -> Result<(), ComputerError> {
        let state = self.state();
        let Some(program) = state.program.as_deref() else {
            return Err(ComputerError::NoProgram);
        };

        let len = program.len() + input.len() + POINTER_DIGITS;
        let max = self.layout.max_program_len();
        if len > max {
            return Err(ComputerError::InputTooLarge { len, max });
        }
        let address = self
            .layout
            .memory_cells()
            .checked_sub(input.len() + POINTER_DIGITS)
            .ok_or(ComputerError::InputTooLarge { len, max })?;

        self.mem.load(address, &format!("{input}{address:02x}"))?;
        Ok(())
    }

    /// Read the output back through the tail pointer: everything from
    /// the pointed-at address up to the pointer cells themselves.
    pub fn read_output(&self) -> String {
        let len = self.layout.memory_cells();
        let pointer = ((self.mem.get(len - 2) << 4) | self.mem.get(len - 1)) as usize;
        self.mem.read(pointer.min(len - 2), len - 2)
    }

    /// Perform one half-step of the processor.
    pub fn step(&self) {
        self.processor.step();
    }

    /// Step until the status leaves [`Status::Success`].
    pub fn step_through(&self) {
        while self.status() == Status::Success {
            self.step();
        }
    }

    /// Execute the program on one input and return its output.
    pub fn execute(&self, input: &str) -> Result<String, ComputerError> {
        self.reset()?;
        self.load_input(input)?;
        self.step_through();
        Ok(self.read_output())
    }

    /// Execute the program on every line of `input`, writing one
    /// output line per input line.
    pub fn execute_stream<R: BufRead, W: Write>(
        &self,
        input: R,
        output: &mut W,
    ) -> Result<(), ComputerError> {
        for line in input.lines() {
            let line = line?;
            writeln!(output, "{}", self.execute(&line)?)?;
        }
        Ok(())
    }

    /// Outcome of the most recent half-step.
    pub fn status(&self) -> Status {
        self.processor.status()
    }

    /// Whether the next half-step is a fetch.
    pub fn next_is_fetch(&self) -> bool {
        self.processor.next() == Phase::Fetch
    }

    /// Set the delay between an execute and the next fetch, in
    /// milliseconds. A running driver picks the new value up on its
    /// next cycle.
    pub fn set_clock_tick(&self, millis: u64) {
        self.clock_tick.store(millis, Ordering::SeqCst);
    }

    /// The current clock tick in milliseconds.
    pub fn clock_tick(&self) -> u64 {
        self.clock_tick.load(Ordering::SeqCst)
    }

    /// Whether a clocked driver is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start the clocked driver from the current machine state. Does
    /// nothing if it is already running.
    pub fn start(&self) {
        let mut state = self.state();
        if !self.running.load(Ordering::SeqCst) {
            self.running.store(true, Ordering::SeqCst);
            state.driver = Some(ClockedComputer::spawn(
                Arc::clone(&self.processor),
                Arc::clone(&self.running),
                Arc::clone(&self.clock_tick),
            ));
        }
    }

    /// Stop the clocked driver and wait for it to finish. Does
    /// nothing if it is not running.
    pub fn stop(&self) {
        let mut state = self.state();
        if self.running.load(Ordering::SeqCst) {
            self.running.store(false, Ordering::SeqCst);
            if let Some(driver) = state.driver.take() {
                driver.join();
            }
        }
    }

    /// Start the driver if stopped, stop it if running.
    pub fn start_stop(&self) {
        if self.is_running() {
            self.stop();
        } else {
            self.start();
        }
    }

    /// A textual description of this computer.
    pub fn description(&self) -> String {
        format!(
            "Frequency: {}Hz\n\
             Memory: {} blocks\n\
             Block: {} bits\n\
             Word: {} bits\n\
             Op-code: {} bits\n\
             Instruction: {} bits",
            1000 / self.clock_tick().max(1),
            self.layout.memory_cells(),
            self.layout.block_size(),
            self.layout.word_size(),
            self.layout.op_size(),
            self.layout.instruction_size(),
        )
    }
}

impl std::fmt::Debug for Computer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computer")
            .field("status", &self.status())
            .field("running", &self.is_running())
            .field("clock_tick", &self.clock_tick())
            .field("layout", &self.layout)
            .finish()
    }
}

/// Errors reported at the computer boundary.
#[derive(Debug, Error)]
pub enum ComputerError {
    #[error(transparent)]
    Image(#[from] ImageError),

    #[error("program of {len} hex digits exceeds the memory capacity of {max}")]
    ProgramTooLarge { len: usize, max: usize },

    #[error("program and input of {len} hex digits exceed the memory capacity of {max}")]
    InputTooLarge { len: usize, max: usize },

    #[error("no program has been loaded")]
    NoProgram,

    #[error(transparent)]
    Memory(#[from] MemoryError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
