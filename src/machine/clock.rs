//! The clock circuit.
//!
//! A [`ClockedComputer`] wraps a processor in a background thread
//! that steps it until the machine leaves the success status or the
//! running flag is cleared, pausing one clock tick after every
//! execute half-step. The flag is cleared again when the loop exits,
//! whatever the cause.

use crate::cpu::{Phase, Processor, Status};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// A background task stepping a processor at the clock rate.
#[derive(Debug)]
pub(crate) struct ClockedComputer {
    handle: JoinHandle<()>,
}

impl ClockedComputer {
    /// Spawn the stepping thread. The tick is re-read before every
    /// sleep, so rate changes apply from the next cycle on.
    pub(crate) fn spawn(
        processor: Arc<Processor>,
        running: Arc<AtomicBool>,
        clock_tick: Arc<AtomicU64>,
    ) -> Self {
        let handle = thread::spawn(move || {
            while running.load(Ordering::SeqCst) && processor.status() == Status::Success {
                processor.step();
                if processor.next() == Phase::Fetch {
                    thread::sleep(Duration::from_millis(clock_tick.load(Ordering::SeqCst)));
                }
            }
            running.store(false, Ordering::SeqCst);
        });
        Self { handle }
    }

    /// Wait for the thread to observe the cleared running flag and
    /// exit. A pending sleep is allowed to expire.
    pub(crate) fn join(self) {
        let _ = self.handle.join();
    }
}
