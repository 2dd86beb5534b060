//! Mutation events for cells and registers.
//!
//! Observability is a first-class feature of the machine: front ends
//! watch individual cells and registers change while a program runs.
//! Each storage location publishes to a shared [`Watchers`] set;
//! subscribers implement [`Watcher`] and receive one [`Change`] per
//! mutation.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

/// Identifies the register a change came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// General purpose register, by index.
    General(usize),
    /// Program counter.
    ProgramCounter,
    /// Instruction register.
    Instruction,
    /// Next-move register.
    NextMove,
    /// Status register.
    Status,
}

/// A single observed mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Change {
    /// A memory cell was written.
    Cell { address: usize, block: u32 },
    /// A register was written.
    Register { role: Role, value: u32 },
}

/// A passive consumer of changes.
///
/// A watcher runs on the mutating thread, inside the mutation, and
/// must not call back into the machine.
pub trait Watcher: Send + Sync {
    /// Called once per completed write.
    fn on_change(&self, change: Change);
}

/// A shared set of watchers.
///
/// Cloning yields another handle to the same set, so one `Watchers`
/// can be distributed over every location of a memory or register
/// file while subscriptions stay in one place.
#[derive(Clone, Default)]
pub struct Watchers {
    inner: Arc<RwLock<Vec<Arc<dyn Watcher>>>>,
}

impl Watchers {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber.
    pub fn subscribe(&self, watcher: Arc<dyn Watcher>) {
        self.inner
            .write()
            .expect("watcher set lock poisoned")
            .push(watcher);
    }

    /// Deliver a change to every subscriber.
    pub(crate) fn emit(&self, change: Change) {
        let watchers = self.inner.read().expect("watcher set lock poisoned");
        for watcher in watchers.iter() {
            watcher.on_change(change);
        }
    }
}

impl std::fmt::Debug for Watchers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self
            .inner
            .read()
            .map(|watchers| watchers.len())
            .unwrap_or(0);
        f.debug_struct("Watchers").field("count", &count).finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Test watcher that records every change it sees.
    pub(crate) struct Recorder {
        pub changes: Mutex<Vec<Change>>,
    }

    impl Recorder {
        pub fn new() -> Arc<Self> {
            Arc::new(Self {
                changes: Mutex::new(Vec::new()),
            })
        }
    }

    impl Watcher for Recorder {
        fn on_change(&self, change: Change) {
            self.changes.lock().unwrap().push(change);
        }
    }

    #[test]
    fn test_subscribe_and_emit() {
        let watchers = Watchers::new();
        let recorder = Recorder::new();
        watchers.subscribe(recorder.clone());

        watchers.emit(Change::Cell {
            address: 3,
            block: 0xa,
        });

        assert_eq!(
            *recorder.changes.lock().unwrap(),
            vec![Change::Cell {
                address: 3,
                block: 0xa
            }]
        );
    }

    #[test]
    fn test_clone_shares_subscribers() {
        let watchers = Watchers::new();
        let handle = watchers.clone();
        let recorder = Recorder::new();
        watchers.subscribe(recorder.clone());

        handle.emit(Change::Register {
            role: Role::ProgramCounter,
            value: 4,
        });

        assert_eq!(recorder.changes.lock().unwrap().len(), 1);
    }
}
