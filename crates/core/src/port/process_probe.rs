// Process Probe Port
// Liveness checks used to reclaim ledger entries left by dead processes

/// OS process liveness interface
pub trait ProcessProbe: Send + Sync {
    /// Check if a process is still alive
    ///
    /// Implementations must fail closed: when liveness cannot be decided,
    /// report the process as alive so its reservation is kept.
    fn is_alive(&self, pid: u32) -> bool;

    /// PID recorded in ledger entries written by this process
    fn current_pid(&self) -> u32 {
        std::process::id()
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashSet;
    use std::sync::{Mutex, PoisonError};

    /// Probe with an explicit set of live PIDs
    pub struct MockProcessProbe {
        current: u32,
        alive: Mutex<HashSet<u32>>,
    }

    impl MockProcessProbe {
        /// `current` is always alive
        pub fn new(current: u32) -> Self {
            let mut alive = HashSet::new();
            alive.insert(current);
            Self {
                current,
                alive: Mutex::new(alive),
            }
        }

        pub fn set_alive(&self, pid: u32, alive: bool) {
            let mut set = self.alive.lock().unwrap_or_else(PoisonError::into_inner);
            if alive {
                set.insert(pid);
            } else {
                set.remove(&pid);
            }
        }
    }

    impl ProcessProbe for MockProcessProbe {
        fn is_alive(&self, pid: u32) -> bool {
            self.alive
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .contains(&pid)
        }

        fn current_pid(&self) -> u32 {
            self.current
        }
    }
}
