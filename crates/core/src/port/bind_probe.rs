// Bind Probe Port
// OS-level check that a port can actually be bound right now

/// Socket bind test interface
pub trait BindProbe: Send + Sync {
    /// Try to bind `port` and release it immediately
    fn is_bindable(&self, port: u16) -> bool;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashSet;
    use std::sync::{Mutex, PoisonError};

    /// Every port binds except the ones marked busy
    #[derive(Default)]
    pub struct MockBindProbe {
        busy: Mutex<HashSet<u16>>,
    }

    impl MockBindProbe {
        pub fn new() -> Self {
            Self::default()
        }

        /// Ports occupied by some unrelated process
        pub fn with_busy(ports: impl IntoIterator<Item = u16>) -> Self {
            Self {
                busy: Mutex::new(ports.into_iter().collect()),
            }
        }

        pub fn set_busy(&self, port: u16, busy: bool) {
            let mut set = self.busy.lock().unwrap_or_else(PoisonError::into_inner);
            if busy {
                set.insert(port);
            } else {
                set.remove(&port);
            }
        }
    }

    impl BindProbe for MockBindProbe {
        fn is_bindable(&self, port: u16) -> bool {
            !self
                .busy
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .contains(&port)
        }
    }
}
