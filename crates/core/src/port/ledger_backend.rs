// Ledger Backend Port
// Exclusive read-modify-write access to the shared port ledger

use crate::domain::LedgerDocument;
use crate::error::AllocationError;
use std::sync::{Mutex, PoisonError};

/// Whether a ledger transaction should persist its changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerWrite {
    Persist,
    Discard,
}

/// Storage for the port ledger
///
/// The probing and reservation algorithm lives in the allocator; a backend
/// only has to provide mutual exclusion around one whole-document
/// transaction. The default implementation is a file guarded by an advisory
/// lock (single host); a lease-based store could implement the same trait.
pub trait LedgerBackend: Send + Sync {
    /// Run `apply` against the current document under exclusive access
    ///
    /// The document is written back only when `apply` returns
    /// `LedgerWrite::Persist`.
    ///
    /// # Errors
    /// - `AllocationError::LedgerUnavailable` if the store or its lock cannot be accessed
    fn transact(
        &self,
        apply: &mut dyn FnMut(&mut LedgerDocument) -> LedgerWrite,
    ) -> Result<(), AllocationError>;

    /// Human-readable location, used in logs and errors
    fn location(&self) -> String;

    /// Copy of the current document
    fn snapshot(&self) -> Result<LedgerDocument, AllocationError> {
        let mut copy = LedgerDocument::new();
        self.transact(&mut |doc| {
            copy = doc.clone();
            LedgerWrite::Discard
        })?;
        Ok(copy)
    }
}

/// Process-local ledger
///
/// Provides the same transactional contract without cross-process
/// exclusion. Suitable for single-process runs and tests.
#[derive(Default)]
pub struct InMemoryLedger {
    document: Mutex<LedgerDocument>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing document
    pub fn with_document(document: LedgerDocument) -> Self {
        Self {
            document: Mutex::new(document),
        }
    }
}

impl LedgerBackend for InMemoryLedger {
    fn transact(
        &self,
        apply: &mut dyn FnMut(&mut LedgerDocument) -> LedgerWrite,
    ) -> Result<(), AllocationError> {
        let mut guard = self.document.lock().unwrap_or_else(PoisonError::into_inner);
        let mut working = guard.clone();
        if apply(&mut working) == LedgerWrite::Persist {
            *guard = working;
        }
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;

    /// Ledger whose store is always unreachable
    pub struct UnavailableLedger;

    impl LedgerBackend for UnavailableLedger {
        fn transact(
            &self,
            _apply: &mut dyn FnMut(&mut LedgerDocument) -> LedgerWrite,
        ) -> Result<(), AllocationError> {
            Err(AllocationError::LedgerUnavailable {
                location: self.location(),
                reason: "mock ledger is unavailable".to_string(),
            })
        }

        fn location(&self) -> String {
            "mock://unavailable".to_string()
        }
    }
}
