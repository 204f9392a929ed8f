// Port Layer - Interfaces for external dependencies

pub mod bind_probe;
pub mod component_catalog;
pub mod id_provider; // For deterministic testing
pub mod ledger_backend;
pub mod process_probe;
pub mod time_provider;

// Re-exports
pub use bind_probe::BindProbe;
pub use component_catalog::{ComponentCatalog, ComponentDescriptor};
pub use id_provider::{IdProvider, UuidProvider};
pub use ledger_backend::{InMemoryLedger, LedgerBackend, LedgerWrite};
pub use process_probe::ProcessProbe;
pub use time_provider::{SystemTimeProvider, TimeProvider};
