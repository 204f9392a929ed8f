// Autocoder Infrastructure - System Adapters
// Implements: LedgerBackend, ProcessProbe, BindProbe, ComponentCatalog

pub mod bind_probe_impl;
pub mod component_catalog_impl;
pub mod file_ledger;
pub mod process_probe_impl;

pub use bind_probe_impl::TcpBindProbe;
pub use component_catalog_impl::FsComponentCatalog;
pub use file_ledger::FileLedger;
pub use process_probe_impl::SystemProcessProbe;
