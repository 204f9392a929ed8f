//! Autocoder Runtime - composition root
//!
//! Loads layered settings, installs logging and wires the core engine to the
//! filesystem ledger and OS probes. Embedded by the generator process.

pub mod context;
pub mod settings;
pub mod telemetry;

pub use context::GenerationContext;
pub use settings::{LedgerSettings, LogFormat, LoggingSettings, Settings};
pub use telemetry::init_logging;
