// Autocoder Core - Domain Logic & Ports
// NO infrastructure dependencies (filesystem ledger, sockets and OS probes live in infra-system)

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod port;

pub use error::{AllocationError, AppError, Result, TimeoutError};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
