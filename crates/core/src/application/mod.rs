// Application Layer - Allocation and timeout services

pub mod cancel;
pub mod constants;
pub mod orchestrator;
pub mod port_allocator;
pub mod port_registry;
pub mod timeout;

// Re-exports
pub use cancel::{cancel_channel, CancelSender, CancelToken};
pub use orchestrator::{CleanupReport, ComponentConfig, ResourceOrchestrator};
pub use port_allocator::{PortAllocator, PortGrant, SystemRelease};
pub use port_registry::PortRegistry;
pub use timeout::{TimeoutManager, TimeoutScope, TimeoutStatistics};
