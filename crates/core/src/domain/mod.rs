// Domain Layer - Pure resource model

pub mod error;
pub mod ledger;
pub mod port;
pub mod resource;
pub mod timeout;

// Re-exports
pub use error::DomainError;
pub use ledger::{LedgerDocument, LedgerEntry, Reservation};
pub use port::{category_port_range, PortAllocation, PortRange};
pub use resource::{
    AllocatedValue, AllocationSource, ComponentCategory, ResourceAllocation, ResourceHint,
    ResourceManifest, ResourceRequirement, ResourceType, Technology,
};
pub use timeout::{OperationSpec, TimeoutContext, TimeoutLimit, TimeoutType};
