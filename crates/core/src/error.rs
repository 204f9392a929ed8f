// Central Error Types for the Resource Engine

use std::time::Duration;
use thiserror::Error;

use crate::domain::{PortRange, ResourceType, TimeoutLimit, TimeoutType};

/// Allocation failures
///
/// Messages name the component, resource type and configured range/attempts
/// so an operator can widen ranges or clear stale ledger entries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocationError {
    #[error(
        "Pool exhausted: no free {resource_type} for component '{component}' in system '{system}' \
         (range {range}, {attempts} attempts)"
    )]
    PoolExhausted {
        component: String,
        system: String,
        resource_type: ResourceType,
        range: PortRange,
        attempts: u32,
    },

    #[error(
        "Conflicting reservation: port {port} is held by {holder_system}/{holder_component}, \
         requested by {requested_system}/{requested_component}"
    )]
    ConflictingReservation {
        port: u16,
        holder_system: String,
        holder_component: String,
        requested_system: String,
        requested_component: String,
    },

    #[error("Ledger unavailable at {location}: {reason}")]
    LedgerUnavailable { location: String, reason: String },
}

/// Raised by the timeout manager when an operation outlives its limit
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "Operation '{operation_id}' ({timeout_type}) timed out after {:.2}s (limit {timeout_value})",
    .elapsed.as_secs_f64()
)]
pub struct TimeoutError {
    pub operation_id: String,
    pub timeout_type: TimeoutType,
    pub elapsed: Duration,
    pub timeout_value: TimeoutLimit,
    pub component_name: Option<String>,
    pub system_id: Option<String>,
}

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error(transparent)]
    Allocation(#[from] AllocationError),

    #[error(transparent)]
    Timeout(#[from] TimeoutError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// The timeout details, if this is a timeout
    pub fn as_timeout(&self) -> Option<&TimeoutError> {
        match self {
            AppError::Timeout(e) => Some(e),
            _ => None,
        }
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
