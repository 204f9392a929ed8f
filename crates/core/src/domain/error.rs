// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid port range: {start}-{end}")]
    InvalidPortRange { start: u16, end: u16 },

    #[error("Unknown {kind} tag: {value}")]
    UnknownTag { kind: &'static str, value: String },

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
