// Port Domain Model

use serde::{Deserialize, Serialize};

use crate::domain::error::{DomainError, Result};
use crate::domain::resource::ComponentCategory;

/// Inclusive port range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl PortRange {
    /// Create a validated range (`1 <= start <= end`)
    pub fn new(start: u16, end: u16) -> Result<Self> {
        if start == 0 || start > end {
            return Err(DomainError::InvalidPortRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Number of ports in the range
    pub fn span(&self) -> u32 {
        u32::from(self.end) - u32::from(self.start) + 1
    }

    pub fn contains(&self, port: u16) -> bool {
        port >= self.start && port <= self.end
    }

    /// Port at `offset` from start, wrapping around the range
    pub fn nth_wrapping(&self, offset: u64) -> u16 {
        let idx = offset % u64::from(self.span());
        // idx < span <= 65535, so the sum stays inside u16
        (u32::from(self.start) + idx as u32) as u16
    }

    /// Overlap with another range, if any
    pub fn intersect(&self, other: &PortRange) -> Option<PortRange> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start <= end).then_some(PortRange { start, end })
    }
}

impl std::fmt::Display for PortRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Preferred sub-range for a component category, if it has one
///
/// Keeps API endpoints, websockets and metrics endpoints from clustering on
/// the same ports.
pub fn category_port_range(category: ComponentCategory) -> Option<PortRange> {
    match category {
        ComponentCategory::ApiEndpoint => Some(PortRange { start: 8000, end: 8499 }),
        ComponentCategory::Websocket => Some(PortRange { start: 8500, end: 8999 }),
        ComponentCategory::MetricsEndpoint => Some(PortRange { start: 9000, end: 9199 }),
        _ => None,
    }
}

/// In-process port allocation record, owned by the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortAllocation {
    pub component_name: String,
    pub port: u16,
    pub allocated_at: i64, // epoch ms
    pub system_id: String,
    pub component_type: ComponentCategory,
}
