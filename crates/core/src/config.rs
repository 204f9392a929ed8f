// Engine configuration
// Plain serde structs; layered loading lives in the runtime crate

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::application::constants::*;
use crate::domain::error::{DomainError, Result};
use crate::domain::{PortRange, Technology, TimeoutLimit, TimeoutType};

/// Port allocation configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortConfig {
    /// First allocatable port
    pub range_start: u16,

    /// Last allocatable port (inclusive)
    pub range_end: u16,

    /// Probe budget per ledger-backed allocation
    pub max_attempts: u32,

    /// Ports excluded regardless of range
    pub reserved_ports: BTreeSet<u16>,

    /// Retention TTL for ledger entries (seconds)
    pub stale_ttl_secs: u64,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            range_start: DEFAULT_PORT_RANGE_START,
            range_end: DEFAULT_PORT_RANGE_END,
            max_attempts: DEFAULT_MAX_ALLOCATION_ATTEMPTS,
            reserved_ports: DEFAULT_RESERVED_PORTS.iter().copied().collect(),
            stale_ttl_secs: DEFAULT_STALE_TTL_SECS,
        }
    }
}

impl PortConfig {
    /// Config with an explicit range and reserved set, other fields default
    pub fn with_range(start: u16, end: u16, reserved: impl IntoIterator<Item = u16>) -> Self {
        Self {
            range_start: start,
            range_end: end,
            reserved_ports: reserved.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn range(&self) -> Result<PortRange> {
        PortRange::new(self.range_start, self.range_end)
    }

    pub fn stale_ttl_ms(&self) -> i64 {
        i64::try_from(self.stale_ttl_secs.saturating_mul(1000)).unwrap_or(i64::MAX)
    }

    pub fn validate(&self) -> Result<()> {
        self.range()?;
        if self.max_attempts == 0 {
            return Err(DomainError::ValidationError(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Naming patterns for non-port resources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    pub database_prefix: String,
    pub storage_base_path: String,
    pub cache_namespace: String,
    pub database_host: String,
    pub credential_placeholder: String,
    pub user_placeholder: String,
    /// Technology used for connection strings when no relational hint exists
    pub default_database: Technology,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            database_prefix: DEFAULT_DATABASE_PREFIX.to_string(),
            storage_base_path: DEFAULT_STORAGE_BASE_PATH.to_string(),
            cache_namespace: DEFAULT_CACHE_NAMESPACE.to_string(),
            database_host: DEFAULT_DATABASE_HOST.to_string(),
            credential_placeholder: DEFAULT_CREDENTIAL_PLACEHOLDER.to_string(),
            user_placeholder: DEFAULT_USER_PLACEHOLDER.to_string(),
            default_database: Technology::Postgres,
        }
    }
}

impl NamingConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.default_database.is_relational() {
            return Err(DomainError::ValidationError(format!(
                "default_database must be postgres, mysql or sqlite, got {}",
                self.default_database
            )));
        }
        Ok(())
    }
}

/// Per-type timeout overrides
///
/// Types missing from the table use `TimeoutType::default_limit`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimeoutConfig {
    overrides: BTreeMap<TimeoutType, TimeoutLimit>,
}

impl TimeoutConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(mut self, timeout_type: TimeoutType, limit: impl Into<TimeoutLimit>) -> Self {
        self.overrides.insert(timeout_type, limit.into());
        self
    }

    pub fn limit_for(&self, timeout_type: TimeoutType) -> TimeoutLimit {
        self.overrides
            .get(&timeout_type)
            .copied()
            .unwrap_or_else(|| timeout_type.default_limit())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_port_config_defaults() {
        let config = PortConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_attempts, 50);
        assert!(config.reserved_ports.contains(&22));
        assert!(config.reserved_ports.contains(&443));
        assert_eq!(config.stale_ttl_ms(), 7 * 24 * 60 * 60 * 1000);
    }

    #[test]
    fn test_port_config_rejects_zero_attempts() {
        let config = PortConfig {
            max_attempts: 0,
            ..PortConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_port_config_deserializes() {
        let config: PortConfig =
            serde_json::from_value(serde_json::json!({"range_start": 9000, "range_end": 9100}))
                .unwrap();
        assert_eq!(config.range().unwrap(), PortRange::new(9000, 9100).unwrap());
        assert_eq!(config.max_attempts, DEFAULT_MAX_ALLOCATION_ATTEMPTS);
    }

    #[test]
    fn test_timeout_config_overrides() {
        let config: TimeoutConfig = serde_json::from_value(serde_json::json!({
            "health_check": 2.0,
            "validation": "infinite"
        }))
        .unwrap();

        assert_eq!(
            config.limit_for(TimeoutType::HealthCheck).as_duration(),
            Some(Duration::from_secs(2))
        );
        assert!(config.limit_for(TimeoutType::Validation).is_infinite());
        assert_eq!(
            config.limit_for(TimeoutType::NetworkRequest),
            TimeoutType::NetworkRequest.default_limit()
        );
    }

    #[test]
    fn test_naming_rejects_non_relational_default() {
        let config = NamingConfig {
            default_database: Technology::Kafka,
            ..NamingConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
