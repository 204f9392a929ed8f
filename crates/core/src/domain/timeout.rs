// Timeout Domain Model

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// Category of bounded operation; each has its own configured limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutType {
    ComponentGeneration,
    ComponentInitialization,
    HealthCheck,
    ResourceAllocation,
    LlmGeneration,
    Validation,
    SystemGeneration,
    ProcessExecution,
    NetworkRequest,
}

impl TimeoutType {
    pub const ALL: [TimeoutType; 9] = [
        TimeoutType::ComponentGeneration,
        TimeoutType::ComponentInitialization,
        TimeoutType::HealthCheck,
        TimeoutType::ResourceAllocation,
        TimeoutType::LlmGeneration,
        TimeoutType::Validation,
        TimeoutType::SystemGeneration,
        TimeoutType::ProcessExecution,
        TimeoutType::NetworkRequest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeoutType::ComponentGeneration => "component_generation",
            TimeoutType::ComponentInitialization => "component_initialization",
            TimeoutType::HealthCheck => "health_check",
            TimeoutType::ResourceAllocation => "resource_allocation",
            TimeoutType::LlmGeneration => "llm_generation",
            TimeoutType::Validation => "validation",
            TimeoutType::SystemGeneration => "system_generation",
            TimeoutType::ProcessExecution => "process_execution",
            TimeoutType::NetworkRequest => "network_request",
        }
    }

    /// Built-in limit used when configuration does not override it
    pub fn default_limit(&self) -> TimeoutLimit {
        let secs = match self {
            TimeoutType::ComponentGeneration => 300,
            TimeoutType::ComponentInitialization => 60,
            TimeoutType::HealthCheck => 5,
            TimeoutType::ResourceAllocation => 30,
            TimeoutType::LlmGeneration => return TimeoutLimit::Infinite,
            TimeoutType::Validation => 120,
            TimeoutType::SystemGeneration => 1800,
            TimeoutType::ProcessExecution => 600,
            TimeoutType::NetworkRequest => 30,
        };
        TimeoutLimit::Finite(Duration::from_secs(secs))
    }
}

impl std::fmt::Display for TimeoutType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A deadline, or no deadline at all
///
/// Configured as seconds (`2.5`) or the string `"infinite"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TimeoutLimitRepr", into = "TimeoutLimitRepr")]
pub enum TimeoutLimit {
    Finite(Duration),
    Infinite,
}

impl TimeoutLimit {
    pub fn from_secs_f64(secs: f64) -> Self {
        TimeoutLimit::Finite(Duration::from_secs_f64(secs))
    }

    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            TimeoutLimit::Finite(d) => Some(*d),
            TimeoutLimit::Infinite => None,
        }
    }

    pub fn is_infinite(&self) -> bool {
        matches!(self, TimeoutLimit::Infinite)
    }
}

impl From<Duration> for TimeoutLimit {
    fn from(d: Duration) -> Self {
        TimeoutLimit::Finite(d)
    }
}

impl std::fmt::Display for TimeoutLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeoutLimit::Finite(d) => write!(f, "{:.1}s", d.as_secs_f64()),
            TimeoutLimit::Infinite => f.write_str("infinite"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum TimeoutLimitRepr {
    Seconds(f64),
    Keyword(String),
}

impl TryFrom<TimeoutLimitRepr> for TimeoutLimit {
    type Error = String;

    fn try_from(repr: TimeoutLimitRepr) -> Result<Self, Self::Error> {
        let secs = match repr {
            TimeoutLimitRepr::Seconds(secs) => secs,
            TimeoutLimitRepr::Keyword(word) => match word.trim().to_ascii_lowercase().as_str() {
                "infinite" | "inf" | "none" | "unlimited" => return Ok(TimeoutLimit::Infinite),
                // env-sourced numbers arrive as strings
                other => other
                    .parse::<f64>()
                    .map_err(|_| format!("invalid timeout value: {}", word))?,
            },
        };
        if !secs.is_finite() || secs <= 0.0 {
            return Err(format!("timeout must be a positive number of seconds, got {}", secs));
        }
        Ok(TimeoutLimit::from_secs_f64(secs))
    }
}

impl From<TimeoutLimit> for TimeoutLimitRepr {
    fn from(limit: TimeoutLimit) -> Self {
        match limit {
            TimeoutLimit::Finite(d) => TimeoutLimitRepr::Seconds(d.as_secs_f64()),
            TimeoutLimit::Infinite => TimeoutLimitRepr::Keyword("infinite".to_string()),
        }
    }
}

/// Describes an operation about to be bounded by the timeout manager
#[derive(Debug, Clone)]
pub struct OperationSpec {
    pub operation_id: String,
    pub timeout_type: TimeoutType,
    pub component_name: Option<String>,
    pub system_id: Option<String>,
    pub custom_timeout: Option<TimeoutLimit>,
}

impl OperationSpec {
    pub fn new(operation_id: impl Into<String>, timeout_type: TimeoutType) -> Self {
        Self {
            operation_id: operation_id.into(),
            timeout_type,
            component_name: None,
            system_id: None,
            custom_timeout: None,
        }
    }

    pub fn component(mut self, component: impl Into<String>) -> Self {
        self.component_name = Some(component.into());
        self
    }

    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system_id = Some(system.into());
        self
    }

    /// Override the per-type limit for this operation only
    pub fn timeout(mut self, limit: impl Into<TimeoutLimit>) -> Self {
        self.custom_timeout = Some(limit.into());
        self
    }
}

/// Bookkeeping for one in-flight bounded operation
#[derive(Debug, Clone)]
pub struct TimeoutContext {
    pub operation_id: String,
    pub timeout_type: TimeoutType,
    pub timeout_value: TimeoutLimit,
    pub start_time: Instant,
    pub component_name: Option<String>,
    pub system_id: Option<String>,
}

impl TimeoutContext {
    pub fn elapsed_time(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Time left before the deadline; `None` when the limit is infinite
    pub fn remaining_time(&self) -> Option<Duration> {
        self.timeout_value
            .as_duration()
            .map(|limit| limit.saturating_sub(self.elapsed_time()))
    }

    pub fn is_expired(&self) -> bool {
        match self.timeout_value {
            TimeoutLimit::Finite(limit) => self.elapsed_time() > limit,
            TimeoutLimit::Infinite => false,
        }
    }
}
