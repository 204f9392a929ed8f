// Resource Domain Model
// Requirements in, allocations out, bundled into a manifest per system

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::domain::error::DomainError;

/// Kind of resource a component can ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Port,
    DatabaseName,
    DatabaseConnection,
    MessageTopic,
    MessageQueue,
    StoragePath,
    StorageVolume,
    CacheKeyPrefix,
}

impl ResourceType {
    /// All resource types, in canonical order
    pub const ALL: [ResourceType; 8] = [
        ResourceType::Port,
        ResourceType::DatabaseName,
        ResourceType::DatabaseConnection,
        ResourceType::MessageTopic,
        ResourceType::MessageQueue,
        ResourceType::StoragePath,
        ResourceType::StorageVolume,
        ResourceType::CacheKeyPrefix,
    ];

    /// Canonical key used in generated configuration maps
    pub fn config_key(&self) -> &'static str {
        match self {
            ResourceType::Port => "port",
            ResourceType::DatabaseName => "database_name",
            ResourceType::DatabaseConnection => "database_connection",
            ResourceType::MessageTopic => "message_topic",
            ResourceType::MessageQueue => "message_queue",
            ResourceType::StoragePath => "storage_path",
            ResourceType::StorageVolume => "storage_volume",
            ResourceType::CacheKeyPrefix => "cache_key_prefix",
        }
    }

    /// Default allocation priority (lower = allocated earlier)
    ///
    /// Ports go first, then databases and messaging, storage last.
    pub fn default_priority(&self) -> i32 {
        match self {
            ResourceType::Port => 1,
            ResourceType::DatabaseName => 2,
            ResourceType::DatabaseConnection => 3,
            ResourceType::MessageTopic | ResourceType::MessageQueue => 4,
            ResourceType::StoragePath | ResourceType::StorageVolume => 5,
            ResourceType::CacheKeyPrefix => 6,
        }
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.config_key())
    }
}

/// Backing technology detected for a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Technology {
    Postgres,
    Mysql,
    Sqlite,
    Redis,
    Kafka,
    Rabbitmq,
    Filesystem,
    ObjectStorage,
}

impl Technology {
    pub fn as_str(&self) -> &'static str {
        match self {
            Technology::Postgres => "postgres",
            Technology::Mysql => "mysql",
            Technology::Sqlite => "sqlite",
            Technology::Redis => "redis",
            Technology::Kafka => "kafka",
            Technology::Rabbitmq => "rabbitmq",
            Technology::Filesystem => "filesystem",
            Technology::ObjectStorage => "object_storage",
        }
    }

    /// True for technologies a database connection string can target
    pub fn is_relational(&self) -> bool {
        matches!(
            self,
            Technology::Postgres | Technology::Mysql | Technology::Sqlite
        )
    }
}

impl std::fmt::Display for Technology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Technology {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_tag(s).as_str() {
            "postgres" | "postgresql" => Ok(Technology::Postgres),
            "mysql" | "mariadb" => Ok(Technology::Mysql),
            "sqlite" | "sqlite3" => Ok(Technology::Sqlite),
            "redis" => Ok(Technology::Redis),
            "kafka" => Ok(Technology::Kafka),
            "rabbitmq" | "amqp" => Ok(Technology::Rabbitmq),
            "filesystem" | "fs" => Ok(Technology::Filesystem),
            "objectstorage" | "s3" => Ok(Technology::ObjectStorage),
            _ => Err(DomainError::UnknownTag {
                kind: "technology",
                value: s.to_string(),
            }),
        }
    }
}

/// Component category, derived from a component's declared type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentCategory {
    ApiEndpoint,
    Websocket,
    MetricsEndpoint,
    Store,
    StreamProcessor,
    Source,
    Sink,
    Accumulator,
    Controller,
    Unknown,
}

impl ComponentCategory {
    /// Parse a declared type tag (`APIEndpoint`, `api_endpoint`, `Store`, ...)
    ///
    /// Unrecognised tags map to `Unknown`, which requires no resources.
    pub fn from_type_tag(tag: &str) -> Self {
        match normalize_tag(tag).as_str() {
            "apiendpoint" | "api" | "endpoint" | "httpendpoint" | "restendpoint" => {
                ComponentCategory::ApiEndpoint
            }
            "websocket" | "websocketendpoint" => ComponentCategory::Websocket,
            "metricsendpoint" | "metrics" => ComponentCategory::MetricsEndpoint,
            "store" | "database" | "datastore" => ComponentCategory::Store,
            "streamprocessor" | "transformer" | "processor" | "filter" => {
                ComponentCategory::StreamProcessor
            }
            "source" => ComponentCategory::Source,
            "sink" => ComponentCategory::Sink,
            "accumulator" | "aggregator" => ComponentCategory::Accumulator,
            "controller" | "router" => ComponentCategory::Controller,
            _ => ComponentCategory::Unknown,
        }
    }

    /// Canonical resource set every component of this category needs
    pub fn required_resources(&self) -> &'static [ResourceType] {
        match self {
            ComponentCategory::ApiEndpoint
            | ComponentCategory::Websocket
            | ComponentCategory::MetricsEndpoint => &[ResourceType::Port],
            ComponentCategory::Store => {
                &[ResourceType::DatabaseName, ResourceType::DatabaseConnection]
            }
            ComponentCategory::StreamProcessor => &[ResourceType::MessageTopic],
            ComponentCategory::Source | ComponentCategory::Sink => &[ResourceType::StoragePath],
            ComponentCategory::Accumulator => {
                &[ResourceType::CacheKeyPrefix, ResourceType::StorageVolume]
            }
            ComponentCategory::Controller => &[ResourceType::MessageQueue],
            ComponentCategory::Unknown => &[],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentCategory::ApiEndpoint => "api_endpoint",
            ComponentCategory::Websocket => "websocket",
            ComponentCategory::MetricsEndpoint => "metrics_endpoint",
            ComponentCategory::Store => "store",
            ComponentCategory::StreamProcessor => "stream_processor",
            ComponentCategory::Source => "source",
            ComponentCategory::Sink => "sink",
            ComponentCategory::Accumulator => "accumulator",
            ComponentCategory::Controller => "controller",
            ComponentCategory::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ComponentCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional steering information attached to a requirement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceHint {
    Technology(Technology),
    PreferredPort(u16),
    Name(String),
}

impl ResourceHint {
    pub fn technology(&self) -> Option<Technology> {
        match self {
            ResourceHint::Technology(t) => Some(*t),
            _ => None,
        }
    }
}

/// A declared need for a unique, conflict-free value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequirement {
    pub component_name: String,
    pub component_type: ComponentCategory,
    pub resource_type: ResourceType,
    pub hint: Option<ResourceHint>,
    pub priority: i32,
}

impl ResourceRequirement {
    /// Create a requirement with the resource type's default priority
    pub fn new(
        component_name: impl Into<String>,
        component_type: ComponentCategory,
        resource_type: ResourceType,
    ) -> Self {
        Self {
            component_name: component_name.into(),
            component_type,
            resource_type,
            hint: None,
            priority: resource_type.default_priority(),
        }
    }

    pub fn with_hint(mut self, hint: ResourceHint) -> Self {
        self.hint = Some(hint);
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Technology carried by the hint, if any
    pub fn technology(&self) -> Option<Technology> {
        self.hint.as_ref().and_then(ResourceHint::technology)
    }
}

/// Where an allocated value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationSource {
    Pool,
    Hint,
    Pattern,
    Generated,
}

/// Allocated value: ports stay numeric, everything else is a name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AllocatedValue {
    Port(u16),
    Name(String),
}

impl AllocatedValue {
    pub fn as_port(&self) -> Option<u16> {
        match self {
            AllocatedValue::Port(p) => Some(*p),
            AllocatedValue::Name(_) => None,
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            AllocatedValue::Port(_) => None,
            AllocatedValue::Name(n) => Some(n),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            AllocatedValue::Port(p) => serde_json::Value::from(*p),
            AllocatedValue::Name(n) => serde_json::Value::from(n.as_str()),
        }
    }
}

impl std::fmt::Display for AllocatedValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AllocatedValue::Port(p) => write!(f, "{}", p),
            AllocatedValue::Name(n) => f.write_str(n),
        }
    }
}

/// Result of one successful allocation (immutable once created)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceAllocation {
    pub component_name: String,
    pub resource_type: ResourceType,
    pub allocated_value: AllocatedValue,
    pub source: AllocationSource,
}

/// Resolved allocations for one system, produced once per generation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceManifest {
    pub system_name: String,
    pub allocations: Vec<ResourceAllocation>,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl ResourceManifest {
    /// Allocations belonging to one component, in manifest order
    pub fn for_component<'a>(
        &'a self,
        component: &'a str,
    ) -> impl Iterator<Item = &'a ResourceAllocation> + 'a {
        self.allocations
            .iter()
            .filter(move |a| a.component_name == component)
    }

    /// First value of a resource type allocated to a component
    pub fn value_of(&self, component: &str, resource_type: ResourceType) -> Option<&AllocatedValue> {
        self.allocations
            .iter()
            .find(|a| a.component_name == component && a.resource_type == resource_type)
            .map(|a| &a.allocated_value)
    }

    /// All ports in the manifest
    pub fn ports(&self) -> Vec<u16> {
        self.allocations
            .iter()
            .filter_map(|a| a.allocated_value.as_port())
            .collect()
    }
}

/// Lowercase and strip separators so `APIEndpoint` == `api_endpoint` == `api-endpoint`
fn normalize_tag(tag: &str) -> String {
    tag.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
