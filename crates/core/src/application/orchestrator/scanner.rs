// Requirement scanning
// Category drives the canonical resource set; regex detectors only tag incidental technology usage

use regex::Regex;

use crate::domain::{
    ComponentCategory, ResourceHint, ResourceRequirement, ResourceType, Technology,
};
use crate::error::{AppError, Result};
use crate::port::ComponentDescriptor;

/// (technology, pattern) in precedence order; the first match per resource type wins
const DETECTOR_PATTERNS: [(Technology, &str); 8] = [
    (
        Technology::Postgres,
        r"(?i)\b(postgres(ql)?|psycopg2?|asyncpg|tokio[-_]postgres|libpq)\b",
    ),
    (
        Technology::Mysql,
        r"(?i)\b(mysql|mariadb|pymysql|aiomysql|mysqlclient)\b",
    ),
    (Technology::Sqlite, r"(?i)\b(sqlite3?|rusqlite|aiosqlite)\b"),
    (Technology::Redis, r"(?i)\b(redis|aioredis)\b"),
    (
        Technology::Kafka,
        r"(?i)\b(kafka|aiokafka|rdkafka|confluent[-_]kafka)\b",
    ),
    (
        Technology::Rabbitmq,
        r"(?i)\b(rabbitmq|amqp|pika|aio[-_]pika|lapin)\b",
    ),
    (
        Technology::ObjectStorage,
        r"(?i)\b(s3|boto3|minio|object[-_]storage|gcs)\b",
    ),
    (
        Technology::Filesystem,
        r"(?i)(\bos\.path\b|\bpathlib\b|\baiofiles\b|\bstd::fs\b|\btokio::fs\b|\bopen\()",
    ),
];

struct Detector {
    technology: Technology,
    pattern: Regex,
}

/// Builds requirement lists from component descriptors
pub struct RequirementScanner {
    detectors: Vec<Detector>,
}

impl RequirementScanner {
    pub fn new() -> Result<Self> {
        let detectors = DETECTOR_PATTERNS
            .iter()
            .map(|(technology, pattern)| {
                Regex::new(pattern)
                    .map(|pattern| Detector {
                        technology: *technology,
                        pattern,
                    })
                    .map_err(|e| {
                        AppError::Internal(format!("invalid {} detector: {}", technology, e))
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { detectors })
    }

    /// Technologies mentioned in a component's dependencies or source text
    pub fn detect(&self, descriptor: &ComponentDescriptor) -> Vec<Technology> {
        let mut haystack = descriptor.dependencies.join("\n");
        if let Some(source) = &descriptor.source {
            haystack.push('\n');
            haystack.push_str(source);
        }

        self.detectors
            .iter()
            .filter(|d| d.pattern.is_match(&haystack))
            .map(|d| d.technology)
            .collect()
    }

    /// Requirements for every descriptor, in descriptor order
    pub fn requirements_for(&self, descriptors: &[ComponentDescriptor]) -> Vec<ResourceRequirement> {
        descriptors
            .iter()
            .flat_map(|d| self.requirements_for_component(d))
            .collect()
    }

    fn requirements_for_component(&self, descriptor: &ComponentDescriptor) -> Vec<ResourceRequirement> {
        let category = ComponentCategory::from_type_tag(&descriptor.component_type);
        let mut requirements: Vec<ResourceRequirement> = category
            .required_resources()
            .iter()
            .map(|rt| ResourceRequirement::new(&descriptor.name, category, *rt))
            .collect();

        for technology in self.detect(descriptor) {
            for resource_type in implied_resources(technology) {
                match requirements
                    .iter_mut()
                    .find(|r| r.resource_type == *resource_type)
                {
                    // already required: upgrade the hint, keep the first technology seen
                    Some(existing) => {
                        if existing.hint.is_none() {
                            existing.hint = Some(ResourceHint::Technology(technology));
                        }
                    }
                    None => requirements.push(
                        ResourceRequirement::new(&descriptor.name, category, *resource_type)
                            .with_hint(ResourceHint::Technology(technology)),
                    ),
                }
            }
        }

        requirements
    }
}

/// Resource types an incidental technology implies
fn implied_resources(technology: Technology) -> &'static [ResourceType] {
    match technology {
        Technology::Postgres | Technology::Mysql | Technology::Sqlite => {
            &[ResourceType::DatabaseName, ResourceType::DatabaseConnection]
        }
        Technology::Redis => &[ResourceType::CacheKeyPrefix],
        Technology::Kafka => &[ResourceType::MessageTopic],
        Technology::Rabbitmq => &[ResourceType::MessageQueue],
        Technology::Filesystem | Technology::ObjectStorage => &[ResourceType::StoragePath],
    }
}
