// Component Catalog Port
// Source of declared component descriptors for the resource scan

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A component as declared by the generated system
///
/// The category comes from `component_type`; `dependencies` and `source`
/// are only scanned for incidental technology usage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDescriptor {
    pub name: String,
    #[serde(alias = "type")]
    pub component_type: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub source: Option<String>,
}

impl ComponentDescriptor {
    pub fn new(name: impl Into<String>, component_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            component_type: component_type.into(),
            dependencies: Vec::new(),
            source: None,
        }
    }

    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Loads component descriptors from a component directory
#[async_trait]
pub trait ComponentCatalog: Send + Sync {
    /// Load every component declared under `component_dir`
    ///
    /// # Errors
    /// - AppError::Io if the directory cannot be read
    /// - AppError::Serialization if a descriptor is malformed
    async fn load(&self, component_dir: &Path) -> Result<Vec<ComponentDescriptor>>;
}

pub mod mocks {
    use super::*;

    /// Catalog returning a fixed list regardless of directory
    pub struct StaticCatalog {
        components: Vec<ComponentDescriptor>,
    }

    impl StaticCatalog {
        pub fn new(components: Vec<ComponentDescriptor>) -> Self {
            Self { components }
        }
    }

    #[async_trait]
    impl ComponentCatalog for StaticCatalog {
        async fn load(&self, _component_dir: &Path) -> Result<Vec<ComponentDescriptor>> {
            Ok(self.components.clone())
        }
    }
}
