// Filesystem component catalog
// reason: tokio::fs so scanning never blocks the runtime
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use autocoder_core::error::Result;
use autocoder_core::port::{ComponentCatalog, ComponentDescriptor};

/// Reads every `*.json` file in a component directory
///
/// A file holds either one descriptor or an array of them. The combined
/// list is sorted by component name (stable, so same-named components keep
/// file order).
#[derive(Debug, Default, Clone, Copy)]
pub struct FsComponentCatalog;

impl FsComponentCatalog {
    pub fn new() -> Self {
        Self
    }

    async fn descriptor_files(component_dir: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(component_dir).await?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_json = path
                .extension()
                .map_or(false, |ext| ext.eq_ignore_ascii_case("json"));
            if is_json && entry.file_type().await?.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

#[async_trait]
impl ComponentCatalog for FsComponentCatalog {
    async fn load(&self, component_dir: &Path) -> Result<Vec<ComponentDescriptor>> {
        let mut components = Vec::new();

        for path in Self::descriptor_files(component_dir).await? {
            let raw = tokio::fs::read_to_string(&path).await?;
            let value: serde_json::Value = serde_json::from_str(&raw)?;
            if value.is_array() {
                let many: Vec<ComponentDescriptor> = serde_json::from_value(value)?;
                components.extend(many);
            } else {
                components.push(serde_json::from_value(value)?);
            }
            debug!(file = %path.display(), "Component descriptor loaded");
        }

        components.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(components)
    }
}
