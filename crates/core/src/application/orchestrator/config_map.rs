// Manifest -> nested configuration map for downstream renderers

use serde_json::Value;
use std::collections::BTreeMap;

use crate::domain::ResourceManifest;

/// component -> canonical key -> value
pub type ComponentConfig = BTreeMap<String, BTreeMap<String, Value>>;

/// Group allocations by component under canonical keys
///
/// A key allocated more than once for the same component becomes a JSON
/// array in allocation order.
pub fn generate_config(manifest: &ResourceManifest) -> ComponentConfig {
    let mut config = ComponentConfig::new();

    for allocation in &manifest.allocations {
        let section = config.entry(allocation.component_name.clone()).or_default();
        let key = allocation.resource_type.config_key().to_string();
        let value = allocation.allocated_value.to_json();

        match section.remove(&key) {
            None => {
                section.insert(key, value);
            }
            Some(Value::Array(mut values)) => {
                values.push(value);
                section.insert(key, Value::Array(values));
            }
            Some(previous) => {
                section.insert(key, Value::Array(vec![previous, value]));
            }
        }
    }

    config
}
