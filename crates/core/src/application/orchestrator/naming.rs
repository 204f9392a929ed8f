// Name ledger
// Run-scoped uniqueness for every name-shaped resource

use std::collections::HashMap;

use crate::application::constants::MAX_NAME_SUFFIX;
use crate::domain::ResourceType;

/// Names handed out in this run, keyed by resource type
///
/// Each resource type is its own namespace: a database and a volume may
/// share a name, two databases may not.
#[derive(Debug, Default)]
pub struct NameLedger {
    claimed: HashMap<(ResourceType, String), String>,
}

impl NameLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `name` verbatim; false if already taken
    pub fn claim_exact(&mut self, resource_type: ResourceType, name: &str, system: &str) -> bool {
        let key = (resource_type, name.to_string());
        if self.claimed.contains_key(&key) {
            return false;
        }
        self.claimed.insert(key, system.to_string());
        true
    }

    /// Claim `base`, or the first free `base_1`, `base_2`, ...
    ///
    /// Returns the claimed name and whether a suffix was needed, or `None`
    /// when every suffix up to the limit is taken.
    pub fn claim_unique(
        &mut self,
        resource_type: ResourceType,
        base: &str,
        system: &str,
    ) -> Option<(String, bool)> {
        if self.claim_exact(resource_type, base, system) {
            return Some((base.to_string(), false));
        }
        (1..=MAX_NAME_SUFFIX)
            .map(|n| format!("{}_{}", base, n))
            .find(|candidate| self.claim_exact(resource_type, candidate, system))
            .map(|name| (name, true))
    }

    pub fn contains(&self, resource_type: ResourceType, name: &str) -> bool {
        self.claimed.contains_key(&(resource_type, name.to_string()))
    }

    /// Forget every name claimed for `system`
    pub fn release_system(&mut self, system: &str) -> usize {
        let before = self.claimed.len();
        self.claimed.retain(|_, owner| owner != system);
        before - self.claimed.len()
    }

    pub fn len(&self) -> usize {
        self.claimed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claimed.is_empty()
    }
}

/// Database-safe identifier: lowercase, every non-alphanumeric becomes `_`
pub fn sanitize_identifier(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Path/topic segment: lowercase, keeps `-` and `_`
pub fn sanitize_segment(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}
