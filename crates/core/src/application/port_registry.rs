// Port Registry
// In-process source of truth for port ownership during one generation run

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use crate::config::PortConfig;
use crate::domain::{
    category_port_range, ComponentCategory, PortAllocation, PortRange, ResourceType,
};
use crate::error::{AllocationError, Result};
use crate::port::TimeProvider;

/// Thread-safe map of port -> owner and (system, component) -> port
///
/// The same component name may hold one port per system. Every public method takes the single state lock once; internal helpers
/// receive the locked state instead of re-locking.
pub struct PortRegistry {
    range: PortRange,
    reserved: BTreeSet<u16>,
    time_provider: Arc<dyn TimeProvider>,
    state: Mutex<RegistryState>,
}

struct RegistryState {
    by_port: HashMap<u16, PortAllocation>,
    by_component: HashMap<(String, String), u16>,
    rng: StdRng,
}

impl PortRegistry {
    /// Create a registry over the configured range
    ///
    /// # Errors
    /// - AppError::Domain if the configured range is invalid
    pub fn new(config: &PortConfig, time_provider: Arc<dyn TimeProvider>) -> Result<Self> {
        Self::build(config, time_provider, StdRng::from_entropy())
    }

    /// Registry with a fixed search seed (reproducible search order in tests)
    pub fn with_seed(
        config: &PortConfig,
        time_provider: Arc<dyn TimeProvider>,
        seed: u64,
    ) -> Result<Self> {
        Self::build(config, time_provider, StdRng::seed_from_u64(seed))
    }

    fn build(config: &PortConfig, time_provider: Arc<dyn TimeProvider>, rng: StdRng) -> Result<Self> {
        let range = config.range()?;
        Ok(Self {
            range,
            reserved: config.reserved_ports.clone(),
            time_provider,
            state: Mutex::new(RegistryState {
                by_port: HashMap::new(),
                by_component: HashMap::new(),
                rng,
            }),
        })
    }

    pub fn range(&self) -> PortRange {
        self.range
    }

    pub fn is_reserved(&self, port: u16) -> bool {
        self.reserved.contains(&port)
    }

    /// Allocate a port for a component
    ///
    /// Idempotent per (system, component): a component that already holds a
    /// port in the same system gets that port back. Ports held by any other
    /// owner are never handed out.
    ///
    /// Search order: `preferred` (if in range, not reserved and free), then a
    /// walk of the full range starting at a random offset inside the
    /// category's preferred sub-range.
    ///
    /// # Errors
    /// - AllocationError::PoolExhausted if no free port exists after a full wrap
    pub fn allocate_port(
        &self,
        component: &str,
        component_type: ComponentCategory,
        system_id: &str,
        preferred: Option<u16>,
    ) -> std::result::Result<u16, AllocationError> {
        let mut state = self.lock();

        if let Some(port) = existing_for(&state, system_id, component) {
            debug!(component = %component, port = %port, "Returning existing port allocation");
            return Ok(port);
        }

        if let Some(port) = preferred {
            if self.range.contains(port) && self.is_free(&state, port) {
                self.record(&mut state, component, component_type, system_id, port);
                return Ok(port);
            }
            debug!(
                component = %component,
                preferred = %port,
                "Preferred port unavailable, searching range"
            );
        }

        let start = self.search_start(&mut state, component_type);
        let span = u64::from(self.range.span());
        for step in 0..span {
            let candidate = self.range.nth_wrapping(start + step);
            if self.is_free(&state, candidate) {
                self.record(&mut state, component, component_type, system_id, candidate);
                return Ok(candidate);
            }
        }

        warn!(
            component = %component,
            system_id = %system_id,
            range = %self.range,
            "Port range exhausted"
        );
        Err(AllocationError::PoolExhausted {
            component: component.to_string(),
            system: system_id.to_string(),
            resource_type: ResourceType::Port,
            range: self.range,
            attempts: self.range.span(),
        })
    }

    /// Record an exact port chosen elsewhere (the ledger-backed allocator)
    ///
    /// # Errors
    /// - AllocationError::ConflictingReservation if the port or the component
    ///   is already bound to someone else
    pub fn claim_port(
        &self,
        component: &str,
        component_type: ComponentCategory,
        system_id: &str,
        port: u16,
    ) -> std::result::Result<u16, AllocationError> {
        let mut state = self.lock();

        if let Some(existing) = existing_for(&state, system_id, component) {
            if existing == port {
                return Ok(port);
            }
            return Err(AllocationError::ConflictingReservation {
                port,
                holder_system: system_id.to_string(),
                holder_component: component.to_string(),
                requested_system: system_id.to_string(),
                requested_component: component.to_string(),
            });
        }

        if let Some(holder) = state.by_port.get(&port) {
            return Err(conflict(port, holder, system_id, component));
        }

        self.record(&mut state, component, component_type, system_id, port);
        Ok(port)
    }

    /// Release one port; returns the allocation that held it
    pub fn deallocate_port(&self, port: u16) -> Option<PortAllocation> {
        let mut state = self.lock();
        let allocation = state.by_port.remove(&port)?;
        state.by_component.remove(&owner_key(&allocation.system_id, &allocation.component_name));
        info!(
            port = %port,
            component = %allocation.component_name,
            "Port deallocated"
        );
        Some(allocation)
    }

    /// Release whatever port a component holds in one system
    pub fn deallocate_component(&self, system_id: &str, component: &str) -> Option<u16> {
        let mut state = self.lock();
        let port = state.by_component.remove(&owner_key(system_id, component))?;
        state.by_port.remove(&port);
        info!(port = %port, system_id = %system_id, component = %component, "Component port deallocated");
        Some(port)
    }

    /// Release every port tied to a system; returns how many were released
    pub fn cleanup_system(&self, system_id: &str) -> usize {
        let mut state = self.lock();
        let ports: Vec<u16> = state
            .by_port
            .values()
            .filter(|a| a.system_id == system_id)
            .map(|a| a.port)
            .collect();

        for port in &ports {
            if let Some(allocation) = state.by_port.remove(port) {
                state
                    .by_component
                    .remove(&owner_key(&allocation.system_id, &allocation.component_name));
            }
        }

        info!(system_id = %system_id, released = ports.len(), "System ports cleaned up");
        ports.len()
    }

    /// Not reserved and not held by anyone in this process
    pub fn is_port_available(&self, port: u16) -> bool {
        let state = self.lock();
        self.is_free(&state, port)
    }

    pub fn get_allocation_info(&self, port: u16) -> Option<PortAllocation> {
        self.lock().by_port.get(&port).cloned()
    }

    pub fn component_port(&self, system_id: &str, component: &str) -> Option<u16> {
        existing_for(&self.lock(), system_id, component)
    }

    /// Allocations belonging to a system, ordered by port
    pub fn allocations_for_system(&self, system_id: &str) -> Vec<PortAllocation> {
        let state = self.lock();
        let mut allocations: Vec<PortAllocation> = state
            .by_port
            .values()
            .filter(|a| a.system_id == system_id)
            .cloned()
            .collect();
        allocations.sort_by_key(|a| a.port);
        allocations
    }

    /// Split `ports` into (available, unavailable) without allocating
    pub fn validate_port_availability(&self, ports: &[u16]) -> (Vec<u16>, Vec<u16>) {
        let state = self.lock();
        ports
            .iter()
            .copied()
            .partition(|port| self.is_free(&state, *port))
    }

    pub fn allocated_count(&self) -> usize {
        self.lock().by_port.len()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        // maps are only mutated together under the guard, so a poisoned
        // state is still consistent
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_free(&self, state: &RegistryState, port: u16) -> bool {
        port != 0 && !self.reserved.contains(&port) && !state.by_port.contains_key(&port)
    }

    /// Offset (relative to range start) where the search begins
    fn search_start(&self, state: &mut RegistryState, component_type: ComponentCategory) -> u64 {
        let window = category_port_range(component_type)
            .and_then(|sub| sub.intersect(&self.range))
            .unwrap_or(self.range);
        let offset_in_window = state.rng.gen_range(0..window.span());
        u64::from(window.start - self.range.start) + u64::from(offset_in_window)
    }

    fn record(
        &self,
        state: &mut RegistryState,
        component: &str,
        component_type: ComponentCategory,
        system_id: &str,
        port: u16,
    ) {
        let allocation = PortAllocation {
            component_name: component.to_string(),
            port,
            allocated_at: self.time_provider.now_millis(),
            system_id: system_id.to_string(),
            component_type,
        };
        state.by_port.insert(port, allocation);
        state.by_component.insert(owner_key(system_id, component), port);
        info!(
            component = %component,
            component_type = %component_type,
            system_id = %system_id,
            port = %port,
            "Port allocated"
        );
    }
}

fn owner_key(system_id: &str, component: &str) -> (String, String) {
    (system_id.to_string(), component.to_string())
}

fn existing_for(state: &RegistryState, system_id: &str, component: &str) -> Option<u16> {
    state
        .by_component
        .get(&owner_key(system_id, component))
        .copied()
}

fn conflict(port: u16, holder: &PortAllocation, system_id: &str, component: &str) -> AllocationError {
    AllocationError::ConflictingReservation {
        port,
        holder_system: holder.system_id.clone(),
        holder_component: holder.component_name.clone(),
        requested_system: system_id.to_string(),
        requested_component: component.to_string(),
    }
}
