// Port Allocator
// Cross-process-safe port allocation backed by the shared ledger

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::application::port_registry::PortRegistry;
use crate::config::PortConfig;
use crate::domain::{
    ComponentCategory, LedgerDocument, LedgerEntry, PortRange, Reservation, ResourceType,
};
use crate::error::{AllocationError, Result};
use crate::port::{BindProbe, LedgerBackend, LedgerWrite, ProcessProbe, TimeProvider};

/// Port handed out by the allocator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortGrant {
    pub port: u16,
    /// True when the caller's preferred port was granted
    pub preferred: bool,
}

/// Counts returned when a system's ports are released
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SystemRelease {
    pub registry_released: usize,
    pub ledger_released: usize,
}

/// Ledger-backed allocator
///
/// The ledger is the cross-process authority; the registry is the
/// in-process index consulted first and updated on every grant.
pub struct PortAllocator {
    range: PortRange,
    max_attempts: u32,
    stale_ttl_ms: i64,
    registry: Arc<PortRegistry>,
    ledger: Arc<dyn LedgerBackend>,
    bind_probe: Arc<dyn BindProbe>,
    process_probe: Arc<dyn ProcessProbe>,
    time_provider: Arc<dyn TimeProvider>,
}

impl PortAllocator {
    /// Create an allocator
    ///
    /// # Arguments
    /// * `config` - Range, attempt budget and stale TTL
    /// * `registry` - In-process index (shared with other callers of this run)
    /// * `ledger` - Shared ledger backend
    /// * `bind_probe` - OS bind test
    /// * `process_probe` - Liveness check for stale entry reclamation
    /// * `time_provider` - Clock for ledger timestamps
    ///
    /// # Example
    /// ```text
    /// let allocator = PortAllocator::new(
    ///     &config,
    ///     registry,
    ///     Arc::new(FileLedger::new(path)),
    ///     Arc::new(TcpBindProbe::localhost()),
    ///     Arc::new(SystemProcessProbe::new()),
    ///     Arc::new(SystemTimeProvider),
    /// )?;
    /// ```
    pub fn new(
        config: &PortConfig,
        registry: Arc<PortRegistry>,
        ledger: Arc<dyn LedgerBackend>,
        bind_probe: Arc<dyn BindProbe>,
        process_probe: Arc<dyn ProcessProbe>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            range: config.range()?,
            max_attempts: config.max_attempts,
            stale_ttl_ms: config.stale_ttl_ms(),
            registry,
            ledger,
            bind_probe,
            process_probe,
            time_provider,
        })
    }

    /// Deterministic first-probe candidate for (system, component)
    ///
    /// BLAKE3 of `"{system}:{component}"`, first 8 bytes little-endian,
    /// modulo the range span. Stable across runs and platforms.
    pub fn seed_candidate(range: PortRange, system: &str, component: &str) -> u16 {
        let digest = blake3::hash(format!("{}:{}", system, component).as_bytes());
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest.as_bytes()[..8]);
        range.nth_wrapping(u64::from_le_bytes(head))
    }

    pub fn registry(&self) -> &Arc<PortRegistry> {
        &self.registry
    }

    pub fn range(&self) -> PortRange {
        self.range
    }

    /// Allocate a port for (system, component)
    ///
    /// # Errors
    /// - AllocationError::PoolExhausted after the attempt budget
    /// - AllocationError::LedgerUnavailable if the ledger cannot be accessed
    pub fn allocate_port(
        &self,
        system: &str,
        component: &str,
        component_type: ComponentCategory,
    ) -> std::result::Result<u16, AllocationError> {
        self.allocate_port_preferring(system, component, component_type, None)
            .map(|grant| grant.port)
    }

    /// Allocate, trying `preferred` before the seeded probe sequence
    pub fn allocate_port_preferring(
        &self,
        system: &str,
        component: &str,
        component_type: ComponentCategory,
        preferred: Option<u16>,
    ) -> std::result::Result<PortGrant, AllocationError> {
        if let Some(port) = self.registry.component_port(system, component) {
            debug!(system = %system, component = %component, port = %port, "Port already held in-process");
            return Ok(PortGrant {
                port,
                preferred: preferred == Some(port),
            });
        }

        // A previous run of the same (system, component) may still own an entry
        if let Some(port) = self.ledger_owned_port(system, component)? {
            if self.try_candidate(system, component, component_type, port)? {
                info!(system = %system, component = %component, port = %port, "Reusing ledger reservation");
                return Ok(PortGrant {
                    port,
                    preferred: preferred == Some(port),
                });
            }
        }

        if let Some(port) = preferred.filter(|p| self.range.contains(*p)) {
            if self.try_candidate(system, component, component_type, port)? {
                return Ok(PortGrant {
                    port,
                    preferred: true,
                });
            }
            debug!(component = %component, preferred = %port, "Preferred port refused, probing");
        }

        let seed = Self::seed_candidate(self.range, system, component);
        let offset = u64::from(seed - self.range.start);
        let attempts = self.max_attempts.min(self.range.span());

        for attempt in 0..attempts {
            let candidate = self.range.nth_wrapping(offset + u64::from(attempt));
            if self.try_candidate(system, component, component_type, candidate)? {
                info!(
                    system = %system,
                    component = %component,
                    port = %candidate,
                    attempt = %attempt,
                    "Port reserved"
                );
                return Ok(PortGrant {
                    port: candidate,
                    preferred: false,
                });
            }
        }

        warn!(
            system = %system,
            component = %component,
            range = %self.range,
            attempts = %attempts,
            "Port allocation exhausted its attempt budget"
        );
        Err(AllocationError::PoolExhausted {
            component: component.to_string(),
            system: system.to_string(),
            resource_type: ResourceType::Port,
            range: self.range,
            attempts,
        })
    }

    /// Release one port from both registry and ledger
    ///
    /// Returns true if anything was released.
    pub fn release_port(&self, port: u16) -> std::result::Result<bool, AllocationError> {
        let in_process = self.registry.deallocate_port(port).is_some();
        let mut in_ledger = false;
        self.ledger.transact(&mut |doc| {
            in_ledger = doc.release(port).is_some();
            if in_ledger {
                LedgerWrite::Persist
            } else {
                LedgerWrite::Discard
            }
        })?;
        Ok(in_process || in_ledger)
    }

    /// Release the port held by (system, component), if any
    pub fn release_component(
        &self,
        system: &str,
        component: &str,
    ) -> std::result::Result<Option<u16>, AllocationError> {
        let released = self.registry.deallocate_component(system, component);

        let mut ledger_port = None;
        self.ledger.transact(&mut |doc| {
            ledger_port = doc
                .entries()
                .find(|(_, entry)| entry.is_owned_by(system, component))
                .map(|(port, _)| port);
            match ledger_port {
                Some(port) => {
                    doc.release(port);
                    LedgerWrite::Persist
                }
                None => LedgerWrite::Discard,
            }
        })?;

        Ok(released.or(ledger_port))
    }

    /// Release every port tied to a system (rollback path)
    pub fn release_system(&self, system: &str) -> std::result::Result<SystemRelease, AllocationError> {
        let registry_released = self.registry.cleanup_system(system);
        let mut ledger_released = 0;
        self.ledger.transact(&mut |doc| {
            ledger_released = doc.release_where(|entry| entry.system == system);
            if ledger_released > 0 {
                LedgerWrite::Persist
            } else {
                LedgerWrite::Discard
            }
        })?;

        info!(
            system = %system,
            registry_released = registry_released,
            ledger_released = ledger_released,
            "System ports released"
        );
        Ok(SystemRelease {
            registry_released,
            ledger_released,
        })
    }

    /// Reap stale ledger entries now; returns how many were removed
    pub fn reap_stale_entries(&self) -> std::result::Result<usize, AllocationError> {
        let now = self.time_provider.now_millis();
        let mut reaped = Vec::new();
        self.ledger.transact(&mut |doc| {
            reaped = doc.reap_stale(now, self.stale_ttl_ms, |pid| self.process_probe.is_alive(pid));
            if reaped.is_empty() {
                LedgerWrite::Discard
            } else {
                LedgerWrite::Persist
            }
        })?;
        self.log_reaped(&reaped);
        Ok(reaped.len())
    }

    pub fn ledger_snapshot(&self) -> std::result::Result<LedgerDocument, AllocationError> {
        self.ledger.snapshot()
    }

    /// Split `ports` into (available, unavailable) without reserving anything
    ///
    /// A port is available when it is not reserved, not held in-process, not
    /// held by a live ledger entry, and bindable right now.
    pub fn validate_port_availability(
        &self,
        ports: &[u16],
    ) -> std::result::Result<(Vec<u16>, Vec<u16>), AllocationError> {
        let snapshot = self.ledger.snapshot()?;
        let now = self.time_provider.now_millis();

        let (available, unavailable) = ports.iter().copied().partition(|port| {
            let ledger_free = snapshot
                .get(*port)
                .map_or(true, |entry| self.is_stale(entry, now));
            self.registry.is_port_available(*port) && ledger_free && self.bind_probe.is_bindable(*port)
        });
        Ok((available, unavailable))
    }

    /// Live ledger entry already owned by (system, component)
    fn ledger_owned_port(
        &self,
        system: &str,
        component: &str,
    ) -> std::result::Result<Option<u16>, AllocationError> {
        let snapshot = self.ledger.snapshot()?;
        let now = self.time_provider.now_millis();
        let owned = snapshot
            .entries()
            .find(|(_, entry)| entry.is_owned_by(system, component) && !self.is_stale(entry, now))
            .map(|(port, _)| port);
        Ok(owned)
    }

    /// One probe attempt: in-process check, bind test, ledger write, registry claim
    ///
    /// `Ok(false)` means "try the next candidate"; only ledger access errors
    /// abort the probe sequence.
    fn try_candidate(
        &self,
        system: &str,
        component: &str,
        component_type: ComponentCategory,
        port: u16,
    ) -> std::result::Result<bool, AllocationError> {
        if self.registry.is_reserved(port) {
            return Ok(false);
        }
        if let Some(holder) = self.registry.get_allocation_info(port) {
            if holder.component_name != component || holder.system_id != system {
                debug!(port = %port, holder = %holder.component_name, "Port held in-process");
                return Ok(false);
            }
        }
        if !self.bind_probe.is_bindable(port) {
            debug!(port = %port, "Port failed bind test");
            return Ok(false);
        }

        let reservation = self.reserve_in_ledger(system, component, port)?;
        if let Reservation::Conflict(holder) = &reservation {
            debug!(
                port = %port,
                holder_system = %holder.system,
                holder_component = %holder.component,
                "Port reserved by another owner"
            );
            return Ok(false);
        }

        match self.registry.claim_port(component, component_type, system, port) {
            Ok(_) => Ok(true),
            Err(e) => {
                // lost an in-process race after the ledger write; undo our entry
                if reservation == Reservation::Reserved {
                    self.ledger.transact(&mut |doc| {
                        let ours = doc
                            .get(port)
                            .map_or(false, |entry| entry.is_owned_by(system, component));
                        if ours {
                            doc.release(port);
                            LedgerWrite::Persist
                        } else {
                            LedgerWrite::Discard
                        }
                    })?;
                }
                debug!(port = %port, error = %e, "In-process claim failed");
                Ok(false)
            }
        }
    }

    /// Reservation protocol, inside one exclusive ledger transaction
    fn reserve_in_ledger(
        &self,
        system: &str,
        component: &str,
        port: u16,
    ) -> std::result::Result<Reservation, AllocationError> {
        let now = self.time_provider.now_millis();
        let pid = self.process_probe.current_pid();
        let mut outcome = None;
        let mut reaped = Vec::new();

        self.ledger.transact(&mut |doc| {
            reaped = doc.reap_stale(now, self.stale_ttl_ms, |pid| self.process_probe.is_alive(pid));
            let result = doc.reserve(port, LedgerEntry::new(system, component, pid, now));
            let write = if result.is_granted() || !reaped.is_empty() {
                LedgerWrite::Persist
            } else {
                LedgerWrite::Discard
            };
            outcome = Some(result);
            write
        })?;

        self.log_reaped(&reaped);
        outcome.ok_or_else(|| AllocationError::LedgerUnavailable {
            location: self.ledger.location(),
            reason: "ledger transaction did not run".to_string(),
        })
    }

    fn is_stale(&self, entry: &LedgerEntry, now: i64) -> bool {
        entry.age_ms(now) > self.stale_ttl_ms || !self.process_probe.is_alive(entry.pid)
    }

    fn log_reaped(&self, reaped: &[(u16, LedgerEntry)]) {
        for (port, entry) in reaped {
            warn!(
                port = %port,
                system = %entry.system,
                component = %entry.component,
                pid = %entry.pid,
                ledger = %self.ledger.location(),
                "Reclaimed stale ledger entry"
            );
        }
    }
}
