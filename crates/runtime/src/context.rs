//! Generation context: wires the engine to the filesystem ledger and OS probes
//!
//! One context lives for one generation process. Allocation work blocks on
//! the ledger lock and socket binds, so it runs on the blocking pool under
//! the `resource_allocation` deadline.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use autocoder_core::application::constants::EXPIRED_SWEEP_INTERVAL;
use autocoder_core::application::{
    cancel_channel, CleanupReport, ComponentConfig, PortAllocator, PortRegistry, ResourceOrchestrator,
    TimeoutManager, TimeoutStatistics,
};
use autocoder_core::domain::{OperationSpec, ResourceManifest, ResourceRequirement, TimeoutType};
use autocoder_core::port::{
    BindProbe, ComponentCatalog, IdProvider, LedgerBackend, ProcessProbe, SystemTimeProvider,
    TimeProvider, UuidProvider,
};
use autocoder_core::AppError;
use autocoder_infra_system::{FileLedger, FsComponentCatalog, SystemProcessProbe, TcpBindProbe};

use crate::settings::Settings;

pub struct GenerationContext {
    settings: Settings,
    allocator: Arc<PortAllocator>,
    orchestrator: Arc<ResourceOrchestrator>,
    timeouts: Arc<TimeoutManager>,
    catalog: Arc<dyn ComponentCatalog>,
}

impl GenerationContext {
    /// Production wiring: file ledger, TCP bind test, OS liveness probe
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let ledger_path = settings.ledger_path();
        let ledger = FileLedger::new(&ledger_path).with_lock_timeout(settings.lock_timeout());
        let bind_probe = TcpBindProbe::new(settings.ledger.bind_host);

        info!(
            ledger = %ledger_path.display(),
            range_start = settings.ports.range_start,
            range_end = settings.ports.range_end,
            "Generation context initialized"
        );

        Self::with_backends(
            settings,
            Arc::new(ledger),
            Arc::new(bind_probe),
            Arc::new(SystemProcessProbe::new()),
        )
    }

    /// Wiring with caller-supplied ledger and probes
    pub fn with_backends(
        settings: Settings,
        ledger: Arc<dyn LedgerBackend>,
        bind_probe: Arc<dyn BindProbe>,
        process_probe: Arc<dyn ProcessProbe>,
    ) -> Result<Self> {
        settings.validate()?;

        let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
        let id_provider: Arc<dyn IdProvider> = Arc::new(UuidProvider);

        let registry = Arc::new(
            PortRegistry::new(&settings.ports, Arc::clone(&time_provider))
                .context("Failed to build port registry")?,
        );
        let allocator = Arc::new(
            PortAllocator::new(
                &settings.ports,
                registry,
                ledger,
                bind_probe,
                process_probe,
                Arc::clone(&time_provider),
            )
            .context("Failed to build port allocator")?,
        );
        let orchestrator = Arc::new(
            ResourceOrchestrator::new(
                Arc::clone(&allocator),
                settings.naming.clone(),
                time_provider,
            )
            .context("Failed to build resource orchestrator")?,
        );
        let timeouts = Arc::new(TimeoutManager::new(settings.timeouts.clone(), id_provider));

        Ok(Self {
            settings,
            allocator,
            orchestrator,
            timeouts,
            catalog: Arc::new(FsComponentCatalog::new()),
        })
    }

    /// Replace the component catalog
    pub fn with_catalog(mut self, catalog: Arc<dyn ComponentCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn allocator(&self) -> &Arc<PortAllocator> {
        &self.allocator
    }

    pub fn registry(&self) -> &Arc<PortRegistry> {
        self.allocator.registry()
    }

    pub fn orchestrator(&self) -> &Arc<ResourceOrchestrator> {
        &self.orchestrator
    }

    pub fn timeouts(&self) -> &Arc<TimeoutManager> {
        &self.timeouts
    }

    /// Allocate `requirements` for `system` under the allocation deadline
    ///
    /// On timeout the blocking batch is cancelled and awaited before this
    /// returns, so nothing is allocated after the caller's rollback.
    pub async fn allocate(
        &self,
        requirements: Vec<ResourceRequirement>,
        system: &str,
    ) -> Result<ResourceManifest, AppError> {
        let spec = OperationSpec::new(
            self.timeouts.generate_operation_id("allocate"),
            TimeoutType::ResourceAllocation,
        )
        .system(system);

        let orchestrator = Arc::clone(&self.orchestrator);
        let system_name = system.to_string();
        let (cancel_tx, cancel) = cancel_channel();

        let mut handle = tokio::task::spawn_blocking(move || {
            orchestrator.allocate_cancellable(&requirements, &system_name, &cancel)
        });

        let mut joined = false;
        let result = self
            .timeouts
            .run_with_timeout(spec, async {
                let outcome = (&mut handle).await;
                joined = true;
                outcome.map_err(|e| AppError::Internal(format!("allocation task failed: {}", e)))?
            })
            .await;

        if !joined {
            cancel_tx.cancel();
            match handle.await {
                Ok(Ok(_)) => warn!(system = %system, "Allocation finished after its deadline"),
                Ok(Err(stopped)) => {
                    info!(system = %system, reason = %stopped, "Abandoned allocation stopped")
                }
                Err(join_err) => {
                    warn!(system = %system, error = %join_err, "Abandoned allocation task failed")
                }
            }
        }
        result
    }

    /// Scan `component_dir` and allocate everything it declares
    ///
    /// On failure anything already held for `system` is released.
    pub async fn generate_manifest(
        &self,
        system: &str,
        component_dir: &Path,
    ) -> Result<ResourceManifest> {
        let requirements = self
            .orchestrator
            .scan(self.catalog.as_ref(), component_dir)
            .await
            .with_context(|| format!("Failed to scan components in {}", component_dir.display()))?;

        match self.allocate(requirements, system).await {
            Ok(manifest) => {
                info!(
                    system = %system,
                    allocations = manifest.allocations.len(),
                    ports = manifest.ports().len(),
                    "Resource manifest generated"
                );
                Ok(manifest)
            }
            Err(e) => {
                if let Err(cleanup_err) = self.cleanup_system(system).await {
                    warn!(system = %system, error = %cleanup_err, "Rollback after failed allocation failed");
                }
                Err(e).with_context(|| format!("Failed to allocate resources for system '{}'", system))
            }
        }
    }

    /// Release every port and name held for `system`
    pub async fn cleanup_system(&self, system: &str) -> Result<CleanupReport> {
        let orchestrator = Arc::clone(&self.orchestrator);
        let system_name = system.to_string();
        let report = tokio::task::spawn_blocking(move || {
            orchestrator.cleanup_system_resources(&system_name)
        })
        .await
        .context("Cleanup task failed")??;
        Ok(report)
    }

    /// Split `ports` into (available, unavailable)
    pub async fn validate_ports(&self, ports: Vec<u16>) -> Result<(Vec<u16>, Vec<u16>)> {
        let orchestrator = Arc::clone(&self.orchestrator);
        let split = tokio::task::spawn_blocking(move || {
            orchestrator.validate_port_availability(&ports)
        })
        .await
        .context("Port validation task failed")??;
        Ok(split)
    }

    pub fn generate_config(&self, manifest: &ResourceManifest) -> ComponentConfig {
        self.orchestrator.generate_config(manifest)
    }

    pub fn timeout_statistics(&self) -> TimeoutStatistics {
        self.timeouts.statistics()
    }

    /// Background sweep of abandoned timeout contexts
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        self.spawn_sweeper_every(EXPIRED_SWEEP_INTERVAL)
    }

    pub fn spawn_sweeper_every(&self, every: Duration) -> JoinHandle<()> {
        Arc::clone(&self.timeouts).spawn_sweeper(every)
    }
}
