// Timeout Manager
// Bounds async operations and guarantees their bookkeeping is removed exactly once

mod stats;

pub use stats::{Outcome, TimeoutStatistics};

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant};
use tracing::{debug, info, warn};

use crate::config::TimeoutConfig;
use crate::domain::{OperationSpec, TimeoutContext, TimeoutLimit, TimeoutType};
use crate::error::{AppError, Result, TimeoutError};
use crate::port::IdProvider;
use stats::StatsAccumulator;

/// Centralized timeout bookkeeping for one generation run
///
/// Contexts and statistics live behind separate locks; neither is held
/// across an await.
pub struct TimeoutManager {
    config: TimeoutConfig,
    id_provider: Arc<dyn IdProvider>,
    contexts: Mutex<HashMap<String, Tracked>>,
    generations: AtomicU64,
    stats: Mutex<StatsAccumulator>,
}

/// Active context tagged with the registration that created it
struct Tracked {
    generation: u64,
    context: TimeoutContext,
}

impl TimeoutManager {
    pub fn new(config: TimeoutConfig, id_provider: Arc<dyn IdProvider>) -> Self {
        Self {
            config,
            id_provider,
            contexts: Mutex::new(HashMap::new()),
            generations: AtomicU64::new(0),
            stats: Mutex::new(StatsAccumulator::default()),
        }
    }

    /// Configured limit for a type (override table, then built-in default)
    pub fn limit_for(&self, timeout_type: TimeoutType) -> TimeoutLimit {
        self.config.limit_for(timeout_type)
    }

    /// Start tracking an operation
    ///
    /// # Errors
    /// - AppError::Conflict if an active operation already uses this id
    pub fn create_context(&self, spec: OperationSpec) -> Result<TimeoutContext> {
        self.register(spec).map(|(_, context)| context)
    }

    fn register(&self, spec: OperationSpec) -> Result<(u64, TimeoutContext)> {
        let timeout_value = spec
            .custom_timeout
            .unwrap_or_else(|| self.limit_for(spec.timeout_type));

        let context = TimeoutContext {
            operation_id: spec.operation_id,
            timeout_type: spec.timeout_type,
            timeout_value,
            start_time: Instant::now(),
            component_name: spec.component_name,
            system_id: spec.system_id,
        };

        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        {
            let mut contexts = self.contexts();
            if contexts.contains_key(&context.operation_id) {
                return Err(AppError::Conflict(format!(
                    "operation '{}' is already active",
                    context.operation_id
                )));
            }
            contexts.insert(
                context.operation_id.clone(),
                Tracked {
                    generation,
                    context: context.clone(),
                },
            );
        }
        self.stats().record_start();

        debug!(
            operation_id = %context.operation_id,
            timeout_type = %context.timeout_type,
            timeout = %context.timeout_value,
            "Timeout context created"
        );
        Ok((generation, context))
    }

    /// Stop tracking an operation that finished normally
    ///
    /// A second call for the same id is a no-op returning `None`.
    pub fn complete_operation(&self, operation_id: &str) -> Option<TimeoutContext> {
        self.finish(operation_id, None, Outcome::Completed)
    }

    /// Poll-style deadline check
    ///
    /// # Errors
    /// - AppError::NotFound if the id is not active
    /// - AppError::Timeout if the deadline has passed
    pub fn check_timeout(&self, operation_id: &str) -> Result<()> {
        let contexts = self.contexts();
        let context = contexts
            .get(operation_id)
            .map(|tracked| &tracked.context)
            .ok_or_else(|| AppError::NotFound(format!("operation '{}'", operation_id)))?;
        if context.is_expired() {
            return Err(timeout_error(context).into());
        }
        Ok(())
    }

    /// Await `operation` under the limit resolved for `spec`
    ///
    /// A finite limit races the operation against a deadline and cancels it
    /// on expiry; an infinite limit simply awaits. The context is removed
    /// however the call ends, including when this future is dropped.
    ///
    /// # Errors
    /// - `AppError::Timeout` (converted into `E`) on expiry
    /// - `AppError::Conflict` (converted into `E`) if the id is already active
    /// - the operation's own error, unchanged
    pub async fn run_with_timeout<F, T, E>(
        &self,
        spec: OperationSpec,
        operation: F,
    ) -> std::result::Result<T, E>
    where
        F: Future<Output = std::result::Result<T, E>>,
        E: From<AppError>,
    {
        let (generation, context) = self.register(spec).map_err(E::from)?;
        let mut guard = OperationGuard::new(self, &context.operation_id, generation);

        let result = match context.timeout_value.as_duration() {
            None => operation.await,
            Some(limit) => match tokio::time::timeout(limit, operation).await {
                Ok(result) => result,
                Err(_) => {
                    guard.outcome = Outcome::TimedOut;
                    let error = timeout_error(&context);
                    warn!(
                        operation_id = %error.operation_id,
                        timeout_type = %error.timeout_type,
                        elapsed_secs = error.elapsed.as_secs_f64(),
                        limit = %error.timeout_value,
                        component = ?error.component_name,
                        system = ?error.system_id,
                        "Operation timed out"
                    );
                    return Err(E::from(AppError::Timeout(error)));
                }
            },
        };

        guard.outcome = if result.is_ok() {
            Outcome::Completed
        } else {
            Outcome::Failed
        };
        result
    }

    /// Scoped variant for inline bounded work
    ///
    /// The scope must be `finish`ed; dropping it unfinished records a
    /// cancellation.
    pub fn timeout_context(&self, spec: OperationSpec) -> Result<TimeoutScope<'_>> {
        let (generation, context) = self.register(spec)?;
        let guard = OperationGuard::new(self, &context.operation_id, generation);
        Ok(TimeoutScope { context, guard })
    }

    /// Remove contexts whose deadline passed without completion
    ///
    /// Each removed context counts as timed out. Returns how many were removed.
    pub fn cleanup_expired_operations(&self) -> usize {
        let expired: Vec<TimeoutContext> = {
            let mut contexts = self.contexts();
            let ids: Vec<String> = contexts
                .values()
                .filter(|t| t.context.is_expired())
                .map(|t| t.context.operation_id.clone())
                .collect();
            ids.iter()
                .filter_map(|id| contexts.remove(id))
                .map(|t| t.context)
                .collect()
        };

        if !expired.is_empty() {
            let mut stats = self.stats();
            for context in &expired {
                stats.record(Outcome::TimedOut, context.elapsed_time());
            }
        }
        for context in &expired {
            warn!(
                operation_id = %context.operation_id,
                timeout_type = %context.timeout_type,
                "Removed abandoned expired operation"
            );
        }
        expired.len()
    }

    pub fn statistics(&self) -> TimeoutStatistics {
        let active = self.contexts().len();
        self.stats().snapshot(active)
    }

    /// Active contexts, ordered by operation id
    pub fn active_operations(&self) -> Vec<TimeoutContext> {
        let mut active: Vec<TimeoutContext> =
            self.contexts().values().map(|t| t.context.clone()).collect();
        active.sort_by(|a, b| a.operation_id.cmp(&b.operation_id));
        active
    }

    /// Fresh operation id: `{prefix}-{unique id}`
    pub fn generate_operation_id(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.id_provider.generate_id())
    }

    /// Periodically sweep expired contexts (background task)
    pub fn spawn_sweeper(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(interval_secs = every.as_secs_f64(), "Timeout sweeper started");
            let mut tick = interval(every);
            loop {
                tick.tick().await;
                let removed = self.cleanup_expired_operations();
                if removed > 0 {
                    info!(removed = removed, "Timeout sweep completed");
                }
            }
        })
    }

    /// Remove a context and record how it ended; no-op for unknown ids
    ///
    /// With `generation` set, only the registration carrying that tag is
    /// removed; a later context reusing the id is left alone.
    fn finish(
        &self,
        operation_id: &str,
        generation: Option<u64>,
        outcome: Outcome,
    ) -> Option<TimeoutContext> {
        let context = {
            let mut contexts = self.contexts();
            let current = contexts.get(operation_id)?.generation;
            if generation.is_some_and(|g| g != current) {
                return None;
            }
            contexts.remove(operation_id)?.context
        };
        let elapsed = context.elapsed_time();
        self.stats().record(outcome, elapsed);
        debug!(
            operation_id = %operation_id,
            outcome = ?outcome,
            elapsed_secs = elapsed.as_secs_f64(),
            "Timeout context removed"
        );
        Some(context)
    }

    fn contexts(&self) -> MutexGuard<'_, HashMap<String, Tracked>> {
        self.contexts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn stats(&self) -> MutexGuard<'_, StatsAccumulator> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Removes its context on drop; the outcome defaults to cancelled
struct OperationGuard<'a> {
    manager: &'a TimeoutManager,
    operation_id: String,
    generation: u64,
    outcome: Outcome,
}

impl<'a> OperationGuard<'a> {
    fn new(manager: &'a TimeoutManager, operation_id: &str, generation: u64) -> Self {
        Self {
            manager,
            operation_id: operation_id.to_string(),
            generation,
            outcome: Outcome::Cancelled,
        }
    }
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        self.manager
            .finish(&self.operation_id, Some(self.generation), self.outcome);
    }
}

/// Scoped timeout tracking returned by `TimeoutManager::timeout_context`
pub struct TimeoutScope<'a> {
    context: TimeoutContext,
    guard: OperationGuard<'a>,
}

impl TimeoutScope<'_> {
    pub fn operation_id(&self) -> &str {
        &self.context.operation_id
    }

    pub fn context(&self) -> &TimeoutContext {
        &self.context
    }

    /// Error if the deadline has passed; the scope is then recorded as timed out
    pub fn check(&mut self) -> Result<()> {
        if self.context.is_expired() {
            self.guard.outcome = Outcome::TimedOut;
            return Err(timeout_error(&self.context).into());
        }
        Ok(())
    }

    pub fn elapsed(&self) -> Duration {
        self.context.elapsed_time()
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.context.remaining_time()
    }

    /// Mark the work done; returns its duration
    pub fn finish(mut self) -> Duration {
        if self.guard.outcome != Outcome::TimedOut {
            self.guard.outcome = Outcome::Completed;
        }
        self.elapsed()
    }

    /// Mark the work failed
    pub fn fail(mut self) {
        self.guard.outcome = Outcome::Failed;
    }
}

fn timeout_error(context: &TimeoutContext) -> TimeoutError {
    TimeoutError {
        operation_id: context.operation_id.clone(),
        timeout_type: context.timeout_type,
        elapsed: context.elapsed_time(),
        timeout_value: context.timeout_value,
        component_name: context.component_name.clone(),
        system_id: context.system_id.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::id_provider::mocks::SequentialIdProvider;
    use tokio::time::sleep;
    use tokio_test::{assert_err, assert_ok};

    fn manager() -> TimeoutManager {
        let config = TimeoutConfig::new().with_limit(TimeoutType::HealthCheck, Duration::from_secs(2));
        TimeoutManager::new(config, Arc::new(SequentialIdProvider::default()))
    }

    fn health(id: &str) -> OperationSpec {
        OperationSpec::new(id, TimeoutType::HealthCheck)
            .component("api")
            .system("sys")
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_health_check_times_out() {
        let manager = manager();
        let result: Result<()> = manager
            .run_with_timeout(health("hc-1"), async {
                sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;

        let err = result.unwrap_err();
        let timeout = err.as_timeout().unwrap();
        assert_eq!(timeout.operation_id, "hc-1");
        assert_eq!(timeout.timeout_type, TimeoutType::HealthCheck);
        assert_eq!(timeout.timeout_value, TimeoutLimit::Finite(Duration::from_secs(2)));
        // cancelled at the deadline, so elapsed tracks the 2s limit, not the 5s sleep
        assert!(timeout.elapsed >= Duration::from_secs(2));
        assert!(timeout.elapsed < Duration::from_millis(2100));
        assert_eq!(timeout.component_name.as_deref(), Some("api"));

        let stats = manager.statistics();
        assert_eq!(stats.timed_out, 1);
        assert_eq!(stats.active, 0);
        assert!((stats.timeout_rate - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_health_check_completes() {
        let manager = manager();
        let result: Result<u32> = manager
            .run_with_timeout(health("hc-2"), async {
                sleep(Duration::from_millis(500)).await;
                Ok(7)
            })
            .await;

        assert_eq!(assert_ok!(result), 7);
        assert!(manager.active_operations().is_empty());
        assert_eq!(manager.statistics().completed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_infinite_limit_never_times_out() {
        let manager = manager();
        let spec = OperationSpec::new("llm-1", TimeoutType::LlmGeneration);
        let result: Result<&str> = manager
            .run_with_timeout(spec, async {
                sleep(Duration::from_secs(24 * 60 * 60)).await;
                Ok("done")
            })
            .await;
        assert_eq!(assert_ok!(result), "done");
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_timeout_overrides_type() {
        let manager = manager();
        let spec = health("hc-3").timeout(Duration::from_secs(10));
        let result: Result<()> = manager
            .run_with_timeout(spec, async {
                sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert_ok!(result);
    }

    #[tokio::test(start_paused = true)]
    async fn test_operation_error_propagates_unchanged() {
        let manager = manager();
        let result: Result<()> = manager
            .run_with_timeout(health("hc-4"), async {
                Err(AppError::Validation("bad blueprint".into()))
            })
            .await;

        assert!(matches!(result, Err(AppError::Validation(ref m)) if m == "bad blueprint"));
        let stats = manager.statistics();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.active, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_operation_counts_as_cancelled() {
        let manager = manager();
        let inner = manager.run_with_timeout(health("hc-5"), async {
            sleep(Duration::from_secs(60)).await;
            Ok::<_, AppError>(())
        });

        // the outer deadline drops the inner future before its own limit fires
        assert_err!(tokio::time::timeout(Duration::from_secs(1), inner).await);

        let stats = manager.statistics();
        assert_eq!(stats.cancelled, 1);
        assert_eq!(stats.timed_out, 0);
        assert_eq!(stats.active, 0);
    }

    #[tokio::test]
    async fn test_complete_operation_is_idempotent() {
        let manager = manager();
        manager.create_context(health("hc-6")).unwrap();

        assert!(manager.complete_operation("hc-6").is_some());
        assert!(manager.complete_operation("hc-6").is_none());
        assert_eq!(manager.statistics().completed, 1);
    }

    #[tokio::test]
    async fn test_stale_scope_leaves_reused_id_alone() {
        let manager = manager();
        let old = manager.timeout_context(health("x")).unwrap();
        manager.complete_operation("x");
        manager.create_context(health("x")).unwrap();

        drop(old);

        let active = manager.active_operations();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].operation_id, "x");
        let stats = manager.statistics();
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.cancelled, 0);

        assert!(manager.complete_operation("x").is_some());
        assert_eq!(manager.statistics().completed, 2);
    }

    #[tokio::test]
    async fn test_duplicate_active_id_is_conflict() {
        let manager = manager();
        manager.create_context(health("dup")).unwrap();
        let err = manager.create_context(health("dup")).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        manager.complete_operation("dup");
        assert_ok!(manager.create_context(health("dup")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_timeout() {
        let manager = manager();
        assert!(matches!(
            manager.check_timeout("missing"),
            Err(AppError::NotFound(_))
        ));

        manager.create_context(health("hc-7")).unwrap();
        assert_ok!(manager.check_timeout("hc-7"));

        tokio::time::advance(Duration::from_secs(3)).await;
        let err = manager.check_timeout("hc-7").unwrap_err();
        assert!(err.as_timeout().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_expired_operations() {
        let manager = manager();
        manager.create_context(health("hc-8")).unwrap();
        manager
            .create_context(OperationSpec::new("llm-2", TimeoutType::LlmGeneration))
            .unwrap();

        tokio::time::advance(Duration::from_secs(10)).await;

        assert_eq!(manager.cleanup_expired_operations(), 1);
        assert_eq!(manager.cleanup_expired_operations(), 0);
        let active: Vec<String> = manager
            .active_operations()
            .into_iter()
            .map(|c| c.operation_id)
            .collect();
        assert_eq!(active, vec!["llm-2"]);
        assert_eq!(manager.statistics().timed_out, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scope_lifecycle() {
        let manager = manager();

        let scope = manager.timeout_context(health("s-1")).unwrap();
        assert_eq!(scope.remaining(), Some(Duration::from_secs(2)));
        sleep(Duration::from_millis(300)).await;
        assert!(scope.finish() >= Duration::from_millis(300));

        let mut scope = manager.timeout_context(health("s-2")).unwrap();
        tokio::time::advance(Duration::from_secs(3)).await;
        assert_err!(scope.check());
        drop(scope);

        {
            let _abandoned = manager.timeout_context(health("s-3")).unwrap();
        }

        let stats = manager.statistics();
        assert_eq!(stats.started, 3);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.timed_out, 1);
        assert_eq!(stats.cancelled, 1);
        assert_eq!(stats.active, 0);
    }

    #[tokio::test]
    async fn test_generate_operation_id() {
        let manager = manager();
        assert_eq!(manager.generate_operation_id("alloc"), "alloc-id-1");
        assert_eq!(manager.generate_operation_id("alloc"), "alloc-id-2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_removes_abandoned_contexts() {
        let manager = Arc::new(manager());
        let handle = manager.clone().spawn_sweeper(Duration::from_secs(30));

        manager.create_context(health("hc-9")).unwrap();
        sleep(Duration::from_secs(31)).await;

        assert!(manager.active_operations().is_empty());
        assert_eq!(manager.statistics().timed_out, 1);
        handle.abort();
    }
}
