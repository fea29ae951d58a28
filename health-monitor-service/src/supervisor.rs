//! # Lifecycle Supervisor (C11)
//!
//! Starts and stops the four long-running loops named in §4.11:
//! `monitoring_loop` (Scheduler), `tier_update_loop` (Tier Updater),
//! `aggregate_metrics_loop` (Aggregator), `incident_resolution_loop`
//! (Incident Resolver). Grounded on `tokio_util::sync::CancellationToken`
//! usage for cooperative cancellation (the teacher has no multi-loop
//! supervisor of its own; this primitive is enriched in from the pack per
//! `DESIGN.md`'s `supervisor.rs` entry) plus `tokio::task::JoinHandle` for
//! awaiting each loop's completion on shutdown.
//!
//! Per §4.11/§7: a crash in one loop must not stop the others, and
//! joining errors are logged, never propagated. Each loop already treats
//! its own per-cycle failures as non-fatal (a failed registry read just
//! skips that cycle), so in practice a `JoinHandle` only resolves early on
//! a panic; this supervisor still awaits it exactly once on shutdown.

use crate::aggregator::{run_aggregate_metrics_loop, Aggregator};
use crate::incident_resolver::{run_incident_resolution_loop, IncidentResolver};
use crate::scheduler::{run_monitoring_loop, Scheduler};
use crate::tier_updater::{run_tier_update_loop, TierUpdater};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Owns the four supervised loops and the `monitoring_active` flag
/// exposed to the control interface (§6's `start_monitoring`/
/// `stop_monitoring`).
pub struct MonitorSupervisor {
    scheduler: Scheduler,
    aggregator: Aggregator,
    tier_updater: TierUpdater,
    incident_resolver: IncidentResolver,
    active: Arc<AtomicBool>,
    cancel: CancellationToken,
    handles: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl MonitorSupervisor {
    pub fn new(
        scheduler: Scheduler,
        aggregator: Aggregator,
        tier_updater: TierUpdater,
        incident_resolver: IncidentResolver,
    ) -> Self {
        Self {
            scheduler,
            aggregator,
            tier_updater,
            incident_resolver,
            active: Arc::new(AtomicBool::new(false)),
            cancel: CancellationToken::new(),
            handles: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Spawns the four loops as supervised tasks. A second call while
    /// already active is a no-op, matching the idempotent
    /// `start_monitoring()` control operation (§6).
    pub fn start_monitoring(self: &Arc<Self>) {
        if self.active.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("starting monitor supervisor: monitoring, tier-update, aggregate-metrics, incident-resolution loops");

        let mut handles = self.handles.lock().expect("supervisor handle lock poisoned");

        let scheduler = self.scheduler.clone();
        let cancel = self.cancel.clone();
        handles.push(tokio::spawn(async move {
            run_monitoring_loop(scheduler, cancel).await;
        }));

        let tier_updater = self.tier_updater.clone();
        let cancel = self.cancel.clone();
        handles.push(tokio::spawn(async move {
            run_tier_update_loop(tier_updater, cancel).await;
        }));

        let aggregator = self.aggregator.clone();
        let cancel = self.cancel.clone();
        handles.push(tokio::spawn(async move {
            run_aggregate_metrics_loop(aggregator, cancel).await;
        }));

        let incident_resolver = self.incident_resolver.clone();
        let cancel = self.cancel.clone();
        handles.push(tokio::spawn(async move {
            run_incident_resolution_loop(incident_resolver, cancel).await;
        }));
    }

    /// Flips `monitoring_active` false, cancels all four loops, and awaits
    /// their completion. Join errors (panics) are logged, not propagated
    /// (§4.11, §7's "A crash in one loop MUST NOT stop the others").
    pub async fn stop_monitoring(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }
        info!("stopping monitor supervisor");
        self.cancel.cancel();

        let handles: Vec<_> = {
            let mut guard = self.handles.lock().expect("supervisor handle lock poisoned");
            guard.drain(..).collect()
        };
        for handle in handles {
            if let Err(err) = handle.await {
                warn!(error = %err, "a supervised loop panicked during shutdown");
            }
        }
    }

    /// Forces a single on-demand probe outside the scheduled cadence,
    /// updates tracked state, and returns the result — the control
    /// interface's `check_model_on_demand` (§6).
    pub async fn check_model_on_demand(
        &self,
        identity: &health_monitor_core::model::ModelIdentity,
        tier: health_monitor_core::model::MonitoringTier,
        api_key: Option<&str>,
    ) -> Result<health_monitor_core::model::HealthCheckResult, health_monitor_core::MonitorError> {
        let result = self.scheduler.probe_once(identity, tier, api_key).await?;
        self.scheduler.process_result(result.clone()).await;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerting::{AlertEmitter, NoopAlertSink};
    use crate::cache_publisher::CachePublisher;
    use crate::lease::WorkerLease;
    use crate::probe::ProbeExecutor;
    use crate::registry::ModelRegistry;
    use crate::result_processor::ResultProcessor;
    use crate::tracking_store::InMemoryTrackingStore;
    use health_monitor_core::circuit_breaker::CircuitBreakerConfig;
    use health_monitor_core::store::InMemoryTtlStore;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    fn build_supervisor() -> Arc<MonitorSupervisor> {
        let tracking: crate::tracking_store::SharedTrackingStore = Arc::new(InMemoryTrackingStore::new());
        let ttl_store: health_monitor_core::store::SharedTtlStore = Arc::new(InMemoryTtlStore::new());

        let scheduler = Scheduler::new(
            ModelRegistry::new(tracking.clone()),
            WorkerLease::new(ttl_store.clone(), "worker-1"),
            ProbeExecutor::new(reqwest::Client::new(), 4),
            ResultProcessor::new(tracking.clone(), CircuitBreakerConfig::default()),
            CachePublisher::new(ModelRegistry::new(tracking.clone()), ttl_store, 360, 90, false, 500, 10_000),
            AlertEmitter::new(Box::new(NoopAlertSink), 90.0),
            HashMap::new(),
            10,
        );
        let aggregator = Aggregator::new(ModelRegistry::new(tracking.clone()), tracking.clone());
        let tier_updater = TierUpdater::new(tracking.clone());
        let incident_resolver = IncidentResolver::new(ModelRegistry::new(tracking.clone()), tracking);

        Arc::new(MonitorSupervisor::new(scheduler, aggregator, tier_updater, incident_resolver))
    }

    #[tokio::test]
    async fn start_is_idempotent_and_stop_joins_every_loop() {
        let supervisor = build_supervisor();
        supervisor.start_monitoring();
        assert!(supervisor.is_active());
        supervisor.start_monitoring();
        assert!(supervisor.is_active());

        tokio::time::sleep(Duration::from_millis(20)).await;
        supervisor.stop_monitoring().await;
        assert!(!supervisor.is_active());
    }

    #[tokio::test]
    async fn stop_before_start_is_a_harmless_no_op() {
        let supervisor = build_supervisor();
        supervisor.stop_monitoring().await;
        assert!(!supervisor.is_active());
    }
}
