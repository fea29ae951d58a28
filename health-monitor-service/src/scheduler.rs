//! # Scheduler (C3)
//!
//! The first of the Supervisor's four long-running loops (§4.11), and the
//! one that drives the other per-probe components: Registry → Worker
//! Lease → Probe Executor → Result Processor → Cache Publisher, once per
//! iteration (§2's data flow, §4.3).

use crate::alerting::AlertEmitter;
use crate::cache_publisher::CachePublisher;
use crate::lease::WorkerLease;
use crate::probe::ProbeExecutor;
use crate::registry::ModelRegistry;
use crate::result_processor::ResultProcessor;
use health_monitor_core::MonitorError;
use std::collections::HashMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

const INTER_BATCH_SLEEP: Duration = Duration::from_secs(1);
const QUIET_SLEEP: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct Scheduler {
    registry: ModelRegistry,
    lease: WorkerLease,
    probe: ProbeExecutor,
    result_processor: ResultProcessor,
    cache_publisher: CachePublisher,
    alert_emitter: AlertEmitter,
    api_keys: HashMap<String, String>,
    batch_size: usize,
}

impl Scheduler {
    pub fn new(
        registry: ModelRegistry,
        lease: WorkerLease,
        probe: ProbeExecutor,
        result_processor: ResultProcessor,
        cache_publisher: CachePublisher,
        alert_emitter: AlertEmitter,
        api_keys: HashMap<String, String>,
        batch_size: usize,
    ) -> Self {
        Self {
            registry,
            lease,
            probe,
            result_processor,
            cache_publisher,
            alert_emitter,
            api_keys,
            batch_size,
        }
    }

    /// Publishes the cache documents and, on success, evaluates the
    /// freshly published system document against the alert threshold
    /// (§4.10's "After each successful cache publication").
    async fn publish_and_alert(&self) {
        if let Some(system) = self.cache_publisher.publish(&self.api_keys).await {
            self.alert_emitter.evaluate(&system).await;
        }
    }

    /// One scheduler iteration. Returns whether there was any candidate
    /// work, which the supervised loop uses to choose its next sleep
    /// (§4.3 step 5/6).
    pub async fn run_iteration(&self) -> bool {
        let candidates = match self.registry.due_for_checking(self.batch_size * 2).await {
            Ok(rows) => rows,
            Err(err) => {
                warn!(error = %err, "scheduler failed to query due candidates");
                self.publish_and_alert().await;
                return false;
            }
        };

        if candidates.is_empty() {
            self.publish_and_alert().await;
            return false;
        }

        let identities: Vec<_> = candidates.iter().map(|row| &row.identity).collect();
        let retained = self.lease.acquire(identities).await;

        let batch: Vec<_> = candidates
            .iter()
            .filter(|row| retained.iter().any(|id| *id == &row.identity))
            .take(self.batch_size)
            .collect();

        let probes = batch.iter().map(|row| {
            let api_key = self.api_keys.get(&row.identity.gateway).map(String::as_str);
            self.probe.execute(&row.identity, row.monitoring_tier, api_key)
        });
        let results = futures::future::join_all(probes).await;

        for result in results {
            match result {
                Ok(health_result) => self.result_processor.process(health_result).await,
                Err(MonitorError::Unconfigured { .. }) => {}
                Err(err) => warn!(error = %err, "probe execution failed before a result could be produced"),
            }
        }

        self.publish_and_alert().await;
        true
    }

    /// Issues a single probe outside the scheduled cadence, bypassing the
    /// worker lease entirely — an on-demand admin/debug check (§6's
    /// `check_model_on_demand`) is a deliberate one-off, not a candidate
    /// other workers need to coordinate around.
    pub async fn probe_once(
        &self,
        identity: &health_monitor_core::model::ModelIdentity,
        tier: health_monitor_core::model::MonitoringTier,
        api_key: Option<&str>,
    ) -> Result<health_monitor_core::model::HealthCheckResult, MonitorError> {
        self.probe.execute(identity, tier, api_key).await
    }

    /// Feeds a [`HealthCheckResult`](health_monitor_core::model::HealthCheckResult)
    /// straight to the Result Processor, independent of the scheduled
    /// batch flow. Used by [`probe_once`](Scheduler::probe_once)'s caller
    /// so an on-demand check updates tracked state the same way a
    /// scheduled one does.
    pub async fn process_result(&self, result: health_monitor_core::model::HealthCheckResult) {
        self.result_processor.process(result).await;
    }
}

/// The Scheduler's supervised loop. Drains the queue at a 1s inter-batch
/// pace while work is due, falling back to a 60s quiet sleep once it
/// isn't (§4.3).
pub async fn run_monitoring_loop(scheduler: Scheduler, cancel: CancellationToken) {
    loop {
        let had_candidates = tokio::select! {
            result = scheduler.run_iteration() => result,
            _ = cancel.cancelled() => return,
        };

        let sleep_for = if had_candidates { INTER_BATCH_SLEEP } else { QUIET_SLEEP };
        tokio::select! {
            _ = tokio::time::sleep(sleep_for) => {}
            _ = cancel.cancelled() => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerting::NoopAlertSink;
    use crate::tracking_store::{InMemoryTrackingStore, TrackingStore};
    use health_monitor_core::circuit_breaker::CircuitBreakerConfig;
    use health_monitor_core::model::{ModelIdentity, MonitoringTier};
    use health_monitor_core::store::InMemoryTtlStore;
    use reqwest::Client;
    use std::sync::Arc;

    fn test_alert_emitter() -> AlertEmitter {
        AlertEmitter::new(Box::new(NoopAlertSink), 90.0)
    }

    #[tokio::test]
    async fn an_empty_queue_still_publishes_the_cache_and_reports_no_candidates() {
        let tracking: crate::tracking_store::SharedTrackingStore = Arc::new(InMemoryTrackingStore::new());
        let ttl_store: health_monitor_core::store::SharedTtlStore = Arc::new(InMemoryTtlStore::new());

        let scheduler = Scheduler::new(
            ModelRegistry::new(tracking.clone()),
            WorkerLease::new(ttl_store.clone(), "worker-1"),
            ProbeExecutor::new(Client::new(), 4),
            ResultProcessor::new(tracking.clone(), CircuitBreakerConfig::default()),
            CachePublisher::new(ModelRegistry::new(tracking), ttl_store, 360, 90, false, 500, 10_000),
            test_alert_emitter(),
            HashMap::new(),
            10,
        );

        let had_candidates = scheduler.run_iteration().await;
        assert!(!had_candidates);
    }

    #[tokio::test]
    async fn an_unconfigured_gateway_candidate_is_skipped_without_crashing_the_iteration() {
        let tracking: crate::tracking_store::SharedTrackingStore = Arc::new(InMemoryTrackingStore::new());
        let identity = ModelIdentity::new("openai", "gpt-4o-mini", "openrouter");
        tracking
            .register(&identity, MonitoringTier::Critical, chrono::Utc::now())
            .await
            .unwrap();
        let ttl_store: health_monitor_core::store::SharedTtlStore = Arc::new(InMemoryTtlStore::new());

        let scheduler = Scheduler::new(
            ModelRegistry::new(tracking.clone()),
            WorkerLease::new(ttl_store.clone(), "worker-1"),
            ProbeExecutor::new(Client::new(), 4),
            ResultProcessor::new(tracking.clone(), CircuitBreakerConfig::default()),
            CachePublisher::new(ModelRegistry::new(tracking.clone()), ttl_store, 360, 90, false, 500, 10_000),
            test_alert_emitter(),
            HashMap::new(),
            10,
        );

        let had_candidates = scheduler.run_iteration().await;
        assert!(had_candidates);
        // No API key is configured, so the probe never got far enough to
        // update call_count.
        let row = tracking.get_row(&identity).await.unwrap().unwrap();
        assert_eq!(row.call_count, 0);
    }
}
