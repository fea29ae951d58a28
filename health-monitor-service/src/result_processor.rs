//! # Result Processor (C6)
//!
//! The hardest single component (§4.6): given one [`HealthCheckResult`],
//! atomically updates the Tracking Row's counters and circuit breaker
//! state, appends a History Record, and opens/updates/resolves the
//! identity's Incident — all in one call. The two reads this needs
//! (current row, active incident) are retried with
//! [`retry_with_backoff`]; everything downstream of a failed read is
//! skipped rather than applied against stale data, per §4.6's "correctness
//! of the streak counters is preferred over partial updates".

use crate::error_handling::{result_processor_delays, retry_with_backoff};
use crate::tracking_store::SharedTrackingStore;
use chrono::Duration as ChronoDuration;
use health_monitor_core::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use health_monitor_core::model::{
    HealthCheckResult, HistoryRecord, Incident, IncidentSeverity, IncidentType, TrackingRow,
};
use tracing::{debug, warn};

#[derive(Clone)]
pub struct ResultProcessor {
    tracking: SharedTrackingStore,
    breaker_config: CircuitBreakerConfig,
}

impl ResultProcessor {
    pub fn new(tracking: SharedTrackingStore, breaker_config: CircuitBreakerConfig) -> Self {
        Self {
            tracking,
            breaker_config,
        }
    }

    /// Applies one probe result to persisted state. Never returns an
    /// error: every failure mode here is logged and swallowed so the
    /// Scheduler keeps draining its queue regardless of datastore health
    /// (§4.6 "Failure semantics").
    pub async fn process(&self, result: HealthCheckResult) {
        let identity = result.identity.clone();
        let is_success = result.status.is_success();
        let now = result.checked_at;

        let row = match retry_with_backoff(
            || self.tracking.get_row(&identity),
            &result_processor_delays(),
            |e| e.is_transient(),
            "result_processor_get_row",
        )
        .await
        {
            Ok(Some(row)) => row,
            Ok(None) => {
                debug!(identity = %identity.key(), "no tracking row for this identity, dropping result");
                return;
            }
            Err(err) => {
                debug!(identity = %identity.key(), error = %err, "failed to read tracking row, dropping result");
                return;
            }
        };

        let active_incident = match retry_with_backoff(
            || self.tracking.active_incident(&identity),
            &result_processor_delays(),
            |e| e.is_transient(),
            "result_processor_get_incident",
        )
        .await
        {
            Ok(incident) => incident,
            Err(err) => {
                debug!(identity = %identity.key(), error = %err, "failed to read active incident, dropping result");
                return;
            }
        };

        let updated = self.apply_counters(&row, &result, is_success, now);

        if let Err(err) = self.tracking.upsert_row(&updated).await {
            warn!(identity = %identity.key(), error = %err, "failed to persist tracking row, next probe keeps prior schedule");
            return;
        }

        let history = HistoryRecord {
            identity: identity.clone(),
            checked_at: now,
            status: result.status,
            response_time_ms: result.response_time_ms,
            error_message: result.error_message.clone(),
            http_status_code: result.http_status_code,
            circuit_breaker_state: updated.circuit_breaker_state,
        };
        if let Err(err) = self.tracking.append_history(&history).await {
            warn!(identity = %identity.key(), error = %err, "failed to append history record");
        }

        self.apply_incident(&identity, &result, &updated, active_incident, now).await;
    }

    /// Pure counter/schedule/breaker update, split out so it can be
    /// exercised without a store.
    fn apply_counters(
        &self,
        row: &TrackingRow,
        result: &HealthCheckResult,
        is_success: bool,
        now: chrono::DateTime<chrono::Utc>,
    ) -> TrackingRow {
        let mut updated = row.clone();
        updated.call_count += 1;

        if is_success {
            updated.success_count += 1;
            updated.consecutive_successes = row.consecutive_successes + 1;
            updated.consecutive_failures = 0;
            updated.last_success_at = Some(now);
        } else {
            updated.error_count += 1;
            updated.consecutive_failures = row.consecutive_failures + 1;
            updated.consecutive_successes = 0;
            updated.last_failure_at = Some(now);
        }

        updated.last_status = Some(result.status);
        updated.last_response_time_ms = result.response_time_ms;
        updated.last_error_message = result.error_message.clone();
        updated.http_status_code = result.http_status_code;
        updated.last_called_at = Some(now);

        // Running mean weighted by call_count; a null response_time_ms
        // (e.g. a timeout with no elapsed reading) preserves the prior mean.
        if let Some(response_time_ms) = result.response_time_ms {
            let n = updated.call_count as f64;
            updated.average_response_time_ms +=
                (response_time_ms as f64 - row.average_response_time_ms) / n;
        }

        updated.circuit_breaker_state = CircuitBreaker::apply(
            &row.identity.key(),
            row.circuit_breaker_state,
            is_success,
            updated.consecutive_failures,
            updated.consecutive_successes,
            &self.breaker_config,
        );

        let base_interval_secs = row.monitoring_tier.interval_seconds();
        let effective_interval_secs = if !is_success && updated.consecutive_failures > 1 {
            base_interval_secs.min(300)
        } else {
            base_interval_secs
        };
        updated.next_check_at = now + ChronoDuration::seconds(effective_interval_secs as i64);

        updated
    }

    async fn apply_incident(
        &self,
        identity: &health_monitor_core::model::ModelIdentity,
        result: &HealthCheckResult,
        updated: &TrackingRow,
        active_incident: Option<Incident>,
        now: chrono::DateTime<chrono::Utc>,
    ) {
        if result.status.is_success() {
            if updated.consecutive_successes >= self.breaker_config.success_threshold {
                if let Err(err) = self.tracking.resolve_active_incidents(identity, now).await {
                    warn!(identity = %identity.key(), error = %err, "failed to resolve incidents");
                }
            }
            return;
        }

        let severity = IncidentSeverity::from_consecutive_failures(updated.consecutive_failures);
        match active_incident {
            Some(mut incident) => {
                incident.error_count += 1;
                incident.error_message = result.error_message.clone();
                incident.severity = incident.severity.max(severity);
                if let Err(err) = self.tracking.upsert_incident(&incident).await {
                    warn!(identity = %identity.key(), error = %err, "failed to update incident");
                }
            }
            None => {
                let incident = Incident::open(
                    identity.clone(),
                    IncidentType::from_status(result.status),
                    severity,
                    result.error_message.clone(),
                    now,
                );
                if let Err(err) = self.tracking.upsert_incident(&incident).await {
                    warn!(identity = %identity.key(), error = %err, "failed to open incident");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking_store::{InMemoryTrackingStore, TrackingStore};
    use chrono::Utc;
    use health_monitor_core::circuit_breaker::CircuitState;
    use health_monitor_core::model::{HealthCheckStatus, ModelIdentity, MonitoringTier};
    use std::sync::Arc;

    fn id() -> ModelIdentity {
        ModelIdentity::new("openai", "gpt-4o-mini", "openrouter")
    }

    fn result(identity: ModelIdentity, status: HealthCheckStatus, response_time_ms: Option<u64>) -> HealthCheckResult {
        HealthCheckResult {
            identity,
            status,
            response_time_ms,
            error_message: None,
            http_status_code: Some(if status.is_success() { 200 } else { 500 }),
            checked_at: Utc::now(),
        }
    }

    async fn processor() -> (ResultProcessor, SharedTrackingStore) {
        let store: SharedTrackingStore = Arc::new(InMemoryTrackingStore::new());
        store
            .register(&id(), MonitoringTier::Critical, Utc::now())
            .await
            .unwrap();
        let processor = ResultProcessor::new(store.clone(), CircuitBreakerConfig::default());
        (processor, store)
    }

    #[tokio::test]
    async fn a_success_increments_counts_and_resets_the_failure_streak() {
        let (processor, store) = processor().await;
        let mut row = store.get_row(&id()).await.unwrap().unwrap();
        row.consecutive_failures = 3;
        store.upsert_row(&row).await.unwrap();

        processor
            .process(result(id(), HealthCheckStatus::Success, Some(120)))
            .await;

        let row = store.get_row(&id()).await.unwrap().unwrap();
        assert_eq!(row.call_count, 1);
        assert_eq!(row.success_count, 1);
        assert_eq!(row.consecutive_failures, 0);
        assert_eq!(row.consecutive_successes, 1);
        assert_eq!(row.average_response_time_ms, 120.0);
    }

    #[tokio::test]
    async fn eight_consecutive_failures_trip_the_breaker() {
        let (processor, store) = processor().await;
        for _ in 0..8 {
            processor
                .process(result(id(), HealthCheckStatus::Error, Some(50)))
                .await;
        }
        let row = store.get_row(&id()).await.unwrap().unwrap();
        assert_eq!(row.consecutive_failures, 8);
        assert_eq!(row.circuit_breaker_state, CircuitState::Open);
    }

    #[tokio::test]
    async fn a_failing_model_opens_an_incident_and_a_recovery_resolves_it() {
        let (processor, store) = processor().await;
        for _ in 0..5 {
            processor
                .process(result(id(), HealthCheckStatus::Error, Some(50)))
                .await;
        }
        let incident = store.active_incident(&id()).await.unwrap().unwrap();
        assert_eq!(incident.severity, IncidentSeverity::High);

        for _ in 0..3 {
            processor
                .process(result(id(), HealthCheckStatus::Success, Some(50)))
                .await;
        }
        assert!(store.active_incident(&id()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn a_failing_model_gets_a_shortened_next_check_interval() {
        let (processor, store) = processor().await;
        for _ in 0..2 {
            processor
                .process(result(id(), HealthCheckStatus::Error, Some(50)))
                .await;
        }
        let row = store.get_row(&id()).await.unwrap().unwrap();
        let interval = row.next_check_at - row.last_failure_at.unwrap();
        assert!(interval <= ChronoDuration::seconds(300));
    }

    #[tokio::test]
    async fn a_result_for_an_unregistered_identity_is_silently_dropped() {
        let store: SharedTrackingStore = Arc::new(InMemoryTrackingStore::new());
        let processor = ResultProcessor::new(store, CircuitBreakerConfig::default());
        let stray = ModelIdentity::new("anthropic", "claude-unregistered", "openrouter");
        processor
            .process(result(stray, HealthCheckStatus::Success, Some(10)))
            .await;
    }
}
