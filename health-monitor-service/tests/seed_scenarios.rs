//! Integration coverage for the cross-module seed scenarios: these drive
//! the Result Processor, Worker Lease, and Cache Publisher together
//! through their public APIs rather than in isolated unit tests, the way
//! the teacher's `tests/gateway/` integration suite exercised its server
//! across module boundaries.

use health_monitor_core::circuit_breaker::{CircuitBreakerConfig, CircuitState};
use health_monitor_core::model::{HealthCheckResult, HealthCheckStatus, IncidentSeverity, IncidentType, ModelIdentity, MonitoringTier};
use health_monitor_core::store::InMemoryTtlStore;
use health_monitor_service::lease::WorkerLease;
use health_monitor_service::result_processor::ResultProcessor;
use health_monitor_service::tracking_store::{InMemoryTrackingStore, TrackingStore};
use std::sync::Arc;

fn identity() -> ModelIdentity {
    ModelIdentity::new("openai", "gpt-4o-mini", "openrouter")
}

fn rate_limited_result(identity: ModelIdentity) -> HealthCheckResult {
    HealthCheckResult {
        identity,
        status: HealthCheckStatus::RateLimited,
        response_time_ms: Some(80),
        error_message: Some("429 rate limited".to_string()),
        http_status_code: Some(429),
        checked_at: chrono::Utc::now(),
    }
}

/// Seed scenario 2: 20 consecutive `rate_limited` results trip the
/// breaker at exactly the 8th, with `incident_type = rate_limit` and
/// `severity = high`, and the breaker does not somehow stay CLOSED for
/// the remaining 12.
#[tokio::test]
async fn rate_limited_results_trip_the_breaker_at_exactly_the_eighth() {
    let tracking: Arc<InMemoryTrackingStore> = Arc::new(InMemoryTrackingStore::new());
    tracking
        .register(&identity(), MonitoringTier::Critical, chrono::Utc::now())
        .await
        .unwrap();
    let processor = ResultProcessor::new(tracking.clone(), CircuitBreakerConfig::default());

    for n in 1..=20 {
        processor.process(rate_limited_result(identity())).await;
        let row = tracking.get_row(&identity()).await.unwrap().unwrap();
        if n < 8 {
            assert_eq!(row.circuit_breaker_state, CircuitState::Closed, "tripped early at result {n}");
        } else if n == 8 {
            assert_eq!(row.circuit_breaker_state, CircuitState::Open);
            let incident = tracking.active_incident(&identity()).await.unwrap().unwrap();
            assert_eq!(incident.incident_type, IncidentType::RateLimit);
            assert_eq!(incident.severity, IncidentSeverity::High);
        }
    }

    let row = tracking.get_row(&identity()).await.unwrap().unwrap();
    assert_eq!(row.consecutive_failures, 20);
    assert_eq!(row.error_count, 20);
    assert_eq!(row.success_count, 0);
}

/// Seed scenario 5: two competing workers racing for the same candidate
/// through a shared lease store. Exactly one wins, and its result still
/// reaches the tracking store as a single probe's worth of state.
#[tokio::test]
async fn exactly_one_worker_wins_a_lease_race_and_its_result_is_applied_once() {
    let ttl_store: Arc<InMemoryTtlStore> = Arc::new(InMemoryTtlStore::new());
    let tracking: Arc<InMemoryTrackingStore> = Arc::new(InMemoryTrackingStore::new());
    tracking
        .register(&identity(), MonitoringTier::Critical, chrono::Utc::now())
        .await
        .unwrap();

    let lease_a = WorkerLease::new(ttl_store.clone(), "worker-a");
    let lease_b = WorkerLease::new(ttl_store, "worker-b");
    let target = identity();

    let retained_a = lease_a.acquire(vec![&target]).await;
    let retained_b = lease_b.acquire(vec![&target]).await;
    assert_eq!(retained_a.len() + retained_b.len(), 1);

    let processor = ResultProcessor::new(tracking.clone(), CircuitBreakerConfig::default());
    let winner_result = HealthCheckResult {
        identity: target.clone(),
        status: HealthCheckStatus::Success,
        response_time_ms: Some(50),
        error_message: None,
        http_status_code: Some(200),
        checked_at: chrono::Utc::now(),
    };
    processor.process(winner_result).await;

    let row = tracking.get_row(&target).await.unwrap().unwrap();
    assert_eq!(row.call_count, 1);
}
