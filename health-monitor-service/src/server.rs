//! # HTTP Server Module
//!
//! The thin read-only surface this crate exposes to the supervising HTTP
//! layer and admin tooling — everything in §6's "Control interface"
//! except `start_monitoring`/`stop_monitoring`, which the binary calls
//! directly on the [`MonitorSupervisor`] it owns. Grounded on the
//! teacher's `server::create_server`'s `AppState`/router-assembly
//! pattern, trimmed to the routes this spec actually needs: no auth, CORS,
//! plugin, or WebSocket-dashboard layers (those subsystems are out of
//! scope, §1).
//!
//! ## Routes
//!
//! - `GET /health` — process liveness, independent of monitoring state.
//! - `GET /health/system`, `GET /health/providers`, `GET /health/gateways`,
//!   `GET /health/models` — each reads one of the four published cache
//!   documents straight from the TTL store and returns it verbatim, the
//!   same bytes a downstream router would read (SPEC_FULL.md §6).
//! - `POST /admin/check/{provider}/{model}/{gateway}` —
//!   `check_model_on_demand` (§6): forces a single probe for that identity
//!   and returns the result.

use crate::config::Config;
use crate::error::ServiceError;
use crate::registry::ModelRegistry;
use crate::supervisor::MonitorSupervisor;
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use health_monitor_core::model::{ModelIdentity, MonitoringTier};
use health_monitor_core::store::SharedTtlStore;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub supervisor: Arc<MonitorSupervisor>,
    pub registry: ModelRegistry,
    pub cache: SharedTtlStore,
    pub api_keys: std::collections::HashMap<String, String>,
    pub started_at: Instant,
}

pub fn create_server(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/health/system", get(read_health_system))
        .route("/health/providers", get(read_health_providers))
        .route("/health/gateways", get(read_health_gateways))
        .route("/health/models", get(read_health_models))
        .route(
            "/admin/check/{provider}/{model}/{gateway}",
            post(check_on_demand),
        )
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(std::time::Duration::from_secs(30)))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "monitoring_active": state.supervisor.is_active(),
        "uptime_seconds": state.started_at.elapsed().as_secs(),
    }))
}

fn cache_key_for(document: &str) -> &'static str {
    match document {
        "system" => "health:system",
        "providers" => "health:providers",
        "models" => "health:models",
        "gateways" => "health:gateways",
        _ => unreachable!("cache_key_for is only called with the four literal document names"),
    }
}

/// Reads one of the four published cache documents verbatim — the exact
/// read contract described in §6, re-exposed over HTTP for anything that
/// cannot talk to the TTL store directly.
async fn read_cache_document(
    state: &AppState,
    document: &str,
) -> Result<impl IntoResponse, ServiceError> {
    let key = cache_key_for(document);

    let payload = state
        .cache
        .get(key)
        .await
        .map_err(|e| ServiceError::Coordination {
            message: e.to_string(),
        })?
        .ok_or_else(|| ServiceError::NotFound {
            provider: "-".to_string(),
            model: "-".to_string(),
            gateway: format!("cache document {document} not yet published"),
        })?;

    let value: serde_json::Value =
        serde_json::from_str(&payload).map_err(|e| ServiceError::Internal {
            message: format!("stored cache document is not valid JSON: {e}"),
        })?;
    Ok(Json(value))
}

async fn read_health_system(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    read_cache_document(&state, "system").await
}

async fn read_health_providers(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    read_cache_document(&state, "providers").await
}

async fn read_health_gateways(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    read_cache_document(&state, "gateways").await
}

async fn read_health_models(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    read_cache_document(&state, "models").await
}

#[derive(Debug, Deserialize, Default)]
struct OnDemandCheckQuery {
    tier: Option<String>,
}

fn parse_tier(tier: Option<&str>) -> MonitoringTier {
    match tier {
        Some("popular") => MonitoringTier::Popular,
        Some("standard") => MonitoringTier::Standard,
        Some("on_demand") => MonitoringTier::OnDemand,
        _ => MonitoringTier::Critical,
    }
}

/// `check_model_on_demand(provider, model, gateway)` (§6): forces one
/// probe outside the scheduled cadence and returns its result, used by
/// admin/debug endpoints.
async fn check_on_demand(
    State(state): State<AppState>,
    Path((provider, model, gateway)): Path<(String, String, String)>,
    Query(query): Query<OnDemandCheckQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let identity = ModelIdentity::new(provider, model, gateway);
    let tier = parse_tier(query.tier.as_deref());
    let api_key = state.api_keys.get(&identity.gateway).map(String::as_str);

    let result = state
        .supervisor
        .check_model_on_demand(&identity, tier, api_key)
        .await?;
    Ok(Json(result))
}

/// Builds the full `AppState` (Registry, TTL store, supervisor with its
/// four loops wired) from a loaded [`Config`], connecting to Postgres and
/// Redis. The binary's sole entry point into construction, grounded on
/// the teacher's `create_server` doing the same assembly for its own
/// provider clients.
pub async fn build_app_state(config: &Config, worker_id: impl Into<String>) -> anyhow::Result<AppState> {
    use crate::aggregator::Aggregator;
    use crate::alerting::{AlertEmitter, AlertSink, NoopAlertSink, SentryAlertSink};
    use crate::cache_publisher::CachePublisher;
    use crate::incident_resolver::IncidentResolver;
    use crate::lease::WorkerLease;
    use crate::probe::ProbeExecutor;
    use crate::result_processor::ResultProcessor;
    use crate::scheduler::Scheduler;
    use crate::tier_updater::TierUpdater;
    use crate::tracking_store::PgTrackingStore;
    use health_monitor_core::circuit_breaker::CircuitBreakerConfig;
    use health_monitor_core::store::{InMemoryTtlStore, RedisTtlStore};

    let tracking: crate::tracking_store::SharedTrackingStore =
        Arc::new(PgTrackingStore::connect(&config.store.database_url).await?);

    let ttl_store: SharedTtlStore = if config.redis_coordination {
        Arc::new(RedisTtlStore::new(&config.store.redis_url)?)
    } else {
        Arc::new(InMemoryTtlStore::new())
    };

    let registry = ModelRegistry::new(tracking.clone());
    let breaker_config = CircuitBreakerConfig {
        failure_threshold: config.failure_threshold,
        success_threshold: config.success_threshold,
    };

    let alert_sink: Box<dyn AlertSink> = if config.alert.sentry_dsn.is_some() {
        Box::new(SentryAlertSink)
    } else {
        Box::new(NoopAlertSink)
    };
    let alert_emitter = AlertEmitter::new(alert_sink, config.alert.health_alert_threshold_pct);

    let scheduler = Scheduler::new(
        registry.clone(),
        WorkerLease::new(ttl_store.clone(), worker_id),
        ProbeExecutor::new(reqwest::Client::new(), config.max_concurrent_checks),
        ResultProcessor::new(tracking.clone(), breaker_config),
        CachePublisher::new(
            registry.clone(),
            ttl_store.clone(),
            config.cache.ttl_seconds,
            config.cache.dashboard_ttl_seconds,
            config.cache.publish_dashboard_variant,
            config.cache.max_models_in_cache,
            config.catalog_size,
        ),
        alert_emitter,
        config.api_keys.clone(),
        config.batch_size,
    );

    let aggregator = Aggregator::new(registry.clone(), tracking.clone());
    let tier_updater = TierUpdater::new(tracking.clone());
    let incident_resolver = IncidentResolver::new(registry.clone(), tracking.clone());

    let supervisor = Arc::new(MonitorSupervisor::new(
        scheduler,
        aggregator,
        tier_updater,
        incident_resolver,
    ));

    Ok(AppState {
        supervisor,
        registry,
        cache: ttl_store,
        api_keys: config.api_keys.clone(),
        started_at: Instant::now(),
    })
}
