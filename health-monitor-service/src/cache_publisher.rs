//! # Cache Publisher (C9)
//!
//! Runs at the end of every Scheduler iteration, including quiet sleeps
//! (§4.3, §4.9), so the four published documents never go stale even when
//! nothing was due to be checked. Generalized from the teacher's
//! `gateway_caching::CacheManager`: same TTL-keyed write pattern, but over
//! `core::store::TtlStore` instead of the teacher's request/response
//! cache, and writing four fixed documents rather than one keyed by
//! request hash.

use crate::error_handling::{cache_publisher_delays, retry_with_backoff};
use crate::registry::ModelRegistry;
use chrono::{DateTime, Utc};
use health_monitor_core::cache_doc::{
    GatewayCacheDoc, GatewayCacheEntry, GatewayStatus, ModelCacheDoc, ModelCacheEntry,
    ModelHealthStatus, OverallStatus, ProviderAggregate, ProviderCacheDoc, ProviderStatus,
    SystemCacheDoc,
};
use health_monitor_core::circuit_breaker::CircuitState;
use health_monitor_core::model::TrackingRow;
use health_monitor_core::store::{SharedTtlStore, TtlStore};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::warn;

const KNOWN_GATEWAYS: [&str; 5] = ["openrouter", "fireworks", "groq", "together", "cerebras"];

const KEY_SYSTEM: &str = "health:system";
const KEY_PROVIDERS: &str = "health:providers";
const KEY_MODELS: &str = "health:models";
const KEY_GATEWAYS: &str = "health:gateways";
const KEY_DASHBOARD: &str = "health:dashboard";

const FULL_SCAN_BATCH_SIZE: usize = 200;

/// Builds and publishes the four read-contract cache documents (§6).
#[derive(Clone)]
pub struct CachePublisher {
    registry: ModelRegistry,
    cache: SharedTtlStore,
    ttl: Duration,
    dashboard_ttl: Duration,
    publish_dashboard_variant: bool,
    max_models_in_cache: usize,
    catalog_size: u64,
}

impl CachePublisher {
    pub fn new(
        registry: ModelRegistry,
        cache: SharedTtlStore,
        ttl_seconds: u64,
        dashboard_ttl_seconds: u64,
        publish_dashboard_variant: bool,
        max_models_in_cache: usize,
        catalog_size: usize,
    ) -> Self {
        Self {
            registry,
            cache,
            ttl: Duration::from_secs(ttl_seconds),
            dashboard_ttl: Duration::from_secs(dashboard_ttl_seconds),
            publish_dashboard_variant,
            max_models_in_cache,
            catalog_size: catalog_size as u64,
        }
    }

    /// Builds all four documents from the current tracking state and
    /// writes each with a retry-then-drop policy: a document that still
    /// fails to write after retries is logged and dropped, left for the
    /// next cycle to overwrite (§4.9).
    pub async fn publish(&self, api_keys: &std::collections::HashMap<String, String>) -> Option<SystemCacheDoc> {
        let rows = match self.collect_all_rows().await {
            Ok(rows) => rows,
            Err(err) => {
                warn!(error = %err, "cache publisher failed to read tracking rows, skipping this cycle");
                return None;
            }
        };

        let now = Utc::now();
        let providers = build_provider_doc(&rows, now);
        let gateways = build_gateway_doc(&rows, api_keys, now);
        let system = build_system_doc(&rows, &providers, &gateways, self.catalog_size, now);
        let models = build_model_doc(&rows, self.max_models_in_cache);

        self.write(KEY_SYSTEM, &system, self.ttl).await;
        self.write(KEY_PROVIDERS, &providers, self.ttl).await;
        self.write(KEY_MODELS, &models, self.ttl).await;
        self.write(KEY_GATEWAYS, &gateways, self.ttl).await;
        if self.publish_dashboard_variant {
            self.write(KEY_DASHBOARD, &system, self.dashboard_ttl).await;
        }

        Some(system)
    }

    async fn collect_all_rows(&self) -> Result<Vec<TrackingRow>, crate::error::ServiceError> {
        let mut rows = Vec::new();
        let mut offset = 0usize;
        loop {
            let batch = self.registry.all_enabled(offset, FULL_SCAN_BATCH_SIZE).await?;
            let fetched = batch.len();
            rows.extend(batch);
            if fetched < FULL_SCAN_BATCH_SIZE {
                break;
            }
            offset += FULL_SCAN_BATCH_SIZE;
        }
        Ok(rows)
    }

    async fn write<T: Serialize>(&self, key: &str, doc: &T, ttl: Duration) {
        let payload = match serde_json::to_string(doc) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(key, error = %err, "failed to serialize cache document, dropping");
                return;
            }
        };

        let result = retry_with_backoff(
            || self.cache.set(key, &payload, ttl),
            &cache_publisher_delays(),
            |_| true,
            "cache_publish",
        )
        .await;

        if let Err(err) = result {
            warn!(key, error = %err, "failed to write cache document after retries, dropping");
        }
    }
}

fn model_is_healthy(row: &TrackingRow) -> bool {
    !matches!(row.circuit_breaker_state, CircuitState::Open)
}

fn build_model_doc(rows: &[TrackingRow], max_models: usize) -> ModelCacheDoc {
    let mut probed: Vec<&TrackingRow> = rows.iter().filter(|r| r.last_called_at.is_some()).collect();
    probed.sort_by(|a, b| b.last_called_at.cmp(&a.last_called_at));
    let models = probed
        .into_iter()
        .take(max_models)
        .map(|row| ModelCacheEntry {
            model_id: row.identity.model.clone(),
            provider: row.identity.provider.clone(),
            gateway: row.identity.gateway.clone(),
            status: if model_is_healthy(row) {
                ModelHealthStatus::Healthy
            } else {
                ModelHealthStatus::Unhealthy
            },
            response_time_ms: row.last_response_time_ms,
            avg_response_time_ms: Some(row.average_response_time_ms),
            uptime_percentage: row.uptime_percentage_24h,
            error_count: row.error_count,
            total_requests: row.call_count,
            last_checked: row.last_called_at.unwrap_or(row.next_check_at),
        })
        .collect();
    ModelCacheDoc { models }
}

fn build_provider_doc(rows: &[TrackingRow], now: DateTime<Utc>) -> ProviderCacheDoc {
    let mut groups: BTreeMap<(String, String), Vec<&TrackingRow>> = BTreeMap::new();
    for row in rows {
        groups
            .entry((row.identity.provider.clone(), row.identity.gateway.clone()))
            .or_default()
            .push(row);
    }

    let providers = groups
        .into_iter()
        .map(|((provider, gateway), group)| {
            let probed: Vec<&&TrackingRow> = group.iter().filter(|r| r.last_called_at.is_some()).collect();
            let healthy_models = probed.iter().filter(|r| model_is_healthy(r)).count() as u64;
            let unhealthy_models = probed.len() as u64 - healthy_models;

            let status = if healthy_models >= 1 {
                ProviderStatus::Online
            } else if !probed.is_empty() && unhealthy_models as f64 / probed.len() as f64 > 0.5 {
                ProviderStatus::Offline
            } else {
                ProviderStatus::Degraded
            };

            let avg_response_time_ms = if probed.is_empty() {
                0.0
            } else {
                probed.iter().map(|r| r.average_response_time_ms).sum::<f64>() / probed.len() as f64
            };
            let overall_uptime = if probed.is_empty() {
                100.0
            } else {
                probed.iter().map(|r| r.uptime_percentage_24h).sum::<f64>() / probed.len() as f64
            };
            let last_checked = group
                .iter()
                .filter_map(|r| r.last_called_at)
                .max()
                .unwrap_or(now);

            ProviderAggregate {
                provider,
                gateway,
                status,
                total_models: group.len() as u64,
                healthy_models,
                unhealthy_models,
                avg_response_time_ms,
                overall_uptime,
                last_checked,
            }
        })
        .collect();

    ProviderCacheDoc { providers }
}

fn build_gateway_doc(
    rows: &[TrackingRow],
    api_keys: &std::collections::HashMap<String, String>,
    now: DateTime<Utc>,
) -> GatewayCacheDoc {
    let mut gateways = BTreeMap::new();

    for name in KNOWN_GATEWAYS {
        let gateway_rows: Vec<&TrackingRow> = rows.iter().filter(|r| r.identity.gateway == name).collect();
        let configured = api_keys.contains_key(name);
        let total_models = Some(gateway_rows.len() as u64);

        let entry = if !configured {
            GatewayCacheEntry {
                healthy: false,
                status: GatewayStatus::Unconfigured,
                latency_ms: None,
                available: false,
                last_check: now,
                error: Some(format!("{}_API_KEY is not set", name.to_uppercase())),
                total_models,
                configured: Some(false),
            }
        } else {
            let probed: Vec<&&TrackingRow> =
                gateway_rows.iter().filter(|r| r.last_called_at.is_some()).collect();
            if probed.is_empty() {
                GatewayCacheEntry {
                    healthy: false,
                    status: GatewayStatus::Pending,
                    latency_ms: None,
                    available: true,
                    last_check: now,
                    error: None,
                    total_models,
                    configured: Some(true),
                }
            } else {
                let healthy_count = probed.iter().filter(|r| model_is_healthy(r)).count();
                let latency_ms = (probed
                    .iter()
                    .map(|r| r.average_response_time_ms)
                    .sum::<f64>()
                    / probed.len() as f64) as u64;
                let last_check = probed.iter().filter_map(|r| r.last_called_at).max().unwrap_or(now);
                GatewayCacheEntry {
                    healthy: healthy_count > 0,
                    status: if healthy_count > 0 {
                        GatewayStatus::Healthy
                    } else {
                        GatewayStatus::Offline
                    },
                    latency_ms: Some(latency_ms),
                    available: true,
                    last_check,
                    error: None,
                    total_models,
                    configured: Some(true),
                }
            }
        };
        gateways.insert(name.to_string(), entry);
    }

    GatewayCacheDoc { gateways }
}

fn build_system_doc(
    rows: &[TrackingRow],
    providers: &ProviderCacheDoc,
    gateways: &GatewayCacheDoc,
    catalog_size: u64,
    now: DateTime<Utc>,
) -> SystemCacheDoc {
    let total_providers = providers.providers.len() as u64;
    let healthy_providers = providers
        .providers
        .iter()
        .filter(|p| p.status == ProviderStatus::Online)
        .count() as u64;
    let degraded_providers = providers
        .providers
        .iter()
        .filter(|p| p.status == ProviderStatus::Degraded)
        .count() as u64;
    let unhealthy_providers = providers
        .providers
        .iter()
        .filter(|p| p.status == ProviderStatus::Offline)
        .count() as u64;

    let tracked_models = rows.len() as u64;
    let probed: Vec<&TrackingRow> = rows.iter().filter(|r| r.last_called_at.is_some()).collect();
    let tracked_healthy = probed.iter().filter(|r| model_is_healthy(r)).count() as u64;
    let tracked_unhealthy = probed.len() as u64 - tracked_healthy;

    // Untracked catalog models are reported neither healthy nor unhealthy
    // (§4.9, §3 cache invariant).
    let healthy_models = tracked_healthy.min(catalog_size);
    let unhealthy_models = tracked_unhealthy.min(catalog_size.saturating_sub(healthy_models));

    let total_gateways = gateways.gateways.len() as u64;
    let healthy_gateways = gateways
        .gateways
        .values()
        .filter(|g| g.status == GatewayStatus::Healthy)
        .count() as u64;

    let overall_status = if probed.is_empty() {
        OverallStatus::Unknown
    } else if total_providers > 0 && unhealthy_providers as f64 / total_providers as f64 >= 0.5 {
        OverallStatus::Unhealthy
    } else if unhealthy_providers > 0 || degraded_providers > 0 || tracked_unhealthy > 0 {
        OverallStatus::Degraded
    } else {
        OverallStatus::Healthy
    };

    let system_uptime = if probed.is_empty() {
        100.0
    } else {
        probed.iter().map(|r| r.uptime_percentage_24h).sum::<f64>() / probed.len() as f64
    };

    SystemCacheDoc {
        overall_status,
        total_providers,
        healthy_providers,
        degraded_providers,
        unhealthy_providers,
        total_models: catalog_size,
        healthy_models,
        unhealthy_models,
        tracked_models,
        total_gateways,
        healthy_gateways,
        system_uptime,
        last_updated: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking_store::{InMemoryTrackingStore, TrackingStore};
    use health_monitor_core::model::{ModelIdentity, MonitoringTier};
    use health_monitor_core::store::InMemoryTtlStore;
    use std::sync::Arc;

    async fn store_with_one_healthy_model() -> std::sync::Arc<InMemoryTrackingStore> {
        let store = Arc::new(InMemoryTrackingStore::new());
        let identity = ModelIdentity::new("openai", "gpt-4o-mini", "openrouter");
        let now = Utc::now();
        store.register(&identity, MonitoringTier::Critical, now).await.unwrap();
        let mut row = store.get_row(&identity).await.unwrap().unwrap();
        row.last_called_at = Some(now);
        row.circuit_breaker_state = CircuitState::Closed;
        store.upsert_row(&row).await.unwrap();
        store
    }

    #[tokio::test]
    async fn publishes_all_four_documents_and_returns_the_system_doc() {
        let tracking = store_with_one_healthy_model().await;
        let cache: SharedTtlStore = Arc::new(InMemoryTtlStore::new());
        let mut api_keys = std::collections::HashMap::new();
        api_keys.insert("openrouter".to_string(), "sk-test".to_string());

        let publisher = CachePublisher::new(
            ModelRegistry::new(tracking),
            cache.clone(),
            360,
            90,
            false,
            500,
            10_000,
        );
        let system = publisher.publish(&api_keys).await.unwrap();
        assert_eq!(system.tracked_models, 1);
        assert_eq!(system.healthy_models, 1);
        assert_eq!(system.overall_status, OverallStatus::Healthy);

        assert!(cache.get(KEY_SYSTEM).await.unwrap().is_some());
        assert!(cache.get(KEY_GATEWAYS).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn quiet_load_still_publishes_all_four_documents_with_fresh_timestamps() {
        let tracking = Arc::new(InMemoryTrackingStore::new());
        let cache: SharedTtlStore = Arc::new(InMemoryTtlStore::new());
        let publisher = CachePublisher::new(
            ModelRegistry::new(tracking),
            cache.clone(),
            360,
            90,
            false,
            500,
            10_000,
        );

        // No models registered at all: the emptiest possible "nothing due"
        // cycle. Publish must still run and write all four keys.
        let before = Utc::now();
        let system = publisher.publish(&std::collections::HashMap::new()).await.unwrap();
        assert!(system.last_updated >= before);
        assert!((Utc::now() - system.last_updated).num_seconds() < 360);

        for key in [KEY_SYSTEM, KEY_PROVIDERS, KEY_MODELS, KEY_GATEWAYS] {
            assert!(cache.get(key).await.unwrap().is_some(), "{key} was not published");
        }
    }

    #[tokio::test]
    async fn no_checked_models_reports_unknown_overall_status() {
        let tracking = Arc::new(InMemoryTrackingStore::new());
        tracking
            .register(
                &ModelIdentity::new("openai", "gpt-4o-mini", "openrouter"),
                MonitoringTier::Critical,
                Utc::now(),
            )
            .await
            .unwrap();
        let cache: SharedTtlStore = Arc::new(InMemoryTtlStore::new());
        let publisher = CachePublisher::new(
            ModelRegistry::new(tracking),
            cache,
            360,
            90,
            false,
            500,
            10_000,
        );
        let system = publisher.publish(&std::collections::HashMap::new()).await.unwrap();
        assert_eq!(system.overall_status, OverallStatus::Unknown);
    }

    #[tokio::test]
    async fn an_unconfigured_gateway_reports_unconfigured_status() {
        let tracking = Arc::new(InMemoryTrackingStore::new());
        let cache: SharedTtlStore = Arc::new(InMemoryTtlStore::new());
        let publisher = CachePublisher::new(
            ModelRegistry::new(tracking),
            cache,
            360,
            90,
            false,
            500,
            10_000,
        );
        let system = publisher.publish(&std::collections::HashMap::new()).await;
        assert!(system.is_some());

        let raw = cache.get(KEY_GATEWAYS).await.unwrap().unwrap();
        let doc: GatewayCacheDoc = serde_json::from_str(&raw).unwrap();
        let openrouter = &doc.gateways["openrouter"];
        assert_eq!(openrouter.status, GatewayStatus::Unconfigured);
        assert!(!openrouter.configured.unwrap());
        assert!(!openrouter.healthy);
        assert!(!openrouter.available);
        assert!(openrouter.error.as_ref().unwrap().contains("API_KEY"));
    }
}
