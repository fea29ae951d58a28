//! # Cache Documents
//!
//! The four JSON documents the Cache Publisher writes every cycle. Field
//! names match the read contract external routing and status consumers
//! rely on (§6) — they are serialized verbatim, not wrapped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Healthy,
    Degraded,
    Unhealthy,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemCacheDoc {
    pub overall_status: OverallStatus,
    pub total_providers: u64,
    pub healthy_providers: u64,
    pub degraded_providers: u64,
    pub unhealthy_providers: u64,
    pub total_models: u64,
    pub healthy_models: u64,
    pub unhealthy_models: u64,
    pub tracked_models: u64,
    pub total_gateways: u64,
    pub healthy_gateways: u64,
    pub system_uptime: f64,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderStatus {
    Online,
    Degraded,
    Offline,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderAggregate {
    pub provider: String,
    pub gateway: String,
    pub status: ProviderStatus,
    pub total_models: u64,
    pub healthy_models: u64,
    pub unhealthy_models: u64,
    pub avg_response_time_ms: f64,
    pub overall_uptime: f64,
    pub last_checked: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderCacheDoc {
    pub providers: Vec<ProviderAggregate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelHealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCacheEntry {
    pub model_id: String,
    pub provider: String,
    pub gateway: String,
    pub status: ModelHealthStatus,
    pub response_time_ms: Option<u64>,
    pub avg_response_time_ms: Option<f64>,
    pub uptime_percentage: f64,
    pub error_count: u64,
    pub total_requests: u64,
    pub last_checked: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCacheDoc {
    pub models: Vec<ModelCacheEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayStatus {
    Healthy,
    Offline,
    Degraded,
    Unconfigured,
    Pending,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayCacheEntry {
    pub healthy: bool,
    pub status: GatewayStatus,
    pub latency_ms: Option<u64>,
    pub available: bool,
    pub last_check: DateTime<Utc>,
    pub error: Option<String>,
    pub total_models: Option<u64>,
    pub configured: Option<bool>,
}

/// Keyed by gateway name, matching the flat `{<gateway_name>: {...}}` shape
/// in §6 rather than a `gateways: [...]` list like the other three.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayCacheDoc {
    #[serde(flatten)]
    pub gateways: std::collections::BTreeMap<String, GatewayCacheEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_doc_serializes_as_a_flat_map_keyed_by_gateway_name() {
        let mut gateways = std::collections::BTreeMap::new();
        gateways.insert(
            "openrouter".to_string(),
            GatewayCacheEntry {
                healthy: true,
                status: GatewayStatus::Healthy,
                latency_ms: Some(120),
                available: true,
                last_check: Utc::now(),
                error: None,
                total_models: Some(42),
                configured: Some(true),
            },
        );
        let doc = GatewayCacheDoc { gateways };
        let value = serde_json::to_value(&doc).unwrap();
        assert!(value.get("openrouter").is_some());
        assert!(value.get("gateways").is_none());
    }
}
