//! # Health Monitor Core
//!
//! Domain types and pure logic shared by the health monitor service: the
//! circuit breaker state machine, the per-identity tracking model, the
//! published cache documents, the gateway adapter trait, and the TTL store
//! abstraction backing both the worker lease and cache publication.
//!
//! This crate performs no scheduling, no background tasks, and (outside of
//! `store::RedisTtlStore`) no I/O — it is the vocabulary the service crate
//! builds its components from.
//!
//! ## Overview
//!
//! - **Circuit Breaker**: event-counted per-model failure tracking
//! - **Domain Model**: tracking rows, history records, incidents
//! - **Cache Documents**: the four JSON documents published for external
//!   consumers
//! - **Gateway Adapter**: per-gateway probe construction and response
//!   classification, with no network calls of its own
//! - **TTL Store**: the shared primitive behind the worker lease and cache
//!   publication, with Redis and in-memory backends
//!
//! ## Quick Start
//!
//! ```rust
//! use health_monitor_core::circuit_breaker::{transition, CircuitBreakerConfig, CircuitState};
//!
//! let config = CircuitBreakerConfig::default();
//! let next = transition(CircuitState::Closed, false, 8, 0, &config);
//! assert_eq!(next, CircuitState::Open);
//! ```
//!
//! ## Gateway Adapters
//!
//! ```rust
//! use health_monitor_core::gateway::create_gateway_adapter;
//! use health_monitor_core::model::MonitoringTier;
//!
//! let adapter = create_gateway_adapter("groq").unwrap();
//! let probe = adapter
//!     .build_probe("llama-3.1-8b-instant", MonitoringTier::Critical, Some("sk-test"))
//!     .unwrap();
//! assert!(probe.endpoint.ends_with("/chat/completions"));
//! ```
//!
//! ## TTL Store
//!
//! ```rust
//! use health_monitor_core::store::{InMemoryTtlStore, TtlStore};
//! use std::time::Duration;
//!
//! # async fn example() {
//! let store = InMemoryTtlStore::new();
//! let acquired = store
//!     .set_if_absent("health_check_lock:openai:gpt-4o:openrouter", "worker-1", Duration::from_secs(60))
//!     .await
//!     .unwrap();
//! assert!(acquired);
//! # }
//! ```
//!
//! ## Incidents
//!
//! ```rust
//! use health_monitor_core::model::{Incident, IncidentSeverity, IncidentType, ModelIdentity};
//! use chrono::Utc;
//!
//! let mut incident = Incident::open(
//!     ModelIdentity::new("openai", "gpt-4o-mini", "openrouter"),
//!     IncidentType::Outage,
//!     IncidentSeverity::High,
//!     Some("persistent: upstream returned HTTP 500".to_string()),
//!     Utc::now(),
//! );
//! incident.resolve(Utc::now());
//! ```
//!
//! ## Contributing
//!
//! We welcome contributions! Please see our contributing guide for details on:
//!
//! - Code style and formatting
//! - Testing requirements
//! - Documentation standards
//! - Pull request process
//!
//! ## License
//!
//! This project is licensed under the MIT License - see the [LICENSE](LICENSE) file for details.

pub mod cache_doc;
pub mod circuit_breaker;
pub mod error;
pub mod gateway;
pub mod model;
pub mod store;

pub use cache_doc::{
    GatewayCacheDoc, GatewayCacheEntry, GatewayStatus, ModelCacheDoc, ModelCacheEntry,
    ModelHealthStatus, OverallStatus, ProviderAggregate, ProviderCacheDoc, ProviderStatus,
    SystemCacheDoc,
};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use error::MonitorError;
pub use gateway::{create_gateway_adapter, classify, GatewayAdapter, ProbeOutcome, ProbeRequest};
pub use model::{
    HealthCheckResult, HealthCheckStatus, HistoryRecord, Incident, IncidentSeverity,
    IncidentStatus, IncidentType, ModelIdentity, MonitoringTier, TrackingRow,
};
pub use store::{InMemoryTtlStore, RedisTtlStore, SharedTtlStore, StoreError, TtlStore};

/// Result type for domain crate operations.
///
/// This is a convenience type alias for operations that can fail with a
/// [`MonitorError`].
pub type Result<T> = std::result::Result<T, MonitorError>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn tracking_row_and_incident_share_the_same_identity() {
        let identity = ModelIdentity::new("openai", "gpt-4o-mini", "openrouter");
        let row = TrackingRow::new(identity.clone(), MonitoringTier::Critical, Utc::now());
        let incident = Incident::open(
            identity.clone(),
            IncidentType::Outage,
            IncidentSeverity::High,
            Some("persistent: upstream returned HTTP 500".to_string()),
            Utc::now(),
        );
        assert_eq!(row.identity, incident.identity);
    }

    #[test]
    fn gateway_adapter_factory_resolves_known_names_and_rejects_unknown() {
        assert!(create_gateway_adapter("groq").is_some());
        assert!(create_gateway_adapter("not-a-real-gateway").is_none());
    }

    #[test]
    fn classify_re_exported_from_the_crate_root() {
        assert_eq!(
            classify(&ProbeOutcome::HttpStatus(200)).0,
            HealthCheckStatus::Success
        );
    }
}
