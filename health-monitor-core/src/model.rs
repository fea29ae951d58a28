//! # Domain Model
//!
//! The per-identity records the health monitor reads and writes. A model's
//! identity is always the natural key `(provider, model, gateway)` — no
//! synthetic primary key is introduced, since the triple is already unique
//! and callers never need to address a row any other way.

use crate::circuit_breaker::CircuitState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A coarse priority class determining probe frequency and timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitoringTier {
    Critical,
    Popular,
    Standard,
    OnDemand,
}

impl MonitoringTier {
    /// Base check interval for this tier, before the failing-model
    /// shortening rule in §4.3/§4.6 is applied.
    pub fn interval_seconds(self) -> u64 {
        match self {
            MonitoringTier::Critical => 300,
            MonitoringTier::Popular => 1_800,
            MonitoringTier::Standard => 7_200,
            MonitoringTier::OnDemand => 14_400,
        }
    }

    /// Probe timeout for this tier.
    pub fn timeout_seconds(self) -> u64 {
        match self {
            MonitoringTier::Critical => 30,
            MonitoringTier::Popular => 45,
            MonitoringTier::Standard => 60,
            MonitoringTier::OnDemand => 60,
        }
    }

    /// `max_tokens` for the minimal chat probe, kept small to bound cost.
    pub fn max_tokens(self) -> u32 {
        match self {
            MonitoringTier::Critical => 5,
            MonitoringTier::Popular => 5,
            MonitoringTier::Standard => 10,
            MonitoringTier::OnDemand => 10,
        }
    }
}

/// The classified outcome of a single probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthCheckStatus {
    Success,
    RateLimited,
    Unauthorized,
    NotFound,
    Error,
    Timeout,
}

impl HealthCheckStatus {
    pub fn is_success(self) -> bool {
        matches!(self, HealthCheckStatus::Success)
    }
}

/// One open record per identity while a sustained failure is ongoing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentType {
    Outage,
    Timeout,
    RateLimit,
    Authentication,
    Unavailable,
    Unknown,
}

impl IncidentType {
    /// Maps a probe's classified status onto the incident type opened for
    /// it, per §4.6's `incident_type = map(status)`.
    pub fn from_status(status: HealthCheckStatus) -> Self {
        match status {
            HealthCheckStatus::Success => IncidentType::Unknown,
            HealthCheckStatus::RateLimited => IncidentType::RateLimit,
            HealthCheckStatus::Unauthorized => IncidentType::Authentication,
            HealthCheckStatus::NotFound => IncidentType::Unavailable,
            HealthCheckStatus::Error => IncidentType::Outage,
            HealthCheckStatus::Timeout => IncidentType::Timeout,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl IncidentSeverity {
    /// `severity = f(consecutive_failures)`: 1-2 low, 3-4 medium, 5-9
    /// high, 10+ critical. A monotonic non-decreasing function of the
    /// streak, per §3's invariant.
    pub fn from_consecutive_failures(consecutive_failures: u32) -> Self {
        match consecutive_failures {
            0..=2 => IncidentSeverity::Low,
            3..=4 => IncidentSeverity::Medium,
            5..=9 => IncidentSeverity::High,
            _ => IncidentSeverity::Critical,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    Active,
    Resolved,
}

/// The natural composite key shared by every per-identity record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelIdentity {
    pub provider: String,
    pub model: String,
    pub gateway: String,
}

impl ModelIdentity {
    pub fn new(
        provider: impl Into<String>,
        model: impl Into<String>,
        gateway: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            gateway: gateway.into(),
        }
    }

    /// The worker-lease / cache key fragment, `{provider}:{model}:{gateway}`.
    pub fn key(&self) -> String {
        format!("{}:{}:{}", self.provider, self.model, self.gateway)
    }
}

/// One row per enabled `(provider, model, gateway)` triple.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingRow {
    pub identity: ModelIdentity,

    pub monitoring_tier: MonitoringTier,
    pub priority_score: f64,

    pub next_check_at: DateTime<Utc>,
    pub last_called_at: Option<DateTime<Utc>>,

    pub call_count: u64,
    pub success_count: u64,
    pub error_count: u64,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,

    pub last_status: Option<HealthCheckStatus>,
    pub last_response_time_ms: Option<u64>,
    pub last_error_message: Option<String>,
    pub http_status_code: Option<u16>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,

    pub average_response_time_ms: f64,
    pub circuit_breaker_state: CircuitState,

    pub uptime_percentage_24h: f64,
    pub uptime_percentage_7d: f64,
    pub uptime_percentage_30d: f64,

    pub is_enabled: bool,
}

impl TrackingRow {
    /// A freshly registered row: zeroed counters, CLOSED breaker, 100%
    /// uptime until the first aggregation, due immediately.
    pub fn new(identity: ModelIdentity, monitoring_tier: MonitoringTier, now: DateTime<Utc>) -> Self {
        Self {
            identity,
            monitoring_tier,
            priority_score: 0.0,
            next_check_at: now,
            last_called_at: None,
            call_count: 0,
            success_count: 0,
            error_count: 0,
            consecutive_failures: 0,
            consecutive_successes: 0,
            last_status: None,
            last_response_time_ms: None,
            last_error_message: None,
            http_status_code: None,
            last_success_at: None,
            last_failure_at: None,
            average_response_time_ms: 0.0,
            circuit_breaker_state: CircuitState::Closed,
            uptime_percentage_24h: 100.0,
            uptime_percentage_7d: 100.0,
            uptime_percentage_30d: 100.0,
            is_enabled: true,
        }
    }
}

/// Append-only probe record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub identity: ModelIdentity,
    pub checked_at: DateTime<Utc>,
    pub status: HealthCheckStatus,
    pub response_time_ms: Option<u64>,
    pub error_message: Option<String>,
    pub http_status_code: Option<u16>,
    pub circuit_breaker_state: CircuitState,
}

/// A sustained-failure record for a single identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    pub identity: ModelIdentity,
    pub incident_type: IncidentType,
    pub severity: IncidentSeverity,
    pub status: IncidentStatus,
    pub started_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub error_count: u64,
    pub error_message: Option<String>,
    pub resolution_notes: Option<String>,
}

impl Incident {
    pub fn open(
        identity: ModelIdentity,
        incident_type: IncidentType,
        severity: IncidentSeverity,
        error_message: Option<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            identity,
            incident_type,
            severity,
            status: IncidentStatus::Active,
            started_at,
            resolved_at: None,
            error_count: 1,
            error_message,
            resolution_notes: None,
        }
    }

    pub fn resolve(&mut self, resolved_at: DateTime<Utc>) {
        self.status = IncidentStatus::Resolved;
        self.resolved_at = Some(resolved_at);
        self.resolution_notes = Some("Model recovered and passed health checks".to_string());
    }
}

/// The in-memory output of a single probe. Produced by the Probe Executor,
/// consumed once by the Result Processor, then discarded. Also returned
/// directly as the body of an on-demand check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub identity: ModelIdentity,
    pub status: HealthCheckStatus,
    pub response_time_ms: Option<u64>,
    pub error_message: Option<String>,
    pub http_status_code: Option<u16>,
    pub checked_at: DateTime<Utc>,
}
