//! # Alert Emitter (C10)
//!
//! After each successful cache publication, evaluates aggregate health
//! against `health_alert_threshold_pct` and emits a structured event to
//! the configured sink when it drops below threshold (§4.10). The sink is
//! an `AlertSink` trait so tests and a Sentry-less run use a no-op
//! implementation instead of the real `sentry` crate, which this crate
//! otherwise depends on for the single production sink (per the pack's
//! only dependency precedent for error-monitoring integration, the
//! `sentry` entry in `ktheindifferent-AtlasDNS`'s `Cargo.toml`).

use async_trait::async_trait;
use health_monitor_core::cache_doc::SystemCacheDoc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLevel {
    Warning,
    Error,
    Critical,
}

impl AlertLevel {
    fn from_health_pct(health_pct: f64) -> Self {
        if health_pct < 85.0 {
            AlertLevel::Critical
        } else if health_pct < 88.0 {
            AlertLevel::Error
        } else {
            AlertLevel::Warning
        }
    }
}

/// A structured degraded-health event (§4.10, §6's "Alert sink" output).
#[derive(Debug, Clone)]
pub struct AlertEvent {
    pub level: AlertLevel,
    pub message: String,
    pub health_percentage: f64,
    pub healthy_models: u64,
    pub unhealthy_models: u64,
    pub total_models: u64,
    pub system_uptime: f64,
    pub threshold: f64,
}

/// Destination for alert events. `sentry` is the only production
/// implementation; tests and Sentry-less deployments use [`NoopAlertSink`].
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn emit(&self, event: &AlertEvent);
}

/// Forwards events to Sentry as a message-level capture with structured
/// extras and tags, matching the rest of this crate's `tracing`-first,
/// Sentry-for-alerts-only split (§4.10's "structured alert event").
pub struct SentryAlertSink;

#[async_trait]
impl AlertSink for SentryAlertSink {
    async fn emit(&self, event: &AlertEvent) {
        let sentry_level = match event.level {
            AlertLevel::Warning => sentry::Level::Warning,
            AlertLevel::Error => sentry::Level::Error,
            AlertLevel::Critical => sentry::Level::Fatal,
        };

        sentry::with_scope(
            |scope| {
                scope.set_tag("alert_source", "health_monitor");
                scope.set_tag("alert_level", format!("{:?}", event.level));
                scope.set_extra("health_percentage", event.health_percentage.into());
                scope.set_extra("healthy_models", event.healthy_models.into());
                scope.set_extra("unhealthy_models", event.unhealthy_models.into());
                scope.set_extra("total_models", event.total_models.into());
                scope.set_extra("system_uptime", event.system_uptime.into());
                scope.set_extra("threshold", event.threshold.into());
            },
            || {
                sentry::capture_message(&event.message, sentry_level);
            },
        );
    }
}

/// Logs alert events through `tracing` instead of forwarding them
/// anywhere, for deployments with no `sentry_dsn` configured.
pub struct NoopAlertSink;

#[async_trait]
impl AlertSink for NoopAlertSink {
    async fn emit(&self, event: &AlertEvent) {
        let level = event.level;
        warn!(
            ?level,
            health_percentage = event.health_percentage,
            "health alert (no sentry_dsn configured, logging only)"
        );
    }
}

/// Evaluates a published system document against threshold and emits
/// through the configured sink.
pub struct AlertEmitter {
    sink: Box<dyn AlertSink>,
    threshold_pct: f64,
}

impl AlertEmitter {
    pub fn new(sink: Box<dyn AlertSink>, threshold_pct: f64) -> Self {
        Self { sink, threshold_pct }
    }

    /// Computes `health_pct = healthy_models / total_models × 100` (§4.10),
    /// guarding the zero-catalog case, and emits an event if it is below
    /// threshold.
    pub async fn evaluate(&self, system: &SystemCacheDoc) {
        if system.total_models == 0 {
            return;
        }
        let health_pct = (system.healthy_models as f64 / system.total_models as f64) * 100.0;
        if health_pct >= self.threshold_pct {
            return;
        }

        let event = AlertEvent {
            level: AlertLevel::from_health_pct(health_pct),
            message: format!(
                "model health at {health_pct:.1}%, below the {:.1}% threshold",
                self.threshold_pct
            ),
            health_percentage: health_pct,
            healthy_models: system.healthy_models,
            unhealthy_models: system.unhealthy_models,
            total_models: system.total_models,
            system_uptime: system.system_uptime,
            threshold: self.threshold_pct,
        };

        info!(health_pct, threshold = self.threshold_pct, "emitting health alert");
        self.sink.emit(&event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use health_monitor_core::cache_doc::OverallStatus;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct RecordingSink {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AlertSink for Arc<RecordingSink> {
        async fn emit(&self, _event: &AlertEvent) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn doc(healthy: u64, total: u64) -> SystemCacheDoc {
        SystemCacheDoc {
            overall_status: OverallStatus::Degraded,
            total_providers: 1,
            healthy_providers: 1,
            degraded_providers: 0,
            unhealthy_providers: 0,
            total_models: total,
            healthy_models: healthy,
            unhealthy_models: total - healthy,
            tracked_models: total,
            total_gateways: 1,
            healthy_gateways: 1,
            system_uptime: 95.0,
            last_updated: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn no_alert_when_health_is_above_threshold() {
        let sink = Arc::new(RecordingSink::default());
        let emitter = AlertEmitter::new(Box::new(sink.clone()), 90.0);
        emitter.evaluate(&doc(95, 100)).await;
        assert_eq!(sink.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn alerts_below_threshold() {
        let sink = Arc::new(RecordingSink::default());
        let emitter = AlertEmitter::new(Box::new(sink.clone()), 90.0);
        emitter.evaluate(&doc(80, 100)).await;
        assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn severity_bands_match_the_spec_table() {
        assert_eq!(AlertLevel::from_health_pct(89.0), AlertLevel::Warning);
        assert_eq!(AlertLevel::from_health_pct(86.0), AlertLevel::Error);
        assert_eq!(AlertLevel::from_health_pct(80.0), AlertLevel::Critical);
    }

    #[tokio::test]
    async fn zero_total_models_never_alerts() {
        let sink = Arc::new(RecordingSink::default());
        let emitter = AlertEmitter::new(Box::new(sink.clone()), 90.0);
        emitter.evaluate(&doc(0, 0)).await;
        assert_eq!(sink.calls.load(Ordering::SeqCst), 0);
    }
}
