//! # Incident Resolution Loop
//!
//! The fourth of the Supervisor's four long-running loops (§4.11
//! names `incident_resolution_loop` but leaves its body to the Result
//! Processor's inline handling). This is the reconciliation safety net:
//! the Result Processor already resolves an identity's incidents inline
//! the moment its success streak reaches threshold (§4.6), but a crash or
//! a dropped write between the tracking-row upsert and the incident
//! resolve call can leave an incident active after its model has already
//! recovered. This loop finds and closes those stragglers on the same
//! 5-minute cadence as the Aggregator, since both are periodic
//! consistency sweeps over the same row set.

use crate::registry::ModelRegistry;
use crate::tracking_store::SharedTrackingStore;
use chrono::Utc;
use health_monitor_core::circuit_breaker::CircuitState;
use tokio_util::sync::CancellationToken;
use tracing::warn;

const BATCH_SIZE: usize = 50;
const INTER_BATCH_SLEEP_MS: u64 = 50;

pub struct IncidentResolver {
    registry: ModelRegistry,
    tracking: SharedTrackingStore,
}

impl IncidentResolver {
    pub fn new(registry: ModelRegistry, tracking: SharedTrackingStore) -> Self {
        Self { registry, tracking }
    }

    /// One reconciliation pass: for every enabled row whose breaker has
    /// closed, resolve any incident still marked active for that
    /// identity. A row still `open`/`half_open` is left alone — its
    /// incident (if any) is still genuinely active.
    pub async fn run_once(&self) {
        let now = Utc::now();
        let mut offset = 0usize;
        loop {
            let batch = match self.registry.all_enabled(offset, BATCH_SIZE).await {
                Ok(rows) => rows,
                Err(err) => {
                    warn!(error = %err, "incident resolver failed to read a batch, stopping this cycle");
                    return;
                }
            };
            if batch.is_empty() {
                break;
            }

            for row in &batch {
                if row.circuit_breaker_state != CircuitState::Closed {
                    continue;
                }
                match self.tracking.active_incident(&row.identity).await {
                    Ok(Some(_)) => {
                        if let Err(err) = self.tracking.resolve_active_incidents(&row.identity, now).await {
                            warn!(identity = %row.identity.key(), error = %err, "failed to reconcile stale incident");
                        }
                    }
                    Ok(None) => {}
                    Err(err) => {
                        warn!(identity = %row.identity.key(), error = %err, "failed to check for a stale incident");
                    }
                }
            }

            if batch.len() < BATCH_SIZE {
                break;
            }
            offset += BATCH_SIZE;
            tokio::time::sleep(std::time::Duration::from_millis(INTER_BATCH_SLEEP_MS)).await;
        }
    }
}

/// The incident resolution loop: reconciles every 5 minutes until
/// `cancel` fires.
pub async fn run_incident_resolution_loop(resolver: IncidentResolver, cancel: CancellationToken) {
    const INTERVAL: std::time::Duration = std::time::Duration::from_secs(5 * 60);
    loop {
        resolver.run_once().await;
        tokio::select! {
            _ = tokio::time::sleep(INTERVAL) => {}
            _ = cancel.cancelled() => return,
        }
    }
}
