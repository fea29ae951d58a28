//! # Aggregator (C7)
//!
//! One of the Supervisor's four long-running loops (§4.11). Every 5
//! minutes, recomputes `uptime_percentage_{24h,7d,30d}` for every enabled
//! model from its History records, processing in batches of 50 with a
//! small inter-batch sleep — the same batching shape the Scheduler uses
//! for probes, reused here for a read-heavy full-table scan instead.

use crate::registry::ModelRegistry;
use crate::tracking_store::SharedTrackingStore;
use chrono::{DateTime, Duration, Utc};
use health_monitor_core::model::{HistoryRecord, TrackingRow};
use tokio_util::sync::CancellationToken;
use tracing::warn;

const BATCH_SIZE: usize = 50;
const INTER_BATCH_SLEEP_MS: u64 = 50;

/// Recomputes uptime rollups for every enabled tracking row.
pub struct Aggregator {
    registry: ModelRegistry,
    tracking: SharedTrackingStore,
}

impl Aggregator {
    pub fn new(registry: ModelRegistry, tracking: SharedTrackingStore) -> Self {
        Self { registry, tracking }
    }

    /// One full pass over every enabled model, in batches of 50.
    pub async fn run_once(&self) {
        let now = Utc::now();
        let mut offset = 0usize;
        loop {
            let batch = match self.registry.all_enabled(offset, BATCH_SIZE).await {
                Ok(rows) => rows,
                Err(err) => {
                    warn!(error = %err, "aggregator failed to read a batch, stopping this cycle");
                    return;
                }
            };
            if batch.is_empty() {
                break;
            }

            for row in &batch {
                self.recompute_one(row, now).await;
            }

            if batch.len() < BATCH_SIZE {
                break;
            }
            offset += BATCH_SIZE;
            tokio::time::sleep(std::time::Duration::from_millis(INTER_BATCH_SLEEP_MS)).await;
        }
    }

    async fn recompute_one(&self, row: &TrackingRow, now: DateTime<Utc>) {
        let windows = [
            (Duration::hours(24), "24h"),
            (Duration::days(7), "7d"),
            (Duration::days(30), "30d"),
        ];

        let mut uptime = [100.0_f64; 3];
        for (index, (window, label)) in windows.iter().enumerate() {
            match self
                .tracking
                .history_since(&row.identity, now - *window)
                .await
            {
                Ok(records) => uptime[index] = uptime_percentage(&records),
                Err(err) => {
                    warn!(
                        identity = %row.identity.key(),
                        window = label,
                        error = %err,
                        "failed to read history for uptime rollup, leaving it unchanged"
                    );
                    return;
                }
            }
        }

        let mut updated = row.clone();
        updated.uptime_percentage_24h = uptime[0];
        updated.uptime_percentage_7d = uptime[1];
        updated.uptime_percentage_30d = uptime[2];

        if let Err(err) = self.tracking.upsert_row(&updated).await {
            warn!(identity = %row.identity.key(), error = %err, "failed to persist uptime rollup");
        }
    }
}

fn uptime_percentage(records: &[HistoryRecord]) -> f64 {
    if records.is_empty() {
        return 100.0;
    }
    let successful = records.iter().filter(|r| r.status.is_success()).count();
    let raw = (successful as f64 / records.len() as f64) * 100.0;
    (raw * 100.0).round() / 100.0
}

/// The Aggregator's supervised loop: recomputes uptime every 5 minutes
/// until `cancel` fires.
pub async fn run_aggregate_metrics_loop(aggregator: Aggregator, cancel: CancellationToken) {
    const INTERVAL: std::time::Duration = std::time::Duration::from_secs(5 * 60);
    loop {
        aggregator.run_once().await;
        tokio::select! {
            _ = tokio::time::sleep(INTERVAL) => {}
            _ = cancel.cancelled() => return,
        }
    }
}
