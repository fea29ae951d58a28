//! # Tier Updater (C8)
//!
//! The second of the Supervisor's four long-running loops (§4.11). Every
//! hour, invokes a single reclassification over the tracking store
//! (`TrackingStore::reclassify_tiers`). A store whose reclassification
//! routine is missing from its schema cache reports
//! `ServiceError::SchemaMissing`, which this loop treats as "skip this
//! cycle" rather than a failure worth propagating to the Supervisor.

use crate::error::ServiceError;
use crate::tracking_store::SharedTrackingStore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub struct TierUpdater {
    tracking: SharedTrackingStore,
}

impl TierUpdater {
    pub fn new(tracking: SharedTrackingStore) -> Self {
        Self { tracking }
    }

    /// One reclassification pass. Never returns an error: every outcome
    /// is logged and this loop moves on to its next hourly tick.
    pub async fn run_once(&self) {
        match self.tracking.reclassify_tiers().await {
            Ok(changed) => {
                if changed > 0 {
                    info!(changed, "tier updater reclassified models");
                }
            }
            Err(ServiceError::SchemaMissing { message }) => {
                warn!(message, "tier reclassification function unavailable, skipping this cycle");
            }
            Err(err) => {
                warn!(error = %err, "tier updater cycle failed");
            }
        }
    }
}

/// The Tier Updater's supervised loop: reclassifies every hour until
/// `cancel` fires.
pub async fn run_tier_update_loop(updater: TierUpdater, cancel: CancellationToken) {
    const INTERVAL: std::time::Duration = std::time::Duration::from_secs(60 * 60);
    loop {
        updater.run_once().await;
        tokio::select! {
            _ = tokio::time::sleep(INTERVAL) => {}
            _ = cancel.cancelled() => return,
        }
    }
}
