//! # Model Registry
//!
//! The read-only surface over [`TrackingStore`](crate::tracking_store::TrackingStore)
//! the Scheduler, Tier Updater, and HTTP layer use to find work: "models
//! due for checking" and "all enabled tracked models" (§4.2). Holds no
//! state of its own — every query is delegated straight through.

use crate::error::ServiceError;
use crate::tracking_store::SharedTrackingStore;
use chrono::Utc;
use health_monitor_core::model::TrackingRow;

/// Read-only accessor over the tracking store's enabled rows.
#[derive(Clone)]
pub struct ModelRegistry {
    store: SharedTrackingStore,
}

impl ModelRegistry {
    pub fn new(store: SharedTrackingStore) -> Self {
        Self { store }
    }

    /// Enabled rows with `next_check_at` in the past, most overdue and
    /// highest-priority first, capped at `limit`. The Scheduler's sole
    /// source of batch work (§4.3).
    pub async fn due_for_checking(&self, limit: usize) -> Result<Vec<TrackingRow>, ServiceError> {
        self.store.due_for_checking(Utc::now(), limit).await
    }

    /// Every enabled tracked row, paginated. Used by the Aggregator and
    /// Tier Updater's full-scan cycles (§4.7, §4.8).
    pub async fn all_enabled(&self, offset: usize, limit: usize) -> Result<Vec<TrackingRow>, ServiceError> {
        self.store.all_enabled(offset, limit).await
    }

    pub async fn count_enabled(&self) -> Result<usize, ServiceError> {
        self.store.count_enabled().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking_store::InMemoryTrackingStore;
    use health_monitor_core::model::{ModelIdentity, MonitoringTier};
    use std::sync::Arc;

    #[tokio::test]
    async fn due_for_checking_only_returns_overdue_enabled_rows() {
        let store: SharedTrackingStore = Arc::new(InMemoryTrackingStore::new());
        let now = Utc::now();
        let overdue = ModelIdentity::new("openai", "gpt-4o-mini", "openrouter");
        let not_due = ModelIdentity::new("meta-llama", "llama-3.1-70b", "groq");

        store
            .register(&overdue, MonitoringTier::Critical, now - chrono::Duration::seconds(10))
            .await
            .unwrap();
        let mut future_row = store.get_row(&not_due).await.unwrap();
        assert!(future_row.is_none());
        store
            .register(&not_due, MonitoringTier::Standard, now)
            .await
            .unwrap();
        let mut row = store.get_row(&not_due).await.unwrap().unwrap();
        row.next_check_at = now + chrono::Duration::hours(1);
        store.upsert_row(&row).await.unwrap();
        future_row = Some(row);
        let _ = future_row;

        let registry = ModelRegistry::new(store);
        let due = registry.due_for_checking(10).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].identity, overdue);
    }

    #[tokio::test]
    async fn all_enabled_paginates() {
        let store: SharedTrackingStore = Arc::new(InMemoryTrackingStore::new());
        let now = Utc::now();
        for i in 0..5 {
            let id = ModelIdentity::new("openai", format!("model-{i}"), "openrouter");
            store.register(&id, MonitoringTier::Standard, now).await.unwrap();
        }
        let registry = ModelRegistry::new(store);
        let page = registry.all_enabled(2, 2).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(registry.count_enabled().await.unwrap(), 5);
    }
}
