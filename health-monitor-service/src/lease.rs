//! # Worker Lease
//!
//! Cross-process coordination (§4.4): before a candidate is probed, this
//! worker attempts an atomic "set if absent" on
//! `health_check_lock:{provider}:{model}:{gateway}` with its own
//! `worker_id` as the value and a 60s expiry — longer than the longest
//! per-tier probe timeout (§4.6's timeout table tops out at 60s), so a
//! lease can never lapse mid-probe. Only the worker that wins the race
//! retains the candidate. If the backing store is unreachable, every
//! candidate is retained instead (availability over exclusivity).
//!
//! Grounded on `core::store::TtlStore::set_if_absent`, the same atomic
//! primitive `store.rs`'s Redis backend exposes for exactly this use.

use health_monitor_core::model::ModelIdentity;
use health_monitor_core::store::SharedTtlStore;
use std::time::Duration;
use tracing::warn;

const LEASE_TTL: Duration = Duration::from_secs(60);

fn lease_key(identity: &ModelIdentity) -> String {
    format!("health_check_lock:{}", identity.key())
}

/// Filters a batch of candidates down to the ones this worker may probe.
#[derive(Clone)]
pub struct WorkerLease {
    store: SharedTtlStore,
    worker_id: String,
}

impl WorkerLease {
    pub fn new(store: SharedTtlStore, worker_id: impl Into<String>) -> Self {
        Self {
            store,
            worker_id: worker_id.into(),
        }
    }

    /// Attempts to acquire the lease for every candidate, retaining only
    /// the ones this worker won. On a store error the coordination store is
    /// considered down for the rest of this batch: a single warning is
    /// logged and every remaining candidate (including the one that hit
    /// the error) is retained without further lease attempts (§4.4, §7).
    pub async fn acquire<'a>(&self, candidates: Vec<&'a ModelIdentity>) -> Vec<&'a ModelIdentity> {
        let mut retained = Vec::with_capacity(candidates.len());
        let mut iter = candidates.into_iter();
        for identity in iter.by_ref() {
            match self
                .store
                .set_if_absent(&lease_key(identity), &self.worker_id, LEASE_TTL)
                .await
            {
                Ok(true) => retained.push(identity),
                Ok(false) => {}
                Err(err) => {
                    warn!(
                        error = %err,
                        "worker lease store unavailable, retaining all remaining candidates"
                    );
                    retained.push(identity);
                    break;
                }
            }
        }
        retained.extend(iter);
        retained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use health_monitor_core::store::InMemoryTtlStore;
    use std::sync::Arc;

    fn id(model: &str) -> ModelIdentity {
        ModelIdentity::new("openai", model, "openrouter")
    }

    #[tokio::test]
    async fn acquires_lease_for_every_uncontended_candidate() {
        let lease = WorkerLease::new(Arc::new(InMemoryTtlStore::new()), "worker-1");
        let a = id("gpt-4o-mini");
        let b = id("gpt-4o");
        let retained = lease.acquire(vec![&a, &b]).await;
        assert_eq!(retained.len(), 2);
    }

    #[tokio::test]
    async fn second_worker_loses_the_race_for_an_already_leased_identity() {
        let store: SharedTtlStore = Arc::new(InMemoryTtlStore::new());
        let first = WorkerLease::new(store.clone(), "worker-1");
        let second = WorkerLease::new(store, "worker-2");
        let target = id("gpt-4o-mini");

        let first_retained = first.acquire(vec![&target]).await;
        assert_eq!(first_retained.len(), 1);

        let second_retained = second.acquire(vec![&target]).await;
        assert!(second_retained.is_empty());
    }
}
