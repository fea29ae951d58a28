//! # Tracking Store
//!
//! Backs the abstract "row-oriented table store with upserts and range
//! queries" spec §1 assigns to an external collaborator. A `TrackingStore`
//! trait models the three tables spec §6 names
//! (`model_health_tracking`, `model_health_history`,
//! `model_health_incidents`); `PgTrackingStore` implements it over
//! `sqlx::PgPool`, grounded on the `sqlx` Postgres usage pattern other pack
//! repositories reach for when a real row store is needed. `InMemoryTrackingStore`
//! (a `dashmap`-backed map, matching the teacher's own `dashmap` dependency)
//! backs unit and integration tests so they run without a live Postgres.

use crate::error::ServiceError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use health_monitor_core::model::{
    HistoryRecord, Incident, IncidentStatus, ModelIdentity, MonitoringTier, TrackingRow,
};
use sqlx::PgPool;
use std::sync::Arc;

/// Row-oriented persistence for tracking rows, history records, and
/// incidents. Every operation maps to one of the three tables spec §6
/// names.
#[async_trait]
pub trait TrackingStore: Send + Sync {
    /// Registers a new identity at its initial tier if it is not already
    /// tracked. A no-op if the identity already has a row.
    async fn register(
        &self,
        identity: &ModelIdentity,
        tier: MonitoringTier,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError>;

    async fn get_row(&self, identity: &ModelIdentity) -> Result<Option<TrackingRow>, ServiceError>;

    /// Upserts the full tracking row (§4.6's Result Processor is the sole
    /// writer outside `register`/the Aggregator/Tier Updater).
    async fn upsert_row(&self, row: &TrackingRow) -> Result<(), ServiceError>;

    /// "models due for checking" (§4.2): enabled rows with
    /// `next_check_at <= now`, ordered by `(priority_score DESC,
    /// next_check_at ASC)`, capped at `limit`.
    async fn due_for_checking(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<TrackingRow>, ServiceError>;

    /// "all enabled tracked models" (§4.2), paginated for the Aggregator's
    /// and Tier Updater's batch scans.
    async fn all_enabled(&self, offset: usize, limit: usize) -> Result<Vec<TrackingRow>, ServiceError>;

    async fn count_enabled(&self) -> Result<usize, ServiceError>;

    async fn append_history(&self, record: &HistoryRecord) -> Result<(), ServiceError>;

    /// History records for `identity` at or after `since`, used by the
    /// Aggregator's 24h/7d/30d uptime windows.
    async fn history_since(
        &self,
        identity: &ModelIdentity,
        since: DateTime<Utc>,
    ) -> Result<Vec<HistoryRecord>, ServiceError>;

    async fn active_incident(&self, identity: &ModelIdentity) -> Result<Option<Incident>, ServiceError>;

    async fn upsert_incident(&self, incident: &Incident) -> Result<(), ServiceError>;

    /// Resolves every active incident for `identity` (§4.6: "resolve all
    /// active incidents for the identity"). In practice at most one is
    /// ever active (§3 invariant), but the operation is expressed over
    /// "all" to match the spec's wording exactly.
    async fn resolve_active_incidents(
        &self,
        identity: &ModelIdentity,
        resolved_at: DateTime<Utc>,
    ) -> Result<(), ServiceError>;

    /// Re-assigns `monitoring_tier` for every enabled row based on the
    /// observed `call_count` ranking (§4.8): top 5% -> critical, next 20%
    /// -> popular, remainder -> standard. Rows already tiered `on_demand`
    /// are left untouched ("explicit on_demand models are preserved").
    /// Returns the number of rows whose tier changed.
    ///
    /// A store whose reclassification routine is missing from its schema
    /// cache returns `ServiceError::SchemaMissing` instead of failing; the
    /// Tier Updater treats that as "skip this cycle", not an error worth
    /// retrying or alerting on.
    async fn reclassify_tiers(&self) -> Result<usize, ServiceError>;
}

/// In-memory backing for tests and for a store-less demo run. Mirrors the
/// teacher's `dashmap`-backed caching pattern.
#[derive(Default)]
pub struct InMemoryTrackingStore {
    rows: DashMap<ModelIdentity, TrackingRow>,
    history: DashMap<ModelIdentity, Vec<HistoryRecord>>,
    incidents: DashMap<ModelIdentity, Vec<Incident>>,
}

impl InMemoryTrackingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TrackingStore for InMemoryTrackingStore {
    async fn register(
        &self,
        identity: &ModelIdentity,
        tier: MonitoringTier,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        self.rows
            .entry(identity.clone())
            .or_insert_with(|| TrackingRow::new(identity.clone(), tier, now));
        Ok(())
    }

    async fn get_row(&self, identity: &ModelIdentity) -> Result<Option<TrackingRow>, ServiceError> {
        Ok(self.rows.get(identity).map(|r| r.clone()))
    }

    async fn upsert_row(&self, row: &TrackingRow) -> Result<(), ServiceError> {
        self.rows.insert(row.identity.clone(), row.clone());
        Ok(())
    }

    async fn due_for_checking(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<TrackingRow>, ServiceError> {
        let mut due: Vec<TrackingRow> = self
            .rows
            .iter()
            .filter(|r| r.is_enabled && r.next_check_at <= now)
            .map(|r| r.clone())
            .collect();
        due.sort_by(|a, b| {
            b.priority_score
                .partial_cmp(&a.priority_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.next_check_at.cmp(&b.next_check_at))
        });
        due.truncate(limit);
        Ok(due)
    }

    async fn all_enabled(&self, offset: usize, limit: usize) -> Result<Vec<TrackingRow>, ServiceError> {
        let mut rows: Vec<TrackingRow> = self
            .rows
            .iter()
            .filter(|r| r.is_enabled)
            .map(|r| r.clone())
            .collect();
        rows.sort_by(|a, b| a.identity.key().cmp(&b.identity.key()));
        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }

    async fn count_enabled(&self) -> Result<usize, ServiceError> {
        Ok(self.rows.iter().filter(|r| r.is_enabled).count())
    }

    async fn append_history(&self, record: &HistoryRecord) -> Result<(), ServiceError> {
        self.history
            .entry(record.identity.clone())
            .or_default()
            .push(record.clone());
        Ok(())
    }

    async fn history_since(
        &self,
        identity: &ModelIdentity,
        since: DateTime<Utc>,
    ) -> Result<Vec<HistoryRecord>, ServiceError> {
        Ok(self
            .history
            .get(identity)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| r.checked_at >= since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn active_incident(&self, identity: &ModelIdentity) -> Result<Option<Incident>, ServiceError> {
        Ok(self.incidents.get(identity).and_then(|incidents| {
            incidents
                .iter()
                .find(|i| i.status == IncidentStatus::Active)
                .cloned()
        }))
    }

    async fn upsert_incident(&self, incident: &Incident) -> Result<(), ServiceError> {
        let mut incidents = self.incidents.entry(incident.identity.clone()).or_default();
        if let Some(existing) = incidents
            .iter_mut()
            .find(|i| i.status == IncidentStatus::Active && incident.status == IncidentStatus::Active)
        {
            *existing = incident.clone();
        } else {
            incidents.push(incident.clone());
        }
        Ok(())
    }

    async fn resolve_active_incidents(
        &self,
        identity: &ModelIdentity,
        resolved_at: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        if let Some(mut incidents) = self.incidents.get_mut(identity) {
            for incident in incidents.iter_mut() {
                if incident.status == IncidentStatus::Active {
                    incident.resolve(resolved_at);
                }
            }
        }
        Ok(())
    }

    async fn reclassify_tiers(&self) -> Result<usize, ServiceError> {
        let mut ranked: Vec<(ModelIdentity, u64)> = self
            .rows
            .iter()
            .filter(|r| r.is_enabled && r.monitoring_tier != MonitoringTier::OnDemand)
            .map(|r| (r.identity.clone(), r.call_count))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));

        let n = ranked.len();
        let critical_cutoff = (n as f64 * 0.05).ceil() as usize;
        let popular_cutoff = critical_cutoff + (n as f64 * 0.20).ceil() as usize;

        let mut changed = 0;
        for (index, (identity, _)) in ranked.into_iter().enumerate() {
            let new_tier = if index < critical_cutoff {
                MonitoringTier::Critical
            } else if index < popular_cutoff {
                MonitoringTier::Popular
            } else {
                MonitoringTier::Standard
            };
            if let Some(mut row) = self.rows.get_mut(&identity) {
                if row.monitoring_tier != new_tier {
                    row.monitoring_tier = new_tier;
                    changed += 1;
                }
            }
        }
        Ok(changed)
    }
}

/// Postgres-backed production store. Enum fields round-trip through their
/// existing `serde` derives as JSON-quoted text (e.g. `"success"`) rather
/// than introducing separate Postgres enum types, so the column set stays
/// a straightforward mirror of the domain model.
pub struct PgTrackingStore {
    pool: PgPool,
}

impl PgTrackingStore {
    pub async fn connect(database_url: &str) -> Result<Self, ServiceError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| ServiceError::Store {
                message: format!("failed to connect: {e}"),
            })?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    fn map_sqlx(e: sqlx::Error) -> ServiceError {
        ServiceError::Store {
            message: e.to_string(),
        }
    }
}

fn enc<T: serde::Serialize>(value: &T) -> Result<String, ServiceError> {
    serde_json::to_string(value).map_err(|e| ServiceError::Store {
        message: format!("encode failure: {e}"),
    })
}

fn dec<T: serde::de::DeserializeOwned>(value: &str) -> Result<T, ServiceError> {
    serde_json::from_str(value).map_err(|e| ServiceError::Store {
        message: format!("decode failure: {e}"),
    })
}

#[async_trait]
impl TrackingStore for PgTrackingStore {
    async fn register(
        &self,
        identity: &ModelIdentity,
        tier: MonitoringTier,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        if self.get_row(identity).await?.is_some() {
            return Ok(());
        }
        let row = TrackingRow::new(identity.clone(), tier, now);
        self.upsert_row(&row).await
    }

    async fn get_row(&self, identity: &ModelIdentity) -> Result<Option<TrackingRow>, ServiceError> {
        let record = sqlx::query(
            r#"SELECT provider, model, gateway, monitoring_tier, priority_score,
                      next_check_at, last_called_at, call_count, success_count, error_count,
                      consecutive_failures, consecutive_successes, last_status,
                      last_response_time_ms, last_error_message, http_status_code,
                      last_success_at, last_failure_at, average_response_time_ms,
                      circuit_breaker_state, uptime_percentage_24h, uptime_percentage_7d,
                      uptime_percentage_30d, is_enabled
               FROM model_health_tracking
               WHERE provider = $1 AND model = $2 AND gateway = $3"#,
        )
        .bind(&identity.provider)
        .bind(&identity.model)
        .bind(&identity.gateway)
        .fetch_optional(&self.pool)
        .await
        .map_err(Self::map_sqlx)?;

        let Some(row) = record else { return Ok(None) };
        row_to_tracking_row(row).map(Some)
    }

    async fn upsert_row(&self, row: &TrackingRow) -> Result<(), ServiceError> {
        sqlx::query(
            r#"INSERT INTO model_health_tracking
                 (provider, model, gateway, monitoring_tier, priority_score, next_check_at,
                  last_called_at, call_count, success_count, error_count, consecutive_failures,
                  consecutive_successes, last_status, last_response_time_ms, last_error_message,
                  http_status_code, last_success_at, last_failure_at, average_response_time_ms,
                  circuit_breaker_state, uptime_percentage_24h, uptime_percentage_7d,
                  uptime_percentage_30d, is_enabled)
               VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19,$20,$21,$22,$23,$24)
               ON CONFLICT (provider, model, gateway) DO UPDATE SET
                 monitoring_tier = EXCLUDED.monitoring_tier,
                 priority_score = EXCLUDED.priority_score,
                 next_check_at = EXCLUDED.next_check_at,
                 last_called_at = EXCLUDED.last_called_at,
                 call_count = EXCLUDED.call_count,
                 success_count = EXCLUDED.success_count,
                 error_count = EXCLUDED.error_count,
                 consecutive_failures = EXCLUDED.consecutive_failures,
                 consecutive_successes = EXCLUDED.consecutive_successes,
                 last_status = EXCLUDED.last_status,
                 last_response_time_ms = EXCLUDED.last_response_time_ms,
                 last_error_message = EXCLUDED.last_error_message,
                 http_status_code = EXCLUDED.http_status_code,
                 last_success_at = EXCLUDED.last_success_at,
                 last_failure_at = EXCLUDED.last_failure_at,
                 average_response_time_ms = EXCLUDED.average_response_time_ms,
                 circuit_breaker_state = EXCLUDED.circuit_breaker_state,
                 uptime_percentage_24h = EXCLUDED.uptime_percentage_24h,
                 uptime_percentage_7d = EXCLUDED.uptime_percentage_7d,
                 uptime_percentage_30d = EXCLUDED.uptime_percentage_30d,
                 is_enabled = EXCLUDED.is_enabled"#,
        )
        .bind(&row.identity.provider)
        .bind(&row.identity.model)
        .bind(&row.identity.gateway)
        .bind(enc(&row.monitoring_tier)?)
        .bind(row.priority_score)
        .bind(row.next_check_at)
        .bind(row.last_called_at)
        .bind(row.call_count as i64)
        .bind(row.success_count as i64)
        .bind(row.error_count as i64)
        .bind(row.consecutive_failures as i32)
        .bind(row.consecutive_successes as i32)
        .bind(row.last_status.as_ref().map(enc).transpose()?)
        .bind(row.last_response_time_ms.map(|v| v as i64))
        .bind(&row.last_error_message)
        .bind(row.http_status_code.map(|v| v as i32))
        .bind(row.last_success_at)
        .bind(row.last_failure_at)
        .bind(row.average_response_time_ms)
        .bind(enc(&row.circuit_breaker_state)?)
        .bind(row.uptime_percentage_24h)
        .bind(row.uptime_percentage_7d)
        .bind(row.uptime_percentage_30d)
        .bind(row.is_enabled)
        .execute(&self.pool)
        .await
        .map_err(Self::map_sqlx)?;
        Ok(())
    }

    async fn due_for_checking(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<TrackingRow>, ServiceError> {
        let records = sqlx::query(
            r#"SELECT provider, model, gateway, monitoring_tier, priority_score,
                      next_check_at, last_called_at, call_count, success_count, error_count,
                      consecutive_failures, consecutive_successes, last_status,
                      last_response_time_ms, last_error_message, http_status_code,
                      last_success_at, last_failure_at, average_response_time_ms,
                      circuit_breaker_state, uptime_percentage_24h, uptime_percentage_7d,
                      uptime_percentage_30d, is_enabled
               FROM model_health_tracking
               WHERE is_enabled = true AND next_check_at <= $1
               ORDER BY priority_score DESC, next_check_at ASC
               LIMIT $2"#,
        )
        .bind(now)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(Self::map_sqlx)?;

        records.into_iter().map(row_to_tracking_row).collect()
    }

    async fn all_enabled(&self, offset: usize, limit: usize) -> Result<Vec<TrackingRow>, ServiceError> {
        let records = sqlx::query(
            r#"SELECT provider, model, gateway, monitoring_tier, priority_score,
                      next_check_at, last_called_at, call_count, success_count, error_count,
                      consecutive_failures, consecutive_successes, last_status,
                      last_response_time_ms, last_error_message, http_status_code,
                      last_success_at, last_failure_at, average_response_time_ms,
                      circuit_breaker_state, uptime_percentage_24h, uptime_percentage_7d,
                      uptime_percentage_30d, is_enabled
               FROM model_health_tracking
               WHERE is_enabled = true
               ORDER BY provider, model, gateway
               OFFSET $1 LIMIT $2"#,
        )
        .bind(offset as i64)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(Self::map_sqlx)?;

        records.into_iter().map(row_to_tracking_row).collect()
    }

    async fn count_enabled(&self) -> Result<usize, ServiceError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM model_health_tracking WHERE is_enabled = true",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(Self::map_sqlx)?;
        Ok(count as usize)
    }

    async fn append_history(&self, record: &HistoryRecord) -> Result<(), ServiceError> {
        sqlx::query(
            r#"INSERT INTO model_health_history
                 (provider, model, gateway, checked_at, status, response_time_ms,
                  error_message, http_status_code, circuit_breaker_state)
               VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)"#,
        )
        .bind(&record.identity.provider)
        .bind(&record.identity.model)
        .bind(&record.identity.gateway)
        .bind(record.checked_at)
        .bind(enc(&record.status)?)
        .bind(record.response_time_ms.map(|v| v as i64))
        .bind(&record.error_message)
        .bind(record.http_status_code.map(|v| v as i32))
        .bind(enc(&record.circuit_breaker_state)?)
        .execute(&self.pool)
        .await
        .map_err(Self::map_sqlx)?;
        Ok(())
    }

    async fn history_since(
        &self,
        identity: &ModelIdentity,
        since: DateTime<Utc>,
    ) -> Result<Vec<HistoryRecord>, ServiceError> {
        let records = sqlx::query(
            r#"SELECT provider, model, gateway, checked_at, status, response_time_ms,
                      error_message, http_status_code, circuit_breaker_state
               FROM model_health_history
               WHERE provider = $1 AND model = $2 AND gateway = $3 AND checked_at >= $4"#,
        )
        .bind(&identity.provider)
        .bind(&identity.model)
        .bind(&identity.gateway)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(Self::map_sqlx)?;

        records
            .into_iter()
            .map(|row: sqlx::postgres::PgRow| {
                use sqlx::Row;
                Ok(HistoryRecord {
                    identity: ModelIdentity::new(
                        row.try_get::<String, _>("provider").map_err(Self::map_sqlx)?,
                        row.try_get::<String, _>("model").map_err(Self::map_sqlx)?,
                        row.try_get::<String, _>("gateway").map_err(Self::map_sqlx)?,
                    ),
                    checked_at: row.try_get("checked_at").map_err(Self::map_sqlx)?,
                    status: dec(&row.try_get::<String, _>("status").map_err(Self::map_sqlx)?)?,
                    response_time_ms: row
                        .try_get::<Option<i64>, _>("response_time_ms")
                        .map_err(Self::map_sqlx)?
                        .map(|v| v as u64),
                    error_message: row.try_get("error_message").map_err(Self::map_sqlx)?,
                    http_status_code: row
                        .try_get::<Option<i32>, _>("http_status_code")
                        .map_err(Self::map_sqlx)?
                        .map(|v| v as u16),
                    circuit_breaker_state: dec(
                        &row.try_get::<String, _>("circuit_breaker_state")
                            .map_err(Self::map_sqlx)?,
                    )?,
                })
            })
            .collect()
    }

    async fn active_incident(&self, identity: &ModelIdentity) -> Result<Option<Incident>, ServiceError> {
        let record = sqlx::query(
            r#"SELECT provider, model, gateway, incident_type, severity, status, started_at,
                      resolved_at, error_count, error_message, resolution_notes
               FROM model_health_incidents
               WHERE provider = $1 AND model = $2 AND gateway = $3 AND status = 'active'
               LIMIT 1"#,
        )
        .bind(&identity.provider)
        .bind(&identity.model)
        .bind(&identity.gateway)
        .fetch_optional(&self.pool)
        .await
        .map_err(Self::map_sqlx)?;

        let Some(row) = record else { return Ok(None) };
        row_to_incident(row).map(Some)
    }

    async fn upsert_incident(&self, incident: &Incident) -> Result<(), ServiceError> {
        sqlx::query(
            r#"INSERT INTO model_health_incidents
                 (provider, model, gateway, incident_type, severity, status, started_at,
                  resolved_at, error_count, error_message, resolution_notes)
               VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11)
               ON CONFLICT (provider, model, gateway, started_at) DO UPDATE SET
                 incident_type = EXCLUDED.incident_type,
                 severity = EXCLUDED.severity,
                 status = EXCLUDED.status,
                 resolved_at = EXCLUDED.resolved_at,
                 error_count = EXCLUDED.error_count,
                 error_message = EXCLUDED.error_message,
                 resolution_notes = EXCLUDED.resolution_notes"#,
        )
        .bind(&incident.identity.provider)
        .bind(&incident.identity.model)
        .bind(&incident.identity.gateway)
        .bind(enc(&incident.incident_type)?)
        .bind(enc(&incident.severity)?)
        .bind(enc(&incident.status)?)
        .bind(incident.started_at)
        .bind(incident.resolved_at)
        .bind(incident.error_count as i64)
        .bind(&incident.error_message)
        .bind(&incident.resolution_notes)
        .execute(&self.pool)
        .await
        .map_err(Self::map_sqlx)?;
        Ok(())
    }

    async fn resolve_active_incidents(
        &self,
        identity: &ModelIdentity,
        resolved_at: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        sqlx::query(
            r#"UPDATE model_health_incidents
               SET status = 'resolved', resolved_at = $4,
                   resolution_notes = 'Model recovered and passed health checks'
               WHERE provider = $1 AND model = $2 AND gateway = $3 AND status = 'active'"#,
        )
        .bind(&identity.provider)
        .bind(&identity.model)
        .bind(&identity.gateway)
        .bind(resolved_at)
        .execute(&self.pool)
        .await
        .map_err(Self::map_sqlx)?;
        Ok(())
    }

    /// Delegates ranking and reassignment to a `reclassify_model_tiers()`
    /// stored function so the percentile computation runs inside Postgres
    /// against a consistent snapshot. A fleet that has not migrated this
    /// function in yet reports SQLSTATE `42883` ("undefined_function"),
    /// which is surfaced as `ServiceError::SchemaMissing` rather than a
    /// generic store error.
    async fn reclassify_tiers(&self) -> Result<usize, ServiceError> {
        let result: Result<(i64,), sqlx::Error> =
            sqlx::query_as("SELECT reclassify_model_tiers()")
                .fetch_one(&self.pool)
                .await;

        match result {
            Ok((changed,)) => Ok(changed as usize),
            Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("42883") => {
                Err(ServiceError::SchemaMissing {
                    message: "reclassify_model_tiers() is not present in the schema cache".into(),
                })
            }
            Err(e) => Err(Self::map_sqlx(e)),
        }
    }
}

fn row_to_tracking_row(row: sqlx::postgres::PgRow) -> Result<TrackingRow, ServiceError> {
    use sqlx::Row;
    Ok(TrackingRow {
        identity: ModelIdentity::new(
            row.try_get::<String, _>("provider").map_err(PgTrackingStore::map_sqlx)?,
            row.try_get::<String, _>("model").map_err(PgTrackingStore::map_sqlx)?,
            row.try_get::<String, _>("gateway").map_err(PgTrackingStore::map_sqlx)?,
        ),
        monitoring_tier: dec(&row.try_get::<String, _>("monitoring_tier").map_err(PgTrackingStore::map_sqlx)?)?,
        priority_score: row.try_get("priority_score").map_err(PgTrackingStore::map_sqlx)?,
        next_check_at: row.try_get("next_check_at").map_err(PgTrackingStore::map_sqlx)?,
        last_called_at: row.try_get("last_called_at").map_err(PgTrackingStore::map_sqlx)?,
        call_count: row.try_get::<i64, _>("call_count").map_err(PgTrackingStore::map_sqlx)? as u64,
        success_count: row.try_get::<i64, _>("success_count").map_err(PgTrackingStore::map_sqlx)? as u64,
        error_count: row.try_get::<i64, _>("error_count").map_err(PgTrackingStore::map_sqlx)? as u64,
        consecutive_failures: row
            .try_get::<i32, _>("consecutive_failures")
            .map_err(PgTrackingStore::map_sqlx)? as u32,
        consecutive_successes: row
            .try_get::<i32, _>("consecutive_successes")
            .map_err(PgTrackingStore::map_sqlx)? as u32,
        last_status: row
            .try_get::<Option<String>, _>("last_status")
            .map_err(PgTrackingStore::map_sqlx)?
            .map(|s| dec(&s))
            .transpose()?,
        last_response_time_ms: row
            .try_get::<Option<i64>, _>("last_response_time_ms")
            .map_err(PgTrackingStore::map_sqlx)?
            .map(|v| v as u64),
        last_error_message: row.try_get("last_error_message").map_err(PgTrackingStore::map_sqlx)?,
        http_status_code: row
            .try_get::<Option<i32>, _>("http_status_code")
            .map_err(PgTrackingStore::map_sqlx)?
            .map(|v| v as u16),
        last_success_at: row.try_get("last_success_at").map_err(PgTrackingStore::map_sqlx)?,
        last_failure_at: row.try_get("last_failure_at").map_err(PgTrackingStore::map_sqlx)?,
        average_response_time_ms: row
            .try_get("average_response_time_ms")
            .map_err(PgTrackingStore::map_sqlx)?,
        circuit_breaker_state: dec(
            &row.try_get::<String, _>("circuit_breaker_state")
                .map_err(PgTrackingStore::map_sqlx)?,
        )?,
        uptime_percentage_24h: row.try_get("uptime_percentage_24h").map_err(PgTrackingStore::map_sqlx)?,
        uptime_percentage_7d: row.try_get("uptime_percentage_7d").map_err(PgTrackingStore::map_sqlx)?,
        uptime_percentage_30d: row.try_get("uptime_percentage_30d").map_err(PgTrackingStore::map_sqlx)?,
        is_enabled: row.try_get("is_enabled").map_err(PgTrackingStore::map_sqlx)?,
    })
}

fn row_to_incident(row: sqlx::postgres::PgRow) -> Result<Incident, ServiceError> {
    use sqlx::Row;
    Ok(Incident {
        identity: ModelIdentity::new(
            row.try_get::<String, _>("provider").map_err(PgTrackingStore::map_sqlx)?,
            row.try_get::<String, _>("model").map_err(PgTrackingStore::map_sqlx)?,
            row.try_get::<String, _>("gateway").map_err(PgTrackingStore::map_sqlx)?,
        ),
        incident_type: dec(&row.try_get::<String, _>("incident_type").map_err(PgTrackingStore::map_sqlx)?)?,
        severity: dec(&row.try_get::<String, _>("severity").map_err(PgTrackingStore::map_sqlx)?)?,
        status: dec(&row.try_get::<String, _>("status").map_err(PgTrackingStore::map_sqlx)?)?,
        started_at: row.try_get("started_at").map_err(PgTrackingStore::map_sqlx)?,
        resolved_at: row.try_get("resolved_at").map_err(PgTrackingStore::map_sqlx)?,
        error_count: row.try_get::<i64, _>("error_count").map_err(PgTrackingStore::map_sqlx)? as u64,
        error_message: row.try_get("error_message").map_err(PgTrackingStore::map_sqlx)?,
        resolution_notes: row.try_get("resolution_notes").map_err(PgTrackingStore::map_sqlx)?,
    })
}

/// Shared handle used by every component that reads or writes tracking
/// state — the Scheduler, Aggregator, Tier Updater, and Result Processor
/// all hold one.
pub type SharedTrackingStore = Arc<dyn TrackingStore>;

#[cfg(test)]
mod tests {
    use super::*;
    use health_monitor_core::model::HealthCheckStatus;

    fn id() -> ModelIdentity {
        ModelIdentity::new("openai", "gpt-4o-mini", "openrouter")
    }

    #[tokio::test]
    async fn register_is_idempotent() {
        let store = InMemoryTrackingStore::new();
        let now = Utc::now();
        store.register(&id(), MonitoringTier::Critical, now).await.unwrap();
        store.register(&id(), MonitoringTier::Popular, now).await.unwrap();
        let row = store.get_row(&id()).await.unwrap().unwrap();
        assert_eq!(row.monitoring_tier, MonitoringTier::Critical);
    }

    #[tokio::test]
    async fn due_for_checking_orders_by_priority_then_next_check_at() {
        let store = InMemoryTrackingStore::new();
        let now = Utc::now();
        let a = ModelIdentity::new("openai", "a", "openrouter");
        let b = ModelIdentity::new("openai", "b", "openrouter");
        let mut row_a = TrackingRow::new(a.clone(), MonitoringTier::Critical, now);
        row_a.priority_score = 1.0;
        let mut row_b = TrackingRow::new(b.clone(), MonitoringTier::Critical, now);
        row_b.priority_score = 5.0;
        store.upsert_row(&row_a).await.unwrap();
        store.upsert_row(&row_b).await.unwrap();

        let due = store.due_for_checking(now, 10).await.unwrap();
        assert_eq!(due[0].identity, b);
        assert_eq!(due[1].identity, a);
    }

    #[tokio::test]
    async fn history_since_filters_out_older_records() {
        let store = InMemoryTrackingStore::new();
        let now = Utc::now();
        let old = HistoryRecord {
            identity: id(),
            checked_at: now - chrono::Duration::days(2),
            status: HealthCheckStatus::Success,
            response_time_ms: Some(100),
            error_message: None,
            http_status_code: Some(200),
            circuit_breaker_state: health_monitor_core::CircuitState::Closed,
        };
        let recent = HistoryRecord {
            checked_at: now,
            ..old.clone()
        };
        store.append_history(&old).await.unwrap();
        store.append_history(&recent).await.unwrap();

        let since = store
            .history_since(&id(), now - chrono::Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(since.len(), 1);
    }

    #[tokio::test]
    async fn resolve_active_incidents_clears_active_status() {
        let store = InMemoryTrackingStore::new();
        let now = Utc::now();
        let incident = Incident::open(
            id(),
            health_monitor_core::model::IncidentType::Outage,
            health_monitor_core::model::IncidentSeverity::High,
            Some("persistent: HTTP 500".to_string()),
            now,
        );
        store.upsert_incident(&incident).await.unwrap();
        assert!(store.active_incident(&id()).await.unwrap().is_some());

        store.resolve_active_incidents(&id(), now).await.unwrap();
        assert!(store.active_incident(&id()).await.unwrap().is_none());
    }
}
