//! # Configuration
//!
//! TOML-backed configuration for the health monitor, following the
//! teacher's `Config::load`/`apply_env_overrides`/`validate` structure
//! (`std::fs::read_to_string` + `toml::from_str`, then environment
//! overrides, then schema validation). Every recognized option in spec §6
//! is a field here with the literal default given there.

use health_monitor_core::model::MonitoringTier;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;

/// Per-tier probe timeouts, in seconds (spec §6 `per_tier_timeouts`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierTimeouts {
    pub critical: u64,
    pub popular: u64,
    pub standard: u64,
    pub on_demand: u64,
}

impl Default for TierTimeouts {
    fn default() -> Self {
        Self {
            critical: 30,
            popular: 45,
            standard: 60,
            on_demand: 60,
        }
    }
}

impl TierTimeouts {
    pub fn for_tier(&self, tier: MonitoringTier) -> u64 {
        match tier {
            MonitoringTier::Critical => self.critical,
            MonitoringTier::Popular => self.popular,
            MonitoringTier::Standard => self.standard,
            MonitoringTier::OnDemand => self.on_demand,
        }
    }
}

/// Per-tier base check intervals, in seconds (spec §6 `per_tier_intervals`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierIntervals {
    pub critical: u64,
    pub popular: u64,
    pub standard: u64,
    pub on_demand: u64,
}

impl Default for TierIntervals {
    fn default() -> Self {
        Self {
            critical: 300,
            popular: 1_800,
            standard: 7_200,
            on_demand: 14_400,
        }
    }
}

impl TierIntervals {
    pub fn for_tier(&self, tier: MonitoringTier) -> u64 {
        match tier {
            MonitoringTier::Critical => self.critical,
            MonitoringTier::Popular => self.popular,
            MonitoringTier::Standard => self.standard,
            MonitoringTier::OnDemand => self.on_demand,
        }
    }
}

/// Where the tracking store and coordination store live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Postgres connection string for `PgTrackingStore`.
    pub database_url: String,
    /// Redis connection string for `RedisTtlStore`.
    pub redis_url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/health_monitor".to_string(),
            redis_url: "redis://localhost:6379".to_string(),
        }
    }
}

/// Cache publication settings (spec §6 `cache_ttl_seconds`, §4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub ttl_seconds: u64,
    /// Publish the optional `health:dashboard` variant at a shorter TTL.
    pub publish_dashboard_variant: bool,
    pub dashboard_ttl_seconds: u64,
    /// Cap on the number of models in the compact routing view (§4.9).
    pub max_models_in_cache: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 360,
            publish_dashboard_variant: false,
            dashboard_ttl_seconds: 90,
            max_models_in_cache: 500,
        }
    }
}

/// Alert emission settings (§4.10).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    pub health_alert_threshold_pct: f64,
    /// DSN for the Sentry alert sink; absent disables remote emission (the
    /// alert is still logged).
    pub sentry_dsn: Option<String>,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            health_alert_threshold_pct: 90.0,
            sentry_dsn: None,
        }
    }
}

/// Minimal HTTP surface settings for the read-only Axum server
/// (SPEC_FULL.md §6 supplement).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

/// Top-level configuration for the health monitor service. All fields
/// mirror spec §6's "Configuration (recognized options)" list verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub health_check_interval_seconds: u64,
    pub batch_size: usize,
    pub max_concurrent_checks: usize,
    pub redis_coordination: bool,
    pub per_tier_timeouts: TierTimeouts,
    pub per_tier_intervals: TierIntervals,
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub health_alert_threshold_pct: f64,
    pub cache_ttl_seconds: u64,
    /// Size of the full model catalog the gateway fleet fronts, independent
    /// of how many rows are actually tracked here. The Cache Publisher
    /// reports this as the system document's `total_models` (§6); only the
    /// subset this worker tracks ever gets a `tracked_models` row.
    pub catalog_size: usize,
    /// Gateway name -> credential. A gateway with no entry here is
    /// `unconfigured` (§4.1, §6).
    pub api_keys: HashMap<String, String>,
    pub store: StoreConfig,
    pub cache: CacheConfig,
    pub alert: AlertConfig,
    pub server: ServerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            health_check_interval_seconds: 300,
            batch_size: 50,
            max_concurrent_checks: 20,
            redis_coordination: true,
            per_tier_timeouts: TierTimeouts::default(),
            per_tier_intervals: TierIntervals::default(),
            failure_threshold: 8,
            success_threshold: 3,
            health_alert_threshold_pct: 90.0,
            cache_ttl_seconds: 360,
            catalog_size: 10_000,
            api_keys: HashMap::new(),
            store: StoreConfig::default(),
            cache: CacheConfig::default(),
            alert: AlertConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from a TOML file, applies environment variable
    /// overrides, then validates it. Mirrors the teacher's
    /// `Config::load` three-step structure.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Applies environment variable overrides. Numeric configs use the
    /// same name in upper snake case (spec §6); one credential variable
    /// per gateway is read as `{GATEWAY}_API_KEY`.
    pub fn apply_env_overrides(&mut self) -> anyhow::Result<()> {
        if let Ok(v) = env::var("HEALTH_CHECK_INTERVAL_SECONDS") {
            self.health_check_interval_seconds = v.parse()?;
        }
        if let Ok(v) = env::var("BATCH_SIZE") {
            self.batch_size = v.parse()?;
        }
        if let Ok(v) = env::var("MAX_CONCURRENT_CHECKS") {
            self.max_concurrent_checks = v.parse()?;
        }
        if let Ok(v) = env::var("REDIS_COORDINATION") {
            self.redis_coordination = v.parse()?;
        }
        if let Ok(v) = env::var("FAILURE_THRESHOLD") {
            self.failure_threshold = v.parse()?;
        }
        if let Ok(v) = env::var("SUCCESS_THRESHOLD") {
            self.success_threshold = v.parse()?;
        }
        if let Ok(v) = env::var("HEALTH_ALERT_THRESHOLD_PCT") {
            self.health_alert_threshold_pct = v.parse()?;
            self.alert.health_alert_threshold_pct = self.health_alert_threshold_pct;
        }
        if let Ok(v) = env::var("CACHE_TTL_SECONDS") {
            self.cache_ttl_seconds = v.parse()?;
            self.cache.ttl_seconds = self.cache_ttl_seconds;
        }
        if let Ok(v) = env::var("CATALOG_SIZE") {
            self.catalog_size = v.parse()?;
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            self.store.database_url = v;
        }
        if let Ok(v) = env::var("REDIS_URL") {
            self.store.redis_url = v;
        }
        if let Ok(v) = env::var("SENTRY_DSN") {
            if !v.is_empty() {
                self.alert.sentry_dsn = Some(v);
            }
        }

        for gateway in ["openrouter", "fireworks", "groq", "together", "cerebras"] {
            let env_key = format!("{}_API_KEY", gateway.to_uppercase());
            if let Ok(key) = env::var(&env_key) {
                if !key.is_empty() {
                    self.api_keys.insert(gateway.to_string(), key);
                }
            }
        }

        Ok(())
    }

    /// Returns the configured credential for `gateway`, or `None` if it is
    /// unconfigured — the signal `build_probe` and the gateway cache
    /// document both use (§4.1, §6).
    pub fn api_key_for(&self, gateway: &str) -> Option<&str> {
        self.api_keys.get(gateway).map(|s| s.as_str())
    }

    /// Validates the loaded configuration, never aborting — callers log
    /// and continue per §7's "configuration-validation step during
    /// startup (which may log warnings but never aborts)" at the
    /// supervisor boundary; this function itself still returns `Err` so a
    /// misconfigured binary can refuse to start.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.batch_size == 0 {
            return Err(anyhow::anyhow!("batch_size must be at least 1"));
        }
        if self.max_concurrent_checks == 0 {
            return Err(anyhow::anyhow!("max_concurrent_checks must be at least 1"));
        }
        if self.failure_threshold == 0 {
            return Err(anyhow::anyhow!("failure_threshold must be at least 1"));
        }
        if self.success_threshold == 0 {
            return Err(anyhow::anyhow!("success_threshold must be at least 1"));
        }
        if !(0.0..=100.0).contains(&self.health_alert_threshold_pct) {
            return Err(anyhow::anyhow!(
                "health_alert_threshold_pct must be within [0, 100], got {}",
                self.health_alert_threshold_pct
            ));
        }
        if self.cache_ttl_seconds <= self.health_check_interval_seconds {
            tracing::warn!(
                cache_ttl_seconds = self.cache_ttl_seconds,
                health_check_interval_seconds = self.health_check_interval_seconds,
                "cache_ttl_seconds does not exceed health_check_interval_seconds; cache may expire between publications"
            );
        }
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("server.port must be nonzero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_section_6() {
        let config = Config::default();
        assert_eq!(config.health_check_interval_seconds, 300);
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.max_concurrent_checks, 20);
        assert!(config.redis_coordination);
        assert_eq!(config.failure_threshold, 8);
        assert_eq!(config.success_threshold, 3);
        assert_eq!(config.health_alert_threshold_pct, 90.0);
        assert_eq!(config.cache_ttl_seconds, 360);
        assert_eq!(config.per_tier_intervals.critical, 300);
        assert_eq!(config.per_tier_intervals.on_demand, 14_400);
        assert_eq!(config.per_tier_timeouts.critical, 30);
        assert_eq!(config.per_tier_timeouts.standard, 60);
    }

    #[test]
    fn default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let mut config = Config::default();
        config.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn api_key_for_is_none_when_gateway_unconfigured() {
        let config = Config::default();
        assert!(config.api_key_for("openrouter").is_none());
    }

    #[test]
    fn env_override_sets_batch_size() {
        std::env::set_var("BATCH_SIZE", "77");
        let mut config = Config::default();
        config.apply_env_overrides().unwrap();
        assert_eq!(config.batch_size, 77);
        std::env::remove_var("BATCH_SIZE");
    }
}
