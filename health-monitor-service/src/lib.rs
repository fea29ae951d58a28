//! # Health Monitor Service
//!
//! The long-running service half of the intelligent health monitor: the
//! Scheduler, Probe Executor, Result Processor, Aggregator, Tier Updater,
//! Incident Resolver, Cache Publisher, and Alert Emitter named throughout
//! spec §4, wired together by a [`supervisor::MonitorSupervisor`] and
//! exposed over a thin read-only HTTP surface (`server`). The pure domain
//! types and algorithms (circuit breaker, classification, gateway
//! adapters) live in `health_monitor_core`; this crate is the ambient
//! stack around them — configuration, persistence, coordination,
//! scheduling, and the process that runs them continuously.
//!
//! ## Architecture
//!
//! - **`config`**: TOML configuration with environment overrides and
//!   validation, covering every option in §6.
//! - **`tracking_store`**: the `TrackingStore` trait and its Postgres
//!   (`PgTrackingStore`) and in-memory implementations, persisting the
//!   per-model rows, history, and incidents described in §3.
//! - **`registry`**: a read-mostly facade over the tracking store for the
//!   Scheduler's due-candidate queries.
//! - **`lease`**: Redis-backed (or in-memory) worker leasing so multiple
//!   service instances don't double-probe the same model (§4.2).
//! - **`probe`**: the concurrency-bounded executor that turns a tracking
//!   row into a classified `HealthCheckResult` via a gateway adapter.
//! - **`scheduler`**: the per-iteration due-candidates -> lease ->
//!   probe -> result-processor -> cache-publisher pipeline (§4.3), plus
//!   the on-demand single-probe path used by admin/debug callers.
//! - **`result_processor`**: counter, streak, circuit breaker, and
//!   incident state transitions for a single probe result (§4.6).
//! - **`aggregator`**: five-minute rolling uptime recomputation (§4.7).
//! - **`tier_updater`**: hourly tier reclassification (§4.8).
//! - **`incident_resolver`**: a reconciliation pass closing stray
//!   incidents the result processor's inline resolution missed (§4.6).
//! - **`cache_publisher`**: the four fixed-key JSON documents a
//!   downstream router reads (§4.9).
//! - **`alerting`**: threshold-based alert emission (§4.10).
//! - **`supervisor`**: starts and stops the four long-running loops
//!   above as a unit (§4.11), and backs the on-demand check endpoint.
//! - **`server`**: the Axum router and `AppState` assembly.
//! - **`error`**: `ServiceError`, the crate-wide error type and its HTTP
//!   mapping.
//! - **`error_handling`**: the generic retry-with-backoff helper shared
//!   by the Result Processor and Cache Publisher (§4.6, §4.9).
//!
//! ## Quick Start
//!
//! ```no_run
//! use health_monitor_service::config::Config;
//! use health_monitor_service::server::{build_app_state, create_server};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml")?;
//!     let state = build_app_state(&config, "worker-1").await?;
//!     state.supervisor.start_monitoring();
//!     let app = create_server(state);
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! ```toml
//! health_check_interval_seconds = 300
//! batch_size = 50
//! max_concurrent_checks = 20
//! redis_coordination = true
//!
//! [store]
//! database_url = "postgres://localhost/health_monitor"
//! redis_url = "redis://localhost:6379"
//! ```
//!
//! ## License
//!
//! This project is licensed under either of
//!
//! * Apache License, Version 2.0, ([LICENSE-APACHE](LICENSE-APACHE) or https://www.apache.org/licenses/LICENSE-2.0)
//! * MIT license ([LICENSE-MIT](LICENSE-MIT) or https://opensource.org/licenses/MIT)
//!
//! at your option.

pub mod aggregator;
pub mod alerting;
pub mod cache_publisher;
pub mod config;
pub mod error;
pub mod error_handling;
pub mod incident_resolver;
pub mod lease;
pub mod probe;
pub mod registry;
pub mod result_processor;
pub mod scheduler;
pub mod server;
pub mod supervisor;
pub mod tier_updater;
pub mod tracking_store;

pub use error::ServiceError;
pub use server::{build_app_state, create_server, AppState};
pub use supervisor::MonitorSupervisor;
