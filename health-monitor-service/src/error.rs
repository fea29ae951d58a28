//! # Service Error Types
//!
//! Error taxonomy for the long-running service crate: persistence,
//! coordination, and the thin read-only HTTP surface. Mirrors the teacher's
//! `GatewayError` (an `IntoResponse`-able `thiserror` enum with an HTTP
//! status mapping) but trimmed to the variants this service actually raises
//! — no auth/plugin/content-filter variants, since those subsystems are not
//! part of this spec — and extended with `Store`/`Coordination` variants for
//! the persistence/Redis failure modes of spec §7.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use health_monitor_core::MonitorError;
use serde_json::json;
use thiserror::Error;

/// Errors raised by the service crate's components and its HTTP surface.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// A gateway probe or domain-level operation failed.
    #[error("monitor error: {0}")]
    Monitor(#[from] MonitorError),

    /// The tracking store (Postgres) failed.
    #[error("store error: {message}")]
    Store { message: String },

    /// The coordination store (Redis lease) failed.
    #[error("coordination error: {message}")]
    Coordination { message: String },

    /// Configuration failed to load or validate.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// The requested model identity is not tracked.
    #[error("model not found: {provider}/{model}/{gateway}")]
    NotFound {
        provider: String,
        model: String,
        gateway: String,
    },

    /// Internal failure with no more specific classification.
    #[error("internal error: {message}")]
    Internal { message: String },

    /// The store's reclassification routine is not present in its schema
    /// cache (§4.8). Not a failure worth retrying or alerting on — the
    /// Tier Updater logs a warning and skips the cycle.
    #[error("schema missing: {message}")]
    SchemaMissing { message: String },
}

impl ServiceError {
    /// Whether retrying the operation that produced this error is worth
    /// attempting (§7's transient/non-transient classification, reused by
    /// `error_handling::retry_with_backoff`).
    pub fn is_transient(&self) -> bool {
        match self {
            ServiceError::Monitor(e) => e.is_transient(),
            ServiceError::Store { .. } => true,
            ServiceError::Coordination { .. } => true,
            ServiceError::Config { .. } => false,
            ServiceError::NotFound { .. } => false,
            ServiceError::Internal { .. } => false,
            ServiceError::SchemaMissing { .. } => false,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            ServiceError::Monitor(_) => (StatusCode::BAD_GATEWAY, "monitor_error"),
            ServiceError::Store { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "store_error"),
            ServiceError::Coordination { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "coordination_error")
            }
            ServiceError::Config { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            ServiceError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
            ServiceError::Internal { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            ServiceError::SchemaMissing { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "schema_missing")
            }
        };

        let body = Json(json!({
            "error": {
                "message": self.to_string(),
                "type": error_type,
                "code": status.as_u16(),
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_and_coordination_errors_are_transient() {
        assert!(ServiceError::Store {
            message: "connection refused".into()
        }
        .is_transient());
        assert!(ServiceError::Coordination {
            message: "redis unreachable".into()
        }
        .is_transient());
    }

    #[test]
    fn config_and_not_found_are_not_transient() {
        assert!(!ServiceError::Config {
            message: "bad toml".into()
        }
        .is_transient());
        assert!(!ServiceError::NotFound {
            provider: "openai".into(),
            model: "gpt-4o".into(),
            gateway: "openrouter".into()
        }
        .is_transient());
    }
}
