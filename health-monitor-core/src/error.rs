//! # Error Handling Module
//!
//! Error taxonomy for the health monitor's domain crate. Mirrors the shape
//! of a provider-facing SDK's error enum (HTTP errors, serialization
//! errors, a configuration catch-all) but adds the transient/non-transient
//! classification the Result Processor and Cache Publisher need in order to
//! decide whether a failure is worth retrying.

use thiserror::Error;

/// Errors raised by the domain crate: gateway probing, the TTL store, and
/// circuit breaker configuration.
#[derive(Error, Debug)]
pub enum MonitorError {
    /// The HTTP probe itself failed at the transport layer.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The upstream gateway has no configured API key.
    #[error("gateway {gateway} is unconfigured")]
    Unconfigured { gateway: String },

    /// The probe timed out waiting for a response.
    #[error("probe timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// A keyed TTL store operation (lease or cache) failed.
    #[error("store error: {message}")]
    Store { message: String },

    /// Response body could not be parsed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid or missing configuration for a component.
    #[error("configuration error: {message}")]
    Configuration { message: String },
}

impl MonitorError {
    /// Classifies whether a retry is worth attempting.
    ///
    /// Network-transport failures, timeouts, and store unavailability are
    /// transient; misconfiguration and malformed payloads are not — retrying
    /// them would just repeat the same failure.
    pub fn is_transient(&self) -> bool {
        match self {
            MonitorError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            MonitorError::Timeout { .. } => true,
            MonitorError::Store { .. } => true,
            MonitorError::Unconfigured { .. } => false,
            MonitorError::Serialization(_) => false,
            MonitorError::Configuration { .. } => false,
        }
    }
}
