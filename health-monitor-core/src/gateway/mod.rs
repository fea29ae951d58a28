//! # Gateway Adapter (C1)
//!
//! Maps `(gateway, model)` to an HTTP probe request and classifies the
//! response into a [`HealthCheckStatus`]. This module performs no I/O of
//! its own — it only builds requests and classifies outcomes, so it can be
//! unit-tested without a network. The Probe Executor (in the service
//! crate) is the only component that actually issues HTTP calls, reusing
//! the `(endpoint, headers, body, timeout)` tuple this module produces.

mod cerebras;
mod custom;
mod fireworks;
mod groq;
mod openrouter;
mod together;

pub use cerebras::CerebrasAdapter;
pub use custom::CustomAdapter;
pub use fireworks::FireworksAdapter;
pub use groq::GroqAdapter;
pub use openrouter::OpenRouterAdapter;
pub use together::TogetherAdapter;

use crate::error::MonitorError;
use crate::model::{HealthCheckStatus, MonitoringTier};
use std::time::Duration;

/// The fully-assembled, gateway-agnostic probe request the Probe Executor
/// sends over HTTP.
#[derive(Debug, Clone)]
pub struct ProbeRequest {
    pub endpoint: String,
    pub headers: Vec<(String, String)>,
    pub body: serde_json::Value,
    pub timeout: Duration,
}

/// The raw result of sending a [`ProbeRequest`], before classification.
/// Deliberately minimal — no response body is retained beyond its length,
/// since the probe only ever needs to know whether the upstream responded
/// and with what status.
#[derive(Debug, Clone)]
pub enum ProbeOutcome {
    /// The upstream responded with this HTTP status code.
    HttpStatus(u16),
    /// The request exceeded its per-tier timeout.
    Timeout,
    /// The TCP connection failed or was reset before a response arrived.
    ConnectionError(String),
    /// Any other transport-level failure (DNS, TLS, malformed response).
    OtherError(String),
}

const MAX_ERROR_MESSAGE_LEN: usize = 200;

fn truncate_message(message: String) -> String {
    if message.len() <= MAX_ERROR_MESSAGE_LEN {
        message
    } else {
        message.chars().take(MAX_ERROR_MESSAGE_LEN).collect()
    }
}

/// Centralized, pure classification rule (§4.1). Every gateway adapter
/// shares this function rather than each re-implementing the status-code
/// table, since the rules do not vary by gateway.
pub fn classify(outcome: &ProbeOutcome) -> (HealthCheckStatus, Option<String>) {
    match outcome {
        ProbeOutcome::HttpStatus(200) => (HealthCheckStatus::Success, None),
        ProbeOutcome::HttpStatus(429) => (HealthCheckStatus::RateLimited, None),
        ProbeOutcome::HttpStatus(401) | ProbeOutcome::HttpStatus(403) => {
            (HealthCheckStatus::Unauthorized, None)
        }
        ProbeOutcome::HttpStatus(404) => (HealthCheckStatus::NotFound, None),
        ProbeOutcome::HttpStatus(code) => (
            HealthCheckStatus::Error,
            Some(truncate_message(format!(
                "persistent: upstream returned HTTP {code}"
            ))),
        ),
        ProbeOutcome::Timeout => (HealthCheckStatus::Timeout, None),
        ProbeOutcome::ConnectionError(message) => (
            HealthCheckStatus::Error,
            Some(truncate_message(format!("transient: {message}"))),
        ),
        ProbeOutcome::OtherError(message) => (
            HealthCheckStatus::Error,
            Some(truncate_message(format!("persistent: {message}"))),
        ),
    }
}

/// One operation per upstream gateway: build a probe request, given the
/// model under test and the tier governing its timeout/payload size, and
/// an optional API key. Gateways lacking a configured key report
/// [`MonitorError::Unconfigured`] rather than attempting the probe — the
/// Scheduler treats that as skipped, never as a failing model.
pub trait GatewayAdapter: Send + Sync {
    fn name(&self) -> &str;
    fn base_url(&self) -> &str;

    /// Headers beyond `Authorization`/`Content-Type` this gateway expects
    /// (e.g. OpenRouter's optional attribution headers).
    fn extra_headers(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    fn build_probe(
        &self,
        model: &str,
        tier: MonitoringTier,
        api_key: Option<&str>,
    ) -> Result<ProbeRequest, MonitorError> {
        let gateway_name = self.name().to_string();
        let api_key = api_key.ok_or(MonitorError::Unconfigured {
            gateway: gateway_name,
        })?;

        let mut headers = vec![
            ("Authorization".to_string(), format!("Bearer {api_key}")),
            ("Content-Type".to_string(), "application/json".to_string()),
        ];
        headers.extend(self.extra_headers());

        let body = serde_json::json!({
            "model": model,
            "messages": [{"role": "user", "content": "ping"}],
            "max_tokens": tier.max_tokens(),
        });

        Ok(ProbeRequest {
            endpoint: format!("{}/chat/completions", self.base_url()),
            headers,
            body,
            timeout: Duration::from_secs(tier.timeout_seconds()),
        })
    }

    /// Classifies a probe outcome. Delegates to the shared [`classify`]
    /// function by default; a gateway with genuinely idiosyncratic status
    /// codes may override it.
    fn classify(&self, outcome: &ProbeOutcome) -> (HealthCheckStatus, Option<String>) {
        classify(outcome)
    }
}

/// Resolves a gateway name (as it appears in configuration) to its
/// adapter. Returns `None` for an unrecognized name, which the caller
/// treats the same as an unconfigured gateway.
pub fn create_gateway_adapter(name: &str) -> Option<Box<dyn GatewayAdapter>> {
    match name {
        "openrouter" => Some(Box::new(OpenRouterAdapter)),
        "fireworks" => Some(Box::new(FireworksAdapter)),
        "groq" => Some(Box::new(GroqAdapter)),
        "together" => Some(Box::new(TogetherAdapter)),
        "cerebras" => Some(Box::new(CerebrasAdapter)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconfigured_gateway_reports_unconfigured_not_a_failure() {
        let adapter = OpenRouterAdapter;
        let err = adapter
            .build_probe("gpt-4o-mini", MonitoringTier::Critical, None)
            .unwrap_err();
        assert!(matches!(err, MonitorError::Unconfigured { .. }));
    }

    #[test]
    fn configured_gateway_builds_a_probe_with_bearer_auth() {
        let adapter = GroqAdapter;
        let probe = adapter
            .build_probe("llama-3.1-8b-instant", MonitoringTier::Critical, Some("sk-test"))
            .unwrap();
        assert!(probe
            .headers
            .iter()
            .any(|(k, v)| k == "Authorization" && v == "Bearer sk-test"));
        assert_eq!(probe.timeout, Duration::from_secs(30));
    }

    #[test]
    fn classify_maps_status_codes_per_the_rule_table() {
        assert_eq!(classify(&ProbeOutcome::HttpStatus(200)).0, HealthCheckStatus::Success);
        assert_eq!(classify(&ProbeOutcome::HttpStatus(429)).0, HealthCheckStatus::RateLimited);
        assert_eq!(classify(&ProbeOutcome::HttpStatus(401)).0, HealthCheckStatus::Unauthorized);
        assert_eq!(classify(&ProbeOutcome::HttpStatus(403)).0, HealthCheckStatus::Unauthorized);
        assert_eq!(classify(&ProbeOutcome::HttpStatus(404)).0, HealthCheckStatus::NotFound);
        assert_eq!(classify(&ProbeOutcome::HttpStatus(500)).0, HealthCheckStatus::Error);
        assert_eq!(classify(&ProbeOutcome::Timeout).0, HealthCheckStatus::Timeout);
    }

    #[test]
    fn classify_tags_transient_vs_persistent_in_the_message_prefix() {
        let (_, message) = classify(&ProbeOutcome::ConnectionError("reset by peer".into()));
        assert!(message.unwrap().starts_with("transient:"));

        let (_, message) = classify(&ProbeOutcome::OtherError("dns failure".into()));
        assert!(message.unwrap().starts_with("persistent:"));
    }

    #[test]
    fn classify_truncates_error_messages_to_200_chars() {
        let long_message = "x".repeat(500);
        let (_, message) = classify(&ProbeOutcome::OtherError(long_message));
        assert_eq!(message.unwrap().len(), MAX_ERROR_MESSAGE_LEN);
    }
}
