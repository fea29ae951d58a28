//! # Probe Executor (C5)
//!
//! Turns a [`ProbeRequest`](health_monitor_core::gateway::ProbeRequest)
//! built by a [`GatewayAdapter`](health_monitor_core::gateway::GatewayAdapter)
//! into an actual HTTP call, bounded globally by a `tokio::sync::Semaphore`
//! at `max_concurrent_checks` (§5). Grounded on the teacher's
//! `circuit_breaker`'s `tokio::time::timeout` usage for bounding a single
//! upstream call, generalized here to wrap the whole request/response
//! round trip rather than just a breaker evaluation.

use chrono::Utc;
use health_monitor_core::gateway::{create_gateway_adapter, GatewayAdapter, ProbeOutcome};
use health_monitor_core::model::{HealthCheckResult, ModelIdentity, MonitoringTier};
use health_monitor_core::MonitorError;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::debug;

/// Issues HTTP probes against upstream gateways, bounding the number in
/// flight at once regardless of how many callers invoke [`execute`](ProbeExecutor::execute)
/// concurrently.
#[derive(Clone)]
pub struct ProbeExecutor {
    client: Client,
    semaphore: Arc<Semaphore>,
}

impl ProbeExecutor {
    pub fn new(client: Client, max_concurrent_checks: usize) -> Self {
        Self {
            client,
            semaphore: Arc::new(Semaphore::new(max_concurrent_checks.max(1))),
        }
    }

    /// Probes a single identity: resolves its gateway adapter, builds the
    /// request, and sends it under the per-tier timeout. Never returns an
    /// `Err` for an upstream failure — every such outcome is folded into
    /// the returned [`HealthCheckResult`]'s status, since the Result
    /// Processor needs a result to act on even when the probe itself
    /// failed. An `Err` here means the probe could not even be attempted
    /// (unconfigured/unknown gateway).
    pub async fn execute(
        &self,
        identity: &ModelIdentity,
        tier: MonitoringTier,
        api_key: Option<&str>,
    ) -> Result<HealthCheckResult, MonitorError> {
        let adapter: Box<dyn GatewayAdapter> =
            create_gateway_adapter(&identity.gateway).ok_or_else(|| MonitorError::Unconfigured {
                gateway: identity.gateway.clone(),
            })?;

        let probe = adapter.build_probe(&identity.model, tier, api_key)?;

        let _permit = self
            .semaphore
            .acquire()
            .await
            .expect("probe semaphore is never closed");

        let started = std::time::Instant::now();
        let outcome = self.send(&probe.endpoint, &probe.headers, &probe.body, probe.timeout).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let (status, error_message) = adapter.classify(&outcome);
        let http_status_code = match &outcome {
            ProbeOutcome::HttpStatus(code) => Some(*code),
            _ => None,
        };

        debug!(
            identity = %identity.key(),
            ?status,
            elapsed_ms,
            "probe completed"
        );

        Ok(HealthCheckResult {
            identity: identity.clone(),
            status,
            response_time_ms: Some(elapsed_ms),
            error_message,
            http_status_code,
            checked_at: Utc::now(),
        })
    }

    async fn send(
        &self,
        endpoint: &str,
        headers: &[(String, String)],
        body: &serde_json::Value,
        timeout: Duration,
    ) -> ProbeOutcome {
        let mut request = self.client.post(endpoint).timeout(timeout).json(body);
        for (key, value) in headers {
            request = request.header(key, value);
        }

        match request.send().await {
            Ok(response) => ProbeOutcome::HttpStatus(response.status().as_u16()),
            Err(err) if err.is_timeout() => ProbeOutcome::Timeout,
            Err(err) if err.is_connect() => ProbeOutcome::ConnectionError(err.to_string()),
            Err(err) => ProbeOutcome::OtherError(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn id() -> ModelIdentity {
        ModelIdentity::new("openai", "gpt-4o-mini", "openrouter")
    }

    #[tokio::test]
    async fn unconfigured_gateway_fails_before_any_network_call() {
        let executor = ProbeExecutor::new(Client::new(), 4);
        let err = executor
            .execute(&id(), MonitoringTier::Critical, None)
            .await
            .unwrap_err();
        assert!(matches!(err, MonitorError::Unconfigured { .. }));
    }

    #[tokio::test]
    async fn unknown_gateway_name_is_also_unconfigured() {
        let executor = ProbeExecutor::new(Client::new(), 4);
        let unknown = ModelIdentity::new("openai", "gpt-4o-mini", "not-a-real-gateway");
        let err = executor
            .execute(&unknown, MonitoringTier::Critical, Some("sk-test"))
            .await
            .unwrap_err();
        assert!(matches!(err, MonitorError::Unconfigured { .. }));
    }

    #[tokio::test]
    async fn send_classifies_a_live_200_response_as_an_http_status_outcome() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let executor = ProbeExecutor::new(Client::new(), 4);
        let outcome = executor
            .send(
                &format!("{}/chat/completions", server.uri()),
                &[("Authorization".to_string(), "Bearer sk-test".to_string())],
                &serde_json::json!({"model": "gpt-4o-mini"}),
                Duration::from_secs(5),
            )
            .await;
        assert!(matches!(outcome, ProbeOutcome::HttpStatus(200)));
    }

    #[tokio::test]
    async fn send_classifies_a_429_as_an_http_status_outcome() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let executor = ProbeExecutor::new(Client::new(), 4);
        let outcome = executor
            .send(
                &format!("{}/chat/completions", server.uri()),
                &[],
                &serde_json::json!({}),
                Duration::from_secs(5),
            )
            .await;
        assert!(matches!(outcome, ProbeOutcome::HttpStatus(429)));
    }
}
