use super::GatewayAdapter;

/// OpenRouter (OpenAI-compatible aggregator). Base URL grounded on the
/// teacher's `OpenRouterProvider`.
pub struct OpenRouterAdapter;

impl GatewayAdapter for OpenRouterAdapter {
    fn name(&self) -> &str {
        "openrouter"
    }

    fn base_url(&self) -> &str {
        "https://openrouter.ai/api/v1"
    }

    fn extra_headers(&self) -> Vec<(String, String)> {
        vec![
            ("HTTP-Referer".to_string(), "https://health-monitor.internal".to_string()),
            ("X-Title".to_string(), "Intelligent Health Monitor".to_string()),
        ]
    }
}
