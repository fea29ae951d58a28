use super::GatewayAdapter;

/// Cerebras' OpenAI-compatible inference API.
pub struct CerebrasAdapter;

impl GatewayAdapter for CerebrasAdapter {
    fn name(&self) -> &str {
        "cerebras"
    }

    fn base_url(&self) -> &str {
        "https://api.cerebras.ai/v1"
    }
}
