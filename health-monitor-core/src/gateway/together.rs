use super::GatewayAdapter;

/// Together AI's OpenAI-compatible inference API.
pub struct TogetherAdapter;

impl GatewayAdapter for TogetherAdapter {
    fn name(&self) -> &str {
        "together"
    }

    fn base_url(&self) -> &str {
        "https://api.together.xyz/v1"
    }
}
