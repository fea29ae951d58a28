use super::GatewayAdapter;

/// Fireworks AI's OpenAI-compatible inference API. Not present among the
/// teacher's providers; the gateway follows the same chat-completions shape
/// as OpenRouter and Groq, so it adapts the same way.
pub struct FireworksAdapter;

impl GatewayAdapter for FireworksAdapter {
    fn name(&self) -> &str {
        "fireworks"
    }

    fn base_url(&self) -> &str {
        "https://api.fireworks.ai/inference/v1"
    }
}
