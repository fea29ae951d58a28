use super::GatewayAdapter;

/// Groq's OpenAI-compatible API. Base URL grounded on the teacher's
/// `GroqProvider`.
pub struct GroqAdapter;

impl GatewayAdapter for GroqAdapter {
    fn name(&self) -> &str {
        "groq"
    }

    fn base_url(&self) -> &str {
        "https://api.groq.com/openai/v1"
    }
}
