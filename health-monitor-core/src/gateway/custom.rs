use super::GatewayAdapter;

/// Escape hatch for a gateway not hardcoded into [`super::create_gateway_adapter`],
/// mirroring the teacher's `CustomProvider` (user-supplied base URL and
/// headers rather than a fixed one).
pub struct CustomAdapter {
    pub name: String,
    pub base_url: String,
    pub extra_headers: Vec<(String, String)>,
}

impl CustomAdapter {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        extra_headers: Vec<(String, String)>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            extra_headers,
        }
    }
}

impl GatewayAdapter for CustomAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn extra_headers(&self) -> Vec<(String, String)> {
        self.extra_headers.clone()
    }
}
