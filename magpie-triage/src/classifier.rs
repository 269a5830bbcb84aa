use crate::error::{Result, TriageError};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_MODEL: &str = "gemma3:4b";
pub const DEFAULT_PROMPT: &str = "Is this document a form, such as an application form, \
    tax form, registration form, or similar fill-in document? Reply only 'yes' or 'no'.";

/// Longer documents get truncated before they reach the model prompt.
const MAX_TEXT_CHARS: usize = 3000;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Client for an Ollama-compatible vision model endpoint.
///
/// The contract is deliberately loose: the model is asked a yes/no question
/// and any response containing "yes" counts as a match. Local models take
/// their time, so the request timeout is generous.
pub struct VisionClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    prompt: String,
}

impl VisionClient {
    pub fn new(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: DEFAULT_MODEL.to_string(),
            prompt: DEFAULT_PROMPT.to_string(),
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_prompt(mut self, prompt: &str) -> Self {
        self.prompt = prompt.to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Check whether the endpoint is up and serving models.
    pub async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    async fn generate(&self, prompt: &str, images: Vec<String>) -> Result<bool> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            images,
        };

        let resp = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(TriageError::EndpointError {
                status: status.as_u16(),
                message,
            });
        }

        let body: GenerateResponse = resp.json().await?;
        let verdict = body.response.to_lowercase().contains("yes");
        debug!(model = %self.model, response = %body.response.trim(), verdict, "model verdict");
        Ok(verdict)
    }

    /// Ask the model whether an image matches the triage prompt.
    pub async fn classify_image(&self, bytes: &[u8]) -> Result<bool> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        self.generate(&self.prompt, vec![encoded]).await
    }

    /// Ask the model whether extracted document text matches the prompt.
    pub async fn classify_text(&self, text: &str) -> Result<bool> {
        let excerpt: String = text.chars().take(MAX_TEXT_CHARS).collect();
        let prompt = format!("{}\n\nDocument text:\n{}", self.prompt, excerpt);
        self.generate(&prompt, Vec::new()).await
    }
}
