use crate::error::{Result, ScrapeError};
use std::time::Duration;
use tracing::debug;

/// HTTP client for a headless render service.
///
/// The service exposes two endpoints: `POST /content` returns fully rendered
/// HTML after performing the requested number of scroll passes (so lazy-loaded
/// anchors are present in the markup), and `POST /pdf` prints a page to PDF
/// bytes. All page interaction happens inside the service; this client only
/// speaks HTTP, with a hard timeout on every request.
pub struct RenderClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    scroll_wait_ms: u64,
}

impl RenderClient {
    pub fn new(base_url: &str) -> Self {
        Self::with_timeout(base_url, 30)
    }

    pub fn with_timeout(base_url: &str, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(timeout_secs.div_ceil(2)))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
            scroll_wait_ms: 2000,
        }
    }

    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    /// How long the service settles after each scroll pass before the markup
    /// is read back.
    pub fn with_scroll_wait_ms(mut self, ms: u64) -> Self {
        self.scroll_wait_ms = ms;
        self
    }

    fn endpoint(&self, path: &str) -> String {
        let mut endpoint = format!("{}{}", self.base_url, path);
        if let Some(ref token) = self.token {
            endpoint.push_str(&format!("?token={token}"));
        }
        endpoint
    }

    /// Fetch rendered HTML for `url` after `scrolls` scroll passes.
    pub async fn content(&self, url: &str, scrolls: usize) -> Result<String> {
        debug!(url, scrolls, "requesting rendered content");
        let body = serde_json::json!({
            "url": url,
            "scrolls": scrolls,
            "wait_ms": self.scroll_wait_ms,
        });

        let resp = self
            .client
            .post(self.endpoint("/content"))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(ScrapeError::RenderError {
                status: status.as_u16(),
                message,
            });
        }

        Ok(resp.text().await?)
    }

    /// Print `url` to PDF bytes (A4, no margins, backgrounds on).
    pub async fn pdf(&self, url: &str) -> Result<Vec<u8>> {
        debug!(url, "requesting PDF print");
        let body = serde_json::json!({
            "url": url,
            "options": {
                "printBackground": true,
                "landscape": false,
                "paperWidth": 8.27,
                "paperHeight": 11.69,
                "marginTop": 0,
                "marginBottom": 0,
                "marginLeft": 0,
                "marginRight": 0,
                "preferCSSPageSize": true,
            },
        });

        let resp = self
            .client
            .post(self.endpoint("/pdf"))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(ScrapeError::RenderError {
                status: status.as_u16(),
                message,
            });
        }

        Ok(resp.bytes().await?.to_vec())
    }
}
