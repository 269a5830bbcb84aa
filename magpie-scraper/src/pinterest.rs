use crate::discover::DiscoverySource;
use crate::error::{Result, ScrapeError};
use crate::extract::{IdExtractor, ItemId};
use crate::materialize::{write_artifact, Artifact, Materializer};
use crate::render::RenderClient;
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use url::Url;

const PINTEREST_BASE: &str = "https://www.pinterest.com";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// The canonical pin ID extractor: `/pin/<digits>`, slug forms, and the bare
/// digit-run fallback for pinimg CDN URLs.
pub fn pin_extractor() -> IdExtractor {
    IdExtractor::new("pin")
}

fn pin_anchors(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    // Selector is valid by construction.
    let selector = Selector::parse(r#"a[href*="/pin/"]"#).expect("static selector");
    let base = Url::parse(PINTEREST_BASE).expect("static url");

    document
        .select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| base.join(href).ok())
        .map(String::from)
        .collect()
}

/// Discovers pin URLs by rendering Pinterest search result pages.
///
/// Later passes ask the render service for more scroll cycles, so each pass
/// sees a longer slice of the infinite-scroll feed.
pub struct PinterestSource {
    render: Arc<RenderClient>,
}

impl PinterestSource {
    pub fn new(render: Arc<RenderClient>) -> Self {
        Self { render }
    }
}

#[async_trait]
impl DiscoverySource for PinterestSource {
    async fn pass(&self, query: &str, pass_no: usize) -> Result<Vec<String>> {
        let url = Url::parse_with_params(
            &format!("{PINTEREST_BASE}/search/pins/"),
            [("q", query)],
        )
        .map_err(|e| ScrapeError::InvalidUrl(e.to_string()))?;

        let html = self.render.content(url.as_str(), pass_no + 1).await?;
        let urls = pin_anchors(&html);
        debug!(pass = pass_no, anchors = urls.len(), "pinterest search pass");
        Ok(urls)
    }

    async fn related_pass(&self, id: &ItemId, pass_no: usize) -> Result<Vec<String>> {
        let url = format!("{PINTEREST_BASE}/pin/{id}/");
        let html = self.render.content(&url, pass_no + 1).await?;
        let urls = pin_anchors(&html);
        debug!(id = %id, pass = pass_no, anchors = urls.len(), "pinterest related pass");
        Ok(urls)
    }
}

/// Materializes a pin as `<out_dir>/<id>.jpg`.
///
/// Renders the pin page, reads the `og:image` meta tag, then tries to trade
/// the 600px CDN variant up to the original resolution with a HEAD probe,
/// falling back to 1200px when the original is gone.
pub struct PinterestMaterializer {
    render: Arc<RenderClient>,
    http: reqwest::Client,
    out_dir: PathBuf,
}

impl PinterestMaterializer {
    pub fn new(render: Arc<RenderClient>, out_dir: PathBuf) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("reqwest client");
        Self { render, http, out_dir }
    }

    async fn best_image_url(&self, image_url: &str) -> String {
        if !image_url.contains("/600x/") {
            return image_url.to_string();
        }
        let originals = image_url.replace("/600x/", "/originals/");
        match self.http.head(&originals).send().await {
            Ok(resp) if resp.status().is_success() => originals,
            _ => {
                debug!(url = %image_url, "originals variant unavailable, using 1200x");
                image_url.replace("/600x/", "/1200x/")
            }
        }
    }
}

fn og_image(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(r#"meta[property="og:image"]"#).expect("static selector");
    document
        .select(&selector)
        .filter_map(|m| m.value().attr("content"))
        .map(String::from)
        .next()
}

#[async_trait]
impl Materializer for PinterestMaterializer {
    fn artifact_path(&self, id: &ItemId) -> PathBuf {
        self.out_dir.join(format!("{id}.jpg"))
    }

    async fn materialize(&self, id: &ItemId) -> Result<Artifact> {
        let page_url = format!("{PINTEREST_BASE}/pin/{id}/");
        let html = self.render.content(&page_url, 1).await?;

        let image_url = og_image(&html)
            .ok_or_else(|| ScrapeError::ParseError(format!("no og:image on pin {id}")))?;
        let image_url = self.best_image_url(&image_url).await;

        let resp = self
            .http
            .get(&image_url)
            .header(reqwest::header::REFERER, PINTEREST_BASE)
            .send()
            .await?
            .error_for_status()?;
        let bytes = resp.bytes().await?;

        write_artifact(id, &self.artifact_path(id), &bytes)
    }
}
