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

const GOOGLE_SEARCH: &str = "https://www.google.com/search";
const RESULTS_PER_PAGE: usize = 10;

/// Document ID extractor for `scribd.com/document/<id>` URLs. Scribd IDs run
/// shorter than pin IDs, and the bare fallback stays off because search
/// result URLs are full of unrelated digit runs.
pub fn document_extractor() -> IdExtractor {
    IdExtractor::with_digit_range("document", 6, 20).without_bare_fallback()
}

/// Unwrap a Google result href. Organic results arrive as `/url?q=<target>`;
/// direct links pass through unchanged.
fn unwrap_result_href(href: &str, base: &Url) -> Option<Url> {
    let url = base.join(href).ok()?;
    if url.path() == "/url" {
        let target = url
            .query_pairs()
            .find(|(k, _)| k == "q")
            .map(|(_, v)| v.into_owned())?;
        Url::parse(&target).ok()
    } else {
        Some(url)
    }
}

fn document_links(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("a[href]").expect("static selector");
    let base = Url::parse(GOOGLE_SEARCH).expect("static url");

    document
        .select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| unwrap_result_href(href, &base))
        .filter(|url| {
            url.host_str()
                .is_some_and(|h| h == "scribd.com" || h.ends_with(".scribd.com"))
                && (url.path().starts_with("/document/") || url.path().starts_with("/doc/"))
        })
        .map(|mut url| {
            url.set_query(None);
            url.set_fragment(None);
            url.into()
        })
        .collect()
}

/// Discovers Scribd document URLs through Google `site:` searches.
///
/// Pass 0 runs the plain query, pass 1 retries with the phrase quoted, and
/// later passes page through plain-query results.
pub struct ScribdSource {
    render: Arc<RenderClient>,
}

impl ScribdSource {
    pub fn new(render: Arc<RenderClient>) -> Self {
        Self { render }
    }

    fn search_url(query: &str, pass_no: usize) -> Result<Url> {
        let q = if pass_no == 1 {
            format!("site:scribd.com \"{query}\"")
        } else {
            format!("site:scribd.com {query}")
        };
        let start = if pass_no >= 2 {
            (pass_no - 1) * RESULTS_PER_PAGE
        } else {
            0
        };
        Url::parse_with_params(GOOGLE_SEARCH, [("q", q.as_str()), ("start", &start.to_string())])
            .map_err(|e| ScrapeError::InvalidUrl(e.to_string()))
    }
}

#[async_trait]
impl DiscoverySource for ScribdSource {
    async fn pass(&self, query: &str, pass_no: usize) -> Result<Vec<String>> {
        let url = Self::search_url(query, pass_no)?;
        let html = self.render.content(url.as_str(), 0).await?;
        let urls = document_links(&html);
        debug!(pass = pass_no, results = urls.len(), "scribd search pass");
        Ok(urls)
    }
}

/// Materializes a document as `<out_dir>/<query_slug>_<id>.pdf` by printing
/// the public embed viewer through the render service.
pub struct ScribdMaterializer {
    render: Arc<RenderClient>,
    out_dir: PathBuf,
    query_slug: String,
}

impl ScribdMaterializer {
    pub fn new(render: Arc<RenderClient>, out_dir: PathBuf, query: &str) -> Self {
        let query_slug = query
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("_")
            .to_lowercase();
        Self { render, out_dir, query_slug }
    }
}

#[async_trait]
impl Materializer for ScribdMaterializer {
    fn artifact_path(&self, id: &ItemId) -> PathBuf {
        self.out_dir.join(format!("{}_{id}.pdf", self.query_slug))
    }

    async fn materialize(&self, id: &ItemId) -> Result<Artifact> {
        let embed_url = format!("https://www.scribd.com/embeds/{id}/content");
        let bytes = self.render.pdf(&embed_url).await?;

        if !bytes.starts_with(b"%PDF-") {
            return Err(ScrapeError::ParseError(format!(
                "render service returned a non-PDF payload for document {id}"
            )));
        }

        write_artifact(id, &self.artifact_path(id), &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwraps_google_redirect_links() {
        let html = r#"
            <a href="/url?q=https://www.scribd.com/document/123456789/some-title&sa=U">r</a>
            <a href="https://www.scribd.com/document/987654321/direct?from=embed">d</a>
            <a href="/url?q=https://example.com/not-scribd">n</a>
            <a href="https://www.scribd.com/search?query=foo">s</a>
        "#;
        let urls = document_links(html);
        assert_eq!(
            urls,
            vec![
                "https://www.scribd.com/document/123456789/some-title".to_string(),
                "https://www.scribd.com/document/987654321/direct".to_string(),
            ]
        );
    }

    #[test]
    fn quotes_query_on_second_pass_and_pages_afterwards() {
        let p0 = ScribdSource::search_url("tax form", 0).unwrap();
        assert!(p0.as_str().contains("start=0"));
        assert!(!p0.as_str().contains("%22"));

        let p1 = ScribdSource::search_url("tax form", 1).unwrap();
        assert!(p1.as_str().contains("%22tax+form%22") || p1.as_str().contains("%22tax%20form%22"));

        let p3 = ScribdSource::search_url("tax form", 3).unwrap();
        assert!(p3.as_str().contains("start=20"));
    }

    #[test]
    fn document_extractor_handles_short_ids_without_bare_fallback() {
        let ex = document_extractor();
        assert_eq!(
            ex.extract("https://www.scribd.com/document/654321/title").map(|i| i.to_string()),
            Some("654321".to_string())
        );
        assert_eq!(ex.extract("https://www.google.com/search?q=foo&start=1234567890"), None);
    }
}
