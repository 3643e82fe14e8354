//! Article content extraction.
//!
//! Downloads an article page and reduces it to plain text. The text root is
//! the first `<article>`, falling back to `<main>` and then `<body>`; page
//! chrome such as navigation, footers, and scripts is skipped.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, USER_AGENT};
use scraper::{ElementRef, Html, Node, Selector};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::error::{IngestionError, Result};
use crate::http_client::{ServiceClient, SharedHttpClient};

const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";
const BROWSER_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Elements whose text never belongs to the article body
const SKIPPED_ELEMENTS: &[&str] = &[
    "script", "style", "noscript", "nav", "footer", "header", "aside", "form", "svg", "template",
];

/// Articles with less text than this are treated as teaser cards
const MIN_ARTICLE_CHARS: usize = 200;

static ARTICLE_SELECTOR: Lazy<Option<Selector>> = Lazy::new(|| Selector::parse("article").ok());

static FALLBACK_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    ["main", "body"]
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .collect()
});

/// Turns a candidate URL into article text
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    /// Fails with `ExtractionFailed` for unreachable pages, non-HTML
    /// responses, and pages without a recognizable article body.
    async fn extract(&self, url: &str) -> Result<String>;
}

/// Plain text of the page's article body, one text run per line
///
/// The `<article>` with the most text wins. Pages whose articles are all
/// teaser-sized fall back to `<main>`, then `<body>`.
pub fn article_text(html: &str) -> String {
    let document = Html::parse_document(html);

    let best_article = ARTICLE_SELECTOR
        .as_ref()
        .into_iter()
        .flat_map(|selector| document.select(selector))
        .map(text_lines)
        .max_by_key(|lines| char_count(lines))
        .filter(|lines| char_count(lines) >= MIN_ARTICLE_CHARS);

    if let Some(lines) = best_article {
        return lines.join("\n");
    }

    let root = FALLBACK_SELECTORS
        .iter()
        .find_map(|selector| document.select(selector).next())
        .unwrap_or_else(|| document.root_element());

    text_lines(root).join("\n")
}

fn text_lines(element: ElementRef<'_>) -> Vec<String> {
    let mut lines = Vec::new();
    collect_text(element, &mut lines);
    lines
}

fn char_count(lines: &[String]) -> usize {
    lines.iter().map(|line| line.chars().count()).sum()
}

fn collect_text(element: ElementRef<'_>, lines: &mut Vec<String>) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                lines.extend(
                    text.lines()
                        .map(str::trim)
                        .filter(|line| !line.is_empty())
                        .map(String::from),
                );
            }
            Node::Element(el) if SKIPPED_ELEMENTS.contains(&el.name()) => {}
            Node::Element(_) => {
                if let Some(child_element) = ElementRef::wrap(child) {
                    collect_text(child_element, lines);
                }
            }
            _ => {}
        }
    }
}

fn is_html_content_type(content_type: &str) -> bool {
    let mime = content_type.split(';').next().unwrap_or_default().trim();
    mime.eq_ignore_ascii_case("text/html") || mime.eq_ignore_ascii_case("application/xhtml+xml")
}

/// Fetches pages over HTTP and parses them with `scraper`
pub struct HtmlExtractor {
    client: ServiceClient,
    min_content_chars: usize,
}

impl HtmlExtractor {
    pub fn new(http_client: Arc<SharedHttpClient>, rate_limit_rpm: u32, min_content_chars: usize) -> Self {
        Self {
            client: ServiceClient::new(http_client, "publisher", rate_limit_rpm),
            min_content_chars,
        }
    }

    pub fn from_config(http_client: Arc<SharedHttpClient>, config: &Config) -> Self {
        Self::new(http_client, config.extract_rate_limit_rpm, config.min_content_chars)
    }

    async fn fetch_html(&self, url: &str) -> Result<String> {
        let request = self
            .client
            .get(url)
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .header(ACCEPT, BROWSER_ACCEPT)
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.5");

        let response = self
            .client
            .send(request)
            .await
            .map_err(|e| IngestionError::extraction(url, e.to_string()))?;

        if let Some(content_type) = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
        {
            if !is_html_content_type(content_type) {
                return Err(IngestionError::extraction(
                    url,
                    format!("non-HTML content type {}", content_type),
                ));
            }
        }

        response
            .text()
            .await
            .map_err(|e| IngestionError::extraction(url, e.to_string()))
    }
}

#[async_trait]
impl ContentExtractor for HtmlExtractor {
    #[instrument(skip(self))]
    async fn extract(&self, url: &str) -> Result<String> {
        debug!("Fetching article content");
        let html = self.fetch_html(url).await?;
        let text = article_text(&html);
        let chars = text.chars().count();

        if chars < self.min_content_chars {
            warn!(chars, min = self.min_content_chars, "Extracted content too short");
            return Err(IngestionError::extraction(
                url,
                format!("no recognizable article body ({} chars)", chars),
            ));
        }

        info!(chars, "Extracted article content");
        Ok(text)
    }
}
