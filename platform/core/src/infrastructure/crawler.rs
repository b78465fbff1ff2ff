// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Web fetching for URL ingest and RSS full-content extraction.
//!
//! Two paths: a direct download with browser-like headers for binary file
//! extensions, and a crawl-and-extract path for pages that strips a fixed
//! list of web-chrome phrases from the cleaned text and truncates at 50 000
//! characters. The original HTML and an image list ride along for storage.

use scraper::{Html, Selector};
use std::time::Duration;
use tracing::warn;
use url::Url;

/// Cleaned text cap; oversized pages bloat rows and embeddings alike.
pub const MAX_CLEANED_CONTENT: usize = 50_000;

const FETCH_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_DOWNLOAD_RETRIES: u32 = 4;

/// Status codes that usually mean "try again politely", not "give up".
const RETRYABLE_STATUS: &[u16] = &[403, 429, 503];

/// Navigation, social, legal-footer and site-specific phrases removed from
/// extracted page text.
const CHROME_PHRASES: &[&str] = &[
    "Share this article",
    "Follow us on",
    "Subscribe to",
    "Skip to content",
    "Accessibility Help",
    "Cookie Policy",
    "Privacy Policy",
    "Terms of Service",
    "Contact Us",
    "About Us",
    "Sign up",
    "Newsletter",
    "Related Articles",
    "Recommended",
    "Most Read",
    "Back to top",
    "Return to top",
    "Advertisement",
    "Sponsored",
    "Breadcrumb",
    "Pagination",
    "Submit a Tip",
    "Recent Posts",
    "Popular Posts",
    "Featured Articles",
    "You might also like",
    "Leave a comment",
    "Post a comment",
    "Tagged with",
    "Posted by",
    "Posted on",
    "Read more",
    "Continue reading",
    "RSS Feed",
];

#[derive(Debug, thiserror::Error)]
pub enum CrawlError {
    #[error("fetch error: {0}")]
    Fetch(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("retries exhausted for {url} (last status {status})")]
    RetriesExhausted { url: String, status: u16 },
}

/// Result of a crawl-and-extract pass.
#[derive(Debug, Clone)]
pub struct ExtractedPage {
    pub cleaned_text: String,
    pub original_html: String,
    pub images: Vec<String>,
    pub title: Option<String>,
}

/// File extensions that go through the direct-download path.
pub fn is_binary_url(url: &str) -> bool {
    let path = Url::parse(url).map(|u| u.path().to_lowercase()).unwrap_or_default();
    [
        ".pdf", ".docx", ".doc", ".epub", ".zip", ".png", ".jpg", ".jpeg", ".gif", ".mp3",
        ".mp4", ".srt",
    ]
    .iter()
    .any(|ext| path.ends_with(ext))
}

pub struct Crawler {
    client: reqwest::Client,
}

impl Default for Crawler {
    fn default() -> Self {
        Self::new()
    }
}

impl Crawler {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { client }
    }

    fn browser_headers(request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header(
                "User-Agent",
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/120.0 Safari/537.36",
            )
            .header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .header("Accept-Language", "en-US,en;q=0.9")
    }

    /// Direct download for binary targets. Retries with exponential backoff
    /// on 403/429/503.
    pub async fn download_binary(&self, url: &str) -> Result<Vec<u8>, CrawlError> {
        Url::parse(url).map_err(|e| CrawlError::InvalidUrl(e.to_string()))?;

        let mut last_status = 0u16;
        for attempt in 0..MAX_DOWNLOAD_RETRIES {
            let response = Self::browser_headers(self.client.get(url))
                .send()
                .await
                .map_err(|e| CrawlError::Fetch(e.to_string()))?;

            let status = response.status().as_u16();
            if response.status().is_success() {
                return response
                    .bytes()
                    .await
                    .map(|b| b.to_vec())
                    .map_err(|e| CrawlError::Fetch(e.to_string()));
            }

            last_status = status;
            if RETRYABLE_STATUS.contains(&status) && attempt + 1 < MAX_DOWNLOAD_RETRIES {
                let wait = Duration::from_secs(2u64.pow(attempt + 1));
                warn!(url, status, wait_secs = wait.as_secs(), "download rejected, retrying");
                tokio::time::sleep(wait).await;
                continue;
            }
            return Err(CrawlError::Fetch(format!("{url} returned status {status}")));
        }

        Err(CrawlError::RetriesExhausted {
            url: url.to_string(),
            status: last_status,
        })
    }

    /// Crawl a page and extract its readable text, original HTML, and
    /// image URLs.
    pub async fn crawl_page(&self, url: &str) -> Result<ExtractedPage, CrawlError> {
        let base = Url::parse(url).map_err(|e| CrawlError::InvalidUrl(e.to_string()))?;

        let response = Self::browser_headers(self.client.get(url))
            .send()
            .await
            .map_err(|e| CrawlError::Fetch(e.to_string()))?;
        if !response.status().is_success() {
            return Err(CrawlError::Fetch(format!(
                "{url} returned status {}",
                response.status()
            )));
        }
        let html = response
            .text()
            .await
            .map_err(|e| CrawlError::Fetch(e.to_string()))?;

        Ok(extract_page(&html, Some(&base)))
    }
}

/// Pure extraction step, split out so it is testable without a network.
pub fn extract_page(html: &str, base: Option<&Url>) -> ExtractedPage {
    let document = Html::parse_document(html);

    let title = Selector::parse("title")
        .ok()
        .and_then(|sel| document.select(&sel).next())
        .map(|t| t.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty());

    let images = Selector::parse("img[src]")
        .ok()
        .map(|sel| {
            document
                .select(&sel)
                .filter_map(|img| img.value().attr("src"))
                .filter_map(|src| match base {
                    Some(base) => base.join(src).ok().map(|u| u.to_string()),
                    None => Some(src.to_string()),
                })
                .collect()
        })
        .unwrap_or_default();

    // Prefer article/main content containers, fall back to body text.
    let text = ["article", "main", "body"]
        .iter()
        .find_map(|container| {
            let sel = Selector::parse(container).ok()?;
            let node = document.select(&sel).next()?;
            let text: String = node.text().collect::<Vec<_>>().join(" ");
            let trimmed = text.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
        .unwrap_or_default();

    ExtractedPage {
        cleaned_text: clean_extracted_content(&text),
        original_html: html.to_string(),
        images,
        title,
    }
}

/// Strip the enumerated chrome phrases, collapse whitespace, and cap the
/// length.
pub fn clean_extracted_content(content: &str) -> String {
    let mut cleaned = content.split_whitespace().collect::<Vec<_>>().join(" ");

    for phrase in CHROME_PHRASES {
        // Case-insensitive removal without regex-escaping surprises.
        let lowered = cleaned.to_lowercase();
        let needle = phrase.to_lowercase();
        if lowered.contains(&needle) {
            let mut result = String::with_capacity(cleaned.len());
            let mut rest = cleaned.as_str();
            let mut rest_lower = lowered.as_str();
            while let Some(pos) = rest_lower.find(&needle) {
                result.push_str(&rest[..pos]);
                rest = &rest[pos + needle.len()..];
                rest_lower = &rest_lower[pos + needle.len()..];
            }
            result.push_str(rest);
            cleaned = result;
        }
    }

    let mut cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.len() > MAX_CLEANED_CONTENT {
        let mut cut = MAX_CLEANED_CONTENT;
        while !cleaned.is_char_boundary(cut) {
            cut -= 1;
        }
        cleaned.truncate(cut);
        cleaned.push_str("...");
    }
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_url_detection() {
        assert!(is_binary_url("https://example.com/paper.pdf"));
        assert!(is_binary_url("https://example.com/a/b/book.EPUB"));
        assert!(!is_binary_url("https://example.com/article"));
        assert!(!is_binary_url("https://example.com/index.html"));
    }

    #[test]
    fn chrome_phrases_are_stripped() {
        let cleaned = clean_extracted_content(
            "Skip to content The actual article body. Subscribe to our Newsletter",
        );
        assert!(cleaned.contains("The actual article body."));
        assert!(!cleaned.to_lowercase().contains("skip to content"));
        assert!(!cleaned.to_lowercase().contains("newsletter"));
    }

    #[test]
    fn content_is_truncated_at_cap() {
        let long = "word ".repeat(20_000);
        let cleaned = clean_extracted_content(&long);
        assert!(cleaned.len() <= MAX_CLEANED_CONTENT + 3);
        assert!(cleaned.ends_with("..."));
    }

    #[test]
    fn extraction_prefers_article_and_collects_images() {
        let html = r#"
            <html><head><title>A Page</title></head>
            <body>
              <nav>Navigation stuff</nav>
              <article>The main story text.</article>
              <img src="/a.png"><img src="https://cdn.example.com/b.jpg">
            </body></html>
        "#;
        let base = Url::parse("https://example.com/post").unwrap();
        let page = extract_page(html, Some(&base));
        assert_eq!(page.title.as_deref(), Some("A Page"));
        assert!(page.cleaned_text.contains("The main story text."));
        assert_eq!(page.images.len(), 2);
        assert_eq!(page.images[0], "https://example.com/a.png");
    }
}
