//! reqwest-backed page fetcher and source prober.
//!
//! HTML is reduced to visible text before it is handed to a backend.
//! No JavaScript rendering; static pages only.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::traits::{PageFetcher, ProbeOutcome, SourceProber};
use crate::types::TaskTarget;

/// Cap on text handed to a backend from one target.
pub const DEFAULT_MAX_CHARS: usize = 40_000;

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Fetches pages over HTTP and documents from disk.
pub struct HttpFetcher {
    client: reqwest::Client,
    max_chars: usize,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            max_chars: DEFAULT_MAX_CHARS,
        })
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }

    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Network {
                url: url.to_string(),
                source: Box::new(e),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("html"));

        let body = response.text().await.map_err(|e| FetchError::Network {
            url: url.to_string(),
            source: Box::new(e),
        })?;

        Ok(if is_html { html_to_text(&body) } else { body })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, target: &TaskTarget) -> Result<String, FetchError> {
        let text = match target {
            TaskTarget::Url(url) => self.get_text(url).await?,
            TaskTarget::Document(reference) if is_remote(reference) => {
                self.get_text(reference).await?
            }
            TaskTarget::Document(path) => {
                tokio::fs::read_to_string(path)
                    .await
                    .map_err(|source| FetchError::Io {
                        path: path.clone(),
                        source,
                    })?
            }
        };

        debug!(target = %target, chars = text.len(), "Fetched target content");
        Ok(truncate_chars(text, self.max_chars))
    }
}

#[async_trait]
impl SourceProber for HttpFetcher {
    async fn probe(&self, url: &str) -> ProbeOutcome {
        match self.get_text(url).await {
            Ok(text) => ProbeOutcome::Content(text),
            Err(FetchError::Status { status, .. }) => {
                warn!(url, status, "Source probe returned error status");
                ProbeOutcome::Unreachable {
                    status: Some(status),
                }
            }
            Err(e) => {
                warn!(url, error = %e, "Source probe failed");
                ProbeOutcome::Unreachable { status: None }
            }
        }
    }
}

fn is_remote(reference: &str) -> bool {
    reference.starts_with("http://") || reference.starts_with("https://")
}

fn truncate_chars(text: String, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text,
    }
}

/// Visible text of an HTML document, one text run per line.
///
/// Prefers the main content area when the page marks one.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);

    let root = ["main", "article", "[role='main']", "body"]
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .find_map(|selector| document.select(&selector).next())
        .unwrap_or_else(|| document.root_element());

    let mut lines = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(|p| p.value().as_element())
            .is_some_and(|e| matches!(e.name(), "script" | "style" | "noscript"));
        let text = text.trim();
        if !hidden && !text.is_empty() {
            lines.push(text);
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_to_text_prefers_main_and_skips_scripts() {
        let html = r#"
            <html><head><title>Seed Fund</title><style>body{}</style></head>
            <body>
              <nav>Home | About</nav>
              <main>
                <h1>Startup India Seed Fund Scheme</h1>
                <script>var tracking = 1;</script>
                <p>Up to Rs 50 lakh for early stage startups.</p>
              </main>
            </body></html>"#;

        let text = html_to_text(html);
        assert_eq!(
            text,
            "Startup India Seed Fund Scheme\nUp to Rs 50 lakh for early stage startups."
        );
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("abcdef".into(), 3), "abc");
        assert_eq!(truncate_chars("ab".into(), 3), "ab");
    }

    #[tokio::test]
    async fn test_missing_document_is_io_error() {
        let fetcher = HttpFetcher::new().unwrap();
        let err = fetcher
            .fetch(&TaskTarget::Document("/nonexistent/grant-call.txt".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Io { .. }));
    }
}
