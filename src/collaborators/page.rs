// =============================================================================
// HTTP Page Fetcher — download a page and flatten it to text
// =============================================================================

use async_trait::async_trait;
use scraper::{Html, Node};
use tracing::{debug, instrument};

use super::{CollaboratorError, PageFetcher};

/// Elements whose text is never page content.
const SKIPPED_ELEMENTS: [&str; 3] = ["script", "style", "noscript"];

#[derive(Clone)]
pub struct HttpPageFetcher {
    client: reqwest::Client,
}

impl HttpPageFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

/// One trimmed text node per line, in document order.
pub fn html_to_text(html: &str) -> String {
    let doc = Html::parse_document(html);
    let mut lines = Vec::new();

    for node in doc.tree.root().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let skipped = node
            .parent()
            .and_then(|p| p.value().as_element().map(|e| e.name()))
            .is_some_and(|name| SKIPPED_ELEMENTS.contains(&name));
        if skipped {
            continue;
        }
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            lines.push(trimmed.to_string());
        }
    }

    lines.join("\n")
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    #[instrument(skip(self), name = "page::fetch")]
    async fn fetch(&self, url: &str) -> Result<String, CollaboratorError> {
        let fetch_err = |reason: String| CollaboratorError::Fetch {
            url: url.to_string(),
            reason,
        };

        let body = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| fetch_err(e.to_string()))?
            .text()
            .await
            .map_err(|e| fetch_err(e.to_string()))?;

        let text = html_to_text(&body);
        debug!(bytes = body.len(), text_len = text.len(), "page flattened");
        Ok(text)
    }
}
