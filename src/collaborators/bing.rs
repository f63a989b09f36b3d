// =============================================================================
// Bing Search Provider — scrapes the public HTML result page
// =============================================================================

use async_trait::async_trait;
use lazy_static::lazy_static;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument, warn};

use super::{CollaboratorError, SearchProvider};
use crate::types::SearchHit;

pub const DEFAULT_SEARCH_URL: &str = "https://www.bing.com/search?q=";

lazy_static! {
    static ref RESULT_SEL: Selector = Selector::parse("li.b_algo").unwrap();
    static ref TITLE_SEL: Selector = Selector::parse("h2").unwrap();
    static ref LINK_SEL: Selector = Selector::parse("a").unwrap();
    static ref SNIPPET_SEL: Selector = Selector::parse("p").unwrap();
}

#[derive(Clone)]
pub struct BingSearch {
    client: reqwest::Client,
    base_url: String,
}

impl BingSearch {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn query_url(&self, query: &str) -> String {
        format!("{}{}", self.base_url, query.trim().replace(' ', "+"))
    }
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Parse up to `limit` organic results from a Bing result page.
pub fn parse_results(html: &str, limit: usize) -> Vec<SearchHit> {
    let doc = Html::parse_document(html);

    doc.select(&RESULT_SEL)
        .take(limit)
        .map(|item| {
            let title = item
                .select(&TITLE_SEL)
                .next()
                .map(element_text)
                .unwrap_or_else(|| "No Title".to_string());
            let url = item
                .select(&LINK_SEL)
                .next()
                .and_then(|a| a.value().attr("href"))
                .unwrap_or("No Link")
                .to_string();
            let snippet = item
                .select(&SNIPPET_SEL)
                .next()
                .map(element_text)
                .unwrap_or_else(|| "No snippet available".to_string());
            SearchHit {
                title,
                url,
                snippet,
            }
        })
        .collect()
}

#[async_trait]
impl SearchProvider for BingSearch {
    #[instrument(skip(self), name = "bing::search")]
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, CollaboratorError> {
        let url = self.query_url(query);

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| CollaboratorError::SearchUnavailable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            warn!(%status, "search returned non-success status");
            return Err(CollaboratorError::SearchUnavailable(format!(
                "search returned {status}"
            )));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| CollaboratorError::SearchUnavailable(e.to_string()))?;

        let hits = parse_results(&body, limit);
        debug!(count = hits.len(), "search results parsed");
        Ok(hits)
    }
}
