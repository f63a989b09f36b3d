// =============================================================================
// External Collaborators
// =============================================================================
//
// The pipeline reaches the network only through these traits.  Every call is
// fallible and may block; the statistical core never depends on them, so it
// stays testable without network access.
//
// Concrete implementations:
// - BingSearch              (search provider, HTML result page)
// - HttpPageFetcher         (page text)
// - ChatCompletionsGenerator (narrative generator, Azure-style chat API)

pub mod bing;
pub mod chat;
pub mod page;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::SearchHit;

pub use bing::BingSearch;
pub use chat::ChatCompletionsGenerator;
pub use page::HttpPageFetcher;

/// Failures reported by collaborators.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CollaboratorError {
    #[error("search unavailable: {0}")]
    SearchUnavailable(String),

    #[error("fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("narrative generation failed: {0}")]
    Generation(String),
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, CollaboratorError>;
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Return the page at `url` flattened to plain text.
    async fn fetch(&self, url: &str) -> Result<String, CollaboratorError>;
}

#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, CollaboratorError>;
}

/// Shared HTTP client used by the concrete collaborators.
pub fn build_http_client(user_agent: &str, timeout_secs: u64) -> anyhow::Result<reqwest::Client> {
    use anyhow::Context;

    reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .context("failed to build reqwest client")
}
