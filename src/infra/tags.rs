//! Remote tag listing
//!
//! Lists a repository's tags through the GitHub REST API, following pages
//! until an empty one. The list is fetched fresh on every run.

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::config::{defaults, urls};

/// Tag listing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TagListError {
    /// Request could not be sent or the body could not be read
    #[error("Network error fetching '{url}': {error}")]
    Network { url: String, error: String },

    /// Server answered with an error status
    #[error("'{url}' returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    /// Body was not a tag list
    #[error("Unexpected response from '{url}': {error}")]
    InvalidResponse { url: String, error: String },
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

/// GitHub tag listing client
#[derive(Debug, Clone)]
pub struct TagClient {
    client: reqwest::Client,
    api_base: String,
    per_page: usize,
    max_pages: usize,
}

impl TagClient {
    /// Client for the public GitHub API
    pub fn new() -> Self {
        Self::with_base_url(urls::GITHUB_API)
    }

    /// Client for a custom API base URL
    pub fn with_base_url(api_base: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            per_page: defaults::TAGS_PER_PAGE,
            max_pages: defaults::MAX_TAG_PAGES,
        }
    }

    /// Override page size and page limit
    #[must_use]
    pub fn with_paging(mut self, per_page: usize, max_pages: usize) -> Self {
        self.per_page = per_page.max(1);
        self.max_pages = max_pages.max(1);
        self
    }

    /// API base URL
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// All tags of `repo` (`owner/name`), in the order the API returns them
    pub async fn list_tags(&self, repo: &str) -> Result<Vec<String>, TagListError> {
        let mut tags = Vec::new();

        for page in 1..=self.max_pages {
            let names = self.fetch_page(repo, page).await?;
            let count = names.len();
            tags.extend(names);
            if count < self.per_page {
                break;
            }
        }

        debug!("Fetched {} tags for {repo}", tags.len());
        Ok(tags)
    }

    async fn fetch_page(&self, repo: &str, page: usize) -> Result<Vec<String>, TagListError> {
        let url = format!("{}/repos/{repo}/tags", self.api_base);
        let response = self
            .client
            .get(&url)
            .query(&[("per_page", self.per_page), ("page", page)])
            .header(
                "User-Agent",
                format!("{}/{}", defaults::APP_NAME, env!("CARGO_PKG_VERSION")),
            )
            .header("Accept", "application/vnd.github.v3+json")
            .send()
            .await
            .map_err(|e| TagListError::Network {
                url: url.clone(),
                error: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(TagListError::HttpStatus {
                url,
                status: response.status().as_u16(),
            });
        }

        let entries: Vec<TagEntry> =
            response
                .json()
                .await
                .map_err(|e| TagListError::InvalidResponse {
                    url: url.clone(),
                    error: e.to_string(),
                })?;
        Ok(entries.into_iter().map(|e| e.name).collect())
    }
}

impl Default for TagClient {
    fn default() -> Self {
        Self::new()
    }
}
