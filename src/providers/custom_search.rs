//! Google Custom Search JSON API

use appraiser_common::Listing;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{check_status, http_client, require_key, ProviderError, SearchProvider};

const CUSTOM_SEARCH_URL: &str = "https://www.googleapis.com/customsearch/v1";

/// APIが1回で返せる最大件数
const MAX_NUM: usize = 10;

pub struct CustomSearchProvider {
    api_key: Option<String>,
    engine_id: Option<String>,
    endpoint: String,
    http: Client,
}

impl CustomSearchProvider {
    pub fn new(api_key: Option<String>, engine_id: Option<String>) -> Self {
        Self {
            api_key,
            engine_id,
            endpoint: CUSTOM_SEARCH_URL.to_string(),
            http: http_client(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }
}

#[async_trait]
impl SearchProvider for CustomSearchProvider {
    async fn search(
        &self,
        query: &str,
        num_results: usize,
    ) -> Result<Vec<Listing>, ProviderError> {
        let api_key = require_key(&self.api_key, self.name())?;
        let engine_id = require_key(&self.engine_id, self.name())?;
        let num = num_results.clamp(1, MAX_NUM).to_string();

        debug!(query, num = %num, "Custom search request");

        let response = self
            .http
            .get(&self.endpoint)
            .query(&[("key", api_key), ("cx", engine_id), ("q", query), ("num", num.as_str())])
            .send()
            .await?;
        let response = check_status(response).await?;

        let body: SearchResponse = response.json().await?;
        Ok(body
            .items
            .into_iter()
            .take(num_results)
            .map(SearchItem::into_listing)
            .collect())
    }

    fn name(&self) -> &'static str {
        "custom-search"
    }
}

/// itemsキーは0件の時に省略される
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchResponse {
    items: Vec<SearchItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchItem {
    title: Option<String>,
    link: Option<String>,
    snippet: Option<String>,
}

impl SearchItem {
    fn into_listing(self) -> Listing {
        Listing {
            title: self.title.unwrap_or_default(),
            url: self.link.unwrap_or_default(),
            snippet: self.snippet.unwrap_or_default(),
        }
    }
}
