//! Notion API implementation of [`DocumentStore`].

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};

use super::{DocumentStore, QueryPage};
use crate::http::{HttpClient, Request};

const NOTION_API_BASE: &str = "https://api.notion.com/v1";
const NOTION_VERSION: &str = "2022-06-28";

pub struct NotionStore {
    http: HttpClient,
    base_url: String,
    headers: HeaderMap,
}

impl NotionStore {
    pub fn new(http: HttpClient, api_key: &SecretString) -> Result<Self> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key.expose_secret()))
            .context("Notion API key is not a valid header value")?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("Notion-Version", HeaderValue::from_static(NOTION_VERSION));

        Ok(Self {
            http,
            base_url: NOTION_API_BASE.to_string(),
            headers,
        })
    }

    /// Point the store at a different API root (e.g. a mock server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn block_url(&self, block_id: &str) -> String {
        format!("{}/blocks/{}", self.base_url, block_id)
    }
}

#[async_trait]
impl DocumentStore for NotionStore {
    async fn query_page(&self, collection_id: &str, cursor: Option<&str>) -> Result<QueryPage> {
        let url = format!("{}/databases/{}/query", self.base_url, collection_id);
        let body = match cursor {
            Some(cursor) => json!({ "start_cursor": cursor }),
            None => json!({}),
        };

        let response = self
            .http
            .send(Request::new(&Method::POST, &url).headers(&self.headers).json(&body))
            .await?
            .ok_or_else(|| anyhow!("empty query response for collection {collection_id}"))?;

        serde_json::from_value(response)
            .with_context(|| {
                format!("Failed to parse query response for collection {collection_id}")
            })
    }

    fn record_url(&self, record_id: &str) -> String {
        format!("{}/pages/{}", self.base_url, record_id)
    }

    async fn patch(&self, url: &str, payload: &Value) -> Result<()> {
        self.http
            .send(Request::new(&Method::PATCH, url).headers(&self.headers).json(payload))
            .await?;
        Ok(())
    }

    async fn fetch_block(&self, block_id: &str) -> Result<Value> {
        let url = self.block_url(block_id);
        self.http
            .send(Request::new(&Method::GET, &url).headers(&self.headers))
            .await?
            .ok_or_else(|| anyhow!("empty response for block {block_id}"))
    }

    async fn patch_block(&self, block_id: &str, payload: &Value) -> Result<()> {
        let url = self.block_url(block_id);
        self.patch(&url, payload).await
    }
}
