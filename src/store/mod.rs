//! The third-party workspace document store holding tracked records.
//!
//! Records are pre-existing; this crate only reads collections page by page
//! and patches single fields by id.

mod notion;
mod record;

pub use notion::NotionStore;
pub use record::{QueryPage, Record};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch one page of a collection. `cursor` is the previous page's `next_cursor`.
    async fn query_page(&self, collection_id: &str, cursor: Option<&str>) -> Result<QueryPage>;

    /// URL that patches the record with the given id.
    fn record_url(&self, record_id: &str) -> String;

    /// Send a patch payload to a record URL.
    async fn patch(&self, url: &str, payload: &Value) -> Result<()>;

    async fn fetch_block(&self, block_id: &str) -> Result<Value>;

    async fn patch_block(&self, block_id: &str, payload: &Value) -> Result<()>;
}

/// Read every record in a collection, following cursors while `has_more` is set.
///
/// A failure on the first page is an error (the store is unreachable). A
/// failure on a later page is logged and the pages read so far are returned.
pub async fn query_all(store: &dyn DocumentStore, collection_id: &str) -> Result<Vec<Record>> {
    let mut records = Vec::new();
    let mut cursor: Option<String> = None;
    let mut first = true;

    loop {
        let page = match store.query_page(collection_id, cursor.as_deref()).await {
            Ok(page) => page,
            Err(err) if first => return Err(err),
            Err(err) => {
                warn!(
                    collection = collection_id,
                    error = %err,
                    "query pagination interrupted; using partial results"
                );
                break;
            }
        };
        first = false;

        records.extend(page.results);
        match (page.has_more, page.next_cursor) {
            (true, Some(next)) => cursor = Some(next),
            (true, None) => {
                warn!(collection = collection_id, "has_more set without next_cursor");
                break;
            }
            (false, _) => break,
        }
    }

    Ok(records)
}
