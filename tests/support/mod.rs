#![allow(dead_code)]

use std::time::Duration;

use pricesync::http::{HttpClient, RetryPolicy};
use pricesync::store::NotionStore;
use secrecy::SecretString;
use serde_json::{json, Value};
use wiremock::MockServer;

pub const NOTION_KEY: &str = "secret_test_key";

/// Client with the default retry statuses but millisecond backoff.
pub fn fast_http() -> HttpClient {
    let retry = RetryPolicy {
        backoff: Duration::from_millis(1),
        ..RetryPolicy::default()
    };
    HttpClient::new(Duration::from_secs(5), retry).expect("http client")
}

/// No retries, and requests give up after `timeout`.
pub fn timeout_http(timeout: Duration) -> HttpClient {
    HttpClient::new(timeout, RetryPolicy::none()).expect("http client")
}

pub fn no_retry_http() -> HttpClient {
    HttpClient::new(Duration::from_secs(5), RetryPolicy::none()).expect("http client")
}

pub fn notion_store(server: &MockServer, http: HttpClient) -> NotionStore {
    notion_store_at(&server.uri(), http)
}

pub fn notion_store_at(base_url: &str, http: HttpClient) -> NotionStore {
    NotionStore::new(http, &SecretString::from(NOTION_KEY.to_string()))
        .expect("notion store")
        .with_base_url(base_url)
}

/// A record holding `symbol` in the given select property.
pub fn asset_page(
    id: &str,
    symbol_property: &str,
    symbol: Option<&str>,
    price: Option<f64>,
) -> Value {
    json!({
        "object": "page",
        "id": id,
        "parent": { "type": "database_id", "database_id": "db" },
        "properties": {
            symbol_property: select(symbol),
            "Price": { "type": "number", "number": price }
        }
    })
}

/// A select property holding `symbol`, or an empty selection.
pub fn select(symbol: Option<&str>) -> Value {
    json!({ "type": "select", "select": symbol.map(|name| json!({ "name": name })) })
}

/// A record whose total is a formula property.
pub fn formula_total_page(id: &str, total: f64) -> Value {
    json!({
        "object": "page",
        "id": id,
        "properties": {
            "Total": { "type": "formula", "formula": { "type": "number", "number": total } }
        }
    })
}

/// A record whose total is a plain number property.
pub fn number_total_page(id: &str, total: f64) -> Value {
    json!({
        "object": "page",
        "id": id,
        "properties": {
            "Total": { "type": "number", "number": total }
        }
    })
}

pub fn query_response(results: Vec<Value>, next_cursor: Option<&str>) -> Value {
    json!({
        "object": "list",
        "results": results,
        "has_more": next_cursor.is_some(),
        "next_cursor": next_cursor
    })
}

pub fn callout_block(id: &str, label: &str, value: &str) -> Value {
    json!({
        "object": "block",
        "id": id,
        "type": "callout",
        "callout": {
            "rich_text": [
                { "type": "text", "text": { "content": label } },
                { "type": "text", "text": { "content": value } }
            ]
        }
    })
}
