mod support;

use anyhow::Result;
use pricesync::store::{query_all, DocumentStore};
use serde_json::json;
use support::{asset_page, fast_http, no_retry_http, notion_store, query_response, NOTION_KEY};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn query_follows_cursor_until_exhausted() -> Result<()> {
    let server = MockServer::start().await;
    let store = notion_store(&server, fast_http());

    Mock::given(method("POST"))
        .and(path("/databases/crypto-db/query"))
        .and(body_json(json!({})))
        .respond_with(ResponseTemplate::new(200).set_body_json(query_response(
            vec![asset_page("p1", "Coin", Some("BTC"), None)],
            Some("cursor-1"),
        )))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/databases/crypto-db/query"))
        .and(body_json(json!({ "start_cursor": "cursor-1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(query_response(
            vec![
                asset_page("p2", "Coin", Some("ETH"), None),
                asset_page("p3", "Coin", None, None),
            ],
            None,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let records = query_all(&store, "crypto-db").await?;

    let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["p1", "p2", "p3"]);
    assert_eq!(server.received_requests().await.unwrap_or_default().len(), 2);

    Ok(())
}

#[tokio::test]
async fn requests_carry_auth_and_version_headers() -> Result<()> {
    let server = MockServer::start().await;
    let store = notion_store(&server, fast_http());

    Mock::given(method("POST"))
        .and(path("/databases/db/query"))
        .and(header("authorization", format!("Bearer {NOTION_KEY}").as_str()))
        .and(header("Notion-Version", "2022-06-28"))
        .respond_with(ResponseTemplate::new(200).set_body_json(query_response(Vec::new(), None)))
        .expect(1)
        .mount(&server)
        .await;

    let records = query_all(&store, "db").await?;
    assert!(records.is_empty());

    Ok(())
}

#[tokio::test]
async fn first_page_failure_is_an_error() {
    let server = MockServer::start().await;
    let store = notion_store(&server, no_retry_http());

    Mock::given(method("POST"))
        .and(path("/databases/db/query"))
        .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
        .mount(&server)
        .await;

    let result = query_all(&store, "db").await;
    assert!(result.is_err(), "unreachable collection must not look empty");
}

#[tokio::test]
async fn later_page_failure_keeps_partial_results() -> Result<()> {
    let server = MockServer::start().await;
    let store = notion_store(&server, no_retry_http());

    Mock::given(method("POST"))
        .and(path("/databases/db/query"))
        .and(body_json(json!({})))
        .respond_with(ResponseTemplate::new(200).set_body_json(query_response(
            vec![asset_page("p1", "Stock", Some("AAPL"), None)],
            Some("cursor-1"),
        )))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/databases/db/query"))
        .and(body_json(json!({ "start_cursor": "cursor-1" })))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let records = query_all(&store, "db").await?;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, "p1");

    Ok(())
}

#[tokio::test]
async fn patch_targets_record_url() -> Result<()> {
    let server = MockServer::start().await;
    let store = notion_store(&server, fast_http());
    let payload = json!({ "properties": { "Price": { "number": 42.0 } } });

    Mock::given(method("PATCH"))
        .and(path("/pages/page-1"))
        .and(body_json(payload.clone()))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "object": "page", "id": "page-1" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let url = store.record_url("page-1");
    assert_eq!(url, format!("{}/pages/page-1", server.uri()));
    store.patch(&url, &payload).await?;

    Ok(())
}
