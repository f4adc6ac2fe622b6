mod support;

use std::sync::Arc;
use std::time::Duration;

use pricesync::store::DocumentStore;
use pricesync::sync::{DispatchSummary, Dispatcher, RateLimiter, UpdateJob};
use serde_json::json;
use support::{fast_http, no_retry_http, notion_store, notion_store_at, timeout_http};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn job(store: &dyn DocumentStore, id: &str, price: f64) -> UpdateJob {
    UpdateJob {
        record_id: id.to_string(),
        url: store.record_url(id),
        payload: json!({ "properties": { "Price": { "number": price } } }),
        symbol: "BTC".to_string(),
        price,
    }
}

fn limiter() -> Arc<RateLimiter> {
    Arc::new(RateLimiter::new(1000.0, 10).expect("limiter"))
}

#[tokio::test]
async fn rejected_update_does_not_stop_siblings() {
    let server = MockServer::start().await;
    let store = Arc::new(notion_store(&server, no_retry_http()));

    for (id, status) in [("p1", 200), ("p2", 400), ("p3", 200)] {
        Mock::given(method("PATCH"))
            .and(path(format!("/pages/{id}")))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({ "id": id })))
            .expect(1)
            .mount(&server)
            .await;
    }

    let jobs = vec![
        job(store.as_ref(), "p1", 1.0),
        job(store.as_ref(), "p2", 2.0),
        job(store.as_ref(), "p3", 3.0),
    ];
    let summary = Dispatcher::new(store, limiter()).dispatch(jobs).await;

    assert_eq!(summary, DispatchSummary { ok: 2, fail: 1 });
    assert_eq!(server.received_requests().await.unwrap_or_default().len(), 3);
}

#[tokio::test]
async fn transient_status_is_retried() {
    let server = MockServer::start().await;
    let store = Arc::new(notion_store(&server, fast_http()));

    Mock::given(method("PATCH"))
        .and(path("/pages/r1"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/pages/r1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "r1" })))
        .expect(1)
        .mount(&server)
        .await;

    let jobs = vec![job(store.as_ref(), "r1", 10.0)];
    let summary = Dispatcher::new(store, limiter()).dispatch(jobs).await;

    assert_eq!(summary, DispatchSummary { ok: 1, fail: 0 });
}

#[tokio::test]
async fn retries_give_up_after_max_attempts() {
    let server = MockServer::start().await;
    let store = Arc::new(notion_store(&server, fast_http()));

    Mock::given(method("PATCH"))
        .and(path("/pages/down"))
        .respond_with(ResponseTemplate::new(502))
        .expect(3)
        .mount(&server)
        .await;

    let jobs = vec![job(store.as_ref(), "down", 1.0)];
    let summary = Dispatcher::new(store, limiter()).dispatch(jobs).await;

    assert_eq!(summary, DispatchSummary { ok: 0, fail: 1 });
}

#[tokio::test]
async fn timed_out_update_counts_as_failure() {
    let server = MockServer::start().await;
    let store = Arc::new(notion_store(&server, timeout_http(Duration::from_millis(200))));

    Mock::given(method("PATCH"))
        .and(path("/pages/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "id": "slow" }))
                .set_delay(Duration::from_secs(2)),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/pages/fast"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "fast" })))
        .expect(1)
        .mount(&server)
        .await;

    let jobs = vec![
        job(store.as_ref(), "slow", 1.0),
        job(store.as_ref(), "fast", 2.0),
    ];
    let (summary, outcomes) = Dispatcher::new(store, limiter())
        .dispatch_with_outcomes(jobs)
        .await;

    assert_eq!(summary, DispatchSummary { ok: 1, fail: 1 });
    let failed: Vec<_> = outcomes
        .iter()
        .filter(|o| !o.success)
        .map(|o| o.record_id.as_str())
        .collect();
    assert_eq!(failed, vec!["slow"]);
}

#[tokio::test]
async fn refused_connection_fails_every_job_without_aborting() {
    // Bind then release a port so nothing is listening on it.
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .and_then(|listener| listener.local_addr())
        .expect("free port")
        .port();
    let store = Arc::new(notion_store_at(
        &format!("http://127.0.0.1:{port}"),
        timeout_http(Duration::from_secs(2)),
    ));

    let jobs = vec![job(store.as_ref(), "a", 1.0), job(store.as_ref(), "b", 2.0)];
    let summary = Dispatcher::new(store, limiter()).dispatch(jobs).await;

    assert_eq!(summary, DispatchSummary { ok: 0, fail: 2 });
}
