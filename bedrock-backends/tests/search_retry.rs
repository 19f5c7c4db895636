//! Retry-on-status behaviour against an in-process mock cluster

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::any;
use axum::Router;
use bedrock_backends::{SearchClient, SearchError};
use bedrock_core::SearchSettings;
use reqwest::Method;

#[derive(Clone)]
struct Script {
    hits: Arc<AtomicUsize>,
    fail_first: usize,
    failure: StatusCode,
}

async fn scripted(State(script): State<Script>) -> (StatusCode, &'static str) {
    let n = script.hits.fetch_add(1, Ordering::SeqCst);
    if n < script.fail_first {
        (script.failure, r#"{"error":"unavailable"}"#)
    } else {
        (StatusCode::OK, r#"{"cluster_name":"mock"}"#)
    }
}

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

async fn scripted_cluster(fail_first: usize, failure: StatusCode) -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new().fallback(scripted).with_state(Script {
        hits: hits.clone(),
        fail_first,
        failure,
    });
    (serve(app).await, hits)
}

fn client(host: String, max_retries: u32) -> SearchClient {
    SearchClient::new(SearchSettings {
        hosts: vec![host],
        max_retries,
        ..SearchSettings::default()
    })
    .unwrap()
}

#[tokio::test]
async fn succeeds_after_max_retries_unavailable_responses() {
    let (host, hits) = scripted_cluster(3, StatusCode::SERVICE_UNAVAILABLE).await;
    let client = client(host, 3);

    let body = client.perform(Method::GET, "/", None).await.unwrap();

    assert_eq!(body["cluster_name"], "mock");
    assert_eq!(hits.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn internal_server_error_is_never_retried() {
    let (host, hits) = scripted_cluster(usize::MAX, StatusCode::INTERNAL_SERVER_ERROR).await;
    let client = client(host, 3);

    let err = client.perform(Method::GET, "/", None).await.unwrap_err();

    assert!(matches!(
        err,
        SearchError::Status { status, .. } if status == StatusCode::INTERNAL_SERVER_ERROR
    ));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn exhausted_retries_surface_last_status() {
    let (host, hits) = scripted_cluster(usize::MAX, StatusCode::BAD_GATEWAY).await;
    let client = client(host, 2);

    let err = client.info().await.unwrap_err();

    assert!(matches!(
        err,
        SearchError::Status { status, ref body } if status == StatusCode::BAD_GATEWAY && body.contains("unavailable")
    ));
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn zero_retry_budget_sends_once() {
    let (host, hits) = scripted_cluster(1, StatusCode::GATEWAY_TIMEOUT).await;
    let client = client(host, 0);

    assert!(client.ping().await.is_err());
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn retries_rotate_across_hosts() {
    let (first, first_hits) = scripted_cluster(usize::MAX, StatusCode::SERVICE_UNAVAILABLE).await;
    let (second, second_hits) = scripted_cluster(0, StatusCode::OK).await;

    let client = SearchClient::new(SearchSettings {
        hosts: vec![first, second],
        max_retries: 3,
        ..SearchSettings::default()
    })
    .unwrap();

    client.ping().await.unwrap();
    assert_eq!(first_hits.load(Ordering::SeqCst), 1);
    assert_eq!(second_hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn transport_errors_are_not_retried() {
    // nothing listens on port 1
    let client = client("http://127.0.0.1:1".to_string(), 3);
    let err = client.ping().await.unwrap_err();
    assert!(matches!(err, SearchError::Http(_)));
}

#[tokio::test]
async fn index_exists_maps_not_found_to_false() {
    let app = Router::new().route("/present", any(|| async { StatusCode::OK }));
    let client = client(serve(app).await, 3);

    assert!(client.index_exists("present").await.unwrap());
    assert!(!client.index_exists("missing").await.unwrap());
}

#[tokio::test]
async fn basic_auth_is_sent_when_username_configured() {
    async fn guarded(headers: HeaderMap) -> StatusCode {
        match headers.get(header::AUTHORIZATION) {
            Some(value) if value == "Basic ZWxhc3RpYzpjaGFuZ2VtZQ==" => StatusCode::OK,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
    let host = serve(Router::new().fallback(guarded)).await;

    let anonymous = client(host.clone(), 0);
    assert!(anonymous.ping().await.is_err());

    let authed = SearchClient::new(SearchSettings {
        hosts: vec![host],
        username: "elastic".to_string(),
        password: "changeme".to_string(),
        ..SearchSettings::default()
    })
    .unwrap();
    authed.ping().await.unwrap();
}
