//! Router-level tests for the todo API over a mock store.

mod support;

use axum::http::{Request, StatusCode};
use axum::body::Body;
use proptest::prelude::*;
use todocache_api::ErrorCode;
use todocache_storage::MockTodoStore;
use todocache_test_utils::assertions::{assert_collection_body, assert_todo_body};
use todocache_test_utils::fixtures::buy_milk_store;
use todocache_test_utils::generators::arb_new_todo;

use support::*;

fn error_code(body: &[u8]) -> ErrorCode {
    let value: serde_json::Value = serde_json::from_slice(body).unwrap();
    serde_json::from_value(value["code"].clone()).unwrap()
}

#[tokio::test]
async fn test_scenario_single_record_lookup() {
    let store = buy_milk_store();
    let app = cached_app(&store);

    let (status, content_type, body) = send(&app, get("/api/todos?key=1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("application/json"));
    assert!(body.starts_with(br#"{"id":1,"title":"buy milk","completed":false,"#));
    assert_todo_body(&body, 1);

    let (status, content_type, body) = send(&app, get("/api/todos?key=2")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(content_type.as_deref(), Some("application/json"));
    assert_eq!(error_code(&body), ErrorCode::EntityNotFound);
}

#[tokio::test]
async fn test_absent_record_is_404_with_or_without_cache() {
    let store = buy_milk_store();
    for app in [cached_app(&store), uncached_app(&store)] {
        let (status, _, _) = send(&app, get("/api/todos?key=42")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _, _) = send(&app, get("/api/todos?key=abc")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}

#[tokio::test]
async fn test_whitespace_key_is_a_record_lookup() {
    let store = buy_milk_store();
    for app in [cached_app(&store), uncached_app(&store)] {
        for uri in ["/api/todos?key=%20", "/api/todos?key=+1", "/api/todos?key=%201%20"] {
            let (status, content_type, body) = send(&app, get(uri)).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "uri {}", uri);
            assert_eq!(content_type.as_deref(), Some("application/json"));
            assert_eq!(error_code(&body), ErrorCode::EntityNotFound);
        }
    }
}

#[tokio::test]
async fn test_repeated_key_uses_first_value() {
    let store = buy_milk_store();
    let app = cached_app(&store);

    let (status, content_type, body) = send(&app, get("/api/todos?key=1&key=1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("application/json"));
    assert_todo_body(&body, 1);

    let (status, _, body) = send(&app, get("/api/todos?key=2&key=1")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), ErrorCode::EntityNotFound);
}

#[tokio::test]
async fn test_repeated_reads_are_byte_identical_and_cached() {
    let store = buy_milk_store();
    let app = cached_app(&store);

    let (_, _, first) = send(&app, get("/api/todos?key=1")).await;
    let (_, _, second) = send(&app, get("/api/todos?key=1")).await;
    assert_eq!(first, second);
    // Second read was a cache hit.
    assert_eq!(store.fetch_count(), 1);
}

#[tokio::test]
async fn test_cache_and_fallback_agree() {
    let store = buy_milk_store();
    let (_, _, cached) = send(&cached_app(&store), get("/api/todos?key=1")).await;
    let (_, _, direct) = send(&uncached_app(&store), get("/api/todos?key=1")).await;
    assert_eq!(cached, direct);
}

#[tokio::test]
async fn test_empty_collection_is_empty_array() {
    let app = cached_app(&MockTodoStore::new());

    let (status, content_type, body) = send(&app, get("/api/todos")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("application/json"));
    assert_eq!(&body[..], b"[]");

    let (status, _, body) = send(&app, get("/api/todos?key=")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"[]");
}

#[tokio::test]
async fn test_post_is_visible_through_fallback_immediately() {
    let store = MockTodoStore::new();
    let app = uncached_app(&store);

    let (status, _, body) = send(
        &app,
        post_json("/api/todos", r#"{"title":"buy milk","completed":false}"#),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body.is_empty());

    let (status, _, body) = send(&app, get("/api/todos?key=1")).await;
    assert_eq!(status, StatusCode::OK);
    let todo = assert_todo_body(&body, 1);
    assert_eq!(todo.title, "buy milk");
    assert_eq!(todo.created_at, todo.updated_at);
}

#[tokio::test]
async fn test_collection_is_never_served_stale() {
    let store = buy_milk_store();
    let app = cached_app(&store);

    let (_, _, body) = send(&app, get("/api/todos")).await;
    assert_eq!(assert_collection_body(&body).len(), 1);

    let (status, _, _) = send(&app, post_json("/api/todos", r#"{"title":"walk dog"}"#)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, _, body) = send(&app, get("/api/todos")).await;
    let todos = assert_collection_body(&body);
    assert_eq!(todos.len(), 2);
    assert_eq!(todos[1].title, "walk dog");
}

#[tokio::test]
async fn test_post_without_content_type_is_accepted() {
    let store = MockTodoStore::new();
    let app = cached_app(&store);

    let request = Request::post("/api/todos")
        .body(Body::from(r#"{"title":"no header"}"#))
        .unwrap();
    let (status, _, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_malformed_post_is_400_without_mutation() {
    let store = MockTodoStore::new();
    let app = cached_app(&store);

    for body in ["this is not json", "{\"completed\":true}", "[1,2,3]", ""] {
        let (status, _, response) = send(&app, post_json("/api/todos", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body {:?}", body);
        assert_eq!(error_code(&response), ErrorCode::MalformedBody);
    }
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_empty_title_is_created() {
    let store = MockTodoStore::new();
    let app = cached_app(&store);

    let (status, _, _) = send(&app, post_json("/api/todos", r#"{"title":""}"#)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _, body) = send(&app, get("/api/todos?key=1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(assert_todo_body(&body, 1).title, "");
}

#[tokio::test]
async fn test_other_methods_are_405() {
    let app = cached_app(&buy_milk_store());

    for method in ["PUT", "DELETE", "PATCH"] {
        let request = Request::builder()
            .method(method)
            .uri("/api/todos?key=1")
            .body(Body::empty())
            .unwrap();
        let (status, _, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED, "method {}", method);
        assert_eq!(error_code(&body), ErrorCode::MethodNotAllowed);
    }
}

#[tokio::test]
async fn test_store_failure_is_500() {
    let store = buy_milk_store();
    store.set_failing(true);
    let app = cached_app(&store);

    let (status, _, body) = send(&app, get("/api/todos?key=1")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(error_code(&body), ErrorCode::DatabaseError);

    let (status, _, _) = send(&app, get("/api/todos")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (status, _, _) = send(&app, post_json("/api/todos", r#"{"title":"x"}"#)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_failed_fill_is_not_cached() {
    let store = buy_milk_store();
    store.set_failing(true);
    let app = cached_app(&store);

    let (status, _, _) = send(&app, get("/api/todos?key=1")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    store.set_failing(false);
    let (status, _, body) = send(&app, get("/api/todos?key=1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_todo_body(&body, 1);
}

#[tokio::test]
async fn test_health_endpoints() {
    let store = MockTodoStore::new();
    let app = cached_app(&store);

    let (status, _, body) = send(&app, get("/health/ping")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"pong");

    let (status, _, body) = send(&app, get("/health/ready")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8_lossy(&body).contains("\"healthy\""));

    store.set_failing(true);
    let (status, _, _) = send(&app, get("/health/ready")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_metrics_endpoint_reports_cache_lookups() {
    let app = cached_app(&buy_milk_store());
    send(&app, get("/api/todos?key=1")).await;

    let (status, _, body) = send(&app, get("/metrics")).await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8_lossy(&body);
    assert!(text.contains("todocache_cache_lookups_total"));
    assert!(text.contains("todocache_http_requests_total"));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_posted_records_read_back(new in arb_new_todo()) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let store = MockTodoStore::new();
            let app = cached_app(&store);
            let body = serde_json::to_string(&new).unwrap();

            let (status, _, _) = send(&app, post_json("/api/todos", &body)).await;
            assert_eq!(status, StatusCode::CREATED);

            let (status, _, body) = send(&app, get("/api/todos?key=1")).await;
            assert_eq!(status, StatusCode::OK);
            let todo = assert_todo_body(&body, 1);
            assert_eq!(todo.title, new.title);
            assert_eq!(todo.completed, new.completed);
            if let Some(created_at) = new.created_at {
                assert_eq!(todo.created_at, created_at);
            }
        });
    }
}
