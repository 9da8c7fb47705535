//! Shared helpers for router and topology tests.
#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode};
use axum::Router;
use todocache_api::{create_api_router, AppState, CacheLookup, TodoFiller};
use todocache_distcache::{CacheError, Group, GroupOptions};
use todocache_storage::MockTodoStore;
use tower::ServiceExt;

/// Cache whose every lookup fails, forcing the store fallback.
pub struct FailingCache;

#[async_trait]
impl CacheLookup for FailingCache {
    async fn lookup(&self, _key: &str) -> Result<Bytes, CacheError> {
        Err(CacheError::peer("http://127.0.0.1:1", "connection refused"))
    }
}

/// A real single-node cache group filled from `store`.
pub fn local_group(store: &MockTodoStore) -> Group {
    let filler = Arc::new(TodoFiller::new(Arc::new(store.clone())));
    Group::new("todos", GroupOptions::new(2 << 10), filler)
}

/// API router over a real single-node group.
pub fn cached_app(store: &MockTodoStore) -> Router {
    let cache = Arc::new(local_group(store));
    create_api_router(AppState::new(cache, Arc::new(store.clone())))
}

/// API router whose cache always fails.
pub fn uncached_app(store: &MockTodoStore) -> Router {
    create_api_router(AppState::new(Arc::new(FailingCache), Arc::new(store.clone())))
}

pub fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Drive one request through `app` and collect status, content type and body.
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Option<String>, Bytes) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, content_type, body)
}

/// A loopback port that was free a moment ago.
pub fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}
