//! Todo REST API Routes
//!
//! `GET /api/todos` reads through the cache, `POST /api/todos` writes to the
//! store. Every other method is rejected with 405.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Query parameters for `GET /api/todos`.
#[derive(Debug, Default)]
pub struct TodoQuery {
    /// Record id; absent or empty selects the whole collection.
    pub key: Option<String>,
}

impl TodoQuery {
    /// Build from raw query pairs. A repeated `key` uses its first value.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let key = pairs
            .into_iter()
            .find(|(name, _)| name == "key")
            .map(|(_, value)| value);
        Self { key }
    }

    fn record_key(&self) -> Option<&str> {
        self.key.as_deref().filter(|key| !key.is_empty())
    }
}

/// GET /api/todos[?key=<id>] - single record or full collection
pub async fn get_todos(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Response> {
    let query = TodoQuery::from_pairs(pairs);
    let body = match query.record_key() {
        Some(key) => state.reads.get_one(key).await?,
        None => state.reads.get_all().await?,
    };
    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}

/// POST /api/todos - append a record; 201 with an empty body
///
/// The body is taken as raw bytes so that every decode failure, including a
/// missing content type, is reported as 400.
pub async fn create_todo(State(state): State<AppState>, body: Bytes) -> ApiResult<StatusCode> {
    state.writes.create(&body).await?;
    Ok(StatusCode::CREATED)
}

/// Any other method on /api/todos
pub async fn method_not_allowed(method: Method, uri: Uri) -> ApiError {
    ApiError::method_not_allowed(method, uri.path())
}
