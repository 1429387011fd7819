//! API request handlers
//!
//! Every gateway handler answers 200 with the operation result or 500 with
//! `{"message": ...}`; extractor rejections are folded into the same shape.

use axum::{
    body::Bytes,
    extract::{
        rejection::{BytesRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::Uri,
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use tokio::time::Instant;

use super::routes::AppState;
use crate::error::{Error, Result};
use crate::types::{
    filter_from_params, ActionRequest, DeleteAck, ErrorResponse, HealthResponse, InsertAck,
    OperationRequest, OperationResult, Target, UpdateAck,
};

/// Path parameters shared by every gateway route
#[derive(Debug, Deserialize)]
pub struct TargetPath {
    pub db: String,
    pub coll: String,
}

type PathParams = std::result::Result<Path<TargetPath>, PathRejection>;
type QueryParams = std::result::Result<Query<Vec<(String, String)>>, QueryRejection>;
type Body = std::result::Result<Bytes, BytesRejection>;

fn target(path: PathParams) -> Result<Target> {
    let Path(params) = path.map_err(|e| Error::InvalidRequest(e.body_text()))?;
    Target::new(params.db, params.coll)
}

fn params(query: QueryParams) -> Result<Vec<(String, String)>> {
    let Query(params) = query.map_err(|e| Error::InvalidRequest(e.body_text()))?;
    Ok(params)
}

fn decode(body: Body) -> Result<Value> {
    let bytes = body.map_err(|e| Error::InvalidRequest(e.body_text()))?;
    Ok(serde_json::from_slice(&bytes)?)
}

async fn run(
    state: &AppState,
    target: Target,
    request: OperationRequest,
    started: Instant,
) -> Result<Json<OperationResult>> {
    let result = state.dispatcher.dispatch(&target, request, started).await?;
    Ok(Json(result))
}

// Handlers

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Gateway and database are reachable", body = HealthResponse),
        (status = 500, description = "Database unreachable", body = ErrorResponse)
    ),
    tag = "health"
)]
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    state.dispatcher.store().ping().await?;

    Ok(Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    }))
}

/// Single endpoint selecting the operation from the body's `action` field
#[utoipa::path(
    post,
    path = "/ms-mongo/{db}/{coll}",
    params(
        ("db" = String, Path, description = "Database name"),
        ("coll" = String, Path, description = "Collection name")
    ),
    request_body = ActionRequest,
    responses(
        (status = 200, description = "Operation result: insert/update/delete acknowledgment or array of documents"),
        (status = 500, description = "Validation, decoding or database failure", body = ErrorResponse)
    ),
    tag = "action"
)]
pub async fn action(
    State(state): State<AppState>,
    path: PathParams,
    body: Body,
) -> Result<Json<OperationResult>> {
    let started = Instant::now();
    let target = target(path)?;
    let request = ActionRequest::from_body(decode(body)?)?.into_operation()?;
    run(&state, target, request, started).await
}

/// Insert the request body as one document
#[utoipa::path(
    post,
    path = "/rest/{db}/{coll}",
    params(
        ("db" = String, Path, description = "Database name"),
        ("coll" = String, Path, description = "Collection name")
    ),
    responses(
        (status = 200, description = "Document inserted", body = InsertAck),
        (status = 500, description = "Decoding or database failure", body = ErrorResponse)
    ),
    tag = "rest"
)]
pub async fn rest_insert(
    State(state): State<AppState>,
    path: PathParams,
    body: Body,
) -> Result<Json<OperationResult>> {
    let started = Instant::now();
    let target = target(path)?;
    let data = decode(body)?;
    run(&state, target, OperationRequest::Insert { data }, started).await
}

/// Find documents; each query parameter becomes a string equality filter
#[utoipa::path(
    get,
    path = "/rest/{db}/{coll}",
    params(
        ("db" = String, Path, description = "Database name"),
        ("coll" = String, Path, description = "Collection name")
    ),
    responses(
        (status = 200, description = "Array of matching documents; all documents when no parameters are given"),
        (status = 500, description = "Database failure", body = ErrorResponse)
    ),
    tag = "rest"
)]
pub async fn rest_find(
    State(state): State<AppState>,
    path: PathParams,
    query: QueryParams,
) -> Result<Json<OperationResult>> {
    let started = Instant::now();
    let target = target(path)?;
    let query = filter_from_params(params(query)?);
    run(&state, target, OperationRequest::Find { query }, started).await
}

/// Set the body's fields on every document matching the query parameters
#[utoipa::path(
    put,
    path = "/rest/{db}/{coll}",
    params(
        ("db" = String, Path, description = "Database name"),
        ("coll" = String, Path, description = "Collection name")
    ),
    responses(
        (status = 200, description = "Documents updated", body = UpdateAck),
        (status = 500, description = "Decoding or database failure", body = ErrorResponse)
    ),
    tag = "rest"
)]
pub async fn rest_update(
    State(state): State<AppState>,
    path: PathParams,
    query: QueryParams,
    body: Body,
) -> Result<Json<OperationResult>> {
    let started = Instant::now();
    let target = target(path)?;
    let data = decode(body)?;
    let query = filter_from_params(params(query)?);
    run(&state, target, OperationRequest::UpdateMany { query, data }, started).await
}

/// Delete every document matching the query parameters
#[utoipa::path(
    delete,
    path = "/rest/{db}/{coll}",
    params(
        ("db" = String, Path, description = "Database name"),
        ("coll" = String, Path, description = "Collection name")
    ),
    responses(
        (status = 200, description = "Documents deleted; without parameters the whole collection is emptied unless disabled", body = DeleteAck),
        (status = 500, description = "Database failure", body = ErrorResponse)
    ),
    tag = "rest"
)]
pub async fn rest_delete(
    State(state): State<AppState>,
    path: PathParams,
    query: QueryParams,
) -> Result<Json<OperationResult>> {
    let started = Instant::now();
    let target = target(path)?;
    let pairs = params(query)?;

    if pairs.is_empty() && !state.allow_unfiltered_delete {
        return Err(Error::MissingQuery);
    }

    let query = filter_from_params(pairs);
    run(&state, target, OperationRequest::DeleteMany { query }, started).await
}

/// Unsupported method on a gateway route
pub async fn method_not_allowed() -> Error {
    Error::MethodNotAllowed
}

/// Unmatched path. Paths under a gateway prefix with an empty segment are
/// reported as the missing database or collection.
pub async fn not_found(State(state): State<AppState>, uri: Uri) -> Error {
    let mut segments = uri.path().trim_start_matches('/').split('/');
    let prefix = segments.next().unwrap_or_default();

    if prefix == &*state.action_prefix || prefix == &*state.rest_prefix {
        let db = segments.next().unwrap_or_default();
        let coll = segments.next().unwrap_or_default();
        if let Err(e) = Target::new(db, coll) {
            return e;
        }
    }

    Error::NotFound
}
