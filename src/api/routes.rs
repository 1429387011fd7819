//! API route definitions

use axum::{
    http::{header, HeaderName, Method},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use super::handlers;
use crate::config::Config;
use crate::dispatch::{Budgets, Dispatcher};
use crate::store::DocumentStore;
use crate::types::{ActionRequest, DeleteAck, ErrorResponse, HealthResponse, InsertAck, UpdateAck};

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "docgate API",
        version = "0.1.0",
        description = "HTTP gateway translating requests into document database operations"
    ),
    tags(
        (name = "action", description = "Action-dispatch endpoint"),
        (name = "rest", description = "REST endpoints"),
        (name = "health", description = "Health checks")
    ),
    paths(
        handlers::health,
        handlers::action,
        handlers::rest_insert,
        handlers::rest_find,
        handlers::rest_update,
        handlers::rest_delete,
    ),
    components(schemas(
        ActionRequest,
        InsertAck,
        UpdateAck,
        DeleteAck,
        ErrorResponse,
        HealthResponse,
    ))
)]
pub struct ApiDoc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub action_prefix: Arc<str>,
    pub rest_prefix: Arc<str>,
    pub allow_unfiltered_delete: bool,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, config: &Config) -> Self {
        Self {
            dispatcher: Dispatcher::new(store, Budgets::from(&config.timeouts)),
            action_prefix: config.action_prefix.as_str().into(),
            rest_prefix: config.rest_prefix.as_str().into(),
            allow_unfiltered_delete: config.rest.allow_unfiltered_delete,
        }
    }
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            HeaderName::from_static("x-requested-with"),
            header::ACCEPT,
            header::CONTENT_TYPE,
            header::CONTENT_LENGTH,
            header::ACCEPT_ENCODING,
            HeaderName::from_static("x-csrf-token"),
            header::AUTHORIZATION,
        ])
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let action_path = format!("/{}/{{db}}/{{coll}}", state.action_prefix);
    let rest_path = format!("/{}/{{db}}/{{coll}}", state.rest_prefix);

    Router::new()
        // Action dispatch
        .route(
            &action_path,
            post(handlers::action).fallback(handlers::method_not_allowed),
        )

        // REST
        .route(
            &rest_path,
            get(handlers::rest_find)
                .post(handlers::rest_insert)
                .put(handlers::rest_update)
                .delete(handlers::rest_delete)
                .fallback(handlers::method_not_allowed),
        )

        // Health
        .route("/health", get(handlers::health))

        // OpenAPI spec
        .route("/api/openapi.json", get(openapi_json))

        .fallback(handlers::not_found)

        .layer(cors())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
