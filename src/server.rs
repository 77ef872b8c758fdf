//! HTTP surface. Turns axum requests into [`RequestDescriptor`]s, hands them
//! to the [`CatalogService`], and maps each outcome to a status code.

use axum::{
    body::Bytes,
    extract::{Path, Query, Request, State},
    http::{self, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::error::ValidationError;
use crate::handlers::{CatalogResponse, CatalogService, Method, OutcomeKind, RequestDescriptor};
use crate::security::{api_key_allows, API_KEY_HEADER};

#[derive(Clone)]
pub struct AppState {
    service: CatalogService,
    api_key: Option<Arc<str>>,
}

impl AppState {
    pub fn new(service: CatalogService, api_key: Option<String>) -> Self {
        Self {
            service,
            api_key: api_key.map(Arc::from),
        }
    }
}

pub fn status_for(response: &CatalogResponse) -> StatusCode {
    match response.outcome {
        OutcomeKind::Success if response.created => StatusCode::CREATED,
        OutcomeKind::Success | OutcomeKind::NoOp => StatusCode::OK,
        OutcomeKind::NotFound => StatusCode::NOT_FOUND,
        OutcomeKind::ValidationError => StatusCode::BAD_REQUEST,
        OutcomeKind::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        OutcomeKind::ServiceError => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for CatalogResponse {
    fn into_response(self) -> Response {
        (status_for(&self), Json(self)).into_response()
    }
}

/// Build the router. `/health` stays outside the API key gate.
pub fn router(state: AppState) -> Router {
    let item = get(get_item).put(update_item).patch(update_item).fallback(unsupported);

    Router::new()
        .route("/movies", get(list_or_query).post(create).fallback(unsupported))
        .route("/movies/:id", get(get_by_sort_key).fallback(unsupported))
        .route("/movies/:category/:id", item)
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn require_api_key(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let presented = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|h| h.to_str().ok());

    if !api_key_allows(state.api_key.as_deref(), presented) {
        warn!("Rejected request to {}: invalid API key", request.uri().path());
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"outcome": "unauthorized", "message": "invalid or missing API key"})),
        )
            .into_response();
    }

    next.run(request).await
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

/// Empty body means no body. Anything else must be JSON.
fn parse_body(body: &Bytes) -> Result<Option<Value>, ValidationError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(body)
        .map(Some)
        .map_err(|e| ValidationError::MalformedBody(e.to_string()))
}

async fn list_or_query(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> CatalogResponse {
    let mut request = RequestDescriptor::new(Method::Get);
    request.query = query;
    state.service.dispatch(&request).await
}

async fn get_by_sort_key(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> CatalogResponse {
    let mut request = RequestDescriptor::new(Method::Get).with_path(None, Some(&id));
    request.query = query;
    state.service.dispatch(&request).await
}

async fn get_item(
    State(state): State<AppState>,
    Path((category, id)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
) -> CatalogResponse {
    let mut request = RequestDescriptor::new(Method::Get).with_path(Some(&category), Some(&id));
    request.query = query;
    state.service.dispatch(&request).await
}

async fn create(State(state): State<AppState>, body: Bytes) -> CatalogResponse {
    let mut request = RequestDescriptor::new(Method::Post);
    match parse_body(&body) {
        Ok(parsed) => request.body = parsed,
        Err(err) => return CatalogResponse::validation(&err),
    }
    state.service.dispatch(&request).await
}

async fn update_item(
    State(state): State<AppState>,
    method: http::Method,
    Path((category, id)): Path<(String, String)>,
    body: Bytes,
) -> CatalogResponse {
    let mut request =
        RequestDescriptor::new(Method::parse(method.as_str())).with_path(Some(&category), Some(&id));
    match parse_body(&body) {
        Ok(parsed) => request.body = parsed,
        Err(err) => return CatalogResponse::validation(&err),
    }
    state.service.dispatch(&request).await
}

async fn unsupported(State(state): State<AppState>, method: http::Method) -> CatalogResponse {
    state
        .service
        .dispatch(&RequestDescriptor::new(Method::parse(method.as_str())))
        .await
}
