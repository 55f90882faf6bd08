//! HTTP surface.
//!
//! Routes requests onto the [`ResourceService`] and renders results and
//! errors as JSON envelopes:
//!
//! | Route | Methods |
//! |-------|---------|
//! | `/` | `GET` resource index |
//! | `/api-docs` | `GET` API description |
//! | `/chemicals` | `GET` (`where`, `page`, `max_results`), `POST`, `DELETE` |
//! | `/chemicals/:id` | `GET`, `PATCH`, `DELETE` |
//!
//! Methods the access policy doesn't enable answer 405.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, Method as HttpMethod, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, MethodRouter};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::auth::{AccessPolicy, Credential};
use crate::config::{CacheSettings, Settings};
use crate::error::ApiError;
use crate::schema::SchemaRegistry;
use crate::service::{Listing, ResourceService};
use crate::store::ChemicalStore;
use crate::types::{http_date, Chemical, Granularity, Method};

/// Shared state behind every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub service: ResourceService,
    pub registry: SchemaRegistry,
}

impl AppState {
    /// Build the state for the chemicals resource over `store`.
    ///
    /// Falls back to the built-in chemicals schema if the registry lacks one.
    pub fn new(settings: &Settings, registry: SchemaRegistry, store: Arc<dyn ChemicalStore>) -> Self {
        let schema = registry
            .get(crate::types::CHEMICALS)
            .cloned()
            .unwrap_or_else(crate::schema::ResourceSchema::chemicals);
        Self {
            service: ResourceService::new(settings, schema, store),
            registry,
        }
    }
}

/// Query parameters of a collection read.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    #[serde(rename = "where")]
    pub filter: Option<String>,
    pub page: Option<usize>,
    pub max_results: Option<usize>,
}

/// Build the router, including cache headers and request tracing.
pub fn router(state: AppState, cache: &CacheSettings) -> Router {
    let policy = state.service.authorizer().policy().clone();
    let resource = format!("/{}", state.service.schema().name);
    let item = format!("{}/:id", resource);

    let collection_routes = method_routes(
        &policy,
        Granularity::Collection,
        [
            (Method::Get, get(list_handler)),
            (Method::Post, axum::routing::post(create_handler)),
            (Method::Delete, axum::routing::delete(delete_all_handler)),
        ],
    );
    let item_routes = method_routes(
        &policy,
        Granularity::Item,
        [
            (Method::Get, get(get_handler)),
            (Method::Patch, axum::routing::patch(update_handler)),
            (Method::Delete, axum::routing::delete(delete_handler)),
        ],
    );

    let cache_control = HeaderValue::from_str(&cache.control)
        .unwrap_or_else(|_| HeaderValue::from_static("no-cache"));
    let expires_secs = i64::try_from(cache.expires_secs).unwrap_or(i64::MAX / 1000);

    Router::new()
        .route("/", get(index_handler))
        .route("/api-docs", get(docs_handler))
        .route(&resource, collection_routes)
        .route(&item, item_routes)
        .fallback(no_route)
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            cache_control,
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::EXPIRES,
            move |_: &Response| {
                let at = Utc::now().checked_add_signed(chrono::Duration::seconds(expires_secs))?;
                HeaderValue::from_str(&http_date(at)).ok()
            },
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

fn method_routes(
    policy: &AccessPolicy,
    granularity: Granularity,
    routes: impl IntoIterator<Item = (Method, MethodRouter<Arc<AppState>>)>,
) -> MethodRouter<Arc<AppState>> {
    routes
        .into_iter()
        .filter(|(method, _)| policy.is_enabled(*method, granularity))
        .fold(MethodRouter::new(), |acc, (_, route)| acc.merge(route))
        .fallback(method_not_allowed)
}

/// Bind and serve until Ctrl+C or SIGTERM.
///
/// # Errors
///
/// Returns the I/O error if the address can't be bound or serving fails.
pub async fn serve(settings: Settings, store: Arc<dyn ChemicalStore>) -> std::io::Result<()> {
    let state = AppState::new(&settings, SchemaRegistry::default(), store);
    let app = router(state, &settings.cache);

    let listener = TcpListener::bind(settings.bind).await?;
    let address: SocketAddr = listener.local_addr()?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

// --- Responses ---

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let mut body = json!({
            "_status": "ERR",
            "_error": { "code": status.as_u16(), "message": self.to_string() },
        });

        match &self {
            ApiError::InvalidRecord { errors } => {
                let issues: Map<String, Value> = errors
                    .iter()
                    .map(|e| (e.field.clone(), json!(e.violation.to_string())))
                    .collect();
                body["_issues"] = Value::Object(issues);
            }
            ApiError::Store(e) => error!(error = %e, "store failure"),
            _ => {}
        }

        let mut response = (status, Json(body)).into_response();
        if matches!(self, ApiError::Unauthorized) {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static("Basic realm=\"chemicals\""),
            );
        }
        response
    }
}

fn item_body(chemical: &Chemical) -> Value {
    serde_json::to_value(chemical).unwrap_or_else(|_| json!({ "_id": chemical.id }))
}

fn write_body(chemical: &Chemical) -> Value {
    let mut body = item_body(chemical);
    if let Value::Object(map) = &mut body {
        map.insert("_status".into(), json!("OK"));
    }
    body
}

fn listing_body(listing: &Listing) -> Value {
    json!({
        "_items": listing.items.iter().map(item_body).collect::<Vec<_>>(),
        "_meta": {
            "page": listing.page.number,
            "max_results": listing.page.max_results,
            "total": listing.total,
        },
    })
}

/// Credential from the `Authorization` header; malformed headers count as
/// absent.
fn credential(headers: &HeaderMap) -> Option<Credential> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(Credential::from_basic_header)
}

// --- Handlers ---

async fn index_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let children: Vec<Value> = state
        .registry
        .resources()
        .map(|r| json!({ "href": r.name, "title": r.name }))
        .collect();
    Json(json!({ "_links": { "child": children } }))
}

async fn docs_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let policy = state.service.authorizer().policy();
    let mut paths = Map::new();
    let mut definitions = Map::new();

    for resource in state.registry.resources() {
        definitions.insert(resource.item_title.clone(), resource.to_json_schema());

        let describe = |methods: &[Method], public: &[Method]| -> Value {
            let ops: Map<String, Value> = methods
                .iter()
                .map(|m| {
                    let security = if public.contains(m) {
                        json!([])
                    } else {
                        json!([{ "BasicAuth": [] }])
                    };
                    (m.as_str().to_lowercase(), json!({ "security": security }))
                })
                .collect();
            Value::Object(ops)
        };
        paths.insert(
            format!("/{}", resource.name),
            describe(policy.resource_methods.as_slice(), policy.public_methods.as_slice()),
        );
        paths.insert(
            format!("/{}/{{{}Id}}", resource.name, resource.item_title),
            describe(policy.item_methods.as_slice(), policy.public_item_methods.as_slice()),
        );
    }

    Json(json!({
        "swagger": "2.0",
        "info": {
            "title": "Chemical API",
            "version": "1.0",
            "description": "A REST API to query chemical data",
            "license": { "name": "MIT" },
        },
        "schemes": ["http", "https"],
        "securityDefinitions": { "BasicAuth": { "type": "basic" } },
        "paths": paths,
        "definitions": definitions,
    }))
}

async fn no_route(uri: Uri) -> ApiError {
    ApiError::NoRoute {
        path: uri.path().to_string(),
    }
}

async fn method_not_allowed(method: HttpMethod, uri: Uri) -> ApiError {
    ApiError::MethodNotAllowed {
        method: method.to_string(),
        path: uri.path().to_string(),
    }
}

async fn list_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::BadRequest {
        message: e.body_text(),
    })?;
    let service = &state.service;

    let filter = service.parse_filter(params.filter.as_deref())?;
    let page = service.page(params.page, params.max_results)?;
    let listing = service
        .list(credential(&headers).as_ref(), filter.as_ref(), page)
        .await?;

    Ok(Json(listing_body(&listing)))
}

async fn get_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let chemical = state
        .service
        .get(credential(&headers).as_ref(), &id)
        .await?;
    Ok(Json(item_body(&chemical)))
}

async fn create_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let created = state
        .service
        .create(credential(&headers).as_ref(), &body)
        .await?;
    Ok((StatusCode::CREATED, Json(write_body(&created))))
}

async fn update_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let updated = state
        .service
        .update(credential(&headers).as_ref(), &id, &body)
        .await?;
    Ok(Json(write_body(&updated)))
}

async fn delete_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .service
        .delete(credential(&headers).as_ref(), &id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_all_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    state
        .service
        .delete_all(credential(&headers).as_ref())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FieldError, Violation};

    #[test]
    fn credential_from_headers() {
        let mut headers = HeaderMap::new();
        assert_eq!(credential(&headers), None);

        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&Credential::new("admin", "admin").to_basic_header()).unwrap(),
        );
        assert_eq!(credential(&headers), Some(Credential::new("admin", "admin")));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic ???"));
        assert_eq!(credential(&headers), None);
    }

    #[test]
    fn invalid_record_response_lists_issues() {
        let err = ApiError::InvalidRecord {
            errors: vec![FieldError {
                field: "formula".into(),
                violation: Violation::Missing,
            }],
        };
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn unauthorized_response_challenges() {
        let response = ApiError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));
    }
}
